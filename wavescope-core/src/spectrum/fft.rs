//! Iterative radix-2 decimation-in-time FFT.
//!
//! ## Algorithm
//!
//! 1. Reorder the input into bit-reversed index order.
//! 2. For stage sizes s = 2, 4, …, N, combine pairs of half-size transforms
//!    with the butterfly
//!    `t = x[i+j+s/2]·w`, `x[i+j+s/2] = x[i+j] − t`, `x[i+j] = x[i+j] + t`
//!    where `w = e^{−2πi·(j·N/s)/N}`.
//!
//! The negative exponent makes this the forward transform. No window is
//! applied: callers feed raw samples, so energy from signals that do not
//! complete a whole number of cycles in the window leaks into neighbouring
//! bins.

use std::f64::consts::PI;

use crate::error::{check_window_size, Result};

/// Forward DFT of `real[i] + j·imag[i]`, computed in place.
///
/// Plans the twiddle table on every call; use [`Radix2Fft`] when the same
/// size is transformed repeatedly.
///
/// # Panics
/// Panics if the slices differ in length or the length is not a power of two.
/// A zero-length input is left untouched.
pub fn transform(real: &mut [f32], imag: &mut [f32]) {
    assert_eq!(
        real.len(),
        imag.len(),
        "real and imaginary parts must have the same length"
    );
    if real.is_empty() {
        return;
    }
    assert!(
        real.len().is_power_of_two(),
        "FFT length {} is not a power of two",
        real.len()
    );
    let twiddles = twiddle_table(real.len());
    butterflies(real, imag, &twiddles);
}

/// Swap every element pair whose indices are bit reversals of each other
/// over `log2(N)` bits. Applying it twice restores the original order.
///
/// # Panics
/// Same preconditions as [`transform`].
pub fn bit_reverse_permute(real: &mut [f32], imag: &mut [f32]) {
    let n = real.len();
    assert_eq!(n, imag.len(), "real and imaginary parts must have the same length");
    if n <= 1 {
        return;
    }
    assert!(n.is_power_of_two(), "FFT length {n} is not a power of two");

    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if j > i {
            real.swap(i, j);
            imag.swap(i, j);
        }
    }
}

/// A forward transform planned for one power-of-two size.
#[derive(Debug, Clone)]
pub struct Radix2Fft {
    size: usize,
    /// `(cos θ, sin θ)` for θ = −2πk/N, k in 0..N/2.
    twiddles: Vec<(f32, f32)>,
}

impl Radix2Fft {
    /// # Errors
    /// `ScopeError::InvalidWindowSize` unless `size` is a power of two.
    pub fn new(size: usize) -> Result<Self> {
        check_window_size(size)?;
        Ok(Self {
            size,
            twiddles: twiddle_table(size),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Transform `real`/`imag` in place.
    ///
    /// # Panics
    /// Panics if either slice is not exactly `self.size()` long.
    pub fn process(&self, real: &mut [f32], imag: &mut [f32]) {
        assert_eq!(real.len(), self.size, "real length does not match FFT size");
        assert_eq!(imag.len(), self.size, "imag length does not match FFT size");
        butterflies(real, imag, &self.twiddles);
    }
}

fn twiddle_table(n: usize) -> Vec<(f32, f32)> {
    (0..n / 2)
        .map(|k| {
            let angle = -2.0 * PI * k as f64 / n as f64;
            (angle.cos() as f32, angle.sin() as f32)
        })
        .collect()
}

fn butterflies(real: &mut [f32], imag: &mut [f32], twiddles: &[(f32, f32)]) {
    let n = real.len();
    bit_reverse_permute(real, imag);

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let table_step = n / size;
        for start in (0..n).step_by(size) {
            for j in 0..half {
                let (cos, sin) = twiddles[j * table_step];
                let lo = start + j;
                let hi = lo + half;

                let t_re = real[hi] * cos - imag[hi] * sin;
                let t_im = real[hi] * sin + imag[hi] * cos;

                real[hi] = real[lo] - t_re;
                imag[hi] = imag[lo] - t_im;
                real[lo] += t_re;
                imag[lo] += t_im;
            }
        }
        size *= 2;
    }
}
