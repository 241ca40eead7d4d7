//! Magnitude extraction from transformed real/imaginary pairs.
//!
//! The transform of a real-valued signal is conjugate-symmetric, so only the
//! first N/2 bins carry information. No normalisation is applied here;
//! display scaling happens per frame in [`crate::frame`].

/// `sqrt(re² + im²)` for the first `N/2` bins.
///
/// # Panics
/// Panics if `real` and `imag` differ in length.
pub fn magnitudes(real: &[f32], imag: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0; real.len() / 2];
    magnitudes_into(real, imag, &mut out);
    out
}

/// Write the first `out.len()` bin magnitudes into `out`.
///
/// # Panics
/// Panics if `real` and `imag` differ in length or `out` is longer than
/// `real.len() / 2`.
pub fn magnitudes_into(real: &[f32], imag: &[f32], out: &mut [f32]) {
    assert_eq!(
        real.len(),
        imag.len(),
        "real and imaginary parts must have the same length"
    );
    assert!(
        out.len() <= real.len() / 2,
        "requested {} bins from a {}-point transform",
        out.len(),
        real.len()
    );
    for (slot, (&re, &im)) in out.iter_mut().zip(real.iter().zip(imag)) {
        *slot = (re * re + im * im).sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::fft::transform;
    use approx::assert_abs_diff_eq;

    #[test]
    fn computes_euclidean_norm_of_first_half() {
        let real = [3.0, 0.0, -5.0, 9.0];
        let imag = [4.0, -2.0, 12.0, 9.0];
        let mags = magnitudes(&real, &imag);
        assert_eq!(mags.len(), 2);
        assert_abs_diff_eq!(mags[0], 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(mags[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_input_gives_zero_spectrum() {
        let mut real = vec![0.0f32; 64];
        let mut imag = vec![0.0f32; 64];
        transform(&mut real, &mut imag);
        let mags = magnitudes(&real, &imag);
        assert_eq!(mags.len(), 32);
        assert!(mags.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn discrete_sine_example_peaks_at_bin_two() {
        let mut real = vec![0.0, 1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0];
        let mut imag = vec![0.0f32; 8];
        transform(&mut real, &mut imag);
        let mags = magnitudes(&real, &imag);

        assert_eq!(mags.len(), 4);
        assert_abs_diff_eq!(mags[2], 4.0, epsilon = 1e-6);
        for bin in [0, 1, 3] {
            assert!(mags[bin] < 1e-6, "bin {bin} = {}", mags[bin]);
        }
    }

    #[test]
    fn magnitudes_are_never_negative() {
        let real = [-1.0, -2.0, 0.5, -0.25, 3.0, -3.0, 0.0, 1.0];
        let imag = [-1.0, 2.0, -0.5, -0.25, 0.0, 0.0, 0.0, 0.0];
        assert!(magnitudes(&real, &imag).iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn single_point_transform_has_no_bins() {
        assert!(magnitudes(&[1.0], &[0.0]).is_empty());
    }

    #[test]
    #[should_panic(expected = "requested 3 bins")]
    fn rejects_oversized_output() {
        let mut out = [0.0f32; 3];
        magnitudes_into(&[0.0; 4], &[0.0; 4], &mut out);
    }
}
