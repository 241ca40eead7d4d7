//! Snapshot → magnitude spectrum, with recycled scratch buffers.

use super::fft::Radix2Fft;
use super::magnitude::magnitudes_into;
use crate::error::Result;

/// Spectrum analyzer for one fixed window size.
///
/// Owns the planned FFT and the real/imaginary scratch arrays. The scratch
/// arrays are fully overwritten from each new snapshot, so nothing from a
/// previous cycle survives into the next transform.
#[derive(Debug, Clone)]
pub struct SpectrumAnalyzer {
    fft: Radix2Fft,
    sample_rate: u32,
    real: Vec<f32>,
    imag: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// # Errors
    /// `ScopeError::InvalidWindowSize` unless `window_size` is a power of two.
    pub fn new(window_size: usize, sample_rate: u32) -> Result<Self> {
        let fft = Radix2Fft::new(window_size)?;
        Ok(Self {
            fft,
            sample_rate,
            real: vec![0.0; window_size],
            imag: vec![0.0; window_size],
        })
    }

    /// Transform `samples` and return `window_size / 2` bin magnitudes.
    ///
    /// # Panics
    /// Panics if `samples.len()` differs from the window size.
    pub fn analyze(&mut self, samples: &[i16]) -> Vec<f32> {
        assert_eq!(
            samples.len(),
            self.fft.size(),
            "snapshot length does not match analysis window"
        );

        for (dst, &src) in self.real.iter_mut().zip(samples) {
            *dst = f32::from(src);
        }
        self.imag.fill(0.0);

        self.fft.process(&mut self.real, &mut self.imag);

        let mut out = vec![0.0; self.num_bins()];
        magnitudes_into(&self.real, &self.imag, &mut out);
        out
    }

    pub fn window_size(&self) -> usize {
        self.fft.size()
    }

    /// Number of bins exposed per spectrum (N/2).
    pub fn num_bins(&self) -> usize {
        self.fft.size() / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bin labels follow whatever rate the capture source actually runs at.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Frequency spacing between bins in Hz.
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate as f32 / self.fft.size() as f32
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz()
    }

    pub fn frequency_axis(&self) -> Vec<f32> {
        (0..self.num_bins()).map(|b| self.bin_frequency(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(n: usize, bin: usize, amplitude: f64) -> Vec<i16> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * (bin * i) as f64 / n as f64;
                (amplitude * phase.sin()).round() as i16
            })
            .collect()
    }

    #[test]
    fn tone_peaks_at_expected_frequency() {
        let mut analyzer = SpectrumAnalyzer::new(1024, 44_100).unwrap();
        let spectrum = analyzer.analyze(&tone(1024, 93, 12_000.0));
        assert_eq!(spectrum.len(), 512);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        assert_eq!(peak, 93);
        let hz = analyzer.bin_frequency(peak);
        assert!((hz - 93.0 * 44_100.0 / 1024.0).abs() < 1e-2, "hz={hz}");
    }

    #[test]
    fn repeated_analysis_does_not_leak_state() {
        let mut analyzer = SpectrumAnalyzer::new(64, 8_000).unwrap();
        let loud = analyzer.analyze(&tone(64, 5, 20_000.0));
        assert!(loud[5] > 1.0);

        let silent = analyzer.analyze(&vec![0i16; 64]);
        assert!(silent.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn frequency_axis_spans_half_the_sample_rate() {
        let analyzer = SpectrumAnalyzer::new(8, 8_000).unwrap();
        assert_eq!(analyzer.frequency_axis(), vec![0.0, 1000.0, 2000.0, 3000.0]);
        assert_eq!(analyzer.bin_width_hz(), 1000.0);
    }

    #[test]
    fn sample_rate_can_follow_the_device() {
        let mut analyzer = SpectrumAnalyzer::new(1024, 44_100).unwrap();
        analyzer.set_sample_rate(48_000);
        assert_eq!(analyzer.sample_rate(), 48_000);
        assert!((analyzer.bin_width_hz() - 46.875).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_window() {
        assert!(SpectrumAnalyzer::new(100, 44_100).is_err());
    }

    #[test]
    #[should_panic(expected = "snapshot length")]
    fn rejects_wrong_snapshot_length() {
        let mut analyzer = SpectrumAnalyzer::new(16, 8_000).unwrap();
        analyzer.analyze(&[0; 8]);
    }
}
