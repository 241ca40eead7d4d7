//! Published analysis results.
//!
//! One [`Frame`] is built per pipeline cycle and handed to consumers as an
//! `Arc<Frame>`. Frames are immutable; the next cycle supersedes them.
//!
//! ## Display scaling
//!
//! Each frame is normalised by its own maximum, never by a running maximum
//! across frames. The divisor is clamped to at least [`MIN_DISPLAY_SCALE`] so
//! a silent frame renders as a flat line instead of NaN.

use std::sync::Arc;

use crate::buffering::Snapshot;

/// Lower bound for frame-local normalisation divisors.
pub const MIN_DISPLAY_SCALE: f32 = 1.0;

/// Clamp a frame-local maximum into a usable divisor.
pub fn display_scale(frame_max: f32) -> f32 {
    if frame_max.is_finite() {
        frame_max.max(MIN_DISPLAY_SCALE)
    } else {
        MIN_DISPLAY_SCALE
    }
}

/// Time-domain view of one analysis window.
#[derive(Debug, Clone)]
pub struct WaveformFrame {
    samples: Snapshot,
}

impl WaveformFrame {
    pub fn new(samples: Snapshot) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        self.samples.samples()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame-local divisor: the largest absolute amplitude, at least 1.
    pub fn scale(&self) -> f32 {
        display_scale(f32::from(self.samples.peak()))
    }

    /// Samples divided by [`Self::scale`], in `[-1.0, 1.0]` (the most
    /// negative i16 maps just below -1 when it is the only peak).
    pub fn normalized(&self) -> Vec<f32> {
        let scale = self.scale();
        self.samples.iter().map(|&s| f32::from(s) / scale).collect()
    }
}

/// Frequency-domain view of one analysis window.
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    magnitudes: Arc<[f32]>,
    bin_width_hz: f32,
}

impl SpectralFrame {
    pub fn new(magnitudes: Vec<f32>, bin_width_hz: f32) -> Self {
        Self {
            magnitudes: magnitudes.into(),
            bin_width_hz,
        }
    }

    /// Raw, un-normalised bin magnitudes (N/2 of them).
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn bin_width_hz(&self) -> f32 {
        self.bin_width_hz
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz
    }

    /// Largest magnitude in this frame (0 when empty).
    pub fn max_magnitude(&self) -> f32 {
        self.magnitudes.iter().copied().fold(0.0, f32::max)
    }

    /// Frame-local divisor: the largest magnitude, at least 1.
    pub fn scale(&self) -> f32 {
        display_scale(self.max_magnitude())
    }

    /// Magnitudes divided by [`Self::scale`], in `[0.0, 1.0]`.
    pub fn normalized(&self) -> Vec<f32> {
        let scale = self.scale();
        self.magnitudes.iter().map(|&m| m / scale).collect()
    }

    /// Bin holding the largest magnitude, if any bin is nonzero.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .filter(|(_, &m)| m > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
    }

    /// Frequency of [`Self::peak_bin`] in Hz.
    pub fn peak_frequency(&self) -> Option<f32> {
        self.peak_bin().map(|bin| self.bin_frequency(bin))
    }
}

/// One published pipeline result.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Per-engine sequence number, +1 per published frame.
    pub seq: u64,
    /// Sample rate the window was captured at (Hz).
    pub sample_rate: u32,
    pub waveform: WaveformFrame,
    pub spectrum: SpectralFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waveform(samples: Vec<i16>) -> WaveformFrame {
        WaveformFrame::new(Snapshot::from(samples))
    }

    #[test]
    fn constant_waveform_scales_by_its_absolute_value() {
        let frame = waveform(vec![-250; 16]);
        assert_eq!(frame.scale(), 250.0);
        assert!(frame.normalized().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn silent_waveform_uses_floor_scale() {
        let frame = waveform(vec![0; 16]);
        assert_eq!(frame.scale(), MIN_DISPLAY_SCALE);
        let normalized = frame.normalized();
        assert!(normalized.iter().all(|v| *v == 0.0 && !v.is_nan()));
    }

    #[test]
    fn sub_unit_waveform_is_not_amplified() {
        // |1| is the floor, so a ±1 signal is left as is.
        let frame = waveform(vec![1, -1, 0, 1]);
        assert_eq!(frame.scale(), 1.0);
        assert_eq!(frame.normalized(), vec![1.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn silent_spectrum_normalises_to_zero_without_nan() {
        let frame = SpectralFrame::new(vec![0.0; 8], 5.0);
        assert_eq!(frame.scale(), 1.0);
        assert!(frame.normalized().iter().all(|&v| v == 0.0));
        assert_eq!(frame.peak_bin(), None);
    }

    #[test]
    fn spectrum_normalises_by_its_own_peak() {
        let frame = SpectralFrame::new(vec![2.0, 8.0, 4.0, 0.5], 10.0);
        assert_eq!(frame.scale(), 8.0);
        assert_eq!(frame.normalized(), vec![0.25, 1.0, 0.5, 0.0625]);
        assert_eq!(frame.peak_bin(), Some(1));
        assert_eq!(frame.peak_frequency(), Some(10.0));
    }

    #[test]
    fn small_spectrum_uses_floor_scale() {
        let frame = SpectralFrame::new(vec![0.5, 0.25], 1.0);
        assert_eq!(frame.scale(), 1.0);
        assert_eq!(frame.normalized(), vec![0.5, 0.25]);
    }

    #[test]
    fn display_scale_ignores_non_finite_values() {
        assert_eq!(display_scale(f32::NAN), MIN_DISPLAY_SCALE);
        assert_eq!(display_scale(f32::INFINITY), MIN_DISPLAY_SCALE);
        assert_eq!(display_scale(42.0), 42.0);
    }
}
