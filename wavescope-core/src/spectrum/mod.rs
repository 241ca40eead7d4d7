//! Spectral analysis: radix-2 FFT, magnitude extraction and the analyzer
//! that ties them to a fixed window size.

pub mod analyzer;
pub mod fft;
pub mod magnitude;

pub use analyzer::SpectrumAnalyzer;
pub use fft::{bit_reverse_permute, transform, Radix2Fft};
pub use magnitude::{magnitudes, magnitudes_into};
