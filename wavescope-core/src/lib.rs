//! # wavescope-core
//!
//! Live audio capture → rolling window → FFT → latest-frame slot.
//!
//! ## Architecture
//!
//! ```text
//! Device callback → SPSC RingBuffer → CaptureSource::read   (wavescope-capture thread)
//!                                            │
//!                                     RollingWindow::append
//!                                            │
//!                                   snapshot (last N samples)
//!                                     ┌──────┴──────┐
//!                              WaveformFrame   SpectrumAnalyzer (radix-2 FFT, |X[k]|)
//!                                     └──────┬──────┘
//!                                watch::Sender<Option<Arc<Frame>>>
//! ```
//!
//! The device callback only down-mixes and pushes into the ring. Windowing,
//! the transform and frame assembly all happen on the capture thread, and
//! consumers only ever see complete, immutable frames.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod spectrum;

// Convenience re-exports for downstream crates
pub use audio::device::{list_input_devices, DeviceInfo};
pub use audio::{CaptureDevice, CaptureSource, ReplayDevice};
pub use buffering::{RollingWindow, Snapshot};
pub use engine::{pipeline::DiagnosticsSnapshot, EngineConfig, ScopeEngine};
pub use error::{Result, ScopeError};
pub use events::{EngineStatus, EngineStatusEvent};
pub use frame::{Frame, SpectralFrame, WaveformFrame};
pub use spectrum::SpectrumAnalyzer;

#[cfg(feature = "audio-cpal")]
pub use audio::CpalDevice;
