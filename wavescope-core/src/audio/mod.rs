//! Capture collaborators.
//!
//! The pipeline only sees two traits:
//!
//! - [`CaptureDevice`]: something that can be opened. It is `Send` so it can
//!   be moved onto the capture worker thread and opened *there*.
//! - [`CaptureSource`]: the opened session. It does **not** need to be
//!   `Send`: `cpal::Stream` is bound to its creation thread on Windows/macOS,
//!   so the source lives and dies on the worker.
//!
//! Shipped implementations:
//!
//! | Device | Source | Backend |
//! |--------|--------|---------|
//! | [`input::CpalDevice`] | [`input::CpalCapture`] | live input via cpal (`audio-cpal` feature) |
//! | [`replay::ReplayDevice`] | [`replay::ReplayCapture`] | WAV file or in-memory samples |

pub mod convert;
pub mod device;
#[cfg(feature = "audio-cpal")]
pub mod input;
pub mod replay;
#[cfg(test)]
pub(crate) mod scripted;

#[cfg(feature = "audio-cpal")]
pub use input::{CpalCapture, CpalDevice};
pub use replay::{ReplayCapture, ReplayDevice};

use crate::buffering::chunk::Chunk;
use crate::error::Result;

/// An opened capture session.
pub trait CaptureSource {
    /// Rate the session actually delivers samples at (Hz).
    fn sample_rate(&self) -> u32;

    /// Block until samples are available or a bounded wait elapses.
    ///
    /// # Returns
    /// - A non-empty chunk when samples arrived.
    /// - An empty chunk on a transient no-data wait.
    ///
    /// # Errors
    /// `ScopeError::CaptureStream` once the device or session is lost.
    fn read(&mut self) -> Result<Chunk>;

    /// Release device/session resources. Idempotent.
    fn stop(&mut self);
}

/// Something that can open a [`CaptureSource`].
pub trait CaptureDevice: Send + 'static {
    type Source: CaptureSource;

    /// Open the capture session on the calling thread.
    ///
    /// # Errors
    /// `ScopeError::CaptureUnavailable` when the device is absent or access
    /// is denied.
    fn start(self) -> Result<Self::Source>;
}
