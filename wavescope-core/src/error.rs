use thiserror::Error;

/// All errors produced by wavescope-core.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("capture stream error: {0}")]
    CaptureStream(String),

    #[error("analysis window size {0} is not a power of two")]
    InvalidWindowSize(usize),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ScopeError>;

/// Validate an analysis window size.
///
/// Every component that sizes itself from the window (rolling buffer, FFT
/// plan, engine config) funnels through here so the rule lives in one place.
pub fn check_window_size(size: usize) -> Result<()> {
    if size.is_power_of_two() {
        Ok(())
    } else {
        Err(ScopeError::InvalidWindowSize(size))
    }
}
