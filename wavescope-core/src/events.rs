//! Status events broadcast to consumers.
//!
//! Serialisable so hosts can forward them over whatever bus they use
//! (Tauri events, websockets, log lines).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted whenever the engine changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. why the stream ended).
    pub detail: Option<String>,
}

/// Lifecycle of the capture pipeline.
///
/// ```text
/// Idle ──start──► Capturing ──stop──► Stopping ──released──► Stopped
///                     │                                        ▲
///                     └──────────── capture error ─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Capture source open, frames being published.
    Capturing,
    /// Stop accepted; the worker is releasing the capture source.
    Stopping,
    /// Capture source released; the engine may be started again.
    Stopped,
}

impl EngineStatus {
    pub fn is_active(self) -> bool {
        matches!(self, EngineStatus::Capturing | EngineStatus::Stopping)
    }
}
