//! Top-level lifecycle controller: [`ScopeEngine`] and its [`EngineConfig`].
//!
//! ## Lifecycle
//!
//! ```text
//! ScopeEngine::new(config)     → window size validated, status = Idle
//!     └─► start(device)        → device opened on the worker, status = Capturing
//!         └─► stop()           → status = Stopping, worker releases device, status = Stopped
//! ```
//!
//! A capture error moves the engine straight from Capturing to Stopped.
//! A stopped engine may be started again.
//!
//! ## Threading
//!
//! Each `start` spawns one `wavescope-capture` thread. The capture source is
//! opened *inside* that thread (cpal streams are `!Send`), and a one-shot
//! channel carries the open result back to `start()`. `stop()` joins the
//! thread, so by the time it returns the device has been released.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

use crate::{
    audio::{CaptureDevice, CaptureSource},
    error::{check_window_size, Result, ScopeError},
    events::{EngineStatus, EngineStatusEvent},
    frame::Frame,
};

/// Broadcast channel capacity for status events.
const STATUS_BROADCAST_CAP: usize = 64;

/// Configuration consumed by the engine and the default capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct EngineConfig {
    /// Requested capture rate in Hz. Informational for the core: it only
    /// labels frequency bins. Default: 44100.
    pub sample_rate: u32,
    /// Analysis window size N; must be a power of two. Default: 1024.
    pub window_size: usize,
    /// Advisory upper bound on samples per capture read. Default: 1024.
    pub chunk_hint: usize,
    /// Longest a capture read may wait before reporting "no data".
    /// Bounds how quickly a stop request is observed. Default: 50.
    pub read_timeout_ms: u64,
    /// Exact input device name to open, if present.
    pub preferred_device: Option<String>,
    /// Prefer loopback-like inputs (system playback mix), falling back to the
    /// default input when none exists. Default: true.
    pub prefer_loopback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            window_size: 1024,
            chunk_hint: 1024,
            read_timeout_ms: 50,
            preferred_device: None,
            prefer_loopback: true,
        }
    }
}

impl EngineConfig {
    /// # Errors
    /// `ScopeError::InvalidWindowSize` unless `window_size` is a power of two.
    pub fn validate(&self) -> Result<()> {
        check_window_size(self.window_size)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

/// Update the status cell and broadcast the change.
pub(crate) fn set_status(
    status: &Mutex<EngineStatus>,
    status_tx: &broadcast::Sender<EngineStatusEvent>,
    new_status: EngineStatus,
    detail: Option<String>,
) {
    *status.lock() = new_status;
    let _ = status_tx.send(EngineStatusEvent {
        status: new_status,
        detail,
    });
}

/// The top-level engine handle.
///
/// `ScopeEngine` is `Send + Sync`; wrap it in an `Arc` to share it between a
/// UI thread and whatever drives start/stop.
pub struct ScopeEngine {
    config: EngineConfig,
    /// `true` while the worker should keep reading.
    running: Arc<AtomicBool>,
    /// Canonical status. Publishing a frame and accepting a stop both
    /// happen under this lock.
    status: Arc<Mutex<EngineStatus>>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    /// Latest-frame slot.
    frame_tx: Arc<watch::Sender<Option<Arc<Frame>>>>,
    /// Frame sequence counter, continues across restarts.
    seq: Arc<AtomicU64>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
    /// Worker thread handle. Also serialises `start`/`stop`.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScopeEngine {
    /// Create an idle engine.
    ///
    /// # Errors
    /// `ScopeError::InvalidWindowSize` if the configured window is not a
    /// power of two.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (status_tx, _) = broadcast::channel(STATUS_BROADCAST_CAP);
        let (frame_tx, _) = watch::channel(None);

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            status_tx,
            frame_tx: Arc::new(frame_tx),
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open `device` on a new capture worker and start publishing frames.
    ///
    /// Blocks until the device is confirmed open (or fails).
    ///
    /// # Errors
    /// - `ScopeError::AlreadyRunning` if capture is active.
    /// - `ScopeError::CaptureUnavailable` if the device could not be opened;
    ///   the engine does not enter Capturing.
    pub fn start<D: CaptureDevice>(&self, device: D) -> Result<()> {
        let mut worker = self.worker.lock();
        if self.status().is_active() || self.running.load(Ordering::SeqCst) {
            return Err(ScopeError::AlreadyRunning);
        }
        if let Some(previous) = worker.take() {
            if previous.join().is_err() {
                error!("previous capture worker panicked");
            }
        }

        self.diagnostics.reset();
        self.running.store(true, Ordering::SeqCst);

        let ctx = pipeline::PipelineContext {
            window_size: self.config.window_size,
            running: Arc::clone(&self.running),
            status: Arc::clone(&self.status),
            status_tx: self.status_tx.clone(),
            frame_tx: Arc::clone(&self.frame_tx),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        // One-shot: worker reports the opened sample rate or the open error.
        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<u32>>(1);
        let running = Arc::clone(&self.running);

        let spawned = std::thread::Builder::new()
            .name("wavescope-capture".into())
            .spawn(move || {
                // ── Open capture on THIS thread (cpal::Stream is !Send) ──
                let source = match device.start() {
                    Ok(source) => source,
                    Err(e) => {
                        running.store(false, Ordering::SeqCst);
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };

                let sample_rate = source.sample_rate();
                set_status(&ctx.status, &ctx.status_tx, EngineStatus::Capturing, None);
                let _ = open_tx.send(Ok(sample_rate));

                pipeline::run(ctx, source);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        match open_rx.recv() {
            Ok(Ok(sample_rate)) => {
                info!(
                    sample_rate,
                    window_size = self.config.window_size,
                    "engine started — capturing"
                );
                *worker = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                error!(error = %e, "capture failed to start");
                Err(e)
            }
            Err(_) => {
                // Channel closed without a message: the worker panicked while opening.
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(ScopeError::Other(anyhow::anyhow!(
                    "capture worker died before opening the device"
                )))
            }
        }
    }

    /// Open the default cpal input described by this engine's config.
    #[cfg(feature = "audio-cpal")]
    pub fn start_default(&self) -> Result<()> {
        self.start(crate::audio::CpalDevice::from_config(&self.config))
    }

    /// Stop capture and wait for the worker to release the device.
    ///
    /// No frame is published once this has accepted the request.
    ///
    /// # Errors
    /// `ScopeError::NotRunning` unless the engine is Capturing.
    pub fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        {
            let mut status = self.status.lock();
            if *status != EngineStatus::Capturing {
                return Err(ScopeError::NotRunning);
            }
            *status = EngineStatus::Stopping;
            self.running.store(false, Ordering::SeqCst);
        }
        let _ = self.status_tx.send(EngineStatusEvent {
            status: EngineStatus::Stopping,
            detail: None,
        });
        info!("engine stop requested");

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                error!("capture worker panicked during shutdown");
                set_status(
                    &self.status,
                    &self.status_tx,
                    EngineStatus::Stopped,
                    Some("capture worker panicked".into()),
                );
            }
        }
        Ok(())
    }

    /// Current engine status.
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to the latest-frame slot.
    ///
    /// Receivers see only the most recent frame; clone the `Arc` out of
    /// `borrow()` rather than holding the borrow while rendering.
    pub fn subscribe_frames(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frame_tx.subscribe()
    }

    /// Most recently published frame, if any.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frame_tx.borrow().clone()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }
}

impl Drop for ScopeEngine {
    fn drop(&mut self) {
        if self.status() == EngineStatus::Capturing {
            let _ = self.stop();
        }
        if let Some(handle) = self.worker.get_mut().take() {
            self.running.store(false, Ordering::SeqCst);
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::scripted::{ScriptedDevice, Step};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn small_config() -> EngineConfig {
        EngineConfig {
            window_size: 8,
            read_timeout_ms: 5,
            ..EngineConfig::default()
        }
    }

    fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
        let start = Instant::now();
        while !cond() {
            if start.elapsed() > Duration::from_secs(2) {
                panic!("timed out waiting for {what}");
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn new_rejects_invalid_window_size() {
        let config = EngineConfig {
            window_size: 1000,
            ..EngineConfig::default()
        };
        assert!(matches!(
            ScopeEngine::new(config),
            Err(ScopeError::InvalidWindowSize(1000))
        ));
    }

    #[test]
    fn config_defaults_match_capture_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.window_size, 1024);
        assert_eq!(config.read_timeout(), Duration::from_millis(50));
        assert!(config.prefer_loopback, "playback capture is the default");
        assert!(config.preferred_device.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_deserializes_partial_json_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"windowSize": 2048, "preferLoopback": false}"#).unwrap();
        assert_eq!(config.window_size, 2048);
        assert!(!config.prefer_loopback);
        assert_eq!(config.sample_rate, 44_100);
    }

    #[test]
    fn start_failure_never_enters_capturing() {
        let engine = ScopeEngine::new(small_config()).unwrap();
        let mut status_rx = engine.subscribe_status();

        let err = engine.start(ScriptedDevice::unavailable()).unwrap_err();
        assert!(matches!(err, ScopeError::CaptureUnavailable(_)));
        assert_eq!(engine.status(), EngineStatus::Idle);
        assert!(status_rx.try_recv().is_err(), "no status change expected");
        assert!(matches!(engine.stop(), Err(ScopeError::NotRunning)));
    }

    #[test]
    fn start_publish_stop_lifecycle() {
        let engine = ScopeEngine::new(small_config()).unwrap();
        let stops = Arc::new(AtomicUsize::new(0));
        let device = ScriptedDevice::new(
            vec![Step::Samples(vec![0, 1, 0, -1, 0, 1, 0, -1])],
            Arc::clone(&stops),
        );

        engine.start(device).unwrap();
        assert_eq!(engine.status(), EngineStatus::Capturing);
        assert!(matches!(
            engine.start(ScriptedDevice::idle()),
            Err(ScopeError::AlreadyRunning)
        ));

        wait_for("first frame", || engine.latest_frame().is_some());
        let frame = engine.latest_frame().unwrap();
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.spectrum.peak_bin(), Some(2));

        engine.stop().unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.latest_frame().unwrap().seq, 0);
        assert_eq!(engine.diagnostics_snapshot().frames_published, 1);
        assert!(matches!(engine.stop(), Err(ScopeError::NotRunning)));
    }

    #[test]
    fn status_events_follow_state_machine() {
        let engine = ScopeEngine::new(small_config()).unwrap();
        let mut rx = engine.subscribe_status();

        engine.start(ScriptedDevice::idle()).unwrap();
        engine.stop().unwrap();

        let seen: Vec<EngineStatus> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.status)
            .collect();
        assert_eq!(
            seen,
            vec![
                EngineStatus::Capturing,
                EngineStatus::Stopping,
                EngineStatus::Stopped
            ]
        );
    }

    #[test]
    fn capture_error_stops_engine_and_releases_source() {
        let engine = ScopeEngine::new(small_config()).unwrap();
        let mut rx = engine.subscribe_status();
        let stops = Arc::new(AtomicUsize::new(0));
        let device = ScriptedDevice::new(
            vec![
                Step::Samples(vec![5; 8]),
                Step::Fail("device unplugged".into()),
            ],
            Arc::clone(&stops),
        );

        engine.start(device).unwrap();
        wait_for("stopped status", || engine.status() == EngineStatus::Stopped);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        let events: Vec<EngineStatusEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let last = events.last().expect("status events");
        assert_eq!(last.status, EngineStatus::Stopped);
        assert!(last
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("device unplugged"));
        assert!(!events.iter().any(|e| e.status == EngineStatus::Stopping));

        assert!(matches!(engine.stop(), Err(ScopeError::NotRunning)));
    }

    #[test]
    fn stopped_engine_can_restart() {
        let engine = ScopeEngine::new(small_config()).unwrap();
        engine
            .start(ScriptedDevice::new(
                vec![Step::Samples(vec![1; 8])],
                Arc::new(AtomicUsize::new(0)),
            ))
            .unwrap();
        wait_for("first session frame", || engine.latest_frame().is_some());
        engine.stop().unwrap();

        engine
            .start(ScriptedDevice::new(
                vec![Step::Samples(vec![2; 8])],
                Arc::new(AtomicUsize::new(0)),
            ))
            .unwrap();
        wait_for("second session frame", || {
            engine.latest_frame().map(|f| f.seq) == Some(1)
        });
        engine.stop().unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn dropping_a_running_engine_releases_capture() {
        let stops = Arc::new(AtomicUsize::new(0));
        {
            let engine = ScopeEngine::new(small_config()).unwrap();
            engine
                .start(ScriptedDevice::new(Vec::new(), Arc::clone(&stops)))
                .unwrap();
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
