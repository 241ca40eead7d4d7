//! Blocking pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Read one chunk from the capture source (bounded wait)
//! 2. Empty chunk → count it, go back to 1
//! 3. Append to the rolling window, take an N-sample snapshot
//! 4. FFT the snapshot → N/2 magnitudes
//! 5. Publish Frame { waveform, spectrum } into the latest-frame slot
//! ```
//!
//! The loop owns the rolling window and the capture source outright; the
//! only shared state is the status cell, the frame slot and the counters.
//! It runs on the dedicated capture thread spawned by
//! [`ScopeEngine::start`](super::ScopeEngine::start).

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use super::set_status;
use crate::{
    audio::CaptureSource,
    buffering::{RollingWindow, Snapshot},
    events::{EngineStatus, EngineStatusEvent},
    frame::{Frame, SpectralFrame, WaveformFrame},
    spectrum::SpectrumAnalyzer,
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub reads: AtomicUsize,
    pub empty_reads: AtomicUsize,
    pub read_errors: AtomicUsize,
    pub samples_in: AtomicUsize,
    pub frames_published: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.empty_reads.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.samples_in.store(0, Ordering::Relaxed);
        self.frames_published.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            samples_in: self.samples_in.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub reads: usize,
    pub empty_reads: usize,
    pub read_errors: usize,
    pub samples_in: usize,
    pub frames_published: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub window_size: usize,
    pub running: Arc<AtomicBool>,
    pub status: Arc<Mutex<EngineStatus>>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub frame_tx: Arc<watch::Sender<Option<Arc<Frame>>>>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Releases the capture source and settles the status on every exit path,
/// including a panic inside the loop.
struct ExitGuard<'a, S: CaptureSource> {
    ctx: &'a PipelineContext,
    source: S,
    /// Why the stream ended, when it was not a requested stop.
    end_reason: Option<String>,
}

impl<S: CaptureSource> Drop for ExitGuard<'_, S> {
    fn drop(&mut self) {
        self.source.stop();
        self.ctx.running.store(false, Ordering::SeqCst);
        set_status(
            &self.ctx.status,
            &self.ctx.status_tx,
            EngineStatus::Stopped,
            self.end_reason.take(),
        );
    }
}

/// Run the blocking pipeline until `ctx.running` becomes false or the
/// capture source fails. `source` must already be open.
pub fn run<S: CaptureSource>(ctx: PipelineContext, source: S) {
    {
        let mut guard = ExitGuard {
            ctx: &ctx,
            source,
            end_reason: None,
        };
        capture_loop(&mut guard);
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        reads = snap.reads,
        empty_reads = snap.empty_reads,
        read_errors = snap.read_errors,
        samples_in = snap.samples_in,
        frames_published = snap.frames_published,
        "pipeline stopped — diagnostics"
    );
}

fn capture_loop<S: CaptureSource>(guard: &mut ExitGuard<'_, S>) {
    let ctx = guard.ctx;

    let mut window = match RollingWindow::new(ctx.window_size) {
        Ok(w) => w,
        Err(e) => {
            error!("failed to create rolling window: {e}");
            guard.end_reason = Some(e.to_string());
            return;
        }
    };
    let mut analyzer = match SpectrumAnalyzer::new(ctx.window_size, guard.source.sample_rate()) {
        Ok(a) => a,
        Err(e) => {
            error!("failed to plan FFT: {e}");
            guard.end_reason = Some(e.to_string());
            return;
        }
    };

    info!(
        window_size = ctx.window_size,
        sample_rate = analyzer.sample_rate(),
        "pipeline started"
    );

    loop {
        // ── 0. Check running flag ─────────────────────────────────────────
        if !ctx.running.load(Ordering::SeqCst) {
            break;
        }

        // ── 1. Read from capture ──────────────────────────────────────────
        let chunk = match guard.source.read() {
            Ok(chunk) => chunk,
            Err(e) => {
                ctx.diagnostics.read_errors.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "capture stream ended");
                guard.end_reason = Some(format!("stream ended: {e}"));
                break;
            }
        };
        ctx.diagnostics.reads.fetch_add(1, Ordering::Relaxed);

        if chunk.is_empty() {
            ctx.diagnostics.empty_reads.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        ctx.diagnostics
            .samples_in
            .fetch_add(chunk.len(), Ordering::Relaxed);

        if chunk.sample_rate != 0 && chunk.sample_rate != analyzer.sample_rate() {
            analyzer.set_sample_rate(chunk.sample_rate);
        }

        // ── 2. Window + spectrum ──────────────────────────────────────────
        window.append(&chunk.samples);
        let snapshot = window.snapshot();
        let magnitudes = analyzer.analyze(&snapshot);

        // ── 3. Publish ────────────────────────────────────────────────────
        let frame = FrameParts {
            snapshot,
            magnitudes,
            sample_rate: analyzer.sample_rate(),
            bin_width_hz: analyzer.bin_width_hz(),
        };
        if !publish(ctx, frame) {
            debug!("stop observed before publish, dropping frame");
            break;
        }
    }
}

struct FrameParts {
    snapshot: Snapshot,
    magnitudes: Vec<f32>,
    sample_rate: u32,
    bin_width_hz: f32,
}

/// Publish one frame, unless a stop has been accepted.
///
/// Holds the status lock across the check and the slot write, so a frame can
/// never land after `stop()` has moved the engine out of Capturing.
fn publish(ctx: &PipelineContext, parts: FrameParts) -> bool {
    let status = ctx.status.lock();
    if *status != EngineStatus::Capturing {
        return false;
    }

    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let frame = Frame {
        seq,
        sample_rate: parts.sample_rate,
        waveform: WaveformFrame::new(parts.snapshot),
        spectrum: SpectralFrame::new(parts.magnitudes, parts.bin_width_hz),
    };
    if seq % 100 == 0 {
        debug!(
            seq,
            peak = frame.waveform.scale(),
            peak_hz = ?frame.spectrum.peak_frequency(),
            "frame published"
        );
    }
    ctx.frame_tx.send_replace(Some(Arc::new(frame)));
    ctx.diagnostics
        .frames_published
        .fetch_add(1, Ordering::Relaxed);
    true
}
