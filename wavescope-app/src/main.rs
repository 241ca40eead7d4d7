//! wavescope terminal host.
//!
//! Loads settings, starts the engine on the default input (or a WAV replay)
//! and redraws the latest frame at a fixed rate until Ctrl-C, the requested
//! duration, or the capture stream ending.

mod render;
mod settings;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use settings::{default_settings_path, load_settings, save_settings};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use wavescope_core::{
    list_input_devices, EngineStatus, EngineStatusEvent, ReplayDevice, ScopeEngine, ScopeError,
};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Default)]
struct Args {
    settings_path: Option<PathBuf>,
    wav: Option<PathBuf>,
    loop_wav: bool,
    list_devices: bool,
    save_settings: bool,
    duration: Option<Duration>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --settings");
                };
                parsed.settings_path = Some(PathBuf::from(v));
            }
            "--wav" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --wav");
                };
                parsed.wav = Some(PathBuf::from(v));
            }
            "--loop" => parsed.loop_wav = true,
            "--list-devices" => parsed.list_devices = true,
            "--save-settings" => parsed.save_settings = true,
            "--seconds" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --seconds");
                };
                let secs = v
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .with_context(|| format!("invalid value for --seconds: {v}"))?;
                parsed.duration = Some(Duration::from_secs_f64(secs));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: wavescope [--settings <file.json>] [--save-settings] \\
  [--wav <file.wav> [--loop]] [--seconds <n>] [--list-devices]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(parsed)
}

/// What the redraw loop does with one status event.
#[derive(Debug, PartialEq)]
enum StatusAction {
    Continue,
    /// Capture is over; carries the reason when the stream ended on its own.
    Exit(Option<String>),
}

/// `current` is consulted after a lag, since the skipped events may have
/// included `Stopped`.
fn status_action(
    event: Result<EngineStatusEvent, RecvError>,
    current: EngineStatus,
) -> StatusAction {
    match event {
        Ok(ev) if ev.status == EngineStatus::Stopped => StatusAction::Exit(ev.detail),
        Ok(_) => StatusAction::Continue,
        Err(RecvError::Lagged(_)) if current == EngineStatus::Stopped => StatusAction::Exit(None),
        Err(RecvError::Lagged(_)) => StatusAction::Continue,
        Err(RecvError::Closed) => StatusAction::Exit(None),
    }
}

/// Stop capture if it is still running. A stream that already ended on its
/// own is not an error.
fn shut_down(engine: &ScopeEngine) -> Result<(), ScopeError> {
    match engine.stop() {
        Ok(()) | Err(ScopeError::NotRunning) => Ok(()),
        Err(e) => Err(e),
    }
}

fn print_devices() {
    let devices = list_input_devices();
    if devices.is_empty() {
        println!("no input devices found");
        return;
    }
    for device in devices {
        println!(
            "{}{}{}  rate={} ch={}",
            device.name,
            if device.is_default { " [default]" } else { "" },
            if device.is_loopback_like { " [loopback]" } else { "" },
            device
                .default_sample_rate
                .map_or_else(|| "?".into(), |r| r.to_string()),
            device.channels.map_or_else(|| "?".into(), |c| c.to_string()),
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wavescope=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.list_devices {
        print_devices();
        return Ok(());
    }

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = args.settings_path.clone().unwrap_or_else(default_settings_path);
    let settings = load_settings(&settings_path);
    if args.save_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("writing {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    // ── Engine ────────────────────────────────────────────────────────────
    let engine = ScopeEngine::new(settings.engine.clone())?;
    // Subscribe before starting: a short replay can end before start() returns.
    let mut status = engine.subscribe_status();
    match &args.wav {
        Some(path) => engine.start(
            ReplayDevice::from_wav(path, settings.engine.chunk_hint)
                .paced(true)
                .looped(args.loop_wav),
        )?,
        None => engine.start_default()?,
    }
    info!(window_size = settings.engine.window_size, "wavescope running");

    let mut frames = engine.subscribe_frames();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(
        1.0 / f64::from(settings.refresh_hz),
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match args.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("requested duration elapsed");
                break;
            }
            event = status.recv() => {
                if let StatusAction::Exit(detail) = status_action(event, engine.status()) {
                    if let Some(detail) = detail {
                        warn!("capture ended: {detail}");
                    }
                    break;
                }
            }
            _ = ticker.tick() => {
                if !frames.has_changed().unwrap_or(false) {
                    continue;
                }
                let latest = frames.borrow_and_update().clone();
                if let Some(frame) = latest {
                    let screen = render::render_frame(
                        &frame,
                        settings.bar_count,
                        settings.bar_height,
                        settings.show_waveform,
                    );
                    let mut stdout = std::io::stdout().lock();
                    write!(stdout, "{CLEAR_SCREEN}{screen}")?;
                    stdout.flush()?;
                }
            }
        }
    }

    shut_down(&engine)?;
    let diagnostics = engine.diagnostics_snapshot();
    info!(
        diagnostics = %serde_json::to_string(&diagnostics)?,
        "wavescope stopped"
    );
    Ok(())
}
