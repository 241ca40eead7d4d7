//! Live capture via cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** block or perform I/O, and only allocates while its
//! down-mix buffer grows to the device block size. It converts to mono i16
//! and pushes into an SPSC ring; the capture worker drains that ring in
//! [`CpalCapture::read`].
//!
//! Samples the ring cannot take are counted and reported from the worker
//! side, never logged from the callback.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms. [`CpalDevice`] is `Send` and
//! is opened on the capture worker, which also drops the stream.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, OnceLock,
};
use std::time::{Duration, Instant};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::convert::{downmix_into, ToPcm16};
use super::device::is_loopback_like_name;
use super::{CaptureDevice, CaptureSource};
use crate::buffering::{
    chunk::Chunk, create_sample_ring, Consumer, Producer, SampleConsumer, SampleProducer,
};
use crate::engine::EngineConfig;
use crate::error::{Result, ScopeError};

/// Poll interval while waiting for the callback to deliver samples.
const DEFAULT_POLL_MS: u64 = 5;

fn poll_interval() -> Duration {
    static POLL_MS: OnceLock<u64> = OnceLock::new();
    Duration::from_millis(*POLL_MS.get_or_init(|| {
        std::env::var("WAVESCOPE_CAPTURE_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_POLL_MS)
    }))
}

/// Parameters for opening a cpal input stream.
#[derive(Debug, Clone)]
pub struct CpalDevice {
    /// Exact device name to open; falls back when not found.
    pub preferred_device_name: Option<String>,
    /// Pick a loopback-like input (system output mix) before the default.
    pub prefer_loopback: bool,
    /// Requested sample rate in Hz; the device default is used if unsupported.
    pub sample_rate: u32,
    /// Upper bound on samples returned per read.
    pub chunk_hint: usize,
    /// Longest a read waits before returning an empty chunk.
    pub read_timeout: Duration,
}

impl CpalDevice {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            preferred_device_name: config.preferred_device.clone(),
            prefer_loopback: config.prefer_loopback,
            sample_rate: config.sample_rate,
            chunk_hint: config.chunk_hint,
            read_timeout: config.read_timeout(),
        }
    }

    fn select_device(&self, host: &cpal::Host) -> Result<Device> {
        let mut candidates: Vec<Device> = match host.input_devices() {
            Ok(devices) => devices.collect(),
            Err(e) => {
                warn!("failed to list input devices: {e}");
                Vec::new()
            }
        };

        if let Some(preferred) = self.preferred_device_name.as_deref() {
            if let Some(idx) = candidates
                .iter()
                .position(|d| d.name().map(|n| n == preferred).unwrap_or(false))
            {
                return Ok(candidates.swap_remove(idx));
            }
            warn!("preferred input device '{preferred}' not found, falling back");
        }

        if self.prefer_loopback {
            if let Some(idx) = candidates.iter().position(|d| {
                d.name()
                    .map(|n| is_loopback_like_name(&n))
                    .unwrap_or(false)
            }) {
                return Ok(candidates.swap_remove(idx));
            }
            warn!("no loopback-like input device found, falling back to default input");
        }

        if let Some(default) = host.default_input_device() {
            return Ok(default);
        }

        if candidates.is_empty() {
            return Err(ScopeError::CaptureUnavailable(
                "no audio input device found".into(),
            ));
        }
        warn!("no default input device, falling back to first available input");
        Ok(candidates.swap_remove(0))
    }
}

impl CaptureDevice for CpalDevice {
    type Source = CpalCapture;

    fn start(self) -> Result<CpalCapture> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;
        let device_name = device.name().unwrap_or_default();

        let default = device
            .default_input_config()
            .map_err(|e| ScopeError::CaptureUnavailable(e.to_string()))?;
        let sample_format = default.sample_format();

        let supports_requested = device
            .supported_input_configs()
            .map(|mut ranges| {
                ranges.any(|r| {
                    r.sample_format() == sample_format
                        && r.min_sample_rate().0 <= self.sample_rate
                        && self.sample_rate <= r.max_sample_rate().0
                })
            })
            .unwrap_or(false);

        let sample_rate = if supports_requested {
            self.sample_rate
        } else {
            warn!(
                requested = self.sample_rate,
                device_default = default.sample_rate().0,
                "requested sample rate unsupported, using device default"
            );
            default.sample_rate().0
        };
        let channels = default.channels();

        info!(
            device = device_name.as_str(),
            sample_rate,
            channels,
            format = ?sample_format,
            "opening input device"
        );

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = create_sample_ring();
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(Mutex::new(None));
        let dropped = Arc::new(AtomicUsize::new(0));

        let callback = CallbackState {
            producer,
            running: Arc::clone(&running),
            dropped: Arc::clone(&dropped),
            channels: usize::from(channels),
            mix_buf: Vec::new(),
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, callback, &failed),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, callback, &failed),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, callback, &failed),
            SampleFormat::U8 => build_stream::<u8>(&device, &config, callback, &failed),
            fmt => {
                return Err(ScopeError::CaptureUnavailable(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| ScopeError::CaptureUnavailable(e.to_string()))?;

        Ok(CpalCapture {
            stream: Some(stream),
            consumer,
            running,
            failed,
            dropped,
            sample_rate,
            scratch: vec![0; self.chunk_hint.max(1)],
            read_timeout: self.read_timeout,
        })
    }
}

/// Everything the audio callback owns.
struct CallbackState {
    producer: SampleProducer,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    channels: usize,
    mix_buf: Vec<i16>,
}

impl CallbackState {
    fn push<T: ToPcm16>(&mut self, data: &[T]) {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        downmix_into(data, self.channels, &mut self.mix_buf);
        let written = self.producer.push_slice(&self.mix_buf);
        if written < self.mix_buf.len() {
            self.dropped
                .fetch_add(self.mix_buf.len() - written, Ordering::Relaxed);
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut state: CallbackState,
    failed: &Arc<Mutex<Option<String>>>,
) -> Result<Stream>
where
    T: SizedSample + ToPcm16,
{
    let failed = Arc::clone(failed);
    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| state.push(data),
            move |err| {
                error!("audio stream error: {err}");
                failed.lock().get_or_insert_with(|| err.to_string());
            },
            None,
        )
        .map_err(|e| ScopeError::CaptureUnavailable(e.to_string()))
}

/// An open cpal input stream plus the worker end of its sample ring.
pub struct CpalCapture {
    /// `None` once stopped.
    stream: Option<Stream>,
    consumer: SampleConsumer,
    /// Shared with the callback; `false` makes it a no-op.
    running: Arc<AtomicBool>,
    /// First stream error reported by cpal.
    failed: Arc<Mutex<Option<String>>>,
    dropped: Arc<AtomicUsize>,
    sample_rate: u32,
    scratch: Vec<i16>,
    read_timeout: Duration,
}

impl CpalCapture {
    fn report_dropped(&self) {
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped, "sample ring full: capture worker fell behind");
        }
    }
}

impl CaptureSource for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self) -> Result<Chunk> {
        if self.stream.is_none() {
            return Err(ScopeError::CaptureStream("capture already stopped".into()));
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            if let Some(message) = self.failed.lock().take() {
                return Err(ScopeError::CaptureStream(message));
            }

            let n = self.consumer.pop_slice(&mut self.scratch);
            if n > 0 {
                self.report_dropped();
                return Ok(Chunk::new(self.scratch[..n].to_vec(), self.sample_rate));
            }

            if Instant::now() >= deadline {
                debug!("no samples within read timeout");
                return Ok(Chunk::empty(self.sample_rate));
            }
            std::thread::sleep(poll_interval());
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("failed to pause input stream: {e}");
            }
            drop(stream);
            info!("input stream released");
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
