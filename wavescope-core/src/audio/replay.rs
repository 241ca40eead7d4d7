//! Replay capture: feeds recorded audio through the pipeline as if it were
//! live input.
//!
//! Sources are a WAV file (decoded with `hound`, any PCM depth or float,
//! down-mixed to mono i16) or an in-memory sample vector. Reads can be paced
//! to real time so consumers see the same frame cadence a device would give.
//! Running out of samples ends the stream.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::convert::{downmix_into, int_to_pcm16};
use super::{CaptureDevice, CaptureSource};
use crate::buffering::chunk::Chunk;
use crate::error::{Result, ScopeError};

#[derive(Debug, Clone)]
enum ReplayInput {
    Wav(PathBuf),
    Samples { samples: Vec<i16>, sample_rate: u32 },
}

/// Recorded audio waiting to be opened as a capture source.
#[derive(Debug, Clone)]
pub struct ReplayDevice {
    input: ReplayInput,
    chunk_size: usize,
    paced: bool,
    looped: bool,
}

impl ReplayDevice {
    /// Replay a WAV file in chunks of `chunk_size` samples.
    pub fn from_wav(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            input: ReplayInput::Wav(path.into()),
            chunk_size: chunk_size.max(1),
            paced: false,
            looped: false,
        }
    }

    /// Replay mono samples already in memory.
    pub fn from_samples(samples: Vec<i16>, sample_rate: u32, chunk_size: usize) -> Self {
        Self {
            input: ReplayInput::Samples {
                samples,
                sample_rate,
            },
            chunk_size: chunk_size.max(1),
            paced: false,
            looped: false,
        }
    }

    /// Sleep between reads so chunks arrive at the recording's real rate.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Restart from the beginning instead of ending the stream.
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }
}

fn decode_wav(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| {
        ScopeError::CaptureUnavailable(format!("cannot open {}: {e}", path.display()))
    })?;
    let spec = reader.spec();

    let interleaved: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| int_to_pcm16(v, spec.bits_per_sample)))
            .collect::<std::result::Result<_, _>>(),
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16))
            .collect::<std::result::Result<_, _>>(),
    }
    .map_err(|e| ScopeError::CaptureUnavailable(format!("cannot decode {}: {e}", path.display())))?;

    let mut mono = Vec::with_capacity(interleaved.len() / usize::from(spec.channels.max(1)));
    downmix_into(&interleaved, usize::from(spec.channels), &mut mono);

    info!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = mono.len(),
        "loaded replay recording"
    );
    Ok((mono, spec.sample_rate))
}

impl CaptureDevice for ReplayDevice {
    type Source = ReplayCapture;

    fn start(self) -> Result<ReplayCapture> {
        let (samples, sample_rate) = match self.input {
            ReplayInput::Wav(path) => decode_wav(&path)?,
            ReplayInput::Samples {
                samples,
                sample_rate,
            } => (samples, sample_rate),
        };

        if sample_rate == 0 {
            return Err(ScopeError::CaptureUnavailable(
                "replay sample rate must be nonzero".into(),
            ));
        }

        Ok(ReplayCapture {
            samples,
            position: 0,
            sample_rate,
            chunk_size: self.chunk_size,
            next_due: self.paced.then(Instant::now),
            looped: self.looped,
            stopped: false,
        })
    }
}

/// An open replay session.
#[derive(Debug)]
pub struct ReplayCapture {
    samples: Vec<i16>,
    position: usize,
    sample_rate: u32,
    chunk_size: usize,
    /// Deadline for the next chunk when paced.
    next_due: Option<Instant>,
    looped: bool,
    stopped: bool,
}

impl ReplayCapture {
    /// Samples not yet delivered in the current pass.
    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.position)
    }
}

impl CaptureSource for ReplayCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self) -> Result<Chunk> {
        if self.stopped {
            return Err(ScopeError::CaptureStream("replay stopped".into()));
        }
        if self.position >= self.samples.len() {
            if self.looped && !self.samples.is_empty() {
                debug!("replay looping to start");
                self.position = 0;
            } else {
                return Err(ScopeError::CaptureStream("end of recording".into()));
            }
        }

        let end = (self.position + self.chunk_size).min(self.samples.len());
        let chunk = Chunk::new(self.samples[self.position..end].to_vec(), self.sample_rate);
        self.position = end;

        if let Some(due) = self.next_due {
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
            let step = Duration::from_secs_f64(chunk.duration_secs());
            self.next_due = Some(due.max(now) + step);
        }

        Ok(chunk)
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.samples = Vec::new();
            self.position = 0;
            debug!("replay source released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(samples: Vec<i16>, chunk: usize) -> ReplayCapture {
        ReplayDevice::from_samples(samples, 8_000, chunk)
            .start()
            .expect("open replay")
    }

    #[test]
    fn delivers_chunks_then_ends_stream() {
        let mut capture = open((1..=10).collect(), 4);
        assert_eq!(capture.read().unwrap().samples, vec![1, 2, 3, 4]);
        assert_eq!(capture.read().unwrap().samples, vec![5, 6, 7, 8]);
        assert_eq!(capture.read().unwrap().samples, vec![9, 10]);
        assert_eq!(capture.remaining(), 0);
        assert!(matches!(capture.read(), Err(ScopeError::CaptureStream(_))));
    }

    #[test]
    fn looped_replay_restarts() {
        let mut capture = ReplayDevice::from_samples(vec![1, 2, 3], 8_000, 2)
            .looped(true)
            .start()
            .unwrap();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.extend(capture.read().unwrap().samples);
        }
        assert_eq!(seen, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn stop_is_idempotent_and_ends_reads() {
        let mut capture = open(vec![0; 100], 10);
        capture.stop();
        capture.stop();
        assert!(matches!(capture.read(), Err(ScopeError::CaptureStream(_))));
    }

    #[test]
    fn paced_replay_takes_real_time() {
        // 4 chunks of 80 samples at 8 kHz = 10 ms each.
        let mut capture = ReplayDevice::from_samples(vec![0; 320], 8_000, 80)
            .paced(true)
            .start()
            .unwrap();
        let start = Instant::now();
        for _ in 0..4 {
            capture.read().unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(25), "{:?}", start.elapsed());
    }

    #[test]
    fn zero_sample_rate_is_unavailable() {
        let err = ReplayDevice::from_samples(vec![1], 0, 1).start().unwrap_err();
        assert!(matches!(err, ScopeError::CaptureUnavailable(_)));
    }

    #[test]
    fn missing_wav_is_unavailable() {
        let err = ReplayDevice::from_wav("/nonexistent/wavescope/missing.wav", 256)
            .start()
            .unwrap_err();
        assert!(matches!(err, ScopeError::CaptureUnavailable(_)));
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let path = std::env::temp_dir().join(format!(
            "wavescope-replay-{}-stereo.wav",
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (l, r) in [(100i16, 300i16), (-200, -400), (0, 10)] {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();

        let mut capture = ReplayDevice::from_wav(&path, 16).start().unwrap();
        let chunk = capture.read().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(capture.sample_rate(), 22_050);
        assert_eq!(chunk.samples, vec![200, -300, 5]);
    }
}
