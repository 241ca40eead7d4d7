//! Scripted capture double for engine and pipeline unit tests.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use super::{CaptureDevice, CaptureSource};
use crate::buffering::chunk::Chunk;
use crate::error::{Result, ScopeError};

pub(crate) const SCRIPTED_RATE: u32 = 8_000;

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Samples(Vec<i16>),
    Empty,
    Fail(String),
}

pub(crate) struct ScriptedDevice {
    script: Vec<Step>,
    stops: Arc<AtomicUsize>,
    unavailable: bool,
}

impl ScriptedDevice {
    /// Plays `script`, then idles with empty reads.
    pub(crate) fn new(script: Vec<Step>, stops: Arc<AtomicUsize>) -> Self {
        Self {
            script,
            stops,
            unavailable: false,
        }
    }

    pub(crate) fn idle() -> Self {
        Self::new(Vec::new(), Arc::new(AtomicUsize::new(0)))
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::idle()
        }
    }
}

impl CaptureDevice for ScriptedDevice {
    type Source = ScriptedCapture;

    fn start(self) -> Result<ScriptedCapture> {
        if self.unavailable {
            return Err(ScopeError::CaptureUnavailable("access denied".into()));
        }
        Ok(ScriptedCapture {
            script: self.script.into(),
            stops: self.stops,
            stopped: false,
        })
    }
}

pub(crate) struct ScriptedCapture {
    script: VecDeque<Step>,
    stops: Arc<AtomicUsize>,
    stopped: bool,
}

impl CaptureSource for ScriptedCapture {
    fn sample_rate(&self) -> u32 {
        SCRIPTED_RATE
    }

    fn read(&mut self) -> Result<Chunk> {
        match self.script.pop_front() {
            Some(Step::Samples(samples)) => Ok(Chunk::new(samples, SCRIPTED_RATE)),
            Some(Step::Empty) => Ok(Chunk::empty(SCRIPTED_RATE)),
            Some(Step::Fail(message)) => Err(ScopeError::CaptureStream(message)),
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Ok(Chunk::empty(SCRIPTED_RATE))
            }
        }
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
