//! Fixed-capacity rolling window over the most recent samples.
//!
//! Backed by a circular buffer: `append` advances a head index modulo the
//! capacity and never reallocates, `snapshot` copies the logical contents out
//! oldest-first into fresh immutable storage.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::{check_window_size, Result};

/// Immutable, independently owned copy of a [`RollingWindow`].
///
/// Always exactly `capacity` samples long. Cloning shares the storage, so a
/// snapshot can back both the FFT input and the published waveform frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    samples: Arc<[i16]>,
}

impl Snapshot {
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Largest absolute amplitude in the snapshot (0 for silence).
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

impl Deref for Snapshot {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        &self.samples
    }
}

impl From<Vec<i16>> for Snapshot {
    fn from(samples: Vec<i16>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

/// Rolling window holding the last `capacity` samples seen, oldest first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buf: Vec<i16>,
    /// Next write position.
    head: usize,
    /// Samples currently held, saturates at capacity.
    len: usize,
    total_appended: u64,
}

impl RollingWindow {
    /// Create an empty window.
    ///
    /// # Errors
    /// `ScopeError::InvalidWindowSize` unless `capacity` is a power of two.
    pub fn new(capacity: usize) -> Result<Self> {
        check_window_size(capacity)?;
        Ok(Self {
            buf: vec![0; capacity],
            head: 0,
            len: 0,
            total_appended: 0,
        })
    }

    /// Append a chunk, discarding the oldest samples beyond capacity.
    ///
    /// Only the last `capacity` samples of an oversized chunk are kept.
    /// An empty chunk is a no-op.
    pub fn append(&mut self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        self.total_appended += samples.len() as u64;

        let cap = self.buf.len();
        let tail = &samples[samples.len().saturating_sub(cap)..];

        let first = (cap - self.head).min(tail.len());
        self.buf[self.head..self.head + first].copy_from_slice(&tail[..first]);
        let wrapped = tail.len() - first;
        self.buf[..wrapped].copy_from_slice(&tail[first..]);

        self.head = (self.head + tail.len()) & (cap - 1);
        self.len = (self.len + tail.len()).min(cap);
    }

    /// Copy the current contents out, oldest first, zero-padded at the front
    /// until `capacity` samples have been appended.
    pub fn snapshot(&self) -> Snapshot {
        let cap = self.buf.len();
        let mut out = vec![0i16; cap];

        let pad = cap - self.len;
        let oldest = (self.head + cap - self.len) & (cap - 1);
        let first = (cap - oldest).min(self.len);
        out[pad..pad + first].copy_from_slice(&self.buf[oldest..oldest + first]);
        out[pad + first..].copy_from_slice(&self.buf[..self.len - first]);

        Snapshot::from(out)
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Total samples ever appended, including those since discarded.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.head = 0;
        self.len = 0;
        self.total_appended = 0;
    }
}
