//! Typed sample chunk handed from a capture source to the pipeline.

/// A contiguous block of mono 16-bit PCM samples produced by one capture read.
///
/// Owned by the pipeline once `read` returns; capture sources copy out of
/// their device storage before handing it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Mono i16 samples in chronological order.
    pub samples: Vec<i16>,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
}

impl Chunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A zero-length chunk: the "no data this cycle" read result.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
