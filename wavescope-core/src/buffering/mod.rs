//! Sample buffering.
//!
//! Two buffers sit between the audio device and the FFT:
//!
//! ```text
//! audio callback ──push_slice──► SPSC ring ──pop_slice──► Chunk ──append──► RollingWindow
//!   (RT thread)                  (lock-free)      (capture worker)              (worker-owned)
//! ```
//!
//! The ring absorbs scheduling jitter between the real-time callback and the
//! worker; the rolling window holds the analysis history.

pub mod chunk;
pub mod window;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};
pub use window::{RollingWindow, Snapshot};

/// Producer half, held by the audio callback.
pub type SampleProducer = ringbuf::HeapProd<i16>;

/// Consumer half, held by the capture worker.
pub type SampleConsumer = ringbuf::HeapCons<i16>;

/// Ring capacity: 2^17 = 131 072 samples ≈ 2.7 s at 48 kHz.
/// The worker drains every read timeout, so this only has to cover stalls.
pub const RING_CAPACITY: usize = 1 << 17;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_sample_ring() -> (SampleProducer, SampleConsumer) {
    create_sample_ring_with_capacity(RING_CAPACITY)
}

pub fn create_sample_ring_with_capacity(capacity: usize) -> (SampleProducer, SampleConsumer) {
    HeapRb::<i16>::new(capacity.max(1)).split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Observer;

    #[test]
    fn ring_transfers_whole_slices_in_order() {
        let (mut producer, mut consumer) = create_sample_ring_with_capacity(16);
        assert_eq!(producer.push_slice(&[1, 2, 3, 4]), 4);
        assert_eq!(consumer.occupied_len(), 4);

        let mut out = [0i16; 8];
        let n = consumer.pop_slice(&mut out);
        assert_eq!(&out[..n], &[1, 2, 3, 4]);
    }

    #[test]
    fn full_ring_rejects_excess_samples() {
        let (mut producer, _consumer) = create_sample_ring_with_capacity(4);
        let written = producer.push_slice(&[7; 10]);
        assert_eq!(written, 4);
    }
}
