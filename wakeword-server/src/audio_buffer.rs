/// Sliding audio window
///
/// Ring buffer holding the most recent 5 seconds of normalized 16kHz audio
/// for one streaming session. Appends evict the oldest samples once the
/// window is full; scoring reads the newest chunk without consuming it.

use crate::audio::{AudioSample, SAMPLE_RATE};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use thiserror::Error;
use tracing::{debug, trace};

/// Retained history per session
pub const WINDOW_DURATION_SECS: usize = 5;
pub const WINDOW_CAPACITY: usize = WINDOW_DURATION_SECS * SAMPLE_RATE; // 80,000 samples

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("insufficient data: requested {requested} samples, {available} available")]
    InsufficientData { requested: usize, available: usize },
}

/// Fixed-capacity FIFO window of recent samples
pub struct SlidingAudioBuffer {
    ring: HeapRb<AudioSample>,
}

impl SlidingAudioBuffer {
    /// Create a buffer holding the default 5-second window
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    /// Create a buffer with custom capacity (at least one sample)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating sliding audio buffer with capacity: {} samples", capacity);

        Self {
            ring: HeapRb::new(capacity),
        }
    }

    /// Append samples at the tail, evicting from the head to stay within capacity
    pub fn append(&mut self, samples: &[AudioSample]) {
        let capacity = self.capacity();

        // Only the newest `capacity` samples of an oversized append can survive
        let incoming = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let vacant = self.ring.vacant_len();
        if incoming.len() > vacant {
            let to_drop = incoming.len() - vacant;
            self.ring.skip(to_drop);
            trace!("Window full, evicted {} oldest samples", to_drop);
        }

        self.ring.push_slice(incoming);
    }

    /// Copy out the most recent `size` samples, oldest first
    pub fn latest_chunk(&self, size: usize) -> Result<Vec<AudioSample>, BufferError> {
        let available = self.len();

        if size > available {
            return Err(BufferError::InsufficientData {
                requested: size,
                available,
            });
        }

        Ok(self.ring.iter().skip(available - size).copied().collect())
    }

    /// Number of samples currently buffered
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    /// Drop every buffered sample
    pub fn clear(&mut self) {
        let occupied = self.ring.occupied_len();
        self.ring.skip(occupied);
    }

    /// Duration of audio currently buffered (in seconds)
    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / SAMPLE_RATE as f32
    }
}

impl Default for SlidingAudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}
