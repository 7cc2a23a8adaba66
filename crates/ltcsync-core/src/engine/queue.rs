//! Bounded sample FIFO between the encode loop and the output callback
//!
//! One mutex guards the whole batch on either side. The consumer never
//! waits for data: missing samples are counted as underruns and played as
//! silence. The producer never grows the queue past its capacity: the
//! oldest samples are trimmed instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Thread-safe FIFO of normalized audio samples
///
/// # Example
/// ```
/// use ltcsync_core::SampleQueue;
///
/// let queue = SampleQueue::new(4);
/// queue.push_batch(&[0.1, 0.2, 0.3]);
/// let mut out = [1.0f32; 5];
/// queue.pop_into(&mut out, 1, 0);
/// assert_eq!(out, [0.1, 0.2, 0.3, 0.0, 0.0]);
/// assert_eq!(queue.underruns(), 2);
/// ```
#[derive(Debug)]
pub struct SampleQueue {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
    underruns: AtomicU64,
    trimmed: AtomicU64,
}

impl SampleQueue {
    /// Create a queue holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            underruns: AtomicU64::new(0),
            trimmed: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        // A panicking holder cannot leave the deque structurally broken
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Append samples, trimming the oldest past capacity
    ///
    /// Returns the number of samples trimmed.
    pub fn push_batch(&self, batch: &[f32]) -> usize {
        let trimmed = {
            let mut samples = self.lock();
            samples.extend(batch.iter().copied());
            let excess = samples.len().saturating_sub(self.capacity);
            if excess > 0 {
                samples.drain(..excess);
            }
            excess
        };

        if trimmed > 0 {
            let total = self.trimmed.fetch_add(trimmed as u64, Ordering::Relaxed) + trimmed as u64;
            tracing::warn!(
                trimmed,
                total,
                capacity = self.capacity,
                "Sample queue over capacity, dropped oldest samples"
            );
        }
        trimmed
    }

    /// Pop one sample per interleaved frame into `channel`, silence elsewhere
    ///
    /// `output` is interleaved with `channels` channels. A `channel` outside
    /// the frame falls back to channel 0. Returns the number of frames that
    /// received real samples; the rest are underruns.
    pub fn pop_into(&self, output: &mut [f32], channels: usize, channel: usize) -> usize {
        let channels = channels.max(1);
        let channel = if channel < channels { channel } else { 0 };
        let mut filled = 0usize;
        let mut missing = 0u64;

        {
            let mut samples = self.lock();
            for frame in output.chunks_mut(channels) {
                let sample = match samples.pop_front() {
                    Some(s) => {
                        filled += 1;
                        s
                    }
                    None => {
                        missing += 1;
                        0.0
                    }
                };
                for (ch, out) in frame.iter_mut().enumerate() {
                    *out = if ch == channel { sample } else { 0.0 };
                }
            }
        }

        if missing > 0 {
            self.underruns.fetch_add(missing, Ordering::Relaxed);
        }
        filled
    }

    /// Total frames played as silence because the queue was empty
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Total samples dropped by capacity trimming
    pub fn trimmed(&self) -> u64 {
        self.trimmed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = SampleQueue::new(16);
        queue.push_batch(&[1.0, 2.0]);
        queue.push_batch(&[3.0]);
        let mut out = [0.0f32; 3];
        assert_eq!(queue.pop_into(&mut out, 1, 0), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert!(queue.is_empty());
        assert_eq!(queue.underruns(), 0);
    }

    #[test]
    fn test_empty_queue_writes_silence() {
        let queue = SampleQueue::new(16);
        let mut out = vec![0.7f32; 512 * 2];
        assert_eq!(queue.pop_into(&mut out, 2, 0), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(queue.underruns(), 512);
    }

    #[test]
    fn test_interleaved_channel_routing() {
        let queue = SampleQueue::new(16);
        queue.push_batch(&[0.5, -0.5]);
        let mut out = [9.0f32; 6];
        queue.pop_into(&mut out, 3, 1);
        assert_eq!(out, [0.0, 0.5, 0.0, 0.0, -0.5, 0.0]);

        // Out-of-range channel falls back to the first
        queue.push_batch(&[0.25]);
        let mut out = [9.0f32; 2];
        queue.pop_into(&mut out, 2, 7);
        assert_eq!(out, [0.25, 0.0]);
    }

    #[test]
    fn test_trims_oldest_past_capacity() {
        let queue = SampleQueue::new(4);
        queue.push_batch(&[1.0, 2.0, 3.0]);
        assert_eq!(queue.push_batch(&[4.0, 5.0, 6.0]), 2);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.trimmed(), 2);

        let mut out = [0.0f32; 4];
        queue.pop_into(&mut out, 1, 0);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_clear() {
        let queue = SampleQueue::new(8);
        queue.push_batch(&[1.0; 5]);
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let queue = Arc::new(SampleQueue::new(1 << 20));
        let producer_queue = Arc::clone(&queue);

        let producer = std::thread::spawn(move || {
            for i in 0..1000 {
                let batch: Vec<f32> = (0..100).map(|j| (i * 100 + j) as f32).collect();
                producer_queue.push_batch(&batch);
            }
        });

        let mut received = Vec::new();
        let mut out = [0.0f32; 64];
        while received.len() < 100_000 {
            let filled = queue.pop_into(&mut out, 1, 0);
            received.extend_from_slice(&out[..filled]);
            if filled == 0 {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();

        // Underruns only insert silence, they never reorder real samples
        for (i, &s) in received.iter().enumerate() {
            assert_eq!(s, i as f32);
        }
    }
}
