//! Streaming biphase-mark LTC decoder
//!
//! Accepts unsigned 8-bit PCM in arbitrary chunk sizes and yields complete
//! frames. Edge detection uses an adaptive envelope threshold with
//! hysteresis; the interval between edges is classified against a tracked
//! bit period (half period = part of a `1`, full period = a `0`).
//!
//! Frames are found with an 80-bit sliding window. Forward playback ends
//! with the sync word; reversed playback starts with the sync word read
//! backwards, which is how the direction is detected.

use super::frame::{LtcFrame, LTC_FRAME_BITS};
use super::{LtcError, SAMPLE_CENTER};
use std::collections::VecDeque;

/// Sync word as received in forward order (bit 64 first)
const SYNC_FORWARD: u128 = 0x3FFD;

/// Sync word as received in reverse order (bit 79 first)
const SYNC_REVERSE: u128 = 0xBFFC;

const WINDOW_MASK: u128 = (1u128 << LTC_FRAME_BITS) - 1;

/// Envelope decay toward the current sample, per sample
const ENVELOPE_DECAY: f64 = 1.0 / 2048.0;

/// Minimum peak-to-peak swing before edges are trusted
const MIN_SWING: f64 = 16.0;

/// Intervals shorter than this fraction of a bit are half bits
const HALF_BIT_RATIO: f64 = 0.75;

/// Intervals longer than this many bits are treated as signal gaps
const GAP_RATIO: f64 = 4.0;

/// Weight of a new interval in the bit period estimate
const PERIOD_ADAPT: f64 = 0.25;

/// A frame recovered by the decoder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedFrame {
    /// The 80 frame bits in transmission order
    pub ltc: LtcFrame,
    /// Absolute sample offset where the frame started
    pub offset_start: u64,
    /// Absolute sample offset where the frame ended
    pub offset_end: u64,
    /// Frame was played backwards
    pub reverse: bool,
    /// Signal level in dBFS at the time of decoding
    pub volume_dbfs: f64,
}

/// LTC audio decoder
///
/// # Example
/// ```
/// use ltcsync_core::ltc::{Decoder, Encoder, LtcFlags, TvStandard};
///
/// let mut encoder = Encoder::new(48000.0, 25.0, TvStandard::Auto, LtcFlags::USE_DATE).unwrap();
/// let mut pcm = Vec::new();
/// for _ in 0..3 {
///     encoder.encode_frame();
///     pcm.extend_from_slice(encoder.buffer());
/// }
///
/// let mut decoder = Decoder::new(1920, 32).unwrap();
/// decoder.write(&pcm, 0);
/// assert!(decoder.read().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    queue: VecDeque<DecodedFrame>,
    queue_size: usize,
    snd_max: f64,
    snd_min: f64,
    level_high: bool,
    /// Samples since the last detected edge
    since_edge: f64,
    seen_edge: bool,
    /// Estimated samples per bit
    bit_period: f64,
    initial_bit_period: f64,
    half_pending: bool,
    window: u128,
    bits_since_frame: usize,
    frames_dropped: u64,
}

impl Decoder {
    /// Create a decoder
    ///
    /// - `samples_per_frame` seeds the bit period estimate; it is tracked
    ///   dynamically afterwards
    /// - `queue_size` bounds the number of undrained frames (oldest dropped)
    pub fn new(samples_per_frame: usize, queue_size: usize) -> Result<Self, LtcError> {
        if samples_per_frame < LTC_FRAME_BITS {
            return Err(LtcError::InvalidDecoderSettings(format!(
                "samples per frame {} below {}",
                samples_per_frame, LTC_FRAME_BITS
            )));
        }
        if queue_size == 0 {
            return Err(LtcError::InvalidDecoderSettings(
                "queue size must be non-zero".to_string(),
            ));
        }

        let bit_period = samples_per_frame as f64 / LTC_FRAME_BITS as f64;
        Ok(Self {
            queue: VecDeque::with_capacity(queue_size),
            queue_size,
            snd_max: f64::from(SAMPLE_CENTER),
            snd_min: f64::from(SAMPLE_CENTER),
            level_high: false,
            since_edge: 0.0,
            seen_edge: false,
            bit_period,
            initial_bit_period: bit_period,
            half_pending: false,
            window: 0,
            bits_since_frame: 0,
            frames_dropped: 0,
        })
    }

    /// Feed PCM; `offset` is the absolute sample index of `samples[0]`
    pub fn write(&mut self, samples: &[u8], offset: u64) {
        for (i, &sample) in samples.iter().enumerate() {
            self.process_sample(f64::from(sample), offset + i as u64);
        }
    }

    /// Pop the oldest decoded frame
    pub fn read(&mut self) -> Option<DecodedFrame> {
        self.queue.pop_front()
    }

    /// Frames waiting to be read
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Frames discarded because the queue was full
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Current bit period estimate in samples
    pub fn bit_period(&self) -> f64 {
        self.bit_period
    }

    /// Forget all signal state and queued frames
    pub fn reset(&mut self) {
        self.queue.clear();
        self.snd_max = f64::from(SAMPLE_CENTER);
        self.snd_min = f64::from(SAMPLE_CENTER);
        self.level_high = false;
        self.since_edge = 0.0;
        self.seen_edge = false;
        self.bit_period = self.initial_bit_period;
        self.resync();
    }

    fn resync(&mut self) {
        self.half_pending = false;
        self.window = 0;
        self.bits_since_frame = 0;
    }

    fn process_sample(&mut self, sample: f64, position: u64) {
        if sample > self.snd_max {
            self.snd_max = sample;
        } else {
            self.snd_max += (sample - self.snd_max) * ENVELOPE_DECAY;
        }
        if sample < self.snd_min {
            self.snd_min = sample;
        } else {
            self.snd_min += (sample - self.snd_min) * ENVELOPE_DECAY;
        }

        self.since_edge += 1.0;

        let swing = self.snd_max - self.snd_min;
        if swing < MIN_SWING {
            return;
        }

        let threshold = (self.snd_max + self.snd_min) / 2.0;
        let hysteresis = swing / 8.0;

        let edge = if self.level_high {
            sample < threshold - hysteresis
        } else {
            sample > threshold + hysteresis
        };

        if edge {
            self.level_high = !self.level_high;
            let interval = self.since_edge;
            self.since_edge = 0.0;
            if self.seen_edge {
                self.handle_interval(interval, position);
            }
            self.seen_edge = true;
        }
    }

    fn handle_interval(&mut self, interval: f64, position: u64) {
        if interval > self.bit_period * GAP_RATIO {
            self.resync();
            return;
        }

        if interval < self.bit_period * HALF_BIT_RATIO {
            self.adapt_period(interval * 2.0);
            if self.half_pending {
                self.half_pending = false;
                self.push_bit(true, position);
            } else {
                self.half_pending = true;
            }
        } else {
            self.adapt_period(interval);
            if self.half_pending {
                // A lone half bit followed by a full one: lost alignment
                self.resync();
            }
            self.push_bit(false, position);
        }
    }

    fn adapt_period(&mut self, measured: f64) {
        self.bit_period += (measured - self.bit_period) * PERIOD_ADAPT;
    }

    fn push_bit(&mut self, bit: bool, position: u64) {
        self.window = ((self.window << 1) | u128::from(bit)) & WINDOW_MASK;
        self.bits_since_frame += 1;

        if self.bits_since_frame < LTC_FRAME_BITS {
            return;
        }

        let forward = self.window & 0xFFFF == SYNC_FORWARD;
        let reverse = !forward && (self.window >> 64) & 0xFFFF == SYNC_REVERSE;
        if !forward && !reverse {
            return;
        }

        // Window holds the newest bit at bit 0. Forward frames therefore sit
        // bit-reversed in the window, reversed frames sit in frame order.
        let bits = if forward {
            (0..LTC_FRAME_BITS).fold(0u128, |acc, i| {
                acc | (((self.window >> (LTC_FRAME_BITS - 1 - i)) & 1) << i)
            })
        } else {
            self.window
        };

        let mut bytes = [0u8; 10];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (bits >> (i * 8)) as u8;
        }

        let frame_samples = (self.bit_period * LTC_FRAME_BITS as f64).round() as u64;
        let decoded = DecodedFrame {
            ltc: LtcFrame::from_bytes(bytes),
            offset_start: position.saturating_sub(frame_samples),
            offset_end: position,
            reverse,
            volume_dbfs: self.volume_dbfs(),
        };

        if self.queue.len() >= self.queue_size {
            self.queue.pop_front();
            self.frames_dropped += 1;
        }
        self.queue.push_back(decoded);
        self.bits_since_frame = 0;
    }

    fn volume_dbfs(&self) -> f64 {
        let amplitude = (self.snd_max - self.snd_min) / 2.0 / 127.0;
        if amplitude <= 0.0 {
            f64::NEG_INFINITY
        } else {
            20.0 * amplitude.log10()
        }
    }
}
