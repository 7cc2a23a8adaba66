//! LTC receiver: input-callback decode pipeline
//!
//! Each input buffer is reduced to one channel, converted to unsigned 8-bit
//! PCM and fed to the [`Decoder`]. Every recovered frame is translated into a
//! [`Timecode`] and handed to the observer on the calling thread, so the
//! observer must be quick. Use [`Receiver::subscribe`] to move delivery off
//! the audio thread through a bounded channel.

use super::EngineError;
use crate::audio::AudioConfig;
use crate::clock::Clock;
use crate::ltc::{Decoder, LtcFlags, LtcFrame};
use crate::timecode::Timecode;
use std::sync::Arc;

/// Samples-per-frame hint given to the decoder (25 fps at 48 kHz)
pub const DECODER_SAMPLES_PER_FRAME: usize = 1920;

/// Decoded frames the decoder can hold between drains
pub const DECODER_QUEUE_SIZE: usize = 32;

type Observer = Box<dyn FnMut(Timecode) + Send>;

/// LTC receiver engine
///
/// # Example
/// ```
/// use ltcsync_core::{AudioConfig, Receiver, SystemClock};
///
/// let mut receiver = Receiver::new(SystemClock::shared());
/// receiver.setup(&AudioConfig::default(), 0).unwrap();
/// receiver.on_receive(|tc| println!("{}", tc));
/// receiver.audio_in(&[0.0; 512], 1);
/// assert_eq!(receiver.offset(), 512);
/// ```
pub struct Receiver {
    clock: Arc<dyn Clock>,
    decoder: Option<Decoder>,
    channel_offset: usize,
    offset: u64,
    frames_decoded: u64,
    last_frame: Option<LtcFrame>,
    observer: Observer,
    /// Reused byte buffer for the selected channel
    scratch: Vec<u8>,
}

impl Receiver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            decoder: None,
            channel_offset: 0,
            offset: 0,
            frames_decoded: 0,
            last_frame: None,
            observer: Box::new(|_| {}),
            scratch: Vec::new(),
        }
    }

    /// Create the decoder and reset the running sample offset
    pub fn setup(&mut self, audio: &AudioConfig, channel_offset: usize) -> Result<(), EngineError> {
        let decoder = match Decoder::new(DECODER_SAMPLES_PER_FRAME, DECODER_QUEUE_SIZE) {
            Ok(decoder) => decoder,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create LTC decoder");
                return Err(e.into());
            }
        };
        self.decoder = Some(decoder);
        self.channel_offset = channel_offset;
        self.offset = 0;
        self.scratch = Vec::with_capacity(audio.buffer_size as usize);

        tracing::info!(
            sample_rate = audio.sample_rate,
            channel = channel_offset,
            "LTC receiver configured"
        );
        Ok(())
    }

    /// Replace the observer called for every decoded frame
    pub fn on_receive<F>(&mut self, callback: F)
    where
        F: FnMut(Timecode) + Send + 'static,
    {
        self.observer = Box::new(callback);
    }

    /// Deliver decoded frames through a bounded channel instead
    ///
    /// Replaces the current observer. Frames arriving while the channel is
    /// full are dropped so the input callback never blocks.
    pub fn subscribe(&mut self, capacity: usize) -> crossbeam_channel::Receiver<Timecode> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.on_receive(move |timecode| {
            if tx.try_send(timecode).is_err() {
                tracing::debug!("Timecode channel full or closed, frame dropped");
            }
        });
        rx
    }

    /// Feed one interleaved input buffer
    ///
    /// Only the configured channel is decoded; an out-of-range channel falls
    /// back to channel 0. Does nothing before [`setup`](Self::setup).
    pub fn audio_in(&mut self, input: &[f32], channels: usize) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };
        let channels = channels.max(1);
        let channel = if self.channel_offset < channels {
            self.channel_offset
        } else {
            0
        };

        self.scratch.clear();
        self.scratch.extend(
            input
                .chunks(channels)
                .filter_map(|frame| frame.get(channel))
                .map(|&s| ((s + 1.0) * 127.5) as u8),
        );
        decoder.write(&self.scratch, self.offset);

        while let Some(decoded) = decoder.read() {
            let time = decoded.ltc.to_time(LtcFlags::USE_DATE);
            let timecode = Timecode::from_decoded(&decoded, &time, self.clock.now_utc());
            self.last_frame = Some(decoded.ltc);
            self.frames_decoded += 1;
            (self.observer)(timecode);
        }

        self.offset += self.scratch.len() as u64;
    }

    /// Samples fed to the decoder since setup
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Raw bytes of the most recent decoded frame
    pub fn last_frame(&self) -> Option<LtcFrame> {
        self.last_frame
    }

    pub fn is_setup(&self) -> bool {
        self.decoder.is_some()
    }
}
