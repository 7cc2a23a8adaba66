//! Audio I/O harness
//!
//! The engines never touch a device. They expose two narrow capabilities:
//! - [`OutputSource`]: fill one interleaved output buffer
//! - [`InputSink`]: consume one interleaved input buffer
//!
//! [`AudioStreams`] opens cpal streams and calls these once per hardware
//! callback.

pub mod stream;

pub use stream::{AudioStreams, DeviceInfo};

use crate::engine::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stream parameters shared by the engines and the harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Requested frames per callback; 0 leaves it to the device
    pub buffer_size: u32,
    /// Output channel count; 0 uses the device default
    pub output_channels: u16,
    /// Input channel count; 0 uses the device default
    pub input_channels: u16,
    /// Device name; `None` selects the host default
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            buffer_size: 512,
            output_channels: 2,
            input_channels: 2,
            device: None,
        }
    }
}

/// Something that can fill an interleaved output buffer without blocking
pub trait OutputSource: Send + Sync {
    fn fill_output_buffer(&self, output: &mut [f32], channels: usize);
}

/// Something that consumes an interleaved input buffer
pub trait InputSink: Send {
    fn consume_input_buffer(&mut self, input: &[f32], channels: usize);
}

impl OutputSource for Sender {
    fn fill_output_buffer(&self, output: &mut [f32], channels: usize) {
        Sender::fill_output_buffer(self, output, channels);
    }
}

impl<T: OutputSource + ?Sized> OutputSource for Arc<T> {
    fn fill_output_buffer(&self, output: &mut [f32], channels: usize) {
        (**self).fill_output_buffer(output, channels);
    }
}

impl InputSink for Receiver {
    fn consume_input_buffer(&mut self, input: &[f32], channels: usize) {
        self.audio_in(input, channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_config_defaults() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.output_channels, 2);
        assert!(config.device.is_none());
    }

    #[test]
    fn test_config_serde() {
        let config = AudioConfig {
            device: Some("Line 1/2".to_string()),
            ..AudioConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AudioConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_sender_as_output_source() {
        let sender = Arc::new(Sender::new(Arc::new(ManualClock::new(2024, 1, 1))));
        sender.queue().push_batch(&[0.5]);
        let source: Arc<dyn OutputSource> = sender.clone();
        let mut out = [1.0f32; 4];
        source.fill_output_buffer(&mut out, 2);
        assert_eq!(out, [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_receiver_as_input_sink() {
        let mut receiver = Receiver::new(Arc::new(ManualClock::new(2024, 1, 1)));
        receiver.setup(&AudioConfig::default(), 0).unwrap();
        let sink: &mut dyn InputSink = &mut receiver;
        sink.consume_input_buffer(&[0.0; 64], 2);
        assert_eq!(receiver.offset(), 32);
    }
}
