//! Real-time timecode engines
//!
//! - [`Sender`]: background encode loop feeding a [`SampleQueue`] that the
//!   output callback drains
//! - [`Receiver`]: input-callback pipeline decoding LTC and notifying an
//!   observer
//!
//! Both are driven by the audio harness through
//! [`OutputSource`](crate::audio::OutputSource) and
//! [`InputSink`](crate::audio::InputSink) and share no state with each other.

pub mod playback;
pub mod queue;
pub mod receiver;
pub mod sender;

pub use playback::{CatchUp, PlaybackClock, PlaybackState};
pub use queue::SampleQueue;
pub use receiver::Receiver;
pub use sender::{Sender, SenderSettings, Tick};

use crate::ltc::LtcError;
use thiserror::Error;

/// Errors that can occur while setting up an engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("LTC codec error: {0}")]
    Codec(#[from] LtcError),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f32),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Failed to spawn encode thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}
