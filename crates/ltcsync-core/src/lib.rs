//! ltcsync Core - LTC timecode engines, codec, and audio harness
//!
//! This library embeds SMPTE/EBU Linear Timecode into a live audio stream and
//! recovers it from one. The two real-time engines are:
//! - [`Sender`]: advances a timecode on a background task and renders LTC audio
//! - [`Receiver`]: decodes LTC from input audio and reports each frame

pub mod audio;
pub mod clock;
pub mod engine;
pub mod ltc;
pub mod timecode;

pub use audio::{AudioConfig, AudioStreams, DeviceInfo, InputSink, OutputSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineError, PlaybackState, Receiver, SampleQueue, Sender, SenderSettings};
pub use ltc::{LtcFlags, TvStandard};
pub use timecode::{Timecode, TimecodeFields};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for LTC output
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default frame rate
pub const DEFAULT_FPS: f32 = 30.0;

/// Default timezone written into the date user bits
pub const DEFAULT_TIMEZONE: &str = "+0900";
