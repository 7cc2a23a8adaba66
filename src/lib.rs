//! ltcsync - SMPTE linear timecode over live audio
//!
//! This library re-exports the timecode engines, LTC codec and audio
//! harness from `ltcsync-core`, plus the JSON configuration used by the
//! command-line tool.

pub mod cli;
pub mod config;

pub use ltcsync_core::{audio, clock, engine, ltc, timecode};

pub use ltcsync_core::{
    AudioConfig, AudioStreams, Clock, EngineError, LtcFlags, ManualClock, PlaybackState, Receiver,
    SampleQueue, Sender, SenderSettings, SystemClock, Timecode, TimecodeFields, TvStandard,
};
pub use ltcsync_core::{DEFAULT_FPS, DEFAULT_SAMPLE_RATE, DEFAULT_TIMEZONE, VERSION};

pub use config::AppConfig;
