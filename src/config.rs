//! Persistent application configuration
//!
//! Stores device selection, stream format, and timecode settings in a JSON
//! file at `<data_dir>/ltcsync/config.json`. Command-line flags override
//! whatever is loaded.

use ltcsync_core::engine::sender::{DEFAULT_MAX_BUFFERED_FRAMES, DEFAULT_QUEUE_CAPACITY};
use ltcsync_core::{AudioConfig, LtcFlags, SenderSettings, TvStandard};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_sample_rate() -> u32 {
    ltcsync_core::DEFAULT_SAMPLE_RATE
}

fn default_buffer_size() -> u32 {
    512
}

fn default_fps() -> f32 {
    ltcsync_core::DEFAULT_FPS
}

fn default_timezone() -> String {
    ltcsync_core::DEFAULT_TIMEZONE.to_string()
}

fn default_use_date() -> bool {
    true
}

fn default_max_buffered_frames() -> usize {
    DEFAULT_MAX_BUFFERED_FRAMES
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Audio device name (None = host default)
    #[serde(default)]
    pub device: Option<String>,
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Frames per callback (0 = device default)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    /// Channel carrying LTC, 0-based, for both directions
    #[serde(default)]
    pub channel: usize,
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub drop_frame: bool,
    #[serde(default)]
    pub tv_standard: TvStandard,
    /// Timezone written into the date user bits
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Carry date and timezone in the user bits
    #[serde(default = "default_use_date")]
    pub use_date: bool,
    #[serde(default = "default_max_buffered_frames")]
    pub max_buffered_frames: usize,
    /// Sample queue capacity in samples
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            channel: 0,
            fps: default_fps(),
            drop_frame: false,
            tv_standard: TvStandard::default(),
            timezone: default_timezone(),
            use_date: default_use_date(),
            max_buffered_frames: default_max_buffered_frames(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AppConfig {
    /// Config file path: `<data_dir>/ltcsync/config.json`
    pub fn path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ltcsync")
            .join("config.json")
    }

    /// Load config from the default path, falling back to defaults on any error
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Stream parameters for the audio harness
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            device: self.device.clone(),
            ..AudioConfig::default()
        }
    }

    /// Encoding parameters for the sender
    pub fn sender_settings(&self) -> SenderSettings {
        SenderSettings {
            fps: self.fps,
            drop_frame: self.drop_frame,
            channel_offset: self.channel,
            standard: self.tv_standard,
            flags: if self.use_date {
                LtcFlags::USE_DATE
            } else {
                LtcFlags::empty()
            },
            max_buffered_frames: self.max_buffered_frames,
        }
    }
}
