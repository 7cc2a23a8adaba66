//! Command-line parsing
//!
//! Hand-rolled so the binary has no argument-parser dependency. Flags
//! override values loaded from the config file.

use crate::config::AppConfig;
use ltcsync_core::TimecodeFields;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing the command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("Invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: String },

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),
}

fn invalid(what: &'static str, value: &str) -> CliError {
    CliError::InvalidValue {
        what,
        value: value.to_string(),
    }
}

/// Which engines to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Send,
    Receive,
    Loopback,
}

/// What the binary should do after parsing
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(RunOptions),
    ListDevices,
    Version,
    Help,
}

/// Parsed options for a run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunOptions {
    pub mode: Option<Mode>,
    pub config_path: Option<PathBuf>,
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub fps: Option<f32>,
    pub drop_frame: bool,
    pub channel: Option<usize>,
    pub start: Option<TimecodeFields>,
    pub save_config: bool,
}

impl RunOptions {
    /// Apply command-line overrides on top of a loaded config
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if self.drop_frame {
            config.drop_frame = true;
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
    }
}

/// Parse `HH:MM:SS:FF`; a `.` or `;` before the frames marks drop-frame
pub fn parse_timecode(s: &str) -> Option<TimecodeFields> {
    let drop_frame = s.contains('.') || s.contains(';');
    let parts: Vec<&str> = s.split([':', '.', ';']).collect();
    if parts.len() != 4 {
        return None;
    }
    let mut values = [0u8; 4];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part.parse().ok()?;
    }
    Some(TimecodeFields::new(values[0], values[1], values[2], values[3]).with_drop_frame(drop_frame))
}

fn value<'a>(args: &'a [String], i: usize, flag: &'static str) -> Result<&'a str, CliError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or(CliError::MissingValue(flag))
}

/// Parse arguments, excluding the program name
pub fn parse_args(args: &[String]) -> Result<CliAction, CliError> {
    let mut opts = RunOptions::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--list" | "-l" => return Ok(CliAction::ListDevices),
            "--version" | "-v" => return Ok(CliAction::Version),
            "--help" | "-h" => return Ok(CliAction::Help),
            "--device" | "-d" => {
                opts.device = Some(value(args, i, "--device")?.to_string());
                i += 2;
                continue;
            }
            "--sample-rate" | "-r" => {
                let raw = value(args, i, "--sample-rate")?;
                opts.sample_rate = Some(raw.parse().map_err(|_| invalid("sample rate", raw))?);
                i += 2;
                continue;
            }
            "--fps" | "-f" => {
                let raw = value(args, i, "--fps")?;
                let fps: f32 = raw.parse().map_err(|_| invalid("frame rate", raw))?;
                if !fps.is_finite() || fps <= 0.0 {
                    return Err(invalid("frame rate", raw));
                }
                opts.fps = Some(fps);
                i += 2;
                continue;
            }
            "--channel" | "-c" => {
                let raw = value(args, i, "--channel")?;
                opts.channel = Some(raw.parse().map_err(|_| invalid("channel", raw))?);
                i += 2;
                continue;
            }
            "--start" => {
                let raw = value(args, i, "--start")?;
                opts.start =
                    Some(parse_timecode(raw).ok_or_else(|| invalid("timecode (HH:MM:SS:FF)", raw))?);
                i += 2;
                continue;
            }
            "--config" => {
                opts.config_path = Some(PathBuf::from(value(args, i, "--config")?));
                i += 2;
                continue;
            }
            "--drop-frame" => opts.drop_frame = true,
            "--save-config" => opts.save_config = true,
            "send" => opts.mode = Some(Mode::Send),
            "receive" => opts.mode = Some(Mode::Receive),
            "loopback" => opts.mode = Some(Mode::Loopback),
            arg => return Err(CliError::UnknownArgument(arg.to_string())),
        }
        i += 1;
    }

    Ok(CliAction::Run(opts))
}
