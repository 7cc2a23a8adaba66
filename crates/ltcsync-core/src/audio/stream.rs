//! cpal streams driving the engines
//!
//! Each stream callback forwards the hardware buffer straight to an
//! [`OutputSource`] or [`InputSink`]. Streams stop when [`AudioStreams`] is
//! dropped.

use super::{AudioConfig, InputSink, OutputSource};
use crate::engine::EngineError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Information about an audio device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub input_channels: u16,
    pub output_channels: u16,
}

/// Open audio streams feeding the engines
#[derive(Default)]
pub struct AudioStreams {
    streams: Vec<Stream>,
}

impl AudioStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// List devices on the default host
    pub fn list_devices() -> Result<Vec<DeviceInfo>, EngineError> {
        let host = cpal::default_host();
        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        let devices = host
            .devices()
            .map_err(|e| EngineError::Stream(e.to_string()))?;

        Ok(devices
            .map(|device| {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                let is_default = default_input.as_deref() == Some(name.as_str())
                    || default_output.as_deref() == Some(name.as_str());
                DeviceInfo {
                    is_default,
                    input_channels: device
                        .default_input_config()
                        .map(|c| c.channels())
                        .unwrap_or(0),
                    output_channels: device
                        .default_output_config()
                        .map(|c| c.channels())
                        .unwrap_or(0),
                    name,
                }
            })
            .collect())
    }

    fn find_device(name: Option<&str>, input: bool) -> Result<Device, EngineError> {
        let host = cpal::default_host();
        match name {
            Some(name) => host
                .devices()
                .map_err(|e| EngineError::Stream(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| EngineError::DeviceNotFound(name.to_string())),
            None => {
                let device = if input {
                    host.default_input_device()
                } else {
                    host.default_output_device()
                };
                device.ok_or_else(|| EngineError::DeviceNotFound("default".to_string()))
            }
        }
    }

    fn stream_config(config: &AudioConfig, channels: u16) -> StreamConfig {
        StreamConfig {
            channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: match config.buffer_size {
                0 => BufferSize::Default,
                n => BufferSize::Fixed(n),
            },
        }
    }

    /// Open an output stream that pulls every buffer from `source`
    pub fn output<S>(&mut self, config: &AudioConfig, source: S) -> Result<(), EngineError>
    where
        S: OutputSource + 'static,
    {
        let device = Self::find_device(config.device.as_deref(), false)?;
        let channels = match config.output_channels {
            0 => device
                .default_output_config()
                .map(|c| c.channels())
                .unwrap_or(2),
            n => n,
        };
        let stream_config = Self::stream_config(config, channels);
        let num_channels = channels as usize;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            channels,
            "Opening output stream"
        );

        let started = Arc::new(AtomicBool::new(false));
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    source.fill_output_buffer(data, num_channels);
                    if !started.swap(true, Ordering::Relaxed) {
                        tracing::info!(
                            frames = data.len() / num_channels.max(1),
                            "Output callback started"
                        );
                    }
                },
                move |err| {
                    tracing::error!("Output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| EngineError::Stream(e.to_string()))?;
        self.streams.push(stream);
        Ok(())
    }

    /// Open an input stream that pushes every buffer into `sink`
    pub fn input<S>(&mut self, config: &AudioConfig, mut sink: S) -> Result<(), EngineError>
    where
        S: InputSink + 'static,
    {
        let device = Self::find_device(config.device.as_deref(), true)?;
        let channels = match config.input_channels {
            0 => device
                .default_input_config()
                .map(|c| c.channels())
                .unwrap_or(2),
            n => n,
        };
        let stream_config = Self::stream_config(config, channels);
        let num_channels = channels as usize;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            channels,
            "Opening input stream"
        );

        let started = Arc::new(AtomicBool::new(false));
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    sink.consume_input_buffer(data, num_channels);
                    if !started.swap(true, Ordering::Relaxed) {
                        tracing::info!(
                            frames = data.len() / num_channels.max(1),
                            "Input callback started"
                        );
                    }
                },
                move |err| {
                    tracing::error!("Input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| EngineError::Stream(e.to_string()))?;
        self.streams.push(stream);
        Ok(())
    }

    /// Number of open streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Pause every stream without closing it
    pub fn pause(&self) -> Result<(), EngineError> {
        for stream in &self.streams {
            stream
                .pause()
                .map_err(|e| EngineError::Stream(e.to_string()))?;
        }
        Ok(())
    }
}
