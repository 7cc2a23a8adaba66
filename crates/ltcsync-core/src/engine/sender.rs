//! LTC sender: background encode loop and output-buffer fill
//!
//! The encode thread wakes roughly every millisecond, advances the timecode
//! by however many frames wall-clock time says are owed, renders one LTC
//! frame for the current value and pushes it onto the [`SampleQueue`]. The
//! output callback pops from the queue and never waits.
//!
//! While paused or stopped the loop keeps rendering the held frame, so the
//! line carries a steady timecode instead of silence.

use super::playback::{CatchUp, PlaybackClock, PlaybackState};
use super::queue::SampleQueue;
use super::EngineError;
use crate::audio::AudioConfig;
use crate::clock::Clock;
use crate::ltc::{Encoder, LtcFlags, TvStandard, SAMPLE_CENTER};
use crate::timecode::{Timecode, TimecodeFields};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Sleep between encode loop iterations
const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Default sample queue capacity (one second at 192 kHz)
pub const DEFAULT_QUEUE_CAPACITY: usize = 192_000;

/// Default number of rendered frames kept ahead of the output callback
pub const DEFAULT_MAX_BUFFERED_FRAMES: usize = 4;

/// Encoding parameters applied by [`Sender::setup`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderSettings {
    pub fps: f32,
    pub drop_frame: bool,
    /// Output channel carrying LTC; out-of-range values use channel 0
    pub channel_offset: usize,
    pub standard: TvStandard,
    pub flags: LtcFlags,
    /// Rendering pauses while the queue holds this many frames
    pub max_buffered_frames: usize,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            fps: crate::DEFAULT_FPS,
            drop_frame: false,
            channel_offset: 0,
            standard: TvStandard::default(),
            flags: LtcFlags::default(),
            max_buffered_frames: DEFAULT_MAX_BUFFERED_FRAMES,
        }
    }
}

/// Outcome of one encode loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub catch_up: CatchUp,
    /// Whether a frame was rendered and queued
    pub rendered: bool,
}

struct EncodeState {
    timecode: Timecode,
    playback: PlaybackClock,
    settings: SenderSettings,
    samples_per_frame: usize,
}

/// State shared between the caller, the encode thread and the output callback
///
/// The output callback only touches `queue` and `channel_offset`.
struct Shared {
    clock: Arc<dyn Clock>,
    queue: Arc<SampleQueue>,
    channel_offset: AtomicUsize,
    state: Mutex<EncodeState>,
    encoder: Mutex<Option<Encoder>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EncodeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn encoder(&self) -> MutexGuard<'_, Option<Encoder>> {
        self.encoder.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> Tick {
        let mut state = self.state();
        let fps = state.settings.fps;

        let catch_up = state.playback.catch_up(self.clock.elapsed_ms(), fps);
        match catch_up {
            CatchUp::Advance(n) => {
                for _ in 0..n {
                    state.timecode.advance_one_frame(fps);
                }
            }
            CatchUp::Negative(n) => {
                tracing::warn!(frames = n, "Clock went backwards, holding timecode");
            }
            CatchUp::Snap(n) => {
                tracing::warn!(
                    frames = n,
                    "Encode loop fell too far behind, resyncing frame counter"
                );
            }
            CatchUp::Idle => {}
        }

        let watermark = state.settings.max_buffered_frames * state.samples_per_frame;
        if self.queue.len() >= watermark {
            return Tick {
                catch_up,
                rendered: false,
            };
        }

        let mut guard = self.encoder();
        let Some(encoder) = guard.as_mut() else {
            return Tick {
                catch_up,
                rendered: false,
            };
        };

        let use_date = encoder.flags().contains(LtcFlags::USE_DATE);
        encoder.set_timecode(&state.timecode.to_smpte(use_date));
        let mut frame = encoder.frame();
        frame.set_dfbit(state.timecode.drop_frame);
        encoder.set_frame(frame);
        encoder.encode_frame();
        state.timecode.raw = encoder.frame();
        let bytes = encoder.buffer().to_vec();
        drop(guard);
        drop(state);

        let samples: Vec<f32> = bytes
            .iter()
            .map(|&b| (f32::from(b) - f32::from(SAMPLE_CENTER)) / 127.0)
            .collect();

        if samples.is_empty() {
            return Tick {
                catch_up,
                rendered: false,
            };
        }
        self.queue.push_batch(&samples);
        Tick {
            catch_up,
            rendered: true,
        }
    }
}

/// Handle to the background encode thread
struct EncodeTask {
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EncodeTask {
    fn spawn(shared: Arc<Shared>) -> Result<Self, EngineError> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&stop_flag);

        let thread = std::thread::Builder::new()
            .name("ltc-encode".into())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    tracing::info!("Encode loop running");
                    while !flag_clone.load(Ordering::Acquire) {
                        shared.tick();
                        std::thread::sleep(TICK_INTERVAL);
                    }
                }));
                match result {
                    Ok(()) => tracing::info!("Encode loop exited normally"),
                    Err(panic_info) => {
                        let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic_info.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        tracing::error!(panic = %msg, "Encode loop PANICKED");
                    }
                }
            })?;

        Ok(Self {
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Signal the loop and wait for it to finish
    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(h) = self.thread.take() {
            let _ = h.join();
        }
    }

    fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for EncodeTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// LTC sender engine
///
/// # Example
/// ```no_run
/// use ltcsync_core::{AudioConfig, Sender, SenderSettings, SystemClock, TimecodeFields};
///
/// let sender = Sender::new(SystemClock::shared());
/// sender.set_timecode(TimecodeFields::new(10, 0, 0, 0));
/// sender.setup(&AudioConfig::default(), &SenderSettings::default()).unwrap();
/// sender.start();
/// ```
pub struct Sender {
    shared: Arc<Shared>,
    task: Mutex<Option<EncodeTask>>,
}

impl Sender {
    /// Create an inert sender; timecode starts at 00:00:00:00 today
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_queue_capacity(clock, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a sender whose queue holds at most `capacity` samples
    pub fn with_queue_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        let timecode = Timecode::from_fields(&TimecodeFields::default(), clock.as_ref());
        Self {
            shared: Arc::new(Shared {
                clock,
                queue: Arc::new(SampleQueue::new(capacity)),
                channel_offset: AtomicUsize::new(0),
                state: Mutex::new(EncodeState {
                    timecode,
                    playback: PlaybackClock::new(),
                    settings: SenderSettings::default(),
                    samples_per_frame: 0,
                }),
                encoder: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    /// Configure encoding and launch the encode loop
    ///
    /// The loop is spawned on the first successful call only; later calls
    /// rebuild the encoder and clear the queue. On any failure the error is
    /// logged and returned, the encoder from an earlier setup is dropped and
    /// the sender stays inert until setup succeeds.
    pub fn setup(&self, audio: &AudioConfig, settings: &SenderSettings) -> Result<(), EngineError> {
        if !settings.fps.is_finite() || settings.fps <= 0.0 {
            tracing::error!(fps = settings.fps, "Failed to create LTC encoder");
            self.disable();
            return Err(EngineError::InvalidFrameRate(settings.fps));
        }
        if audio.sample_rate == 0 {
            tracing::error!(sample_rate = audio.sample_rate, "Failed to create LTC encoder");
            self.disable();
            return Err(EngineError::InvalidSampleRate(audio.sample_rate));
        }

        let samples_per_frame = (f64::from(audio.sample_rate) / f64::from(settings.fps)).ceil() as usize;

        let encoder = match Encoder::new(
            f64::from(audio.sample_rate),
            f64::from(settings.fps),
            settings.standard,
            settings.flags,
        ) {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create LTC encoder");
                self.disable();
                return Err(e.into());
            }
        };

        {
            let mut state = self.shared.state();
            state.settings = settings.clone();
            state.samples_per_frame = samples_per_frame;
            state.timecode.drop_frame = settings.drop_frame;
            state.timecode.raw.set_dfbit(settings.drop_frame);
            *self.shared.encoder() = Some(encoder);
        }
        self.shared
            .channel_offset
            .store(settings.channel_offset, Ordering::Relaxed);
        self.shared.queue.clear();

        tracing::info!(
            sample_rate = audio.sample_rate,
            fps = settings.fps,
            samples_per_frame,
            channel = settings.channel_offset,
            drop_frame = settings.drop_frame,
            "LTC sender configured"
        );

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_none() {
            *task = Some(EncodeTask::spawn(Arc::clone(&self.shared))?);
        }
        Ok(())
    }

    /// Drop the encoder and any queued audio
    fn disable(&self) {
        *self.shared.encoder() = None;
        self.shared.queue.clear();
    }

    /// Start playback, or resume it after [`stop`](Self::stop)
    pub fn start(&self) {
        if self.shared.encoder().is_none() {
            tracing::warn!("Sender not set up, ignoring start");
            return;
        }
        let now = self.shared.clock.elapsed_ms();
        let mut state = self.shared.state();
        if state.playback.start(now) {
            tracing::info!(timecode = %state.timecode, "LTC playback started");
        } else {
            tracing::info!(timecode = %state.timecode, "LTC playback resumed");
        }
    }

    /// Pause playback; the held frame keeps being emitted
    pub fn stop(&self) {
        let now = self.shared.clock.elapsed_ms();
        let mut state = self.shared.state();
        if state.playback.is_playing() {
            state.playback.stop(now);
            tracing::info!(timecode = %state.timecode, "LTC playback paused");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.shared.state().playback.is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.shared.state().playback.state()
    }

    /// Replace the current timecode, filling missing date parts from the clock
    pub fn set_timecode(&self, fields: TimecodeFields) {
        let timecode = Timecode::from_fields(&fields, self.shared.clock.as_ref());
        self.set_timecode_value(timecode);
    }

    /// Replace the current timecode verbatim
    pub fn set_timecode_value(&self, timecode: Timecode) {
        self.shared.state().timecode = timecode;
    }

    /// Snapshot of the current timecode
    pub fn timecode(&self) -> Timecode {
        self.shared.state().timecode.clone()
    }

    pub fn settings(&self) -> SenderSettings {
        self.shared.state().settings.clone()
    }

    /// Samples per frame from the last successful setup, 0 before that
    pub fn samples_per_frame(&self) -> usize {
        self.shared.state().samples_per_frame
    }

    /// Queue drained by the output callback
    pub fn queue(&self) -> Arc<SampleQueue> {
        Arc::clone(&self.shared.queue)
    }

    /// Whether the encode thread is running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(EncodeTask::is_alive)
            .unwrap_or(false)
    }

    /// Run one encode loop iteration on the calling thread
    ///
    /// The background loop calls the same routine; calling it directly is
    /// safe at any time and is how tests drive the sender deterministically.
    pub fn tick(&self) -> Tick {
        self.shared.tick()
    }

    /// Fill an interleaved output buffer from the queue
    ///
    /// One queued sample per frame goes to the configured channel, every
    /// other channel is silent. Missing samples are written as 0.0.
    pub fn fill_output_buffer(&self, output: &mut [f32], channels: usize) {
        let channel = self.shared.channel_offset.load(Ordering::Relaxed);
        self.shared.queue.pop_into(output, channels, channel);
    }

    /// Stop the encode thread, then release the encoder
    pub fn teardown(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut task) = task {
            task.stop();
            tracing::info!("LTC sender stopped");
        }
        *self.shared.encoder() = None;
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ltc::{Decoder, LtcFrame};
    use approx::abs_diff_eq;

    fn audio(sample_rate: u32) -> AudioConfig {
        AudioConfig {
            sample_rate,
            ..AudioConfig::default()
        }
    }

    fn settings(fps: f32) -> SenderSettings {
        SenderSettings {
            fps,
            ..SenderSettings::default()
        }
    }

    fn sender() -> (Arc<ManualClock>, Sender) {
        let clock = Arc::new(ManualClock::new(2024, 3, 15));
        let sender = Sender::new(clock.clone());
        (clock, sender)
    }

    #[test]
    fn test_initial_state() {
        let (_clock, sender) = sender();
        assert_eq!(sender.playback_state(), PlaybackState::Stopped);
        assert!(!sender.is_playing());
        assert!(!sender.is_running());
        let tc = sender.timecode();
        assert_eq!((tc.year, tc.month, tc.day), (2024, 3, 15));
        assert_eq!((tc.hour, tc.minute, tc.second, tc.frame), (0, 0, 0, 0));
    }

    #[test]
    fn test_start_without_setup_is_noop() {
        let (_clock, sender) = sender();
        sender.start();
        assert!(!sender.is_playing());
        assert!(!sender.tick().rendered);
        assert!(sender.queue().is_empty());
    }

    #[test]
    fn test_setup_rejects_bad_rates() {
        let (_clock, sender) = sender();
        assert!(matches!(
            sender.setup(&audio(48000), &settings(0.0)),
            Err(EngineError::InvalidFrameRate(_))
        ));
        assert!(matches!(
            sender.setup(&audio(0), &settings(25.0)),
            Err(EngineError::InvalidSampleRate(0))
        ));
        // 1000 Hz at 25 fps leaves fewer samples than bits
        assert!(matches!(
            sender.setup(&audio(1000), &settings(25.0)),
            Err(EngineError::Codec(_))
        ));
        assert!(!sender.is_running());
        sender.start();
        assert!(!sender.is_playing());
    }

    #[test]
    fn test_setup_spawns_once() {
        let (_clock, sender) = sender();
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        assert!(sender.is_running());
        assert_eq!(sender.samples_per_frame(), 1920);
        sender.setup(&audio(48000), &settings(30.0)).unwrap();
        assert!(sender.is_running());
        assert_eq!(sender.samples_per_frame(), 1600);
        sender.teardown();
        assert!(!sender.is_running());
    }

    #[test]
    fn test_loop_paces_to_watermark() {
        let (_clock, sender) = sender();
        sender.setup(&audio(48000), &settings(25.0)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sender.queue().len() < 4 * 1920 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sender.queue().len(), 4 * 1920);
        assert_eq!(sender.queue().trimmed(), 0);
    }

    #[test]
    fn test_samples_are_normalized() {
        // Drive the encoder by hand without a background loop
        let (_clock, sender) = sender();
        *sender.shared.encoder() = Some(
            Encoder::new(48000.0, 25.0, TvStandard::Tv625_50, LtcFlags::USE_DATE).unwrap(),
        );
        sender.shared.state().samples_per_frame = 1920;
        assert!(sender.tick().rendered);

        let queue = sender.queue();
        let mut out = vec![0.0f32; 1920];
        assert_eq!(queue.pop_into(&mut out, 1, 0), 1920);
        let hi: f32 = (218.0 - 128.0) / 127.0;
        let lo: f32 = (38.0 - 128.0) / 127.0;
        for s in out {
            assert!(
                abs_diff_eq!(s, hi, epsilon = 1e-6) || abs_diff_eq!(s, lo, epsilon = 1e-6),
                "sample {}",
                s
            );
        }
    }

    #[test]
    fn test_advance_follows_clock() {
        let (clock, sender) = sender();
        sender.set_timecode(TimecodeFields::new(12, 0, 0, 0));
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        sender.start();
        assert!(sender.is_playing());

        clock.advance_ms(1000);
        sender.tick();
        let tc = sender.timecode();
        assert_eq!((tc.hour, tc.minute, tc.second, tc.frame), (12, 0, 1, 0));

        clock.advance_ms(80);
        sender.tick();
        assert_eq!(sender.timecode().frame, 2);
    }

    #[test]
    fn test_stop_holds_and_resume_excludes_pause() {
        let (clock, sender) = sender();
        sender.set_timecode(TimecodeFields::new(0, 0, 0, 0));
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        sender.start();

        clock.advance_ms(400);
        sender.tick();
        sender.stop();
        assert_eq!(sender.playback_state(), PlaybackState::Paused);
        assert_eq!(sender.timecode().frame, 10);

        clock.advance_ms(5000);
        sender.tick();
        assert_eq!(sender.timecode().frame, 10);

        sender.start();
        clock.advance_ms(40);
        sender.tick();
        let tc = sender.timecode();
        assert_eq!((tc.second, tc.frame), (0, 11));
    }

    #[test]
    fn test_clock_jump_snaps_without_advancing() {
        let (clock, sender) = sender();
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        sender.start();
        clock.advance_ms(60_000);
        let tick = sender.tick();
        assert!(matches!(tick.catch_up, CatchUp::Snap(_) | CatchUp::Idle));
        let tc = sender.timecode();
        assert_eq!((tc.second, tc.frame), (0, 0));
    }

    #[test]
    fn test_rendered_frame_carries_dfbit() {
        let (_clock, sender) = sender();
        sender.set_timecode(TimecodeFields::new(1, 2, 3, 4).with_drop_frame(true));
        sender.setup(
            &audio(48000),
            &SenderSettings {
                drop_frame: true,
                ..settings(30.0)
            },
        )
        .unwrap();
        sender.tick();
        let raw: LtcFrame = sender.timecode().raw;
        assert!(raw.dfbit());
        assert_eq!((raw.hours(), raw.mins(), raw.secs(), raw.frame()), (1, 2, 3, 4));
    }

    #[test]
    fn test_setup_sets_drop_frame_flag() {
        let (_clock, sender) = sender();
        sender
            .setup(
                &audio(48000),
                &SenderSettings {
                    drop_frame: true,
                    ..settings(30.0)
                },
            )
            .unwrap();
        assert!(sender.timecode().drop_frame);
        // An explicit timecode overrides it
        sender.set_timecode(TimecodeFields::new(0, 0, 0, 0));
        assert!(!sender.timecode().drop_frame);
    }

    #[test]
    fn test_fill_output_routes_channel() {
        let (_clock, sender) = sender();
        sender
            .setup(
                &audio(48000),
                &SenderSettings {
                    channel_offset: 1,
                    ..settings(25.0)
                },
            )
            .unwrap();
        sender.teardown();
        sender.queue().clear();
        sender.queue().push_batch(&[0.5, 0.25]);

        let mut out = [9.0f32; 8];
        sender.fill_output_buffer(&mut out, 2);
        assert_eq!(out, [0.0, 0.5, 0.0, 0.25, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fill_output_ignores_state_lock() {
        let (_clock, sender) = sender();
        let sender = Arc::new(sender);
        sender.queue().push_batch(&[0.5; 32]);

        let state = sender.shared.state();
        let (tx, rx) = std::sync::mpsc::channel();
        let output = Arc::clone(&sender);
        let handle = std::thread::spawn(move || {
            let mut out = [0.0f32; 64];
            output.fill_output_buffer(&mut out, 1);
            let _ = tx.send(out[0]);
        });
        let first = rx.recv_timeout(Duration::from_millis(500));
        drop(state);
        handle.join().unwrap();
        assert_eq!(first, Ok(0.5));
    }

    #[test]
    fn test_failed_resetup_leaves_sender_inert() {
        let (_clock, sender) = sender();
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        sender.start();
        assert!(matches!(
            sender.setup(&audio(48000), &settings(-1.0)),
            Err(EngineError::InvalidFrameRate(_))
        ));
        assert!(!sender.tick().rendered);

        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        assert!(matches!(
            sender.setup(&audio(0), &settings(25.0)),
            Err(EngineError::InvalidSampleRate(0))
        ));
        assert!(!sender.tick().rendered);

        // A later good setup brings it back
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        assert!(sender.shared.encoder().is_some());
    }

    #[test]
    fn test_empty_queue_fills_silence() {
        let (_clock, sender) = sender();
        let mut out = vec![1.0f32; 256];
        sender.fill_output_buffer(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(sender.queue().underruns(), 128);
    }

    #[test]
    fn test_rendered_audio_decodes() {
        let (_clock, sender) = sender();
        sender.set_timecode(TimecodeFields::new(12, 34, 56, 7).with_date(2024, 3, 15));
        sender.setup(&audio(48000), &settings(25.0)).unwrap();
        sender.teardown();
        sender.queue().clear();
        *sender.shared.encoder() = Some(
            Encoder::new(48000.0, 25.0, TvStandard::default(), LtcFlags::USE_DATE).unwrap(),
        );
        sender.tick();
        sender.tick();

        let queue = sender.queue();
        let mut out = vec![0.0f32; queue.len()];
        queue.pop_into(&mut out, 1, 0);
        let bytes: Vec<u8> = out.iter().map(|&s| ((s + 1.0) * 127.5) as u8).collect();

        let mut decoder = Decoder::new(1920, 8).unwrap();
        decoder.write(&bytes, 0);
        let decoded = decoder.read().expect("frame decoded");
        let time = decoded.ltc.to_time(LtcFlags::USE_DATE);
        assert_eq!((time.hours, time.mins, time.secs, time.frame), (12, 34, 56, 7));
        assert_eq!((time.years, time.months, time.days), (24, 3, 15));
    }
}
