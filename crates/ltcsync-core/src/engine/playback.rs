//! Playback state and drift-corrected frame catch-up
//!
//! The encode loop does not count its own iterations. Each tick it asks
//! [`PlaybackClock::catch_up`] how many frames the timecode should have
//! advanced since playback started, so loop jitter never accumulates.

/// Catch-up counts at or above this are treated as a clock jump
pub const MAX_CATCH_UP_FRAMES: i64 = 1000;

/// Sender playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Result of one catch-up computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUp {
    /// Not playing, or already up to date
    Idle,
    /// Advance the timecode this many frames
    Advance(u32),
    /// Clock went backwards by this many frames; nothing advanced
    Negative(i64),
    /// Gap of this many frames; counter snapped without advancing
    Snap(i64),
}

/// Playback timing anchored to a millisecond clock
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    state: PlaybackState,
    start_ms: i64,
    frames_advanced: i64,
    paused_at_ms: Option<i64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn frames_advanced(&self) -> i64 {
        self.frames_advanced
    }

    /// Begin or resume playback at `now_ms`
    ///
    /// Resuming shifts the start instant forward by the pause length so the
    /// paused interval never counts toward the frames owed. Returns `true`
    /// when playback started fresh rather than resumed.
    pub fn start(&mut self, now_ms: i64) -> bool {
        match self.state {
            PlaybackState::Playing => false,
            PlaybackState::Paused => {
                if let Some(paused_at) = self.paused_at_ms.take() {
                    self.start_ms += now_ms - paused_at;
                }
                self.state = PlaybackState::Playing;
                false
            }
            PlaybackState::Stopped => {
                self.start_ms = now_ms;
                self.frames_advanced = 0;
                self.paused_at_ms = None;
                self.state = PlaybackState::Playing;
                true
            }
        }
    }

    /// Pause at `now_ms`; only meaningful while playing
    pub fn stop(&mut self, now_ms: i64) {
        if self.state == PlaybackState::Playing {
            self.paused_at_ms = Some(now_ms);
            self.state = PlaybackState::Paused;
        }
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Frames owed at `now_ms` for `fps`, updating the advanced counter
    pub fn catch_up(&mut self, now_ms: i64, fps: f32) -> CatchUp {
        if self.state != PlaybackState::Playing || fps.is_nan() || fps <= 0.0 {
            return CatchUp::Idle;
        }

        // elapsed / (1000 / fps), multiplied out to keep whole seconds exact
        let elapsed = (now_ms - self.start_ms) as f64;
        let expected = (elapsed * f64::from(fps) / 1000.0).floor() as i64;
        let owed = expected - self.frames_advanced;

        if owed == 0 {
            CatchUp::Idle
        } else if owed < 0 {
            CatchUp::Negative(owed)
        } else if owed >= MAX_CATCH_UP_FRAMES {
            self.frames_advanced = expected;
            CatchUp::Snap(owed)
        } else {
            self.frames_advanced = expected;
            CatchUp::Advance(owed as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let clock = PlaybackClock::new();
        assert_eq!(clock.state(), PlaybackState::Stopped);
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_idle_when_stopped() {
        let mut clock = PlaybackClock::new();
        assert_eq!(clock.catch_up(5000, 25.0), CatchUp::Idle);
    }

    #[test]
    fn test_advance_by_elapsed_frames() {
        let mut clock = PlaybackClock::new();
        assert!(clock.start(1000));
        assert_eq!(clock.catch_up(1000, 25.0), CatchUp::Idle);
        assert_eq!(clock.catch_up(1039, 25.0), CatchUp::Idle);
        assert_eq!(clock.catch_up(1040, 25.0), CatchUp::Advance(1));
        assert_eq!(clock.catch_up(1200, 25.0), CatchUp::Advance(4));
        assert_eq!(clock.frames_advanced(), 5);
    }

    #[test]
    fn test_pause_excludes_paused_time() {
        let mut clock = PlaybackClock::new();
        clock.start(0);
        assert_eq!(clock.catch_up(400, 25.0), CatchUp::Advance(10));

        clock.stop(400);
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert_eq!(clock.catch_up(10_000, 25.0), CatchUp::Idle);

        assert!(!clock.start(10_400));
        assert_eq!(clock.start_ms(), 10_000);
        assert_eq!(clock.catch_up(10_400, 25.0), CatchUp::Idle);
        assert_eq!(clock.catch_up(10_440, 25.0), CatchUp::Advance(1));
    }

    #[test]
    fn test_negative_catch_up_clamps() {
        let mut clock = PlaybackClock::new();
        clock.start(1000);
        clock.catch_up(2000, 25.0);
        assert_eq!(clock.catch_up(1500, 25.0), CatchUp::Negative(-13));
        // Counter untouched, nothing owed until time passes the old mark
        assert_eq!(clock.frames_advanced(), 25);
        assert_eq!(clock.catch_up(2000, 25.0), CatchUp::Idle);
    }

    #[test]
    fn test_large_gap_snaps() {
        let mut clock = PlaybackClock::new();
        clock.start(0);
        assert_eq!(clock.catch_up(60_000, 25.0), CatchUp::Snap(1500));
        assert_eq!(clock.frames_advanced(), 1500);
        assert_eq!(clock.catch_up(60_040, 25.0), CatchUp::Advance(1));
    }

    #[test]
    fn test_restart_after_reset() {
        let mut clock = PlaybackClock::new();
        clock.start(0);
        clock.catch_up(1000, 30.0);
        clock.reset();
        assert!(clock.start(5000));
        assert_eq!(clock.frames_advanced(), 0);
        assert_eq!(clock.catch_up(5000, 30.0), CatchUp::Idle);
    }
}
