//! Biphase-mark LTC encoder
//!
//! Renders one 80-bit frame at a time into unsigned 8-bit PCM. The output
//! level toggles at every bit boundary and once more in the middle of every
//! `1` bit. Fractional samples per bit are carried between frames so the
//! long-term rate matches `sample_rate / fps` exactly.

use super::frame::{LtcFrame, SmpteTime, LTC_FRAME_BITS};
use super::{LtcError, LtcFlags, TvStandard, SAMPLE_CENTER};

/// Default output level in dBFS
pub const DEFAULT_VOLUME_DBFS: f64 = -3.0;

/// Largest swing from the center value at 0 dBFS
const FULL_SCALE: f64 = 127.0;

/// LTC audio encoder
///
/// # Example
/// ```
/// use ltcsync_core::ltc::{Encoder, LtcFlags, TvStandard};
///
/// let mut encoder = Encoder::new(48000.0, 25.0, TvStandard::Tv625_50, LtcFlags::USE_DATE).unwrap();
/// encoder.encode_frame();
/// assert_eq!(encoder.buffer().len(), 1920);
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    sample_rate: f64,
    fps: f64,
    standard: TvStandard,
    flags: LtcFlags,
    frame: LtcFrame,
    /// Exact samples per LTC bit
    samples_per_bit: f64,
    /// Offset of the next frame boundary relative to the next sample (<= 0)
    carry: f64,
    /// Current output level
    level_high: bool,
    enc_hi: u8,
    enc_lo: u8,
    buffer: Vec<u8>,
}

impl Encoder {
    /// Create an encoder for the given sample rate, frame rate, standard and flags
    ///
    /// Fails if either rate is not a positive finite number or a frame would
    /// have fewer samples than bits.
    pub fn new(
        sample_rate: f64,
        fps: f64,
        standard: TvStandard,
        flags: LtcFlags,
    ) -> Result<Self, LtcError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(LtcError::InvalidSampleRate(sample_rate));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(LtcError::InvalidFrameRate(fps));
        }
        let samples_per_frame = sample_rate / fps;
        if samples_per_frame < LTC_FRAME_BITS as f64 {
            return Err(LtcError::FrameTooShort {
                samples_per_frame,
                min: LTC_FRAME_BITS,
            });
        }

        let mut encoder = Self {
            sample_rate,
            fps,
            standard: standard.resolve(fps),
            flags,
            frame: LtcFrame::default(),
            samples_per_bit: samples_per_frame / LTC_FRAME_BITS as f64,
            carry: 0.0,
            level_high: false,
            enc_hi: SAMPLE_CENTER,
            enc_lo: SAMPLE_CENTER,
            buffer: Vec::with_capacity(samples_per_frame.ceil() as usize + 1),
        };
        encoder.set_volume(DEFAULT_VOLUME_DBFS)?;
        Ok(encoder)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn standard(&self) -> TvStandard {
        self.standard
    }

    pub fn flags(&self) -> LtcFlags {
        self.flags
    }

    /// Nominal samples per frame, rounded up
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate / self.fps).ceil() as usize
    }

    /// Set the output level; must be <= 0 dBFS
    pub fn set_volume(&mut self, dbfs: f64) -> Result<(), LtcError> {
        if dbfs.is_nan() || dbfs > 0.0 {
            return Err(LtcError::VolumeOutOfRange(dbfs));
        }
        let amplitude = (FULL_SCALE * 10f64.powf(dbfs / 20.0)).round() as u8;
        self.enc_hi = SAMPLE_CENTER.saturating_add(amplitude);
        self.enc_lo = SAMPLE_CENTER.saturating_sub(amplitude);
        Ok(())
    }

    /// Load a SMPTE time into the current frame
    pub fn set_timecode(&mut self, time: &SmpteTime) {
        self.frame.set_time(time, self.standard, self.flags);
    }

    /// Current frame
    pub fn frame(&self) -> LtcFrame {
        self.frame
    }

    /// Replace the current frame, recomputing parity unless disabled
    pub fn set_frame(&mut self, frame: LtcFrame) {
        self.frame = frame;
        if !self.flags.contains(LtcFlags::NO_PARITY) {
            self.frame.set_parity(self.standard);
        }
    }

    /// Render the current frame into the internal buffer
    ///
    /// The buffer is replaced, so callers read it with [`buffer`](Self::buffer)
    /// before encoding the next frame.
    pub fn encode_frame(&mut self) {
        self.buffer.clear();
        let half = self.samples_per_bit / 2.0;
        let mut edge = self.carry;

        for bit in 0..LTC_FRAME_BITS {
            self.level_high = !self.level_high;
            edge += half;
            self.fill_until(edge);

            if self.frame.bit(bit) {
                self.level_high = !self.level_high;
            }
            edge += half;
            self.fill_until(edge);
        }

        self.carry = edge - self.buffer.len() as f64;
    }

    fn fill_until(&mut self, edge: f64) {
        let value = if self.level_high {
            self.enc_hi
        } else {
            self.enc_lo
        };
        while (self.buffer.len() as f64) < edge {
            self.buffer.push(value);
        }
    }

    /// PCM for the last encoded frame
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Reset biphase state and drop buffered audio
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.carry = 0.0;
        self.level_high = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(sample_rate: f64, fps: f64) -> Encoder {
        Encoder::new(sample_rate, fps, TvStandard::Auto, LtcFlags::USE_DATE).unwrap()
    }

    #[test]
    fn test_construction_errors() {
        let flags = LtcFlags::USE_DATE;
        assert_eq!(
            Encoder::new(0.0, 25.0, TvStandard::Tv625_50, flags).unwrap_err(),
            LtcError::InvalidSampleRate(0.0)
        );
        assert!(matches!(
            Encoder::new(48000.0, f64::NAN, TvStandard::Tv625_50, flags),
            Err(LtcError::InvalidFrameRate(_))
        ));
        assert!(matches!(
            Encoder::new(1000.0, 25.0, TvStandard::Tv625_50, flags),
            Err(LtcError::FrameTooShort { .. })
        ));
    }

    #[test]
    fn test_frame_length() {
        let mut enc = encoder(48000.0, 25.0);
        enc.encode_frame();
        assert_eq!(enc.buffer().len(), 1920);

        let mut enc = encoder(48000.0, 30.0);
        enc.encode_frame();
        assert_eq!(enc.buffer().len(), 1600);
        assert_eq!(enc.samples_per_frame(), 1600);
    }

    #[test]
    fn test_fractional_rate_carries_over() {
        // 44100 / 30 = 1470 exactly, 44100 / 29.97 is fractional
        let mut enc = encoder(44100.0, 29.97);
        let mut total = 0usize;
        let frames = 300;
        for _ in 0..frames {
            enc.encode_frame();
            total += enc.buffer().len();
        }
        let expected = 44100.0 / 29.97 * frames as f64;
        assert!(
            (total as f64 - expected).abs() <= 1.0,
            "total {} expected {}",
            total,
            expected
        );
    }

    #[test]
    fn test_levels_default_volume() {
        let mut enc = encoder(48000.0, 25.0);
        enc.encode_frame();
        let max = *enc.buffer().iter().max().unwrap();
        let min = *enc.buffer().iter().min().unwrap();
        // -3 dBFS of 127 is 90
        assert_eq!(max, 218);
        assert_eq!(min, 38);
        // First sample follows the first boundary transition
        assert_eq!(enc.buffer()[0], 218);
    }

    #[test]
    fn test_volume() {
        let mut enc = encoder(48000.0, 25.0);
        assert!(enc.set_volume(1.0).is_err());
        enc.set_volume(0.0).unwrap();
        enc.encode_frame();
        assert_eq!(*enc.buffer().iter().max().unwrap(), 255);
        assert_eq!(*enc.buffer().iter().min().unwrap(), 1);
    }

    #[test]
    fn test_biphase_transitions() {
        // 48 kHz / 25 fps = 24 samples per bit, 12 per half bit
        let mut enc = encoder(48000.0, 25.0);
        enc.encode_frame();
        let buf = enc.buffer().to_vec();
        let frame = enc.frame();

        for bit in 0..LTC_FRAME_BITS {
            let first_half = buf[bit * 24];
            let second_half = buf[bit * 24 + 12];
            if frame.bit(bit) {
                assert_ne!(first_half, second_half, "bit {} should toggle mid-bit", bit);
            } else {
                assert_eq!(first_half, second_half, "bit {} should hold", bit);
            }
            if bit > 0 {
                assert_ne!(buf[bit * 24 - 1], first_half, "bit {} boundary", bit);
            }
        }
    }

    #[test]
    fn test_set_frame_keeps_dfbit() {
        let mut enc = encoder(48000.0, 30.0);
        enc.set_timecode(&SmpteTime {
            hours: 1,
            ..SmpteTime::default()
        });
        let mut frame = enc.frame();
        frame.set_dfbit(true);
        enc.set_frame(frame);
        assert!(enc.frame().dfbit());
        assert!(enc.frame().parity_ok());
        assert_eq!(enc.frame().hours(), 1);
    }

    #[test]
    fn test_reset() {
        let mut enc = encoder(48000.0, 25.0);
        enc.encode_frame();
        enc.reset();
        assert!(enc.buffer().is_empty());
        enc.encode_frame();
        assert_eq!(enc.buffer()[0], 218);
    }
}
