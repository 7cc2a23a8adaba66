//! 80-bit LTC frame layout and SMPTE time conversion
//!
//! ## Bit Layout
//!
//! Bits are stored LSB-first in 10 bytes, bit 0 is transmitted first:
//!
//! ```text
//! [0..4]   frame units        [4..8]   user 1
//! [8..10]  frame tens         [10]     drop-frame flag
//! [11]     colour frame       [12..16] user 2
//! [16..20] seconds units      [20..24] user 3
//! [24..27] seconds tens       [27]     parity (525/60) or BGF0 (625/50)
//! [28..32] user 4             [32..36] minutes units
//! [36..40] user 5             [40..43] minutes tens
//! [43]     BGF0 (525/60) or BGF2 (625/50)
//! [44..48] user 6             [48..52] hours units
//! [52..56] user 7             [56..58] hours tens
//! [58]     BGF1               [59]     BGF2 (525/60) or parity (625/50)
//! [60..64] user 8             [64..80] sync word
//! ```
//!
//! With date enabled, user bits carry day (1/2), month (3/4), two-digit year
//! (5/6) and a timezone code (7 low nibble, 8 high nibble).

use super::{LtcFlags, TvStandard};
use std::sync::atomic::{AtomicBool, Ordering};

/// Total bits in one LTC frame
pub const LTC_FRAME_BITS: usize = 80;

/// Sync word as stored in bits 64..80 (LSB-first)
pub const SYNC_WORD: u16 = 0xBFFC;

/// Timezone codes for the date user bits (SMPTE 309M)
const TIMEZONE_CODES: [(u8, &str); 51] = [
    (0x00, "+0000"),
    (0x01, "-0100"),
    (0x02, "-0200"),
    (0x03, "-0300"),
    (0x04, "-0400"),
    (0x05, "-0500"),
    (0x06, "-0600"),
    (0x07, "-0700"),
    (0x08, "-0800"),
    (0x09, "-0900"),
    (0x10, "-1000"),
    (0x11, "-1100"),
    (0x12, "-1200"),
    (0x13, "+1300"),
    (0x14, "+1200"),
    (0x15, "+1100"),
    (0x16, "+1000"),
    (0x17, "+0900"),
    (0x18, "+0800"),
    (0x19, "+0700"),
    (0x20, "+0600"),
    (0x21, "+0500"),
    (0x22, "+0400"),
    (0x23, "+0300"),
    (0x24, "+0200"),
    (0x25, "+0100"),
    (0x0A, "-0030"),
    (0x0B, "-0130"),
    (0x0C, "-0230"),
    (0x0D, "-0330"),
    (0x0E, "-0430"),
    (0x0F, "-0530"),
    (0x1A, "-0630"),
    (0x1B, "-0730"),
    (0x1C, "-0830"),
    (0x1D, "-0930"),
    (0x1E, "-1030"),
    (0x1F, "-1130"),
    (0x2A, "+1130"),
    (0x2B, "+1030"),
    (0x2C, "+0930"),
    (0x2D, "+0830"),
    (0x2E, "+0730"),
    (0x2F, "+0630"),
    (0x3A, "+0530"),
    (0x3B, "+0430"),
    (0x3C, "+0330"),
    (0x3D, "+0230"),
    (0x3E, "+0130"),
    (0x3F, "+0030"),
    (0x32, "+1245"),
];

/// Set once an unrepresentable timezone has been reported
static UNKNOWN_TIMEZONE_WARNED: AtomicBool = AtomicBool::new(false);

/// Timezone used when a code or string is not in the table
pub const UTC_TIMEZONE: &str = "+0000";

/// Look up the user-bit code for a `"+HHMM"` timezone string
///
/// Offsets missing from the table encode as UTC; the first one seen is
/// logged.
pub fn timezone_code(timezone: &str) -> u8 {
    if timezone == "-0000" {
        return 0x00;
    }
    match TIMEZONE_CODES.iter().find(|(_, tz)| *tz == timezone) {
        Some((code, _)) => *code,
        None => {
            if !UNKNOWN_TIMEZONE_WARNED.swap(true, Ordering::Relaxed) {
                tracing::warn!(timezone, "Timezone has no LTC code, encoding as +0000");
            }
            0x00
        }
    }
}

/// Look up the timezone string for a user-bit code
pub fn timezone_for_code(code: u8) -> &'static str {
    TIMEZONE_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, tz)| *tz)
        .unwrap_or(UTC_TIMEZONE)
}

/// SMPTE time struct exchanged with the codec
///
/// Years are two-digit. Date fields are zero when the frame carries no date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmpteTime {
    pub timezone: String,
    pub years: u8,
    pub months: u8,
    pub days: u8,
    pub hours: u8,
    pub mins: u8,
    pub secs: u8,
    pub frame: u8,
}

impl Default for SmpteTime {
    fn default() -> Self {
        Self {
            timezone: UTC_TIMEZONE.to_string(),
            years: 0,
            months: 0,
            days: 0,
            hours: 0,
            mins: 0,
            secs: 0,
            frame: 0,
        }
    }
}

/// One raw LTC frame (80 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LtcFrame {
    bytes: [u8; 10],
}

impl Default for LtcFrame {
    fn default() -> Self {
        let mut frame = Self { bytes: [0; 10] };
        frame.set_field(64, 16, SYNC_WORD as u32);
        frame
    }
}

impl LtcFrame {
    /// Build a frame from raw bytes (bit 0 = LSB of byte 0)
    pub fn from_bytes(bytes: [u8; 10]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.bytes
    }

    /// Read one bit by transmission index
    pub fn bit(&self, index: usize) -> bool {
        (self.bytes[index / 8] >> (index % 8)) & 1 == 1
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        let mask = 1u8 << (index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
    }

    fn field(&self, start: usize, width: usize) -> u32 {
        (0..width).fold(0u32, |acc, i| acc | (u32::from(self.bit(start + i)) << i))
    }

    fn set_field(&mut self, start: usize, width: usize, value: u32) {
        for i in 0..width {
            self.set_bit(start + i, (value >> i) & 1 == 1);
        }
    }

    pub fn has_sync_word(&self) -> bool {
        self.field(64, 16) == SYNC_WORD as u32
    }

    pub fn frame(&self) -> u8 {
        (self.field(0, 4) + self.field(8, 2) * 10) as u8
    }

    pub fn secs(&self) -> u8 {
        (self.field(16, 4) + self.field(24, 3) * 10) as u8
    }

    pub fn mins(&self) -> u8 {
        (self.field(32, 4) + self.field(40, 3) * 10) as u8
    }

    pub fn hours(&self) -> u8 {
        (self.field(48, 4) + self.field(56, 2) * 10) as u8
    }

    pub fn set_frame(&mut self, value: u8) {
        self.set_field(0, 4, u32::from(value % 10));
        self.set_field(8, 2, u32::from(value / 10));
    }

    pub fn set_secs(&mut self, value: u8) {
        self.set_field(16, 4, u32::from(value % 10));
        self.set_field(24, 3, u32::from(value / 10));
    }

    pub fn set_mins(&mut self, value: u8) {
        self.set_field(32, 4, u32::from(value % 10));
        self.set_field(40, 3, u32::from(value / 10));
    }

    pub fn set_hours(&mut self, value: u8) {
        self.set_field(48, 4, u32::from(value % 10));
        self.set_field(56, 2, u32::from(value / 10));
    }

    /// Drop-frame flag
    pub fn dfbit(&self) -> bool {
        self.bit(10)
    }

    pub fn set_dfbit(&mut self, value: bool) {
        self.set_bit(10, value);
    }

    pub fn color_frame(&self) -> bool {
        self.bit(11)
    }

    /// User-bit nibble 1..=8
    pub fn user(&self, group: usize) -> u8 {
        self.field(user_bit_start(group), 4) as u8
    }

    pub fn set_user(&mut self, group: usize, value: u8) {
        self.set_field(user_bit_start(group), 4, u32::from(value & 0x0F));
    }

    /// Bit index of the parity (polarity correction) bit for a standard
    fn parity_index(standard: TvStandard) -> usize {
        match standard {
            TvStandard::Tv625_50 => 59,
            _ => 27,
        }
    }

    /// Set the parity bit so the frame holds an even number of ones
    pub fn set_parity(&mut self, standard: TvStandard) {
        let index = Self::parity_index(standard);
        self.set_bit(index, false);
        let ones: u32 = self.bytes.iter().map(|b| b.count_ones()).sum();
        self.set_bit(index, ones % 2 == 1);
    }

    pub fn parity_ok(&self) -> bool {
        self.bytes.iter().map(|b| b.count_ones()).sum::<u32>() % 2 == 0
    }

    /// Clear the binary group flags for a standard
    fn clear_group_flags(&mut self, standard: TvStandard) {
        let flags: [usize; 3] = match standard {
            TvStandard::Tv625_50 => [27, 43, 58],
            _ => [43, 58, 59],
        };
        for index in flags {
            self.set_bit(index, false);
        }
    }

    /// Write `time` into this frame's timecode and (optionally) date fields
    ///
    /// The drop-frame flag is left untouched.
    pub fn set_time(&mut self, time: &SmpteTime, standard: TvStandard, flags: LtcFlags) {
        if flags.contains(LtcFlags::USE_DATE) {
            let code = timezone_code(&time.timezone);
            self.set_user(7, code & 0x0F);
            self.set_user(8, (code & 0xF0) >> 4);
            self.set_user(6, time.years / 10);
            self.set_user(5, time.years % 10);
            self.set_user(4, time.months / 10);
            self.set_user(3, time.months % 10);
            self.set_user(2, time.days / 10);
            self.set_user(1, time.days % 10);
        }

        self.set_hours(time.hours);
        self.set_mins(time.mins);
        self.set_secs(time.secs);
        self.set_frame(time.frame);

        if !flags.contains(LtcFlags::BGF_DONT_TOUCH) {
            self.clear_group_flags(standard);
        }
        if !flags.contains(LtcFlags::NO_PARITY) {
            self.set_parity(standard);
        }
    }

    /// Build a fresh frame from a SMPTE time
    pub fn from_time(time: &SmpteTime, standard: TvStandard, flags: LtcFlags) -> Self {
        let mut frame = Self::default();
        frame.set_time(time, standard, flags);
        frame
    }

    /// Extract the SMPTE time, including the date when `USE_DATE` is set
    pub fn to_time(&self, flags: LtcFlags) -> SmpteTime {
        let mut time = SmpteTime {
            hours: self.hours(),
            mins: self.mins(),
            secs: self.secs(),
            frame: self.frame(),
            ..SmpteTime::default()
        };

        if flags.contains(LtcFlags::USE_DATE) {
            let code = self.user(7) | (self.user(8) << 4);
            time.timezone = timezone_for_code(code).to_string();
            time.years = self.user(5) + self.user(6) * 10;
            time.months = self.user(3) + self.user(4) * 10;
            time.days = self.user(1) + self.user(2) * 10;
        }

        time
    }
}

/// First bit index of user-bit group 1..=8
fn user_bit_start(group: usize) -> usize {
    match group {
        1 => 4,
        2 => 12,
        3 => 20,
        4 => 28,
        5 => 36,
        6 => 44,
        7 => 52,
        _ => 60,
    }
}
