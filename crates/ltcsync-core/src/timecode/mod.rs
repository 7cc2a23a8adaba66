//! Calendar + frame timecode values
//!
//! A [`Timecode`] carries a full date, time of day, frame number, timezone
//! and the drop-frame/reverse flags. The Sender advances one in place with
//! [`Timecode::advance_one_frame`]; the Receiver builds one per decoded frame.

pub mod calendar;

use crate::clock::Clock;
use crate::ltc::{DecodedFrame, LtcFrame, SmpteTime};
use chrono::{DateTime, Utc};
use std::fmt;

pub use calendar::{days_in_month, is_leap_year};

/// Two-digit years below this map to 20xx, others to 19xx
pub const CENTURY_PIVOT: u8 = 67;

/// Expand a two-digit LTC year to four digits
///
/// # Example
/// ```
/// use ltcsync_core::timecode::expand_year;
///
/// assert_eq!(expand_year(30), 2030);
/// assert_eq!(expand_year(70), 1970);
/// ```
pub fn expand_year(two_digit: u8) -> u16 {
    if two_digit < CENTURY_PIVOT {
        2000 + u16::from(two_digit)
    } else {
        1900 + u16::from(two_digit)
    }
}

/// Requested timecode fields before calendar defaults are applied
///
/// Date components that are zero, negative, or out of range are replaced by
/// today's date when resolved with [`Timecode::from_fields`]. Time-of-day
/// and frame are taken as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimecodeFields {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub timezone: String,
    pub drop_frame: bool,
    pub reverse: bool,
}

impl TimecodeFields {
    /// Time of day with today's date, default timezone, no flags
    pub fn new(hour: u8, minute: u8, second: u8, frame: u8) -> Self {
        Self {
            hour,
            minute,
            second,
            frame,
            year: 0,
            month: 0,
            day: 0,
            timezone: crate::DEFAULT_TIMEZONE.to_string(),
            drop_frame: false,
            reverse: false,
        }
    }

    pub fn with_date(mut self, year: i32, month: i32, day: i32) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_drop_frame(mut self, drop_frame: bool) -> Self {
        self.drop_frame = drop_frame;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

impl Default for TimecodeFields {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// A timecode instant: date, time, frame, timezone and flags
#[derive(Debug, Clone, PartialEq)]
pub struct Timecode {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
    /// Offset from UTC as `"+HHMM"`
    pub timezone: String,
    pub drop_frame: bool,
    pub reverse: bool,
    /// Last frame rendered or decoded for this value
    pub raw: LtcFrame,
    /// When the frame was recovered (decoded values only)
    pub received_at: Option<DateTime<Utc>>,
}

impl Timecode {
    /// Resolve requested fields, filling missing date parts from `clock`
    ///
    /// Year is resolved first, then month, then day against the resolved
    /// year and month.
    pub fn from_fields(fields: &TimecodeFields, clock: &dyn Clock) -> Self {
        let today = clock.today();

        let year = if fields.year <= 0 {
            today.year
        } else {
            fields.year
        };
        let month = if fields.month <= 0 || fields.month > 12 {
            today.month as i32
        } else {
            fields.month
        };
        let day = if fields.day <= 0 || fields.day > i32::from(days_in_month(year, month)) {
            today.day as i32
        } else {
            fields.day
        };

        let mut raw = LtcFrame::default();
        raw.set_dfbit(fields.drop_frame);

        Self {
            year,
            month: month as u8,
            day: day as u8,
            hour: fields.hour,
            minute: fields.minute,
            second: fields.second,
            frame: fields.frame,
            timezone: fields.timezone.clone(),
            drop_frame: fields.drop_frame,
            reverse: fields.reverse,
            raw,
            received_at: None,
        }
    }

    /// Build a value from a SMPTE time struct, applying the century rule
    pub fn from_smpte(time: &SmpteTime) -> Self {
        Self {
            year: i32::from(expand_year(time.years)),
            month: time.months,
            day: time.days,
            hour: time.hours,
            minute: time.mins,
            second: time.secs,
            frame: time.frame,
            timezone: time.timezone.clone(),
            ..Self::default()
        }
    }

    /// Build a value from a decoded frame and its translated time
    pub fn from_decoded(
        decoded: &DecodedFrame,
        time: &SmpteTime,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            drop_frame: decoded.ltc.dfbit(),
            reverse: decoded.reverse,
            raw: decoded.ltc,
            received_at: Some(received_at),
            ..Self::from_smpte(time)
        }
    }

    /// SMPTE time struct for the encoder; date fields only with `use_date`
    pub fn to_smpte(&self, use_date: bool) -> SmpteTime {
        let mut time = SmpteTime {
            hours: self.hour,
            mins: self.minute,
            secs: self.second,
            frame: self.frame,
            ..SmpteTime::default()
        };
        if use_date {
            time.timezone = self.timezone.clone();
            time.years = self.year.rem_euclid(100) as u8;
            time.months = self.month;
            time.days = self.day;
        }
        time
    }

    /// Advance by one frame, rolling over through the calendar
    ///
    /// `fps` may be fractional (29.97 counts frames 0..=29).
    pub fn advance_one_frame(&mut self, fps: f32) {
        self.frame = self.frame.wrapping_add(1);
        if f32::from(self.frame) < fps {
            return;
        }
        self.frame = 0;

        self.second = self.second.wrapping_add(1);
        if self.second < 60 {
            return;
        }
        self.second = 0;

        self.minute = self.minute.wrapping_add(1);
        if self.minute < 60 {
            return;
        }
        self.minute = 0;

        self.hour = self.hour.wrapping_add(1);
        if self.hour < 24 {
            return;
        }
        self.hour = 0;

        self.day = self.day.wrapping_add(1);
        if self.day <= days_in_month(self.year, i32::from(self.month)) {
            return;
        }
        self.day = 1;

        self.month = self.month.wrapping_add(1);
        if self.month <= 12 {
            return;
        }
        self.month = 1;
        self.year = self.year.saturating_add(1);
    }

    /// Fixed-width display form, e.g. `2024/03/15[+0900] 12:00:00:00`
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

impl Default for Timecode {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            frame: 0,
            timezone: crate::DEFAULT_TIMEZONE.to_string(),
            drop_frame: false,
            reverse: false,
            raw: LtcFrame::default(),
            received_at: None,
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}/{:02}/{:02}[{}] {:02}:{:02}:{:02}{}{:02}",
            self.year,
            self.month,
            self.day,
            self.timezone,
            self.hour,
            self.minute,
            self.second,
            if self.drop_frame { '.' } else { ':' },
            self.frame
        )
    }
}
