//! Time sources for the timecode engines
//!
//! The engines never read the wall clock directly. Everything goes through a
//! [`Clock`] so tests can substitute a [`ManualClock`] and step time by hand.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Calendar date as plain integers (year, month 1-12, day 1-31)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Source of monotonic time, calendar date, and wall-clock instants
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since an arbitrary fixed origin
    fn elapsed_ms(&self) -> i64;

    /// Today's date in the local calendar
    fn today(&self) -> CalendarDate;

    /// Current wall-clock instant
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Clock backed by [`Instant`] and the system's local calendar
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Shared handle suitable for passing to the engines
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    fn today(&self) -> CalendarDate {
        Local::now().date_naive().into()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests
///
/// Time only moves when [`advance_ms`](ManualClock::advance_ms) or
/// [`set_ms`](ManualClock::set_ms) is called.
///
/// # Example
/// ```
/// use ltcsync_core::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(2024, 3, 15);
/// clock.advance_ms(40);
/// assert_eq!(clock.elapsed_ms(), 40);
/// assert_eq!(clock.today().day, 15);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    ms: AtomicI64,
    date: Mutex<NaiveDate>,
}

impl ManualClock {
    /// Create a clock at elapsed 0 on the given date
    ///
    /// Out-of-range dates fall back to 1970-01-01.
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        let date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
        Self {
            ms: AtomicI64::new(0),
            date: Mutex::new(date),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: i64) {
        self.ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_date(&self, year: i32, month: u32, day: u32) {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            *self.date.lock().unwrap_or_else(|e| e.into_inner()) = date;
        }
    }

    fn date(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn elapsed_ms(&self) -> i64 {
        self.ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> CalendarDate {
        self.date().into()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let midnight = self.date().and_time(chrono::NaiveTime::MIN).and_utc();
        midnight + TimeDelta::milliseconds(self.elapsed_ms())
    }
}
