//! E2E tests for calendar arithmetic and timecode values
//!
//! Checks the Gregorian month table against chrono for every month over
//! several centuries, frame cascades at the common frame rates, and the
//! two-digit year mapping used by the receiver.

use chrono::{Datelike, NaiveDate};
use ltcsync::timecode::{days_in_month, expand_year, is_leap_year};
use ltcsync::{ManualClock, Timecode, TimecodeFields};

fn at(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8, frame: u8) -> Timecode {
    Timecode {
        year,
        month,
        day,
        hour,
        minute,
        second,
        frame,
        ..Timecode::default()
    }
}

#[test]
fn test_days_in_month_matches_gregorian_calendar() {
    for year in 1600..=2400 {
        for month in 1..=12u32 {
            let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
            let next = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
            };
            let expected = (next - first).num_days() as u8;
            assert_eq!(
                days_in_month(year, month as i32),
                expected,
                "{}-{:02}",
                year,
                month
            );
        }
        assert_eq!(
            days_in_month(year, 2) == 29,
            is_leap_year(year),
            "leap {}",
            year
        );
    }
}

#[test]
fn test_invalid_month_has_thirty_days() {
    assert_eq!(days_in_month(2024, 0), 30);
    assert_eq!(days_in_month(2024, 13), 30);
}

#[test]
fn test_one_second_at_common_rates() {
    for fps in [24u8, 25, 30] {
        let mut tc = at(2024, 6, 1, 8, 30, 15, 0);
        for _ in 0..fps {
            tc.advance_one_frame(f32::from(fps));
        }
        assert_eq!((tc.minute, tc.second, tc.frame), (30, 16, 0), "fps {}", fps);
    }
}

#[test]
fn test_year_rollover_at_common_rates() {
    for fps in [24u8, 25, 30] {
        let mut tc = at(2023, 12, 31, 23, 59, 59, fps - 1);
        tc.advance_one_frame(f32::from(fps));
        assert_eq!(tc, at(2024, 1, 1, 0, 0, 0, 0), "fps {}", fps);
    }
}

#[test]
fn test_full_day_advances_date() {
    let mut tc = at(2024, 2, 28, 0, 0, 0, 0);
    for _ in 0..(24 * 60 * 60 * 25) {
        tc.advance_one_frame(25.0);
    }
    assert_eq!(tc, at(2024, 2, 29, 0, 0, 0, 0));
}

#[test]
fn test_advance_agrees_with_chrono_across_year() {
    // Step an hour at a time through 2024 at 1 fps and compare dates
    let mut tc = at(2024, 1, 1, 0, 0, 0, 0);
    let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for day in 0..366 {
        assert_eq!(
            (tc.year, u32::from(tc.month), u32::from(tc.day)),
            (date.year(), date.month(), date.day()),
            "day {}",
            day
        );
        for _ in 0..(24 * 60 * 60) {
            tc.advance_one_frame(1.0);
        }
        date = date.succ_opt().unwrap();
    }
    assert_eq!((tc.year, tc.month, tc.day), (2025, 1, 1));
}

#[test]
fn test_century_rule() {
    assert_eq!(expand_year(30), 2030);
    assert_eq!(expand_year(70), 1970);
    assert_eq!(expand_year(66), 2066);
    assert_eq!(expand_year(67), 1967);
}

#[test]
fn test_fields_fall_back_to_clock_date() {
    let clock = ManualClock::new(2031, 11, 15);
    let tc = Timecode::from_fields(
        &TimecodeFields::new(5, 6, 7, 8).with_date(0, 2, 31),
        &clock,
    );
    // Month kept, day 31 does not exist in February so today's day is used
    assert_eq!((tc.year, tc.month, tc.day), (2031, 2, 15));
}

#[test]
fn test_display_format() {
    let tc = Timecode {
        timezone: "-0500".to_string(),
        ..at(1999, 12, 31, 23, 59, 59, 29)
    };
    assert_eq!(tc.to_string(), "1999/12/31[-0500] 23:59:59:29");
}
