//! Gregorian calendar helpers used by timecode rollover

/// Days per month for a non-leap year
const DAYS_PER_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Length used for months outside 1-12
const FALLBACK_MONTH_DAYS: u8 = 30;

/// Gregorian leap year rule
///
/// # Example
/// ```
/// use ltcsync_core::timecode::calendar::is_leap_year;
///
/// assert!(is_leap_year(2024));
/// assert!(!is_leap_year(1900));
/// assert!(is_leap_year(2000));
/// ```
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` of `year`
///
/// Months outside 1-12 yield 30 instead of failing.
pub fn days_in_month(year: i32, month: i32) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        1..=12 => DAYS_PER_MONTH[(month - 1) as usize],
        _ => FALLBACK_MONTH_DAYS,
    }
}
