//! Bucket ids partition records by month (`YYYY-MM`) or by day (`YYYY-MM-DD`).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::error::{AppError, AppResult};

/// Month ids render as four-digit years.
const YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthId {
    year: i32,
    month: u32,
}

impl MonthId {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Moves by `delta` months, crossing year boundaries.
    pub fn shift(self, delta: i64) -> AppResult<Self> {
        let out_of_range = || AppError::validation(format!("cannot move {delta} months from {self}"));
        let index = (i64::from(self.year) * 12 + i64::from(self.month) - 1)
            .checked_add(delta)
            .ok_or_else(out_of_range)?;
        let year = i32::try_from(index.div_euclid(12))
            .ok()
            .filter(|year| YEARS.contains(year))
            .ok_or_else(out_of_range)?;
        Ok(Self {
            year,
            month: index.rem_euclid(12) as u32 + 1,
        })
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn days_in_month(self) -> u32 {
        let (year, month) = match self.month {
            12 => (self.year.saturating_add(1), 1),
            month => (self.year, month + 1),
        };
        NaiveDate::from_ymd_opt(year, month, 1).map_or(31, |next| {
            next.signed_duration_since(self.first_day()).num_days() as u32
        })
    }

    /// Human label, e.g. `December 2023`.
    pub fn display_name(self) -> String {
        format!("{} {}", MONTH_NAMES[self.month as usize - 1], self.year)
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::validation(format!("invalid month '{s}', expected YYYY-MM"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

pub fn day_id(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_day(input: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("invalid date '{input}', expected YYYY-MM-DD")))
}

/// Moves by `delta` days, `None` past the end of the calendar.
pub fn checked_shift_day(date: NaiveDate, delta: i64) -> Option<NaiveDate> {
    let step = Days::new(delta.unsigned_abs());
    if delta >= 0 {
        date.checked_add_days(step)
    } else {
        date.checked_sub_days(step)
    }
}

pub fn shift_day(date: NaiveDate, delta: i64) -> NaiveDate {
    checked_shift_day(date, delta).unwrap_or(date)
}

/// Same day-of-month in the shifted month, clamped to the month's length.
pub fn shift_month_keep_day(date: NaiveDate, delta: i64) -> Option<NaiveDate> {
    let months = Months::new(u32::try_from(delta.unsigned_abs()).ok()?);
    if delta >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn shifts_across_year_boundaries() {
        let january = MonthId::of(date(2024, 1, 15));
        let december = january.shift(-1).unwrap();
        assert_eq!(december.to_string(), "2023-12");
        assert_eq!(december.display_name(), "December 2023");
        assert_eq!(december.shift(1).unwrap(), january);
        assert_eq!(january.shift(25).unwrap().to_string(), "2026-02");
        assert_eq!(january.shift(-13).unwrap().to_string(), "2022-12");
    }

    #[test]
    fn rejects_shifts_past_four_digit_years() {
        let january = MonthId::new(2024, 1).unwrap();
        assert!(january.shift(i64::MAX).is_err());
        assert!(january.shift(i64::MIN).is_err());
        assert!(january.shift(i64::from(i32::MAX)).is_err());
        assert_eq!(january.shift(-2024 * 12).unwrap().to_string(), "0000-01");
        assert_eq!(MonthId::new(9999, 12).unwrap().days_in_month(), 31);
    }

    #[test]
    fn parses_and_rejects_month_ids() {
        assert_eq!("2024-03".parse::<MonthId>().unwrap(), MonthId::new(2024, 3).unwrap());
        assert!("2024-13".parse::<MonthId>().is_err());
        assert!("2024-3".parse::<MonthId>().is_err());
        assert!("march".parse::<MonthId>().is_err());
    }

    #[test]
    fn counts_days_in_month() {
        assert_eq!(MonthId::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(MonthId::new(2023, 2).unwrap().days_in_month(), 28);
        assert_eq!(MonthId::new(2023, 12).unwrap().days_in_month(), 31);
    }

    #[test]
    fn day_helpers_round_trip_and_shift() {
        let d = parse_day("2024-03-01").unwrap();
        assert_eq!(day_id(shift_day(d, -1)), "2024-02-29");
        assert_eq!(day_id(shift_month_keep_day(date(2024, 1, 31), 1).unwrap()), "2024-02-29");
        assert_eq!(shift_month_keep_day(date(2024, 1, 31), i64::MAX), None);
        assert_eq!(checked_shift_day(d, i64::MIN), None);
        assert!(parse_day("01/03/2024").is_err());
    }
}
