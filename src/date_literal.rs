//! Date literals and `CURRENT_DATETIME()` arithmetic.
//!
//! Dates are stored as unix timestamps. A date literal designates a whole day, a literal
//! with a time designates a whole minute; [`DateLiteral::span`] is the length of that
//! interval in seconds.

use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::ast::{Period, PeriodDirection, PeriodUnit};
use crate::duck_typed_field::DatePrecision;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Start of the designated interval and its granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateLiteral {
    pub timestamp: i64,
    pub precision: DatePrecision,
}

impl DateLiteral {
    pub fn span(&self) -> i64 {
        match self.precision {
            DatePrecision::Day => SECONDS_PER_DAY,
            DatePrecision::Minute => SECONDS_PER_MINUTE,
        }
    }

    /// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD HH:MM:SS` in `timezone`.
    /// Seconds are dropped.
    pub fn parse(text: &str, timezone: &FixedOffset) -> Option<Self> {
        if !is_well_formed(text) {
            return None;
        }

        if text.len() == 10 {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            let start = timezone
                .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
                .single()?;
            return Some(Self {
                timestamp: start.timestamp(),
                precision: DatePrecision::Day,
            });
        }

        let format = if text.len() == 16 {
            "%Y-%m-%d %H:%M"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        let date_time = NaiveDateTime::parse_from_str(text, format).ok()?;
        let local = timezone.from_local_datetime(&date_time).single()?;
        Some(Self {
            timestamp: local.timestamp() - i64::from(local.second()),
            precision: DatePrecision::Minute,
        })
    }

    /// Resolves `CURRENT_DATETIME()` shifted by `period`, at the granularity of the field.
    pub fn current(
        now: DateTime<Utc>,
        timezone: &FixedOffset,
        period: Option<&Period>,
        precision: DatePrecision,
    ) -> Option<Self> {
        let local = now.with_timezone(timezone);
        let shifted = match period {
            Some(period) => shift(local, period)?,
            None => local,
        };

        let timestamp = match precision {
            DatePrecision::Day => timezone
                .from_local_datetime(&shifted.date_naive().and_hms_opt(0, 0, 0)?)
                .single()?
                .timestamp(),
            DatePrecision::Minute => shifted.timestamp() - i64::from(shifted.second()),
        };
        Some(Self {
            timestamp,
            precision,
        })
    }
}

/// Digits and separators in the expected places, so that chrono's lenient parsing
/// (unpadded numbers, signed years) does not let odd literals through.
fn is_well_formed(text: &str) -> bool {
    let pattern: &[u8] = match text.len() {
        10 => b"dddd-dd-dd",
        16 => b"dddd-dd-dd dd:dd",
        19 => b"dddd-dd-dd dd:dd:dd",
        _ => return false,
    };
    text.bytes().zip(pattern).all(|(c, expected)| match expected {
        b'd' => c.is_ascii_digit(),
        other => c == *other,
    })
}

fn shift(date: DateTime<FixedOffset>, period: &Period) -> Option<DateTime<FixedOffset>> {
    let amount = period.amount;
    match period.unit {
        PeriodUnit::Day | PeriodUnit::Week => {
            let days = match period.unit {
                PeriodUnit::Week => i64::from(amount) * 7,
                _ => i64::from(amount),
            };
            let delta = Duration::try_days(days)?;
            match period.direction {
                PeriodDirection::Plus => date.checked_add_signed(delta),
                PeriodDirection::Minus => date.checked_sub_signed(delta),
            }
        }
        PeriodUnit::Month | PeriodUnit::Year => {
            let months = match period.unit {
                PeriodUnit::Year => amount.checked_mul(12)?,
                _ => amount,
            };
            match period.direction {
                PeriodDirection::Plus => date.checked_add_months(Months::new(months)),
                PeriodDirection::Minus => date.checked_sub_months(Months::new(months)),
            }
        }
    }
}
