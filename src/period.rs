//! Calendar-period bucketing
//!
//! A [`Period`] turns an arbitrary UTC timestamp into canonical bucket
//! boundaries for one of six granularities: hour, day, week, month, quarter,
//! year. Hours, days and weeks step by a fixed delta; months, quarters and
//! years step calendar-relative so that ranges advance correctly across
//! months of different lengths and leap years.
//!
//! Periods are plain `Copy` values with no per-call state, so they are safe
//! to share across threads and queries.

use crate::record::{Record, Value, TIMESTAMP_FIELD};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// A calendar granularity for bucketing timestamps
///
/// All boundary math is in UTC. Weeks start on Monday; quarters start in
/// January, April, July and October.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Clock hour
    Hour,
    /// Calendar day (midnight to midnight)
    Day,
    /// ISO week, Monday start
    Week,
    /// Calendar month
    Month,
    /// Calendar quarter (Jan/Apr/Jul/Oct)
    Quarter,
    /// Calendar year
    Year,
}

impl Period {
    /// All granularities, for iteration and argument validation
    pub const ALL: [Period; 6] = [
        Period::Hour,
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Quarter,
        Period::Year,
    ];

    /// Parse a granularity name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "hour" => Some(Period::Hour),
            "day" => Some(Period::Day),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "quarter" => Some(Period::Quarter),
            "year" => Some(Period::Year),
            _ => None,
        }
    }

    /// The granularity name
    pub fn name(&self) -> &'static str {
        match self {
            Period::Hour => "hour",
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }

    /// The record field holding this granularity's bucket start
    pub fn start_at_key(&self) -> &'static str {
        match self {
            Period::Hour => "_hour_start_at",
            Period::Day => "_day_start_at",
            Period::Week => "_week_start_at",
            Period::Month => "_month_start_at",
            Period::Quarter => "_quarter_start_at",
            Period::Year => "_year_start_at",
        }
    }

    /// Floor a timestamp to the start of its enclosing bucket
    ///
    /// Idempotent: `start(start(t)) == start(t)`, and the result is never
    /// later than `t`.
    pub fn start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::Hour => t
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(t),
            Period::Day => midnight(t),
            Period::Week => {
                let day = midnight(t);
                day - Duration::days(day.weekday().num_days_from_monday() as i64)
            }
            Period::Month => midnight(t).with_day(1).unwrap_or_else(|| midnight(t)),
            Period::Quarter => {
                let quarter_month = (t.month0() / 3) * 3 + 1;
                midnight(t)
                    .with_day(1)
                    .and_then(|d| d.with_month(quarter_month))
                    .unwrap_or_else(|| midnight(t))
            }
            Period::Year => midnight(t)
                .with_day(1)
                .and_then(|d| d.with_month(1))
                .unwrap_or_else(|| midnight(t)),
        }
    }

    /// The inclusive right edge of the bucket containing `t`
    ///
    /// Returns `t` unchanged when it already lies on a bucket boundary, so
    /// that a window ending exactly on a boundary is not widened into the
    /// next bucket. Otherwise returns the start of the next bucket.
    pub fn end(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        if self.valid_start_at(t) {
            t
        } else {
            self.start(self.step_forward(t, 1))
        }
    }

    /// Whether `t` lies exactly on one of this granularity's boundaries
    pub fn valid_start_at(&self, t: DateTime<Utc>) -> bool {
        match self {
            Period::Hour => t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0,
            Period::Day => is_midnight(t),
            Period::Week => t.weekday() == Weekday::Mon && is_midnight(t),
            Period::Month => t.day() == 1 && is_midnight(t),
            Period::Quarter => {
                t.day() == 1 && matches!(t.month(), 1 | 4 | 7 | 10) && is_midnight(t)
            }
            Period::Year => t.month() == 1 && t.day() == 1 && is_midnight(t),
        }
    }

    /// Step a timestamp forward by `n` periods (`n` may be negative)
    ///
    /// Hour/day/week use fixed deltas; month/quarter/year step
    /// calendar-relative, clamping the day of month where the target month
    /// is shorter.
    pub fn step_forward(&self, t: DateTime<Utc>, n: i64) -> DateTime<Utc> {
        match self {
            Period::Hour => t + Duration::hours(n),
            Period::Day => t + Duration::days(n),
            Period::Week => t + Duration::weeks(n),
            Period::Month => add_months(t, n),
            Period::Quarter => add_months(t, 3 * n),
            Period::Year => add_months(t, 12 * n),
        }
    }

    /// Enumerate the buckets spanning `[start, end]`
    ///
    /// Yields `(bucket_start, bucket_next)` pairs in ascending order, from
    /// `start(start)` through `end(end)`, strictly increasing and
    /// non-overlapping.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PeriodRange {
        PeriodRange {
            period: *self,
            cursor: self.start(start),
            end: self.end(end),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Iterator over the buckets of a time interval
///
/// Created by [`Period::range`]. Finite and restartable: a fresh call to
/// `range` always yields the same sequence for the same inputs.
#[derive(Debug, Clone)]
pub struct PeriodRange {
    period: Period,
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Iterator for PeriodRange {
    type Item = (DateTime<Utc>, DateTime<Utc>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let next = self.period.step_forward(self.cursor, 1);
        let bucket = (self.cursor, next);
        self.cursor = next;
        Some(bucket)
    }
}

/// Stamp every granularity's bucket start onto a record
///
/// Reads `_timestamp` and inserts `_hour_start_at` through `_year_start_at`.
/// Records without a `_timestamp` are left untouched. The write path must
/// apply this before saving, or period grouping has nothing to group on.
pub fn add_period_keys(record: &mut Record) {
    if let Some(timestamp) = record.time(TIMESTAMP_FIELD) {
        for period in Period::ALL {
            record.insert(period.start_at_key(), Value::Time(period.start(timestamp)));
        }
    }
}

fn is_midnight(t: DateTime<Utc>) -> bool {
    t.hour() == 0 && t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0
}

fn midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(t)
}

fn add_months(t: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    let total = t.year() as i64 * 12 + t.month0() as i64 + months;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = t.day().min(days_in_month(year, month));

    Utc.with_ymd_and_hms(year, month, day, t.hour(), t.minute(), t.second())
        .single()
        .and_then(|d| d.with_nanosecond(t.nanosecond()))
        .unwrap_or(t)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
