//! Result shaping
//!
//! Each of the four query shapes has its own post-processing wrapper around
//! the raw rows storage returned:
//!
//! - [`SimpleData`]: plain filtered reads, rows pass through
//! - [`GroupedData`]: one row per group value
//! - [`PeriodData`]: one row per time bucket, gap-fillable
//! - [`GroupedPeriodData`]: one row per (group value, bucket) cell,
//!   gap-fillable over the full permutation space
//!
//! The period-shaped wrappers normalize storage rows on construction: the
//! granularity's start-at field (e.g. `_week_start_at`) is replaced by
//! `_start_at`/`_end_at` bucket boundaries, so downstream consumers see one
//! uniform shape whether a row is real or synthesized.

mod fill;

pub use fill::FillError;

use crate::period::Period;
use crate::record::{Record, Value, END_AT_FIELD, START_AT_FIELD};
use chrono::{DateTime, Utc};

/// Rows from an ungrouped, unbucketed query
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleData {
    data: Vec<Record>,
}

impl SimpleData {
    /// Wrap raw storage rows
    pub fn new(data: Vec<Record>) -> Self {
        Self { data }
    }

    /// The rows, in storage order
    pub fn rows(&self) -> &[Record] {
        &self.data
    }

    /// Consume into the rows
    pub fn into_rows(self) -> Vec<Record> {
        self.data
    }
}

/// Rows from a group-by query, one per group value
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedData {
    data: Vec<Record>,
}

impl GroupedData {
    /// Wrap raw grouped rows
    pub fn new(data: Vec<Record>) -> Self {
        Self { data }
    }

    /// The rows, one per group value
    pub fn rows(&self) -> &[Record] {
        &self.data
    }

    /// Consume into the rows
    pub fn into_rows(self) -> Vec<Record> {
        self.data
    }
}

/// Rows from a period query, one per time bucket
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodData {
    data: Vec<Record>,
    period: Period,
}

impl PeriodData {
    /// Wrap raw period-grouped rows, normalizing bucket boundaries
    ///
    /// Each row must carry the period's start-at field as a timestamp; it is
    /// replaced with `_start_at` and `_end_at`.
    pub fn new(data: Vec<Record>, period: Period) -> Result<Self, FillError> {
        let data = data
            .into_iter()
            .map(|row| amend_bucket_limits(row, period))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { data, period })
    }

    /// The period this data is bucketed by
    pub fn period(&self) -> Period {
        self.period
    }

    /// Fill buckets with no data using `default` values
    pub fn fill_missing_periods(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        default: &Record,
    ) -> Result<(), FillError> {
        let data = std::mem::take(&mut self.data);
        self.data = fill::fill_missing_periods(self.period, start, end, data, default)?;
        Ok(())
    }

    /// The rows, bucket order ascending once filled
    pub fn rows(&self) -> &[Record] {
        &self.data
    }

    /// Consume into the rows
    pub fn into_rows(self) -> Vec<Record> {
        self.data
    }
}

/// Rows from a grouped period query, one per (group value, bucket) cell
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedPeriodData {
    data: Vec<Record>,
    period: Period,
    group_by: Vec<String>,
}

impl GroupedPeriodData {
    /// Wrap raw multi-grouped rows, normalizing bucket boundaries
    pub fn new(
        data: Vec<Record>,
        period: Period,
        group_by: Vec<String>,
    ) -> Result<Self, FillError> {
        let data = data
            .into_iter()
            .map(|row| amend_bucket_limits(row, period))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            data,
            period,
            group_by,
        })
    }

    /// The period this data is bucketed by
    pub fn period(&self) -> Period {
        self.period
    }

    /// Fill every absent (bucket, permutation) cell with `default` values
    ///
    /// The permutation space is derived from group-by values observed in the
    /// wrapped rows. A value that never appears anywhere in the window is
    /// not synthesized.
    pub fn fill_missing_periods(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        default: &Record,
    ) -> Result<(), FillError> {
        let data = std::mem::take(&mut self.data);
        self.data = fill::fill_group_by_permutations(
            self.period,
            start,
            end,
            data,
            default,
            &self.group_by,
        )?;
        Ok(())
    }

    /// The rows, bucket-major once filled
    pub fn rows(&self) -> &[Record] {
        &self.data
    }

    /// Consume into the rows
    pub fn into_rows(self) -> Vec<Record> {
        self.data
    }
}

/// The result of executing a query, one variant per execution shape
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    /// Plain filtered rows
    Simple(SimpleData),
    /// One row per group value
    Grouped(GroupedData),
    /// One row per time bucket
    Period(PeriodData),
    /// One row per (group value, bucket) cell
    GroupedPeriod(GroupedPeriodData),
}

impl ResultSet {
    /// The ordered output rows
    pub fn rows(&self) -> &[Record] {
        match self {
            ResultSet::Simple(data) => data.rows(),
            ResultSet::Grouped(data) => data.rows(),
            ResultSet::Period(data) => data.rows(),
            ResultSet::GroupedPeriod(data) => data.rows(),
        }
    }

    /// Consume into the ordered output rows
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            ResultSet::Simple(data) => data.into_rows(),
            ResultSet::Grouped(data) => data.into_rows(),
            ResultSet::Period(data) => data.into_rows(),
            ResultSet::GroupedPeriod(data) => data.into_rows(),
        }
    }

    /// Number of output rows
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// Whether the result holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_rows().into_iter()
    }
}

/// Replace a row's period start-at field with `_start_at`/`_end_at`
fn amend_bucket_limits(mut row: Record, period: Period) -> Result<Record, FillError> {
    let key = period.start_at_key();
    let bucket_start = match row.remove(key) {
        None => return Err(FillError::MissingField(key.to_string())),
        Some(value) => value
            .as_time()
            .ok_or_else(|| FillError::NotATimestamp(key.to_string()))?,
    };
    row.insert(START_AT_FIELD, Value::Time(bucket_start));
    row.insert(
        END_AT_FIELD,
        Value::Time(period.step_forward(bucket_start, 1)),
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::COUNT_FIELD;
    use chrono::TimeZone;

    fn monday(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, day, 0, 0, 0).unwrap()
    }

    fn storage_week_row(start_day: u32, count: i64) -> Record {
        Record::from([
            ("_week_start_at", Value::Time(monday(start_day))),
            (COUNT_FIELD, Value::Int(count)),
        ])
    }

    #[test]
    fn test_period_data_amends_bucket_limits() {
        let data = PeriodData::new(vec![storage_week_row(4, 3)], Period::Week).unwrap();

        let row = &data.rows()[0];
        assert!(!row.contains_key("_week_start_at"));
        assert_eq!(row.time(START_AT_FIELD), Some(monday(4)));
        assert_eq!(row.time(END_AT_FIELD), Some(monday(11)));
    }

    #[test]
    fn test_period_data_rejects_row_without_period_key() {
        let row = Record::from([(COUNT_FIELD, Value::Int(1))]);
        let result = PeriodData::new(vec![row], Period::Week);
        assert!(matches!(result, Err(FillError::MissingField(key)) if key == "_week_start_at"));
    }

    #[test]
    fn test_period_data_fill_round_trip() {
        let mut data =
            PeriodData::new(vec![storage_week_row(4, 3)], Period::Week).unwrap();
        let default = Record::from([(COUNT_FIELD, Value::Int(0))]);

        data.fill_missing_periods(monday(4), monday(18), &default)
            .unwrap();

        assert_eq!(data.rows().len(), 2);
        assert_eq!(data.rows()[1].get(COUNT_FIELD), Some(&Value::Int(0)));
    }

    #[test]
    fn test_grouped_period_data_fills_permutations() {
        let mut first = storage_week_row(4, 2);
        first.insert("authority", "a");
        let mut second = storage_week_row(11, 5);
        second.insert("authority", "b");

        let mut data = GroupedPeriodData::new(
            vec![first, second],
            Period::Week,
            vec!["authority".to_string()],
        )
        .unwrap();
        let default = Record::from([(COUNT_FIELD, Value::Int(0))]);

        data.fill_missing_periods(monday(4), monday(18), &default)
            .unwrap();

        assert_eq!(data.rows().len(), 4);
    }

    #[test]
    fn test_result_set_iteration() {
        let results = ResultSet::Simple(SimpleData::new(vec![
            Record::from([("n", Value::Int(1))]),
            Record::from([("n", Value::Int(2))]),
        ]));

        assert_eq!(results.len(), 2);
        let values: Vec<_> = results
            .into_iter()
            .filter_map(|row| row.get("n").cloned())
            .collect();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2)]);
    }
}
