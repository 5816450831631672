//! Gap-filling engine
//!
//! Storage only returns buckets that contain data, so a period query over a
//! sparse collection comes back with holes. The two fill functions here
//! reconcile sparse rows with the full requested time/grouping space:
//!
//! - [`fill_missing_periods`]: one expected row (or row group) per bucket
//! - [`fill_group_by_permutations`]: one expected row per bucket × group-by
//!   permutation
//!
//! Both are pure: they never contact storage, are deterministic, and are
//! idempotent on already-complete data. Rows and buckets are matched on an
//! explicit composite [`BucketKey`] of epoch seconds plus the ordered
//! group-by values, so no string formatting is involved in identity.
//!
//! A row that lacks its expected `_start_at`/`_end_at` or group-by fields is
//! a broken storage contract; the fill fails fast rather than guessing.

use crate::period::Period;
use crate::record::{Record, Value, END_AT_FIELD, START_AT_FIELD};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Contract violations in rows handed to the fill engine
#[derive(Error, Debug)]
pub enum FillError {
    /// A result row lacks a field the fill must match on
    #[error("result row is missing required field `{0}`")]
    MissingField(String),

    /// A result row's boundary field holds a non-timestamp value
    #[error("result row field `{0}` is not a timestamp")]
    NotATimestamp(String),
}

/// Composite identity of one (bucket, permutation) cell
///
/// Bucket boundaries are normalized to epoch seconds at UTC so rows match
/// regardless of their original sub-second or offset representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    start: i64,
    end: i64,
    values: Vec<Value>,
}

impl BucketKey {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, values: Vec<Value>) -> Self {
        Self {
            start: start.timestamp(),
            end: end.timestamp(),
            values,
        }
    }
}

/// Fill missing buckets of a period query
///
/// Rows are matched to buckets by their `_start_at` (epoch seconds at UTC);
/// every bucket of `period.range(start, end)` with no matching row is
/// synthesized from `default` merged with the bucket's `_start_at`/`_end_at`.
/// All rows sharing a bucket start are emitted in their input order, and the
/// output follows bucket order ascending.
pub fn fill_missing_periods(
    period: Period,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    data: Vec<Record>,
    default: &Record,
) -> Result<Vec<Record>, FillError> {
    let mut by_start: HashMap<i64, Vec<Record>> = HashMap::new();
    for record in data {
        let bucket_start = record_time(&record, START_AT_FIELD)?;
        by_start
            .entry(bucket_start.timestamp())
            .or_default()
            .push(record);
    }

    let mut results = Vec::new();
    for (bucket_start, bucket_end) in period.range(start, end) {
        match by_start.remove(&bucket_start.timestamp()) {
            Some(rows) => results.extend(rows),
            None => results.push(default.merged_with(&bucket_limits(bucket_start, bucket_end))),
        }
    }
    Ok(results)
}

/// Fill missing (bucket, permutation) cells of a grouped period query
///
/// The permutation space is the Cartesian product of each group-by key's
/// distinct values as observed across `data` (first-seen order) — values
/// that exist in the domain but never appear in the queried window's rows
/// are not represented. Output is bucket-major, permutation-minor.
pub fn fill_group_by_permutations(
    period: Period,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    data: Vec<Record>,
    default: &Record,
    group_by: &[String],
) -> Result<Vec<Record>, FillError> {
    let permutations = group_permutations(&data, group_by)?;

    let mut indexed: HashMap<BucketKey, Record> = HashMap::new();
    for record in data {
        let key = BucketKey::new(
            record_time(&record, START_AT_FIELD)?,
            record_time(&record, END_AT_FIELD)?,
            group_values(&record, group_by)?,
        );
        indexed.insert(key, record);
    }

    let mut results = Vec::new();
    for (bucket_start, bucket_end) in period.range(start, end) {
        for permutation in &permutations {
            let key = BucketKey::new(bucket_start, bucket_end, permutation.clone());
            match indexed.remove(&key) {
                Some(record) => results.push(record),
                None => {
                    let mut identity = bucket_limits(bucket_start, bucket_end);
                    for (key, value) in group_by.iter().zip(permutation.iter()) {
                        identity.insert(key.clone(), value.clone());
                    }
                    results.push(default.merged_with(&identity));
                }
            }
        }
    }
    Ok(results)
}

/// The full Cartesian product of each key's distinct observed values
///
/// Taking per-key distinct values (rather than observed combinations)
/// reconstructs the complete permutation space even when some combinations
/// never co-occur in the data.
fn group_permutations(data: &[Record], group_by: &[String]) -> Result<Vec<Vec<Value>>, FillError> {
    let mut per_key: Vec<Vec<Value>> = Vec::with_capacity(group_by.len());
    for key in group_by {
        let mut distinct: Vec<Value> = Vec::new();
        for record in data {
            let value = record
                .get(key)
                .ok_or_else(|| FillError::MissingField(key.clone()))?;
            if !distinct.contains(value) {
                distinct.push(value.clone());
            }
        }
        per_key.push(distinct);
    }

    let mut permutations = vec![Vec::new()];
    for values in &per_key {
        let mut expanded = Vec::with_capacity(permutations.len() * values.len());
        for prefix in &permutations {
            for value in values {
                let mut permutation = prefix.clone();
                permutation.push(value.clone());
                expanded.push(permutation);
            }
        }
        permutations = expanded;
    }
    Ok(permutations)
}

fn group_values(record: &Record, group_by: &[String]) -> Result<Vec<Value>, FillError> {
    group_by
        .iter()
        .map(|key| {
            record
                .get(key)
                .cloned()
                .ok_or_else(|| FillError::MissingField(key.clone()))
        })
        .collect()
}

fn record_time(record: &Record, field: &str) -> Result<DateTime<Utc>, FillError> {
    match record.get(field) {
        None => Err(FillError::MissingField(field.to_string())),
        Some(value) => value
            .as_time()
            .ok_or_else(|| FillError::NotATimestamp(field.to_string())),
    }
}

fn bucket_limits(start: DateTime<Utc>, end: DateTime<Utc>) -> Record {
    Record::from([
        (START_AT_FIELD, Value::Time(start)),
        (END_AT_FIELD, Value::Time(end)),
    ])
}
