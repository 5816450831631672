//! Row model for query results
//!
//! Storage returns opaque mappings; this module gives them a concrete shape:
//! - [`Value`]: a scalar cell (null, bool, int, float, text or UTC timestamp)
//! - [`Record`]: an ordered field-name → value mapping
//!
//! `Value` is hashable (floats by bit pattern) so group-by values can
//! participate in composite lookup keys directly, instead of being formatted
//! into collision-prone strings. Timestamps are always `DateTime<Utc>`; rows
//! crossing the storage boundary are expected to be UTC-normalized already.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Field holding a record's own instant
pub const TIMESTAMP_FIELD: &str = "_timestamp";
/// Field holding a bucket's start boundary on shaped rows
pub const START_AT_FIELD: &str = "_start_at";
/// Field holding a bucket's end boundary on shaped rows
pub const END_AT_FIELD: &str = "_end_at";
/// Field holding the per-group record count on grouped rows
pub const COUNT_FIELD: &str = "_count";
/// Field stamped by the write path on save
pub const UPDATED_AT_FIELD: &str = "_updated_at";

/// A single scalar cell in a record
///
/// Serializes untagged: timestamps as RFC 3339 strings, everything else as
/// the matching JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// UTC timestamp
    Time(DateTime<Utc>),
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// Text
    Text(String),
    /// Absent / unknown
    Null,
}

impl Value {
    /// The contained timestamp, if this is a `Time`
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// The contained value as a float, if numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Ordering between two values of comparable types
    ///
    /// Cross-type comparisons (other than int/float) are `Equal`, which keeps
    /// sorts stable rather than panicking on mixed columns.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Int(a), Value::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::Float(a), Value::Int(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

// Floats are compared and hashed by bit pattern; NaN never enters rows
// produced by this crate.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Time(t) => t.timestamp().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(n) => n.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Null => {}
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
                Ok(t) => Value::Time(t.with_timezone(&Utc)),
                Err(_) => Value::Text(s),
            },
            other => Value::Text(other.to_string()),
        }
    }
}

/// An ordered mapping of field names to values
///
/// The unit of data flowing through the query layer: stored documents,
/// grouped aggregates and synthesized gap rows all share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object, converting scalars
    ///
    /// RFC 3339 strings become timestamps; nested structures are flattened to
    /// their JSON text.
    pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.clone())))
            .collect()
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether the field is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Get a field as a timestamp
    pub fn time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(Value::as_time)
    }

    /// Merge: this record as the base, `overrides` winning on conflicts
    ///
    /// Used to synthesize gap rows: caller-supplied defaults form the base
    /// and the bucket's identifying fields always win.
    pub fn merged_with(&self, overrides: &Record) -> Record {
        let mut merged = self.clone();
        for (key, value) in overrides.iter() {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Record {
    fn from(fields: [(&str, Value); N]) -> Self {
        fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}
