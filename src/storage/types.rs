//! Storage-native query translation types
//!
//! The shapes a [`Query`](crate::query::Query) is lowered into before it
//! crosses the storage boundary:
//! - [`FilterSpec`]: conjunctive equality constraints plus a half-open time
//!   range on `_timestamp`
//! - [`Sort`] / [`SortDirection`]: single-key ordering
//! - [`Collect`] / [`CollectMethod`]: extra per-group statistics
//!
//! Repositories interpret these natively (an index scan, a group pipeline);
//! [`FilterSpec::matches`] is the reference semantics the in-memory engine
//! evaluates directly.

use crate::record::{Record, Value, TIMESTAMP_FIELD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A storage-native filter: time range and equality constraints
///
/// The time range is half-open: `start_at <= _timestamp < end_at`, each edge
/// omitted when unbounded. Equality pairs apply conjunctively; duplicate keys
/// are allowed and must all hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Inclusive lower bound on `_timestamp`
    pub start_at: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `_timestamp`
    pub end_at: Option<DateTime<Utc>>,
    /// Conjunctive equality constraints
    pub equals: Vec<(String, Value)>,
}

impl FilterSpec {
    /// Create a filter from its parts
    pub fn new(
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
        equals: Vec<(String, Value)>,
    ) -> Self {
        Self {
            start_at,
            end_at,
            equals,
        }
    }

    /// Whether the filter constrains nothing
    pub fn is_empty(&self) -> bool {
        self.start_at.is_none() && self.end_at.is_none() && self.equals.is_empty()
    }

    /// Reference matching semantics for a single record
    ///
    /// A record without a `_timestamp` never matches a time-bounded filter.
    pub fn matches(&self, record: &Record) -> bool {
        if self.start_at.is_some() || self.end_at.is_some() {
            let timestamp = match record.time(TIMESTAMP_FIELD) {
                Some(t) => t,
                None => return false,
            };
            if let Some(start) = self.start_at {
                if timestamp < start {
                    return false;
                }
            }
            if let Some(end) = self.end_at {
                if timestamp >= end {
                    return false;
                }
            }
        }

        self.equals
            .iter()
            .all(|(key, value)| record.get(key) == Some(value))
    }
}

/// Sort direction for a storage read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    /// Parse a direction name; anything unrecognized means "no sort"
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ascending" => Some(SortDirection::Ascending),
            "descending" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

/// A `(key, direction)` ordering request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Field to order by
    pub key: String,
    /// Direction
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort on `key`
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on `key`
    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// How a collected field is reduced within each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectMethod {
    /// First raw value seen in the group
    Default,
    /// Sum of numeric values
    Sum,
    /// Arithmetic mean of numeric values
    Mean,
    /// Smallest numeric value
    Min,
    /// Largest numeric value
    Max,
    /// Number of values present
    Count,
}

impl CollectMethod {
    /// Parse a method name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(CollectMethod::Default),
            "sum" => Some(CollectMethod::Sum),
            "mean" => Some(CollectMethod::Mean),
            "min" => Some(CollectMethod::Min),
            "max" => Some(CollectMethod::Max),
            "count" => Some(CollectMethod::Count),
            _ => None,
        }
    }

    /// The method name
    pub fn name(&self) -> &'static str {
        match self {
            CollectMethod::Default => "default",
            CollectMethod::Sum => "sum",
            CollectMethod::Mean => "mean",
            CollectMethod::Min => "min",
            CollectMethod::Max => "max",
            CollectMethod::Count => "count",
        }
    }

    /// Reduce the values a group produced for one collected field
    ///
    /// Numeric reductions skip non-numeric values; an empty input reduces to
    /// `Null`.
    pub fn apply(&self, values: &[&Value]) -> Value {
        match self {
            CollectMethod::Default => values.first().cloned().cloned().unwrap_or(Value::Null),
            CollectMethod::Count => Value::Int(values.len() as i64),
            _ => {
                let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
                if numbers.is_empty() {
                    return Value::Null;
                }
                match self {
                    CollectMethod::Sum => Value::Float(numbers.iter().sum()),
                    CollectMethod::Mean => {
                        Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                    }
                    CollectMethod::Min => {
                        Value::Float(numbers.iter().cloned().fold(f64::INFINITY, f64::min))
                    }
                    CollectMethod::Max => {
                        Value::Float(numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
                    }
                    _ => Value::Null,
                }
            }
        }
    }
}

/// A request for one extra per-group statistic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collect {
    /// Field to collect from the grouped records
    pub key: String,
    /// Reduction to apply
    pub method: CollectMethod,
}

impl Collect {
    /// Collect a field with an explicit method
    pub fn new(key: impl Into<String>, method: CollectMethod) -> Self {
        Self {
            key: key.into(),
            method,
        }
    }

    /// Collect a field with the default (first raw value) method
    pub fn default_method(key: impl Into<String>) -> Self {
        Self::new(key, CollectMethod::Default)
    }

    /// The output field name on grouped rows
    ///
    /// `key` for the default method, `key:method` otherwise, so a default
    /// collect stays shape-compatible with the raw field and methods never
    /// collide.
    pub fn output_key(&self) -> String {
        match self.method {
            CollectMethod::Default => self.key.clone(),
            method => format!("{}:{}", self.key, method.name()),
        }
    }
}
