//! Raw request-argument parsing
//!
//! Turns the multimap of string arguments a request layer hands over (query
//! string pairs, in order) into a [`QueryBuilder`]. Repeatable arguments
//! (`filter_by`, `collect`) may appear any number of times; unknown argument
//! names are ignored so callers can carry their own extras.
//!
//! Parsing rules, in brief:
//! - `start_at`, `end_at`, `date`: RFC 3339, normalized to UTC
//! - `period`: a granularity name; `delta`: a signed integer
//! - `filter_by`: `key:value`, where `true`/`false` become booleans
//! - `sort_by`: `key:direction`; an unrecognized direction means no sort
//! - `limit`: a non-negative integer
//! - `collect`: `key` or `key:method`

use crate::period::Period;
use crate::query::error::{QueryError, QueryResult};
use crate::query::spec::{Query, QueryBuilder};
use crate::record::Value;
use crate::storage::{Collect, CollectMethod, Sort, SortDirection};
use chrono::{DateTime, Utc};

/// Parse raw `(name, value)` argument pairs into a query builder
pub fn parse_request_args(args: &[(&str, &str)]) -> QueryResult<QueryBuilder> {
    let mut builder = Query::builder();

    for (name, value) in args {
        match *name {
            "start_at" => builder = builder.start_at(parse_time(value)?),
            "end_at" => builder = builder.end_at(parse_time(value)?),
            "date" => builder = builder.date(parse_time(value)?),
            "delta" => {
                let delta = value
                    .parse()
                    .map_err(|_| QueryError::InvalidDelta(value.to_string()))?;
                builder = builder.delta(delta);
            }
            "period" => {
                let period = Period::parse(value)
                    .ok_or_else(|| QueryError::UnknownPeriod(value.to_string()))?;
                builder = builder.period(period);
            }
            "group_by" => builder = builder.group_by(*value),
            "sort_by" => {
                if let Some(sort) = parse_sort(value) {
                    builder = builder.sort_by(sort);
                }
            }
            "limit" => {
                let limit = value
                    .parse()
                    .map_err(|_| QueryError::InvalidLimit(value.to_string()))?;
                builder = builder.limit(limit);
            }
            "filter_by" => {
                let (key, value) = parse_filter(value)?;
                builder = builder.filter_by(key, value);
            }
            "collect" => builder = builder.collect(parse_collect(value)?),
            _ => {}
        }
    }

    Ok(builder)
}

fn parse_time(value: &str) -> QueryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| QueryError::InvalidTimestamp(value.to_string()))
}

fn parse_sort(value: &str) -> Option<Sort> {
    let (key, direction) = value.split_once(':')?;
    let direction = SortDirection::parse(direction)?;
    Some(Sort {
        key: key.to_string(),
        direction,
    })
}

fn parse_filter(value: &str) -> QueryResult<(String, Value)> {
    let (key, raw) = value
        .split_once(':')
        .ok_or_else(|| QueryError::InvalidFilter(value.to_string()))?;
    let parsed = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::Text(other.to_string()),
    };
    Ok((key.to_string(), parsed))
}

fn parse_collect(value: &str) -> QueryResult<Collect> {
    match value.split_once(':') {
        None => Ok(Collect::default_method(value)),
        Some((key, method)) => {
            let method = CollectMethod::parse(method)
                .ok_or_else(|| QueryError::UnknownCollectMethod(method.to_string()))?;
            Ok(Collect::new(key, method))
        }
    }
}
