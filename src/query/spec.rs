//! The immutable query specification
//!
//! A [`Query`] is the fully-parsed form of one client request: an optional
//! time window, optional group-by key, optional calendar period, equality
//! filters, sort/limit, and requested collect statistics. It is built once
//! (from named fields via [`Query::builder`] or raw arguments via
//! [`Query::parse`]), never mutated, and discarded after execution.
//!
//! From it derive two things: a storage-native [`FilterSpec`] translation,
//! and an execution shape — which of the four result strategies to run:
//!
//! | group_by | period | shape         | storage call                     |
//! |----------|--------|---------------|----------------------------------|
//! | no       | no     | Simple        | filtered find, with sort/limit   |
//! | yes      | no     | Grouped       | group on the group-by key        |
//! | no       | yes    | Period        | group on the period start-at key |
//! | yes      | yes    | GroupedPeriod | multi-group on both keys         |

use crate::period::Period;
use crate::query::args::parse_request_args;
use crate::query::error::{QueryError, QueryResult};
use crate::record::{Record, Value, COUNT_FIELD};
use crate::results::{GroupedData, GroupedPeriodData, PeriodData, ResultSet, SimpleData};
use crate::storage::{Collect, FilterSpec, Repository, Sort};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Which of the four execution strategies a query routes to
///
/// Decided once at build time from the presence of `group_by` and `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Plain filtered read
    Simple,
    /// Group-by on one key
    Grouped,
    /// Group-by on the period's bucket key
    Period,
    /// Multi-group on the group-by key and the period's bucket key
    GroupedPeriod,
}

/// An immutable, fully-parsed query against one record collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Inclusive window start, UTC
    pub start_at: Option<DateTime<Utc>>,
    /// Exclusive window end, UTC
    pub end_at: Option<DateTime<Utc>>,
    /// Calendar bucketing granularity
    pub period: Option<Period>,
    /// Key to group results by
    pub group_by: Option<String>,
    /// Result ordering
    pub sort_by: Option<Sort>,
    /// Maximum number of rows
    pub limit: Option<usize>,
    /// Conjunctive equality constraints (duplicate keys allowed)
    pub filter_by: Vec<(String, Value)>,
    /// Extra per-bucket statistics to collect
    pub collect: Vec<Collect>,
}

impl Query {
    /// Start building a query from named fields
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Build a query from raw `(name, value)` request arguments
    pub fn parse(args: &[(&str, &str)]) -> QueryResult<Query> {
        parse_request_args(args)?.build()
    }

    /// The execution shape this query routes to
    pub fn shape(&self) -> QueryShape {
        match (&self.group_by, &self.period) {
            (None, None) => QueryShape::Simple,
            (Some(_), None) => QueryShape::Grouped,
            (None, Some(_)) => QueryShape::Period,
            (Some(_), Some(_)) => QueryShape::GroupedPeriod,
        }
    }

    /// Lower this query into a storage-native filter
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(self.start_at, self.end_at, self.filter_by.clone())
    }

    /// Execute against a repository and shape the results
    ///
    /// Period-shaped queries fill missing buckets only when both window
    /// edges are known; an open-ended window has no defined completeness.
    /// Storage failures propagate unchanged; nothing is retried here.
    pub async fn execute(&self, repository: &dyn Repository) -> QueryResult<ResultSet> {
        let filter = self.filter_spec();

        let results = match (self.group_by.as_deref(), self.period) {
            (None, None) => {
                let rows = repository
                    .find(&filter, self.sort_by.as_ref(), self.limit)
                    .await?;
                ResultSet::Simple(SimpleData::new(rows))
            }
            (Some(group_by), None) => {
                let rows = repository
                    .group(
                        group_by,
                        &filter,
                        self.sort_by.as_ref(),
                        self.limit,
                        &self.collect,
                    )
                    .await?;
                ResultSet::Grouped(GroupedData::new(rows))
            }
            (None, Some(period)) => {
                let period_key = period.start_at_key();
                let sort = Sort::ascending(period_key);
                let rows = repository
                    .group(period_key, &filter, Some(&sort), self.limit, &self.collect)
                    .await?;

                let mut data = PeriodData::new(rows, period)?;
                if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
                    data.fill_missing_periods(start, end, &self.default_row())?;
                }
                ResultSet::Period(data)
            }
            (Some(group_by), Some(period)) => {
                let rows = repository
                    .multi_group(
                        group_by,
                        period.start_at_key(),
                        &filter,
                        self.sort_by.as_ref(),
                        self.limit,
                        &self.collect,
                    )
                    .await?;

                let mut data =
                    GroupedPeriodData::new(rows, period, vec![group_by.to_string()])?;
                if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
                    data.fill_missing_periods(start, end, &self.default_row())?;
                }
                ResultSet::GroupedPeriod(data)
            }
        };

        debug!(shape = ?self.shape(), rows = results.len(), "query executed");
        Ok(results)
    }

    /// Default values for synthesized gap rows: zero count, null collects
    fn default_row(&self) -> Record {
        let mut default = Record::new();
        default.insert(COUNT_FIELD, Value::Int(0));
        for item in &self.collect {
            default.insert(item.output_key(), Value::Null);
        }
        default
    }
}

/// Builder for [`Query`]
///
/// A relative window may be given as `(period, date, delta)` instead of
/// explicit edges; it is resolved into the authoritative `start_at`/`end_at`
/// pair by [`QueryBuilder::build`] and not retained.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    date: Option<DateTime<Utc>>,
    delta: Option<i64>,
    period: Option<Period>,
    group_by: Option<String>,
    sort_by: Option<Sort>,
    limit: Option<usize>,
    filter_by: Vec<(String, Value)>,
    collect: Vec<Collect>,
}

impl QueryBuilder {
    /// Set the inclusive window start
    pub fn start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Set the exclusive window end
    pub fn end_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    /// Anchor date for a relative window (defaults to now)
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Relative window size: `delta` periods after (or, negative, before)
    /// the anchor date
    pub fn delta(mut self, delta: i64) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Set the calendar period
    pub fn period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    /// Set the group-by key
    pub fn group_by(mut self, key: impl Into<String>) -> Self {
        self.group_by = Some(key.into());
        self
    }

    /// Set the result ordering
    pub fn sort_by(mut self, sort: Sort) -> Self {
        self.sort_by = Some(sort);
        self
    }

    /// Set the row limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add one equality filter (repeatable; all must hold)
    pub fn filter_by(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_by.push((key.into(), value.into()));
        self
    }

    /// Request one collected statistic (repeatable)
    pub fn collect(mut self, collect: Collect) -> Self {
        self.collect.push(collect);
        self
    }

    /// Resolve the window and build the immutable query
    ///
    /// With `delta > 0` the window expands forward from the *next* boundary
    /// of the anchor date; with `delta < 0` it expands backward from the
    /// *previous* boundary. Either way a partially-elapsed current bucket is
    /// not truncated out of the window.
    pub fn build(self) -> QueryResult<Query> {
        let (start_at, end_at) = match self.delta {
            Some(delta) if delta != 0 => {
                let period = self.period.ok_or(QueryError::DeltaWithoutPeriod)?;
                let date = self.date.unwrap_or_else(Utc::now);
                if delta > 0 {
                    let anchor = period.end(date);
                    (Some(anchor), Some(period.step_forward(anchor, delta)))
                } else {
                    let anchor = period.start(date);
                    (Some(period.step_forward(anchor, delta)), Some(anchor))
                }
            }
            _ => (self.start_at, self.end_at),
        };

        Ok(Query {
            start_at,
            end_at,
            period: self.period,
            group_by: self.group_by,
            sort_by: self.sort_by,
            limit: self.limit,
            filter_by: self.filter_by,
            collect: self.collect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::add_period_keys;
    use crate::record::{END_AT_FIELD, START_AT_FIELD, TIMESTAMP_FIELD};
    use crate::storage::{CollectMethod, MemoryRepository, SortDirection};
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn visit(timestamp: DateTime<Utc>, authority: &str, score: i64) -> Record {
        let mut record = Record::from([
            (TIMESTAMP_FIELD, Value::Time(timestamp)),
            ("authority", Value::Text(authority.into())),
            ("score", Value::Int(score)),
        ]);
        add_period_keys(&mut record);
        record
    }

    fn seeded() -> MemoryRepository {
        // Mondays in January 2021: 4, 11, 18, 25. Week of the 11th has no
        // records at all; "bristol" only appears in the week of the 18th.
        MemoryRepository::with_records(vec![
            visit(utc(2021, 1, 5, 9), "aylesbury", 4),
            visit(utc(2021, 1, 6, 10), "aylesbury", 6),
            visit(utc(2021, 1, 20, 11), "bristol", 8),
        ])
    }

    #[test]
    fn test_shape_routing() {
        let simple = Query::builder().build().unwrap();
        assert_eq!(simple.shape(), QueryShape::Simple);

        let grouped = Query::builder().group_by("authority").build().unwrap();
        assert_eq!(grouped.shape(), QueryShape::Grouped);

        let period = Query::builder().period(Period::Week).build().unwrap();
        assert_eq!(period.shape(), QueryShape::Period);

        let both = Query::builder()
            .group_by("authority")
            .period(Period::Week)
            .build()
            .unwrap();
        assert_eq!(both.shape(), QueryShape::GroupedPeriod);
    }

    #[test]
    fn test_delta_forward_from_boundary() {
        let query = Query::builder()
            .period(Period::Day)
            .date(utc(2014, 1, 9, 0))
            .delta(3)
            .build()
            .unwrap();

        assert_eq!(query.start_at, Some(utc(2014, 1, 9, 0)));
        assert_eq!(query.end_at, Some(utc(2014, 1, 12, 0)));
    }

    #[test]
    fn test_delta_backward_from_boundary() {
        let query = Query::builder()
            .period(Period::Day)
            .date(utc(2014, 1, 9, 0))
            .delta(-3)
            .build()
            .unwrap();

        assert_eq!(query.start_at, Some(utc(2014, 1, 6, 0)));
        assert_eq!(query.end_at, Some(utc(2014, 1, 9, 0)));
    }

    #[test]
    fn test_delta_forward_off_boundary_rounds_to_next_day() {
        let date = Utc.with_ymd_and_hms(2014, 1, 9, 1, 2, 3).unwrap();
        let query = Query::builder()
            .period(Period::Day)
            .date(date)
            .delta(3)
            .build()
            .unwrap();

        assert_eq!(query.start_at, Some(utc(2014, 1, 10, 0)));
        assert_eq!(query.end_at, Some(utc(2014, 1, 13, 0)));
    }

    #[test]
    fn test_delta_without_period_is_an_error() {
        let result = Query::builder().date(utc(2014, 1, 9, 0)).delta(3).build();
        assert!(matches!(result, Err(QueryError::DeltaWithoutPeriod)));
    }

    #[test]
    fn test_zero_delta_keeps_explicit_window() {
        let query = Query::builder()
            .period(Period::Day)
            .delta(0)
            .start_at(utc(2014, 1, 1, 0))
            .build()
            .unwrap();

        assert_eq!(query.start_at, Some(utc(2014, 1, 1, 0)));
        assert_eq!(query.end_at, None);
    }

    #[test]
    fn test_filter_spec_translation() {
        let query = Query::builder()
            .start_at(utc(2021, 1, 4, 0))
            .end_at(utc(2021, 1, 18, 0))
            .filter_by("authority", "aylesbury")
            .filter_by("authority", "bristol")
            .build()
            .unwrap();

        let filter = query.filter_spec();
        assert_eq!(filter.start_at, Some(utc(2021, 1, 4, 0)));
        assert_eq!(filter.end_at, Some(utc(2021, 1, 18, 0)));
        // Duplicate keys survive translation; both apply conjunctively.
        assert_eq!(filter.equals.len(), 2);
    }

    #[tokio::test]
    async fn test_execute_simple_with_sort_and_limit() {
        let repo = seeded();
        let query = Query::builder()
            .sort_by(Sort {
                key: "score".to_string(),
                direction: SortDirection::Descending,
            })
            .limit(2)
            .build()
            .unwrap();

        let results = query.execute(&repo).await.unwrap();

        assert!(matches!(results, ResultSet::Simple(_)));
        let rows = results.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("score"), Some(&Value::Int(8)));
    }

    #[tokio::test]
    async fn test_execute_grouped_with_collect() {
        let repo = seeded();
        let query = Query::builder()
            .group_by("authority")
            .collect(Collect::new("score", CollectMethod::Sum))
            .build()
            .unwrap();

        let results = query.execute(&repo).await.unwrap();

        assert!(matches!(results, ResultSet::Grouped(_)));
        let rows = results.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(COUNT_FIELD), Some(&Value::Int(2)));
        assert_eq!(rows[0].get("score:sum"), Some(&Value::Float(10.0)));
    }

    #[tokio::test]
    async fn test_execute_period_fills_empty_weeks() {
        let repo = seeded();
        let query = Query::builder()
            .period(Period::Week)
            .start_at(utc(2021, 1, 4, 0))
            .end_at(utc(2021, 1, 25, 0))
            .build()
            .unwrap();

        let results = query.execute(&repo).await.unwrap();
        let rows = results.into_rows();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get(COUNT_FIELD), Some(&Value::Int(2)));
        // The empty middle week is synthesized with default values.
        assert_eq!(rows[1].get(COUNT_FIELD), Some(&Value::Int(0)));
        assert_eq!(rows[1].time(START_AT_FIELD), Some(utc(2021, 1, 11, 0)));
        assert_eq!(rows[1].time(END_AT_FIELD), Some(utc(2021, 1, 18, 0)));
        assert_eq!(rows[2].get(COUNT_FIELD), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_execute_period_without_bounds_does_not_fill() {
        let repo = seeded();
        let query = Query::builder().period(Period::Week).build().unwrap();

        let results = query.execute(&repo).await.unwrap();

        // Only the two weeks that actually hold data.
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_execute_grouped_period_fills_permutations() {
        let repo = seeded();
        let query = Query::builder()
            .group_by("authority")
            .period(Period::Week)
            .start_at(utc(2021, 1, 4, 0))
            .end_at(utc(2021, 1, 25, 0))
            .collect(Collect::new("score", CollectMethod::Sum))
            .build()
            .unwrap();

        let results = query.execute(&repo).await.unwrap();
        let rows = results.into_rows();

        // 3 weeks x 2 observed authorities.
        assert_eq!(rows.len(), 6);

        let real: Vec<_> = rows
            .iter()
            .filter(|row| row.get(COUNT_FIELD) != Some(&Value::Int(0)))
            .collect();
        assert_eq!(real.len(), 2);

        // Synthesized cells carry null collect outputs, not absent fields.
        let synthesized = rows
            .iter()
            .find(|row| row.get(COUNT_FIELD) == Some(&Value::Int(0)))
            .unwrap();
        assert_eq!(synthesized.get("score:sum"), Some(&Value::Null));
        assert!(synthesized.time(START_AT_FIELD).is_some());
    }

    #[tokio::test]
    async fn test_execute_applies_equality_filters() {
        let repo = seeded();
        let query = Query::builder()
            .filter_by("authority", "aylesbury")
            .build()
            .unwrap();

        let results = query.execute(&repo).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
