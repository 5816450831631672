//! In-memory reference repository
//!
//! A [`Repository`] over a plain `Vec<Record>` behind an `RwLock`. It
//! evaluates [`FilterSpec::matches`] directly and implements grouping the
//! way the query layer expects any backend to: records lacking (or null in)
//! a grouped key are excluded, each group row carries the key values, a
//! `_count`, and the requested collect outputs.
//!
//! Doubles as the test backend for the whole crate and as a small embedded
//! engine.

use crate::record::{Record, Value, COUNT_FIELD, UPDATED_AT_FIELD};
use crate::storage::{
    Collect, FilterSpec, Repository, Sort, SortDirection, StorageError, StorageResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

/// In-memory storage engine
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<Vec<Record>>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded with records
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the repository holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching(&self, filter: &FilterSpec) -> StorageResult<Vec<Record>> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("record store lock poisoned".to_string()))?;
        Ok(records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find(
        &self,
        filter: &FilterSpec,
        sort: Option<&Sort>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Record>> {
        let mut results = self.matching(filter)?;
        if let Some(sort) = sort {
            sort_records(&mut results, sort);
        }
        truncate(&mut results, limit);
        trace!(rows = results.len(), "memory find");
        Ok(results)
    }

    async fn group(
        &self,
        key: &str,
        filter: &FilterSpec,
        sort: Option<&Sort>,
        limit: Option<usize>,
        collect: &[Collect],
    ) -> StorageResult<Vec<Record>> {
        let matching = self.matching(filter)?;
        let mut results = grouped_rows(&matching, &[key], collect);
        if let Some(sort) = sort {
            sort_records(&mut results, sort);
        }
        truncate(&mut results, limit);
        trace!(key, groups = results.len(), "memory group");
        Ok(results)
    }

    async fn multi_group(
        &self,
        key1: &str,
        key2: &str,
        filter: &FilterSpec,
        sort: Option<&Sort>,
        limit: Option<usize>,
        collect: &[Collect],
    ) -> StorageResult<Vec<Record>> {
        let matching = self.matching(filter)?;
        let mut results = grouped_rows(&matching, &[key1, key2], collect);
        if let Some(sort) = sort {
            sort_records(&mut results, sort);
        }
        truncate(&mut results, limit);
        trace!(key1, key2, groups = results.len(), "memory multi_group");
        Ok(results)
    }

    async fn save(&self, mut record: Record) -> StorageResult<()> {
        record.insert(UPDATED_AT_FIELD, Value::Time(Utc::now()));
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::Backend("record store lock poisoned".to_string()))?;
        records.push(record);
        Ok(())
    }
}

/// Group records by the given keys, preserving first-seen group order
///
/// A record missing any key, or holding `Null` there, joins no group.
fn grouped_rows(records: &[Record], keys: &[&str], collect: &[Collect]) -> Vec<Record> {
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<Vec<Value>, Vec<&Record>> = HashMap::new();

    for record in records {
        let values: Option<Vec<Value>> = keys
            .iter()
            .map(|key| match record.get(key) {
                Some(Value::Null) | None => None,
                Some(value) => Some(value.clone()),
            })
            .collect();
        let values = match values {
            Some(values) => values,
            None => continue,
        };
        if !groups.contains_key(&values) {
            order.push(values.clone());
        }
        groups.entry(values).or_default().push(record);
    }

    order
        .into_iter()
        .map(|values| {
            let members = &groups[&values];
            let mut row = Record::new();
            for (key, value) in keys.iter().zip(values.iter()) {
                row.insert(*key, value.clone());
            }
            row.insert(COUNT_FIELD, Value::Int(members.len() as i64));
            for item in collect {
                let collected: Vec<&Value> =
                    members.iter().filter_map(|r| r.get(&item.key)).collect();
                row.insert(item.output_key(), item.method.apply(&collected));
            }
            row
        })
        .collect()
}

fn sort_records(records: &mut [Record], sort: &Sort) {
    records.sort_by(|a, b| {
        let ordering = match (a.get(&sort.key), b.get(&sort.key)) {
            (Some(x), Some(y)) => x.compare(y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn truncate(records: &mut Vec<Record>, limit: Option<usize>) {
    if let Some(limit) = limit {
        records.truncate(limit);
    }
}
