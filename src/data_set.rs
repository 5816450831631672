//! A named record collection bound to its storage backend
//!
//! [`DataSet`] is the facade callers hold: it owns a handle to a
//! [`Repository`] and pairs writes with the denormalization reads depend on.
//! Storing a timestamped record stamps it with the precomputed period
//! bucket keys (`_week_start_at` and friends) so that period queries can
//! group on a plain field instead of recomputing calendar boundaries per
//! row at read time.

use crate::period::add_period_keys;
use crate::query::{Query, QueryResult};
use crate::record::Record;
use crate::results::ResultSet;
use crate::storage::{Repository, StorageResult};
use std::sync::Arc;
use tracing::{debug, info};

/// A named collection of records with query and store operations
#[derive(Clone)]
pub struct DataSet {
    name: String,
    repository: Arc<dyn Repository>,
}

impl DataSet {
    /// Bind a name to a storage backend
    pub fn new(name: impl Into<String>, repository: Arc<dyn Repository>) -> Self {
        Self {
            name: name.into(),
            repository,
        }
    }

    /// The collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute a query against this collection
    pub async fn query(&self, query: &Query) -> QueryResult<ResultSet> {
        debug!(data_set = %self.name, shape = ?query.shape(), "executing query");
        query.execute(self.repository.as_ref()).await
    }

    /// Store one record, stamping period bucket keys first
    pub async fn store(&self, mut record: Record) -> StorageResult<()> {
        add_period_keys(&mut record);
        self.repository.save(record).await
    }

    /// Store a batch of records
    pub async fn store_all(
        &self,
        records: impl IntoIterator<Item = Record>,
    ) -> StorageResult<()> {
        let mut stored = 0usize;
        for record in records {
            self.store(record).await?;
            stored += 1;
        }
        info!(data_set = %self.name, records = stored, "stored batch");
        Ok(())
    }
}

impl std::fmt::Debug for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSet").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::record::{Value, COUNT_FIELD, TIMESTAMP_FIELD, UPDATED_AT_FIELD};
    use crate::storage::MemoryRepository;
    use chrono::{TimeZone, Utc};

    fn data_set() -> (DataSet, Arc<MemoryRepository>) {
        let repository = Arc::new(MemoryRepository::new());
        let data_set = DataSet::new("licensing_visits", repository.clone());
        (data_set, repository)
    }

    fn visit(day: u32) -> Record {
        Record::from([(
            TIMESTAMP_FIELD,
            Value::Time(Utc.with_ymd_and_hms(2021, 1, day, 9, 30, 0).unwrap()),
        )])
    }

    #[tokio::test]
    async fn test_store_stamps_period_keys_and_updated_at() {
        let (data_set, repository) = data_set();

        data_set.store(visit(5)).await.unwrap();

        let rows = repository
            .find(&crate::storage::FilterSpec::default(), None, None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].time("_week_start_at"),
            Some(Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(
            rows[0].time("_day_start_at"),
            Some(Utc.with_ymd_and_hms(2021, 1, 5, 0, 0, 0).unwrap())
        );
        assert!(rows[0].contains_key(UPDATED_AT_FIELD));
    }

    #[tokio::test]
    async fn test_stored_records_are_queryable_by_period() {
        let (data_set, _) = data_set();
        data_set
            .store_all(vec![visit(5), visit(6), visit(20)])
            .await
            .unwrap();

        let query = Query::builder()
            .period(Period::Week)
            .start_at(Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap())
            .end_at(Utc.with_ymd_and_hms(2021, 1, 25, 0, 0, 0).unwrap())
            .build()
            .unwrap();

        let results = data_set.query(&query).await.unwrap();
        let rows = results.into_rows();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get(COUNT_FIELD), Some(&Value::Int(2)));
        assert_eq!(rows[1].get(COUNT_FIELD), Some(&Value::Int(0)));
        assert_eq!(rows[2].get(COUNT_FIELD), Some(&Value::Int(1)));
    }
}
