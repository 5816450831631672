//! Tidemark is a query and aggregation layer for timestamped records.
//!
//! Records are free-form field maps carrying a `_timestamp`; queries slice
//! them by time window and equality filters, group them by field values or
//! calendar periods, and collect per-group statistics. Period queries over a
//! bounded window come back gap-free: buckets (and, when grouped, group
//! permutations within buckets) that hold no data are synthesized with
//! default values, so a chart drawn from the output never silently skips a
//! quiet week.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tidemark::{DataSet, MemoryRepository, Period, Query, Record, Value};
//! use chrono::{TimeZone, Utc};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data_set = DataSet::new("visits", Arc::new(MemoryRepository::new()));
//!
//! data_set
//!     .store(Record::from([(
//!         "_timestamp",
//!         Value::Time(Utc.with_ymd_and_hms(2021, 1, 5, 9, 0, 0).unwrap()),
//!     )]))
//!     .await?;
//!
//! let query = Query::builder()
//!     .period(Period::Week)
//!     .start_at(Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap())
//!     .end_at(Utc.with_ymd_and_hms(2021, 1, 18, 0, 0, 0).unwrap())
//!     .build()?;
//!
//! let results = data_set.query(&query).await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod data_set;
pub mod period;
pub mod query;
pub mod record;
pub mod results;
pub mod storage;

pub use data_set::DataSet;
pub use period::Period;
pub use query::{Query, QueryBuilder, QueryError, QueryResult, QueryShape};
pub use record::{Record, Value};
pub use results::{FillError, ResultSet};
pub use storage::{
    Collect, CollectMethod, FilterSpec, MemoryRepository, Repository, Sort, SortDirection,
    StorageError, StorageResult,
};
