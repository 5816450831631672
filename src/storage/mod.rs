//! Storage boundary
//!
//! The query layer never talks to a database directly; it lowers a query
//! into [`FilterSpec`]/[`Sort`]/[`Collect`] values and hands them to a
//! [`Repository`]:
//!
//! - **types**: the storage-native translation types
//! - **memory**: an in-memory reference repository (and test double)
//! - **error**: the storage failure taxonomy
//!
//! Implementations own their retry, timeout and connection policies; this
//! layer propagates their failures unchanged.

mod error;
mod memory;
mod types;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryRepository;
pub use types::{Collect, CollectMethod, FilterSpec, Sort, SortDirection};

use crate::record::Record;
use async_trait::async_trait;

/// A collection-bound storage engine
///
/// Rows returned from every method must already be normalized to UTC time
/// values. Grouped reads return one row per distinct key value, carrying the
/// key's value, a `_count`, and any requested collect outputs; records
/// lacking the grouped key are excluded from grouping.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Plain filtered read, with optional sort and limit
    async fn find(
        &self,
        filter: &FilterSpec,
        sort: Option<&Sort>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Record>>;

    /// Group matching records by one key
    async fn group(
        &self,
        key: &str,
        filter: &FilterSpec,
        sort: Option<&Sort>,
        limit: Option<usize>,
        collect: &[Collect],
    ) -> StorageResult<Vec<Record>>;

    /// Group matching records by a pair of keys
    async fn multi_group(
        &self,
        key1: &str,
        key2: &str,
        filter: &FilterSpec,
        sort: Option<&Sort>,
        limit: Option<usize>,
        collect: &[Collect],
    ) -> StorageResult<Vec<Record>>;

    /// Persist one record
    async fn save(&self, record: Record) -> StorageResult<()>;
}
