//! Query construction, parsing and execution
//!
//! The entry points are [`Query::builder`] for callers with typed values in
//! hand, and [`Query::parse`] for raw request arguments. A built query is
//! immutable; [`Query::execute`] runs it against a [`Repository`] and shapes
//! the rows into a [`ResultSet`].
//!
//! [`Repository`]: crate::storage::Repository
//! [`ResultSet`]: crate::results::ResultSet

mod args;
mod error;
mod spec;

pub use args::parse_request_args;
pub use error::{QueryError, QueryResult};
pub use spec::{Query, QueryBuilder, QueryShape};
