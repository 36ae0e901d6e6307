//! Gridline Sources - Data source adapters
//!
//! This crate provides concrete implementations of the `DataSource` contract
//! defined in `gridline-core`, plus feature-gated re-exports of the SQL
//! connections they can run against.

#[cfg(feature = "sqlite")]
pub use gridline_source_sqlite as sqlite;

mod memory;
mod sql;

pub use memory::{MemoryQuery, MemorySource, RowPredicate};
pub use sql::{SelectQuery, SqlSource};

/// Re-export commonly used types from gridline-core
pub use gridline_core::{
    Condition, Connection, DataSource, GridError, Operator, Result, Row, SortDirection, Sorting,
    SuggestColumn, Value,
};
