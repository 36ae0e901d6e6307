//! Gridline Core - Backend-agnostic building blocks of the grid pipeline
//!
//! This crate provides the types every other Gridline crate depends on:
//!
//! - `Condition` - Filter predicates independent of any query language
//! - `DataSource` - Trait for backend adapters (filter, sort, limit, fetch, suggest)
//! - `QueryTranslator` - Shared condition translation with per-backend strategies
//! - `Connection` - Trait for SQL connections the SQL data source runs against
//! - `Paginator` - Offset arithmetic and the pager step window
//! - `GridState` / `StateStore` - Persisted grid parameters and their storage
//! - Common types like `Value`, `Row` and `GridError`

mod condition;
mod connection;
mod datasource;
pub mod diagnostics;
mod error;
pub mod paginator;
pub mod state;
mod translator;
mod types;

pub use condition::*;
pub use connection::*;
pub use datasource::*;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, SharedSink, TracingSink};
pub use error::*;
pub use paginator::Paginator;
pub use state::{GridState, MemoryStateStore, StateStore};
pub use translator::*;
pub use types::*;
