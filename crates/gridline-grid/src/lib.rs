//! Gridline grid
//!
//! A [`Grid`] keeps the request-scoped paging, sorting and filtering state of
//! one data grid and turns it into calls on a
//! [`DataSource`](gridline_core::DataSource):
//!
//! - Validates state against registered [`Column`]s and [`Filter`]s
//! - Builds conditions through each filter's value-to-condition logic
//! - Pages with a [`Paginator`](gridline_core::Paginator) and caches fetched rows
//! - Reports invalid state through a diagnostic sink and heals it
//! - Optionally remembers state in a [`StateStore`](gridline_core::StateStore)

mod columns;
mod config;
mod filters;
mod grid;

pub use columns::*;
pub use config::*;
pub use filters::*;
pub use grid::*;

pub use gridline_core::{
    CollectingSink, Diagnostic, DiagnosticSink, GridState, MemoryStateStore, Paginator, Severity,
    StateStore, TracingSink,
};
