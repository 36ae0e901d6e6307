//! The contract every backend adapter implements

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{Condition, Result, Row};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parse an exact `ASC` / `DESC`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// Ordered mapping of backend column to direction; insertion order is precedence
pub type Sorting = IndexMap<String, SortDirection>;

/// Derives a suggestion from a whole row
pub type SuggestCallback = Arc<dyn Fn(&Row) -> String + Send + Sync>;

/// What a typeahead suggestion is built from
#[derive(Clone)]
pub enum SuggestColumn {
    /// `SELECT DISTINCT column ... ORDER BY column`
    Name(String),
    /// Values derived per row, deduplicated then sorted lexically
    Callback(SuggestCallback),
}

impl SuggestColumn {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(&Row) -> String + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(callback))
    }
}

impl fmt::Debug for SuggestColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// A pluggable backend for count/filter/sort/limit/fetch/suggest.
///
/// Within one pipeline run the grid calls `reset`, `filter`, `sort`,
/// `limit` and then `data`/`count`. `filter` and `sort` accumulate into the
/// underlying query without executing it.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short backend name used in logs (e.g. "sqlite", "memory")
    fn backend(&self) -> &str;

    /// Drop accumulated predicates, ordering and window, returning to the
    /// base query the source was constructed with.
    fn reset(&mut self);

    /// Accumulate predicates into the underlying query
    fn filter(&mut self, conditions: &[Condition]) -> Result<()>;

    /// Apply ordering; columns are backend column keys
    fn sort(&mut self, sorting: &Sorting) -> Result<()>;

    /// Restrict the fetch window; the last call before execution wins
    fn limit(&mut self, offset: usize, limit: usize) -> Result<()>;

    /// Total rows matching the applied filters, ignoring the window
    async fn count(&self) -> Result<u64>;

    /// Execute and return the current window
    async fn data(&self) -> Result<Vec<Row>>;

    /// Up to `limit` distinct, markup-escaped values for autocomplete,
    /// computed on the base query plus `conditions`.
    async fn suggest(
        &self,
        column: &SuggestColumn,
        conditions: &[Condition],
        limit: usize,
    ) -> Result<Vec<String>>;
}

/// Accumulates suggestion values keyed by their raw string form.
///
/// Later duplicates keep the position of the first occurrence. Callback
/// suggestions are sorted lexically on completion; plain column suggestions
/// keep the backend's ordering.
#[derive(Debug, Default)]
pub struct SuggestionSet {
    items: IndexSet<String>,
}

impl SuggestionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.items.insert(value.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Escape, and sort when the values came from a callback
    pub fn finish(self, column: &SuggestColumn) -> Vec<String> {
        let mut items: Vec<String> = self.items.iter().map(|item| escape_html(item)).collect();
        if matches!(column, SuggestColumn::Callback(_)) {
            items.sort();
        }
        items
    }
}

/// Escape a value for inclusion in HTML markup
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
