//! Persisted grid state and the store that remembers it between requests

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The four persistent parameters of a grid.
///
/// Sort directions are kept as submitted (`"asc"`, `"desc"`, or anything
/// else a client sent) and validated when the pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<usize>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub sort: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub filter: IndexMap<String, serde_json::Value>,
}

impl GridState {
    /// True when no parameter is present
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.per_page.is_none() && self.sort.is_empty() && self.filter.is_empty()
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort.insert(column.into(), direction.into());
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filter.insert(name.into(), value.into());
        self
    }
}

/// Session-like key-value storage for remembered grid state
pub trait StateStore: Send + Sync {
    fn get(&self, section: &str) -> Result<Option<GridState>>;

    fn set(&self, section: &str, state: &GridState) -> Result<()>;

    fn remove(&self, section: &str) -> Result<()>;
}

/// Process-local state store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    sections: RwLock<HashMap<String, GridState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, section: &str) -> Result<Option<GridState>> {
        Ok(self.sections.read().get(section).cloned())
    }

    fn set(&self, section: &str, state: &GridState) -> Result<()> {
        self.sections
            .write()
            .insert(section.to_string(), state.clone());
        Ok(())
    }

    fn remove(&self, section: &str) -> Result<()> {
        self.sections.write().remove(section);
        Ok(())
    }
}
