//! Grid configuration

use gridline_core::paginator::{DEFAULT_STEP_COUNT, DEFAULT_STEP_RANGE};
use gridline_core::{GridError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const ORDER_ASC: &str = "asc";
pub const ORDER_DESC: &str = "desc";

/// Static configuration of a grid.
///
/// Deserializes from camelCase keys with every field optional, e.g. a
/// `[grid]` TOML table:
///
/// ```toml
/// perPageList = [10, 25, 50]
/// defaultPerPage = 25
/// defaultSort = { name = "asc" }
/// strictMode = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridConfig {
    pub per_page_list: Vec<usize>,
    pub default_per_page: usize,
    /// Column name to `"asc"` / `"desc"`; insertion order is precedence
    pub default_sort: IndexMap<String, String>,
    pub default_filter: IndexMap<String, serde_json::Value>,
    /// Surface diagnostics through the sink instead of only logging them
    pub strict_mode: bool,
    pub remember_state: bool,
    /// Overrides the `<namespace>:<grid name>` state store section
    pub remember_state_section: Option<String>,
    pub primary_key: String,
    pub step_range: usize,
    pub step_count: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            per_page_list: vec![10, 20, 30, 50, 100],
            default_per_page: 20,
            default_sort: IndexMap::new(),
            default_filter: IndexMap::new(),
            strict_mode: true,
            remember_state: false,
            remember_state_section: None,
            primary_key: "id".to_string(),
            step_range: DEFAULT_STEP_RANGE,
            step_count: DEFAULT_STEP_COUNT,
        }
    }
}

impl GridConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size, adding it to the allowed list if absent
    pub fn set_default_per_page(&mut self, per_page: usize) -> &mut Self {
        self.default_per_page = per_page;
        if !self.per_page_list.contains(&per_page) {
            self.per_page_list.push(per_page);
            self.per_page_list.sort_unstable();
        }
        self
    }

    pub fn set_per_page_list(&mut self, list: Vec<usize>) -> &mut Self {
        self.per_page_list = list;
        self
    }

    /// The configured default, or the first allowed size when the default is
    /// not in the list
    pub fn default_per_page(&self) -> usize {
        if self.per_page_list.contains(&self.default_per_page) {
            self.default_per_page
        } else {
            self.per_page_list
                .first()
                .copied()
                .unwrap_or(self.default_per_page)
        }
    }

    /// Replace the default sort; directions are matched case-insensitively
    pub fn set_default_sort<I, K, V>(&mut self, sort: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut normalized = IndexMap::new();
        for (column, direction) in sort {
            let column = column.into();
            let direction = normalize_direction(&column, direction.as_ref())?;
            normalized.insert(column, direction.to_string());
        }
        self.default_sort = normalized;
        Ok(self)
    }

    /// Merge into the default filter
    pub fn set_default_filter<I, K, V>(&mut self, filter: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.default_filter
            .extend(filter.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn set_strict_mode(&mut self, strict: bool) -> &mut Self {
        self.strict_mode = strict;
        self
    }

    pub fn set_remember_state(&mut self, remember: bool, section: Option<String>) -> &mut Self {
        self.remember_state = remember;
        self.remember_state_section = section;
        self
    }

    pub fn set_primary_key(&mut self, primary_key: impl Into<String>) -> &mut Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Validate and normalize a configuration loaded from a file
    pub fn normalized(mut self) -> Result<Self> {
        if self.per_page_list.is_empty() || self.per_page_list.contains(&0) {
            return Err(GridError::Configuration(
                "perPageList must contain positive page sizes".to_string(),
            ));
        }
        if self.default_per_page == 0 {
            return Err(GridError::Configuration(
                "defaultPerPage must be positive".to_string(),
            ));
        }
        let default_sort = std::mem::take(&mut self.default_sort);
        self.set_default_sort(default_sort)?;
        let default_per_page = self.default_per_page;
        self.set_default_per_page(default_per_page);
        self.per_page_list.dedup();
        Ok(self)
    }
}

fn normalize_direction(column: &str, direction: &str) -> Result<&'static str> {
    match direction.to_ascii_lowercase().as_str() {
        ORDER_ASC => Ok(ORDER_ASC),
        ORDER_DESC => Ok(ORDER_DESC),
        _ => Err(GridError::Configuration(format!(
            "Dir '{}' for column '{}' is not allowed.",
            direction, column
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_per_page_is_inserted_sorted() {
        let mut config = GridConfig::new();
        config.set_default_per_page(25);
        assert_eq!(config.per_page_list, vec![10, 20, 25, 30, 50, 100]);
        assert_eq!(config.default_per_page(), 25);
    }

    #[test]
    fn test_default_per_page_falls_back_to_first_entry() {
        let config = GridConfig {
            per_page_list: vec![15, 45],
            ..GridConfig::default()
        };
        assert_eq!(config.default_per_page(), 15);
    }

    #[test]
    fn test_default_sort_normalizes_case() {
        let mut config = GridConfig::new();
        config
            .set_default_sort([("name", "ASC"), ("age", "Desc")])
            .unwrap();
        assert_eq!(config.default_sort.get("name").map(String::as_str), Some("asc"));
        assert_eq!(config.default_sort.get("age").map(String::as_str), Some("desc"));

        let err = config.set_default_sort([("name", "up")]).unwrap_err();
        assert!(matches!(err, GridError::Configuration(_)));
    }

    #[test]
    fn test_default_filter_merges() {
        let mut config = GridConfig::new();
        config.set_default_filter([("city", "Linz")]);
        config.set_default_filter([("age", 30)]);
        assert_eq!(config.default_filter.len(), 2);
    }

    #[test]
    fn test_deserialize_partial_camel_case() {
        let config: GridConfig = serde_json::from_value(serde_json::json!({
            "perPageList": [5, 10],
            "defaultPerPage": 7,
            "defaultSort": {"name": "DESC"},
            "strictMode": false,
        }))
        .unwrap();
        let config = config.normalized().unwrap();

        assert_eq!(config.per_page_list, vec![5, 7, 10]);
        assert_eq!(config.default_sort.get("name").map(String::as_str), Some("desc"));
        assert!(!config.strict_mode);
        assert_eq!(config.primary_key, "id");
    }
}
