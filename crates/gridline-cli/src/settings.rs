//! TOML grid definition file
//!
//! ```toml
//! [grid]
//! defaultPerPage = 10
//! defaultSort = { age = "desc" }
//!
//! [[columns]]
//! name = "name"
//! label = "Name"
//! sortable = true
//!
//! [[filters]]
//! type = "text"
//! name = "search"
//! columns = ["name", "OR", "surname"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use gridline_grid::{
    CheckFilter, Column, DateRangeFilter, Filter, GridBuilder, GridConfig, NumberFilter,
    SelectFilter, TextFilter,
};
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GridFile {
    pub grid: GridConfig,
    pub columns: Vec<ColumnSpec>,
    pub filters: Vec<FilterSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub label: Option<String>,
    /// Backend column, when it differs from the name
    pub column: Option<String>,
    #[serde(default)]
    pub sortable: bool,
}

/// Keys are camelCase like `[grid]`; the date filter is `type = "dateRange"`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FilterSpec {
    Text {
        #[serde(flatten)]
        common: FilterCommon,
        #[serde(default)]
        suggest: bool,
        suggestion_limit: Option<usize>,
    },
    Number {
        #[serde(flatten)]
        common: FilterCommon,
    },
    Select {
        #[serde(flatten)]
        common: FilterCommon,
        #[serde(default)]
        items: IndexMap<String, String>,
    },
    Check {
        #[serde(flatten)]
        common: FilterCommon,
    },
    DateRange {
        #[serde(flatten)]
        common: FilterCommon,
        format: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCommon {
    pub name: String,
    pub label: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl FilterCommon {
    fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.name.clone())
    }
}

impl FilterSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Text { common, .. }
            | Self::Number { common }
            | Self::Select { common, .. }
            | Self::Check { common }
            | Self::DateRange { common, .. } => &common.name,
        }
    }

    pub fn into_filter(self) -> Box<dyn Filter> {
        macro_rules! with_columns {
            ($filter:expr, $common:expr) => {{
                let filter = $filter;
                if $common.columns.is_empty() {
                    filter
                } else {
                    filter.with_columns($common.columns.clone())
                }
            }};
        }

        match self {
            Self::Text {
                common,
                suggest,
                suggestion_limit,
            } => {
                let mut filter = with_columns!(TextFilter::new(&common.name, common.label()), common);
                if suggest {
                    filter = filter.with_suggestion();
                }
                if let Some(limit) = suggestion_limit {
                    filter = filter.with_suggestion_limit(limit);
                }
                Box::new(filter)
            }
            Self::Number { common } => Box::new(with_columns!(
                NumberFilter::new(&common.name, common.label()),
                common
            )),
            Self::Select { common, items } => Box::new(with_columns!(
                SelectFilter::new(&common.name, common.label()).with_items(items),
                common
            )),
            Self::Check { common } => Box::new(with_columns!(
                CheckFilter::new(&common.name, common.label()),
                common
            )),
            Self::DateRange { common, format } => {
                let mut filter =
                    with_columns!(DateRangeFilter::new(&common.name, common.label()), common);
                if let Some(format) = format {
                    filter = filter.with_date_format(format);
                }
                Box::new(filter)
            }
        }
    }
}

impl GridFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read grid file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid grid file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Register the configured columns and filters on a builder
    pub fn apply(self, mut builder: GridBuilder) -> GridBuilder {
        builder = builder.config(self.grid);
        for spec in self.columns {
            let label = spec.label.clone().unwrap_or_else(|| spec.name.clone());
            let mut column = Column::new(&spec.name, label);
            if let Some(backend) = spec.column {
                column = column.with_column(backend);
            }
            if spec.sortable {
                column = column.sortable();
            }
            builder = builder.column(column);
        }
        for spec in self.filters {
            builder = builder.boxed_filter(spec.into_filter());
        }
        builder
    }
}
