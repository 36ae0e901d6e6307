//! Column definitions

use serde::{Deserialize, Serialize};

/// Grid names cannot contain dots; `a.city` is stored as `a__city`
pub fn format_name(name: &str) -> String {
    name.replace('.', "__")
}

/// Inverse of [`format_name`]
pub fn unformat_name(name: &str) -> String {
    name.replace("__", ".")
}

/// A displayed column and the backend column it sorts by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    column: String,
    label: String,
    sortable: bool,
}

impl Column {
    /// `name` may be a dotted backend column; the grid name is normalized and
    /// the backend column keeps the dots
    pub fn new(name: impl AsRef<str>, label: impl Into<String>) -> Self {
        let name = name.as_ref();
        Self {
            name: format_name(name),
            column: name.to_string(),
            label: label.into(),
            sortable: false,
        }
    }

    /// Use a different backend column than the name
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend column key passed to `DataSource::sort`
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    pub fn set_sortable(&mut self) {
        self.sortable = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_name() {
        let column = Column::new("a.city", "City").sortable();
        assert_eq!(column.name(), "a__city");
        assert_eq!(column.column(), "a.city");
        assert!(column.is_sortable());
        assert_eq!(unformat_name(column.name()), "a.city");
    }
}
