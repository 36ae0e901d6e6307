//! Filter definitions: turning a submitted filter value into a [`Condition`]

use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveTime};
use gridline_core::{Condition, ConditionCallback, NativeQuery, Operator, Result, SuggestColumn, Value};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value as Json;

use crate::columns::format_name;

/// Separator of a date range typed as text, e.g. `2024-01-01 - 2024-01-31`
pub const DATE_RANGE_SEPARATOR: &str = " - ";

const DEFAULT_SUGGESTION_LIMIT: usize = 10;

static NUMBER_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(<=|>=|<>|!=|<|>|=)?\s*(-?\d+(?:\.\d+)?)\s*$").expect("valid regex")
});

/// A filter the grid can apply.
///
/// `build_condition` returning `Ok(None)` means no predicate should be added
/// for this value (e.g. an empty input).
pub trait Filter: Send + Sync {
    /// Normalized name, used as the key in filter state
    fn name(&self) -> &str;

    fn label(&self) -> &str;

    /// Normalize a submitted value before it is stored in filter state
    fn change_value(&self, raw: &Json) -> Json {
        raw.clone()
    }

    /// Check a stored value against the filter's accepted inputs
    fn validate(&self, _value: &Json) -> std::result::Result<(), String> {
        Ok(())
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>>;

    /// Column or callback typeahead suggestions are built from, if any
    fn suggestion(&self) -> Option<SuggestColumn> {
        None
    }

    fn suggestion_limit(&self) -> usize {
        DEFAULT_SUGGESTION_LIMIT
    }
}

/// Name, label, target columns and optional raw `where` callback shared by
/// the concrete filters
#[derive(Clone)]
struct FilterCore {
    name: String,
    label: String,
    columns: Vec<String>,
    where_callback: Option<ConditionCallback>,
}

impl FilterCore {
    fn new(name: &str, label: String) -> Self {
        Self {
            name: format_name(name),
            label,
            columns: vec![name.to_string()],
            where_callback: None,
        }
    }

    fn condition(&self, operator: Operator, value: Value) -> Result<Condition> {
        if let Some(callback) = &self.where_callback {
            let callback = Arc::clone(callback);
            let condition = Condition::with_callback(value, move |value, query| callback(value, query));
            return Ok(match self.columns.first() {
                Some(column) => condition.describing(column.clone(), operator),
                None => condition,
            });
        }
        Condition::compound(&self.columns, operator, value)
    }
}

impl fmt::Debug for FilterCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCore")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("where_callback", &self.where_callback.is_some())
            .finish()
    }
}

macro_rules! filter_builders {
    ($ty:ty) => {
        impl $ty {
            /// Apply to several columns, e.g. `["name", "OR", "surname"]`
            pub fn with_columns<I, S>(mut self, columns: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.core.columns = columns.into_iter().map(Into::into).collect();
                self
            }

            /// Bypass generic translation and write into the backend query
            pub fn with_where<F>(mut self, callback: F) -> Self
            where
                F: Fn(&Value, &mut dyn NativeQuery) -> Result<()> + Send + Sync + 'static,
            {
                self.core.where_callback = Some(Arc::new(callback));
                self
            }

            pub fn columns(&self) -> &[String] {
                &self.core.columns
            }
        }
    };
}

fn is_blank(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn json_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `LIKE '%value%'`; `*` in the input is a wildcard
#[derive(Debug, Clone)]
pub struct TextFilter {
    core: FilterCore,
    suggestion: Option<SuggestColumn>,
    suggestion_limit: usize,
}

filter_builders!(TextFilter);

impl TextFilter {
    pub fn new(name: &str, label: impl Into<String>) -> Self {
        Self {
            core: FilterCore::new(name, label.into()),
            suggestion: None,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }

    /// Offer typeahead suggestions from the first filtered column
    pub fn with_suggestion(mut self) -> Self {
        let column = self.core.columns.first().cloned().unwrap_or_default();
        self.suggestion = Some(SuggestColumn::Name(column));
        self
    }

    /// Offer typeahead suggestions from a column or a per-row callback
    pub fn with_suggestion_column(mut self, column: SuggestColumn) -> Self {
        self.suggestion = Some(column);
        self
    }

    pub fn with_suggestion_limit(mut self, limit: usize) -> Self {
        self.suggestion_limit = limit;
        self
    }
}

impl Filter for TextFilter {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn label(&self) -> &str {
        &self.core.label
    }

    fn change_value(&self, raw: &Json) -> Json {
        match raw {
            Json::String(s) => Json::String(s.trim().to_string()),
            other => other.clone(),
        }
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>> {
        let Some(text) = json_text(value).filter(|text| !text.trim().is_empty()) else {
            return Ok(None);
        };
        let pattern = format!("%{}%", text.trim().replace('*', "%"));
        self.core
            .condition(Operator::Like, Value::String(pattern))
            .map(Some)
    }

    fn suggestion(&self) -> Option<SuggestColumn> {
        self.suggestion.clone()
    }

    fn suggestion_limit(&self) -> usize {
        self.suggestion_limit
    }
}

/// Numeric comparison; accepts `7`, `<5`, `>=10`, `!=3`, `<>3`
#[derive(Debug, Clone)]
pub struct NumberFilter {
    core: FilterCore,
}

filter_builders!(NumberFilter);

impl NumberFilter {
    pub fn new(name: &str, label: impl Into<String>) -> Self {
        Self {
            core: FilterCore::new(name, label.into()),
        }
    }

    /// Split an input such as `">= 10"` into operator and number
    pub fn parse(input: &str) -> Option<(Operator, Value)> {
        let captures = NUMBER_INPUT.captures(input)?;
        let operator = match captures.get(1).map(|m| m.as_str()) {
            None | Some("=") => Operator::Equal,
            Some("<>") | Some("!=") => Operator::NotEqual,
            Some("<") => Operator::LessThan,
            Some("<=") => Operator::LessThanOrEqual,
            Some(">") => Operator::GreaterThan,
            Some(">=") => Operator::GreaterThanOrEqual,
            Some(_) => return None,
        };
        let number = captures.get(2)?.as_str();
        let value = match number.parse::<i64>() {
            Ok(int) => Value::Int(int),
            Err(_) => Value::Float(number.parse::<f64>().ok()?),
        };
        Some((operator, value))
    }
}

impl Filter for NumberFilter {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn label(&self) -> &str {
        &self.core.label
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>> {
        let parsed = match value {
            Json::Number(_) => Some((Operator::Equal, Value::from_json(value))),
            Json::String(s) => Self::parse(s),
            _ => None,
        };
        match parsed {
            Some((operator, value)) => self.core.condition(operator, value).map(Some),
            None => Ok(None),
        }
    }
}

/// Equality against one of a fixed set of items, or `IN` for a multi-select
#[derive(Debug, Clone)]
pub struct SelectFilter {
    core: FilterCore,
    items: IndexMap<String, String>,
}

filter_builders!(SelectFilter);

impl SelectFilter {
    pub fn new(name: &str, label: impl Into<String>) -> Self {
        Self {
            core: FilterCore::new(name, label.into()),
            items: IndexMap::new(),
        }
    }

    /// Allowed values and their labels; an empty key is the "any" option
    pub fn with_items<I, K, V>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.items = items.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn items(&self) -> &IndexMap<String, String> {
        &self.items
    }
}

impl Filter for SelectFilter {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn label(&self) -> &str {
        &self.core.label
    }

    fn validate(&self, value: &Json) -> std::result::Result<(), String> {
        if self.items.is_empty() {
            return Ok(());
        }
        let values: Vec<&Json> = match value {
            Json::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in values {
            let key = json_text(value).unwrap_or_default();
            if !key.is_empty() && !self.items.contains_key(&key) {
                return Err(format!(
                    "Value '{}' is out of allowed set of filter '{}'.",
                    key, self.core.name
                ));
            }
        }
        Ok(())
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>> {
        if is_blank(value) {
            return Ok(None);
        }
        match value {
            Json::Array(_) => self.core.condition(Operator::In, Value::from_json(value)).map(Some),
            _ => self.core.condition(Operator::Equal, Value::from_json(value)).map(Some),
        }
    }
}

/// Checked means the column is `IS NOT NULL`
#[derive(Debug, Clone)]
pub struct CheckFilter {
    core: FilterCore,
}

filter_builders!(CheckFilter);

impl CheckFilter {
    pub fn new(name: &str, label: impl Into<String>) -> Self {
        Self {
            core: FilterCore::new(name, label.into()),
        }
    }

    fn is_checked(value: &Json) -> bool {
        match value {
            Json::Bool(b) => *b,
            Json::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Json::String(s) => matches!(s.trim(), "1" | "on" | "true" | "yes"),
            _ => false,
        }
    }
}

impl Filter for CheckFilter {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn label(&self) -> &str {
        &self.core.label
    }

    fn change_value(&self, raw: &Json) -> Json {
        Json::Bool(Self::is_checked(raw))
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>> {
        if !Self::is_checked(value) {
            return Ok(None);
        }
        self.core
            .condition(Operator::IsNotNull, Value::Null)
            .map(Some)
    }
}

/// Inclusive date range; accepts `{"from": .., "to": ..}` or `"from - to"`.
/// Either bound may be missing.
#[derive(Debug, Clone)]
pub struct DateRangeFilter {
    core: FilterCore,
    date_format: String,
}

filter_builders!(DateRangeFilter);

impl DateRangeFilter {
    pub fn new(name: &str, label: impl Into<String>) -> Self {
        Self {
            core: FilterCore::new(name, label.into()),
            date_format: "%Y-%m-%d".to_string(),
        }
    }

    /// chrono format of submitted dates (default `%Y-%m-%d`)
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    fn parse_date(&self, input: Option<&str>) -> Option<NaiveDate> {
        let input = input?.trim();
        if input.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(input, &self.date_format).ok()
    }

    fn bounds(&self, value: &Json) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match value {
            Json::Object(map) => (
                self.parse_date(map.get("from").and_then(Json::as_str)),
                self.parse_date(map.get("to").and_then(Json::as_str)),
            ),
            Json::String(s) => match s.split_once(DATE_RANGE_SEPARATOR) {
                Some((from, to)) => (self.parse_date(Some(from)), self.parse_date(Some(to))),
                None => (self.parse_date(Some(s)), None),
            },
            _ => (None, None),
        }
    }
}

impl Filter for DateRangeFilter {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn label(&self) -> &str {
        &self.core.label
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>> {
        let end_of_day = |date: NaiveDate| {
            NaiveTime::from_hms_opt(23, 59, 59).map(|time| Value::DateTime(date.and_time(time)))
        };
        let condition = match self.bounds(value) {
            (Some(from), Some(to)) => match end_of_day(to) {
                Some(to) => Some((Operator::Between, Value::List(vec![Value::Date(from), to]))),
                None => None,
            },
            (Some(from), None) => Some((Operator::GreaterThanOrEqual, Value::Date(from))),
            (None, Some(to)) => end_of_day(to).map(|to| (Operator::LessThanOrEqual, to)),
            (None, None) => None,
        };
        match condition {
            Some((operator, value)) => self.core.condition(operator, value).map(Some),
            None => Ok(None),
        }
    }
}

/// Builds conditions with a caller-supplied closure
pub type CustomConditionFn = Arc<dyn Fn(&Json) -> Result<Option<Condition>> + Send + Sync>;

#[derive(Clone)]
pub struct CustomFilter {
    name: String,
    label: String,
    build: CustomConditionFn,
}

impl CustomFilter {
    pub fn new<F>(name: &str, label: impl Into<String>, build: F) -> Self
    where
        F: Fn(&Json) -> Result<Option<Condition>> + Send + Sync + 'static,
    {
        Self {
            name: format_name(name),
            label: label.into(),
            build: Arc::new(build),
        }
    }
}

impl fmt::Debug for CustomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFilter").field("name", &self.name).finish()
    }
}

impl Filter for CustomFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn build_condition(&self, value: &Json) -> Result<Option<Condition>> {
        if is_blank(value) {
            return Ok(None);
        }
        (self.build)(value)
    }
}
