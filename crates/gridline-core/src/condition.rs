//! Backend-agnostic filter predicates
//!
//! A [`Condition`] names one or more columns, an [`Operator`] and a value.
//! It carries no SQL: each data source resolves it through a
//! [`QueryTranslator`](crate::QueryTranslator) into its own query fragment.
//! A condition may instead carry a callback that writes directly into the
//! backend's native query object, in which case column/operator/value are
//! advisory only.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{GridError, Result, Value};

/// Comparison operators a condition can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// SQL spelling of the operator
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Returns true if this operator requires a value
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Returns true if the value is a list (IN / NOT IN / BETWEEN)
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between)
    }

    /// Parse the SQL spelling of an operator (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Self::Equal,
            "!=" | "<>" => Self::NotEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessThanOrEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterThanOrEqual,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "BETWEEN" => Self::Between,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// Logical operator for combining columns of a compound condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Parse `AND` / `OR` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

/// One element of a condition's column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnToken {
    Column(String),
    Logical(LogicalOperator),
}

/// The native query object of a backend, handed to condition callbacks.
pub trait NativeQuery: Any + Send {
    /// Name of the backend owning this query (e.g. "sql", "memory")
    fn backend(&self) -> &'static str;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Callback that bypasses generic translation.
pub type ConditionCallback =
    Arc<dyn Fn(&Value, &mut dyn NativeQuery) -> Result<()> + Send + Sync>;

/// An immutable predicate descriptor
#[derive(Clone)]
pub struct Condition {
    columns: Vec<ColumnToken>,
    operator: Operator,
    value: Value,
    callback: Option<ConditionCallback>,
}

impl Condition {
    /// Condition on a single column
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            columns: vec![ColumnToken::Column(column.into())],
            operator,
            value: value.into(),
            callback: None,
        }
    }

    /// Condition applying the same operator and value to several columns,
    /// e.g. `["name", "OR", "surname"]`.
    ///
    /// Tokens must alternate between column names and `AND`/`OR`, starting
    /// and ending with a column.
    pub fn compound<I, S>(tokens: I, operator: Operator, value: impl Into<Value>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns = Vec::new();
        for (idx, token) in tokens.into_iter().enumerate() {
            let token = token.as_ref();
            let expect_column = idx % 2 == 0;
            match (expect_column, LogicalOperator::parse(token)) {
                (true, None) if !token.trim().is_empty() => {
                    columns.push(ColumnToken::Column(token.to_string()))
                }
                (false, Some(logical)) => columns.push(ColumnToken::Logical(logical)),
                _ => {
                    return Err(GridError::Translation(format!(
                        "malformed compound column list at token '{}'",
                        token
                    )));
                }
            }
        }

        if columns.is_empty() || matches!(columns.last(), Some(ColumnToken::Logical(_))) {
            return Err(GridError::Translation(
                "compound column list must start and end with a column".to_string(),
            ));
        }

        Ok(Self {
            columns,
            operator,
            value: value.into(),
            callback: None,
        })
    }

    /// Condition fully handled by a callback receiving the value and the
    /// backend's native query.
    pub fn with_callback<F>(value: impl Into<Value>, callback: F) -> Self
    where
        F: Fn(&Value, &mut dyn NativeQuery) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            columns: Vec::new(),
            operator: Operator::Equal,
            value: value.into(),
            callback: Some(Arc::new(callback)),
        }
    }

    /// Callback condition for one concrete native query type.
    ///
    /// Applying it to a data source with a different native query fails
    /// with [`GridError::Translation`].
    pub fn for_query<Q, F>(value: impl Into<Value>, callback: F) -> Self
    where
        Q: NativeQuery,
        F: Fn(&Value, &mut Q) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_callback(value, move |value, native| {
            let backend = native.backend();
            let query = native.as_any_mut().downcast_mut::<Q>().ok_or_else(|| {
                GridError::Translation(format!(
                    "condition callback cannot be applied to a '{}' query",
                    backend
                ))
            })?;
            callback(value, query)
        })
    }

    /// Attach advisory column metadata to a callback condition
    pub fn describing(mut self, column: impl Into<String>, operator: Operator) -> Self {
        self.columns = vec![ColumnToken::Column(column.into())];
        self.operator = operator;
        self
    }

    pub fn columns(&self) -> &[ColumnToken] {
        &self.columns
    }

    /// Column names referenced by the condition, without logical operators
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().filter_map(|token| match token {
            ColumnToken::Column(name) => Some(name.as_str()),
            ColumnToken::Logical(_) => None,
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Run the callback against a native query.
    ///
    /// Returns `None` when the condition has no callback and must be
    /// translated generically.
    pub fn apply_callback(&self, native: &mut dyn NativeQuery) -> Option<Result<()>> {
        self.callback
            .as_ref()
            .map(|callback| callback(&self.value, native))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("columns", &self.columns)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FakeQuery {
        wheres: Vec<String>,
    }

    impl NativeQuery for FakeQuery {
        fn backend(&self) -> &'static str {
            "fake"
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct OtherQuery;

    impl NativeQuery for OtherQuery {
        fn backend(&self) -> &'static str {
            "other"
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_compound_columns() {
        let condition =
            Condition::compound(["name", "or", "surname"], Operator::Like, "%ab%").unwrap();
        assert_eq!(
            condition.columns(),
            &[
                ColumnToken::Column("name".into()),
                ColumnToken::Logical(LogicalOperator::Or),
                ColumnToken::Column("surname".into()),
            ]
        );
        assert_eq!(condition.column_names().collect::<Vec<_>>(), ["name", "surname"]);
    }

    #[test]
    fn test_compound_rejects_dangling_operator() {
        assert!(Condition::compound(["name", "OR"], Operator::Equal, 1).is_err());
        assert!(Condition::compound(["OR", "name"], Operator::Equal, 1).is_err());
        assert!(Condition::compound(["a", "b"], Operator::Equal, 1).is_err());
        assert!(Condition::compound(Vec::<&str>::new(), Operator::Equal, 1).is_err());
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("is  not null"), Some(Operator::IsNotNull));
        assert_eq!(Operator::parse("<>"), Some(Operator::NotEqual));
        assert_eq!(Operator::parse("~"), None);
    }

    #[test]
    fn test_typed_callback_downcasts() {
        let condition = Condition::for_query("x", |value: &Value, query: &mut FakeQuery| {
            query.wheres.push(format!("custom = {}", value));
            Ok(())
        });

        let mut query = FakeQuery { wheres: Vec::new() };
        condition.apply_callback(&mut query).unwrap().unwrap();
        assert_eq!(query.wheres, vec!["custom = x".to_string()]);

        let err = condition.apply_callback(&mut OtherQuery).unwrap().unwrap_err();
        assert!(matches!(err, GridError::Translation(_)));
    }

    #[test]
    fn test_plain_condition_has_no_callback() {
        let condition = Condition::new("age", Operator::GreaterThan, 18);
        assert!(condition.apply_callback(&mut OtherQuery).is_none());
    }
}
