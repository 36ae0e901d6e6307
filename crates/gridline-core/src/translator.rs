//! Query condition translation
//!
//! [`QueryTranslator`] turns [`Condition`]s into a parametrized [`Clause`]
//! tree plus the [`Binding`]s it references. The algorithm is shared by all
//! backends; a small [`TranslationStrategy`] decides how an unmapped column
//! is qualified and how placeholders and identifiers are spelled.
//!
//! Values are never interpolated into the rendered text. Every value gets a
//! placeholder derived from a random token that is unique within the
//! translator, so several conditions can be composed into one query.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::{Binding, ColumnToken, Condition, GridError, LogicalOperator, Operator, Result, Value};

const TOKEN_LEN: usize = 4;

/// Per-backend decisions the shared translation algorithm defers to
pub trait TranslationStrategy: Send + Sync {
    /// Resolve a column that is absent from the column mapping
    fn qualify(&self, column: &str) -> String;

    /// Placeholder spelling for a bound parameter name
    fn placeholder(&self, name: &str) -> String;

    /// Quote a resolved column for rendering
    fn quote(&self, column: &str) -> String {
        column.to_string()
    }
}

/// Strategy for SQL backends: unmapped columns are qualified with the
/// query's primary table alias and placeholders use `:name` syntax.
#[derive(Debug, Clone)]
pub struct SqlStrategy {
    alias: String,
}

impl SqlStrategy {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl TranslationStrategy for SqlStrategy {
    fn qualify(&self, column: &str) -> String {
        if column.contains('.') || self.alias.is_empty() {
            column.to_string()
        } else {
            format!("{}.{}", self.alias, column)
        }
    }

    fn placeholder(&self, name: &str) -> String {
        format!(":{}", name)
    }

    fn quote(&self, column: &str) -> String {
        column
            .split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Strategy for in-memory backends: column names are used verbatim.
#[derive(Debug, Clone, Default)]
pub struct VerbatimStrategy;

impl TranslationStrategy for VerbatimStrategy {
    fn qualify(&self, column: &str) -> String {
        column.to_string()
    }

    fn placeholder(&self, name: &str) -> String {
        format!(":{}", name)
    }
}

/// A translated predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `column operator params`; `params` holds placeholder names
    Predicate {
        column: String,
        operator: Operator,
        params: Vec<String>,
    },
    /// Constant truth value (e.g. `IN ()` with an empty list)
    Constant(bool),
    All(Vec<Clause>),
    Any(Vec<Clause>),
}

/// A translated condition together with the values it binds
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub clause: Clause,
    pub bindings: Vec<Binding>,
}

impl Translation {
    /// Look up a bound value by placeholder name
    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| &binding.value)
    }
}

/// Shared condition translation algorithm
#[derive(Debug, Clone)]
pub struct QueryTranslator<S> {
    strategy: S,
    mapping: HashMap<String, String>,
    used_tokens: HashSet<String>,
}

impl<S: TranslationStrategy> QueryTranslator<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            mapping: HashMap::new(),
            used_tokens: HashSet::new(),
        }
    }

    /// Map logical column names to backend columns
    pub fn with_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.mapping
            .extend(mapping.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn mapping(&self) -> &HashMap<String, String> {
        &self.mapping
    }

    /// Resolve a logical column name to its backend column
    pub fn resolve_column(&self, column: &str) -> String {
        self.mapping
            .get(column)
            .cloned()
            .unwrap_or_else(|| self.strategy.qualify(column))
    }

    /// Forget the tokens handed out so far (a new query starts)
    pub fn reset(&mut self) {
        self.used_tokens.clear();
    }

    /// Translate one condition without a callback
    pub fn translate(&mut self, condition: &Condition) -> Result<Translation> {
        if condition.has_callback() {
            return Err(GridError::Translation(
                "callback conditions must be applied to the native query".to_string(),
            ));
        }

        let values = Self::operands(condition)?;
        let token = self.next_token();
        let mut bindings = Vec::new();
        let mut groups: Vec<Vec<Clause>> = vec![Vec::new()];

        for column_token in condition.columns() {
            match column_token {
                ColumnToken::Logical(LogicalOperator::Or) => groups.push(Vec::new()),
                ColumnToken::Logical(LogicalOperator::And) => {}
                ColumnToken::Column(column) => {
                    let clause = match &values {
                        Operands::Empty(constant) => Clause::Constant(*constant),
                        Operands::Values(values) => {
                            let mut params = Vec::with_capacity(values.len());
                            for value in values {
                                let name = self
                                    .strategy
                                    .placeholder(&format!("{}{}", token, bindings.len()));
                                bindings.push(Binding::new(name.clone(), value.clone()));
                                params.push(name);
                            }
                            Clause::Predicate {
                                column: self.resolve_column(column),
                                operator: condition.operator(),
                                params,
                            }
                        }
                    };
                    if let Some(group) = groups.last_mut() {
                        group.push(clause);
                    }
                }
            }
        }

        let mut groups: Vec<Clause> = groups
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(|mut group| {
                if group.len() == 1 {
                    group.remove(0)
                } else {
                    Clause::All(group)
                }
            })
            .collect();

        let clause = match groups.len() {
            0 => {
                return Err(GridError::Translation(
                    "condition does not reference any column".to_string(),
                ));
            }
            1 => groups.remove(0),
            _ => Clause::Any(groups),
        };

        tracing::trace!(?clause, bindings = bindings.len(), "condition translated");
        Ok(Translation { clause, bindings })
    }

    /// Render a translated clause as SQL text
    pub fn render(&self, clause: &Clause) -> String {
        match clause {
            Clause::Constant(true) => "1 = 1".to_string(),
            Clause::Constant(false) => "1 = 0".to_string(),
            Clause::Predicate {
                column,
                operator,
                params,
            } => {
                let column = self.strategy.quote(column);
                match operator {
                    Operator::IsNull | Operator::IsNotNull => {
                        format!("{} {}", column, operator.sql())
                    }
                    Operator::In | Operator::NotIn => {
                        format!("{} {} ({})", column, operator.sql(), params.join(", "))
                    }
                    Operator::Between => format!(
                        "{} BETWEEN {} AND {}",
                        column,
                        params.first().map(String::as_str).unwrap_or_default(),
                        params.get(1).map(String::as_str).unwrap_or_default()
                    ),
                    _ => format!(
                        "{} {} {}",
                        column,
                        operator.sql(),
                        params.first().map(String::as_str).unwrap_or_default()
                    ),
                }
            }
            Clause::All(clauses) => self.render_group(clauses, " AND "),
            Clause::Any(clauses) => self.render_group(clauses, " OR "),
        }
    }

    fn render_group(&self, clauses: &[Clause], separator: &str) -> String {
        let parts: Vec<String> = clauses.iter().map(|clause| self.render(clause)).collect();
        format!("({})", parts.join(separator))
    }

    /// Random lowercase token, retried until unused in this translator
    fn next_token(&mut self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let token: String = (0..TOKEN_LEN)
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect();
            if self.used_tokens.insert(token.clone()) {
                return token;
            }
        }
    }

    fn operands(condition: &Condition) -> Result<Operands> {
        let operator = condition.operator();
        let value = condition.value();

        if !operator.requires_value() {
            return Ok(Operands::Values(Vec::new()));
        }

        match operator {
            Operator::In | Operator::NotIn => {
                let items = match value {
                    Value::List(items) => items.clone(),
                    Value::Null => Vec::new(),
                    other => vec![other.clone()],
                };
                if items.is_empty() {
                    return Ok(Operands::Empty(operator == Operator::NotIn));
                }
                Ok(Operands::Values(items))
            }
            Operator::Between => match value {
                Value::List(items) if items.len() == 2 => Ok(Operands::Values(items.clone())),
                _ => Err(GridError::Translation(format!(
                    "BETWEEN expects exactly two bounds, got {:?}",
                    value
                ))),
            },
            _ => match value {
                Value::Null => Err(GridError::Translation(format!(
                    "operator {} requires a value",
                    operator
                ))),
                Value::List(_) => Err(GridError::Translation(format!(
                    "operator {} does not accept a list",
                    operator
                ))),
                scalar => Ok(Operands::Values(vec![scalar.clone()])),
            },
        }
    }
}

enum Operands {
    /// No values to bind; the predicate collapses to a constant
    Empty(bool),
    Values(Vec<Value>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sql_translator() -> QueryTranslator<SqlStrategy> {
        QueryTranslator::new(SqlStrategy::new("u")).with_mapping([("city", "a.city")])
    }

    #[test]
    fn test_column_resolution() {
        let translator = sql_translator();
        assert_eq!(translator.resolve_column("city"), "a.city");
        assert_eq!(translator.resolve_column("name"), "u.name");
        assert_eq!(translator.resolve_column("x.name"), "x.name");

        let verbatim = QueryTranslator::new(VerbatimStrategy);
        assert_eq!(verbatim.resolve_column("name"), "name");
    }

    #[test]
    fn test_simple_predicate_is_parametrized() {
        let mut translator = sql_translator();
        let translation = translator
            .translate(&Condition::new("name", Operator::Equal, "x' OR 1=1 --"))
            .unwrap();

        let sql = translator.render(&translation.clause);
        assert_eq!(translation.bindings.len(), 1);
        let placeholder = &translation.bindings[0].name;
        assert_eq!(sql, format!("\"u\".\"name\" = {}", placeholder));
        assert!(!sql.contains("OR 1=1"));
        assert_eq!(
            translation.binding(placeholder),
            Some(&Value::String("x' OR 1=1 --".into()))
        );
    }

    #[test]
    fn test_compound_or_group() {
        let mut translator = sql_translator();
        let condition =
            Condition::compound(["name", "OR", "surname"], Operator::Like, "%ab%").unwrap();
        let translation = translator.translate(&condition).unwrap();

        let names: Vec<&str> = translation.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert_eq!(
            translator.render(&translation.clause),
            format!(
                "(\"u\".\"name\" LIKE {} OR \"u\".\"surname\" LIKE {})",
                names[0], names[1]
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let mut translator = QueryTranslator::new(VerbatimStrategy);
        let condition =
            Condition::compound(["a", "AND", "b", "OR", "c"], Operator::Equal, 1).unwrap();
        let translation = translator.translate(&condition).unwrap();

        match translation.clause {
            Clause::Any(groups) => {
                assert_eq!(groups.len(), 2);
                assert!(matches!(&groups[0], Clause::All(inner) if inner.len() == 2));
                assert!(matches!(&groups[1], Clause::Predicate { column, .. } if column == "c"));
            }
            other => panic!("unexpected clause {:?}", other),
        }
    }

    #[test]
    fn test_placeholders_unique_across_conditions() {
        let mut translator = sql_translator();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let translation = translator
                .translate(&Condition::new("id", Operator::Equal, 1))
                .unwrap();
            for binding in translation.bindings {
                assert!(seen.insert(binding.name), "placeholder reused");
            }
        }
    }

    #[test]
    fn test_in_and_between() {
        let mut translator = sql_translator();
        let translation = translator
            .translate(&Condition::new("id", Operator::In, vec![1, 2, 3]))
            .unwrap();
        assert_eq!(translation.bindings.len(), 3);
        assert!(translator.render(&translation.clause).starts_with("\"u\".\"id\" IN (:"));

        let empty = translator
            .translate(&Condition::new("id", Operator::In, Value::List(vec![])))
            .unwrap();
        assert_eq!(translator.render(&empty.clause), "1 = 0");

        let between = translator
            .translate(&Condition::new("age", Operator::Between, vec![18, 65]))
            .unwrap();
        assert_eq!(between.bindings.len(), 2);

        let err = translator
            .translate(&Condition::new("age", Operator::Between, 18))
            .unwrap_err();
        assert!(matches!(err, GridError::Translation(_)));
    }

    #[test]
    fn test_null_checks_bind_nothing() {
        let mut translator = sql_translator();
        let translation = translator
            .translate(&Condition::new("deleted_at", Operator::IsNull, Value::Null))
            .unwrap();
        assert!(translation.bindings.is_empty());
        assert_eq!(
            translator.render(&translation.clause),
            "\"u\".\"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn test_callback_condition_is_rejected() {
        let mut translator = sql_translator();
        let condition = Condition::with_callback(1, |_, _| Ok(()));
        assert!(matches!(
            translator.translate(&condition),
            Err(GridError::Translation(_))
        ));
    }
}
