//! Data source over rows held in memory
//!
//! Conditions go through the same [`QueryTranslator`] as SQL backends, with
//! the [`VerbatimStrategy`], and the resulting clause tree is evaluated per
//! row. `LIKE` is case-insensitive with `%` and `_` wildcards.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gridline_core::{
    Clause, Condition, DataSource, GridError, NativeQuery, Operator, QueryTranslator, Result, Row,
    SortDirection, Sorting, SuggestColumn, SuggestionSet, Translation, Value, VerbatimStrategy,
};
use regex::Regex;

/// Row filter installed by a condition callback
pub type RowPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

enum Predicate {
    Compare {
        column: String,
        operator: Operator,
        values: Vec<Value>,
    },
    Like {
        column: String,
        pattern: Regex,
        negated: bool,
    },
    Constant(bool),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    fn compile(clause: &Clause, translation: &Translation) -> Result<Self> {
        Ok(match clause {
            Clause::Constant(value) => Self::Constant(*value),
            Clause::All(clauses) => Self::All(
                clauses
                    .iter()
                    .map(|clause| Self::compile(clause, translation))
                    .collect::<Result<_>>()?,
            ),
            Clause::Any(clauses) => Self::Any(
                clauses
                    .iter()
                    .map(|clause| Self::compile(clause, translation))
                    .collect::<Result<_>>()?,
            ),
            Clause::Predicate {
                column,
                operator,
                params,
            } => {
                let values = params
                    .iter()
                    .map(|name| {
                        translation.binding(name).cloned().ok_or_else(|| {
                            GridError::Translation(format!("unbound placeholder {}", name))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                match operator {
                    Operator::Like | Operator::NotLike => {
                        let pattern = values.first().map(Value::to_string).unwrap_or_default();
                        Self::Like {
                            column: column.clone(),
                            pattern: like_regex(&pattern)?,
                            negated: *operator == Operator::NotLike,
                        }
                    }
                    _ => Self::Compare {
                        column: column.clone(),
                        operator: *operator,
                        values,
                    },
                }
            }
        })
    }

    fn columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { column, .. } | Self::Like { column, .. } => out.push(column),
            Self::Constant(_) => {}
            Self::All(items) | Self::Any(items) => items.iter().for_each(|p| p.columns(out)),
        }
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::All(items) => items.iter().all(|p| p.matches(row)),
            Self::Any(items) => items.iter().any(|p| p.matches(row)),
            Self::Like {
                column,
                pattern,
                negated,
            } => match row.get_by_name(column) {
                None | Some(Value::Null) => false,
                Some(value) => pattern.is_match(&value.to_string()) != *negated,
            },
            Self::Compare {
                column,
                operator,
                values,
            } => {
                let field = row.get_by_name(column).unwrap_or(&Value::Null);
                compare(field, *operator, values)
            }
        }
    }
}

/// SQL-style comparison: NULL only satisfies `IS NULL`
fn compare(field: &Value, operator: Operator, values: &[Value]) -> bool {
    match operator {
        Operator::IsNull => return field.is_null(),
        Operator::IsNotNull => return !field.is_null(),
        _ if field.is_null() => return false,
        _ => {}
    }

    let ordering = |value: &Value| field.compare(value);
    match operator {
        Operator::Equal => values.first().and_then(ordering) == Some(Ordering::Equal),
        Operator::NotEqual => matches!(
            values.first().and_then(ordering),
            Some(Ordering::Less | Ordering::Greater)
        ),
        Operator::LessThan => values.first().and_then(ordering) == Some(Ordering::Less),
        Operator::LessThanOrEqual => matches!(
            values.first().and_then(ordering),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::GreaterThan => values.first().and_then(ordering) == Some(Ordering::Greater),
        Operator::GreaterThanOrEqual => matches!(
            values.first().and_then(ordering),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::In => values.iter().any(|v| ordering(v) == Some(Ordering::Equal)),
        Operator::NotIn => values
            .iter()
            .all(|v| matches!(ordering(v), Some(Ordering::Less | Ordering::Greater))),
        Operator::Between => match values {
            [low, high] => {
                matches!(ordering(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ordering(high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
        Operator::Like | Operator::NotLike | Operator::IsNull | Operator::IsNotNull => false,
    }
}

/// Compile a SQL `LIKE` pattern into an anchored case-insensitive regex
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| GridError::Translation(format!("invalid LIKE pattern: {}", e)))
}

/// The native query object of [`MemorySource`], handed to condition callbacks
#[derive(Default)]
pub struct MemoryQuery {
    predicates: Vec<Predicate>,
    custom: Vec<RowPredicate>,
}

impl MemoryQuery {
    /// Keep only rows for which `predicate` holds
    pub fn retain<F>(&mut self, predicate: F)
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.custom.push(Arc::new(predicate));
    }

    fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row)) && self.custom.iter().all(|p| p(row))
    }
}

impl NativeQuery for MemoryQuery {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Rows held in memory exposed as a grid data source
pub struct MemorySource {
    rows: Arc<Vec<Row>>,
    known_columns: HashSet<String>,
    translator: QueryTranslator<VerbatimStrategy>,
    query: MemoryQuery,
    sorting: Sorting,
    window: Option<(usize, usize)>,
}

impl MemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        let known_columns = rows
            .iter()
            .flat_map(|row| row.columns().iter().cloned())
            .collect();
        Self {
            rows: Arc::new(rows),
            known_columns,
            translator: QueryTranslator::new(VerbatimStrategy),
            query: MemoryQuery::default(),
            sorting: Sorting::new(),
            window: None,
        }
    }

    /// Map logical column names to row keys
    pub fn with_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.translator = self.translator.with_mapping(mapping);
        self
    }

    fn check_column(&self, column: &str) -> Result<()> {
        if self.rows.is_empty() || self.known_columns.contains(column) {
            Ok(())
        } else {
            Err(GridError::DataSource(format!(
                "column '{}' does not exist in the data source",
                column
            )))
        }
    }

    fn apply_conditions(
        &self,
        translator: &mut QueryTranslator<VerbatimStrategy>,
        query: &mut MemoryQuery,
        conditions: &[Condition],
    ) -> Result<()> {
        for condition in conditions {
            if let Some(result) = condition.apply_callback(query) {
                result?;
                continue;
            }
            let translation = translator.translate(condition)?;
            let predicate = Predicate::compile(&translation.clause, &translation)?;

            let mut columns = Vec::new();
            predicate.columns(&mut columns);
            for column in columns {
                self.check_column(column)?;
            }
            query.predicates.push(predicate);
        }
        Ok(())
    }

    fn filtered<'a>(&'a self, query: &'a MemoryQuery) -> impl Iterator<Item = &'a Row> {
        self.rows.iter().filter(move |row| query.matches(row))
    }

    fn sorted<'a>(&self, mut rows: Vec<&'a Row>, sorting: &Sorting) -> Vec<&'a Row> {
        if !sorting.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in sorting {
                    let left = a.get_by_name(column).unwrap_or(&Value::Null);
                    let right = b.get_by_name(column).unwrap_or(&Value::Null);
                    let ordering = match direction {
                        SortDirection::Asc => left.sort_cmp(right),
                        SortDirection::Desc => right.sort_cmp(left),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }
        rows
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn backend(&self) -> &str {
        "memory"
    }

    fn reset(&mut self) {
        self.query = MemoryQuery::default();
        self.sorting.clear();
        self.window = None;
        self.translator.reset();
    }

    fn filter(&mut self, conditions: &[Condition]) -> Result<()> {
        let mut query = std::mem::take(&mut self.query);
        let mut translator = self.translator.clone();
        let result = self.apply_conditions(&mut translator, &mut query, conditions);
        self.query = query;
        self.translator = translator;
        result
    }

    fn sort(&mut self, sorting: &Sorting) -> Result<()> {
        for (column, direction) in sorting {
            let column = self.translator.resolve_column(column);
            self.check_column(&column)?;
            self.sorting.insert(column, *direction);
        }
        Ok(())
    }

    fn limit(&mut self, offset: usize, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(GridError::DataSource("limit must be positive".to_string()));
        }
        self.window = Some((offset, limit));
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.filtered(&self.query).count() as u64)
    }

    async fn data(&self) -> Result<Vec<Row>> {
        let rows = self.sorted(self.filtered(&self.query).collect(), &self.sorting);
        let (offset, limit) = self.window.unwrap_or((0, usize::MAX));
        let page: Vec<Row> = rows.into_iter().skip(offset).take(limit).cloned().collect();
        tracing::debug!(rows = page.len(), "memory rows fetched");
        Ok(page)
    }

    async fn suggest(
        &self,
        column: &SuggestColumn,
        conditions: &[Condition],
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut translator = self.translator.clone();
        translator.reset();
        let mut query = MemoryQuery::default();
        self.apply_conditions(&mut translator, &mut query, conditions)?;

        let limit = if limit == 0 { usize::MAX } else { limit };
        let rows: Vec<&Row> = self.filtered(&query).collect();
        let mut items = SuggestionSet::new();

        match column {
            SuggestColumn::Name(name) => {
                let key = translator.resolve_column(name);
                self.check_column(&key)?;
                let mut sorting = Sorting::new();
                sorting.insert(key.clone(), SortDirection::Asc);
                for row in self.sorted(rows, &sorting) {
                    if items.len() >= limit {
                        break;
                    }
                    if let Some(value) = row.get_by_name(&key).filter(|v| !v.is_null()) {
                        items.push(value.to_string());
                    }
                }
            }
            SuggestColumn::Callback(callback) => {
                for row in rows.into_iter().take(limit) {
                    items.push(callback(row));
                }
            }
        }
        Ok(items.finish(column))
    }
}
