//! Data source over any SQL [`Connection`]
//!
//! Conditions are translated with a [`QueryTranslator`] using the
//! [`SqlStrategy`], so unmapped columns are qualified with the table alias and
//! every value is bound as a named `:token` parameter.

use std::any::Any;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use gridline_core::{
    Binding, Condition, Connection, DataSource, GridError, NativeQuery, QueryTranslator, Result,
    Row, SortDirection, Sorting, SqlStrategy, SuggestColumn, SuggestionSet, TranslationStrategy,
};
use regex::Regex;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid regex")
});

/// Reject anything that is not a plain (optionally dotted) identifier
pub(crate) fn validate_identifier(identifier: &str) -> Result<&str> {
    if IDENTIFIER.is_match(identifier) {
        Ok(identifier)
    } else {
        Err(GridError::DataSource(format!(
            "'{}' is not a valid column identifier",
            identifier
        )))
    }
}

/// The native query object of [`SqlSource`], handed to condition callbacks.
///
/// Callbacks add raw predicates with [`where_raw`](Self::where_raw) and must
/// bind values through [`bind`](Self::bind) rather than formatting them in.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: String,
    alias: String,
    select: Vec<String>,
    distinct: bool,
    wheres: Vec<String>,
    bindings: Vec<Binding>,
    order_by: Vec<(String, SortDirection)>,
    window: Option<(usize, usize)>,
}

impl SelectQuery {
    fn new(table: &str, alias: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: alias.to_string(),
            select: Vec::new(),
            distinct: false,
            wheres: Vec::new(),
            bindings: Vec::new(),
            order_by: Vec::new(),
            window: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Bind a value and return the placeholder to use in raw SQL
    pub fn bind(&mut self, value: impl Into<gridline_core::Value>) -> String {
        let name = format!(":p{}", self.bindings.len());
        self.bindings.push(Binding::new(name.clone(), value.into()));
        name
    }

    /// Add a raw predicate, ANDed with the others
    pub fn where_raw(&mut self, sql: impl Into<String>) {
        self.wheres.push(sql.into());
    }

    pub fn wheres(&self) -> &[String] {
        &self.wheres
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn push_translated(&mut self, sql: String, bindings: Vec<Binding>) {
        self.wheres.push(sql);
        self.bindings.extend(bindings);
    }

    fn from_clause(&self, strategy: &SqlStrategy) -> String {
        let table = strategy.quote(&self.table);
        if self.alias.is_empty() {
            table
        } else {
            format!("{} AS {}", table, strategy.quote(&self.alias))
        }
    }

    fn where_clause(&self) -> String {
        if self.wheres.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = self.wheres.iter().map(|w| format!("({})", w)).collect();
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    /// Full statement including ordering and window
    pub fn to_sql(&self, strategy: &SqlStrategy) -> String {
        let select = if self.select.is_empty() {
            "*".to_string()
        } else {
            self.select.join(", ")
        };
        let mut sql = format!(
            "SELECT {}{} FROM {}{}",
            if self.distinct { "DISTINCT " } else { "" },
            select,
            self.from_clause(strategy),
            self.where_clause()
        );

        if !self.order_by.is_empty() {
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction.sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some((offset, limit)) = self.window {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }
        sql
    }

    /// Count of matching rows, ignoring ordering and window
    pub fn count_sql(&self, strategy: &SqlStrategy) -> String {
        format!(
            "SELECT COUNT(*) FROM {}{}",
            self.from_clause(strategy),
            self.where_clause()
        )
    }
}

impl NativeQuery for SelectQuery {
    fn backend(&self) -> &'static str {
        "sql"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A table of a SQL database exposed as a grid data source
pub struct SqlSource {
    connection: Arc<dyn Connection>,
    base: SelectQuery,
    query: SelectQuery,
    translator: QueryTranslator<SqlStrategy>,
}

impl SqlSource {
    /// Source over `table`; columns are used unqualified until an alias is set
    pub fn new(connection: Arc<dyn Connection>, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        let base = SelectQuery::new(table, "");
        Ok(Self {
            connection,
            query: base.clone(),
            base,
            translator: QueryTranslator::new(SqlStrategy::new("")),
        })
    }

    /// Alias the table; unmapped columns are then qualified as `alias.column`
    pub fn with_alias(mut self, alias: &str) -> Result<Self> {
        validate_identifier(alias)?;
        self.base.alias = alias.to_string();
        self.query = self.base.clone();
        self.translator = QueryTranslator::new(SqlStrategy::new(alias))
            .with_mapping(self.translator.mapping().clone());
        Ok(self)
    }

    /// Map logical column names to backend columns (e.g. `"city" => "a.city"`)
    pub fn with_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.translator = self.translator.with_mapping(mapping);
        self
    }

    /// Restrict the selected columns of the base query
    pub fn with_columns<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut select = Vec::new();
        for column in columns {
            let column = validate_identifier(column.as_ref())?;
            select.push(self.translator.strategy().quote(column));
        }
        self.base.select = select;
        self.query = self.base.clone();
        Ok(self)
    }

    /// The query accumulated so far
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    /// SQL text of the accumulated query
    pub fn sql(&self) -> String {
        self.query.to_sql(self.translator.strategy())
    }

    fn apply_conditions(
        translator: &mut QueryTranslator<SqlStrategy>,
        query: &mut SelectQuery,
        conditions: &[Condition],
    ) -> Result<()> {
        for condition in conditions {
            if let Some(result) = condition.apply_callback(query) {
                result?;
                continue;
            }
            let translation = translator.translate(condition)?;
            let sql = translator.render(&translation.clause);
            query.push_translated(sql, translation.bindings);
        }
        Ok(())
    }

    /// Resolve, validate and quote a column for ORDER BY / DISTINCT
    fn order_column(&self, column: &str) -> Result<String> {
        let resolved = self.translator.resolve_column(column);
        validate_identifier(&resolved)?;
        Ok(self.translator.strategy().quote(&resolved))
    }
}

#[async_trait]
impl DataSource for SqlSource {
    fn backend(&self) -> &str {
        self.connection.driver_name()
    }

    fn reset(&mut self) {
        self.query = self.base.clone();
        self.translator.reset();
    }

    #[tracing::instrument(skip(self, conditions), fields(count = conditions.len()))]
    fn filter(&mut self, conditions: &[Condition]) -> Result<()> {
        Self::apply_conditions(&mut self.translator, &mut self.query, conditions)
    }

    fn sort(&mut self, sorting: &Sorting) -> Result<()> {
        for (column, direction) in sorting {
            let column = self.order_column(column)?;
            self.query.order_by.push((column, *direction));
        }
        Ok(())
    }

    fn limit(&mut self, offset: usize, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(GridError::DataSource("limit must be positive".to_string()));
        }
        // SQLite reads integers past i64::MAX as REAL and rejects them in LIMIT
        let clamp = |n: usize| n.min(i64::MAX as usize);
        self.query.window = Some((clamp(offset), clamp(limit)));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn count(&self) -> Result<u64> {
        let sql = self.query.count_sql(self.translator.strategy());
        tracing::debug!(sql = %sql, "counting rows");

        let result = self.connection.query(&sql, &self.query.bindings).await?;
        result
            .scalar()
            .and_then(|value| value.as_i64())
            .map(|count| count.max(0) as u64)
            .ok_or_else(|| GridError::Query("COUNT(*) returned no integer".to_string()))
    }

    #[tracing::instrument(skip(self))]
    async fn data(&self) -> Result<Vec<Row>> {
        let sql = self.sql();
        tracing::debug!(sql = %sql, "fetching rows");

        let result = self.connection.query(&sql, &self.query.bindings).await?;
        tracing::debug!(rows = result.row_count(), "rows fetched");
        Ok(result.rows)
    }

    #[tracing::instrument(skip(self, column, conditions))]
    async fn suggest(
        &self,
        column: &SuggestColumn,
        conditions: &[Condition],
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut translator = self.translator.clone();
        translator.reset();
        let mut query = self.base.clone();
        Self::apply_conditions(&mut translator, &mut query, conditions)?;

        if let SuggestColumn::Name(name) = column {
            let quoted = self.order_column(name)?;
            query.select = vec![quoted.clone()];
            query.distinct = true;
            query.order_by = vec![(quoted, SortDirection::Asc)];
        }
        if limit > 0 {
            query.window = Some((0, limit));
        }

        let sql = query.to_sql(translator.strategy());
        tracing::debug!(sql = %sql, "fetching suggestions");
        let result = self.connection.query(&sql, &query.bindings).await?;

        let mut items = SuggestionSet::new();
        for row in &result.rows {
            match column {
                SuggestColumn::Name(_) => {
                    if let Some(value) = row.get(0).filter(|value| !value.is_null()) {
                        items.push(value.to_string());
                    }
                }
                SuggestColumn::Callback(callback) => items.push(callback(row)),
            }
        }
        Ok(items.finish(column))
    }
}
