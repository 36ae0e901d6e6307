//! The grid orchestrator: owns filter/sort/page state, runs the
//! filter → sort → page → fetch pipeline against a [`DataSource`] and caches
//! the fetched rows until the state changes.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use gridline_core::{
    Condition, DataSource, Diagnostic, GridError, GridState, Paginator, Result, Row, SharedSink,
    SortDirection, Sorting, StateStore, TracingSink, Value,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value as Json;

use crate::columns::Column;
use crate::config::{GridConfig, ORDER_ASC, ORDER_DESC};
use crate::filters::Filter;

const DEFAULT_NAMESPACE: &str = "gridline";

/// Observer invoked with freshly fetched rows before they are cached
pub type FetchObserver = Arc<dyn Fn(&mut Vec<Row>) + Send + Sync>;

/// Where the fetch pipeline currently is.
///
/// Any state mutation returns the grid to `Idle`; a cached fetch leaves it
/// in `Fetched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStage {
    #[default]
    Idle,
    Filtering,
    Sorting,
    Paging,
    Fetched,
}

/// Which kinds of components were registered, fixed at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub has_columns: bool,
    pub has_filters: bool,
    pub has_sortable_columns: bool,
    pub has_suggestions: bool,
}

/// Options of [`Grid::data_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub apply_paging: bool,
    pub use_cache: bool,
    pub fetch: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            apply_paging: true,
            use_cache: true,
            fetch: true,
        }
    }
}

impl FetchOptions {
    pub fn without_paging(mut self) -> Self {
        self.apply_paging = false;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Stop before execution and hand out the prepared data source
    pub fn prepare_only(mut self) -> Self {
        self.fetch = false;
        self
    }
}

/// Result of [`Grid::data_with`]
pub enum GridData<'a> {
    Rows(Arc<Vec<Row>>),
    /// Filtered and sorted (and paged, if requested) but not executed
    Prepared(&'a mut dyn DataSource),
}

impl GridData<'_> {
    pub fn into_rows(self) -> Option<Arc<Vec<Row>>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Prepared(_) => None,
        }
    }
}

impl fmt::Debug for GridData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows(rows) => f.debug_tuple("Rows").field(&rows.len()).finish(),
            Self::Prepared(source) => f.debug_tuple("Prepared").field(&source.backend()).finish(),
        }
    }
}

/// What a renderer needs for one page
#[derive(Debug, Clone)]
pub struct GridView {
    pub columns: Vec<Column>,
    pub rows: Arc<Vec<Row>>,
    pub paginator: Paginator,
}

/// Builder for [`Grid`]
pub struct GridBuilder {
    name: String,
    namespace: String,
    config: GridConfig,
    source: Option<Box<dyn DataSource>>,
    columns: Vec<Column>,
    filters: Vec<Box<dyn Filter>>,
    sink: SharedSink,
    store: Option<Arc<dyn StateStore>>,
    observers: Vec<FetchObserver>,
}

impl GridBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            config: GridConfig::default(),
            source: None,
            columns: Vec::new(),
            filters: Vec::new(),
            sink: Arc::new(TracingSink),
            store: None,
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: GridConfig) -> Self {
        self.config = config;
        self
    }

    /// Host-assigned namespace of the state store section
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn source(mut self, source: impl DataSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn boxed_source(mut self, source: Box<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn boxed_filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn diagnostic_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_fetch_data<F>(mut self, observer: F) -> Self
    where
        F: Fn(&mut Vec<Row>) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<Grid> {
        let config = self.config.normalized()?;

        let mut columns = IndexMap::new();
        for column in self.columns {
            if columns.contains_key(column.name()) {
                return Err(GridError::Configuration(format!(
                    "Column '{}' is registered twice",
                    column.name()
                )));
            }
            columns.insert(column.name().to_string(), column);
        }

        let mut filters: IndexMap<String, Box<dyn Filter>> = IndexMap::new();
        for filter in self.filters {
            if filters.contains_key(filter.name()) {
                return Err(GridError::Configuration(format!(
                    "Filter '{}' is registered twice",
                    filter.name()
                )));
            }
            filters.insert(filter.name().to_string(), filter);
        }

        let capabilities = Capabilities {
            has_columns: !columns.is_empty(),
            has_filters: !filters.is_empty(),
            has_sortable_columns: columns.values().any(Column::is_sortable),
            has_suggestions: filters.values().any(|f| f.suggestion().is_some()),
        };

        Ok(Grid {
            name: self.name,
            namespace: self.namespace,
            config,
            source: self.source,
            columns,
            filters,
            capabilities,
            sink: self.sink,
            store: self.store,
            observers: self.observers,
            page: 1,
            per_page: None,
            sort: IndexMap::new(),
            filter: IndexMap::new(),
            data: None,
            count: None,
            paginator: None,
            stage: PipelineStage::Idle,
            prepared: false,
            noticed: Mutex::new(HashSet::new()),
        })
    }
}

/// A stateful, request-scoped grid over one data source
pub struct Grid {
    name: String,
    namespace: String,
    config: GridConfig,
    source: Option<Box<dyn DataSource>>,
    columns: IndexMap<String, Column>,
    filters: IndexMap<String, Box<dyn Filter>>,
    capabilities: Capabilities,
    sink: SharedSink,
    store: Option<Arc<dyn StateStore>>,
    observers: Vec<FetchObserver>,

    page: usize,
    per_page: Option<usize>,
    sort: IndexMap<String, String>,
    filter: IndexMap<String, Json>,

    data: Option<Arc<Vec<Row>>>,
    count: Option<u64>,
    paginator: Option<Paginator>,
    stage: PipelineStage,
    /// Filters and sorting are applied on the source for the current state
    prepared: bool,
    /// Messages already emitted for the current state
    noticed: Mutex<HashSet<String>>,
}

impl Grid {
    pub fn builder(name: impl Into<String>) -> GridBuilder {
        GridBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn filters(&self) -> impl Iterator<Item = &dyn Filter> {
        self.filters.values().map(|filter| filter.as_ref())
    }

    pub fn filter_definition(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|filter| filter.as_ref())
    }

    pub fn source(&self) -> Option<&dyn DataSource> {
        self.source.as_deref()
    }

    pub fn into_source(self) -> Option<Box<dyn DataSource>> {
        self.source
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Explicit per-page, else the configured default
    pub fn per_page(&self) -> usize {
        self.per_page
            .unwrap_or_else(|| self.config.default_per_page())
    }

    /// Sizes offered by the per-page selector
    pub fn items_per_page_options(&self) -> &[usize] {
        &self.config.per_page_list
    }

    /// Explicit sort state (not including defaults)
    pub fn sort(&self) -> &IndexMap<String, String> {
        &self.sort
    }

    /// Explicit filter state, else the default filter
    pub fn actual_filter(&self) -> &IndexMap<String, Json> {
        if self.filter.is_empty() {
            &self.config.default_filter
        } else {
            &self.filter
        }
    }

    pub fn actual_filter_value(&self, key: &str) -> Option<&Json> {
        self.actual_filter().get(key)
    }

    /// Paginator of the last paged pipeline run
    pub fn paginator(&self) -> Option<&Paginator> {
        self.paginator.as_ref()
    }

    /// The four persistent parameters as they currently stand
    pub fn state(&self) -> GridState {
        GridState {
            page: Some(self.page),
            per_page: self.per_page,
            sort: self.sort.clone(),
            filter: self.filter.clone(),
        }
    }

    /// State store section of this grid
    pub fn state_section(&self) -> String {
        self.config
            .remember_state_section
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.namespace, self.name))
    }

    fn remembered_store(&self) -> Option<&Arc<dyn StateStore>> {
        self.store
            .as_ref()
            .filter(|_| self.config.remember_state)
    }

    // -- state loading and persistence ------------------------------------

    /// Load persistent parameters for this request.
    ///
    /// With remember-state enabled, a state-changing request (a filter,
    /// sort, paging or reset action) first drops the remembered section; a
    /// request that carries no state at all reuses the remembered one.
    /// Missing parameters fall back to configured defaults lazily.
    #[tracing::instrument(skip(self, request), fields(grid = %self.name))]
    pub fn load_state(&mut self, request: GridState, is_state_changing: bool) -> Result<()> {
        let mut state = request;
        if let Some(store) = self.remembered_store() {
            let section = self.state_section();
            if is_state_changing {
                store.remove(&section)?;
            } else if state.is_empty()
                && let Some(remembered) = store.get(&section)?
            {
                tracing::debug!(section = %section, "using remembered grid state");
                state = remembered;
            }
        }

        self.page = state.page.unwrap_or(1);
        self.per_page = state.per_page;
        self.sort = state.sort;
        self.filter = state.filter;
        self.invalidate();
        Ok(())
    }

    /// Remember the current parameters, if remember-state is enabled
    pub fn save_state(&self) -> Result<()> {
        if let Some(store) = self.remembered_store() {
            store.set(&self.state_section(), &self.state())?;
        }
        Ok(())
    }

    // -- state handlers ---------------------------------------------------

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.invalidate();
    }

    pub fn set_sort(&mut self, sort: IndexMap<String, String>) {
        self.sort = sort;
        self.page = 1;
        self.invalidate();
    }

    /// Apply submitted filter values.
    ///
    /// A value is kept when it is numeric or non-empty, or when the field has
    /// a default or remembered value (so it can be cleared explicitly);
    /// otherwise the field is dropped from the filter state.
    pub fn apply_filter_input(&mut self, values: IndexMap<String, Json>) -> Result<()> {
        let remembered = match self.remembered_store() {
            Some(store) => store
                .get(&self.state_section())?
                .map(|state| state.filter)
                .unwrap_or_default(),
            None => IndexMap::new(),
        };

        for (name, value) in values {
            let keep = is_numeric(&value)
                || !is_empty(&value)
                || self.config.default_filter.contains_key(&name)
                || remembered.contains_key(&name);

            if keep {
                let changed = match self.filters.get(&name) {
                    Some(filter) => filter.change_value(&value),
                    None => {
                        self.notice(format!("Filter with name '{}' does not exist.", name));
                        continue;
                    }
                };
                self.filter.insert(name, changed);
            } else {
                self.filter.shift_remove(&name);
            }
        }

        self.page = 1;
        self.invalidate();
        Ok(())
    }

    /// A per-page equal to the default is stored as "unset"
    pub fn set_per_page(&mut self, per_page: usize) {
        self.per_page = if per_page == self.config.default_per_page {
            None
        } else {
            Some(per_page)
        };
        self.page = 1;
        self.invalidate();
    }

    /// Clear sort, filter and per-page and forget remembered state
    pub fn reset(&mut self) -> Result<()> {
        self.sort.clear();
        self.filter.clear();
        self.per_page = None;
        if let Some(store) = self.remembered_store() {
            store.remove(&self.state_section())?;
        }
        self.page = 1;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.data = None;
        self.count = None;
        self.paginator = None;
        self.stage = PipelineStage::Idle;
        self.prepared = false;
        self.noticed.get_mut().clear();
    }

    // -- diagnostics ------------------------------------------------------

    /// Emit a validation diagnostic once per state. Remembered state is
    /// dropped so the invalid parameters do not come back on the next request.
    fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        if !self.noticed.lock().insert(message.clone()) {
            return;
        }
        let diagnostic = Diagnostic::notice(message);

        if let Some(store) = self.remembered_store()
            && let Err(e) = store.remove(&self.state_section())
        {
            tracing::warn!(error = %e, "failed to drop remembered grid state");
        }

        if self.config.strict_mode {
            self.sink.notice(&diagnostic);
        } else {
            tracing::debug!(grid = %self.name, message = %diagnostic.message, "grid diagnostic suppressed");
        }
    }

    // -- pipeline ---------------------------------------------------------

    fn source_mut(&mut self) -> Result<&mut (dyn DataSource + 'static)> {
        self.source.as_deref_mut().ok_or_else(missing_source)
    }

    /// Build conditions for a filter map, skipping unknown filters with a
    /// diagnostic. A value rejected by its filter discards the whole map.
    fn conditions(&self, filter: &IndexMap<String, Json>) -> Result<Vec<Condition>> {
        for (name, value) in filter {
            if let Some(definition) = self.filters.get(name)
                && let Err(message) = definition.validate(value)
            {
                self.notice(message);
                return Ok(Vec::new());
            }
        }

        let mut conditions = Vec::new();
        for (name, value) in filter {
            match self.filters.get(name) {
                Some(definition) => {
                    if let Some(condition) = definition.build_condition(value)? {
                        conditions.push(condition);
                    }
                }
                None => self.notice(format!("Filter with name '{}' does not exist.", name)),
            }
        }
        Ok(conditions)
    }

    fn apply_filtering(&mut self) -> Result<()> {
        self.stage = PipelineStage::Filtering;
        let conditions = self.conditions(self.actual_filter())?;
        tracing::debug!(conditions = conditions.len(), "applying filters");
        self.source_mut()?.filter(&conditions)
    }

    /// Validate the active sort and forward valid entries.
    ///
    /// The first invalid entry stops processing; entries before it are still
    /// applied.
    fn apply_sorting(&mut self) -> Result<()> {
        self.stage = PipelineStage::Sorting;
        let active = if self.sort.is_empty() {
            self.config.default_sort.clone()
        } else {
            self.sort.clone()
        };

        let mut sorting = Sorting::new();
        for (name, direction) in active {
            let has_default = self.config.default_sort.contains_key(&name);
            let key = match self.columns.get_mut(&name) {
                None if has_default => name.clone(),
                None => {
                    self.notice(format!("Column with name '{}' does not exist.", name));
                    break;
                }
                Some(column) if column.is_sortable() => column.column().to_string(),
                Some(column) if has_default => {
                    column.set_sortable();
                    column.column().to_string()
                }
                Some(_) => {
                    self.notice(format!("Column with name '{}' is not sortable.", name));
                    break;
                }
            };

            let direction = match direction.as_str() {
                ORDER_ASC => SortDirection::Asc,
                ORDER_DESC => SortDirection::Desc,
                "" if has_default => {
                    self.sort.shift_remove(&name);
                    break;
                }
                other => {
                    self.notice(format!("Dir '{}' is not allowed.", other));
                    break;
                }
            };
            sorting.insert(key, direction);
        }

        if !sorting.is_empty() {
            tracing::debug!(?sorting, "applying sort");
            self.source_mut()?.sort(&sorting)?;
        }
        Ok(())
    }

    async fn apply_paging(&mut self) -> Result<()> {
        self.stage = PipelineStage::Paging;
        let count = self.filtered_count().await?;
        let per_page = self.per_page();

        let paginator = Paginator::new(per_page)
            .with_item_count(count)
            .with_page(self.page)
            .with_steps(self.config.step_range, self.config.step_count);

        if !self.config.per_page_list.contains(&per_page) {
            self.notice(format!(
                "The number '{}' of items per page is out of range.",
                per_page
            ));
        }

        let (offset, length) = (paginator.offset(), paginator.length());
        self.paginator = Some(paginator);
        self.source_mut()?.limit(offset, length)
    }

    /// Count on a source that already has the filters applied
    async fn filtered_count(&mut self) -> Result<u64> {
        if let Some(count) = self.count {
            return Ok(count);
        }
        let count = self.source_mut()?.count().await?;
        self.count = Some(count);
        Ok(count)
    }

    fn prepare(&mut self) -> Result<()> {
        self.prepared = false;
        self.source_mut()?.reset();
        self.apply_filtering()?;
        self.apply_sorting()?;
        self.prepared = true;
        Ok(())
    }

    /// Rows of the current page, cached until the state changes
    pub async fn data(&mut self) -> Result<Arc<Vec<Row>>> {
        match self.data_with(FetchOptions::default()).await? {
            GridData::Rows(rows) => Ok(rows),
            GridData::Prepared(_) => Err(GridError::Other("pipeline stopped before fetch".to_string())),
        }
    }

    /// Run the pipeline with explicit options
    #[tracing::instrument(skip(self), fields(grid = %self.name))]
    pub async fn data_with(&mut self, options: FetchOptions) -> Result<GridData<'_>> {
        if self.source.is_none() {
            return Err(missing_source());
        }

        // Only the current page is cached
        if options.use_cache
            && options.apply_paging
            && options.fetch
            && let Some(rows) = &self.data
        {
            return Ok(GridData::Rows(Arc::clone(rows)));
        }

        // A window from an earlier paged run can only be dropped by a reset
        if !self.prepared || (!options.apply_paging && self.paginator.is_some()) {
            self.prepare()?;
        }
        if options.apply_paging {
            self.apply_paging().await?;
        } else {
            self.paginator = None;
        }

        if !options.fetch {
            // The caller may change the source; the next run starts over
            self.prepared = false;
            return Ok(GridData::Prepared(self.source_mut()?));
        }

        let mut rows = self.source_mut()?.data().await?;
        tracing::debug!(rows = rows.len(), page = self.page, "grid data fetched");

        let mut healed = false;
        if options.apply_paging
            && !rows.is_empty()
            && let Some(paginator) = &self.paginator
            && !paginator.contains_page(self.page)
        {
            self.notice("Page is out of range.");
            self.page = 1;
            healed = true;
        }

        for observer in &self.observers {
            observer(&mut rows);
        }

        // Rows fetched for an out-of-range page are returned once and not
        // cached; the next call fetches page 1.
        let rows = Arc::new(rows);
        if healed {
            self.invalidate();
        } else if options.use_cache && options.apply_paging {
            self.data = Some(Arc::clone(&rows));
            self.stage = PipelineStage::Fetched;
        }
        Ok(GridData::Rows(rows))
    }

    /// Total rows matching the active filter, computed once per cache epoch
    pub async fn count(&mut self) -> Result<u64> {
        if let Some(count) = self.count {
            return Ok(count);
        }
        if !self.prepared {
            self.prepare()?;
        }
        self.filtered_count().await
    }

    /// Primary key values of the current page
    pub async fn row_ids(&mut self) -> Result<Vec<Value>> {
        let primary_key = self.config.primary_key.clone();
        let rows = self.data().await?;
        rows.iter()
            .map(|row| {
                row.get_by_name(&primary_key).cloned().ok_or_else(|| {
                    GridError::Configuration(format!(
                        "Primary key '{}' is missing in fetched rows, set it with GridConfig::set_primary_key()",
                        primary_key
                    ))
                })
            })
            .collect()
    }

    /// Current page with what a renderer needs around it
    pub async fn view(&mut self) -> Result<GridView> {
        if !self.capabilities.has_columns {
            return Err(GridError::Configuration(
                "Grid must have defined a column, please use GridBuilder::column()".to_string(),
            ));
        }
        let rows = self.data().await?;
        let paginator = match self.paginator.clone() {
            Some(paginator) => paginator,
            None => Paginator::new(self.per_page())
                .with_item_count(self.count().await?)
                .with_page(self.page)
                .with_steps(self.config.step_range, self.config.step_count),
        };
        Ok(GridView {
            columns: self.columns.values().cloned().collect(),
            rows,
            paginator,
        })
    }

    /// Typeahead values for a filter, at most `limit` (else the filter's own
    /// limit; 0 is unbounded).
    ///
    /// Uses the conditions of every other active filter plus this filter's
    /// condition for `query`, on a query context independent of the grid's.
    #[tracing::instrument(skip(self), fields(grid = %self.name))]
    pub async fn suggest(
        &self,
        filter_name: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let definition = self.filters.get(filter_name).ok_or_else(|| {
            GridError::Configuration(format!("Filter with name '{}' does not exist.", filter_name))
        })?;
        let column = definition.suggestion().ok_or_else(|| {
            GridError::Configuration(format!(
                "Filter '{}' does not provide suggestions",
                filter_name
            ))
        })?;

        let mut others = self.actual_filter().clone();
        others.shift_remove(filter_name);
        let mut conditions = self.conditions(&others)?;
        if let Some(condition) = definition.build_condition(&Json::String(query.to_string()))? {
            conditions.push(condition);
        }

        let source = self.source.as_deref().ok_or_else(missing_source)?;
        source
            .suggest(
                &column,
                &conditions,
                limit.unwrap_or_else(|| definition.suggestion_limit()),
            )
            .await
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("name", &self.name)
            .field("page", &self.page)
            .field("per_page", &self.per_page)
            .field("sort", &self.sort)
            .field("filter", &self.filter)
            .field("stage", &self.stage)
            .finish()
    }
}

fn missing_source() -> GridError {
    GridError::Configuration(
        "Grid has no data source, please set one with GridBuilder::source()".to_string(),
    )
}

fn is_numeric(value: &Json) -> bool {
    match value {
        Json::Number(_) => true,
        Json::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::String(s) => s.is_empty() || s == "0",
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        Json::Number(n) => n.as_f64() == Some(0.0),
    }
}
