//! `gridline`: browse a SQLite table through the grid pipeline

mod logging;
mod render;
mod settings;
mod state_file;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use gridline_core::{Connection, GridState};
use gridline_grid::{Column, Grid, GridBuilder};
use gridline_sources::SqlSource;
use gridline_sources::sqlite::SqliteConnection;
use indexmap::IndexMap;

use crate::settings::GridFile;
use crate::state_file::FileStateStore;

#[derive(Parser)]
#[command(name = "gridline")]
#[command(about = "Filter, sort and page through a SQLite table", long_about = None)]
struct Cli {
    /// Log pipeline activity at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one page of a table
    Browse {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        per_page: Option<usize>,
        /// Sort entry as COLUMN:DIR, e.g. `age:desc`; repeatable
        #[arg(long = "sort", value_name = "COLUMN:DIR")]
        sort: Vec<String>,
        /// Remember state between runs in this JSON file
        #[arg(long, value_name = "FILE")]
        remember: Option<PathBuf>,
        /// Forget sort, filter and page size before rendering
        #[arg(long)]
        reset: bool,
    },
    /// Print typeahead suggestions of a filter, one per line
    Suggest {
        #[command(flatten)]
        target: Target,
        /// Filter to suggest values for
        filter_name: String,
        /// Text typed so far
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Args)]
struct Target {
    /// SQLite database file, or `:memory:`
    db: PathBuf,
    table: String,
    /// TOML file with [grid], [[columns]] and [[filters]]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Filter value as NAME=VALUE; repeatable
    #[arg(long = "filter", value_name = "NAME=VALUE")]
    filter: Vec<String>,
    /// Log diagnostics at debug level instead of surfacing them
    #[arg(long)]
    no_strict: bool,
}

impl Target {
    fn filter_values(&self) -> Result<IndexMap<String, serde_json::Value>> {
        self.filter
            .iter()
            .map(|entry| {
                let (name, value) = entry
                    .split_once('=')
                    .with_context(|| format!("filter '{}' is not NAME=VALUE", entry))?;
                Ok((name.to_string(), serde_json::Value::String(value.to_string())))
            })
            .collect()
    }

    /// Open the table and build a grid from the definition file. Without
    /// `[[columns]]`, every table column is shown and sortable.
    async fn grid(&self, remember: Option<&PathBuf>) -> Result<Grid> {
        let mut file = match &self.config {
            Some(path) => GridFile::load(path)?,
            None => GridFile::default(),
        };
        if self.no_strict {
            file.grid.set_strict_mode(false);
        }

        let db = self.db.to_string_lossy();
        let connection = Arc::new(
            SqliteConnection::open(&db).with_context(|| format!("failed to open {}", db))?,
        );
        let source = SqlSource::new(connection.clone(), &self.table)
            .with_context(|| format!("invalid table name '{}'", self.table))?;

        let mut builder = GridBuilder::new(&self.table);
        if file.columns.is_empty() {
            for name in table_columns(connection.as_ref(), &self.table).await? {
                builder = builder.column(Column::new(&name, name.clone()).sortable());
            }
        }
        if let Some(path) = remember {
            file.grid.set_remember_state(true, None);
            builder = builder.state_store(Arc::new(FileStateStore::new(path)));
        }

        file.apply(builder)
            .source(source)
            .build()
            .context("invalid grid definition")
    }
}

async fn table_columns(connection: &dyn Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("SELECT * FROM {} LIMIT 0", connection.quote_identifier(table));
    let result = connection
        .query(&sql, &[])
        .await
        .with_context(|| format!("failed to read columns of '{}'", table))?;
    Ok(result.columns.into_iter().map(|column| column.name).collect())
}

async fn browse(
    target: Target,
    page: Option<usize>,
    per_page: Option<usize>,
    sort: Vec<String>,
    remember: Option<PathBuf>,
    reset: bool,
) -> Result<()> {
    let mut grid = target.grid(remember.as_ref()).await?;

    let mut sorting = IndexMap::new();
    for entry in &sort {
        let (column, direction) = entry.split_once(':').unwrap_or((entry.as_str(), "asc"));
        sorting.insert(column.to_string(), direction.to_string());
    }
    let filter = target.filter_values()?;

    let request = GridState {
        page,
        per_page,
        sort: sorting,
        filter: IndexMap::new(),
    };
    let is_state_changing = reset || !request.is_empty() || !filter.is_empty();
    grid.load_state(request, is_state_changing)?;
    if reset {
        grid.reset()?;
    }
    if !filter.is_empty() {
        grid.apply_filter_input(filter)?;
        if let Some(page) = page {
            grid.set_page(page);
        }
    }

    let view = grid.view().await?;
    println!("{}", render::table(&view));
    println!("{}", render::pager(&view.paginator));

    grid.save_state().context("failed to remember grid state")?;
    Ok(())
}

async fn suggest(
    target: Target,
    filter_name: String,
    query: String,
    limit: Option<usize>,
) -> Result<()> {
    let mut grid = target.grid(None).await?;
    let filter = target.filter_values()?;
    if !filter.is_empty() {
        grid.apply_filter_input(filter)?;
    }
    if grid.filter_definition(&filter_name).is_none() {
        bail!("no filter named '{}' in the grid definition", filter_name);
    }

    for item in grid.suggest(&filter_name, &query, limit).await? {
        println!("{}", item);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Command::Browse {
            target,
            page,
            per_page,
            sort,
            remember,
            reset,
        } => browse(target, page, per_page, sort, remember, reset).await,
        Command::Suggest {
            target,
            filter_name,
            query,
            limit,
        } => suggest(target, filter_name, query, limit).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seeded(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("people.db");
        let conn = SqliteConnection::open(&path.to_string_lossy()).unwrap();
        conn.execute_batch(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, city TEXT);
             INSERT INTO people VALUES (1, 'Anna', 'Linz');
             INSERT INTO people VALUES (2, 'Bernd', 'linz');
             INSERT INTO people VALUES (3, 'Clara', 'Wien');",
        )
        .await
        .unwrap();
        path
    }

    fn target(db: PathBuf, filter: Vec<String>) -> Target {
        Target {
            db,
            table: "people".to_string(),
            config: None,
            filter,
            no_strict: false,
        }
    }

    #[test]
    fn test_cli_parses_repeated_options() {
        let cli = Cli::try_parse_from([
            "gridline", "browse", "app.db", "people", "--sort", "name:desc", "--sort", "id",
            "--filter", "city=Linz", "--page", "2",
        ])
        .unwrap();
        let Command::Browse {
            target, sort, page, ..
        } = cli.command
        else {
            panic!("expected browse");
        };
        assert_eq!(sort, vec!["name:desc", "id"]);
        assert_eq!(page, Some(2));
        assert_eq!(target.filter, vec!["city=Linz"]);
    }

    #[test]
    fn test_malformed_filter_argument() {
        let target = target(PathBuf::from(":memory:"), vec!["city".to_string()]);
        assert!(target.filter_values().is_err());
    }

    #[tokio::test]
    async fn test_columns_default_to_table_columns() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded(&dir).await;
        let mut grid = target(db, vec![]).grid(None).await.unwrap();

        let names: Vec<&str> = grid.columns().map(Column::name).collect();
        assert_eq!(names, vec!["id", "name", "city"]);
        assert_eq!(grid.view().await.unwrap().rows.len(), 3);
    }

    #[tokio::test]
    async fn test_browse_remembers_state_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded(&dir).await;
        let state = dir.path().join("state.json");

        browse(
            target(db.clone(), vec![]),
            None,
            Some(10),
            vec!["name:desc".to_string()],
            Some(state.clone()),
            false,
        )
        .await
        .unwrap();

        let store = FileStateStore::new(&state);
        let remembered = gridline_core::StateStore::get(&store, "gridline:people")
            .unwrap()
            .unwrap();
        assert_eq!(remembered.per_page, Some(10));
        assert_eq!(remembered.sort.get("name").map(String::as_str), Some("desc"));

        browse(target(db, vec![]), None, None, vec![], Some(state.clone()), true)
            .await
            .unwrap();
        let remembered = gridline_core::StateStore::get(&store, "gridline:people")
            .unwrap()
            .unwrap();
        assert!(remembered.sort.is_empty());
    }
}
