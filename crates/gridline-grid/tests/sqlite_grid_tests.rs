//! The grid pipeline end to end against SQLite

use std::sync::Arc;

use anyhow::{Context, Result};
use gridline_core::Value;
use gridline_grid::{
    CheckFilter, CollectingSink, Column, GridBuilder, GridConfig, GridState, NumberFilter,
    SelectFilter, TextFilter,
};
use gridline_sources::SqlSource;
use gridline_sources::sqlite::SqliteConnection;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::json;

async fn people() -> Result<SqlSource> {
    let conn = SqliteConnection::open(":memory:")?;
    conn.execute_batch(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, surname TEXT, city TEXT, age INTEGER, email TEXT);
         INSERT INTO people VALUES (1, 'Anna', 'Bauer', 'Linz', 34, 'anna@example.com');
         INSERT INTO people VALUES (2, 'Bernd', 'Abel', 'linz', 41, NULL);
         INSERT INTO people VALUES (3, 'Clara', 'Weber', 'Wien', 27, 'clara@example.com');
         INSERT INTO people VALUES (4, 'Dora', 'Huber', NULL, 58, NULL);
         INSERT INTO people VALUES (5, 'Emil', 'Graf', 'Graz', 19, 'emil@example.com');",
    )
    .await
    .context("failed to seed people")?;
    Ok(SqlSource::new(Arc::new(conn), "people")?.with_alias("p")?)
}

fn builder(source: SqlSource, sink: Arc<CollectingSink>) -> GridBuilder {
    let mut config = GridConfig::new();
    config.set_per_page_list(vec![2, 5, 10]);
    config.set_default_per_page(2);
    GridBuilder::new("people")
        .config(config)
        .source(source)
        .column(Column::new("name", "Name").sortable())
        .column(Column::new("age", "Age").sortable())
        .filter(TextFilter::new("search", "Search").with_columns(["name", "OR", "surname"]))
        .filter(TextFilter::new("city", "City").with_suggestion())
        .filter(NumberFilter::new("age", "Age"))
        .filter(SelectFilter::new("id", "Id").with_items([("1", "One"), ("2", "Two"), ("3", "Three")]))
        .filter(CheckFilter::new("email", "Has email"))
        .diagnostic_sink(sink)
}

fn ids(rows: &[gridline_core::Row]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get_by_name("id").and_then(Value::as_i64))
        .collect()
}

#[tokio::test]
async fn test_filter_sort_and_page() -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let mut grid = builder(people().await?, sink.clone()).build()?;

    let mut filter = IndexMap::new();
    filter.insert("age".to_string(), json!(">= 27"));
    grid.apply_filter_input(filter)?;
    let mut sort = IndexMap::new();
    sort.insert("age".to_string(), "desc".to_string());
    grid.set_sort(sort);

    assert_eq!(grid.count().await?, 4);
    assert_eq!(ids(&grid.data().await?), vec![4, 2]);

    grid.set_page(2);
    assert_eq!(ids(&grid.data().await?), vec![1, 3]);
    let paginator = grid.paginator().context("paged")?;
    assert_eq!(paginator.page_count(), 2);
    assert!(sink.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_compound_text_and_check_filters() -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let mut grid = builder(people().await?, sink).build()?;

    let mut filter = IndexMap::new();
    filter.insert("search".to_string(), json!("ab"));
    grid.apply_filter_input(filter)?;
    assert_eq!(ids(&grid.data().await?), vec![2]);

    let mut filter = IndexMap::new();
    filter.insert("search".to_string(), json!(""));
    filter.insert("email".to_string(), json!("1"));
    grid.apply_filter_input(filter)?;
    assert_eq!(grid.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_select_filter_rejects_unknown_item() -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let mut grid = builder(people().await?, sink.clone()).build()?;

    let mut filter = IndexMap::new();
    filter.insert("id".to_string(), json!("9"));
    grid.apply_filter_input(filter)?;

    assert_eq!(grid.count().await?, 5, "the whole filter is dropped");
    assert_eq!(sink.messages(), vec!["Value '9' is out of allowed set of filter 'id'."]);
    Ok(())
}

#[tokio::test]
async fn test_huge_per_page_from_state_still_fetches() -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let mut grid = builder(people().await?, sink.clone()).build()?;
    grid.load_state(GridState::default().with_per_page(usize::MAX), false)?;

    assert_eq!(ids(&grid.data().await?), vec![1, 2, 3, 4, 5]);
    assert_eq!(
        sink.messages(),
        vec![format!("The number '{}' of items per page is out of range.", usize::MAX)]
    );
    Ok(())
}

#[tokio::test]
async fn test_suggest_distinct_city_values() -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let grid = builder(people().await?, sink).build()?;

    let items = grid.suggest("city", "linz", None).await?;
    assert_eq!(items, vec!["Linz", "linz"]);

    // NULL takes one slot of the limit but is never suggested
    let items = grid.suggest("city", "", Some(3)).await?;
    assert_eq!(items, vec!["Graz", "Linz"]);
    Ok(())
}

#[tokio::test]
async fn test_where_callback_writes_raw_sql() -> Result<()> {
    let sink = Arc::new(CollectingSink::new());
    let source = people().await?;
    let mut grid = GridBuilder::new("people")
        .source(source)
        .filter(
            TextFilter::new("initial", "Initial").with_where(|value, query| {
                let query = query
                    .as_any_mut()
                    .downcast_mut::<gridline_sources::SelectQuery>()
                    .ok_or_else(|| gridline_core::GridError::Translation("expected sql".into()))?;
                let placeholder = query.bind(value.clone());
                query.where_raw(format!("substr(name, 2, 1) LIKE {}", placeholder));
                Ok(())
            }),
        )
        .diagnostic_sink(sink)
        .build()?;

    let mut filter = IndexMap::new();
    filter.insert("initial".to_string(), json!("n"));
    grid.apply_filter_input(filter)?;
    // TextFilter wraps the value as %n%
    assert_eq!(ids(&grid.data().await?), vec![1]);
    Ok(())
}
