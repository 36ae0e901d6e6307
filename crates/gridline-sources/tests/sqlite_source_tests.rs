//! SqlSource against in-memory SQLite: the full filter, sort, limit, count and
//! suggest contract with real statement execution.

use std::sync::Arc;

use anyhow::{Context, Result};
use gridline_core::{Clause, ColumnToken};
use gridline_sources::sqlite::SqliteConnection;
use gridline_sources::{
    Condition, DataSource, Operator, SelectQuery, SortDirection, Sorting, SqlSource,
    SuggestColumn, Value,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

async fn cities() -> Result<Arc<SqliteConnection>> {
    let conn = SqliteConnection::open(":memory:")?;
    conn.execute_batch(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, surname TEXT, city TEXT, age INTEGER);
         INSERT INTO people VALUES (1, 'Anna', 'Bauer', 'Linz', 34);
         INSERT INTO people VALUES (2, 'Bernd', 'Abel', 'linz', 41);
         INSERT INTO people VALUES (3, 'Clara', 'Weber', 'Wien', 27);
         INSERT INTO people VALUES (4, 'Dora', 'Huber', NULL, 58);
         INSERT INTO people VALUES (5, 'Emil', 'Graf', 'Graz', 19);",
    )
    .await
    .context("failed to seed people")?;
    Ok(Arc::new(conn))
}

fn ids(rows: &[gridline_sources::Row]) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get_by_name("id").and_then(Value::as_i64))
        .collect()
}

#[tokio::test]
async fn test_filter_sort_and_window() -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?.with_alias("p")?;

    source.filter(&[Condition::new("age", Operator::GreaterThanOrEqual, 27)])?;
    let mut sorting = Sorting::new();
    sorting.insert("age".into(), SortDirection::Desc);
    source.sort(&sorting)?;
    source.limit(1, 2)?;

    assert_eq!(source.count().await?, 4, "count ignores the window");
    assert_eq!(ids(&source.data().await?), vec![2, 1]);
    Ok(())
}

#[rstest]
#[case::equal(Condition::new("city", Operator::Equal, "Linz"), vec![1])]
#[case::in_list(Condition::new("id", Operator::In, vec![1, 3, 5]), vec![1, 3, 5])]
#[case::empty_in(Condition::new("id", Operator::In, Value::List(vec![])), vec![])]
#[case::empty_not_in(Condition::new("id", Operator::NotIn, Value::List(vec![])), vec![1, 2, 3, 4, 5])]
#[case::between(Condition::new("age", Operator::Between, vec![20, 40]), vec![1, 3])]
#[case::is_null(Condition::new("city", Operator::IsNull, Value::Null), vec![4])]
#[case::not_like(Condition::new("name", Operator::NotLike, "%a%"), vec![2, 5])]
#[tokio::test]
async fn test_operators(#[case] condition: Condition, #[case] expected: Vec<i64>) -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?;
    source.filter(&[condition])?;
    let mut sorting = Sorting::new();
    sorting.insert("id".into(), SortDirection::Asc);
    source.sort(&sorting)?;

    assert_eq!(ids(&source.data().await?), expected);
    Ok(())
}

#[tokio::test]
async fn test_compound_columns_share_operator_and_value() -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?;
    let condition = Condition::compound(["name", "OR", "surname"], Operator::Like, "%ab%")?;
    assert_eq!(condition.columns().len(), 3);
    assert!(matches!(&condition.columns()[1], ColumnToken::Logical(_)));

    source.filter(&[condition])?;
    assert_eq!(ids(&source.data().await?), vec![2]);
    Ok(())
}

#[tokio::test]
async fn test_several_conditions_bind_distinct_placeholders() -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?;
    source.filter(&[
        Condition::new("age", Operator::GreaterThan, 20),
        Condition::new("age", Operator::LessThan, 50),
        Condition::new("city", Operator::Like, "%n%"),
    ])?;

    let names: Vec<&str> = source.query().bindings().iter().map(|b| b.name.as_str()).collect();
    let unique: std::collections::HashSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), unique.len());
    assert_eq!(source.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_injection_attempt_is_bound_not_executed() -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?;
    source.filter(&[Condition::new("name", Operator::Equal, "x' OR '1'='1")])?;
    assert_eq!(source.count().await?, 0);
    assert!(!source.sql().contains("'1'='1"));
    Ok(())
}

#[tokio::test]
async fn test_raw_callback_condition() -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?;
    let condition = Condition::for_query(4, |value, query: &mut SelectQuery| {
        let placeholder = query.bind(value.clone());
        query.where_raw(format!("length(name) = {}", placeholder));
        Ok(())
    })
    .describing("name", Operator::Equal);

    source.filter(&[condition])?;
    assert_eq!(source.count().await?, 3);
    Ok(())
}

#[tokio::test]
async fn test_callback_for_other_backend_is_translation_error() -> Result<()> {
    let mut source = SqlSource::new(cities().await?, "people")?;
    let condition = Condition::for_query(1, |_, _: &mut gridline_sources::MemoryQuery| Ok(()));

    let err = source.filter(&[condition]).err().context("filter should fail")?;
    assert!(matches!(err, gridline_sources::GridError::Translation(_)));
    Ok(())
}

#[tokio::test]
async fn test_suggest_distinct_column() -> Result<()> {
    let source = SqlSource::new(cities().await?, "people")?;
    let items = source
        .suggest(&SuggestColumn::name("city"), &[], 10)
        .await?;
    assert_eq!(items, vec!["Graz", "Linz", "Wien", "linz"]);
    Ok(())
}

#[tokio::test]
async fn test_suggest_callback_dedupes_then_sorts() -> Result<()> {
    let source = SqlSource::new(cities().await?, "people")?;
    let items = source
        .suggest(
            &SuggestColumn::callback(|row| {
                row.get_by_name("city").map(Value::to_string).unwrap_or_default()
            }),
            &[Condition::new("city", Operator::Like, "%linz%")],
            0,
        )
        .await?;
    assert_eq!(items, vec!["Linz", "linz"]);
    Ok(())
}

#[tokio::test]
async fn test_suggest_escapes_markup() -> Result<()> {
    let conn = cities().await?;
    gridline_core::Connection::execute(
        conn.as_ref(),
        "INSERT INTO people VALUES (6, '<b>Fritz</b>', 'O''Neil', 'Salzburg', 30)",
        &[],
    )
    .await?;
    let source = SqlSource::new(conn, "people")?;

    let items = source
        .suggest(
            &SuggestColumn::name("surname"),
            &[Condition::new("id", Operator::Equal, 6)],
            5,
        )
        .await?;
    assert_eq!(items, vec!["O&#039;Neil"]);
    Ok(())
}

#[test]
fn test_clause_shape_is_backend_neutral() {
    let mut translator = gridline_core::QueryTranslator::new(gridline_core::VerbatimStrategy);
    let translation = translator
        .translate(&Condition::new("city", Operator::Equal, "Linz"))
        .unwrap();
    assert!(matches!(translation.clause, Clause::Predicate { ref column, .. } if column == "city"));
}
