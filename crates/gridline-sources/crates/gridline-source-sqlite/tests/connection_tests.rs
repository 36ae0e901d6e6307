//! SQLite connection tests: named parameter binding, value mapping, file databases.

use anyhow::{Context, Result};
use gridline_core::{Binding, Connection, Value};
use gridline_source_sqlite::SqliteConnection;
use pretty_assertions::assert_eq;
use rstest::rstest;

async fn seeded() -> Result<SqliteConnection> {
    let conn = SqliteConnection::open(":memory:")?;
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL, city TEXT);
         INSERT INTO users (name, score, city) VALUES ('Alice', 9.5, 'Linz');
         INSERT INTO users (name, score, city) VALUES ('Bob', 7.0, NULL);
         INSERT INTO users (name, score, city) VALUES ('Carol', 8.25, 'Wien');",
    )
    .await
    .context("failed to seed users")?;
    Ok(conn)
}

#[tokio::test]
async fn test_query_maps_columns_and_values() -> Result<()> {
    let conn = seeded().await?;

    let result = conn
        .query("SELECT id, name, score, city FROM users ORDER BY id", &[])
        .await
        .context("failed to select users")?;

    assert_eq!(result.row_count(), 3);
    let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "score", "city"]);
    assert_eq!(result.columns[1].data_type, "TEXT");

    let bob = &result.rows[1];
    assert_eq!(bob.get_by_name("name"), Some(&Value::String("Bob".into())));
    assert_eq!(bob.get_by_name("score"), Some(&Value::Float(7.0)));
    assert_eq!(bob.get_by_name("city"), Some(&Value::Null));
    Ok(())
}

#[rstest]
#[case::text(":abcd0", Value::String("Carol".into()), 1)]
#[case::injection(":abcd0", Value::String("x' OR '1'='1".into()), 0)]
#[tokio::test]
async fn test_named_parameters(
    #[case] name: &str,
    #[case] value: Value,
    #[case] expected: usize,
) -> Result<()> {
    let conn = seeded().await?;
    let sql = format!("SELECT id FROM users WHERE name = {}", name);

    let result = conn.query(&sql, &[Binding::new(name, value)]).await?;

    assert_eq!(result.row_count(), expected);
    Ok(())
}

#[tokio::test]
async fn test_execute_reports_affected_rows() -> Result<()> {
    let conn = seeded().await?;

    let affected = conn
        .execute(
            "UPDATE users SET city = :city WHERE score > :min",
            &[
                Binding::new(":city", Value::String("Graz".into())),
                Binding::new(":min", Value::Float(8.0)),
            ],
        )
        .await?;

    assert_eq!(affected, 2);
    Ok(())
}

#[tokio::test]
async fn test_file_database_persists() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("grid.db");
    let path = path.to_str().context("non-utf8 temp path")?;

    {
        let conn = SqliteConnection::open(path)?;
        conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (42);")
            .await?;
    }

    let conn = SqliteConnection::open(path)?;
    let result = conn.query("SELECT v FROM t", &[]).await?;
    assert_eq!(result.scalar(), Some(&Value::Int(42)));
    Ok(())
}

#[test]
fn test_missing_parent_directory_is_a_connection_error() {
    let err = SqliteConnection::open("/definitely/not/here/grid.db")
        .err()
        .expect("open should fail");
    assert!(err.to_string().contains("Parent directory does not exist"));
}
