//! SQLite connection for Gridline SQL data sources

mod connection;

pub use connection::SqliteConnection;
