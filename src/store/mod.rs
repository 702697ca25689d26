//! Benchmark store: schema of benchmarks and typed fields, one wide table per
//! benchmark holding one row per experiment, secondary indices and bulk
//! import.

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

mod benchmarks;
mod experiments;
mod fields;
mod import;
mod indices;
mod names;
mod query;
mod schema;
#[cfg(test)]
mod tests;
mod view;

pub use benchmarks::BenchmarkSummary;
pub use experiments::InsertOutcome;
pub use import::{ImportObserver, ImportOptions, ImportSummary};
pub use names::{canonical_name, column_name, identity_string, view_table_name};
pub use query::{RawResult, Row, RowQuery};
pub use schema::SCHEMA_VERSION;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("data error near input line {line}: {message}")]
    Data { line: u64, message: String },
    #[error("import canceled; {committed} row(s) from earlier chunks remain committed")]
    Canceled { committed: u64 },
    #[error("store schema version {found} does not match supported version {expected}")]
    VersionMismatch { found: String, expected: String },
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Benchmark {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl Benchmark {
    pub fn view_table(&self) -> String {
        view_table_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub id: i64,
    pub bench_id: i64,
    pub name: String,
    pub numeric: bool,
    pub key: bool,
    pub position: i64,
}

impl Field {
    pub fn column(&self) -> String {
        column_name(&self.name)
    }

    fn sql_type(&self) -> &'static str {
        if self.numeric { "REAL" } else { "TEXT" }
    }
}

/// Definition of a field to add. `default` is back-filled into rows that
/// already exist.
#[derive(Debug, Clone, Default)]
pub struct FieldSpec {
    pub name: String,
    pub numeric: bool,
    pub key: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchIndex {
    pub name: String,
    pub fields: Vec<String>,
}

/// Handle to one store database. Exactly one mutating operation runs at a
/// time; every mutation is a single transaction.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "opened benchmark store");
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        schema::configure_connection(&conn)?;
        schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn metadata(&self) -> StoreResult<Vec<(String, String)>> {
        schema::load_metadata(&self.conn)
    }
}
