use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use super::{StoreError, StoreResult};
use crate::util::now_utc_string;

/// Major/minor version of the meta-table layout. A mismatch on open is
/// fatal; there is no automatic migration.
pub const SCHEMA_VERSION: (u32, u32) = (1, 0);

pub(super) fn configure_connection(connection: &Connection) -> StoreResult<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> StoreResult<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS benchmarks (
          bench_id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          description TEXT
        );

        CREATE TABLE IF NOT EXISTS fields (
          field_id INTEGER PRIMARY KEY AUTOINCREMENT,
          bench_id INTEGER NOT NULL,
          name TEXT NOT NULL,
          is_numeric INTEGER NOT NULL,
          is_key INTEGER NOT NULL,
          position INTEGER NOT NULL,
          UNIQUE(bench_id, name),
          FOREIGN KEY(bench_id) REFERENCES benchmarks(bench_id)
        );

        CREATE TABLE IF NOT EXISTS experiments (
          exp_id INTEGER PRIMARY KEY AUTOINCREMENT,
          bench_id INTEGER NOT NULL,
          identity TEXT NOT NULL,
          is_outlier INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          UNIQUE(bench_id, identity),
          FOREIGN KEY(bench_id) REFERENCES benchmarks(bench_id)
        );

        CREATE TABLE IF NOT EXISTS bench_indices (
          index_id INTEGER PRIMARY KEY AUTOINCREMENT,
          bench_id INTEGER NOT NULL,
          name TEXT NOT NULL,
          field_list TEXT NOT NULL,
          UNIQUE(bench_id, name),
          FOREIGN KEY(bench_id) REFERENCES benchmarks(bench_id)
        );

        CREATE INDEX IF NOT EXISTS idx_fields_bench ON fields(bench_id, position);
        CREATE INDEX IF NOT EXISTS idx_experiments_bench ON experiments(bench_id);
        ",
    )?;

    check_version(connection)?;
    Ok(())
}

fn check_version(connection: &Connection) -> StoreResult<()> {
    let expected = format!("{}.{}", SCHEMA_VERSION.0, SCHEMA_VERSION.1);
    let major = read_metadata(connection, "schema_version_major")?;
    let minor = read_metadata(connection, "schema_version_minor")?;

    match (major, minor) {
        (None, None) => {
            let now = now_utc_string();
            for (key, value) in [
                ("schema_version_major", SCHEMA_VERSION.0.to_string()),
                ("schema_version_minor", SCHEMA_VERSION.1.to_string()),
                ("db_created_at", now.clone()),
                ("db_updated_at", now),
            ] {
                write_metadata(connection, key, &value)?;
            }
            info!(version = %expected, "initialized store schema");
            Ok(())
        }
        (major, minor) => {
            let found = format!(
                "{}.{}",
                major.unwrap_or_default(),
                minor.unwrap_or_default()
            );
            if found != expected {
                return Err(StoreError::VersionMismatch { found, expected });
            }
            Ok(())
        }
    }
}

fn read_metadata(connection: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub(super) fn write_metadata(connection: &Connection, key: &str, value: &str) -> StoreResult<()> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub(super) fn touch_updated_at(connection: &Connection) -> StoreResult<()> {
    write_metadata(connection, "db_updated_at", &now_utc_string())
}

pub(super) fn load_metadata(connection: &Connection) -> StoreResult<Vec<(String, String)>> {
    let mut statement = connection.prepare("SELECT key, value FROM metadata ORDER BY key")?;
    let rows = statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(super) fn table_exists(connection: &Connection, table: &str) -> StoreResult<bool> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
