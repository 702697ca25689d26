use rusqlite::Connection;
use tracing::debug;

use super::indices::create_physical_indices;
use super::schema::table_exists;
use super::{Benchmark, Field, StoreResult};

const FIXED_COLUMNS: [&str; 3] = ["BENCH", "EXP", "OUT"];

/// Replaces the benchmark's wide table after its field set changed. Values of
/// surviving fields are copied by field id, so renamed columns keep their
/// data. Runs inside the caller's transaction.
pub(super) fn rebuild_view(
    connection: &Connection,
    bench: &Benchmark,
    previous: &[Field],
    current: &[Field],
) -> StoreResult<()> {
    let table = bench.view_table();
    if current.is_empty() {
        connection.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
        debug!(table = %table, "dropped wide table without fields");
        return Ok(());
    }

    let staging = format!("{table}__NEW");
    connection.execute_batch(&format!("DROP TABLE IF EXISTS {staging}"))?;
    create_view_table(connection, &staging, current)?;

    if table_exists(connection, &table)? {
        let mut targets: Vec<String> = FIXED_COLUMNS.iter().map(|name| name.to_string()).collect();
        let mut sources = targets.clone();
        for field in current {
            if let Some(old) = previous.iter().find(|candidate| candidate.id == field.id) {
                targets.push(field.column());
                sources.push(old.column());
            }
        }
        connection.execute_batch(&format!(
            "INSERT INTO {staging} ({}) SELECT {} FROM {table};
             DROP TABLE {table};",
            targets.join(", "),
            sources.join(", ")
        ))?;
    }

    connection.execute_batch(&format!("ALTER TABLE {staging} RENAME TO {table}"))?;
    create_physical_indices(connection, bench)?;

    debug!(table = %table, columns = current.len(), "rebuilt wide table");
    Ok(())
}

fn create_view_table(connection: &Connection, table: &str, fields: &[Field]) -> StoreResult<()> {
    let mut columns = vec![
        "BENCH INTEGER NOT NULL".to_string(),
        "EXP INTEGER PRIMARY KEY".to_string(),
        "OUT INTEGER NOT NULL DEFAULT 0".to_string(),
    ];
    columns.extend(
        fields
            .iter()
            .map(|field| format!("{} {}", field.column(), field.sql_type())),
    );
    connection.execute_batch(&format!("CREATE TABLE {table} ({})", columns.join(", ")))?;
    Ok(())
}
