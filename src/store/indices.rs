use rusqlite::{Connection, params};
use tracing::info;

use super::benchmarks::require_benchmark;
use super::fields::{find_field, load_fields};
use super::names::{canonical_name, column_name, physical_index_name};
use super::schema::{table_exists, touch_updated_at};
use super::{BenchIndex, Benchmark, Store, StoreError, StoreResult};

const FIELD_LIST_SEPARATOR: char = ',';

impl Store {
    pub fn create_index(&mut self, bench: &str, name: &str, fields: &[String]) -> StoreResult<BenchIndex> {
        let bench_name = canonical_name(bench)?;
        let index_name = canonical_name(name)?;
        if fields.is_empty() {
            return Err(StoreError::InvalidValue(format!(
                "index {index_name} needs at least one field"
            )));
        }

        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let known = load_fields(&tx, bench.id)?;
        let mut names = Vec::with_capacity(fields.len());
        for field in fields {
            let field = find_field(&known, &bench, &canonical_name(field)?)?;
            if names.contains(&field.name) {
                return Err(StoreError::InvalidValue(format!(
                    "index {index_name} lists field {} twice",
                    field.name
                )));
            }
            names.push(field.name);
        }
        if load_indices(&tx, bench.id)?
            .iter()
            .any(|index| index.name == index_name)
        {
            return Err(StoreError::Duplicate {
                kind: "index",
                name: format!("{}.{index_name}", bench.name),
            });
        }

        let joined = names.join(&FIELD_LIST_SEPARATOR.to_string());
        tx.execute(
            "INSERT INTO bench_indices(bench_id, name, field_list) VALUES(?1, ?2, ?3)",
            params![bench.id, index_name, joined],
        )?;
        let index = BenchIndex {
            name: index_name,
            fields: names,
        };
        create_physical_index(&tx, &bench, &index)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, index = %index.name, fields = ?index.fields, "created index");
        Ok(index)
    }

    pub fn drop_index(&mut self, bench: &str, name: &str) -> StoreResult<()> {
        let bench_name = canonical_name(bench)?;
        let index_name = canonical_name(name)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let removed = tx.execute(
            "DELETE FROM bench_indices WHERE bench_id = ?1 AND name = ?2",
            params![bench.id, index_name],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                kind: "index",
                name: format!("{}.{index_name}", bench.name),
            });
        }
        tx.execute_batch(&format!(
            "DROP INDEX IF EXISTS {}",
            physical_index_name(&bench.name, &index_name)
        ))?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, index = %index_name, "dropped index");
        Ok(())
    }

    pub fn indices(&self, bench: &str) -> StoreResult<Vec<BenchIndex>> {
        let bench = self.benchmark(bench)?;
        load_indices(&self.conn, bench.id)
    }
}

pub(super) fn load_indices(connection: &Connection, bench_id: i64) -> StoreResult<Vec<BenchIndex>> {
    let mut statement = connection.prepare(
        "SELECT name, field_list FROM bench_indices WHERE bench_id = ?1 ORDER BY name",
    )?;
    let indices = statement
        .query_map([bench_id], |row| {
            let name: String = row.get(0)?;
            let field_list: String = row.get(1)?;
            Ok(BenchIndex {
                name,
                fields: field_list
                    .split(FIELD_LIST_SEPARATOR)
                    .filter(|field| !field.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(indices)
}

/// Materializes every recorded index over the benchmark's wide table, if the
/// table exists.
pub(super) fn create_physical_indices(connection: &Connection, bench: &Benchmark) -> StoreResult<()> {
    if !table_exists(connection, &bench.view_table())? {
        return Ok(());
    }
    for index in load_indices(connection, bench.id)? {
        create_physical_index(connection, bench, &index)?;
    }
    Ok(())
}

pub(super) fn drop_physical_indices(connection: &Connection, bench: &Benchmark) -> StoreResult<()> {
    for index in load_indices(connection, bench.id)? {
        connection.execute_batch(&format!(
            "DROP INDEX IF EXISTS {}",
            physical_index_name(&bench.name, &index.name)
        ))?;
    }
    Ok(())
}

/// Replaces a renamed field inside every recorded index definition.
pub(super) fn rewrite_index_fields(
    connection: &Connection,
    bench: &Benchmark,
    old: &str,
    new: &str,
) -> StoreResult<()> {
    for index in load_indices(connection, bench.id)? {
        if !index.fields.iter().any(|field| field == old) {
            continue;
        }
        let fields: Vec<&str> = index
            .fields
            .iter()
            .map(|field| if field == old { new } else { field.as_str() })
            .collect();
        connection.execute(
            "UPDATE bench_indices SET field_list = ?1 WHERE bench_id = ?2 AND name = ?3",
            params![fields.join(&FIELD_LIST_SEPARATOR.to_string()), bench.id, index.name],
        )?;
    }
    Ok(())
}

fn create_physical_index(connection: &Connection, bench: &Benchmark, index: &BenchIndex) -> StoreResult<()> {
    let table = bench.view_table();
    if !table_exists(connection, &table)? {
        return Ok(());
    }
    let columns: Vec<String> = index.fields.iter().map(|field| column_name(field)).collect();
    connection.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS {} ON {table} ({})",
        physical_index_name(&bench.name, &index.name),
        columns.join(", ")
    ))?;
    Ok(())
}
