use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::info;

use super::experiments::count_experiments;
use super::fields::load_fields;
use super::indices::{create_physical_indices, drop_physical_indices, load_indices};
use super::names::canonical_name;
use super::schema::{table_exists, touch_updated_at};
use super::{BenchIndex, Benchmark, Field, Store, StoreError, StoreResult};

/// Everything known about one benchmark; `bench describe` serializes it.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub benchmark: Benchmark,
    pub view_table: String,
    pub fields: Vec<Field>,
    pub indices: Vec<BenchIndex>,
    pub experiments: i64,
    pub outliers: i64,
}

impl Store {
    pub fn create_benchmark(&mut self, name: &str, description: Option<&str>) -> StoreResult<Benchmark> {
        let name = canonical_name(name)?;
        let tx = self.conn.transaction()?;
        if load_benchmark(&tx, &name)?.is_some() {
            return Err(StoreError::Duplicate {
                kind: "benchmark",
                name,
            });
        }
        let bench = insert_benchmark(&tx, &name, description)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, "created benchmark");
        Ok(bench)
    }

    /// Returns the benchmark, creating it on first reference.
    pub fn ensure_benchmark(&mut self, name: &str) -> StoreResult<Benchmark> {
        let name = canonical_name(name)?;
        let tx = self.conn.transaction()?;
        let bench = ensure_benchmark(&tx, &name)?;
        tx.commit()?;
        Ok(bench)
    }

    pub fn benchmark(&self, name: &str) -> StoreResult<Benchmark> {
        require_benchmark(&self.conn, &canonical_name(name)?)
    }

    pub fn find_benchmark(&self, name: &str) -> StoreResult<Option<Benchmark>> {
        load_benchmark(&self.conn, &canonical_name(name)?)
    }

    pub fn list_benchmarks(&self) -> StoreResult<Vec<Benchmark>> {
        let mut statement = self
            .conn
            .prepare("SELECT bench_id, name, description FROM benchmarks ORDER BY name")?;
        let benches = statement
            .query_map([], |row| {
                Ok(Benchmark {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(benches)
    }

    /// Renames the benchmark together with its wide table and indices.
    pub fn rename_benchmark(&mut self, old: &str, new: &str) -> StoreResult<Benchmark> {
        let old = canonical_name(old)?;
        let new = canonical_name(new)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &old)?;
        if old == new {
            return Ok(bench);
        }
        if load_benchmark(&tx, &new)?.is_some() {
            return Err(StoreError::Duplicate {
                kind: "benchmark",
                name: new,
            });
        }

        tx.execute(
            "UPDATE benchmarks SET name = ?1 WHERE bench_id = ?2",
            params![new, bench.id],
        )?;
        let renamed = Benchmark {
            name: new,
            ..bench.clone()
        };

        let old_table = bench.view_table();
        if table_exists(&tx, &old_table)? {
            drop_physical_indices(&tx, &bench)?;
            tx.execute_batch(&format!(
                "ALTER TABLE {old_table} RENAME TO {}",
                renamed.view_table()
            ))?;
            create_physical_indices(&tx, &renamed)?;
        }
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(from = %bench.name, to = %renamed.name, "renamed benchmark");
        Ok(renamed)
    }

    pub fn set_description(&mut self, name: &str, description: Option<&str>) -> StoreResult<()> {
        let name = canonical_name(name)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &name)?;
        tx.execute(
            "UPDATE benchmarks SET description = ?1 WHERE bench_id = ?2",
            params![description, bench.id],
        )?;
        touch_updated_at(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Removes an empty benchmark. Fields and experiments must be removed
    /// first.
    pub fn remove_benchmark(&mut self, name: &str) -> StoreResult<()> {
        let name = canonical_name(name)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &name)?;

        let experiments = count_experiments(&tx, bench.id)?;
        if experiments > 0 {
            return Err(StoreError::SchemaViolation(format!(
                "benchmark {} still holds {experiments} experiment(s)",
                bench.name
            )));
        }
        let fields = load_fields(&tx, bench.id)?;
        if !fields.is_empty() {
            return Err(StoreError::SchemaViolation(format!(
                "benchmark {} still defines {} field(s)",
                bench.name,
                fields.len()
            )));
        }

        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", bench.view_table()))?;
        tx.execute("DELETE FROM bench_indices WHERE bench_id = ?1", [bench.id])?;
        tx.execute("DELETE FROM benchmarks WHERE bench_id = ?1", [bench.id])?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, "removed benchmark");
        Ok(())
    }

    pub fn describe_benchmark(&self, name: &str) -> StoreResult<BenchmarkSummary> {
        let benchmark = self.benchmark(name)?;
        let fields = load_fields(&self.conn, benchmark.id)?;
        let indices = load_indices(&self.conn, benchmark.id)?;
        let experiments = count_experiments(&self.conn, benchmark.id)?;
        let outliers: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM experiments WHERE bench_id = ?1 AND is_outlier = 1",
            [benchmark.id],
            |row| row.get(0),
        )?;

        Ok(BenchmarkSummary {
            view_table: benchmark.view_table(),
            benchmark,
            fields,
            indices,
            experiments,
            outliers,
        })
    }
}

pub(super) fn load_benchmark(connection: &Connection, name: &str) -> StoreResult<Option<Benchmark>> {
    let bench = connection
        .query_row(
            "SELECT bench_id, name, description FROM benchmarks WHERE name = ?1",
            [name],
            |row| {
                Ok(Benchmark {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(bench)
}

pub(super) fn require_benchmark(connection: &Connection, name: &str) -> StoreResult<Benchmark> {
    load_benchmark(connection, name)?.ok_or_else(|| StoreError::NotFound {
        kind: "benchmark",
        name: name.to_string(),
    })
}

pub(super) fn ensure_benchmark(connection: &Connection, name: &str) -> StoreResult<Benchmark> {
    match load_benchmark(connection, name)? {
        Some(bench) => Ok(bench),
        None => {
            let bench = insert_benchmark(connection, name, None)?;
            info!(bench = %bench.name, "created benchmark on first reference");
            Ok(bench)
        }
    }
}

fn insert_benchmark(connection: &Connection, name: &str, description: Option<&str>) -> StoreResult<Benchmark> {
    connection.execute(
        "INSERT INTO benchmarks(name, description) VALUES(?1, ?2)",
        params![name, description],
    )?;
    Ok(Benchmark {
        id: connection.last_insert_rowid(),
        name: name.to_string(),
        description: description.map(str::to_string),
    })
}
