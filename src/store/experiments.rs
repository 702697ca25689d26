use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use super::benchmarks::require_benchmark;
use super::fields::load_fields;
use super::names::{canonical_name, canonical_values, identity_string};
use super::schema::{table_exists, touch_updated_at};
use super::{Benchmark, Field, Store, StoreError, StoreResult};
use crate::util::now_utc_string;
use crate::value::{Value, format_number, parse_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The identity string was already stored; nothing changed.
    Existing(i64),
}

impl InsertOutcome {
    pub fn id(self) -> i64 {
        match self {
            Self::Inserted(id) | Self::Existing(id) => id,
        }
    }

    pub fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Column layout and statement text for inserting into one benchmark,
/// computed once per transaction.
pub(super) struct InsertPlan {
    bench: Benchmark,
    fields: Vec<Field>,
    view_sql: String,
}

impl InsertPlan {
    pub(super) fn prepare(connection: &Connection, bench: Benchmark) -> StoreResult<Self> {
        let fields = load_fields(connection, bench.id)?;
        if !fields.iter().any(|field| field.key) {
            return Err(StoreError::SchemaViolation(format!(
                "benchmark {} has no key field; experiments cannot be identified",
                bench.name
            )));
        }

        let mut columns = vec!["BENCH".to_string(), "EXP".to_string(), "OUT".to_string()];
        columns.extend(fields.iter().map(Field::column));
        let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("?{n}")).collect();
        let view_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            bench.view_table(),
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(Self {
            bench,
            fields,
            view_sql,
        })
    }

    pub(super) fn bench(&self) -> &Benchmark {
        &self.bench
    }

    pub(super) fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Inserts one experiment from raw text values keyed by canonical field
    /// name. Fields without a value are stored as NULL.
    pub(super) fn insert(
        &self,
        connection: &Connection,
        values: &BTreeMap<String, String>,
    ) -> StoreResult<InsertOutcome> {
        let mut typed = Vec::with_capacity(self.fields.len());
        let mut key_parts = Vec::new();
        for field in &self.fields {
            let raw = values.get(&field.name).map(String::as_str).unwrap_or("");
            let value = typed_value(raw, field.numeric)
                .map_err(|reason| StoreError::InvalidValue(format!("field {}: {reason}", field.name)))?;
            if field.key {
                match &value {
                    Value::Null => {
                        return Err(StoreError::InvalidValue(format!(
                            "key field {} has no value",
                            field.name
                        )));
                    }
                    Value::Number(number) => key_parts.push(format_number(*number)),
                    other => key_parts.push(other.to_string()),
                }
            }
            typed.push(value);
        }

        let identity = identity_string(&key_parts);
        let inserted = connection.execute(
            "INSERT INTO experiments(bench_id, identity, is_outlier, created_at) VALUES(?1, ?2, 0, ?3)
             ON CONFLICT(bench_id, identity) DO NOTHING",
            params![self.bench.id, identity, now_utc_string()],
        )?;
        if inserted == 0 {
            let id: i64 = connection.query_row(
                "SELECT exp_id FROM experiments WHERE bench_id = ?1 AND identity = ?2",
                params![self.bench.id, identity],
                |row| row.get(0),
            )?;
            return Ok(InsertOutcome::Existing(id));
        }

        let id = connection.last_insert_rowid();
        let mut row = vec![
            rusqlite::types::Value::Integer(self.bench.id),
            rusqlite::types::Value::Integer(id),
            rusqlite::types::Value::Integer(0),
        ];
        row.extend(typed.iter().map(Value::to_sql_value));
        connection.execute(&self.view_sql, params_from_iter(row))?;
        Ok(InsertOutcome::Inserted(id))
    }
}

impl Store {
    /// Idempotent insert keyed by the identity of the key field values.
    pub fn insert_experiment(
        &mut self,
        bench: &str,
        values: &BTreeMap<String, String>,
    ) -> StoreResult<InsertOutcome> {
        let bench_name = canonical_name(bench)?;
        let canonical = canonical_values(values)?;

        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let plan = InsertPlan::prepare(&tx, bench)?;
        if let Some(unknown) = canonical
            .keys()
            .find(|name| !plan.fields().iter().any(|field| &field.name == *name))
        {
            return Err(StoreError::NotFound {
                kind: "field",
                name: format!("{}.{unknown}", plan.bench().name),
            });
        }

        let outcome = plan.insert(&tx, &canonical)?;
        if outcome.is_inserted() {
            touch_updated_at(&tx)?;
        }
        tx.commit()?;

        debug!(bench = %plan.bench().name, ?outcome, "inserted experiment");
        Ok(outcome)
    }

    pub fn experiment_count(&self, bench: &str) -> StoreResult<i64> {
        let bench = self.benchmark(bench)?;
        count_experiments(&self.conn, bench.id)
    }

    pub fn experiment_ids(&self, bench: &str) -> StoreResult<Vec<i64>> {
        let bench = self.benchmark(bench)?;
        let mut statement = self
            .conn
            .prepare("SELECT exp_id FROM experiments WHERE bench_id = ?1 ORDER BY exp_id")?;
        let ids = statement
            .query_map([bench.id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn is_outlier(&self, bench: &str, id: i64) -> StoreResult<bool> {
        let bench = self.benchmark(bench)?;
        self.conn
            .query_row(
                "SELECT is_outlier FROM experiments WHERE bench_id = ?1 AND exp_id = ?2",
                params![bench.id, id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| missing_experiment(&bench, id))
    }

    pub fn set_outlier(&mut self, bench: &str, id: i64, flag: bool) -> StoreResult<()> {
        let bench_name = canonical_name(bench)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        if mark_outliers(&tx, &bench, &[id], flag)? == 0 {
            return Err(missing_experiment(&bench, id));
        }
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, experiment = id, outlier = flag, "updated outlier flag");
        Ok(())
    }

    /// Flags every experiment whose wide-table row matches the raw SQL
    /// predicate. Returns the number of experiments touched.
    pub fn set_outlier_where(&mut self, bench: &str, predicate: &str, flag: bool) -> StoreResult<usize> {
        let bench_name = canonical_name(bench)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let ids = matching_ids(&tx, &bench, predicate)?;
        let touched = mark_outliers(&tx, &bench, &ids, flag)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, predicate, outlier = flag, experiments = touched, "updated outlier flags");
        Ok(touched)
    }

    pub fn delete_experiments(&mut self, bench: &str, ids: &[i64]) -> StoreResult<usize> {
        let bench_name = canonical_name(bench)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let removed = remove_experiments(&tx, &bench, ids)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, experiments = removed, "deleted experiments");
        Ok(removed)
    }

    /// Deletes every experiment whose wide-table row matches the raw SQL
    /// predicate.
    pub fn delete_where(&mut self, bench: &str, predicate: &str) -> StoreResult<usize> {
        let bench_name = canonical_name(bench)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let ids = matching_ids(&tx, &bench, predicate)?;
        let removed = remove_experiments(&tx, &bench, &ids)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, predicate, experiments = removed, "deleted experiments");
        Ok(removed)
    }
}

/// Converts raw text into the field's stored type. Blank text is NULL.
pub(super) fn typed_value(raw: &str, numeric: bool) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    if numeric {
        parse_number(trimmed)
            .map(Value::Number)
            .ok_or_else(|| format!("'{trimmed}' is not a number"))
    } else {
        Ok(Value::text(trimmed))
    }
}

pub(super) fn count_experiments(connection: &Connection, bench_id: i64) -> StoreResult<i64> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM experiments WHERE bench_id = ?1",
        [bench_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn matching_ids(connection: &Connection, bench: &Benchmark, predicate: &str) -> StoreResult<Vec<i64>> {
    let table = bench.view_table();
    if !table_exists(connection, &table)? {
        return Ok(Vec::new());
    }
    let mut statement = connection.prepare(&format!("SELECT EXP FROM {table} WHERE {predicate}"))?;
    let ids = statement
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn mark_outliers(connection: &Connection, bench: &Benchmark, ids: &[i64], flag: bool) -> StoreResult<usize> {
    let table = bench.view_table();
    let has_view = table_exists(connection, &table)?;
    let mut touched = 0;
    for id in ids {
        touched += connection.execute(
            "UPDATE experiments SET is_outlier = ?1 WHERE bench_id = ?2 AND exp_id = ?3",
            params![flag, bench.id, id],
        )?;
        if has_view {
            connection.execute(
                &format!("UPDATE {table} SET OUT = ?1 WHERE EXP = ?2"),
                params![flag, id],
            )?;
        }
    }
    Ok(touched)
}

fn remove_experiments(connection: &Connection, bench: &Benchmark, ids: &[i64]) -> StoreResult<usize> {
    let table = bench.view_table();
    let has_view = table_exists(connection, &table)?;
    let mut removed = 0;
    for id in ids {
        removed += connection.execute(
            "DELETE FROM experiments WHERE bench_id = ?1 AND exp_id = ?2",
            params![bench.id, id],
        )?;
        if has_view {
            connection.execute(&format!("DELETE FROM {table} WHERE EXP = ?1"), [id])?;
        }
    }
    Ok(removed)
}

fn missing_experiment(bench: &Benchmark, id: i64) -> StoreError {
    StoreError::NotFound {
        kind: "experiment",
        name: format!("{}#{id}", bench.name),
    }
}
