use rusqlite::{Connection, params};
use tracing::info;

use super::benchmarks::{ensure_benchmark, require_benchmark};
use super::experiments::{count_experiments, typed_value};
use super::indices::{load_indices, rewrite_index_fields};
use super::names::canonical_name;
use super::schema::touch_updated_at;
use super::view::rebuild_view;
use super::{Benchmark, Field, FieldSpec, Store, StoreError, StoreResult};

impl Store {
    /// Adds a field, creating the benchmark on first reference. With data
    /// present only a non-key field with a default may be added; the default
    /// is back-filled into every existing row.
    pub fn add_field(&mut self, bench: &str, spec: &FieldSpec) -> StoreResult<Field> {
        let bench_name = canonical_name(bench)?;
        let field_name = canonical_name(&spec.name)?;
        let default = match spec.default.as_deref() {
            Some(raw) => typed_value(raw, spec.numeric)
                .map_err(|reason| StoreError::InvalidValue(format!("default for {field_name}: {reason}")))?,
            None => crate::value::Value::Null,
        };

        let tx = self.conn.transaction()?;
        let bench = ensure_benchmark(&tx, &bench_name)?;
        let previous = load_fields(&tx, bench.id)?;
        if previous.iter().any(|field| field.name == field_name) {
            return Err(StoreError::Duplicate {
                kind: "field",
                name: format!("{}.{field_name}", bench.name),
            });
        }

        let experiments = count_experiments(&tx, bench.id)?;
        if experiments > 0 && spec.key {
            return Err(StoreError::SchemaViolation(format!(
                "cannot add key field {field_name}: benchmark {} holds {experiments} experiment(s)",
                bench.name
            )));
        }
        if experiments > 0 && default.is_null() {
            return Err(StoreError::SchemaViolation(format!(
                "field {field_name} needs a default value: benchmark {} holds {experiments} experiment(s)",
                bench.name
            )));
        }

        let position = previous.iter().map(|field| field.position).max().unwrap_or(0) + 1;
        tx.execute(
            "INSERT INTO fields(bench_id, name, is_numeric, is_key, position) VALUES(?1, ?2, ?3, ?4, ?5)",
            params![bench.id, field_name, spec.numeric, spec.key, position],
        )?;
        let field = Field {
            id: tx.last_insert_rowid(),
            bench_id: bench.id,
            name: field_name,
            numeric: spec.numeric,
            key: spec.key,
            position,
        };

        let mut current = previous.clone();
        current.push(field.clone());
        rebuild_view(&tx, &bench, &previous, &current)?;

        if !default.is_null() {
            tx.execute(
                &format!("UPDATE {} SET {} = ?1", bench.view_table(), field.column()),
                [default.to_sql_value()],
            )?;
        }
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, field = %field.name, numeric = field.numeric, key = field.key, "added field");
        Ok(field)
    }

    /// Removes a field from an empty benchmark, dropping every index that
    /// references it.
    pub fn remove_field(&mut self, bench: &str, field: &str) -> StoreResult<()> {
        let bench_name = canonical_name(bench)?;
        let field_name = canonical_name(field)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        require_no_data(&tx, &bench, &format!("remove field {field_name}"))?;

        let previous = load_fields(&tx, bench.id)?;
        let removed = find_field(&previous, &bench, &field_name)?;

        let mut dropped = Vec::new();
        for index in load_indices(&tx, bench.id)? {
            if index.fields.contains(&removed.name) {
                tx.execute(
                    "DELETE FROM bench_indices WHERE bench_id = ?1 AND name = ?2",
                    params![bench.id, index.name],
                )?;
                dropped.push(index.name);
            }
        }
        tx.execute("DELETE FROM fields WHERE field_id = ?1", [removed.id])?;

        let current: Vec<Field> = previous
            .iter()
            .filter(|field| field.id != removed.id)
            .cloned()
            .collect();
        rebuild_view(&tx, &bench, &previous, &current)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, field = %removed.name, dropped_indices = ?dropped, "removed field");
        Ok(())
    }

    /// Renames a field; stored values are carried over.
    pub fn rename_field(&mut self, bench: &str, field: &str, new_name: &str) -> StoreResult<Field> {
        let bench_name = canonical_name(bench)?;
        let field_name = canonical_name(field)?;
        let new_name = canonical_name(new_name)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let previous = load_fields(&tx, bench.id)?;
        let target = find_field(&previous, &bench, &field_name)?;
        if target.name == new_name {
            return Ok(target);
        }
        if previous.iter().any(|field| field.name == new_name) {
            return Err(StoreError::Duplicate {
                kind: "field",
                name: format!("{}.{new_name}", bench.name),
            });
        }

        tx.execute(
            "UPDATE fields SET name = ?1 WHERE field_id = ?2",
            params![new_name, target.id],
        )?;
        rewrite_index_fields(&tx, &bench, &target.name, &new_name)?;

        let current: Vec<Field> = previous
            .iter()
            .map(|field| {
                if field.id == target.id {
                    Field {
                        name: new_name.clone(),
                        ..field.clone()
                    }
                } else {
                    field.clone()
                }
            })
            .collect();
        rebuild_view(&tx, &bench, &previous, &current)?;
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, from = %target.name, to = %new_name, "renamed field");
        Ok(Field {
            name: new_name,
            ..target
        })
    }

    pub fn set_field_numeric(&mut self, bench: &str, field: &str, numeric: bool) -> StoreResult<()> {
        self.update_field_flag(bench, field, "is_numeric", numeric)
    }

    pub fn set_field_key(&mut self, bench: &str, field: &str, key: bool) -> StoreResult<()> {
        self.update_field_flag(bench, field, "is_key", key)
    }

    fn update_field_flag(&mut self, bench: &str, field: &str, column: &str, flag: bool) -> StoreResult<()> {
        let bench_name = canonical_name(bench)?;
        let field_name = canonical_name(field)?;
        let tx = self.conn.transaction()?;
        let bench = require_benchmark(&tx, &bench_name)?;
        let previous = load_fields(&tx, bench.id)?;
        let target = find_field(&previous, &bench, &field_name)?;
        let unchanged = match column {
            "is_numeric" => target.numeric == flag,
            _ => target.key == flag,
        };
        if unchanged {
            return Ok(());
        }
        require_no_data(&tx, &bench, &format!("change {column} of field {field_name}"))?;

        tx.execute(
            &format!("UPDATE fields SET {column} = ?1 WHERE field_id = ?2"),
            params![flag, target.id],
        )?;
        if column == "is_numeric" {
            let current = load_fields(&tx, bench.id)?;
            rebuild_view(&tx, &bench, &previous, &current)?;
        }
        touch_updated_at(&tx)?;
        tx.commit()?;

        info!(bench = %bench.name, field = %target.name, flag = column, value = flag, "updated field");
        Ok(())
    }

    pub fn fields(&self, bench: &str) -> StoreResult<Vec<Field>> {
        let bench = self.benchmark(bench)?;
        load_fields(&self.conn, bench.id)
    }

    pub fn field(&self, bench: &str, field: &str) -> StoreResult<Field> {
        let bench = self.benchmark(bench)?;
        let fields = load_fields(&self.conn, bench.id)?;
        find_field(&fields, &bench, &canonical_name(field)?)
    }
}

pub(super) fn load_fields(connection: &Connection, bench_id: i64) -> StoreResult<Vec<Field>> {
    let mut statement = connection.prepare(
        "SELECT field_id, bench_id, name, is_numeric, is_key, position
         FROM fields WHERE bench_id = ?1 ORDER BY position, field_id",
    )?;
    let fields = statement
        .query_map([bench_id], |row| {
            Ok(Field {
                id: row.get(0)?,
                bench_id: row.get(1)?,
                name: row.get(2)?,
                numeric: row.get(3)?,
                key: row.get(4)?,
                position: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fields)
}

pub(super) fn find_field(fields: &[Field], bench: &Benchmark, name: &str) -> StoreResult<Field> {
    fields
        .iter()
        .find(|field| field.name == name)
        .cloned()
        .ok_or_else(|| StoreError::NotFound {
            kind: "field",
            name: format!("{}.{name}", bench.name),
        })
}

fn require_no_data(connection: &Connection, bench: &Benchmark, action: &str) -> StoreResult<()> {
    let experiments = count_experiments(connection, bench.id)?;
    if experiments > 0 {
        return Err(StoreError::SchemaViolation(format!(
            "cannot {action}: benchmark {} holds {experiments} experiment(s)",
            bench.name
        )));
    }
    Ok(())
}
