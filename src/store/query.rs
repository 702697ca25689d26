use std::collections::BTreeMap;

use tracing::debug;

use super::fields::{find_field, load_fields};
use super::schema::table_exists;
use super::{Store, StoreResult};
use crate::value::Value;

/// Row selection over one wide table: SQL predicate fragments that are
/// ANDed together, plus whether outlier rows stay in.
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    pub predicates: Vec<String>,
    pub include_outliers: bool,
}

impl RowQuery {
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    fn where_clause(&self) -> String {
        let mut clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|predicate| predicate.trim())
            .filter(|predicate| !predicate.is_empty())
            .map(|predicate| format!("({predicate})"))
            .collect();
        if !self.include_outliers {
            clauses.push("OUT = 0".to_string());
        }
        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }
}

/// One experiment row; `values` is keyed by canonical field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub experiment: i64,
    pub outlier: bool,
    pub values: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Store {
    /// Rows matching the query, ordered by experiment id.
    pub fn select_rows(&self, bench: &str, query: &RowQuery) -> StoreResult<Vec<Row>> {
        let bench = self.benchmark(bench)?;
        let table = bench.view_table();
        if !table_exists(&self.conn, &table)? {
            return Ok(Vec::new());
        }
        let fields = load_fields(&self.conn, bench.id)?;

        let mut columns = vec!["EXP".to_string(), "OUT".to_string()];
        columns.extend(fields.iter().map(|field| field.column()));
        let sql = format!(
            "SELECT {} FROM {table}{} ORDER BY EXP",
            columns.join(", "),
            query.where_clause()
        );
        debug!(bench = %bench.name, sql = %sql, "selecting rows");

        let mut statement = self.conn.prepare(&sql)?;
        let rows = statement
            .query_map([], |row| {
                let mut values = BTreeMap::new();
                for (offset, field) in fields.iter().enumerate() {
                    values.insert(field.name.clone(), Value::from_sql(row.get_ref(offset + 2)?));
                }
                Ok(Row {
                    experiment: row.get(0)?,
                    outlier: row.get(1)?,
                    values,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct values of one field among the matching rows, sorted.
    pub fn distinct_values(&self, bench: &str, field: &str, query: &RowQuery) -> StoreResult<Vec<Value>> {
        let bench = self.benchmark(bench)?;
        let table = bench.view_table();
        let fields = load_fields(&self.conn, bench.id)?;
        let field = find_field(&fields, &bench, &super::canonical_name(field)?)?;
        if !table_exists(&self.conn, &table)? {
            return Ok(Vec::new());
        }

        let column = field.column();
        let sql = format!(
            "SELECT DISTINCT {column} FROM {table}{} ORDER BY {column}",
            query.where_clause()
        );
        debug!(bench = %bench.name, sql = %sql, "selecting distinct values");

        let mut statement = self.conn.prepare(&sql)?;
        let values = statement
            .query_map([], |row| Ok(Value::from_sql(row.get_ref(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// Unvalidated pass-through for the `sql` command.
    pub fn query_raw(&self, sql: &str) -> StoreResult<RawResult> {
        let mut statement = self.conn.prepare(sql)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        if width == 0 {
            statement.execute([])?;
            return Ok(RawResult {
                columns,
                rows: Vec::new(),
            });
        }

        let rows = statement
            .query_map([], |row| {
                (0..width)
                    .map(|index| row.get_ref(index).map(Value::from_sql))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawResult { columns, rows })
    }
}
