use std::collections::BTreeMap;
use std::io::Read;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::benchmarks::require_benchmark;
use super::experiments::InsertPlan;
use super::names::{canonical_name, canonical_values};
use super::schema::touch_updated_at;
use super::{FieldSpec, Store, StoreError, StoreResult};

/// Progress sink polled by a running import.
pub trait ImportObserver {
    fn row_done(&mut self, _line: u64) {}

    fn chunk_committed(&mut self, _total_rows: u64) {}

    /// Checked between rows; returning true rolls back the open chunk and
    /// ends the import with `StoreError::Canceled`.
    fn cancel_requested(&self) -> bool {
        false
    }
}

impl ImportObserver for () {}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub chunk_size: usize,
    pub delimiter: u8,
    /// Values applied to every row, overriding the CSV column of the same
    /// field.
    pub fixed: BTreeMap<String, String>,
    /// Text key field filled with a content hash of each row.
    pub auto_key: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            delimiter: b',',
            fixed: BTreeMap::new(),
            auto_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_read: u64,
    pub inserted: u64,
    pub existing: u64,
    pub chunks_committed: u64,
    pub skipped_columns: Vec<String>,
}

#[derive(Default)]
struct PendingChunk {
    rows: u64,
    inserted: u64,
    existing: u64,
}

impl Store {
    /// Bulk insertion from CSV. The header row names the fields. Rows are
    /// committed in chunks of `chunk_size`; a failure or cancellation rolls
    /// back only the open chunk.
    pub fn import_csv<R: Read>(
        &mut self,
        bench: &str,
        reader: R,
        options: &ImportOptions,
        observer: &mut dyn ImportObserver,
    ) -> StoreResult<ImportSummary> {
        if options.chunk_size == 0 {
            return Err(StoreError::InvalidValue(
                "chunk size must be at least 1".to_string(),
            ));
        }
        let bench_name = canonical_name(bench)?;
        let auto_key = match options.auto_key.as_deref() {
            Some(name) => Some(self.ensure_auto_key_field(&bench_name, name)?),
            None => None,
        };

        let bench = require_benchmark(&self.conn, &bench_name)?;
        let plan = InsertPlan::prepare(&self.conn, bench)?;
        let known = |name: &str| plan.fields().iter().any(|field| field.name == name);

        let fixed = canonical_values(&options.fixed)?;
        if let Some(unknown) = fixed.keys().find(|name| !known(name.as_str())) {
            return Err(StoreError::NotFound {
                kind: "field",
                name: format!("{}.{unknown}", plan.bench().name),
            });
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut summary = ImportSummary::default();
        let headers = csv_reader
            .headers()
            .map_err(|err| StoreError::Data {
                line: 1,
                message: err.to_string(),
            })?
            .clone();
        let columns: Vec<Option<String>> = headers
            .iter()
            .map(|header| match canonical_name(header) {
                Ok(name) if known(&name) && auto_key.as_deref() != Some(name.as_str()) => Some(name),
                _ => {
                    warn!(bench = %plan.bench().name, column = header, "skipping column without matching field");
                    summary.skipped_columns.push(header.to_string());
                    None
                }
            })
            .collect();

        let mut committed_rows = 0_u64;
        let mut pending = PendingChunk::default();
        let mut tx = self.conn.transaction()?;

        for result in csv_reader.records() {
            if observer.cancel_requested() {
                drop(tx);
                warn!(bench = %plan.bench().name, committed = committed_rows, discarded = pending.rows, "import canceled");
                return Err(StoreError::Canceled {
                    committed: committed_rows,
                });
            }

            let record = result.map_err(|err| StoreError::Data {
                line: err.position().map(|pos| pos.line()).unwrap_or(summary.rows_read + 2),
                message: err.to_string(),
            })?;
            let line = record
                .position()
                .map(|pos| pos.line())
                .unwrap_or(summary.rows_read + 2);
            summary.rows_read += 1;

            let mut values: BTreeMap<String, String> = columns
                .iter()
                .zip(record.iter())
                .filter_map(|(column, value)| column.clone().map(|name| (name, value.to_string())))
                .collect();
            values.extend(fixed.iter().map(|(name, value)| (name.clone(), value.clone())));
            if let Some(auto_key) = &auto_key {
                let hash = content_hash(&values);
                values.insert(auto_key.clone(), hash);
            }

            let outcome = plan.insert(&tx, &values).map_err(|err| StoreError::Data {
                line,
                message: err.to_string(),
            })?;
            pending.rows += 1;
            if outcome.is_inserted() {
                pending.inserted += 1;
            } else {
                pending.existing += 1;
            }
            observer.row_done(line);

            if pending.rows as usize >= options.chunk_size {
                touch_updated_at(&tx)?;
                tx.commit()?;
                committed_rows += pending.rows;
                summary.inserted += pending.inserted;
                summary.existing += pending.existing;
                summary.chunks_committed += 1;
                pending = PendingChunk::default();
                observer.chunk_committed(committed_rows);
                tx = self.conn.transaction()?;
            }
        }

        if pending.rows > 0 {
            touch_updated_at(&tx)?;
            tx.commit()?;
            committed_rows += pending.rows;
            summary.inserted += pending.inserted;
            summary.existing += pending.existing;
            summary.chunks_committed += 1;
            observer.chunk_committed(committed_rows);
        }

        info!(
            bench = %plan.bench().name,
            rows = summary.rows_read,
            inserted = summary.inserted,
            existing = summary.existing,
            chunks = summary.chunks_committed,
            "import finished"
        );
        Ok(summary)
    }

    /// Makes sure the auto-key field exists as a text key field, adding it
    /// while the benchmark is still empty.
    fn ensure_auto_key_field(&mut self, bench: &str, name: &str) -> StoreResult<String> {
        let name = canonical_name(name)?;
        self.ensure_benchmark(bench)?;
        let existing = self.fields(bench)?.into_iter().find(|field| field.name == name);
        match existing {
            Some(field) if field.key && !field.numeric => Ok(field.name),
            Some(field) => Err(StoreError::SchemaViolation(format!(
                "auto-key field {} must be a text key field",
                field.name
            ))),
            None => {
                let field = self.add_field(
                    bench,
                    &FieldSpec {
                        name,
                        numeric: false,
                        key: true,
                        default: None,
                    },
                )?;
                Ok(field.name)
            }
        }
    }
}

/// First 16 hex digits of the SHA-256 over the row's field values.
fn content_hash(values: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in values {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.trim().as_bytes());
        hasher.update(b"\n");
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
