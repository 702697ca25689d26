use std::fs::{self, File};
use std::io::BufReader;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::open_store;
use crate::cli::ImportArgs;
use crate::model::{ImportOptionsRecord, ImportRunManifest, ImportSource};
use crate::store::{ImportObserver, ImportOptions, SCHEMA_VERSION, StoreError};
use crate::util::{now_utc_string, parse_pairs, sha256_file, utc_compact_string, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

/// Logs progress and remembers how many rows are already committed.
#[derive(Default)]
struct LoggingObserver {
    committed: u64,
}

impl ImportObserver for LoggingObserver {
    fn row_done(&mut self, line: u64) {
        if line % 10_000 == 0 {
            debug!(line, "import progress");
        }
    }

    fn chunk_committed(&mut self, total_rows: u64) {
        self.committed = total_rows;
        info!(rows = total_rows, "committed import chunk");
    }
}

pub fn run(args: ImportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("import-{}", utc_compact_string(started_ts));

    if !args.delimiter.is_ascii() {
        bail!("delimiter '{}' must be a single ASCII character", args.delimiter);
    }
    let options = ImportOptions {
        chunk_size: args.chunk_size,
        delimiter: args.delimiter as u8,
        fixed: parse_pairs(&args.fixed, "fixed value")?,
        auto_key: args.auto_key.clone(),
    };

    let mut store = open_store(&args.store)?;
    let file = File::open(&args.csv_path)
        .with_context(|| format!("failed to open {}", args.csv_path.display()))?;

    info!(bench = %args.bench, source = %args.csv_path.display(), run_id = %run_id, "starting import");

    let mut observer = LoggingObserver::default();
    let outcome = store.import_csv(&args.bench, BufReader::new(file), &options, &mut observer);

    if let Some(manifest_path) = &args.manifest_path {
        let (status, failure_reason, committed_rows) = match &outcome {
            Ok(summary) => ("completed", None, summary.inserted + summary.existing),
            Err(StoreError::Canceled { committed }) => ("canceled", None, *committed),
            Err(err) => ("failed", Some(err.to_string()), observer.committed),
        };
        let bytes = fs::metadata(&args.csv_path)
            .with_context(|| format!("failed to stat {}", args.csv_path.display()))?
            .len();

        let manifest = ImportRunManifest {
            manifest_version: MANIFEST_VERSION,
            run_id,
            db_path: args.store.db_path.display().to_string(),
            db_schema_version: format!("{}.{}", SCHEMA_VERSION.0, SCHEMA_VERSION.1),
            bench: args.bench.clone(),
            status: status.to_string(),
            started_at,
            finished_at: now_utc_string(),
            failure_reason,
            source: ImportSource {
                path: args.csv_path.display().to_string(),
                sha256: sha256_file(&args.csv_path)?,
                bytes,
            },
            options: ImportOptionsRecord {
                chunk_size: options.chunk_size,
                delimiter: args.delimiter.to_string(),
                auto_key: options.auto_key.clone(),
                fixed: args.fixed.clone(),
            },
            summary: outcome.as_ref().ok().cloned(),
            committed_rows,
        };
        write_json_pretty(manifest_path, &manifest)?;
        info!(path = %manifest_path.display(), status, "wrote import run manifest");
    }

    let summary = outcome.with_context(|| format!("import into {} failed", args.bench))?;
    if !summary.skipped_columns.is_empty() {
        warn!(columns = ?summary.skipped_columns, "ignored columns without a field");
    }
    info!(
        bench = %args.bench,
        rows = summary.rows_read,
        inserted = summary.inserted,
        existing = summary.existing,
        chunks = summary.chunks_committed,
        "import completed"
    );

    Ok(())
}
