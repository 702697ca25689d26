use anyhow::Result;
use tracing::{info, warn};

use super::open_store;
use crate::cli::StatusArgs;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = &args.store.db_path;
    info!(path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "benchmark store missing");
        return Ok(());
    }

    let store = open_store(&args.store)?;
    for (key, value) in store.metadata()? {
        info!(key = %key, value = %value, "store metadata");
    }

    let benchmarks = store.list_benchmarks()?;
    if benchmarks.is_empty() {
        warn!("store holds no benchmarks");
    }
    for bench in benchmarks {
        let summary = store.describe_benchmark(&bench.name)?;
        info!(
            bench = %bench.name,
            fields = summary.fields.len(),
            indices = summary.indices.len(),
            experiments = summary.experiments,
            outliers = summary.outliers,
            "benchmark status"
        );
    }

    Ok(())
}
