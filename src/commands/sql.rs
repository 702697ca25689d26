use std::io::{self, Write};

use anyhow::{Context, Result};

use super::open_store;
use crate::cli::SqlArgs;

pub fn run(args: SqlArgs) -> Result<()> {
    let store = open_store(&args.store)?;
    let result = store
        .query_raw(&args.statement)
        .with_context(|| format!("failed to run statement: {}", args.statement))?;

    if result.columns.is_empty() {
        return Ok(());
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "{}", result.columns.join(&args.separator))?;
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        writeln!(output, "{}", cells.join(&args.separator))?;
    }
    output.flush()?;
    Ok(())
}
