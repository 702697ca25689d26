use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::open_store;
use crate::cli::{BenchArgs, BenchCommand};

pub fn run(args: BenchArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;

    match args.command {
        BenchCommand::Create { name, description } => {
            let bench = store
                .create_benchmark(&name, description.as_deref())
                .with_context(|| format!("failed to create benchmark {name}"))?;
            info!(bench = %bench.name, table = %bench.view_table(), "created benchmark");
        }
        BenchCommand::Rename { old, new } => {
            let bench = store
                .rename_benchmark(&old, &new)
                .with_context(|| format!("failed to rename benchmark {old}"))?;
            info!(from = %old, to = %bench.name, "renamed benchmark");
        }
        BenchCommand::Remove { name } => {
            store
                .remove_benchmark(&name)
                .with_context(|| format!("failed to remove benchmark {name}"))?;
            info!(bench = %name, "removed benchmark");
        }
        BenchCommand::SetDescription { name, description } => {
            store
                .set_description(&name, description.as_deref())
                .with_context(|| format!("failed to update benchmark {name}"))?;
            info!(bench = %name, cleared = description.is_none(), "updated benchmark description");
        }
        BenchCommand::List => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            for bench in store.list_benchmarks()? {
                let summary = store.describe_benchmark(&bench.name)?;
                writeln!(
                    output,
                    "{}\tfields={}\texperiments={}\toutliers={}\t{}",
                    bench.name,
                    summary.fields.len(),
                    summary.experiments,
                    summary.outliers,
                    bench.description.unwrap_or_default()
                )?;
            }
            output.flush()?;
        }
        BenchCommand::Describe { name, json } => {
            let summary = store
                .describe_benchmark(&name)
                .with_context(|| format!("failed to describe benchmark {name}"))?;
            let mut output = io::BufWriter::new(io::stdout().lock());
            if json {
                serde_json::to_writer_pretty(&mut output, &summary)
                    .context("failed to serialize benchmark description")?;
                writeln!(output)?;
            } else {
                writeln!(output, "Benchmark: {}", summary.benchmark.name)?;
                if let Some(description) = &summary.benchmark.description {
                    writeln!(output, "Description: {description}")?;
                }
                writeln!(output, "Table: {}", summary.view_table)?;
                writeln!(
                    output,
                    "Experiments: {} ({} outliers)",
                    summary.experiments, summary.outliers
                )?;
                for field in &summary.fields {
                    writeln!(
                        output,
                        "  field {}\t{}\t{}{}",
                        field.name,
                        field.column(),
                        if field.numeric { "numeric" } else { "text" },
                        if field.key { "\tkey" } else { "" }
                    )?;
                }
                for index in &summary.indices {
                    writeln!(output, "  index {}\t{}", index.name, index.fields.join(", "))?;
                }
            }
            output.flush()?;
        }
    }

    Ok(())
}
