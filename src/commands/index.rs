use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::open_store;
use crate::cli::{IndexArgs, IndexCommand};

pub fn run(args: IndexArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;

    match args.command {
        IndexCommand::Create { bench, name, fields } => {
            let index = store
                .create_index(&bench, &name, &fields)
                .with_context(|| format!("failed to create index {name} on {bench}"))?;
            info!(bench = %bench, index = %index.name, fields = ?index.fields, "created index");
        }
        IndexCommand::Drop { bench, name } => {
            store
                .drop_index(&bench, &name)
                .with_context(|| format!("failed to drop index {name} of {bench}"))?;
            info!(bench = %bench, index = %name, "dropped index");
        }
        IndexCommand::List { bench } => {
            let indices = store
                .indices(&bench)
                .with_context(|| format!("failed to list indices of {bench}"))?;
            let mut output = io::BufWriter::new(io::stdout().lock());
            for index in indices {
                writeln!(output, "{}\t{}", index.name, index.fields.join(", "))?;
            }
            output.flush()?;
        }
    }

    Ok(())
}
