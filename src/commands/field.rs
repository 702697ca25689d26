use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use super::open_store;
use crate::cli::{FieldArgs, FieldCommand};
use crate::store::FieldSpec;

pub fn run(args: FieldArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;

    match args.command {
        FieldCommand::Add {
            bench,
            name,
            field_type,
            key,
            default,
        } => {
            let spec = FieldSpec {
                name: name.clone(),
                numeric: field_type.is_numeric(),
                key,
                default,
            };
            store
                .add_field(&bench, &spec)
                .with_context(|| format!("failed to add field {name} to {bench}"))?;
        }
        FieldCommand::Remove { bench, name } => {
            store
                .remove_field(&bench, &name)
                .with_context(|| format!("failed to remove field {name} from {bench}"))?;
        }
        FieldCommand::Rename { bench, name, new_name } => {
            let field = store
                .rename_field(&bench, &name, &new_name)
                .with_context(|| format!("failed to rename field {name} of {bench}"))?;
            info!(bench = %bench, from = %name, to = %field.name, "renamed field");
        }
        FieldCommand::SetType {
            bench,
            name,
            field_type,
        } => {
            store
                .set_field_numeric(&bench, &name, field_type.is_numeric())
                .with_context(|| format!("failed to change type of field {name} of {bench}"))?;
        }
        FieldCommand::SetKey { bench, name, key } => {
            store
                .set_field_key(&bench, &name, key)
                .with_context(|| format!("failed to change key flag of field {name} of {bench}"))?;
        }
        FieldCommand::List { bench } => {
            let fields = store
                .fields(&bench)
                .with_context(|| format!("failed to list fields of {bench}"))?;
            let mut output = io::BufWriter::new(io::stdout().lock());
            for field in fields {
                writeln!(
                    output,
                    "{}\t{}\t{}",
                    field.name,
                    if field.numeric { "numeric" } else { "text" },
                    if field.key { "key" } else { "-" }
                )?;
            }
            output.flush()?;
        }
    }

    Ok(())
}
