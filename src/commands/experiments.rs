use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use super::open_store;
use crate::cli::{DeleteArgs, ExperimentSelection, InsertArgs, OutlierArgs, OutlierCommand};
use crate::store::{InsertOutcome, RowQuery, Store};
use crate::util::parse_pairs;

pub fn insert(args: InsertArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;
    let values = parse_pairs(&args.values, "field value")?;
    let outcome = store
        .insert_experiment(&args.bench, &values)
        .with_context(|| format!("failed to insert experiment into {}", args.bench))?;

    match outcome {
        InsertOutcome::Inserted(id) => info!(bench = %args.bench, experiment = id, "inserted experiment"),
        InsertOutcome::Existing(id) => info!(bench = %args.bench, experiment = id, "experiment already stored"),
    }
    println!("{}", outcome.id());
    Ok(())
}

pub fn outlier(args: OutlierArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;

    match args.command {
        OutlierCommand::Set { bench, selection } => mark(&mut store, &bench, &selection, true),
        OutlierCommand::Clear { bench, selection } => mark(&mut store, &bench, &selection, false),
        OutlierCommand::Show { bench } => {
            let query = RowQuery {
                predicates: vec!["OUT = 1".to_string()],
                include_outliers: true,
            };
            let rows = store
                .select_rows(&bench, &query)
                .with_context(|| format!("failed to list outliers of {bench}"))?;
            let mut output = io::BufWriter::new(io::stdout().lock());
            for row in rows {
                let values: Vec<String> = row
                    .values
                    .iter()
                    .map(|(field, value)| format!("{field}={value}"))
                    .collect();
                writeln!(output, "{}\t{}", row.experiment, values.join("\t"))?;
            }
            output.flush()?;
            Ok(())
        }
    }
}

pub fn delete(args: DeleteArgs) -> Result<()> {
    let mut store = open_store(&args.store)?;
    let bench = &args.bench;

    let removed = match selection_kind(&args.selection)? {
        Selection::Ids(ids) => store.delete_experiments(bench, ids),
        Selection::Predicate(predicate) => store.delete_where(bench, predicate),
    }
    .with_context(|| format!("failed to delete experiments of {bench}"))?;

    info!(bench = %bench, experiments = removed, "delete completed");
    Ok(())
}

fn mark(store: &mut Store, bench: &str, selection: &ExperimentSelection, flag: bool) -> Result<()> {
    let touched = match selection_kind(selection)? {
        Selection::Ids(ids) => {
            for id in ids {
                store
                    .set_outlier(bench, *id, flag)
                    .with_context(|| format!("failed to update experiment {id} of {bench}"))?;
            }
            ids.len()
        }
        Selection::Predicate(predicate) => store
            .set_outlier_where(bench, predicate, flag)
            .with_context(|| format!("failed to update outliers of {bench}"))?,
    };

    info!(bench = %bench, outlier = flag, experiments = touched, "outlier update completed");
    Ok(())
}

enum Selection<'a> {
    Ids(&'a [i64]),
    Predicate(&'a str),
}

fn selection_kind(selection: &ExperimentSelection) -> Result<Selection<'_>> {
    match (&selection.predicate, selection.ids.is_empty()) {
        (Some(predicate), _) => Ok(Selection::Predicate(predicate)),
        (None, false) => Ok(Selection::Ids(&selection.ids)),
        (None, true) => bail!("select experiments with --id or --where"),
    }
}
