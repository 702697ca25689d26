mod aggregate;
mod cli;
mod commands;
mod description;
mod descriptor;
mod expr;
mod geometry;
mod model;
mod render;
mod stats;
mod store;
mod style;
mod util;
mod value;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::plot::OutputKind;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench(args) => commands::bench::run(args),
        Commands::Field(args) => commands::field::run(args),
        Commands::Index(args) => commands::index::run(args),
        Commands::Insert(args) => commands::experiments::insert(args),
        Commands::Import(args) => commands::import::run(args),
        Commands::Outlier(args) => commands::experiments::outlier(args),
        Commands::Delete(args) => commands::experiments::delete(args),
        Commands::Sql(args) => commands::sql::run(args),
        Commands::Graph(args) => commands::plot::run(args, OutputKind::Graph),
        Commands::Data(args) => commands::plot::run(args, OutputKind::Data),
        Commands::Xmlplot(args) => commands::plot::run(args, OutputKind::XmlPlot),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
