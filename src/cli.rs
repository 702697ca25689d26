use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "benchrepo",
    version,
    about = "Benchmark result repository and graph description evaluator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, rename, remove and inspect benchmarks.
    Bench(BenchArgs),
    /// Manage the fields of a benchmark.
    Field(FieldArgs),
    /// Manage secondary indices of a benchmark.
    Index(IndexArgs),
    /// Insert one experiment given as FIELD=VALUE pairs.
    Insert(InsertArgs),
    /// Bulk import experiments from a CSV file.
    Import(ImportArgs),
    /// Mark, unmark or list outlier experiments.
    Outlier(OutlierArgs),
    /// Delete experiments.
    Delete(DeleteArgs),
    /// Run a raw SQL statement against the store.
    Sql(SqlArgs),
    /// Evaluate a graph description into a plotting script.
    Graph(PlotArgs),
    /// Evaluate a graph description into raw point data.
    Data(PlotArgs),
    /// Evaluate a graph description into XML plot data.
    Xmlplot(PlotArgs),
    /// Show store metadata and benchmark counts.
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = "benchrepo.sqlite")]
    pub db_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: BenchCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BenchCommand {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Rename {
        old: String,
        new: String,
    },
    Remove {
        name: String,
    },
    /// Replace the free-form description; omit the text to clear it.
    SetDescription {
        name: String,
        description: Option<String>,
    },
    List,
    Describe {
        name: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FieldType {
    Numeric,
    Text,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        self == Self::Numeric
    }
}

#[derive(Args, Debug, Clone)]
pub struct FieldArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: FieldCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FieldCommand {
    Add {
        bench: String,
        name: String,
        #[arg(long = "type", value_enum, default_value_t = FieldType::Numeric)]
        field_type: FieldType,
        #[arg(long, default_value_t = false)]
        key: bool,
        /// Value back-filled into experiments that already exist.
        #[arg(long)]
        default: Option<String>,
    },
    Remove {
        bench: String,
        name: String,
    },
    Rename {
        bench: String,
        name: String,
        new_name: String,
    },
    SetType {
        bench: String,
        name: String,
        #[arg(value_enum)]
        field_type: FieldType,
    },
    SetKey {
        bench: String,
        name: String,
        #[arg(action = clap::ArgAction::Set)]
        key: bool,
    },
    List {
        bench: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: IndexCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommand {
    Create {
        bench: String,
        name: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },
    Drop {
        bench: String,
        name: String,
    },
    List {
        bench: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct InsertArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub bench: String,

    /// FIELD=VALUE pairs.
    #[arg(required = true)]
    pub values: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub bench: String,

    pub csv_path: PathBuf,

    #[arg(long, default_value_t = 500)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Text key field filled with a hash of each row's values.
    #[arg(long)]
    pub auto_key: Option<String>,

    /// FIELD=VALUE applied to every imported row.
    #[arg(long = "set")]
    pub fixed: Vec<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExperimentSelection {
    /// Experiment ids.
    #[arg(long = "id")]
    pub ids: Vec<i64>,

    /// SQL predicate over the wide table, e.g. `_NODES > 4`.
    #[arg(long = "where", conflicts_with = "ids")]
    pub predicate: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct OutlierArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: OutlierCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum OutlierCommand {
    Set {
        bench: String,
        #[command(flatten)]
        selection: ExperimentSelection,
    },
    Clear {
        bench: String,
        #[command(flatten)]
        selection: ExperimentSelection,
    },
    Show {
        bench: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub bench: String,

    #[command(flatten)]
    pub selection: ExperimentSelection,
}

#[derive(Args, Debug, Clone)]
pub struct SqlArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub statement: String,

    #[arg(long, default_value = "|")]
    pub separator: String,
}

#[derive(Args, Debug, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub description: PathBuf,

    /// NAME=VALUE overriding environment variables of the description.
    #[arg(short = 'D', long = "define")]
    pub defines: Vec<String>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Point separator of the `data` output.
    #[arg(long, default_value = ":")]
    pub separator: String,

    /// Include low/high bounds in the `data` output.
    #[arg(long, default_value_t = false)]
    pub bounds: bool,

    /// Single-line XML for `xmlplot`.
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Terminal line for the `graph` script.
    #[arg(long)]
    pub terminal: Option<String>,

    /// Output file named inside the `graph` script.
    #[arg(long)]
    pub plot_output: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
