//! Live Graph → BenchSelection → Curve tree built from a parsed description,
//! and the binder that runs its queries against the store.
//!
//! Nodes live in flat arenas inside [`Description`]; parents list their
//! children by id and every child records its parent's id.

use thiserror::Error;

use crate::aggregate::Aggregation;
use crate::description::Location;
use crate::expr::{ExprError, Formula};
use crate::store::StoreError;
use crate::style::StyleKind;

mod binder;
mod build;

pub use binder::{Binder, BoundBench, BoundCurve, BoundGraph, CurveData};
pub use build::build_description;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("{location}: missing required key '{key}' in [{section}] section")]
    MissingKey {
        location: Location,
        section: &'static str,
        key: &'static str,
    },
    #[error("{location}: benchmark '{name}' does not exist")]
    UnknownBenchmark { location: Location, name: String },
    #[error("{location}: field '{field}' is not defined on benchmark {bench}")]
    UnknownField {
        location: Location,
        bench: String,
        field: String,
    },
    #[error("{location}: {message}")]
    Invalid { location: Location, message: String },
    #[error("{location}: {source}")]
    Expr {
        location: Location,
        #[source]
        source: ExprError,
    },
    #[error("{location}: {source}")]
    Store {
        location: Location,
        #[source]
        source: StoreError,
    },
}

impl BindError {
    pub(crate) fn invalid(location: &Location, message: impl Into<String>) -> Self {
        Self::Invalid {
            location: location.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn expr(location: &Location, source: ExprError) -> Self {
        Self::Expr {
            location: location.clone(),
            source,
        }
    }

    pub(crate) fn store(location: &Location, source: StoreError) -> Self {
        Self::Store {
            location: location.clone(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BenchId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurveId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegendPlacement {
    None,
    #[default]
    Inside,
    Outside,
    Below,
}

impl LegendPlacement {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Inside => "inside",
            Self::Outside => "outside",
            Self::Below => "below",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AxisConfig {
    pub label: Option<String>,
    pub scale: StyleKind,
    /// Explicit category order; observed values not listed follow it.
    pub categories: Vec<String>,
    /// Raw axis values whose points are dropped.
    pub skip: Vec<String>,
    /// Fallback coordinate for normalized points without a base value.
    pub base: f64,
    pub range: (Option<f64>, Option<f64>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphOptions {
    pub stack: bool,
    pub normalize: bool,
    pub xoffset: bool,
    pub yoffset: bool,
    pub grid: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurveOptions {
    pub bar: bool,
    pub hbar: bool,
    pub no_stack: bool,
    pub base: bool,
    pub accum: bool,
    pub skip: bool,
    pub errorbars: bool,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: GraphId,
    pub location: Location,
    pub title: String,
    pub x: AxisConfig,
    pub y: AxisConfig,
    pub aggregation: Option<Aggregation>,
    pub legend: LegendPlacement,
    pub options: GraphOptions,
    pub benches: Vec<BenchId>,
}

#[derive(Debug, Clone)]
pub struct BenchNode {
    pub id: BenchId,
    pub graph: GraphId,
    pub location: Location,
    pub name: String,
    pub filters: Vec<Filter>,
    pub selects: Vec<String>,
    pub include_outliers: bool,
    pub label: Option<String>,
    pub curves: Vec<CurveId>,
}

#[derive(Debug, Clone)]
pub struct CurveNode {
    pub id: CurveId,
    pub bench: BenchId,
    pub location: Location,
    /// Declaration order within the graph; drives auto styles and default
    /// labels.
    pub ordinal: usize,
    pub xval: Formula,
    pub yval: Formula,
    pub label: Option<Formula>,
    pub mark_text: Option<Formula>,
    pub aggregation: Option<Aggregation>,
    pub line: Option<String>,
    pub mark: Option<String>,
    pub color: Option<String>,
    pub iterate: Vec<String>,
    pub filters: Vec<Filter>,
    pub options: CurveOptions,
}

/// Arena holding every node of one description.
#[derive(Debug, Clone, Default)]
pub struct Description {
    pub title: Option<String>,
    pub graphs: Vec<GraphNode>,
    pub benches: Vec<BenchNode>,
    pub curves: Vec<CurveNode>,
}

impl Description {
    pub fn graph(&self, id: GraphId) -> &GraphNode {
        &self.graphs[id.0]
    }

    pub fn bench(&self, id: BenchId) -> &BenchNode {
        &self.benches[id.0]
    }

    pub fn curve(&self, id: CurveId) -> &CurveNode {
        &self.curves[id.0]
    }

    pub fn graph_of_curve(&self, id: CurveId) -> &GraphNode {
        self.graph(self.bench(self.curve(id).bench).graph)
    }

    /// Curve-level aggregation, else the graph's, else `none`.
    pub fn aggregation_for(&self, id: CurveId) -> Aggregation {
        self.curve(id)
            .aggregation
            .or(self.graph_of_curve(id).aggregation)
            .unwrap_or_default()
    }
}
