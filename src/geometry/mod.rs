//! Curve geometry shared by every output format: category placement, bar
//! group offsets, normalization, stacking and accumulation, computed once
//! per graph into a [`GeometryModel`].

use thiserror::Error;

use crate::description::Location;
use crate::descriptor::{CurveId, GraphId, LegendPlacement};
use crate::style::StyleKind;
use crate::value::Value;

mod engine;
#[cfg(test)]
mod tests;

pub use engine::GeometryEngine;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("{location}: {message}")]
    Style { location: Location, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub label: String,
    pub position: f64,
}

#[derive(Debug, Clone)]
pub struct AxisGeometry {
    pub scale: StyleKind,
    pub label: Option<String>,
    /// Category labels at their plotted positions; empty for numeric axes.
    pub ticks: Vec<Tick>,
    pub range: (Option<f64>, Option<f64>),
}

impl AxisGeometry {
    pub fn is_category(&self) -> bool {
        self.scale.scale() == crate::style::ScaleKind::Category
    }
}

/// Which axis a curve buckets its rows by before aggregating the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ByX,
    ByY,
}

#[derive(Debug, Clone)]
pub struct CurveGeometry {
    /// Position of the curve in [`GraphGeometry::curves`].
    pub id: usize,
    pub curve: CurveId,
    pub label: String,
    pub mark_text: Option<String>,
    pub line: StyleKind,
    pub mark: StyleKind,
    pub color: StyleKind,
    pub direction: Direction,
    pub bar: bool,
    pub errorbars: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotPoint {
    pub curve_id: usize,
    pub raw_x: Value,
    pub raw_y: Value,
    pub plotted_x: f64,
    pub plotted_y: f64,
    /// Error bounds along the aggregated axis.
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone)]
pub struct GraphGeometry {
    pub graph: GraphId,
    pub title: String,
    pub x: AxisGeometry,
    pub y: AxisGeometry,
    pub legend: LegendPlacement,
    pub grid: bool,
    pub curves: Vec<CurveGeometry>,
    pub points: Vec<PlotPoint>,
}

impl GraphGeometry {
    pub fn points_of(&self, curve_id: usize) -> impl Iterator<Item = &PlotPoint> {
        self.points.iter().filter(move |point| point.curve_id == curve_id)
    }
}

/// Output-format independent result of one description evaluation.
#[derive(Debug, Clone, Default)]
pub struct GeometryModel {
    pub title: Option<String>,
    pub graphs: Vec<GraphGeometry>,
}
