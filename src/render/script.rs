use std::io::Write;

use super::{RenderError, Renderer};
use crate::descriptor::LegendPlacement;
use crate::geometry::{AxisGeometry, CurveGeometry, Direction, GeometryModel, GraphGeometry};
use crate::style::{ColorKind, LineKind, MarkKind, ScaleKind, StyleKind};
use crate::value::format_number;

#[derive(Debug, Clone, Default)]
pub struct ScriptConfig {
    /// Emitted as `set terminal ...` when present.
    pub terminal: Option<String>,
    /// Emitted as `set output ...` when present.
    pub output: Option<String>,
}

/// gnuplot command script with the data inlined after each `plot` command.
#[derive(Debug, Clone, Default)]
pub struct ScriptRenderer {
    pub config: ScriptConfig,
}

impl ScriptRenderer {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }
}

impl Renderer for ScriptRenderer {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn render(&self, model: &GeometryModel, out: &mut dyn Write) -> Result<(), RenderError> {
        if let Some(title) = &model.title {
            writeln!(out, "# {title}")?;
        }
        if let Some(terminal) = &self.config.terminal {
            writeln!(out, "set terminal {terminal}")?;
        }
        if let Some(output) = &self.config.output {
            writeln!(out, "set output {}", quote(output))?;
        }

        for (index, graph) in model.graphs.iter().enumerate() {
            if index > 0 {
                writeln!(out, "reset")?;
            }
            write_graph(out, graph)?;
        }
        Ok(())
    }
}

fn write_graph(out: &mut dyn Write, graph: &GraphGeometry) -> Result<(), RenderError> {
    if !graph.title.is_empty() {
        writeln!(out, "set title {}", quote(&graph.title))?;
    }
    write_axis(out, "x", &graph.x)?;
    write_axis(out, "y", &graph.y)?;
    match graph.legend {
        LegendPlacement::None => writeln!(out, "unset key")?,
        LegendPlacement::Inside => writeln!(out, "set key inside")?,
        LegendPlacement::Outside => writeln!(out, "set key outside")?,
        LegendPlacement::Below => writeln!(out, "set key below")?,
    }
    if graph.grid {
        writeln!(out, "set grid")?;
    }
    if graph.curves.iter().any(|curve| curve.bar) {
        writeln!(out, "set style fill solid 0.5 border")?;
        writeln!(out, "set boxwidth 0.9")?;
    }

    if graph.curves.is_empty() {
        return Ok(());
    }
    let clauses: Vec<String> = graph.curves.iter().map(plot_clause).collect();
    writeln!(out, "plot {}", clauses.join(", \\\n     "))?;

    for curve in &graph.curves {
        for point in graph.points_of(curve.id) {
            write!(out, "{} {}", format_number(point.plotted_x), format_number(point.plotted_y))?;
            if curve.errorbars {
                write!(out, " {} {}", format_number(point.low), format_number(point.high))?;
            }
            writeln!(out)?;
        }
        writeln!(out, "e")?;
    }
    Ok(())
}

fn write_axis(out: &mut dyn Write, name: &str, axis: &AxisGeometry) -> Result<(), RenderError> {
    if let Some(label) = &axis.label {
        writeln!(out, "set {name}label {}", quote(label))?;
    }
    if axis.scale.scale() == ScaleKind::Log {
        writeln!(out, "set logscale {name}")?;
    }
    if !axis.ticks.is_empty() {
        let ticks: Vec<String> = axis
            .ticks
            .iter()
            .map(|tick| format!("{} {}", quote(&tick.label), format_number(tick.position)))
            .collect();
        writeln!(out, "set {name}tics ({})", ticks.join(", "))?;
    }
    if axis.range != (None, None) {
        let bound = |value: Option<f64>| value.map(format_number).unwrap_or_else(|| "*".to_string());
        writeln!(out, "set {name}range [{}:{}]", bound(axis.range.0), bound(axis.range.1))?;
    }
    Ok(())
}

fn plot_clause(curve: &CurveGeometry) -> String {
    let (using, style) = match (curve.bar, curve.errorbars, curve.direction) {
        (true, _, Direction::ByX) => ("1:2", "boxes"),
        (true, _, Direction::ByY) => ("1:2", "points"),
        (false, true, Direction::ByX) => ("1:2:3:4", "yerrorlines"),
        (false, true, Direction::ByY) => ("1:2:3:4", "xerrorlines"),
        (false, false, _) => ("1:2", "linespoints"),
    };

    let mut clause = format!("'-' using {using} title {} with {style}", quote(&curve.label));
    if let Some(dash) = dash_type(&curve.line) {
        clause.push_str(&format!(" dt {dash}"));
    }
    if let Some(point) = point_type(&curve.mark) {
        clause.push_str(&format!(" pt {point}"));
    }
    clause.push_str(&format!(" lc rgb {}", quote(color_name(&curve.color))));
    clause
}

fn dash_type(line: &StyleKind) -> Option<String> {
    match line {
        StyleKind::Line(LineKind::Solid) => Some("1".to_string()),
        StyleKind::Line(LineKind::Dashed) => Some("2".to_string()),
        StyleKind::Line(LineKind::Dotted) => Some("3".to_string()),
        StyleKind::Line(LineKind::None) => None,
        other => other.payload().map(str::to_string),
    }
}

fn point_type(mark: &StyleKind) -> Option<String> {
    let code = match mark {
        StyleKind::Mark(MarkKind::None) => return Some("-1".to_string()),
        StyleKind::Mark(MarkKind::Circle) => 7,
        StyleKind::Mark(MarkKind::Square) => 5,
        StyleKind::Mark(MarkKind::Triangle) => 9,
        StyleKind::Mark(MarkKind::Diamond) => 13,
        StyleKind::Mark(MarkKind::Cross) => 2,
        StyleKind::Mark(MarkKind::Star) => 3,
        other => return other.payload().map(str::to_string),
    };
    Some(code.to_string())
}

fn color_name(color: &StyleKind) -> &str {
    match color {
        StyleKind::Color(ColorKind::Gray) => "grey",
        StyleKind::Custom(style) => style.payload.as_deref().unwrap_or(&style.display),
        other => other.name(),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
