use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use super::{RenderError, Renderer};
use crate::geometry::{AxisGeometry, CurveGeometry, Direction, GeometryModel, GraphGeometry, PlotPoint};
use crate::value::format_number;

#[derive(Debug, Clone)]
pub struct XmlPlotConfig {
    pub pretty: bool,
    pub indent: usize,
    /// Name of the `<graphset>` element when the description has no title.
    pub default_name: String,
}

impl Default for XmlPlotConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: 2,
            default_name: "benchrepo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlPlotRenderer {
    pub config: XmlPlotConfig,
}

impl XmlPlotRenderer {
    pub fn new(config: XmlPlotConfig) -> Self {
        Self { config }
    }
}

impl Renderer for XmlPlotRenderer {
    fn name(&self) -> &'static str {
        "xmlplot"
    }

    fn render(&self, model: &GeometryModel, out: &mut dyn Write) -> Result<(), RenderError> {
        let mut writer = if self.config.pretty {
            Writer::new_with_indent(out, b' ', self.config.indent)
        } else {
            Writer::new(out)
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("plotdata")))?;

        let mut graphset = BytesStart::new("graphset");
        graphset.push_attribute(("name", model.title.as_deref().unwrap_or(&self.config.default_name)));
        writer.write_event(Event::Start(graphset))?;
        for graph in &model.graphs {
            write_graph(&mut writer, graph)?;
        }
        writer.write_event(Event::End(BytesEnd::new("graphset")))?;

        writer.write_event(Event::End(BytesEnd::new("plotdata")))?;
        writer.into_inner().write_all(b"\n")?;
        Ok(())
    }
}

fn write_graph<W: Write>(writer: &mut Writer<W>, graph: &GraphGeometry) -> Result<(), RenderError> {
    let mut element = BytesStart::new("graph");
    element.push_attribute(("title", graph.title.as_str()));
    element.push_attribute(("xtype", graph.x.scale.display()));
    element.push_attribute(("ytype", graph.y.scale.display()));
    element.push_attribute(("legend", graph.legend.as_str()));
    if graph.grid {
        element.push_attribute(("grid", "true"));
    }
    writer.write_event(Event::Start(element))?;

    write_axis(writer, "x", &graph.x)?;
    write_axis(writer, "y", &graph.y)?;
    for curve in &graph.curves {
        write_curve(writer, curve, graph.points_of(curve.id))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    Ok(())
}

fn write_axis<W: Write>(writer: &mut Writer<W>, name: &str, axis: &AxisGeometry) -> Result<(), RenderError> {
    let mut element = BytesStart::new("axis");
    element.push_attribute(("name", name));
    element.push_attribute(("type", axis.scale.display()));
    if let Some(label) = &axis.label {
        element.push_attribute(("label", label.as_str()));
    }
    if let Some(min) = axis.range.0 {
        element.push_attribute(("min", format_number(min).as_str()));
    }
    if let Some(max) = axis.range.1 {
        element.push_attribute(("max", format_number(max).as_str()));
    }

    if axis.ticks.is_empty() {
        writer.write_event(Event::Empty(element))?;
        return Ok(());
    }
    writer.write_event(Event::Start(element))?;
    for tick in &axis.ticks {
        let mut element = BytesStart::new("tick");
        element.push_attribute(("label", tick.label.as_str()));
        element.push_attribute(("position", format_number(tick.position).as_str()));
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("axis")))?;
    Ok(())
}

fn write_curve<'p, W: Write>(
    writer: &mut Writer<W>,
    curve: &CurveGeometry,
    points: impl Iterator<Item = &'p PlotPoint>,
) -> Result<(), RenderError> {
    let mut element = BytesStart::new("curve");
    element.push_attribute(("id", curve.id.to_string().as_str()));
    element.push_attribute(("label", curve.label.as_str()));
    element.push_attribute(("line", curve.line.display()));
    element.push_attribute(("mark", curve.mark.display()));
    element.push_attribute(("color", curve.color.display()));
    if curve.bar {
        element.push_attribute(("bar", "true"));
    }
    if let Some(text) = &curve.mark_text {
        element.push_attribute(("marktext", text.as_str()));
    }
    writer.write_event(Event::Start(element))?;

    for point in points {
        let mut element = BytesStart::new("point");
        element.push_attribute(("x", format_number(point.plotted_x).as_str()));
        element.push_attribute(("y", format_number(point.plotted_y).as_str()));
        element.push_attribute(("rawx", point.raw_x.to_string().as_str()));
        element.push_attribute(("rawy", point.raw_y.to_string().as_str()));
        let value = match curve.direction {
            Direction::ByX => point.plotted_y,
            Direction::ByY => point.plotted_x,
        };
        if curve.errorbars || point.low != value || point.high != value {
            element.push_attribute(("low", format_number(point.low).as_str()));
            element.push_attribute(("high", format_number(point.high).as_str()));
        }
        writer.write_event(Event::Empty(element))?;
    }

    writer.write_event(Event::End(BytesEnd::new("curve")))?;
    Ok(())
}
