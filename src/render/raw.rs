use std::io::Write;

use super::{RenderError, Renderer};
use crate::geometry::GeometryModel;
use crate::value::format_number;

#[derive(Debug, Clone)]
pub struct RawDataConfig {
    pub separator: String,
    /// Append the low and high bounds to every point line.
    pub bounds: bool,
}

impl Default for RawDataConfig {
    fn default() -> Self {
        Self {
            separator: ":".to_string(),
            bounds: false,
        }
    }
}

/// Plain point listing: a comment line per graph and curve, then one
/// `curve:raw_x:raw_y:x:y` line per plotted point.
#[derive(Debug, Clone, Default)]
pub struct RawDataRenderer {
    pub config: RawDataConfig,
}

impl RawDataRenderer {
    pub fn new(config: RawDataConfig) -> Self {
        Self { config }
    }
}

impl Renderer for RawDataRenderer {
    fn name(&self) -> &'static str {
        "data"
    }

    fn render(&self, model: &GeometryModel, out: &mut dyn Write) -> Result<(), RenderError> {
        let sep = &self.config.separator;
        for (index, graph) in model.graphs.iter().enumerate() {
            if index > 0 {
                writeln!(out)?;
            }
            writeln!(out, "# graph {} {}", index + 1, graph.title)?;
            for curve in &graph.curves {
                writeln!(out, "# curve {} {}", curve.id, curve.label)?;
                for point in graph.points_of(curve.id) {
                    write!(
                        out,
                        "{}{sep}{}{sep}{}{sep}{}{sep}{}",
                        point.curve_id,
                        point.raw_x,
                        point.raw_y,
                        format_number(point.plotted_x),
                        format_number(point.plotted_y)
                    )?;
                    if self.config.bounds {
                        write!(out, "{sep}{}{sep}{}", format_number(point.low), format_number(point.high))?;
                    }
                    writeln!(out)?;
                }
            }
        }
        Ok(())
    }
}
