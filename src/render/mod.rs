//! Output encodings of a [`GeometryModel`]. Renderers only read the model;
//! all placement decisions are made by the geometry engine.

use std::io::{self, Write};

use thiserror::Error;

use crate::geometry::GeometryModel;

mod raw;
mod script;
mod xml;

pub use raw::{RawDataConfig, RawDataRenderer};
pub use script::{ScriptConfig, ScriptRenderer};
pub use xml::{XmlPlotConfig, XmlPlotRenderer};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to write xml: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub trait Renderer {
    fn name(&self) -> &'static str;

    fn render(&self, model: &GeometryModel, out: &mut dyn Write) -> Result<(), RenderError>;
}
