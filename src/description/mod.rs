//! Graph-description documents: physical source loading (includes, line
//! continuation, comments) and the section/item structure with per-section
//! key vocabulary.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::expr::EvaluationContext;

mod sections;
mod source;
#[cfg(test)]
mod tests;
mod vocabulary;

pub use source::MAX_INCLUDE_DEPTH;
pub use vocabulary::{
    CURVE_FLAGS, GRAPH_FLAGS, parse_assignment, parse_comma_list, parse_flags, parse_function_definition,
    parse_iterate_fields, parse_range, parse_style_definition,
};

/// Position of a logical line: the file it came from and the number of its
/// first physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{line}: {message}", .file.display())]
pub struct DescriptionError {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

impl DescriptionError {
    pub fn at(location: &Location, message: impl Into<String>) -> Self {
        Self {
            file: location.file.clone(),
            line: location.line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Global,
    Graph,
    Bench,
    Curve,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Graph => "graph",
            Self::Bench => "bench",
            Self::Curve => "curve",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub value: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub location: Location,
    pub items: Vec<Item>,
}

impl Section {
    pub fn item(&self, key: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.item(key).map(|item| item.value.as_str())
    }

    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |item| item.key == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub sections: Vec<Section>,
}

/// Loads and parses a description file. Include paths may reference
/// environment variables visible through `ctx`.
pub fn parse_file(path: &Path, ctx: &EvaluationContext) -> Result<Document, DescriptionError> {
    let lines = source::load_file(path, ctx)?;
    sections::parse_lines(&lines)
}

/// Parses in-memory description text. `origin` names the text in error
/// messages and anchors relative include paths.
pub fn parse_str(text: &str, origin: &Path, ctx: &EvaluationContext) -> Result<Document, DescriptionError> {
    let lines = source::load_text(text, origin, ctx)?;
    sections::parse_lines(&lines)
}
