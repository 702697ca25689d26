use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{DescriptionError, Location};
use crate::expr::{EvaluationContext, substitute_text};

/// Deepest chain of nested `include` directives.
pub const MAX_INCLUDE_DEPTH: usize = 16;

static INCLUDE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^include\s+(?:"(?P<double>[^"]*)"|'(?P<single>[^']*)')$"#)
        .expect("valid include directive regex")
});

/// One line after continuation joining, with the position of its first
/// physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LogicalLine {
    pub(super) location: Location,
    pub(super) text: String,
}

pub(super) fn load_file(path: &Path, ctx: &EvaluationContext) -> Result<Vec<LogicalLine>, DescriptionError> {
    let mut loader = Loader::new(ctx);
    loader.include(path, None)?;
    Ok(loader.lines)
}

pub(super) fn load_text(
    text: &str,
    origin: &Path,
    ctx: &EvaluationContext,
) -> Result<Vec<LogicalLine>, DescriptionError> {
    let mut loader = Loader::new(ctx);
    loader.stack.push(source_identity(origin));
    loader.splice(text, origin)?;
    Ok(loader.lines)
}

struct Loader<'a> {
    ctx: &'a EvaluationContext,
    stack: Vec<PathBuf>,
    lines: Vec<LogicalLine>,
}

impl<'a> Loader<'a> {
    fn new(ctx: &'a EvaluationContext) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            lines: Vec::new(),
        }
    }

    fn include(&mut self, path: &Path, from: Option<&Location>) -> Result<(), DescriptionError> {
        let fail = |message: String| match from {
            Some(location) => DescriptionError::at(location, message),
            None => DescriptionError {
                file: path.to_path_buf(),
                line: 0,
                message,
            },
        };

        if self.stack.len() >= MAX_INCLUDE_DEPTH {
            return Err(fail(format!(
                "include nesting deeper than {MAX_INCLUDE_DEPTH} levels at {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)
            .map_err(|err| fail(format!("cannot read {}: {err}", path.display())))?;
        let identity = source_identity(path);
        if self.stack.contains(&identity) {
            return Err(fail(format!("include cycle through {}", path.display())));
        }

        self.stack.push(identity);
        debug!(file = %path.display(), depth = self.stack.len(), "loading description source");
        self.splice(&text, path)?;
        self.stack.pop();
        Ok(())
    }

    /// Joins continued lines, drops comments and blank lines, and expands
    /// include directives in place.
    fn splice(&mut self, text: &str, file: &Path) -> Result<(), DescriptionError> {
        let mut pending: Option<(usize, String)> = None;

        for (index, raw) in text.lines().enumerate() {
            let number = index + 1;
            let line = raw.trim();
            if pending.is_none() && (line.is_empty() || line.starts_with('#')) {
                continue;
            }

            let (start, mut joined) = pending.take().unwrap_or((number, String::new()));
            let (content, continued) = match line.strip_suffix('\\') {
                Some(head) => (head.trim_end(), true),
                None => (line, false),
            };
            if !joined.is_empty() && !content.is_empty() {
                joined.push(' ');
            }
            joined.push_str(content);

            if continued {
                pending = Some((start, joined));
            } else {
                self.logical(file, start, joined)?;
            }
        }

        if let Some((start, joined)) = pending {
            self.logical(file, start, joined)?;
        }
        Ok(())
    }

    fn logical(&mut self, file: &Path, line: usize, text: String) -> Result<(), DescriptionError> {
        let location = Location {
            file: file.to_path_buf(),
            line,
        };
        if text.is_empty() {
            return Ok(());
        }

        let is_directive = text
            .strip_prefix("include")
            .is_some_and(|rest| rest.starts_with(char::is_whitespace));
        if !is_directive {
            self.lines.push(LogicalLine { location, text });
            return Ok(());
        }

        let captures = INCLUDE_DIRECTIVE.captures(&text).ok_or_else(|| {
            DescriptionError::at(&location, "malformed include directive; expected include \"path\"")
        })?;
        let raw = captures
            .name("double")
            .or_else(|| captures.name("single"))
            .map(|path| path.as_str())
            .unwrap_or_default();
        let expanded = substitute_text(raw, self.ctx)
            .map_err(|err| DescriptionError::at(&location, format!("include path: {err}")))?;
        if expanded.trim().is_empty() {
            return Err(DescriptionError::at(&location, "include path is empty"));
        }

        let target = PathBuf::from(expanded.trim());
        let target = if target.is_absolute() {
            target
        } else {
            file.parent().unwrap_or_else(|| Path::new(".")).join(target)
        };
        self.include(&target, Some(&location))
    }
}

fn source_identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
