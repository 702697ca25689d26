use super::eval::{Bindings, evaluate};
use super::lexer::read_reference;
use super::{EvaluationContext, ExprError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sigil {
    Column,
    Env,
    Calc,
    Func,
}

impl Sigil {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            '$' => Some(Self::Column),
            '%' => Some(Self::Env),
            '@' => Some(Self::Calc),
            '&' => Some(Self::Func),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Column => '$',
            Self::Env => '%',
            Self::Calc => '@',
            Self::Func => '&',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Reference { sigil: Sigil, name: String },
}

/// Splits free text into literal runs and sigil references. A backslash
/// before a sigil yields the sigil itself; a sigil not followed by an
/// identifier is literal text.
pub fn scan_references(text: &str) -> Vec<Segment> {
    scan(text, false)
}

/// Like [`scan_references`], but single-quoted SQL string literals are
/// copied verbatim, so `LIKE '%read%'` keeps its wildcards.
pub fn scan_sql_references(text: &str) -> Vec<Segment> {
    scan(text, true)
}

fn scan(text: &str, skip_quoted: bool) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if skip_quoted && ch == '\'' {
            let end = quoted_end(&chars, index + 1);
            literal.extend(&chars[index..end]);
            index = end;
            continue;
        }

        if ch == '\\' && chars.get(index + 1).copied().and_then(Sigil::from_char).is_some() {
            literal.push(chars[index + 1]);
            index += 2;
            continue;
        }

        if let Some(sigil) = Sigil::from_char(ch) {
            if let Some((name, consumed)) = read_reference(&chars[index + 1..]) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Reference { sigil, name });
                index += consumed + 1;
                continue;
            }
        }

        literal.push(ch);
        index += 1;
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Index just past the closing quote of a literal opened before `start`,
/// or the end of the text when the literal is unterminated.
fn quoted_end(chars: &[char], start: usize) -> usize {
    let mut index = start;
    while index < chars.len() {
        if chars[index] == '\'' {
            if chars.get(index + 1) == Some(&'\'') {
                index += 2;
                continue;
            }
            return index + 1;
        }
        index += 1;
    }
    chars.len()
}

/// Replaces environment and calculated-variable references in free text.
/// Column and function references are not available outside formulas.
pub fn substitute_text(text: &str, ctx: &EvaluationContext) -> Result<String, ExprError> {
    let mut out = String::with_capacity(text.len());

    for segment in scan_references(text) {
        match segment {
            Segment::Literal(literal) => out.push_str(&literal),
            Segment::Reference { sigil, name } => match sigil {
                Sigil::Env => out.push_str(
                    ctx.env(&name)
                        .ok_or(ExprError::UnknownVariable(name))?,
                ),
                Sigil::Calc => {
                    let expr = ctx
                        .calculated(&name)
                        .ok_or_else(|| ExprError::UnknownCalculated(name.clone()))?;
                    out.push_str(&evaluate(expr, ctx, &Bindings::empty())?.to_string());
                }
                Sigil::Column | Sigil::Func => {
                    return Err(ExprError::NotAllowed(format!(
                        "reference {}{name} is not allowed in plain text",
                        sigil.as_char()
                    )));
                }
            },
        }
    }

    Ok(out)
}
