//! Expression environment: the small formula language used by graph
//! descriptions, its variable namespaces and text substitution.

use thiserror::Error;

mod context;
mod eval;
mod format;
mod formula;
mod lexer;
mod parser;
mod substitute;
#[cfg(test)]
mod tests;

pub use context::{EvaluationContext, FunctionDef};
pub use eval::{Bindings, evaluate};
pub use format::format_template;
pub use formula::Formula;
pub use parser::{BinaryOp, Expr, UnaryOp, parse_expression};
pub use substitute::{Segment, Sigil, scan_references, scan_sql_references, substitute_text};

/// Maximum nesting of named-function invocations.
pub const MAX_CALL_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown environment variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown calculated variable '{0}'")]
    UnknownCalculated(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("type error: {0}")]
    Type(String),
    #[error("{0}")]
    NotAllowed(String),
    #[error("function call depth exceeded {0}")]
    DepthExceeded(usize),
}
