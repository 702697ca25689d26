use super::eval::{Bindings, evaluate};
use super::format::format_template;
use super::parser::{Expr, parse_expression_list};
use super::{EvaluationContext, ExprError};
use crate::value::Value;

/// A curve value formula: one expression, or a format template followed by
/// the expressions that fill it.
#[derive(Debug, Clone)]
pub struct Formula {
    source: String,
    parts: Vec<Expr>,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let parts = parse_expression_list(source)?;
        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column names referenced anywhere in the formula, as written.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for part in &self.parts {
            part.visit(&mut |node| {
                if let Expr::Column(name) = node {
                    if !columns.contains(name) {
                        columns.push(name.clone());
                    }
                }
            });
        }
        columns
    }

    pub fn evaluate(
        &self,
        ctx: &EvaluationContext,
        bindings: &Bindings<'_>,
    ) -> Result<Value, ExprError> {
        if let [single] = self.parts.as_slice() {
            return evaluate(single, ctx, bindings);
        }

        let values = self
            .parts
            .iter()
            .map(|part| evaluate(part, ctx, bindings))
            .collect::<Result<Vec<_>, _>>()?;

        if self.parts[0].is_string_literal() {
            let template = values[0].to_string();
            return Ok(Value::Text(format_template(&template, &values[1..])?));
        }

        let joined = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Value::Text(joined))
    }
}
