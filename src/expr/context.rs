use std::collections::BTreeMap;

use tracing::debug;

use super::parser::{Expr, parse_expression};
use super::ExprError;
use crate::style::StyleRegistry;

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

/// Variable namespaces and registries for one description-file invocation.
/// Built fresh per invocation and passed by reference through parsing,
/// binding and rendering.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    overrides: BTreeMap<String, String>,
    process_env: BTreeMap<String, String>,
    defaults: BTreeMap<String, String>,
    calculated: BTreeMap<String, Expr>,
    functions: BTreeMap<String, FunctionDef>,
    styles: StyleRegistry,
}

impl EvaluationContext {
    /// Context without any process environment; overrides and file defaults
    /// are the only environment sources.
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self {
            overrides,
            ..Self::default()
        }
    }

    /// Context that also sees a snapshot of the process environment.
    pub fn from_process(overrides: BTreeMap<String, String>) -> Self {
        Self {
            overrides,
            process_env: std::env::vars().collect(),
            ..Self::default()
        }
    }

    /// Lookup order: per-invocation override, process environment, then the
    /// description's own default.
    pub fn env(&self, name: &str) -> Option<&str> {
        self.overrides
            .get(name)
            .or_else(|| self.process_env.get(name))
            .or_else(|| self.defaults.get(name))
            .map(String::as_str)
    }

    pub fn set_default_env(&mut self, name: &str, value: &str) {
        self.defaults.insert(name.to_string(), value.to_string());
    }

    pub fn define_calculated(&mut self, name: &str, source: &str) -> Result<(), ExprError> {
        let expr = parse_expression(source)?;

        let mut violation = None;
        expr.visit(&mut |node| {
            if violation.is_some() {
                return;
            }
            violation = match node {
                Expr::Calc(other) => Some(format!(
                    "calculated variable '{name}' may not reference calculated variable '{other}'"
                )),
                Expr::Column(column) => Some(format!(
                    "calculated variable '{name}' may not reference column '{column}'"
                )),
                Expr::UserCall { name: function, .. } => Some(format!(
                    "calculated variable '{name}' may not invoke function '{function}'"
                )),
                Expr::Param(identifier) => Some(format!(
                    "calculated variable '{name}' references unknown identifier '{identifier}'"
                )),
                _ => None,
            };
        });
        if let Some(message) = violation {
            return Err(ExprError::NotAllowed(message));
        }

        debug!(name, source, "defined calculated variable");
        self.calculated.insert(name.to_string(), expr);
        Ok(())
    }

    pub fn calculated(&self, name: &str) -> Option<&Expr> {
        self.calculated.get(name)
    }

    pub fn define_function(
        &mut self,
        name: &str,
        params: Vec<String>,
        source: &str,
    ) -> Result<(), ExprError> {
        if self.functions.contains_key(name) {
            return Err(ExprError::NotAllowed(format!(
                "function '{name}' is already defined"
            )));
        }

        let body = parse_expression(source)?;
        let mut violation = None;
        body.visit(&mut |node| {
            if violation.is_some() {
                return;
            }
            violation = match node {
                Expr::Param(identifier) if !params.contains(identifier) => {
                    Some(ExprError::UnknownIdentifier(identifier.clone()))
                }
                Expr::Column(column) => Some(ExprError::NotAllowed(format!(
                    "function '{name}' may not reference column '{column}'; pass it as an argument"
                ))),
                _ => None,
            };
        });
        if let Some(err) = violation {
            return Err(err);
        }

        debug!(name, params = ?params, "defined function");
        self.functions.insert(
            name.to_string(),
            FunctionDef {
                name: name.to_string(),
                params,
                body,
            },
        );
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleRegistry {
        &mut self.styles
    }
}
