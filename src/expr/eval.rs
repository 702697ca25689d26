use std::collections::BTreeMap;

use super::format::format_template;
use super::parser::{BinaryOp, Expr, UnaryOp};
use super::{EvaluationContext, ExprError, MAX_CALL_DEPTH};
use crate::store::canonical_name;
use crate::value::Value;

/// Values visible to one evaluation: the current result row, the parameters
/// of the enclosing named function, and whether `&name(...)` calls are
/// permitted at this site.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a> {
    row: Option<&'a BTreeMap<String, Value>>,
    params: Option<&'a BTreeMap<String, Value>>,
    allow_functions: bool,
    depth: usize,
}

impl<'a> Bindings<'a> {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bindings for a curve value formula over one result row.
    pub fn for_row(row: &'a BTreeMap<String, Value>) -> Self {
        Self {
            row: Some(row),
            params: None,
            allow_functions: true,
            depth: 0,
        }
    }

    pub fn allow_functions(mut self, allow: bool) -> Self {
        self.allow_functions = allow;
        self
    }
}

pub fn evaluate(
    expr: &Expr,
    ctx: &EvaluationContext,
    bindings: &Bindings<'_>,
) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column(name) => {
            let row = bindings.row.ok_or_else(|| {
                ExprError::NotAllowed(format!("column reference ${name} is not allowed here"))
            })?;
            let key = canonical_name(name).map_err(|_| ExprError::UnknownColumn(name.clone()))?;
            row.get(&key)
                .cloned()
                .ok_or_else(|| ExprError::UnknownColumn(name.clone()))
        }
        Expr::Env(name) => ctx
            .env(name)
            .map(Value::text)
            .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
        Expr::Calc(name) => {
            let calculated = ctx
                .calculated(name)
                .ok_or_else(|| ExprError::UnknownCalculated(name.clone()))?;
            evaluate(calculated, ctx, &Bindings::empty())
        }
        Expr::Param(name) => bindings
            .params
            .and_then(|params| params.get(name))
            .cloned()
            .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),
        Expr::UserCall { name, args } => call_user_function(name, args, ctx, bindings),
        Expr::Call { name, args } => call_builtin(name, args, ctx, bindings),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx, bindings)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    Value::Null => Ok(Value::Null),
                    other => Ok(Value::Number(-require_number(&other, "unary '-'")?)),
                },
            }
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                let left = evaluate(left, ctx, bindings)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(evaluate(right, ctx, bindings)?.is_truthy()))
            }
            BinaryOp::Or => {
                let left = evaluate(left, ctx, bindings)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(evaluate(right, ctx, bindings)?.is_truthy()))
            }
            _ => {
                let left = evaluate(left, ctx, bindings)?;
                let right = evaluate(right, ctx, bindings)?;
                apply_binary(*op, &left, &right)
            }
        },
    }
}

fn call_user_function(
    name: &str,
    args: &[Expr],
    ctx: &EvaluationContext,
    bindings: &Bindings<'_>,
) -> Result<Value, ExprError> {
    if !bindings.allow_functions {
        return Err(ExprError::NotAllowed(format!(
            "function &{name} may only be invoked from curve value formulas"
        )));
    }
    if bindings.depth >= MAX_CALL_DEPTH {
        return Err(ExprError::DepthExceeded(MAX_CALL_DEPTH));
    }

    let function = ctx
        .function(name)
        .ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
    if function.params.len() != args.len() {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected: function.params.len(),
            found: args.len(),
        });
    }

    let mut params = BTreeMap::new();
    for (param, arg) in function.params.iter().zip(args) {
        params.insert(param.clone(), evaluate(arg, ctx, bindings)?);
    }

    let inner = Bindings {
        row: None,
        params: Some(&params),
        allow_functions: true,
        depth: bindings.depth + 1,
    };
    evaluate(&function.body, ctx, &inner)
}

fn call_builtin(
    name: &str,
    args: &[Expr],
    ctx: &EvaluationContext,
    bindings: &Bindings<'_>,
) -> Result<Value, ExprError> {
    // `if` evaluates only the selected branch.
    if name == "if" {
        expect_arity(name, args, 3)?;
        let condition = evaluate(&args[0], ctx, bindings)?;
        let branch = if condition.is_truthy() { &args[1] } else { &args[2] };
        return evaluate(branch, ctx, bindings);
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, ctx, bindings))
        .collect::<Result<Vec<_>, _>>()?;

    match name {
        "abs" => unary_math(name, &values, f64::abs),
        "sqrt" => unary_math(name, &values, f64::sqrt),
        "exp" => unary_math(name, &values, f64::exp),
        "log" if values.len() == 2 => {
            binary_math(name, &values, |value, base| value.ln() / base.ln())
        }
        "log" => unary_math(name, &values, f64::ln),
        "log2" => unary_math(name, &values, f64::log2),
        "log10" => unary_math(name, &values, f64::log10),
        "floor" => unary_math(name, &values, f64::floor),
        "ceil" => unary_math(name, &values, f64::ceil),
        "int" => unary_math(name, &values, f64::trunc),
        "float" => unary_math(name, &values, |value| value),
        "pow" => binary_math(name, &values, f64::powf),
        "mod" => binary_math(name, &values, |left, right| {
            if right == 0.0 { f64::NAN } else { left % right }
        }),
        "round" if values.len() == 2 => binary_math(name, &values, |value, digits| {
            let factor = 10_f64.powi(digits as i32);
            (value * factor).round() / factor
        }),
        "round" => unary_math(name, &values, f64::round),
        "min" | "max" => {
            if values.is_empty() {
                return Err(ExprError::Arity {
                    name: name.to_string(),
                    expected: 1,
                    found: 0,
                });
            }
            let mut numbers = Vec::with_capacity(values.len());
            for value in values.iter().filter(|value| !value.is_null()) {
                numbers.push(require_number(value, name)?);
            }
            let picked = if name == "min" {
                numbers.into_iter().reduce(f64::min)
            } else {
                numbers.into_iter().reduce(f64::max)
            };
            Ok(picked.map(Value::Number).unwrap_or(Value::Null))
        }
        "str" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Text(values[0].to_string()))
        }
        "len" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Number(values[0].to_string().chars().count() as f64))
        }
        "upper" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Text(values[0].to_string().to_uppercase()))
        }
        "lower" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Text(values[0].to_string().to_lowercase()))
        }
        "format" => {
            let Some((template, rest)) = values.split_first() else {
                return Err(ExprError::Arity {
                    name: name.to_string(),
                    expected: 1,
                    found: 0,
                });
            };
            Ok(Value::Text(format_template(&template.to_string(), rest)?))
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn expect_arity(name: &str, args: &[impl Sized], expected: usize) -> Result<(), ExprError> {
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn unary_math(name: &str, values: &[Value], op: impl Fn(f64) -> f64) -> Result<Value, ExprError> {
    expect_arity(name, values, 1)?;
    if values[0].is_null() {
        return Ok(Value::Null);
    }
    Ok(number_or_null(op(require_number(&values[0], name)?)))
}

fn binary_math(
    name: &str,
    values: &[Value],
    op: impl Fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    expect_arity(name, values, 2)?;
    if values[0].is_null() || values[1].is_null() {
        return Ok(Value::Null);
    }
    let left = require_number(&values[0], name)?;
    let right = require_number(&values[1], name)?;
    Ok(number_or_null(op(left, right)))
}

fn number_or_null(value: f64) -> Value {
    if value.is_finite() {
        Value::Number(value)
    } else {
        Value::Null
    }
}

fn require_number(value: &Value, site: &str) -> Result<f64, ExprError> {
    value
        .as_number()
        .ok_or_else(|| ExprError::Type(format!("{site} expects a number, got '{value}'")))
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(compare(left, right) == Some(std::cmp::Ordering::Equal))),
        BinaryOp::Ne => Ok(Value::Bool(compare(left, right) != Some(std::cmp::Ordering::Equal))),
        BinaryOp::Lt => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_lt()))),
        BinaryOp::Le => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_le()))),
        BinaryOp::Gt => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_gt()))),
        BinaryOp::Ge => Ok(Value::Bool(compare(left, right).is_some_and(|o| o.is_ge()))),
        BinaryOp::Add => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) if !is_bool(left) && !is_bool(right) => {
                    Ok(number_or_null(a + b))
                }
                _ => Ok(Value::Text(format!("{left}{right}"))),
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            let a = require_number(left, "arithmetic")?;
            let b = require_number(right, "arithmetic")?;
            let result = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return Ok(Value::Null),
                BinaryOp::Div => a / b,
                _ => a.powf(b),
            };
            Ok(number_or_null(result))
        }
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn is_bool(value: &Value) -> bool {
    matches!(value, Value::Bool(_))
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(std::cmp::Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(left.to_string().cmp(&right.to_string())),
        },
    }
}
