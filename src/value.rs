use std::cmp::Ordering;
use std::fmt;

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::Serialize;

/// A dynamically typed datum flowing from stored rows through formulas,
/// aggregation and geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value. Text counts as numeric when it parses as a
    /// finite float.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Number(value) => Some(*value),
            Self::Text(text) => parse_number(text),
            Self::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        }
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Number(_) => true,
            Self::Text(text) => parse_number(text).is_some(),
            _ => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Number(value) => *value != 0.0,
            Self::Text(text) => !text.is_empty(),
            Self::Bool(flag) => *flag,
        }
    }

    /// Literal suitable for splicing into a SQL predicate.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Number(value) => format_number(*value),
            Self::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
            Self::Text(text) => match parse_number(text) {
                Some(number) => format_number(number),
                None => format!("'{}'", text.replace('\'', "''")),
            },
        }
    }

    /// Owned SQLite value for bound statement parameters.
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            Self::Null => SqlValue::Null,
            Self::Number(value) => SqlValue::Real(*value),
            Self::Text(text) => SqlValue::Text(text.clone()),
            Self::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        }
    }

    pub fn from_sql(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(number) => Self::Number(number as f64),
            ValueRef::Real(number) => Self::Number(number),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Text(format!("<blob {} bytes>", bytes.len())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(value) => f.write_str(&format_number(*value)),
            Self::Text(text) => f.write_str(text),
            Self::Bool(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Integral values print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Ordering wrapper used as multimap key along an axis: nulls first, then
/// numbers in numeric order, then text in lexical order.
#[derive(Debug, Clone)]
pub struct AxisKey(pub Value);

impl AxisKey {
    pub fn value(&self) -> &Value {
        &self.0
    }

    fn rank(&self) -> (u8, Option<f64>) {
        match self.0.as_number() {
            Some(number) if !matches!(self.0, Value::Bool(_)) => (1, Some(number)),
            _ if self.0.is_null() => (0, None),
            _ => (2, None),
        }
    }
}

impl Ord for AxisKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let (left_rank, left_number) = self.rank();
        let (right_rank, right_number) = other.rank();
        left_rank.cmp(&right_rank).then_with(|| match (left_number, right_number) {
            (Some(left), Some(right)) => left.total_cmp(&right),
            _ => self.0.to_string().cmp(&other.0.to_string()),
        })
    }
}

impl PartialOrd for AxisKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AxisKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AxisKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_without_trailing_fraction() {
        assert_eq!(Value::Number(4.0).to_string(), "4");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn axis_keys_order_numbers_before_text() {
        let mut keys = vec![
            AxisKey(Value::text("write")),
            AxisKey(Value::text("10")),
            AxisKey(Value::Number(2.0)),
            AxisKey(Value::text("read")),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(|key| key.value().to_string()).collect();
        assert_eq!(rendered, vec!["2", "10", "read", "write"]);
        assert_eq!(AxisKey(Value::text("1")), AxisKey(Value::Number(1.0)));
    }

    #[test]
    fn sql_literals_escape_quotes() {
        assert_eq!(Value::text("o'neil").to_sql_literal(), "'o''neil'");
        assert_eq!(Value::text("42").to_sql_literal(), "42");
    }
}
