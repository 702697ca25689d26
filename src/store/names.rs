use std::collections::BTreeMap;

use super::{StoreError, StoreResult};

/// Fixed wide-table columns; field names may not shadow them.
pub const RESERVED_NAMES: [&str; 3] = ["BENCH", "EXP", "OUT"];

/// Case-folds a benchmark, field or index name to the restricted character
/// set `[A-Z0-9_]`. Every other character becomes `_`.
pub fn canonical_name(raw: &str) -> StoreResult<String> {
    let canonical: String = raw
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();

    match canonical.chars().next() {
        None => Err(StoreError::InvalidName {
            name: raw.to_string(),
            reason: "name is empty".to_string(),
        }),
        Some(first) if !first.is_ascii_alphabetic() => Err(StoreError::InvalidName {
            name: raw.to_string(),
            reason: "name must start with a letter".to_string(),
        }),
        Some(_) if RESERVED_NAMES.contains(&canonical.as_str()) => Err(StoreError::InvalidName {
            name: raw.to_string(),
            reason: "name is reserved".to_string(),
        }),
        Some(_) => Ok(canonical),
    }
}

/// Re-keys `NAME -> value` pairs by canonical field name. Two spellings of
/// the same field are rejected rather than one silently winning.
pub(super) fn canonical_values(values: &BTreeMap<String, String>) -> StoreResult<BTreeMap<String, String>> {
    let mut canonical = BTreeMap::new();
    for (name, value) in values {
        let field = canonical_name(name)?;
        if canonical.insert(field.clone(), value.clone()).is_some() {
            return Err(StoreError::InvalidValue(format!(
                "field {field} is given more than once (as '{name}')"
            )));
        }
    }
    Ok(canonical)
}

pub fn view_table_name(bench: &str) -> String {
    format!("{bench}_VIEW")
}

pub fn column_name(field: &str) -> String {
    format!("_{field}")
}

pub(super) fn physical_index_name(bench: &str, index: &str) -> String {
    format!("{bench}_{index}_IDX")
}

/// Joins key values into the experiment identity string. Each value is
/// escaped so that the `|` separator can never appear inside it.
pub fn identity_string<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| escape_identity_value(value.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

fn escape_identity_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '|' => escaped.push_str("\\p"),
            other => escaped.push(other),
        }
    }
    escaped
}
