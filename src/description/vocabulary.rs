use std::sync::LazyLock;

use regex::Regex;

use super::SectionKind;
use crate::aggregate::Aggregation;
use crate::expr::Formula;

pub(super) type Check = fn(&str) -> Result<(), String>;

/// One allowed key of a section kind.
pub(super) struct KeySpec {
    pub(super) name: &'static str,
    pub(super) repeat: bool,
    pub(super) check: Option<Check>,
}

const fn single(name: &'static str, check: Option<Check>) -> KeySpec {
    KeySpec {
        name,
        repeat: false,
        check,
    }
}

const fn repeated(name: &'static str, check: Option<Check>) -> KeySpec {
    KeySpec {
        name,
        repeat: true,
        check,
    }
}

pub const GRAPH_FLAGS: [&str; 5] = ["stack", "normalize", "xoffset", "yoffset", "grid"];
pub const CURVE_FLAGS: [&str; 7] = ["bar", "hbar", "no_stack", "base", "accum", "skip", "errorbars"];
const LEGEND_PLACEMENTS: [&str; 4] = ["none", "inside", "outside", "below"];

const GLOBAL_KEYS: &[KeySpec] = &[
    repeated("env", Some(check_assignment)),
    repeated("calc", Some(check_assignment)),
    repeated("func", Some(check_function)),
    repeated("line", Some(check_style)),
    repeated("mark", Some(check_style)),
    repeated("color", Some(check_style)),
    repeated("scale", Some(check_style)),
    single("title", None),
    single("aggr", Some(check_aggregation)),
];

const GRAPH_KEYS: &[KeySpec] = &[
    single("title", None),
    single("xlabel", None),
    single("ylabel", None),
    single("xtype", Some(check_kind_name)),
    single("ytype", Some(check_kind_name)),
    single("xcategories", Some(check_list)),
    single("ycategories", Some(check_list)),
    single("xskip", Some(check_list)),
    single("yskip", Some(check_list)),
    single("xbase", Some(check_number)),
    single("ybase", Some(check_number)),
    single("xrange", Some(check_range)),
    single("yrange", Some(check_range)),
    single("aggr", Some(check_aggregation)),
    single("legend", Some(check_legend)),
    single("options", Some(check_graph_flags)),
];

const BENCH_KEYS: &[KeySpec] = &[
    single("name", Some(check_not_empty)),
    repeated("filter", Some(check_not_empty)),
    repeated("select", Some(check_not_empty)),
    single("outliers", Some(check_outliers)),
    single("label", None),
];

const CURVE_KEYS: &[KeySpec] = &[
    single("xval", Some(check_formula)),
    single("yval", Some(check_formula)),
    single("label", Some(check_formula)),
    single("marktext", Some(check_formula)),
    single("aggr", Some(check_aggregation)),
    single("line", Some(check_kind_name)),
    single("mark", Some(check_kind_name)),
    single("color", Some(check_kind_name)),
    single("iterate", Some(check_iterate)),
    repeated("filter", Some(check_not_empty)),
    single("options", Some(check_curve_flags)),
];

pub(super) fn vocabulary(kind: SectionKind) -> &'static [KeySpec] {
    match kind {
        SectionKind::Global => GLOBAL_KEYS,
        SectionKind::Graph => GRAPH_KEYS,
        SectionKind::Bench => BENCH_KEYS,
        SectionKind::Curve => CURVE_KEYS,
    }
}

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?P<value>.*?)\s*$")
        .expect("valid assignment regex")
});

static FUNCTION_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\((?P<params>[^)]*)\)\s*=\s*(?P<body>.+?)\s*$")
        .expect("valid function definition regex")
});

static STYLE_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>[A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(?P<display>\S+)(?:\s+(?P<payload>.+?))?\s*$")
        .expect("valid style definition regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static KIND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("valid kind name regex"));

/// Splits `NAME = value`.
pub fn parse_assignment(text: &str) -> Option<(String, String)> {
    let captures = ASSIGNMENT.captures(text)?;
    Some((captures["name"].to_string(), captures["value"].to_string()))
}

/// Splits `name(p1, p2) = body` into its name, parameter names and body.
pub fn parse_function_definition(text: &str) -> Option<(String, Vec<String>, String)> {
    let captures = FUNCTION_DEFINITION.captures(text)?;
    let params = parse_comma_list(&captures["params"]);
    if params.iter().any(|param| !IDENTIFIER.is_match(param)) {
        return None;
    }
    Some((captures["name"].to_string(), params, captures["body"].to_string()))
}

/// Splits `name = display [payload]` of a user kind registration.
pub fn parse_style_definition(text: &str) -> Option<(String, String, Option<String>)> {
    let captures = STYLE_DEFINITION.captures(text)?;
    Some((
        captures["name"].to_string(),
        captures["display"].to_string(),
        captures.name("payload").map(|payload| payload.as_str().to_string()),
    ))
}

pub fn parse_comma_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Option flags separated by commas or whitespace, lowercased.
pub fn parse_flags(text: &str) -> Vec<String> {
    text.split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|flag| !flag.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// `min:max` with either side optional.
pub fn parse_range(text: &str) -> Result<(Option<f64>, Option<f64>), String> {
    let (low, high) = text
        .split_once(':')
        .ok_or_else(|| format!("range '{text}' must look like min:max"))?;
    let bound = |side: &str| -> Result<Option<f64>, String> {
        let side = side.trim();
        if side.is_empty() {
            return Ok(None);
        }
        side.parse::<f64>()
            .map(Some)
            .map_err(|_| format!("range bound '{side}' is not a number"))
    };
    Ok((bound(low)?, bound(high)?))
}

/// Field names listed by `iterate`, accepting `$FIELD`, `${FIELD}` or a bare
/// name.
pub fn parse_iterate_fields(text: &str) -> Vec<String> {
    parse_comma_list(text)
        .into_iter()
        .map(|entry| {
            let bare = entry.strip_prefix('$').unwrap_or(&entry);
            let bare = bare
                .strip_prefix('{')
                .and_then(|inner| inner.strip_suffix('}'))
                .unwrap_or(bare);
            bare.trim().to_string()
        })
        .collect()
}

fn check_not_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn check_assignment(value: &str) -> Result<(), String> {
    parse_assignment(value)
        .map(|_| ())
        .ok_or_else(|| format!("expected NAME = value, found '{value}'"))
}

fn check_function(value: &str) -> Result<(), String> {
    parse_function_definition(value)
        .map(|_| ())
        .ok_or_else(|| format!("expected name(param, ...) = expression, found '{value}'"))
}

fn check_style(value: &str) -> Result<(), String> {
    parse_style_definition(value)
        .map(|_| ())
        .ok_or_else(|| format!("expected name = display [payload], found '{value}'"))
}

fn check_kind_name(value: &str) -> Result<(), String> {
    if KIND_NAME.is_match(value) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid kind name"))
    }
}

fn check_aggregation(value: &str) -> Result<(), String> {
    value.parse::<Aggregation>().map(|_| ())
}

fn check_list(value: &str) -> Result<(), String> {
    if parse_comma_list(value).is_empty() {
        Err("expected a comma separated list".to_string())
    } else {
        Ok(())
    }
}

fn check_number(value: &str) -> Result<(), String> {
    value
        .trim()
        .parse::<f64>()
        .map(|_| ())
        .map_err(|_| format!("'{value}' is not a number"))
}

fn check_range(value: &str) -> Result<(), String> {
    parse_range(value).map(|_| ())
}

fn check_legend(value: &str) -> Result<(), String> {
    check_choice(value, &LEGEND_PLACEMENTS, "legend placement")
}

fn check_outliers(value: &str) -> Result<(), String> {
    check_choice(value, &["include", "exclude"], "outlier mode")
}

fn check_graph_flags(value: &str) -> Result<(), String> {
    check_flags(value, &GRAPH_FLAGS)
}

fn check_curve_flags(value: &str) -> Result<(), String> {
    check_flags(value, &CURVE_FLAGS)
}

fn check_formula(value: &str) -> Result<(), String> {
    Formula::parse(value).map(|_| ()).map_err(|err| err.to_string())
}

fn check_iterate(value: &str) -> Result<(), String> {
    let fields = parse_iterate_fields(value);
    if fields.is_empty() || fields.iter().any(String::is_empty) {
        Err(format!("expected a list of fields, found '{value}'"))
    } else {
        Ok(())
    }
}

fn check_choice(value: &str, choices: &[&str], what: &str) -> Result<(), String> {
    let wanted = value.trim().to_ascii_lowercase();
    if choices.contains(&wanted.as_str()) {
        Ok(())
    } else {
        Err(format!("unknown {what} '{value}'; expected one of {}", choices.join(", ")))
    }
}

fn check_flags(value: &str, allowed: &[&str]) -> Result<(), String> {
    match parse_flags(value)
        .into_iter()
        .find(|flag| !allowed.contains(&flag.as_str()))
    {
        Some(flag) => Err(format!("unknown option '{flag}'; expected any of {}", allowed.join(", "))),
        None => Ok(()),
    }
}
