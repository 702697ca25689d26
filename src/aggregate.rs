//! Reduction of one bucket of raw values (all values sharing an axis
//! coordinate) to `(value, low, high)` triples.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::stats;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Triple {
    pub value: Value,
    pub low: Value,
    pub high: Value,
}

impl Triple {
    fn flat(value: Value) -> Self {
        Self {
            low: value.clone(),
            high: value.clone(),
            value,
        }
    }

    fn number(value: f64) -> Self {
        Self::flat(Value::Number(value))
    }

    fn spread(value: f64, low: f64, high: f64) -> Self {
        Self {
            value: Value::Number(value),
            low: Value::Number(low),
            high: Value::Number(high),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    #[default]
    None,
    Count,
    Sum,
    Max,
    Min,
    Range,
    Avg,
    Median,
    Stdev,
    Cv,
    Ci,
    CiMin,
    CiMax,
    Delta,
}

const ALL: [Aggregation; 14] = [
    Aggregation::None,
    Aggregation::Count,
    Aggregation::Sum,
    Aggregation::Max,
    Aggregation::Min,
    Aggregation::Range,
    Aggregation::Avg,
    Aggregation::Median,
    Aggregation::Stdev,
    Aggregation::Cv,
    Aggregation::Ci,
    Aggregation::CiMin,
    Aggregation::CiMax,
    Aggregation::Delta,
];

impl Aggregation {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
            Self::Range => "rng",
            Self::Avg => "avg",
            Self::Median => "median",
            Self::Stdev => "stdev",
            Self::Cv => "cv",
            Self::Ci => "ci",
            Self::CiMin => "ci_min",
            Self::CiMax => "ci_max",
            Self::Delta => "delta",
        }
    }

    /// Reduces one bucket. `none` yields one triple per input value; every
    /// other function yields at most one. An empty bucket, or a numeric
    /// reduction over a bucket without numbers, yields nothing.
    pub fn apply(self, bucket: &[Value]) -> Vec<Triple> {
        let present: Vec<&Value> = bucket.iter().filter(|value| !value.is_null()).collect();
        if present.is_empty() {
            return Vec::new();
        }

        match self {
            Self::None => present.into_iter().cloned().map(Triple::flat).collect(),
            Self::Count => vec![Triple::number(present.len() as f64)],
            Self::Max => extreme(&present, Ordering::Greater).into_iter().collect(),
            Self::Min => extreme(&present, Ordering::Less).into_iter().collect(),
            numeric => {
                let numbers: Vec<f64> = present.iter().filter_map(|value| value.as_number()).collect();
                numeric_triple(numeric, &numbers).into_iter().collect()
            }
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let wanted = text.trim().to_ascii_lowercase();
        ALL.into_iter()
            .find(|aggregation| aggregation.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = ALL.iter().map(|aggregation| aggregation.name()).collect();
                format!("unknown aggregation '{}'; expected one of {}", text.trim(), names.join(", "))
            })
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maximum or minimum of the bucket: numeric when every value is a number,
/// lexicographic on the text form otherwise.
fn extreme(values: &[&Value], wanted: Ordering) -> Option<Triple> {
    let all_numeric = values.iter().all(|value| value.is_numeric());
    let compare = |left: &&Value, right: &&Value| -> Ordering {
        if all_numeric {
            match (left.as_number(), right.as_number()) {
                (Some(left), Some(right)) => left.total_cmp(&right),
                _ => Ordering::Equal,
            }
        } else {
            left.to_string().cmp(&right.to_string())
        }
    };

    let best = values.iter().copied().reduce(|best, candidate| {
        if compare(&candidate, &best) == wanted {
            candidate
        } else {
            best
        }
    })?;

    let value = match (all_numeric, best.as_number()) {
        (true, Some(number)) => Value::Number(number),
        _ => best.clone(),
    };
    Some(Triple::flat(value))
}

fn numeric_triple(aggregation: Aggregation, numbers: &[f64]) -> Option<Triple> {
    if numbers.is_empty() {
        return None;
    }
    let low = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let high = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = stats::mean(numbers)?;

    let triple = match aggregation {
        Aggregation::Sum => Triple::number(numbers.iter().sum()),
        Aggregation::Range => Triple::number(high - low),
        Aggregation::Avg => Triple::spread(avg, low, high),
        Aggregation::Median => Triple::spread(stats::median(numbers)?, low, high),
        Aggregation::Stdev => Triple::number(stats::stdev(numbers)?),
        Aggregation::Cv => {
            let deviation = stats::stdev(numbers)?;
            Triple::number(if avg == 0.0 { 0.0 } else { deviation / avg })
        }
        Aggregation::Ci | Aggregation::CiMin | Aggregation::CiMax | Aggregation::Delta => {
            let half = stats::confidence_half_width_95(numbers);
            match aggregation {
                Aggregation::Ci => Triple::spread(avg, avg - half, avg + half),
                Aggregation::CiMin => Triple::number(avg - half),
                Aggregation::CiMax => Triple::number(avg + half),
                _ => Triple::spread(half, 0.0, half),
            }
        }
        Aggregation::None | Aggregation::Count | Aggregation::Max | Aggregation::Min => return None,
    };
    Some(triple)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().copied().map(Value::Number).collect()
    }

    fn single(aggregation: Aggregation, bucket: &[Value]) -> Triple {
        let mut triples = aggregation.apply(bucket);
        assert_eq!(triples.len(), 1, "{aggregation} yields one triple");
        triples.remove(0)
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("AVG".parse::<Aggregation>(), Ok(Aggregation::Avg));
        assert_eq!("ci_min".parse::<Aggregation>(), Ok(Aggregation::CiMin));
        assert_eq!("rng".parse::<Aggregation>(), Ok(Aggregation::Range));
        assert!("mode".parse::<Aggregation>().is_err());
    }

    #[test]
    fn count_fills_all_components() {
        let triple = single(Aggregation::Count, &numbers(&[3.0, 1.0, 4.0]));
        assert_eq!(triple, Triple::number(3.0));
    }

    #[test]
    fn summaries_are_ordered() {
        let bucket = numbers(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0]);
        let value = |aggregation| single(aggregation, &bucket).value.as_number().expect("numeric");
        let (min, avg, max) = (value(Aggregation::Min), value(Aggregation::Avg), value(Aggregation::Max));

        assert!(min <= avg && avg <= max);
        assert_eq!(value(Aggregation::Range), max - min);
        assert_eq!(value(Aggregation::Sum), 23.0);
        assert_eq!(value(Aggregation::Median), 3.5);

        let avg = single(Aggregation::Avg, &bucket);
        assert_eq!((avg.low, avg.high), (Value::Number(1.0), Value::Number(9.0)));
    }

    #[test]
    fn single_value_has_zero_spread() {
        assert_eq!(single(Aggregation::Stdev, &numbers(&[7.0])), Triple::number(0.0));
        assert_eq!(single(Aggregation::Delta, &numbers(&[7.0])), Triple::spread(0.0, 0.0, 0.0));
        let ci = single(Aggregation::Ci, &numbers(&[7.0]));
        assert_eq!(ci, Triple::spread(7.0, 7.0, 7.0));
    }

    #[test]
    fn confidence_interval_brackets_mean() {
        let bucket = numbers(&[10.0, 12.0, 14.0]);
        let ci = single(Aggregation::Ci, &bucket);
        let low = ci.low.as_number().expect("low");
        let high = ci.high.as_number().expect("high");
        assert_eq!(ci.value, Value::Number(12.0));
        assert!((high - 12.0 - (12.0 - low)).abs() < 1e-9);
        assert!((high - 12.0 - 4.302_653 * 2.0 / 3f64.sqrt()).abs() < 1e-4);
        assert_eq!(single(Aggregation::CiMax, &bucket).value, ci.high);
    }

    #[test]
    fn coefficient_of_variation_guards_zero_mean() {
        assert_eq!(single(Aggregation::Cv, &numbers(&[-1.0, 1.0])), Triple::number(0.0));
    }

    #[test]
    fn max_falls_back_to_text_order() {
        let bucket = vec![Value::text("10"), Value::text("9"), Value::text("beta")];
        assert_eq!(single(Aggregation::Max, &bucket).value, Value::text("beta"));
        assert_eq!(single(Aggregation::Min, &bucket).value, Value::text("10"));

        let numeric = vec![Value::text("10"), Value::text("9")];
        assert_eq!(single(Aggregation::Max, &numeric).value, Value::Number(10.0));
    }

    #[test]
    fn none_keeps_every_value_and_empty_buckets_vanish() {
        assert_eq!(Aggregation::None.apply(&numbers(&[2.0, 2.0])).len(), 2);
        assert!(Aggregation::Avg.apply(&[]).is_empty());
        assert!(Aggregation::Avg.apply(&[Value::text("n/a")]).is_empty());
        assert_eq!(Aggregation::Count.apply(&[Value::text("n/a")]).len(), 1);
    }
}
