//! Numeric primitives backing the aggregation library.

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::{Data, Median, Statistics};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().mean())
}

/// Sample standard deviation; zero for a single value.
pub fn stdev(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(0.0),
        _ => Some(values.iter().std_dev()),
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(Data::new(values.to_vec()).median())
}

/// Upper 0.975 quantile of Student's t distribution.
pub fn t_critical_975(degrees_of_freedom: usize) -> Option<f64> {
    if degrees_of_freedom == 0 {
        return None;
    }

    let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom as f64).ok()?;
    Some(distribution.inverse_cdf(0.975))
}

/// Half-width of the 95% confidence interval of the mean; zero when fewer
/// than two samples are available.
pub fn confidence_half_width_95(values: &[f64]) -> f64 {
    let Some(critical) = t_critical_975(values.len().saturating_sub(1)) else {
        return 0.0;
    };
    let Some(deviation) = stdev(values) else {
        return 0.0;
    };

    critical * deviation / (values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdev_of_single_value_is_zero() {
        assert_eq!(stdev(&[42.0]), Some(0.0));
        assert_eq!(stdev(&[]), None);
        let deviation = stdev(&[10.0, 12.0, 14.0]).expect("three samples");
        assert!((deviation - 2.0).abs() < 1e-12);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn confidence_interval_uses_student_t() {
        let values = [10.0, 12.0, 14.0];
        let expected = 4.302_653 * 2.0 / 3.0_f64.sqrt();
        assert!((confidence_half_width_95(&values) - expected).abs() < 1e-4);
        assert_eq!(confidence_half_width_95(&[5.0]), 0.0);
    }

    #[test]
    fn critical_values_past_thirty_degrees_are_exact() {
        let critical = t_critical_975(31).expect("df 31 resolves");
        assert!((critical - 2.039_513).abs() < 1e-4);
        assert_eq!(t_critical_975(0), None);
    }

    #[test]
    fn large_samples_approach_normal_quantile() {
        let critical = t_critical_975(1000).expect("large df should resolve");
        assert!((critical - 1.959_964).abs() < 0.01);
    }
}
