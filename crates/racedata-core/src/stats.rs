//! Small aggregates over already-parsed values. Empty input yields `None`, never NaN.

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let multiplier = 10.0_f64.powi(decimals);
    (value * multiplier).round() / multiplier
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation; needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[middle - 1] + sorted[middle]) / 2.0)
    } else {
        Some(sorted[middle])
    }
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().min_by(f64::total_cmp)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().max_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn std_dev_uses_sample_estimator() {
        // population std of [2,4,4,4,5,5,7,9] is 2.0; the sample estimator is sqrt(32/7)
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_close(sample_std_dev(&values).unwrap(), (32.0_f64 / 7.0).sqrt());
        assert_eq!(sample_std_dev(&[1.0]), None);
        assert_eq!(sample_std_dev(&[]), None);
    }

    #[test]
    fn median_of_odd_and_even_lengths() {
        assert_eq!(median(&[90.0, 91.0, 89.0, 130.0, 90.0]), Some(90.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_close(round_to(21.456, 2), 21.46);
        assert_close(round_to(-3.004, 2), -3.0);
    }

    #[test]
    fn extremes_and_mean() {
        let values = [3.0, 1.5, 2.5];
        assert_eq!(min(&values), Some(1.5));
        assert_eq!(max(&values), Some(3.0));
        assert_close(mean(&values).unwrap(), 7.0 / 3.0);
        assert_eq!(min(&[]), None);
        assert_eq!(mean(&[]), None);
    }
}
