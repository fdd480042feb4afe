//! Column statistics over present (non-missing) values.

use crate::models::{Metric, ObservationRow};

/// Present values of one metric, in row order.
pub fn column_values<R: ObservationRow>(rows: &[R], metric: Metric) -> Vec<f64> {
    rows.iter()
        .filter_map(|r| r.observation().value(metric))
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom.
fn std_with_ddof(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

/// Sample standard deviation (n - 1). `None` for fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    std_with_ddof(values, 1)
}

/// Population standard deviation (n).
pub fn population_std(values: &[f64]) -> Option<f64> {
    std_with_ddof(values, 0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Quantile with linear interpolation between order statistics at
/// position `(n - 1) * q`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let sorted = sorted(values);
    Some(quantile_sorted(&sorted, q))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// First and third quartiles.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    Some((quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75)))
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Most frequent value; ties resolve to the smallest value.
pub fn mode(values: &[f64]) -> Option<f64> {
    let sorted = sorted(values);
    let mut best: Option<(f64, usize)> = None;

    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == value {
            j += 1;
        }
        let count = j - i;
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
        i = j;
    }

    best.map(|(value, _)| value)
}

/// Pearson correlation over pairs where both values are present.
/// NaN when fewer than two pairs exist or either side has zero variance.
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(quantile(&values, 0.25).unwrap(), 1.75));
        assert!(approx(quantile(&values, 0.75).unwrap(), 3.25));
        assert!(approx(median(&values).unwrap(), 2.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_quartiles_ignore_input_order() {
        let (q1, q3) = quartiles(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert!(approx(q1, 2.0));
        assert!(approx(q3, 4.0));
    }

    #[test]
    fn test_standard_deviations() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(population_std(&values).unwrap(), 2.0));
        assert!(approx(sample_std(&values).unwrap(), (32.0f64 / 7.0).sqrt()));
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(population_std(&[1.0]), Some(0.0));
    }

    #[test]
    fn test_mode_prefers_smallest_on_tie() {
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(mode(&[5.0, 5.0, 2.0]), Some(5.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn test_pearson() {
        let perfect: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        assert!(approx(pearson(&perfect), 1.0));

        let inverse: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, -(i as f64))).collect();
        assert!(approx(pearson(&inverse), -1.0));

        let constant: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0)).collect();
        assert!(pearson(&constant).is_nan());
    }
}
