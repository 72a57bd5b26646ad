//! Numerical helpers shared by the estimators and testers.
//!
//! The empirical p-value convention lives here so that every tester in the
//! crate reports significance the same way.

/// Additive guard used in z-score and standardization denominators.
pub const STD_EPSILON: f64 = 1e-12;

/// Safe comparison for floating point values (handles NaN)
pub fn float_total_cmp(a: &f64, b: &f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater, // push NaN to end
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (divides by `n`), `0.0` for an empty slice.
pub fn population_std(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let ss: f64 = data.iter().map(|&v| (v - m) * (v - m)).sum();
    (ss / data.len() as f64).sqrt()
}

/// Calculate percentile from sorted data using linear interpolation.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return sorted_data[0];
    }
    if p >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }

    let n = sorted_data.len();
    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Trapezoidal integral of `y` over the abscissae `x`.
///
/// Uses the shorter of the two slices; fewer than two points integrate to 0.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    let n = y.len().min(x.len());
    if n < 2 {
        return 0.0;
    }
    (1..n)
        .map(|i| 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]))
        .sum()
}

/// Right-tailed empirical p-value with Laplace smoothing.
///
/// `(count(null >= observed) + 1) / (n_null + 1)`, which keeps the result in
/// `[1/(n+1), 1]` and never returns an exact zero.
pub fn empirical_p_value(observed: f64, null_distribution: &[f64]) -> f64 {
    let n = null_distribution.len() as f64;
    let count = null_distribution
        .iter()
        .filter(|&&v| v >= observed)
        .count() as f64;
    (count + 1.0) / (n + 1.0)
}

/// `(observed - mean(null)) / (std(null) + ε)` with population std.
pub fn z_score(observed: f64, null_distribution: &[f64]) -> f64 {
    if null_distribution.is_empty() {
        return 0.0;
    }
    (observed - mean(null_distribution)) / (population_std(null_distribution) + STD_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_mean_and_population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx_eq!(mean(&v), 5.0);
        assert_approx_eq!(population_std(&v), 2.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std(&[]), 0.0);
    }

    #[test]
    fn test_linspace_endpoints() {
        let g = linspace(0.5, 1.0, 21);
        assert_eq!(g.len(), 21);
        assert_eq!(g[0], 0.5);
        assert_eq!(g[20], 1.0);
        assert_approx_eq!(g[10], 0.75);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(3.0, 4.0, 0).is_empty());
    }

    #[test]
    fn test_trapezoid_linear_function() {
        let x = linspace(0.0, 2.0, 11);
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * v).collect();
        assert_approx_eq!(trapezoid(&y, &x), 6.0, 1e-12);
        assert_eq!(trapezoid(&[1.0], &[0.0]), 0.0);
    }

    #[test]
    fn test_empirical_p_value_bounds() {
        let null: Vec<f64> = (0..200).map(|i| i as f64 / 200.0).collect();
        // Observed above everything: smallest attainable p-value.
        assert_approx_eq!(empirical_p_value(10.0, &null), 1.0 / 201.0);
        // Observed below everything: p-value is exactly one.
        assert_approx_eq!(empirical_p_value(-1.0, &null), 1.0);
        // Ties count as at least as extreme.
        assert_approx_eq!(empirical_p_value(0.995, &null), 2.0 / 201.0);
    }

    #[test]
    fn test_z_score_degenerate_null() {
        let z = z_score(1.0, &[0.5, 0.5, 0.5]);
        assert!(z > 1e9);
        assert_eq!(z_score(1.0, &[]), 0.0);
        assert_approx_eq!(z_score(0.5, &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(percentile(&sorted, 0.5), 2.5);
        assert_eq!(percentile(&sorted, 1.5), 4.0);
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_float_total_cmp_pushes_nan_last() {
        let mut v = vec![3.0, f64::NAN, 1.0];
        v.sort_by(float_total_cmp);
        assert_eq!(v[0], 1.0);
        assert!(v[2].is_nan());
    }
}
