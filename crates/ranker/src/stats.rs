//! Small numeric helpers shared by feature aggregation and scoring.

/// Epsilon added to normalization denominators so constant series map
/// to 0 instead of dividing by zero.
pub const NORM_EPSILON: f64 = 1e-9;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). Fewer than two values yield 0.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Linear-interpolation percentile over an ascending-sorted slice.
/// `q` is a fraction in [0, 1]; an empty slice yields 0.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Winsorized min-max normalization to [0, 1].
///
/// Values are clipped to the [p1, p99] band before scaling, so a single
/// outlier cannot flatten the rest of the cohort. A constant series
/// normalizes to all zeros.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let lo = percentile(&sorted, 0.01);
    let hi = percentile(&sorted, 0.99);
    values
        .iter()
        .map(|&v| (v.clamp(lo, hi) - lo) / (hi - lo + NORM_EPSILON))
        .collect()
}
