//! Score normalization helpers.

/// Min-max scale `scores` into `[0, 1]`.
///
/// A list whose scores are all equal (including a single score) maps every
/// member to `1.0`, so a low-variance retrieval channel is not zeroed out.
/// Non-finite inputs map to `0.0`; callers are expected to drop them first.
#[must_use]
pub fn min_max(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if !range.is_finite() || range <= 0.0 {
        return vec![1.0; scores.len()];
    }

    scores
        .iter()
        .map(|&score| unit((score - min) / range))
        .collect()
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
