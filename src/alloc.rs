//! Allocation helpers (probabilities, softmax).
//!
//! Turn sampled values over a subset of indices into a probability distribution in a
//! stable (reproducible) way.

/// Compute a stable softmax distribution over `(index, score)` pairs.
///
/// - `temperature` controls sharpness; non-finite or non-positive values fall back to `1.0`.
/// - Uses the standard max-trick for numerical stability.
/// - Non-finite scores get zero weight.
/// - Returns a distribution that sums to 1, or uniform if every weight degenerates
///   (empty if input is empty).
pub fn softmax_indexed(scores: &[(usize, f64)], temperature: f64) -> Vec<(usize, f64)> {
    if scores.is_empty() {
        return Vec::new();
    }
    let t = if temperature.is_finite() && temperature > 0.0 {
        temperature
    } else {
        1.0
    };

    let max_score = scores
        .iter()
        .map(|&(_, v)| v)
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let mut out: Vec<(usize, f64)> = Vec::with_capacity(scores.len());
    let mut denom = 0.0;
    for &(i, v) in scores {
        let x = ((v - max_score) / t).exp();
        let x = if x.is_finite() { x } else { 0.0 };
        denom += x;
        out.push((i, x));
    }
    if denom <= 0.0 || !denom.is_finite() {
        // Degenerate fallback: uniform.
        let n = scores.len() as f64;
        return scores.iter().map(|&(i, _)| (i, 1.0 / n)).collect();
    }

    for (_, w) in out.iter_mut() {
        *w /= denom;
        if !w.is_finite() {
            *w = 0.0;
        }
    }
    out
}
