//! Small numeric helpers shared across the aggregation stages.
//!
//! These reproduce exactly the statistics the downstream regression models
//! were fit against, so the definitions matter: linear-interpolation
//! percentiles, zero-padded top-k means, sample (not population) standard
//! deviation, and sign-preserving transforms for difference responses.

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Percentile with linear interpolation between order statistics:
/// rank = q/100 × (n − 1), result interpolated between the two surrounding
/// sorted values. Matches the conventional "linear" definition.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("counts are never NaN"));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Mean of the k largest values, padding with zeros when fewer than k exist.
/// The zero padding keeps short days comparable to full days instead of
/// inflating their top-k mean.
pub fn top_k_mean(values: &[f64], k: usize) -> Option<f64> {
    if values.is_empty() || k == 0 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).expect("counts are never NaN"));
    sorted.truncate(k);
    Some(sorted.iter().sum::<f64>() / k as f64)
}

/// Sample standard deviation (ddof = 1). Needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Most frequent value after rounding to the nearest `bin_width` multiple,
/// with halves rounding to even so a 1.25 gust bins to 1.0, not 1.5.
/// Ties resolve to the smallest bin so the result is deterministic.
pub fn modal_value(values: &[f64], bin_width: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut counts: std::collections::BTreeMap<i64, usize> = std::collections::BTreeMap::new();
    for &v in values {
        let bin = (v / bin_width).round_ties_even() as i64;
        *counts.entry(bin).or_insert(0) += 1;
    }
    // BTreeMap iterates keys ascending, so > keeps the smallest bin on ties.
    let (bin, _) = counts
        .into_iter()
        .fold(None::<(i64, usize)>, |best, (bin, n)| match best {
            Some((_, best_n)) if n <= best_n => best,
            _ => Some((bin, n)),
        })?;
    Some(bin as f64 * bin_width)
}

// ---------------------------------------------------------------------------
// Sign-preserving transforms
// ---------------------------------------------------------------------------

/// Cube root, which is naturally sign-preserving.
pub fn signed_cbrt(x: f64) -> f64 {
    x.cbrt()
}

/// sign(x) × ln(|x| + 1). Compresses large differences symmetrically while
/// keeping zero at zero.
pub fn signed_log1p(x: f64) -> f64 {
    x.signum() * (x.abs() + 1.0).ln()
}
