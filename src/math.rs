use statrs::distribution::{ContinuousCDF, Normal};

pub fn arithmetic_mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Median of the values, `NaN` when empty
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn standard_normal() -> Normal {
    Normal::new(0.0, 1.0).expect("unit normal parameters are valid")
}

/// Splits a signed two-sided p-value into one-tailed health and disease p-values
///
/// A non-positive value is health-directed, so its health p-value is `|p|/2`
/// and the disease p-value is the complement.
pub fn one_tailed(signed: f64) -> (f64, f64) {
    let half = signed.abs() / 2.0;
    let health = if signed <= 0.0 { half } else { 1.0 - half };
    (health, 1.0 - health)
}

/// Inverse survival function of the standard normal, `Φ⁻¹(1 - p)`
///
/// Computed as `-Φ⁻¹(p)` so that `p` far below machine epsilon keeps a finite z-score.
fn z_score(normal: &Normal, p: f64) -> f64 {
    if p.is_nan() {
        f64::NAN
    } else if p <= 0.0 {
        f64::INFINITY
    } else if p >= 1.0 {
        f64::NEG_INFINITY
    } else {
        -normal.inverse_cdf(p)
    }
}

/// Combines one-tailed p-values with Stouffer's weighted Z method
///
/// Returns `(z, p)` where `z = Σ wᵢ Φ⁻¹(1 - pᵢ) / sqrt(Σ wᵢ²)` and `p` is the
/// upper tail of the standard normal at `z`. Degenerate inputs (empty,
/// mismatched lengths, `NaN`s or opposing infinite z-scores) return `NaN` for both.
pub fn weighted_stouffer(pvalues: &[f64], weights: &[f64]) -> (f64, f64) {
    if pvalues.is_empty() || pvalues.len() != weights.len() {
        return (f64::NAN, f64::NAN);
    }
    let normal = standard_normal();
    let numerator = pvalues
        .iter()
        .zip(weights.iter())
        .map(|(p, w)| w * z_score(&normal, *p))
        .sum::<f64>();
    let denominator = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
    let z = numerator / denominator;
    if z.is_nan() {
        return (f64::NAN, f64::NAN);
    }
    let p = if z == f64::INFINITY {
        0.0
    } else if z == f64::NEG_INFINITY {
        1.0
    } else {
        normal.sf(z)
    };
    (z, p)
}

/// Fraction of null draws at least as large as the observed value
///
/// Floored at one draw, so the result lies in `[1/R, 1]`; `NaN` for an empty null.
pub fn empirical_pvalue(null: &[usize], observed: usize) -> f64 {
    if null.is_empty() {
        return f64::NAN;
    }
    let extreme = null.iter().filter(|n| **n >= observed).count();
    extreme.max(1) as f64 / null.len() as f64
}

/// Ratio that is `NaN` rather than infinite or zero-over-zero when the denominator is zero
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        f64::NAN
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_arithmetic_mean() {
        let x = vec![1., 2., 3.];
        assert_relative_eq!(arithmetic_mean(&x), 2.0);
    }

    #[test]
    fn test_median() {
        assert_relative_eq!(median(&[3., 1., 2.]), 2.0);
        assert_relative_eq!(median(&[4., 1., 2., 3.]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_one_tailed() {
        let (h, d) = one_tailed(-0.02);
        assert_relative_eq!(h, 0.01);
        assert_relative_eq!(d, 0.99);

        let (h, d) = one_tailed(0.02);
        assert_relative_eq!(h, 0.99);
        assert_relative_eq!(d, 0.01);

        // zero has no direction and is treated as health-directed
        let (h, d) = one_tailed(0.0);
        assert_relative_eq!(h, 0.0);
        assert_relative_eq!(d, 1.0);
    }

    #[test]
    fn test_stouffer_single_study_is_identity() {
        let (z, p) = weighted_stouffer(&[0.05], &[3.0]);
        assert_relative_eq!(z, 1.6448536269514722, epsilon = 1e-8);
        assert_relative_eq!(p, 0.05, epsilon = 1e-10);
    }

    #[test]
    fn test_stouffer_two_equal_pvalues() {
        // z = 2 * 1.6449 / sqrt(2)
        let (z, p) = weighted_stouffer(&[0.05, 0.05], &[1.0, 1.0]);
        assert_relative_eq!(z, 2.326174307753217, epsilon = 1e-8);
        assert_relative_eq!(p, 0.010003, epsilon = 1e-5);
        assert!(p < 0.05);
    }

    #[test]
    fn test_stouffer_weights() {
        // the heavier study dominates
        let (_, p_heavy) = weighted_stouffer(&[0.01, 0.6], &[10.0, 1.0]);
        let (_, p_light) = weighted_stouffer(&[0.01, 0.6], &[1.0, 10.0]);
        assert!(p_heavy < 0.05);
        assert!(p_light > 0.05);
    }

    #[test]
    fn test_stouffer_tiny_pvalue_is_finite() {
        // the one-tailed p of a zero q-value signed with the 1e-20 stand-in
        let (z, p) = weighted_stouffer(&[5e-21], &[1.0]);
        assert!(z.is_finite());
        assert_relative_eq!(z, 9.336044849234058, epsilon = 1e-6);
        assert!(p > 0.0);

        let (z, _) = weighted_stouffer(&[1.0 - 5e-7], &[1.0]);
        assert_relative_eq!(z, -4.891638475714779, epsilon = 1e-4);
    }

    #[test]
    fn test_stouffer_degenerate() {
        let (z, p) = weighted_stouffer(&[0.0, 1.0], &[1.0, 1.0]);
        assert!(z.is_nan());
        assert!(p.is_nan());
        assert!(weighted_stouffer(&[], &[]).1.is_nan());
        assert!(weighted_stouffer(&[0.1, f64::NAN], &[1.0, 1.0]).1.is_nan());

        let (z, p) = weighted_stouffer(&[1.0, 0.5], &[1.0, 1.0]);
        assert_eq!(z, f64::NEG_INFINITY);
        assert_relative_eq!(p, 1.0);
    }

    #[test]
    fn test_empirical_pvalue() {
        let mut null = vec![0usize; 97];
        null.extend([5, 6, 9]);
        assert_relative_eq!(empirical_pvalue(&null, 5), 0.03);
        assert_relative_eq!(empirical_pvalue(&null, 0), 1.0);
        // nothing as extreme is reported as 1/R
        assert_relative_eq!(empirical_pvalue(&null, 50), 0.01);
        assert!(empirical_pvalue(&[], 1).is_nan());
    }

    #[test]
    fn test_ratio() {
        assert_relative_eq!(ratio(1, 4), 0.25);
        assert!(ratio(0, 0).is_nan());
    }
}
