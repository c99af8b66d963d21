//! Conversion of per-study test results into signed p/q-values
//!
//! The magnitude of a signed value is the test's p- or q-value and its sign
//! is the direction of the effect: positive when the genus is higher in
//! cases, negative when it is higher in controls.

use derive_new::new;
use tracing::debug;

use crate::config::TransformConfig;
use crate::error::{MetaError, Result};
use crate::math::{arithmetic_mean, median};
use crate::matrix::SignedSeries;
use crate::study::StudyId;
use crate::taxonomy::Lineage;

/// Stand-in for a p/q-value of exactly zero so that it can still carry a sign
pub const ZERO_PVALUE_EPSILON: f64 = 1e-20;

/// Signs a p/q-value by the direction of an effect
///
/// A value of exactly zero is replaced by [`ZERO_PVALUE_EPSILON`] first. An
/// effect of zero (a tie between groups) yields zero. `NaN` in either input
/// stays `NaN`.
pub fn signed_value(value: f64, effect: f64) -> f64 {
    if value.is_nan() || effect.is_nan() {
        return f64::NAN;
    }
    let value = if value == 0.0 { ZERO_PVALUE_EPSILON } else { value };
    if effect == 0.0 {
        0.0
    } else {
        value * effect.signum()
    }
}

/// Central tendency used to decide the effect direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectMeasure {
    #[default]
    Mean,
    Median,
}

impl EffectMeasure {
    /// Case minus control central tendency; `NaN` if either group is empty
    pub fn effect(&self, cases: &[f64], controls: &[f64]) -> f64 {
        if cases.is_empty() || controls.is_empty() {
            return f64::NAN;
        }
        match self {
            EffectMeasure::Mean => arithmetic_mean(cases) - arithmetic_mean(controls),
            EffectMeasure::Median => median(cases) - median(controls),
        }
    }
}

/// Univariate test result of one genus in one study
#[derive(Debug, Clone, new)]
pub struct GenusTest {
    pub genus: Lineage,
    /// Two-sided p-value
    pub pvalue: f64,
    /// Relative abundances in the case samples
    pub cases: Vec<f64>,
    /// Relative abundances in the control samples
    pub controls: Vec<f64>,
}

/// Converts one study's test results into a signed series
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedEffectConverter {
    pub measure: EffectMeasure,
    pub transform: TransformConfig,
}

impl SignedEffectConverter {
    pub fn new(measure: EffectMeasure, transform: TransformConfig) -> Self {
        Self { measure, transform }
    }

    /// Adjusts the study's p-values and signs them by effect direction
    ///
    /// Genera whose test or effect is degenerate are kept as `NaN`.
    pub fn convert(&self, study: StudyId, tests: Vec<GenusTest>) -> SignedSeries {
        let pvalues = tests.iter().map(|t| t.pvalue).collect::<Vec<_>>();
        let adjusted = self.transform.transform(&pvalues);
        let values = tests
            .into_iter()
            .zip(adjusted)
            .map(|(test, value)| {
                let effect = self.measure.effect(&test.cases, &test.controls);
                let signed = signed_value(value, effect);
                if signed.is_nan() {
                    debug!("Degenerate test for {} in {}", test.genus, study);
                }
                (test.genus, signed)
            })
            .collect();
        SignedSeries::new(study, values)
    }

    /// Signs precomputed values by precomputed effects
    pub fn convert_values(
        &self,
        study: StudyId,
        genera: Vec<Lineage>,
        pvalues: &[f64],
        effects: &[f64],
    ) -> Result<SignedSeries> {
        for (context, len) in [("p-values", pvalues.len()), ("effects", effects.len())] {
            if len != genera.len() {
                return Err(MetaError::DimensionMismatch {
                    context: format!("{context} of {study}"),
                    expected: genera.len(),
                    actual: len,
                });
            }
        }
        let adjusted = self.transform.transform(pvalues);
        let values = genera
            .into_iter()
            .zip(adjusted.iter().zip(effects.iter()))
            .map(|(genus, (value, effect))| (genus, signed_value(*value, *effect)))
            .collect();
        Ok(SignedSeries::new(study, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_signed_value_keeps_magnitude() {
        for p in [1e-5, 0.01, 0.5, 1.0] {
            assert_relative_eq!(signed_value(p, 2.5), p);
            assert_relative_eq!(signed_value(p, -0.1), -p);
        }
    }

    #[test]
    fn test_signed_value_zero_pvalue() {
        assert_relative_eq!(signed_value(0.0, 1.0), ZERO_PVALUE_EPSILON);
        assert_relative_eq!(signed_value(0.0, -1.0), -ZERO_PVALUE_EPSILON);
    }

    #[test]
    fn test_signed_value_tie() {
        assert_eq!(signed_value(0.01, 0.0), 0.0);
        assert_eq!(signed_value(0.0, 0.0), 0.0);
        assert!(signed_value(f64::NAN, 1.0).is_nan());
        assert!(signed_value(0.01, f64::NAN).is_nan());
    }

    #[test]
    fn test_effect_measures() {
        let cases = [0.0, 0.0, 0.9];
        let controls = [0.1, 0.1, 0.1];
        assert!(EffectMeasure::Mean.effect(&cases, &controls) > 0.0);
        assert!(EffectMeasure::Median.effect(&cases, &controls) < 0.0);
        assert!(EffectMeasure::Mean.effect(&[], &controls).is_nan());
    }

    #[test]
    fn test_convert_with_fdr() {
        let converter = SignedEffectConverter::new(EffectMeasure::Mean, TransformConfig::Fdr);
        let tests = vec![
            GenusTest::new(Lineage::new("g__A"), 0.01, vec![2.0, 3.0], vec![1.0, 1.0]),
            GenusTest::new(Lineage::new("g__B"), 0.02, vec![0.0, 0.0], vec![1.0, 1.0]),
            GenusTest::new(Lineage::new("g__C"), 0.5, vec![1.0], vec![]),
        ];
        let series = converter.convert(StudyId::new("crc_a"), tests);
        assert_relative_eq!(series.values[0].1, 0.03);
        assert_relative_eq!(series.values[1].1, -0.03);
        assert!(series.values[2].1.is_nan());
    }

    #[test]
    fn test_convert_values_length_mismatch() {
        let converter = SignedEffectConverter::default();
        let err = converter
            .convert_values(StudyId::new("crc_a"), vec![Lineage::new("g__A")], &[0.1, 0.2], &[1.0])
            .unwrap_err();
        assert!(matches!(err, MetaError::DimensionMismatch { .. }));
    }
}
