use adjustp::{adjust, Procedure};
use bon::Builder;

use crate::calls::Call;
use crate::study::{Disease, StudyId};

/// How an absolute signed value is compared against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    #[default]
    LessOrEqual,
    Less,
}

/// Significance threshold applied to the magnitude of signed p/q-values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub alpha: f64,
    pub comparison: Comparison,
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl Threshold {
    /// A threshold that accepts values less than or equal to `alpha`
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            comparison: Comparison::LessOrEqual,
        }
    }

    /// A threshold that accepts values strictly less than `alpha`
    pub fn strict(alpha: f64) -> Self {
        Self {
            alpha,
            comparison: Comparison::Less,
        }
    }

    /// Whether `|value|` passes the threshold. `NaN` never does.
    pub fn passes(&self, value: f64) -> bool {
        let magnitude = value.abs();
        match self.comparison {
            Comparison::LessOrEqual => magnitude <= self.alpha,
            Comparison::Less => magnitude < self.alpha,
        }
    }

    /// Converts a signed value into a directional call
    pub fn call(&self, value: f64) -> Call {
        if self.passes(value) {
            Call::from_sign(value)
        } else {
            Call::NotSignificant
        }
    }
}

/// Weight given to a study in Stouffer's combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightConfig {
    /// `sqrt(n)` for a study with `n` samples
    #[default]
    SqrtSampleSize,
    SampleSize,
    Uniform,
}

impl WeightConfig {
    pub fn build_weight(&self, sample_size: u64) -> f64 {
        match self {
            WeightConfig::SqrtSampleSize => (sample_size as f64).sqrt(),
            WeightConfig::SampleSize => sample_size as f64,
            WeightConfig::Uniform => 1.0,
        }
    }

    /// Whether the scheme needs sample sizes from the study table
    pub fn needs_sample_size(&self) -> bool {
        !matches!(self, WeightConfig::Uniform)
    }
}

/// Multiple-testing adjustment applied to one study's raw p-values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformConfig {
    #[default]
    Identity,
    Fdr,
    Bonferroni,
}

impl TransformConfig {
    /// Adjusts the finite p-values, leaving `NaN` entries in place
    pub fn transform(&self, pvalues: &[f64]) -> Vec<f64> {
        let procedure = match self {
            TransformConfig::Identity => return pvalues.to_vec(),
            TransformConfig::Fdr => Procedure::BenjaminiHochberg,
            TransformConfig::Bonferroni => Procedure::Bonferroni,
        };
        let finite = pvalues
            .iter()
            .copied()
            .filter(|p| !p.is_nan())
            .collect::<Vec<_>>();
        let mut adjusted = adjust(&finite, procedure).into_iter();
        pvalues
            .iter()
            .map(|p| {
                if p.is_nan() {
                    f64::NAN
                } else {
                    adjusted.next().unwrap_or(f64::NAN)
                }
            })
            .collect()
    }
}

/// Parameters of a full meta-analysis run
#[derive(Debug, Clone, Builder)]
pub struct MetaConfig {
    /// Per-study significance threshold
    #[builder(default)]
    pub threshold: Threshold,
    /// Number of diseases a genus must be significant in to be core
    #[builder(default = 2)]
    pub n_diseases: usize,
    /// Number of significant studies needed for a disease to count towards core
    #[builder(default = 1)]
    pub min_studies: usize,
    /// Threshold on Stouffer-combined p-values, compared with `<`
    #[builder(default = 0.05)]
    pub stouffer_alpha: f64,
    #[builder(default)]
    pub weights: WeightConfig,
    /// Diseases left out of the cross-disease aggregation
    #[builder(default)]
    pub excluded_diseases: Vec<Disease>,
    /// Studies left out of every aggregation, e.g. those without healthy controls
    #[builder(default)]
    pub excluded_studies: Vec<StudyId>,
    /// Number of label permutations used to build the null; zero skips it
    #[builder(default = 1000)]
    pub reps: usize,
    #[builder(default = 42)]
    pub seed: u64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_threshold_inclusive() {
        let threshold = Threshold::new(0.05);
        assert!(threshold.passes(0.05));
        assert!(threshold.passes(-0.05));
        assert!(!threshold.passes(0.051));
        assert!(!threshold.passes(f64::NAN));
    }

    #[test]
    fn test_threshold_strict() {
        let threshold = Threshold::strict(0.05);
        assert!(!threshold.passes(0.05));
        assert!(threshold.passes(-0.049));
    }

    #[test]
    fn test_threshold_call() {
        let threshold = Threshold::default();
        assert_eq!(threshold.call(0.01), Call::Disease);
        assert_eq!(threshold.call(-0.01), Call::Health);
        assert_eq!(threshold.call(0.2), Call::NotSignificant);
        assert_eq!(threshold.call(0.0), Call::NotSignificant);
        assert_eq!(threshold.call(f64::NAN), Call::NotSignificant);
    }

    #[test]
    fn test_build_weight() {
        assert_relative_eq!(WeightConfig::SqrtSampleSize.build_weight(16), 4.0);
        assert_relative_eq!(WeightConfig::SampleSize.build_weight(16), 16.0);
        assert_relative_eq!(WeightConfig::Uniform.build_weight(16), 1.0);
    }

    #[test]
    fn test_transform_keeps_nan_positions() {
        let pvalues = vec![0.01, f64::NAN, 0.02];
        let adjusted = TransformConfig::Bonferroni.transform(&pvalues);
        assert_relative_eq!(adjusted[0], 0.02);
        assert!(adjusted[1].is_nan());
        assert_relative_eq!(adjusted[2], 0.04);
    }

    #[test]
    fn test_meta_config_defaults() {
        let config = MetaConfig::default();
        assert_eq!(config.n_diseases, 2);
        assert_eq!(config.min_studies, 1);
        assert_eq!(config.reps, 1000);
        assert_eq!(config.threshold, Threshold::new(0.05));
        assert!(config.excluded_diseases.is_empty());

        let config = MetaConfig::builder().n_diseases(3).reps(10).build();
        assert_eq!(config.n_diseases, 3);
        assert_eq!(config.reps, 10);
    }
}
