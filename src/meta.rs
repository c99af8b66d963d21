use tracing::info;

use crate::calls::CallMatrix;
use crate::config::MetaConfig;
use crate::cross::CrossDiseaseAggregator;
use crate::error::{MetaError, Result};
use crate::grouping::DiseaseGrouping;
use crate::matrix::SignedMatrix;
use crate::metrics::ReproducibilityMetrics;
use crate::permutation::PermutationNullEstimator;
use crate::results::MetaResults;
use crate::stouffer::StoufferCombiner;
use crate::study::StudyTable;
use crate::within::within_disease;

/// Cross-study meta-analysis of signed p/q-values
pub struct MetaAnalysis<'a> {
    matrix: SignedMatrix,
    studies: &'a StudyTable,
    config: MetaConfig,
}

impl<'a> MetaAnalysis<'a> {
    /// Prepares a run; the configured excluded studies are dropped here
    pub fn new(matrix: &SignedMatrix, studies: &'a StudyTable, config: MetaConfig) -> Self {
        let matrix = matrix.without_studies(&config.excluded_studies);
        Self {
            matrix,
            studies,
            config,
        }
    }

    /// Run the meta-analysis
    ///
    /// 1. Threshold the signed values into directional calls
    /// 2. Find the genera reproducible within each disease
    /// 3. Find the count-based core genera across diseases
    /// 4. Combine p-values with Stouffer's method
    /// 5. Build the permutation null for the core counts
    /// 6. Compute the reproducibility metrics
    pub fn run(&self) -> Result<MetaResults> {
        self.validate()?;
        let config = &self.config;
        let genera = self.matrix.genera();

        let calls = CallMatrix::from_signed(&self.matrix, config.threshold);
        info!(
            "{} genera over {} studies, {} significant calls",
            calls.n_genera(),
            calls.n_studies(),
            calls.count_significant()
        );

        let all_diseases = DiseaseGrouping::new(self.matrix.studies(), self.studies, &[])?;
        let core_diseases =
            DiseaseGrouping::new(self.matrix.studies(), self.studies, &config.excluded_diseases)?;

        let disease_labels = within_disease(&calls, genera, &all_diseases);

        let aggregator = CrossDiseaseAggregator::new(config.n_diseases, config.min_studies);
        let overall = aggregator.aggregate(&calls, genera, &core_diseases);
        let counts = overall.counts();
        info!(
            "Core genera: {} health, {} mixed, {} disease",
            counts.health, counts.mixed, counts.disease
        );

        let combiner = StoufferCombiner::new(config.weights);
        let stouffer = combiner.combine(&self.matrix, &core_diseases, self.studies)?;
        let stouffer_overall = stouffer.core_labels(config.stouffer_alpha);
        info!("Stouffer core genera: {}", stouffer_overall.len());

        let (null, empirical_pvalues) = if config.reps > 0 {
            let null = PermutationNullEstimator::new(aggregator, config.reps, config.seed)
                .estimate(&calls, &core_diseases);
            let pvalues = null.empirical_pvalues(counts);
            (Some(null), Some(pvalues))
        } else {
            (None, None)
        };

        let metrics = ReproducibilityMetrics::new(config.threshold, combiner, config.stouffer_alpha)
            .compute(&self.matrix, &all_diseases, self.studies, Some(&overall))?;

        Ok(MetaResults {
            disease_labels,
            overall,
            stouffer,
            stouffer_overall,
            null,
            empirical_pvalues,
            metrics,
        })
    }

    fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.n_diseases == 0 {
            return Err(MetaError::InvalidParameter("n_diseases must be at least 1".to_string()));
        }
        if config.min_studies == 0 {
            return Err(MetaError::InvalidParameter("min_studies must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&config.threshold.alpha) {
            return Err(MetaError::InvalidParameter(format!(
                "threshold {} is outside [0, 1]",
                config.threshold.alpha
            )));
        }
        Ok(())
    }
}
