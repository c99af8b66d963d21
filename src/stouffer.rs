use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::calls::Direction;
use crate::config::WeightConfig;
use crate::cross::{CoreLabel, CoreLabels};
use crate::error::Result;
use crate::grouping::{select_indices, DiseaseGrouping};
use crate::math::{one_tailed, weighted_stouffer};
use crate::matrix::SignedMatrix;
use crate::study::{StudyId, StudyTable};
use crate::taxonomy::Lineage;

/// Genera must be present in at least this many studies to be combined
pub const MIN_COMBINED_STUDIES: usize = 2;

/// Stouffer-combined significance of one genus in one direction
#[derive(Debug, Clone, PartialEq)]
pub struct StoufferRecord {
    pub genus: Lineage,
    pub direction: Direction,
    pub z: f64,
    /// One-sided combined p-value; `NaN` when the combination was degenerate
    pub combined_p: f64,
    pub studies: Vec<StudyId>,
}

impl StoufferRecord {
    pub fn num_studies(&self) -> usize {
        self.studies.len()
    }

    /// Contributing studies joined by commas
    pub fn studies_joined(&self) -> String {
        self.studies.iter().join(",")
    }

    pub fn is_significant(&self, alpha: f64) -> bool {
        self.combined_p < alpha
    }
}

/// Combines each genus's one-tailed p-values across studies
///
/// Studies are weighted by the configured scheme, by default `sqrt(n)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoufferCombiner {
    weights: WeightConfig,
}

impl StoufferCombiner {
    pub fn new(weights: WeightConfig) -> Self {
        Self { weights }
    }

    /// Combines over the studies of every disease in `grouping`
    ///
    /// Fails if a contributing study has no sample size and the weight scheme needs one.
    pub fn combine(
        &self,
        matrix: &SignedMatrix,
        grouping: &DiseaseGrouping,
        table: &StudyTable,
    ) -> Result<StoufferResults> {
        let columns = grouping
            .groups()
            .iter()
            .flat_map(|(_, columns)| columns.iter().copied())
            .sorted()
            .collect::<Vec<_>>();
        self.combine_columns(matrix, &columns, table)
    }

    /// Combines over an explicit set of study columns
    pub fn combine_columns(
        &self,
        matrix: &SignedMatrix,
        columns: &[usize],
        table: &StudyTable,
    ) -> Result<StoufferResults> {
        // only the combined columns need a weight, so excluded studies may lack a size
        let mut weights = vec![f64::NAN; matrix.n_studies()];
        for &s in columns {
            weights[s] = self.study_weight(&matrix.studies()[s], table)?;
        }

        let records = (0..matrix.n_genera())
            .into_par_iter()
            .flat_map_iter(|g| self.process_genus(matrix, g, columns, &weights))
            .collect::<Vec<_>>();

        debug!(
            "Combined {} genus/direction pairs over {} studies",
            records.len(),
            columns.len()
        );
        Ok(StoufferResults { records })
    }

    fn study_weight(&self, study: &StudyId, table: &StudyTable) -> Result<f64> {
        if self.weights.needs_sample_size() {
            table
                .sample_size(study.as_str())
                .map(|n| self.weights.build_weight(n))
        } else {
            Ok(1.0)
        }
    }

    /// Produces the health and disease records of one genus, if it is in enough studies
    fn process_genus(
        &self,
        matrix: &SignedMatrix,
        genus: usize,
        columns: &[usize],
        weights: &[f64],
    ) -> Vec<StoufferRecord> {
        let present = columns
            .iter()
            .copied()
            .filter(|s| matrix.get(genus, *s).is_some())
            .collect::<Vec<_>>();
        if present.len() < MIN_COMBINED_STUDIES {
            return Vec::new();
        }

        let (health, disease): (Vec<f64>, Vec<f64>) = present
            .iter()
            .map(|s| one_tailed(matrix.get(genus, *s).unwrap_or(f64::NAN)))
            .unzip();
        let weights = select_indices(&present, weights);
        let studies = present
            .iter()
            .map(|s| matrix.studies()[*s].clone())
            .collect::<Vec<_>>();

        [(Direction::Health, health), (Direction::Disease, disease)]
            .into_iter()
            .map(|(direction, pvalues)| {
                let (z, combined_p) = weighted_stouffer(&pvalues, &weights);
                if combined_p.is_nan() {
                    warn!(
                        "Degenerate Stouffer combination for {} ({})",
                        matrix.genera()[genus],
                        direction
                    );
                }
                StoufferRecord {
                    genus: matrix.genera()[genus].clone(),
                    direction,
                    z,
                    combined_p,
                    studies: studies.clone(),
                }
            })
            .collect()
    }
}

/// All combined records of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoufferResults {
    records: Vec<StoufferRecord>,
}

impl StoufferResults {
    pub fn records(&self) -> &[StoufferRecord] {
        &self.records
    }

    pub fn get(&self, genus: &str, direction: Direction) -> Option<&StoufferRecord> {
        self.records
            .iter()
            .find(|r| r.genus.as_str() == genus && r.direction == direction)
    }

    /// Number of genus/direction pairs with a combined p-value below `alpha`
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.records.iter().filter(|r| r.is_significant(alpha)).count()
    }

    /// Core labels from the combined p-values
    ///
    /// A genus significant in both directions is labelled mixed.
    pub fn core_labels(&self, alpha: f64) -> CoreLabels {
        let mut labels = CoreLabels::default();
        for (genus, records) in &self.records.iter().chunk_by(|r| &r.genus) {
            let (mut health, mut disease) = (0, 0);
            for record in records.filter(|r| r.is_significant(alpha)) {
                match record.direction {
                    Direction::Health => health += 1,
                    Direction::Disease => disease += 1,
                }
            }
            if let Some(label) = CoreLabel::classify(health, disease, 1) {
                if label == CoreLabel::Mixed {
                    warn!("{} is significant in both combined directions", genus);
                }
                labels.insert(genus.clone(), label);
            }
        }
        labels
    }
}
