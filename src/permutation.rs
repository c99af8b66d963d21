//! Empirical null for the number of core genera
//!
//! Each repetition shuffles the present entries of every study's column of
//! calls independently, keeping missing cells where they are, and recounts the
//! core genera. This keeps each study's rate of significant calls and its
//! missingness while breaking any agreement between studies.

use derive_new::new;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::calls::CallMatrix;
use crate::cross::{CoreCounts, CoreLabel, CrossDiseaseAggregator};
use crate::grouping::DiseaseGrouping;
use crate::math::empirical_pvalue;

/// Random stream of one repetition
///
/// Every repetition draws from its own ChaCha stream of the same seed, so
/// results do not depend on how repetitions are scheduled across threads.
pub fn replicate_rng(seed: u64, rep: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(rep as u64);
    rng
}

/// Shuffles the present entries of a column, leaving missing cells in place
pub fn shuffle_column<T: Copy, R: Rng + ?Sized>(
    column: &[Option<T>],
    rng: &mut R,
) -> Vec<Option<T>> {
    let mut present = column.iter().flatten().copied().collect::<Vec<_>>();
    present.shuffle(rng);
    let mut present = present.into_iter();
    column
        .iter()
        .map(|cell| cell.and_then(|_| present.next()))
        .collect()
}

/// Shuffles every column of the matrix independently
pub fn shuffle_calls<R: Rng + ?Sized>(calls: &CallMatrix, rng: &mut R) -> CallMatrix {
    let columns = calls
        .columns()
        .iter()
        .map(|column| shuffle_column(column, rng))
        .collect();
    CallMatrix::from_columns(calls.n_genera(), columns)
}

/// A shuffled copy of the calls for one repetition
#[derive(new)]
struct Replicate {
    /// Index of this repetition
    rep: usize,
    /// Shuffled calls
    calls: CallMatrix,
}

impl Replicate {
    fn into_sample(
        self,
        aggregator: &CrossDiseaseAggregator,
        grouping: &DiseaseGrouping,
    ) -> NullSample {
        NullSample::new(self.rep, aggregator.count(&self.calls, grouping))
    }
}

/// Core genus counts of one repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct NullSample {
    pub rep: usize,
    pub counts: CoreCounts,
}

/// One `(repetition, category)` entry of the null table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, new)]
pub struct NullRow {
    pub rep: usize,
    #[serde(rename = "type")]
    pub category: String,
    pub n: usize,
}

/// Empirical p-value of the observed count in each category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalPvalues {
    pub health: f64,
    pub mixed: f64,
    pub disease: f64,
}

impl EmpiricalPvalues {
    pub fn get(&self, label: CoreLabel) -> f64 {
        match label {
            CoreLabel::Health => self.health,
            CoreLabel::Mixed => self.mixed,
            CoreLabel::Disease => self.disease,
        }
    }
}

/// Null distribution of core counts, one sample per repetition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullDistribution {
    samples: Vec<NullSample>,
}

impl NullDistribution {
    pub fn new(mut samples: Vec<NullSample>) -> Self {
        samples.sort_unstable_by_key(|s| s.rep);
        Self { samples }
    }

    pub fn samples(&self) -> &[NullSample] {
        &self.samples
    }

    pub fn reps(&self) -> usize {
        self.samples.len()
    }

    /// Null counts of a single category
    pub fn counts(&self, label: CoreLabel) -> Vec<usize> {
        self.samples.iter().map(|s| s.counts.get(label)).collect()
    }

    /// Fraction of repetitions with at least `observed` genera in `label`
    pub fn empirical_pvalue(&self, label: CoreLabel, observed: usize) -> f64 {
        empirical_pvalue(&self.counts(label), observed)
    }

    pub fn empirical_pvalues(&self, observed: CoreCounts) -> EmpiricalPvalues {
        EmpiricalPvalues {
            health: self.empirical_pvalue(CoreLabel::Health, observed.health),
            mixed: self.empirical_pvalue(CoreLabel::Mixed, observed.mixed),
            disease: self.empirical_pvalue(CoreLabel::Disease, observed.disease),
        }
    }

    /// Tidy rows; a category with no genera in a repetition is recorded as zero
    pub fn rows(&self) -> Vec<NullRow> {
        self.samples
            .iter()
            .flat_map(|sample| {
                CoreLabel::ALL.into_iter().map(move |label| {
                    NullRow::new(sample.rep, label.to_string(), sample.counts.get(label))
                })
            })
            .collect()
    }
}

/// Builds the permutation null for [`CrossDiseaseAggregator`]
#[derive(Debug, Clone, Copy, new)]
pub struct PermutationNullEstimator {
    aggregator: CrossDiseaseAggregator,
    reps: usize,
    seed: u64,
}

impl PermutationNullEstimator {
    pub fn estimate(&self, calls: &CallMatrix, grouping: &DiseaseGrouping) -> NullDistribution {
        info!("Building permutation null with {} repetitions", self.reps);
        let samples = (0..self.reps)
            .into_par_iter()
            .map(|rep| {
                let mut rng = replicate_rng(self.seed, rep);
                Replicate::new(rep, shuffle_calls(calls, &mut rng))
            })
            .map(|replicate| replicate.into_sample(&self.aggregator, grouping))
            .collect::<Vec<_>>();
        NullDistribution::new(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::Call;
    use crate::config::Threshold;
    use crate::matrix::SignedMatrix;
    use crate::study::{StudyAliases, StudyId, StudyTable};
    use crate::taxonomy::Lineage;
    use approx::assert_relative_eq;

    fn setup() -> (CallMatrix, DiseaseGrouping) {
        let ids = ["crc_a", "crc_b", "ibd_a", "ibd_b", "cdi_a"];
        let genera = (0..6).map(|i| Lineage::new(format!("g__G{i}"))).collect::<Vec<_>>();
        let studies = ids.iter().map(|s| StudyId::new(*s)).collect::<Vec<_>>();
        let columns = vec![
            vec![Some(0.01), Some(-0.01), None, Some(0.4), Some(0.02), Some(0.9)],
            vec![Some(0.03), Some(-0.02), Some(0.7), None, Some(0.5), Some(0.01)],
            vec![Some(0.01), Some(-0.04), Some(0.2), Some(0.01), None, Some(0.6)],
            vec![None, Some(0.3), Some(-0.01), Some(0.01), Some(0.2), Some(0.1)],
            vec![Some(0.02), Some(-0.01), Some(0.5), None, None, Some(0.03)],
        ];
        let matrix = SignedMatrix::from_columns(genera, studies.clone(), columns).unwrap();
        let table = StudyTable::from_ids(ids, &StudyAliases::none()).unwrap();
        let grouping = DiseaseGrouping::new(&studies, &table, &[]).unwrap();
        (CallMatrix::from_signed(&matrix, Threshold::default()), grouping)
    }

    #[test]
    fn test_shuffle_column_preserves_missingness() {
        let column = vec![Some(1), None, Some(2), Some(3), None, Some(4)];
        let mut rng = replicate_rng(7, 0);
        for _ in 0..20 {
            let shuffled = shuffle_column(&column, &mut rng);
            let missing = shuffled.iter().map(Option::is_none).collect::<Vec<_>>();
            assert_eq!(missing, vec![false, true, false, false, true, false]);
            let mut values = shuffled.iter().flatten().copied().collect::<Vec<_>>();
            values.sort_unstable();
            assert_eq!(values, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_shuffle_preserves_marginals() {
        let (calls, _) = setup();
        let shuffled = shuffle_calls(&calls, &mut replicate_rng(1, 3));
        for s in 0..calls.n_studies() {
            let count = |m: &CallMatrix, call: Call| {
                m.column(s).iter().filter(|c| **c == Some(call)).count()
            };
            for call in [Call::Health, Call::NotSignificant, Call::Disease] {
                assert_eq!(count(&calls, call), count(&shuffled, call));
            }
        }
    }

    #[test]
    fn test_estimate_is_reproducible() {
        let (calls, grouping) = setup();
        let estimator = PermutationNullEstimator::new(CrossDiseaseAggregator::default(), 50, 42);
        let first = estimator.estimate(&calls, &grouping);
        let second = estimator.estimate(&calls, &grouping);
        assert_eq!(first, second);
        assert_eq!(first.reps(), 50);
        assert_eq!(first.rows().len(), 150);
    }

    #[test]
    fn test_empirical_pvalues_in_bounds() {
        let (calls, grouping) = setup();
        let aggregator = CrossDiseaseAggregator::default();
        let observed = aggregator.count(&calls, &grouping);
        let null = PermutationNullEstimator::new(aggregator, 40, 3).estimate(&calls, &grouping);
        let pvalues = null.empirical_pvalues(observed);
        for label in CoreLabel::ALL {
            let p = pvalues.get(label);
            assert!((1.0 / 40.0..=1.0).contains(&p), "{label}: {p}");
        }
    }

    #[test]
    fn test_empirical_pvalue_from_samples() {
        let samples = (0..100)
            .map(|rep| {
                let disease = if rep < 3 { 5 + rep } else { rep % 4 };
                NullSample::new(rep, CoreCounts::new(0, 0, disease))
            })
            .collect();
        let null = NullDistribution::new(samples);
        assert_relative_eq!(null.empirical_pvalue(CoreLabel::Disease, 5), 0.03);
        assert_relative_eq!(null.empirical_pvalue(CoreLabel::Health, 0), 1.0);
    }

    #[test]
    fn test_rows_record_zero_counts() {
        let null = NullDistribution::new(vec![NullSample::new(0, CoreCounts::new(0, 0, 2))]);
        let rows = null.rows();
        assert_eq!(rows[0], NullRow::new(0, "health".to_string(), 0));
        assert_eq!(rows[1], NullRow::new(0, "mixed".to_string(), 0));
        assert_eq!(rows[2], NullRow::new(0, "disease".to_string(), 2));
    }
}
