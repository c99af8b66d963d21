//! Per-disease, per-dataset and per-genus summaries of the signed calls
//!
//! Every metric is emitted as a tidy record of `(value, label, metric,
//! disease)`, where the label is the disease, the dataset or the genus
//! depending on what the metric describes. Ratios with nothing to divide by
//! are `NaN` rather than zero, so that "no significant genera" is never
//! mistaken for "all significant genera are health-associated".

use std::fmt;

use derive_new::new;
use tracing::debug;

use crate::calls::{CallMatrix, Direction};
use crate::config::Threshold;
use crate::cross::CoreLabels;
use crate::error::Result;
use crate::grouping::DiseaseGrouping;
use crate::math::ratio;
use crate::matrix::SignedMatrix;
use crate::stouffer::StoufferCombiner;
use crate::study::{Disease, StudyId, StudyTable};
use crate::within::{signed_sum, MIN_REPRODUCIBLE_STUDIES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Genus-wise mean of +/-1 (significant) and +/-0.5 (not significant) scores
    RepScore,
    RepTwoStudies,
    RepTwoStudiesNorm,
    RepStouffer,
    RepStoufferNorm,
    NSig,
    /// Fraction of a dataset's significant genera that are disease-associated
    Balance,
    RepDataset,
    RepDatasetNorm,
    TotalOverlap,
    TotalNonoverlap,
    TotalSig,
    PercOverlap,
    PercNonoverlap,
    HealthOverlap,
    DiseaseOverlap,
    PercHealthOverlap,
    PercDiseaseOverlap,
    /// Classifier AUC, joined from outside
    Auc,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::RepScore => "rep_score",
            Metric::RepTwoStudies => "rep_twostudies",
            Metric::RepTwoStudiesNorm => "rep_twostudies_norm",
            Metric::RepStouffer => "rep_stouffer",
            Metric::RepStoufferNorm => "rep_stouffer_norm",
            Metric::NSig => "n_sig",
            Metric::Balance => "balance",
            Metric::RepDataset => "rep_dataset",
            Metric::RepDatasetNorm => "rep_dataset_norm",
            Metric::TotalOverlap => "total_overlap",
            Metric::TotalNonoverlap => "total_nonoverlap",
            Metric::TotalSig => "total_sig",
            Metric::PercOverlap => "perc_overlap",
            Metric::PercNonoverlap => "perc_nonoverlap",
            Metric::HealthOverlap => "health_overlap",
            Metric::DiseaseOverlap => "disease_overlap",
            Metric::PercHealthOverlap => "perc_health_overlap",
            Metric::PercDiseaseOverlap => "perc_disease_overlap",
            Metric::Auc => "auc",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, new)]
pub struct MetricRecord {
    pub value: f64,
    pub label: String,
    pub metric: Metric,
    pub disease: Disease,
}

/// Significant genera of one dataset, split by direction
struct DatasetCalls {
    health: Vec<usize>,
    disease: Vec<usize>,
}

impl DatasetCalls {
    fn new(calls: &CallMatrix, study: usize) -> Self {
        let (mut health, mut disease) = (Vec::new(), Vec::new());
        for (g, call) in calls.column(study).iter().enumerate() {
            match call.and_then(|c| c.direction()) {
                Some(Direction::Health) => health.push(g),
                Some(Direction::Disease) => disease.push(g),
                None => {}
            }
        }
        Self { health, disease }
    }

    fn n_sig(&self) -> usize {
        self.health.len() + self.disease.len()
    }

    fn all(&self) -> impl Iterator<Item = &usize> {
        self.health.iter().chain(self.disease.iter())
    }
}

/// Computes the reproducibility metrics of every disease
#[derive(Debug, Clone, Copy, new)]
pub struct ReproducibilityMetrics {
    threshold: Threshold,
    combiner: StoufferCombiner,
    /// Threshold on Stouffer-combined p-values, compared with `<`
    stouffer_alpha: f64,
}

impl Default for ReproducibilityMetrics {
    fn default() -> Self {
        Self::new(Threshold::default(), StoufferCombiner::default(), 0.05)
    }
}

impl ReproducibilityMetrics {
    /// Metrics of every disease in `grouping`
    ///
    /// Overlap metrics are only produced when core labels are given.
    /// Fails when a Stouffer weight needs a sample size the table lacks.
    pub fn compute(
        &self,
        matrix: &SignedMatrix,
        grouping: &DiseaseGrouping,
        table: &StudyTable,
        overall: Option<&CoreLabels>,
    ) -> Result<Vec<MetricRecord>> {
        let mut records = Vec::new();
        for (disease, columns) in grouping.groups() {
            debug!("Computing metrics for {}", disease);
            let sub = matrix
                .select_studies(columns)
                .retain_significant(self.threshold);
            self.disease_metrics(&sub, disease, table, &mut records)?;
            self.dataset_metrics(&sub, disease, overall, &mut records);
        }
        Ok(records)
    }

    /// Genus-wise scores and disease-wise reproducibility
    ///
    /// `sub` holds the studies of one disease and only genera significant in at least one of them.
    fn disease_metrics(
        &self,
        sub: &SignedMatrix,
        disease: &Disease,
        table: &StudyTable,
        records: &mut Vec<MetricRecord>,
    ) -> Result<()> {
        let calls = CallMatrix::from_signed(sub, self.threshold);
        let columns = (0..sub.n_studies()).collect::<Vec<_>>();
        let n_genera = sub.n_genera();

        for (g, genus) in sub.genera().iter().enumerate() {
            let score = columns
                .iter()
                .map(|s| match sub.get(g, *s) {
                    Some(value) if self.threshold.passes(value) => calls.sign(g, *s) as f64,
                    Some(value) if value != 0.0 && !value.is_nan() => 0.5 * value.signum(),
                    _ => 0.0,
                })
                .sum::<f64>();
            records.push(MetricRecord::new(
                score / columns.len() as f64,
                genus.to_string(),
                Metric::RepScore,
                disease.clone(),
            ));
        }

        let reproducible = (0..n_genera)
            .filter(|g| signed_sum(&calls, *g, &columns).abs() >= MIN_REPRODUCIBLE_STUDIES)
            .count();
        let n_stouffer = self
            .combiner
            .combine_columns(sub, &columns, table)?
            .n_significant(self.stouffer_alpha);

        // an empty disease reports zero, not NaN, for the normalized counts
        let normalize = |n: usize| if n_genera == 0 { 0.0 } else { n as f64 / n_genera as f64 };
        for (value, metric) in [
            (reproducible as f64, Metric::RepTwoStudies),
            (normalize(reproducible), Metric::RepTwoStudiesNorm),
            (n_stouffer as f64, Metric::RepStouffer),
            (normalize(n_stouffer), Metric::RepStoufferNorm),
        ] {
            records.push(MetricRecord::new(value, disease.to_string(), metric, disease.clone()));
        }
        Ok(())
    }

    fn dataset_metrics(
        &self,
        sub: &SignedMatrix,
        disease: &Disease,
        overall: Option<&CoreLabels>,
        records: &mut Vec<MetricRecord>,
    ) {
        let calls = CallMatrix::from_signed(sub, self.threshold);
        let columns = (0..sub.n_studies()).collect::<Vec<_>>();

        for (s, study) in sub.studies().iter().enumerate() {
            let dataset = DatasetCalls::new(&calls, s);
            let n_sig = dataset.n_sig();
            let mut push = |value: f64, metric: Metric| {
                records.push(MetricRecord::new(value, study.to_string(), metric, disease.clone()))
            };

            push(n_sig as f64, Metric::NSig);
            push(ratio(dataset.disease.len(), n_sig), Metric::Balance);

            let reproducible = dataset
                .all()
                .filter(|g| signed_sum(&calls, **g, &columns).abs() >= MIN_REPRODUCIBLE_STUDIES)
                .count();
            if n_sig == 0 {
                push(f64::NAN, Metric::RepDataset);
            } else {
                push(reproducible as f64, Metric::RepDataset);
            }
            push(ratio(reproducible, n_sig), Metric::RepDatasetNorm);

            if let Some(overall) = overall {
                for (value, metric) in overlap_metrics(sub, &dataset, overall) {
                    push(value, metric);
                }
            }
        }
    }
}

/// Overlap between a dataset's significant genera and the single-direction core genera
///
/// Mixed core genera never count as overlapping. All values are `NaN` when
/// the dataset has no significant genera.
fn overlap_metrics(
    sub: &SignedMatrix,
    dataset: &DatasetCalls,
    overall: &CoreLabels,
) -> Vec<(f64, Metric)> {
    let overlapping = |genera: &[usize], direction: Direction| {
        let core = overall.with_direction(direction).collect::<Vec<_>>();
        genera
            .iter()
            .filter(|g| core.contains(&&sub.genera()[**g]))
            .count()
    };
    let health_overlap = overlapping(&dataset.health, Direction::Health);
    let disease_overlap = overlapping(&dataset.disease, Direction::Disease);
    let total_sig = dataset.n_sig();
    let total_overlap = health_overlap + disease_overlap;

    if total_sig == 0 {
        return [
            Metric::TotalOverlap,
            Metric::TotalNonoverlap,
            Metric::TotalSig,
            Metric::PercOverlap,
            Metric::PercNonoverlap,
            Metric::HealthOverlap,
            Metric::DiseaseOverlap,
            Metric::PercHealthOverlap,
            Metric::PercDiseaseOverlap,
        ]
        .into_iter()
        .map(|metric| (f64::NAN, metric))
        .collect();
    }

    let perc_overlap = ratio(total_overlap, total_sig);
    vec![
        (total_overlap as f64, Metric::TotalOverlap),
        ((total_sig - total_overlap) as f64, Metric::TotalNonoverlap),
        (total_sig as f64, Metric::TotalSig),
        (perc_overlap, Metric::PercOverlap),
        (1.0 - perc_overlap, Metric::PercNonoverlap),
        (health_overlap as f64, Metric::HealthOverlap),
        (disease_overlap as f64, Metric::DiseaseOverlap),
        (ratio(health_overlap, dataset.health.len()), Metric::PercHealthOverlap),
        (ratio(disease_overlap, dataset.disease.len()), Metric::PercDiseaseOverlap),
    ]
}

/// Appends classifier AUCs as `auc` records labelled by dataset
///
/// Fails if a dataset is not in the study table.
pub fn append_classifier_results(
    records: &mut Vec<MetricRecord>,
    aucs: &[(StudyId, f64)],
    table: &StudyTable,
) -> Result<()> {
    for (study, auc) in aucs {
        let disease = table.disease_of(study.as_str())?;
        records.push(MetricRecord::new(*auc, study.to_string(), Metric::Auc, disease.clone()));
    }
    Ok(())
}
