//! coregenera: cross-study meta-analysis of case-control microbiome studies
//!
//! Takes a genera x studies table of signed p/q-values, where the magnitude
//! is the significance and the sign the direction of the effect, and finds:
//! - genera reproducibly associated with each disease
//! - core genera shifted in the same direction across several diseases
//! - core genera from Stouffer-combined p-values
//! - a permutation null for the number of core genera
//! - per-disease reproducibility metrics and pairwise study concordance
//!
//! The main components of this library are:
//! - `MetaAnalysis`: runs the full analysis
//! - `MetaConfig`: thresholds, weights, exclusions and null parameters
//! - `MetaResults`: everything produced by a run
//! - `io`: tab-separated input and output of the tables

mod calls;
mod concordance;
mod config;
mod cross;
mod error;
mod grouping;
pub mod io;
mod math;
mod matrix;
mod meta;
mod metrics;
mod permutation;
mod results;
mod signed;
mod stouffer;
mod study;
mod taxonomy;
mod within;

pub use calls::{Call, CallMatrix, Direction};
pub use concordance::{n_concordant, ConcordanceAnalysis, ConcordanceKind, ConcordanceRecord};
pub use config::{Comparison, MetaConfig, Threshold, TransformConfig, WeightConfig};
pub use cross::{
    disease_counts, CoreCounts, CoreLabel, CoreLabels, CrossDiseaseAggregator, DirectionCounts,
};
pub use error::{MetaError, Result};
pub use grouping::DiseaseGrouping;
pub use matrix::{SignedMatrix, SignedSeries};
pub use meta::MetaAnalysis;
pub use metrics::{append_classifier_results, Metric, MetricRecord, ReproducibilityMetrics};
pub use permutation::{
    replicate_rng, shuffle_calls, EmpiricalPvalues, NullDistribution, NullRow, NullSample,
    PermutationNullEstimator,
};
pub use results::MetaResults;
pub use signed::{
    signed_value, EffectMeasure, GenusTest, SignedEffectConverter, ZERO_PVALUE_EPSILON,
};
pub use stouffer::{StoufferCombiner, StoufferRecord, StoufferResults};
pub use study::{Disease, StudyAliases, StudyId, StudyInfo, StudyRecord, StudyTable};
pub use taxonomy::Lineage;
pub use within::{within_disease, DiseaseLabels};
