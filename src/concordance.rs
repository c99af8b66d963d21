//! Agreement in effect direction between pairs of studies
//!
//! For every pair of diseases, including a disease paired with itself, and
//! every pair of distinct studies across them, counts the genera called in
//! the same direction by both studies. An expected distribution is built by
//! the same column-wise shuffle used for the core-genus null.

use std::fmt;

use derive_new::new;
use rayon::prelude::*;
use tracing::info;

use crate::calls::CallMatrix;
use crate::config::Threshold;
use crate::grouping::DiseaseGrouping;
use crate::matrix::SignedMatrix;
use crate::permutation::{replicate_rng, shuffle_calls};
use crate::study::{Disease, StudyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcordanceKind {
    Observed,
    Expected,
}

impl fmt::Display for ConcordanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcordanceKind::Observed => f.write_str("observed"),
            ConcordanceKind::Expected => f.write_str("expected"),
        }
    }
}

/// Concordance of one ordered study pair
#[derive(Debug, Clone, PartialEq, new)]
pub struct ConcordanceRecord {
    pub dis1: Disease,
    pub dis2: Disease,
    pub study1: StudyId,
    pub study2: StudyId,
    pub kind: ConcordanceKind,
    /// Repetition of the shuffle; `None` for observed records
    pub rep: Option<usize>,
    pub n_concord: usize,
}

/// Number of genera called significant in the same direction in both studies
///
/// Missing and non-significant calls never agree with anything.
pub fn n_concordant(calls: &CallMatrix, study1: usize, study2: usize) -> usize {
    calls
        .column(study1)
        .iter()
        .zip(calls.column(study2))
        .filter(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => a.is_significant() && a == b,
            _ => false,
        })
        .count()
}

/// Pairwise concordance between studies, observed and under shuffling
#[derive(Debug, Clone, Copy, new)]
pub struct ConcordanceAnalysis {
    /// Threshold for a call to count; `1.0` compares directions only
    threshold: Threshold,
    reps: usize,
    seed: u64,
}

impl Default for ConcordanceAnalysis {
    fn default() -> Self {
        Self::new(Threshold::new(1.0), 1000, 42)
    }
}

impl ConcordanceAnalysis {
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn run(&self, matrix: &SignedMatrix, grouping: &DiseaseGrouping) -> Vec<ConcordanceRecord> {
        let calls = CallMatrix::from_signed(matrix, self.threshold);
        let studies = matrix.studies();

        info!("Observed concordance");
        let mut records = pair_records(&calls, studies, grouping, ConcordanceKind::Observed, None);

        info!("Expected concordance over {} shuffles", self.reps);
        let expected = (0..self.reps)
            .into_par_iter()
            .flat_map_iter(|rep| {
                let shuffled = shuffle_calls(&calls, &mut replicate_rng(self.seed, rep));
                pair_records(&shuffled, studies, grouping, ConcordanceKind::Expected, Some(rep))
            })
            .collect::<Vec<_>>();
        records.extend(expected);
        records
    }
}

fn pair_records(
    calls: &CallMatrix,
    studies: &[StudyId],
    grouping: &DiseaseGrouping,
    kind: ConcordanceKind,
    rep: Option<usize>,
) -> Vec<ConcordanceRecord> {
    let groups = grouping.groups();
    let mut records = Vec::new();
    for (i, (dis1, columns1)) in groups.iter().enumerate() {
        for (dis2, columns2) in &groups[i..] {
            for s1 in columns1 {
                for s2 in columns2.iter().filter(|s2| *s2 != s1) {
                    records.push(ConcordanceRecord::new(
                        dis1.clone(),
                        dis2.clone(),
                        studies[*s1].clone(),
                        studies[*s2].clone(),
                        kind,
                        rep,
                        n_concordant(calls, *s1, *s2),
                    ));
                }
            }
        }
    }
    records
}
