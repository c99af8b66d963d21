use std::collections::{BTreeMap, HashSet};

use derive_new::new;
use itertools::Itertools;
use tracing::debug;

use crate::config::Threshold;
use crate::error::{MetaError, Result};
use crate::study::{StudyAliases, StudyId};
use crate::taxonomy::Lineage;

/// Signed values of one study, keyed by genus
#[derive(Debug, Clone, new)]
pub struct SignedSeries {
    pub study: StudyId,
    pub values: Vec<(Lineage, f64)>,
}

/// Signed p/q-values of genera (rows) across studies (columns)
///
/// Each cell is `None` when the genus was not observed in the study. A
/// present cell may hold `NaN` when the per-study statistic was degenerate.
/// Storage is column-major so that a study's values can be taken as a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedMatrix {
    genera: Vec<Lineage>,
    studies: Vec<StudyId>,
    columns: Vec<Vec<Option<f64>>>,
}

impl SignedMatrix {
    pub fn from_columns(
        genera: Vec<Lineage>,
        studies: Vec<StudyId>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if let Some(genus) = genera.iter().duplicates().next() {
            return Err(MetaError::DuplicateGenus(genus.to_string()));
        }
        if let Some(study) = studies.iter().duplicates().next() {
            return Err(MetaError::DuplicateStudy(study.to_string()));
        }
        if columns.len() != studies.len() {
            return Err(MetaError::DimensionMismatch {
                context: "number of columns".to_string(),
                expected: studies.len(),
                actual: columns.len(),
            });
        }
        for (study, column) in studies.iter().zip(columns.iter()) {
            if column.len() != genera.len() {
                return Err(MetaError::DimensionMismatch {
                    context: format!("column {study}"),
                    expected: genera.len(),
                    actual: column.len(),
                });
            }
        }
        Ok(Self {
            genera,
            studies,
            columns,
        })
    }

    /// Joins per-study series into one matrix over the union of their genera
    ///
    /// Genera are sorted; a genus absent from a study is missing in that column.
    pub fn from_series(series: Vec<SignedSeries>) -> Result<Self> {
        let genera = series
            .iter()
            .flat_map(|s| s.values.iter().map(|(genus, _)| genus.clone()))
            .unique()
            .sorted()
            .collect::<Vec<_>>();
        let positions = genera
            .iter()
            .enumerate()
            .map(|(i, genus)| (genus.clone(), i))
            .collect::<BTreeMap<_, _>>();

        let mut studies = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for s in series {
            let mut column = vec![None; genera.len()];
            for (genus, value) in s.values {
                let slot = &mut column[positions[&genus]];
                if slot.is_some() {
                    return Err(MetaError::DuplicateGenus(format!("{genus} in {}", s.study)));
                }
                *slot = Some(value);
            }
            studies.push(s.study);
            columns.push(column);
        }
        Self::from_columns(genera, studies, columns)
    }

    pub fn genera(&self) -> &[Lineage] {
        &self.genera
    }

    pub fn studies(&self) -> &[StudyId] {
        &self.studies
    }

    pub fn columns(&self) -> &[Vec<Option<f64>>] {
        &self.columns
    }

    pub fn column(&self, study: usize) -> &[Option<f64>] {
        &self.columns[study]
    }

    pub fn n_genera(&self) -> usize {
        self.genera.len()
    }

    pub fn n_studies(&self) -> usize {
        self.studies.len()
    }

    pub fn get(&self, genus: usize, study: usize) -> Option<f64> {
        self.columns[study][genus]
    }

    pub fn study_index(&self, study: &str) -> Option<usize> {
        self.studies.iter().position(|s| s.as_str() == study)
    }

    pub fn genus_index(&self, genus: &str) -> Option<usize> {
        self.genera.iter().position(|g| g.as_str() == genus)
    }

    /// Renames historical study identifiers onto their canonical ids
    pub fn rename_studies(&self, aliases: &StudyAliases) -> Result<Self> {
        let studies = self
            .studies
            .iter()
            .map(|study| aliases.canonical(study.as_str()))
            .collect();
        Self::from_columns(self.genera.clone(), studies, self.columns.clone())
    }

    /// Keeps the study columns at `indices`, in that order
    pub fn select_studies(&self, indices: &[usize]) -> Self {
        Self {
            genera: self.genera.clone(),
            studies: indices.iter().map(|i| self.studies[*i].clone()).collect(),
            columns: indices.iter().map(|i| self.columns[*i].clone()).collect(),
        }
    }

    /// Drops the named studies; names not present are ignored
    pub fn without_studies(&self, excluded: &[StudyId]) -> Self {
        let excluded = excluded.iter().collect::<HashSet<_>>();
        let keep = (0..self.n_studies())
            .filter(|i| !excluded.contains(&self.studies[*i]))
            .collect::<Vec<_>>();
        self.select_studies(&keep)
    }

    /// Keeps only the genera significant in at least one study
    pub fn retain_significant(&self, threshold: Threshold) -> Self {
        let keep = (0..self.n_genera())
            .filter(|g| {
                self.columns
                    .iter()
                    .any(|column| column[*g].is_some_and(|v| threshold.call(v).is_significant()))
            })
            .collect::<Vec<_>>();
        debug!(
            "Keeping {} of {} genera significant in at least one study",
            keep.len(),
            self.n_genera()
        );
        Self {
            genera: keep.iter().map(|g| self.genera[*g].clone()).collect(),
            studies: self.studies.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| keep.iter().map(|g| column[*g]).collect())
                .collect(),
        }
    }
}
