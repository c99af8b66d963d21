use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::study::{Disease, StudyId, StudyTable};

/// Returns the positions in `haystack` whose study belongs to `disease`
pub fn index_mask(disease: &Disease, haystack: &[Disease]) -> Vec<usize> {
    haystack
        .iter()
        .enumerate()
        .filter(|(_, target)| *target == disease)
        .map(|(i, _)| i)
        .collect()
}

pub fn select_indices<T: Copy>(indices: &[usize], data: &[T]) -> Vec<T> {
    indices.iter().map(|i| data[*i]).collect()
}

/// Study columns of a matrix grouped by disease
///
/// Resolved once per matrix against the study table; every aggregator works
/// from these column indices instead of the study identifiers.
#[derive(Debug, Clone)]
pub struct DiseaseGrouping {
    groups: Vec<(Disease, Vec<usize>)>,
}

impl DiseaseGrouping {
    /// Groups the `studies` columns by disease, leaving out `excluded` diseases
    ///
    /// Fails if any study is absent from the table.
    pub fn new(studies: &[StudyId], table: &StudyTable, excluded: &[Disease]) -> Result<Self> {
        let column_diseases = studies
            .iter()
            .map(|study| table.disease_of(study.as_str()).cloned())
            .collect::<Result<Vec<_>>>()?;

        let mut groups = BTreeMap::new();
        for disease in &column_diseases {
            if excluded.contains(disease) || groups.contains_key(disease) {
                continue;
            }
            groups.insert(disease.clone(), index_mask(disease, &column_diseases));
        }
        for (disease, columns) in &groups {
            debug!("Disease {} has {} studies", disease, columns.len());
        }
        Ok(Self {
            groups: groups.into_iter().collect(),
        })
    }

    pub fn diseases(&self) -> impl Iterator<Item = &Disease> {
        self.groups.iter().map(|(disease, _)| disease)
    }

    pub fn groups(&self) -> &[(Disease, Vec<usize>)] {
        &self.groups
    }

    /// Column indices of one disease; empty when the disease has no studies
    pub fn columns_of(&self, disease: &Disease) -> &[usize] {
        self.groups
            .iter()
            .find(|(d, _)| d == disease)
            .map(|(_, columns)| columns.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetaError;
    use crate::study::StudyAliases;

    fn studies(ids: &[&str]) -> Vec<StudyId> {
        ids.iter().map(|id| StudyId::new(*id)).collect()
    }

    #[test]
    fn test_grouping() {
        let ids = ["crc_a", "ibd_a", "crc_b", "cdi_a"];
        let table = StudyTable::from_ids(ids, &StudyAliases::none()).unwrap();
        let grouping = DiseaseGrouping::new(&studies(&ids), &table, &[]).unwrap();
        assert_eq!(grouping.len(), 3);
        assert_eq!(grouping.columns_of(&Disease::new("crc")), &[0, 2]);
        assert_eq!(grouping.columns_of(&Disease::new("cdi")), &[3]);
        assert!(grouping.columns_of(&Disease::new("hiv")).is_empty());
    }

    #[test]
    fn test_grouping_excludes() {
        let ids = ["crc_a", "cdi_a", "cdi_b"];
        let table = StudyTable::from_ids(ids, &StudyAliases::none()).unwrap();
        let grouping =
            DiseaseGrouping::new(&studies(&ids), &table, &[Disease::new("cdi")]).unwrap();
        assert_eq!(grouping.diseases().collect::<Vec<_>>(), vec![&Disease::new("crc")]);
    }

    #[test]
    fn test_grouping_unknown_study() {
        let table = StudyTable::from_ids(["crc_a"], &StudyAliases::none()).unwrap();
        let err = DiseaseGrouping::new(&studies(&["crc_a", "ob_b"]), &table, &[]).unwrap_err();
        assert!(matches!(err, MetaError::UnknownStudy(id) if id == "ob_b"));
    }

    #[test]
    fn test_select_indices() {
        assert_eq!(select_indices(&[2, 0], &[1.0, 2.0, 3.0]), vec![3.0, 1.0]);
    }
}
