use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::calls::{CallMatrix, Direction};
use crate::grouping::DiseaseGrouping;
use crate::study::Disease;
use crate::taxonomy::Lineage;

/// Net number of same-direction significant studies needed to be reproducible
pub const MIN_REPRODUCIBLE_STUDIES: i32 = 2;

/// Genera reproducibly significant within each disease
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiseaseLabels {
    labels: BTreeMap<Disease, BTreeMap<Lineage, Direction>>,
    normalized: BTreeMap<Disease, f64>,
}

impl DiseaseLabels {
    /// Label of a genus within a disease; `None` if it is not reproducible there
    pub fn get(&self, genus: &str, disease: &str) -> Option<Direction> {
        self.labels.get(disease)?.get(genus).copied()
    }

    /// Reproducible genera of one disease
    pub fn disease(&self, disease: &str) -> Option<&BTreeMap<Lineage, Direction>> {
        self.labels.get(disease)
    }

    pub fn diseases(&self) -> impl Iterator<Item = &Disease> {
        self.labels.keys()
    }

    /// Reproducible count over the number of genera significant in the disease
    pub fn normalized(&self, disease: &str) -> Option<f64> {
        self.normalized.get(disease).copied()
    }

    /// Iterates over `(genus, disease, direction)` for every reproducible pair
    pub fn iter(&self) -> impl Iterator<Item = (&Lineage, &Disease, Direction)> {
        self.labels.iter().flat_map(|(disease, genera)| {
            genera
                .iter()
                .map(move |(genus, direction)| (genus, disease, *direction))
        })
    }
}

/// Signed sum of the calls of one genus over the given study columns
pub(crate) fn signed_sum(calls: &CallMatrix, genus: usize, columns: &[usize]) -> i32 {
    columns.iter().map(|s| calls.sign(genus, *s)).sum()
}

/// Finds, for each disease, the genera significant in the same direction in
/// at least two of its studies
///
/// Opposite-direction calls cancel: a genus health-associated in two studies
/// and disease-associated in one has a net sum of one and is not reproducible.
pub fn within_disease(
    calls: &CallMatrix,
    genera: &[Lineage],
    grouping: &DiseaseGrouping,
) -> DiseaseLabels {
    let mut result = DiseaseLabels::default();
    for (disease, columns) in grouping.groups() {
        let mut reproducible = BTreeMap::new();
        let mut n_significant = 0usize;
        for (g, genus) in genera.iter().enumerate() {
            let any_significant = columns
                .iter()
                .any(|s| calls.get(g, *s).is_some_and(|call| call.is_significant()));
            if !any_significant {
                continue;
            }
            n_significant += 1;

            if has_both_directions(calls, g, columns) {
                warn!(
                    "{} is significant in both directions within {}",
                    genus.genus_name(),
                    disease
                );
            }
            let sum = signed_sum(calls, g, columns);
            if sum.abs() >= MIN_REPRODUCIBLE_STUDIES {
                if let Some(direction) = Direction::from_sum(sum) {
                    reproducible.insert(genus.clone(), direction);
                }
            }
        }

        let normalized = if n_significant == 0 {
            0.0
        } else {
            reproducible.len() as f64 / n_significant as f64
        };
        debug!(
            "{}: {} reproducible of {} significant genera",
            disease,
            reproducible.len(),
            n_significant
        );
        result.normalized.insert(disease.clone(), normalized);
        result.labels.insert(disease.clone(), reproducible);
    }
    result
}

fn has_both_directions(calls: &CallMatrix, genus: usize, columns: &[usize]) -> bool {
    let signs = columns.iter().map(|s| calls.sign(genus, *s));
    let (mut health, mut disease) = (0, 0);
    for sign in signs {
        match sign {
            -1 => health += 1,
            1 => disease += 1,
            _ => {}
        }
    }
    health >= MIN_REPRODUCIBLE_STUDIES && disease >= MIN_REPRODUCIBLE_STUDIES
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Threshold;
    use crate::matrix::SignedMatrix;
    use crate::study::{StudyAliases, StudyId, StudyTable};
    use approx::assert_relative_eq;

    fn setup(
        studies: &[&str],
        columns: Vec<Vec<Option<f64>>>,
    ) -> (CallMatrix, Vec<Lineage>, DiseaseGrouping) {
        let n = columns[0].len();
        let genera = (0..n).map(|i| Lineage::new(format!("g__G{i}"))).collect::<Vec<_>>();
        let ids = studies.iter().map(|s| StudyId::new(*s)).collect::<Vec<_>>();
        let matrix = SignedMatrix::from_columns(genera.clone(), ids.clone(), columns).unwrap();
        let table = StudyTable::from_ids(studies.iter().copied(), &StudyAliases::none()).unwrap();
        let grouping = DiseaseGrouping::new(&ids, &table, &[]).unwrap();
        (CallMatrix::from_signed(&matrix, Threshold::default()), genera, grouping)
    }

    #[test]
    fn test_reproducible_in_three_studies() {
        let (calls, genera, grouping) = setup(
            &["crc_a", "crc_b", "crc_c", "ibd_a"],
            vec![
                vec![Some(0.01), Some(0.3)],
                vec![Some(0.01), Some(-0.01)],
                vec![Some(0.01), None],
                vec![Some(0.8), Some(-0.02)],
            ],
        );
        let labels = within_disease(&calls, &genera, &grouping);
        assert_eq!(labels.get("g__G0", "crc"), Some(Direction::Disease));
        assert_eq!(labels.get("g__G1", "crc"), None);
        assert_eq!(labels.get("g__G0", "ibd"), None);
        assert_relative_eq!(labels.normalized("crc").unwrap(), 0.5);
    }

    #[test]
    fn test_opposite_directions_cancel() {
        let (calls, genera, grouping) = setup(
            &["crc_a", "crc_b", "crc_c"],
            vec![vec![Some(-0.01)], vec![Some(-0.01)], vec![Some(0.01)]],
        );
        let labels = within_disease(&calls, &genera, &grouping);
        assert_eq!(labels.get("g__G0", "crc"), None);

        let (calls, genera, grouping) = setup(
            &["crc_a", "crc_b", "crc_c", "crc_d"],
            vec![vec![Some(-0.01)], vec![Some(-0.01)], vec![Some(0.01)], vec![Some(-0.04)]],
        );
        let labels = within_disease(&calls, &genera, &grouping);
        assert_eq!(labels.get("g__G0", "crc"), Some(Direction::Health));
    }

    #[test]
    fn test_order_independent() {
        let columns = vec![
            vec![Some(0.01), Some(-0.02), Some(0.9)],
            vec![Some(0.02), Some(-0.01), Some(0.01)],
            vec![None, Some(0.04), Some(0.01)],
        ];
        let (calls, genera, grouping) = setup(&["crc_a", "crc_b", "crc_c"], columns.clone());
        let forward = within_disease(&calls, &genera, &grouping);

        let reversed = columns.into_iter().rev().collect();
        let (calls, genera, grouping) = setup(&["crc_c", "crc_b", "crc_a"], reversed);
        let backward = within_disease(&calls, &genera, &grouping);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_nothing_reproducible() {
        let (calls, genera, grouping) = setup(&["ob_a", "ob_b"], vec![vec![Some(0.5)], vec![None]]);
        let labels = within_disease(&calls, &genera, &grouping);
        assert!(labels.disease("ob").unwrap().is_empty());
        assert_relative_eq!(labels.normalized("ob").unwrap(), 0.0);
        assert_eq!(labels.iter().count(), 0);
    }

    #[test]
    fn test_both_directions_on_reproducible_genus() {
        let (calls, genera, grouping) = setup(
            &["crc_a", "crc_b", "crc_c", "crc_d", "crc_e", "crc_f"],
            vec![
                vec![Some(-0.01)],
                vec![Some(-0.01)],
                vec![Some(-0.02)],
                vec![Some(-0.03)],
                vec![Some(0.01)],
                vec![Some(0.02)],
            ],
        );
        let columns = (0..6).collect::<Vec<_>>();
        assert!(has_both_directions(&calls, 0, &columns));
        assert!(!has_both_directions(&calls, 0, &columns[..5]));

        let labels = within_disease(&calls, &genera, &grouping);
        assert_eq!(labels.get("g__G0", "crc"), Some(Direction::Health));
    }
}
