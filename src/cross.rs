use std::collections::BTreeMap;
use std::fmt;

use derive_new::new;
use serde::Serialize;
use tracing::debug;

use crate::calls::{CallMatrix, Direction};
use crate::grouping::DiseaseGrouping;
use crate::taxonomy::Lineage;

/// Cross-disease status of a core genus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoreLabel {
    Health,
    Mixed,
    Disease,
}

impl CoreLabel {
    pub const ALL: [CoreLabel; 3] = [CoreLabel::Health, CoreLabel::Mixed, CoreLabel::Disease];

    /// `-1`, `0` or `1`
    pub fn value(&self) -> i8 {
        match self {
            CoreLabel::Health => -1,
            CoreLabel::Mixed => 0,
            CoreLabel::Disease => 1,
        }
    }

    /// Classifies a genus from the number of diseases it is significant in per direction
    ///
    /// Both directions are tested independently, and qualifying in both makes
    /// the genus mixed regardless of which count is larger.
    pub fn classify(n_health: usize, n_disease: usize, required: usize) -> Option<Self> {
        let health = n_health >= required;
        let disease = n_disease >= required;
        match (health, disease) {
            (true, true) => Some(CoreLabel::Mixed),
            (true, false) => Some(CoreLabel::Health),
            (false, true) => Some(CoreLabel::Disease),
            (false, false) => None,
        }
    }
}

impl fmt::Display for CoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreLabel::Health => f.write_str("health"),
            CoreLabel::Mixed => f.write_str("mixed"),
            CoreLabel::Disease => f.write_str("disease"),
        }
    }
}

/// Number of core genera per label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, new)]
pub struct CoreCounts {
    pub health: usize,
    pub mixed: usize,
    pub disease: usize,
}

impl CoreCounts {
    pub fn get(&self, label: CoreLabel) -> usize {
        match label {
            CoreLabel::Health => self.health,
            CoreLabel::Mixed => self.mixed,
            CoreLabel::Disease => self.disease,
        }
    }

    pub fn add(&mut self, label: CoreLabel) {
        match label {
            CoreLabel::Health => self.health += 1,
            CoreLabel::Mixed => self.mixed += 1,
            CoreLabel::Disease => self.disease += 1,
        }
    }
}

/// Genera that are core responders; absent genera are not core
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreLabels {
    labels: BTreeMap<Lineage, CoreLabel>,
}

impl CoreLabels {
    pub fn get(&self, genus: &str) -> Option<CoreLabel> {
        self.labels.get(genus).copied()
    }

    pub fn insert(&mut self, genus: Lineage, label: CoreLabel) {
        self.labels.insert(genus, label);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Lineage, CoreLabel)> {
        self.labels.iter().map(|(genus, label)| (genus, *label))
    }

    /// Core genera with a single direction, i.e. not mixed
    pub fn with_direction(&self, direction: Direction) -> impl Iterator<Item = &Lineage> {
        let wanted = match direction {
            Direction::Health => CoreLabel::Health,
            Direction::Disease => CoreLabel::Disease,
        };
        self.labels
            .iter()
            .filter(move |(_, label)| **label == wanted)
            .map(|(genus, _)| genus)
    }

    pub fn counts(&self) -> CoreCounts {
        let mut counts = CoreCounts::default();
        self.labels.values().for_each(|label| counts.add(*label));
        counts
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Per-disease significance counts of one genus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
pub struct DirectionCounts {
    /// Studies calling the genus health-associated
    pub health: usize,
    /// Studies calling the genus disease-associated
    pub disease: usize,
}

/// Counts, per disease, the studies calling `genus` significant in each direction
pub fn disease_counts(
    calls: &CallMatrix,
    genus: usize,
    grouping: &DiseaseGrouping,
) -> Vec<DirectionCounts> {
    grouping
        .groups()
        .iter()
        .map(|(_, columns)| {
            let mut counts = DirectionCounts::default();
            for s in columns {
                match calls.get(genus, *s).and_then(|call| call.direction()) {
                    Some(Direction::Health) => counts.health += 1,
                    Some(Direction::Disease) => counts.disease += 1,
                    None => {}
                }
            }
            counts
        })
        .collect()
}

/// Count-based cross-disease aggregation
#[derive(Debug, Clone, Copy, new)]
pub struct CrossDiseaseAggregator {
    /// Diseases a genus must be significant in, per direction
    n_diseases: usize,
    /// Significant studies needed within a disease for it to count
    min_studies: usize,
}

impl Default for CrossDiseaseAggregator {
    fn default() -> Self {
        Self::new(2, 1)
    }
}

impl CrossDiseaseAggregator {
    /// Label of a single genus, or `None` if it is not core
    pub fn classify_genus(
        &self,
        calls: &CallMatrix,
        genus: usize,
        grouping: &DiseaseGrouping,
    ) -> Option<CoreLabel> {
        let counts = disease_counts(calls, genus, grouping);
        let n_health = counts.iter().filter(|c| c.health >= self.min_studies).count();
        let n_disease = counts.iter().filter(|c| c.disease >= self.min_studies).count();
        CoreLabel::classify(n_health, n_disease, self.n_diseases)
    }

    /// Labels every core genus of the matrix
    pub fn aggregate(
        &self,
        calls: &CallMatrix,
        genera: &[Lineage],
        grouping: &DiseaseGrouping,
    ) -> CoreLabels {
        let mut labels = CoreLabels::default();
        for (g, genus) in genera.iter().enumerate() {
            if let Some(label) = self.classify_genus(calls, g, grouping) {
                debug!("{} is core ({})", genus.genus_name(), label);
                labels.insert(genus.clone(), label);
            }
        }
        labels
    }

    /// Number of core genera per label, without materialising the labels
    pub fn count(&self, calls: &CallMatrix, grouping: &DiseaseGrouping) -> CoreCounts {
        let mut counts = CoreCounts::default();
        for g in 0..calls.n_genera() {
            if let Some(label) = self.classify_genus(calls, g, grouping) {
                counts.add(label);
            }
        }
        counts
    }
}
