use crate::cross::{CoreCounts, CoreLabels};
use crate::metrics::MetricRecord;
use crate::permutation::{EmpiricalPvalues, NullDistribution};
use crate::stouffer::StoufferResults;
use crate::within::DiseaseLabels;

/// Everything produced by one [`MetaAnalysis`](crate::MetaAnalysis) run
#[derive(Debug, Clone)]
pub struct MetaResults {
    /// Genera reproducible within each disease
    pub disease_labels: DiseaseLabels,
    /// Count-based core genera
    pub overall: CoreLabels,
    pub stouffer: StoufferResults,
    /// Core genera from Stouffer-combined p-values
    pub stouffer_overall: CoreLabels,
    /// Permutation null of the count-based core; `None` when no repetitions were requested
    pub null: Option<NullDistribution>,
    pub empirical_pvalues: Option<EmpiricalPvalues>,
    pub metrics: Vec<MetricRecord>,
}

impl MetaResults {
    pub fn core_counts(&self) -> CoreCounts {
        self.overall.counts()
    }

    pub fn pprint(&self) {
        println!("Genus\tOverall\tStouffer");
        let genera = self
            .overall
            .iter()
            .map(|(genus, _)| genus)
            .chain(self.stouffer_overall.iter().map(|(genus, _)| genus))
            .collect::<std::collections::BTreeSet<_>>();
        for genus in genera {
            let format = |labels: &CoreLabels| {
                labels
                    .get(genus.as_str())
                    .map_or_else(|| "-".to_string(), |label| label.to_string())
            };
            println!(
                "{}\t{}\t{}",
                genus.genus_name(),
                format(&self.overall),
                format(&self.stouffer_overall)
            );
        }
        if let Some(pvalues) = &self.empirical_pvalues {
            let counts = self.core_counts();
            println!(
                "health: {} (p={})\tmixed: {} (p={})\tdisease: {} (p={})",
                counts.health,
                pvalues.health,
                counts.mixed,
                pvalues.mixed,
                counts.disease,
                pvalues.disease
            );
        }
    }
}
