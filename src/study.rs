use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use derive_new::new;
use serde::Deserialize;
use tracing::debug;

use crate::error::{MetaError, Result};

/// Identifier of a single case-control study, e.g. `crc_baxter`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudyId(String);

impl StudyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the disease tag from the prefix before the first underscore
    fn disease_prefix(&self) -> Result<Disease> {
        match self.0.split_once('_') {
            Some((prefix, _)) if !prefix.is_empty() => Ok(Disease::new(prefix)),
            _ => Err(MetaError::UnknownDisease(self.0.clone())),
        }
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StudyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StudyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A curated disease tag, e.g. `crc` or `ibd`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Disease(String);

impl Disease {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Disease {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Disease {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Historical study identifiers and the canonical ids they are grouped under
#[derive(Debug, Clone)]
pub struct StudyAliases {
    forward: HashMap<String, String>,
}

impl Default for StudyAliases {
    /// The two known renamings: both diarrhea studies are grouped with `cdi`
    fn default() -> Self {
        Self::new([("edd_singh", "cdi_singh"), ("noncdi_schubert", "cdi_schubert2")])
    }
}

impl StudyAliases {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let forward = pairs
            .into_iter()
            .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
            .collect();
        Self { forward }
    }

    /// An alias map that renames nothing
    pub fn none() -> Self {
        Self {
            forward: HashMap::new(),
        }
    }

    /// Maps a raw identifier onto its canonical id
    pub fn canonical(&self, raw: &str) -> StudyId {
        match self.forward.get(raw) {
            Some(canonical) => StudyId::new(canonical.as_str()),
            None => StudyId::new(raw),
        }
    }

    /// Maps a canonical id back onto the identifier it was ingested as
    pub fn original<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.forward
            .iter()
            .find(|(_, c)| c.as_str() == canonical)
            .map(|(alias, _)| alias.as_str())
            .unwrap_or(canonical)
    }
}

/// One row of the study metadata table as ingested
#[derive(Debug, Clone, Deserialize, new)]
pub struct StudyRecord {
    #[serde(rename = "dataset")]
    pub id: String,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default, rename = "N_ctrl")]
    pub controls: Option<u64>,
    #[serde(default, rename = "N_dis")]
    pub cases: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct StudyInfo {
    pub disease: Disease,
    pub total: Option<u64>,
    pub controls: Option<u64>,
    pub cases: Option<u64>,
}

/// Lookup from study id to its disease and sample sizes
///
/// Populated once at ingestion; aggregators never re-derive disease labels
/// from identifiers themselves.
#[derive(Debug, Clone, Default)]
pub struct StudyTable {
    studies: BTreeMap<StudyId, StudyInfo>,
}

impl StudyTable {
    pub fn new(
        records: impl IntoIterator<Item = StudyRecord>,
        aliases: &StudyAliases,
    ) -> Result<Self> {
        let mut studies = BTreeMap::new();
        for record in records {
            let id = aliases.canonical(&record.id);
            let disease = id.disease_prefix()?;
            debug!("Study {} grouped under disease {}", id, disease);
            let info = StudyInfo {
                disease,
                total: record.total,
                controls: record.controls,
                cases: record.cases,
            };
            if studies.insert(id.clone(), info).is_some() {
                return Err(MetaError::DuplicateStudy(id.to_string()));
            }
        }
        Ok(Self { studies })
    }

    /// Builds a table from bare identifiers, without sample sizes
    pub fn from_ids<'a>(
        ids: impl IntoIterator<Item = &'a str>,
        aliases: &StudyAliases,
    ) -> Result<Self> {
        Self::new(
            ids.into_iter()
                .map(|id| StudyRecord::new(id.to_string(), None, None, None)),
            aliases,
        )
    }

    pub fn get(&self, study: &str) -> Result<&StudyInfo> {
        self.studies
            .get(study)
            .ok_or_else(|| MetaError::UnknownStudy(study.to_string()))
    }

    pub fn disease_of(&self, study: &str) -> Result<&Disease> {
        self.get(study).map(|info| &info.disease)
    }

    /// Total number of samples; falls back to cases plus controls
    pub fn sample_size(&self, study: &str) -> Result<u64> {
        let info = self.get(study)?;
        info.total
            .or_else(|| Some(info.controls? + info.cases?))
            .ok_or_else(|| MetaError::MissingSampleSize(study.to_string()))
    }

    /// All distinct diseases, sorted
    pub fn diseases(&self) -> Vec<Disease> {
        let mut diseases = self
            .studies
            .values()
            .map(|info| info.disease.clone())
            .collect::<Vec<_>>();
        diseases.sort_unstable();
        diseases.dedup();
        diseases
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StudyId, &StudyInfo)> {
        self.studies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disease_from_prefix() {
        let table =
            StudyTable::from_ids(["crc_baxter", "ibd_gevers"], &StudyAliases::none()).unwrap();
        assert_eq!(table.disease_of("crc_baxter").unwrap().as_str(), "crc");
        assert_eq!(table.disease_of("ibd_gevers").unwrap().as_str(), "ibd");
        assert_eq!(table.diseases(), vec![Disease::new("crc"), Disease::new("ibd")]);
    }

    #[test]
    fn test_aliases_are_normalized() {
        let aliases = StudyAliases::default();
        let table = StudyTable::from_ids(["edd_singh", "noncdi_schubert"], &aliases).unwrap();
        assert_eq!(table.disease_of("cdi_singh").unwrap().as_str(), "cdi");
        assert_eq!(table.disease_of("cdi_schubert2").unwrap().as_str(), "cdi");
        assert!(table.get("edd_singh").is_err());
    }

    #[test]
    fn test_alias_round_trip() {
        let aliases = StudyAliases::default();
        let canonical = aliases.canonical("edd_singh");
        assert_eq!(canonical.as_str(), "cdi_singh");
        assert_eq!(aliases.original(canonical.as_str()), "edd_singh");
        assert_eq!(aliases.original("crc_zeller"), "crc_zeller");
    }

    #[test]
    fn test_underivable_disease_is_fatal() {
        let err = StudyTable::from_ids(["baxter"], &StudyAliases::none()).unwrap_err();
        assert!(matches!(err, MetaError::UnknownDisease(id) if id == "baxter"));
        assert!(StudyTable::from_ids(["_baxter"], &StudyAliases::none()).is_err());
    }

    #[test]
    fn test_duplicate_study() {
        let err =
            StudyTable::from_ids(["cdi_singh", "edd_singh"], &StudyAliases::default()).unwrap_err();
        assert!(matches!(err, MetaError::DuplicateStudy(_)));
    }

    #[test]
    fn test_sample_size() {
        let records = vec![
            StudyRecord::new("crc_baxter".to_string(), Some(490), Some(172), Some(120)),
            StudyRecord::new("crc_zeller".to_string(), None, None, None),
            StudyRecord::new("ibd_gevers".to_string(), None, Some(16), Some(146)),
        ];
        let table = StudyTable::new(records, &StudyAliases::none()).unwrap();
        assert_eq!(table.sample_size("crc_baxter").unwrap(), 490);
        assert_eq!(table.sample_size("ibd_gevers").unwrap(), 162);
        assert!(matches!(
            table.sample_size("crc_zeller"),
            Err(MetaError::MissingSampleSize(_))
        ));
        assert!(matches!(table.sample_size("ibd_papa"), Err(MetaError::UnknownStudy(_))));
    }
}
