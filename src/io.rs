//! Tab-separated reading and writing of the meta-analysis tables
//!
//! Missing cells are written as empty fields and degenerate statistics as
//! `NaN`, so the two stay distinguishable after a round trip.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::concordance::ConcordanceRecord;
use crate::config::Threshold;
use crate::cross::CoreLabels;
use crate::matrix::SignedMatrix;
use crate::metrics::MetricRecord;
use crate::permutation::NullDistribution;
use crate::stouffer::StoufferResults;
use crate::study::{StudyAliases, StudyId, StudyRecord, StudyTable};
use crate::taxonomy::Lineage;
use crate::within::DiseaseLabels;

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new().delimiter(b'\t').from_reader(reader)
}

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    WriterBuilder::new().delimiter(b'\t').from_writer(writer)
}

fn parse_cell(field: &str) -> Result<Option<f64>> {
    let field = field.trim();
    if field.is_empty() {
        Ok(None)
    } else if field.eq_ignore_ascii_case("nan") {
        Ok(Some(f64::NAN))
    } else {
        field
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("invalid value '{field}'"))
    }
}

fn format_cell(cell: Option<f64>) -> String {
    match cell {
        None => String::new(),
        Some(value) if value.is_nan() => "NaN".to_string(),
        Some(value) => value.to_string(),
    }
}

/// Reads a genera x studies table of signed values
///
/// The first column holds the lineages, the header holds the study ids,
/// which are mapped onto their canonical ids.
pub fn read_signed_matrix<R: Read>(reader: R, aliases: &StudyAliases) -> Result<SignedMatrix> {
    let mut reader = tsv_reader(reader);
    let headers = reader.headers().context("reading header")?.clone();
    let studies = headers
        .iter()
        .skip(1)
        .map(|id| aliases.canonical(id.trim()))
        .collect::<Vec<_>>();
    if studies.is_empty() {
        bail!("signed value table has no study columns");
    }

    let mut genera = Vec::new();
    let mut columns = vec![Vec::new(); studies.len()];
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", line + 1))?;
        let genus = record.get(0).unwrap_or_default();
        for (s, column) in columns.iter_mut().enumerate() {
            let field = record.get(s + 1).unwrap_or_default();
            let cell = parse_cell(field)
                .with_context(|| format!("genus {genus}, study {}", studies[s]))?;
            column.push(cell);
        }
        genera.push(Lineage::new(genus));
    }
    Ok(SignedMatrix::from_columns(genera, studies, columns)?)
}

pub fn read_signed_matrix_path(
    path: impl AsRef<Path>,
    aliases: &StudyAliases,
) -> Result<SignedMatrix> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_signed_matrix(file, aliases).with_context(|| format!("parsing {}", path.display()))
}

/// Writes a signed matrix with its original study ids
pub fn write_signed_matrix<W: Write>(
    writer: W,
    matrix: &SignedMatrix,
    aliases: &StudyAliases,
) -> Result<()> {
    let mut writer = tsv_writer(writer);
    let header = std::iter::once("").chain(
        matrix
            .studies()
            .iter()
            .map(|s| aliases.original(s.as_str())),
    );
    writer.write_record(header)?;
    for (g, genus) in matrix.genera().iter().enumerate() {
        let row = std::iter::once(genus.to_string())
            .chain((0..matrix.n_studies()).map(|s| format_cell(matrix.get(g, s))));
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the study table; needs at least a `dataset` column
pub fn read_study_table<R: Read>(reader: R, aliases: &StudyAliases) -> Result<StudyTable> {
    let records = tsv_reader(reader)
        .deserialize::<StudyRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("reading study records")?;
    Ok(StudyTable::new(records, aliases)?)
}

#[derive(Debug, Deserialize)]
struct ClassifierRow {
    dataset: String,
    roc_auc: f64,
}

/// Reads classifier results with `dataset` and `roc_auc` columns, one AUC per dataset
pub fn read_classifier_results<R: Read>(
    reader: R,
    aliases: &StudyAliases,
) -> Result<Vec<(StudyId, f64)>> {
    let mut results: Vec<(StudyId, f64)> = Vec::new();
    for row in tsv_reader(reader).deserialize::<ClassifierRow>() {
        let row = row.context("reading classifier results")?;
        let study = aliases.canonical(&row.dataset);
        if !results.iter().any(|(s, _)| *s == study) {
            results.push((study, row.roc_auc));
        }
    }
    Ok(results)
}

#[derive(Serialize)]
struct CoreRow<'a> {
    otu: &'a str,
    overall: i8,
    label: String,
}

/// Writes one row per core genus with its `-1`/`0`/`1` label
pub fn write_core_labels<W: Write>(writer: W, labels: &CoreLabels) -> Result<()> {
    let mut writer = tsv_writer(writer);
    for (genus, label) in labels.iter() {
        writer.serialize(CoreRow {
            otu: genus.as_str(),
            overall: label.value(),
            label: label.to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a genera x diseases table; cells of non-reproducible pairs are empty
pub fn write_disease_labels<W: Write>(writer: W, labels: &DiseaseLabels) -> Result<()> {
    let mut writer = tsv_writer(writer);
    let diseases = labels.diseases().collect::<Vec<_>>();
    let mut genera = labels.iter().map(|(genus, _, _)| genus).collect::<Vec<_>>();
    genera.sort_unstable();
    genera.dedup();

    writer.write_record(std::iter::once("").chain(diseases.iter().map(|d| d.as_str())))?;
    for genus in genera {
        let row = std::iter::once(genus.to_string()).chain(diseases.iter().map(|disease| {
            labels
                .get(genus.as_str(), disease.as_str())
                .map_or_else(String::new, |direction| direction.sign().to_string())
        }));
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct StoufferRow<'a> {
    otu: &'a str,
    direction: String,
    z: f64,
    combined_p: f64,
    num_studies: usize,
    studies: String,
}

pub fn write_stouffer<W: Write>(
    writer: W,
    results: &StoufferResults,
    aliases: &StudyAliases,
) -> Result<()> {
    let mut writer = tsv_writer(writer);
    for record in results.records() {
        let studies = record
            .studies
            .iter()
            .map(|s| aliases.original(s.as_str()))
            .collect::<Vec<_>>()
            .join(",");
        writer.serialize(StoufferRow {
            otu: record.genus.as_str(),
            direction: record.direction.to_string(),
            z: record.z,
            combined_p: record.combined_p,
            num_studies: record.num_studies(),
            studies,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one row per repetition and category with columns `rep`, `type`, `n`
pub fn write_null<W: Write>(writer: W, null: &NullDistribution) -> Result<()> {
    let mut writer = tsv_writer(writer);
    for row in null.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct MetricRow<'a> {
    value: f64,
    label: &'a str,
    metric: &'static str,
    disease: &'a str,
}

pub fn write_metrics<W: Write>(
    writer: W,
    records: &[MetricRecord],
    aliases: &StudyAliases,
) -> Result<()> {
    let mut writer = tsv_writer(writer);
    for record in records {
        writer.serialize(MetricRow {
            value: record.value,
            label: aliases.original(&record.label),
            metric: record.metric.name(),
            disease: record.disease.as_str(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct ConcordanceRow<'a> {
    dis1: &'a str,
    dis2: &'a str,
    study1: &'a str,
    study2: &'a str,
    metric: String,
    rep: Option<usize>,
    n_concord: usize,
    qthresh: f64,
}

pub fn write_concordance<W: Write>(
    writer: W,
    records: &[ConcordanceRecord],
    threshold: Threshold,
    aliases: &StudyAliases,
) -> Result<()> {
    let mut writer = tsv_writer(writer);
    for record in records {
        writer.serialize(ConcordanceRow {
            dis1: record.dis1.as_str(),
            dis2: record.dis2.as_str(),
            study1: aliases.original(record.study1.as_str()),
            study2: aliases.original(record.study2.as_str()),
            metric: record.kind.to_string(),
            rep: record.rep,
            n_concord: record.n_concord,
            qthresh: threshold.alpha,
        })?;
    }
    writer.flush()?;
    Ok(())
}
