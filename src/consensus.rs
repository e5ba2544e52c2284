//! Final consensus validation and summary emission
//!
//! Each specimen directory produced by the merge step is expected to hold
//! exactly five files. The file count is a structural gate applied before
//! any content is parsed: an incomplete directory yields a summary row with
//! every criterion marked NA and is excluded from the curated set.

use crate::report::parse_merge_report;
use crate::utils::chunk_work;
use crate::{BarcodeCriteria, CurateError, CurateResult, CurationVerdict};
use bio::io::fasta;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Named roles of the five files expected in a specimen directory
///
/// Roles are resolved by filename pattern rather than sort position, so a
/// renamed upstream output fails loudly instead of silently swapping roles.
#[derive(Debug, Clone)]
pub struct SpecimenFiles {
    pub sequence: PathBuf,
    pub merge_report: PathBuf,
    pub fragment_a: PathBuf,
    pub fragment_b: PathBuf,
    pub contamination: PathBuf,
}

impl SpecimenFiles {
    pub fn resolve(dir: &Path) -> CurateResult<Self> {
        let mut sequence = None;
        let mut merge_report = None;
        let mut fragment_a = None;
        let mut fragment_b = None;
        let mut contamination = None;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            if name.ends_with("_a.fasta") {
                fragment_a = Some(path);
            } else if name.ends_with("_b.fasta") {
                fragment_b = Some(path);
            } else if name.ends_with("_contamination.fasta") {
                contamination = Some(path);
            } else if name.ends_with(".merger") {
                merge_report = Some(path);
            } else if name.ends_with(".fasta") {
                sequence = Some(path);
            }
        }

        let missing_role = |role: &str| {
            CurateError::FileNotFound(format!("{} file in {}", role, dir.display()))
        };

        Ok(Self {
            sequence: sequence.ok_or_else(|| missing_role("sequence"))?,
            merge_report: merge_report.ok_or_else(|| missing_role("merge report"))?,
            fragment_a: fragment_a.ok_or_else(|| missing_role("fragment A"))?,
            fragment_b: fragment_b.ok_or_else(|| missing_role("fragment B"))?,
            contamination: contamination.ok_or_else(|| missing_role("contamination"))?,
        })
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Evaluate one specimen directory into a curation verdict
pub fn evaluate_specimen(dir: &Path, criteria: &BarcodeCriteria) -> CurateResult<CurationVerdict> {
    let sample = dir_name(dir);

    let file_count = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).count();
    if file_count != 5 {
        log::warn!(
            "{} holds {} files, expected 5; recording as not applicable",
            dir.display(),
            file_count
        );
        return Ok(CurationVerdict::not_applicable(&sample));
    }

    let files = SpecimenFiles::resolve(dir)?;

    let file = File::open(&files.sequence)?;
    let record = fasta::Reader::new(file)
        .records()
        .next()
        .ok_or_else(|| {
            CurateError::InvalidRecord(format!(
                "{} holds no sequence record",
                files.sequence.display()
            ))
        })??;

    let merge_report = parse_merge_report(&files.merge_report)?;
    let contamination_len = std::fs::metadata(&files.contamination)?.len();

    let correct_length = Some(record.seq().len() == criteria.expected_length);
    let correct_identity = criteria
        .expected_identity
        .as_ref()
        .map(|expected| merge_report.identity.as_ref() == Some(expected));
    let enough_reads =
        Some(merge_report.fragment_a_reads + merge_report.fragment_b_reads > criteria.min_read_total);
    let possible_contamination = Some(contamination_len > 0);

    Ok(CurationVerdict {
        sample,
        correct_length,
        correct_identity,
        enough_reads,
        possible_contamination,
        sequence: String::from_utf8_lossy(record.seq()).to_string(),
    })
}

fn tf(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => "NA".to_string(),
    }
}

/// One line of the summary table
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Sample Name")]
    pub sample: String,
    #[serde(rename = "Correct Length (T/F)")]
    pub correct_length: String,
    #[serde(rename = "Correct Identity (T/F)")]
    pub correct_identity: String,
    #[serde(rename = "Enough Reads (T/F)")]
    pub enough_reads: String,
    #[serde(rename = "Possible Contamination (T/F)")]
    pub possible_contamination: String,
    #[serde(rename = "CO1 Sequence")]
    pub sequence: String,
}

impl From<&CurationVerdict> for SummaryRow {
    fn from(verdict: &CurationVerdict) -> Self {
        Self {
            sample: verdict.sample.clone(),
            correct_length: tf(verdict.correct_length),
            correct_identity: tf(verdict.correct_identity),
            enough_reads: tf(verdict.enough_reads),
            possible_contamination: tf(verdict.possible_contamination),
            sequence: verdict.sequence.clone(),
        }
    }
}

/// Counts from a validation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvaluateSummary {
    pub total: usize,
    pub accepted: usize,
    pub not_applicable: usize,
}

/// Evaluate every specimen directory under `parent`.
///
/// Specimen directories are visited in sorted order. Evaluation is chunked
/// across worker threads; per-specimen failures become NA rows and never
/// abort the batch. The summary table and the curated FASTA are written
/// serially after the parallel pass, keeping the appends race-free.
pub fn evaluate_consensus_dirs(
    parent: &Path,
    criteria: &BarcodeCriteria,
    summary_path: &Path,
    curated_path: &Path,
    num_threads: usize,
) -> CurateResult<EvaluateSummary> {
    if !parent.is_dir() {
        return Err(CurateError::FileNotFound(
            parent.to_string_lossy().to_string(),
        ));
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(parent)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let chunks = chunk_work(dirs, num_threads);
    let chunk_results: Vec<Vec<CurationVerdict>> = chunks
        .into_par_iter()
        .map(|chunk| {
            chunk
                .iter()
                .map(|dir| match evaluate_specimen(dir, criteria) {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        log::warn!("Could not evaluate {}: {}", dir.display(), e);
                        CurationVerdict::not_applicable(&dir_name(dir))
                    }
                })
                .collect()
        })
        .collect();

    let mut verdicts = Vec::new();
    for chunk_result in chunk_results {
        verdicts.extend(chunk_result);
    }

    let mut writer = csv::Writer::from_path(summary_path)?;
    for verdict in &verdicts {
        writer.serialize(SummaryRow::from(verdict))?;
    }
    writer.flush()?;

    let mut curated = fasta::Writer::new(File::create(curated_path)?);
    let mut summary = EvaluateSummary {
        total: verdicts.len(),
        ..EvaluateSummary::default()
    };

    for verdict in &verdicts {
        if verdict.correct_length.is_none() {
            summary.not_applicable += 1;
        }
        if verdict.accept() {
            curated.write(&verdict.sample, None, verdict.sequence.as_bytes())?;
            summary.accepted += 1;
        }
    }
    curated.flush()?;

    log::info!(
        "Evaluated {} specimens: {} accepted, {} not applicable",
        summary.total,
        summary.accepted,
        summary.not_applicable
    );

    Ok(summary)
}
