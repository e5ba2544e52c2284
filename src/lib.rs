//! # co1curate - CO1 Barcode Curation Pipeline
//!
//! A Rust implementation of a curation pipeline for mitochondrial CO1 DNA
//! barcodes, deciding which assembled and merged amplicon reads are
//! trustworthy enough to submit as final barcodes.

pub mod consensus;
pub mod contigs;
pub mod fragments;
pub mod primers;
pub mod report;
pub mod trim;
pub mod utils;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Quality thresholds for assembled contigs
#[derive(Debug, Clone)]
pub struct ContigThresholds {
    pub min_coverage: f64,
    pub good_min_length: usize,
    pub medium_min_length: usize,
}

impl Default for ContigThresholds {
    fn default() -> Self {
        Self {
            min_coverage: 50.0,
            good_min_length: 600,
            medium_min_length: 400,
        }
    }
}

/// Fixed positional layout of the dual-fragment CO1 amplicon
///
/// Fragment A reads carry the forward primer near the read start; Fragment B
/// reads carry the reverse primer near the read end. The offsets below are
/// specific to the supported amplicon and primer set.
#[derive(Debug, Clone)]
pub struct AmpliconGeometry {
    /// Forward primer plus Fragment A interior, reverse primer excluded
    pub fragment_a_span: usize,
    /// Expected length of a trimmed Fragment A read
    pub fragment_a_interior: usize,
    /// Minimum position of a credible reverse-primer hit
    pub reverse_min_pos: usize,
    /// Minimum read length for a read carrying both Fragment B primers
    pub fragment_b_min_len: usize,
    /// Window kept immediately upstream of the reverse-primer hit
    pub fragment_b_interior: usize,
}

impl Default for AmpliconGeometry {
    fn default() -> Self {
        Self {
            fragment_a_span: 454,
            fragment_a_interior: 430,
            reverse_min_pos: 400,
            fragment_b_min_len: 450,
            fragment_b_interior: 415,
        }
    }
}

/// Acceptance criteria for a final consensus barcode
#[derive(Debug, Clone)]
pub struct BarcodeCriteria {
    /// Exact length of a full-length merged barcode
    pub expected_length: usize,
    /// Identity percentage exactly as the merge tool formats it;
    /// `None` disables the identity criterion
    pub expected_identity: Option<String>,
    /// Combined fragment read count must strictly exceed this
    pub min_read_total: u64,
}

impl Default for BarcodeCriteria {
    fn default() -> Self {
        Self {
            expected_length: 646,
            expected_identity: Some("30.8".to_string()),
            min_read_total: 40,
        }
    }
}

/// Per-specimen curation outcome
///
/// Each criterion is `None` when it could not be evaluated (incomplete
/// specimen directory, unreadable inputs) and is reported as "NA".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationVerdict {
    pub sample: String,
    pub correct_length: Option<bool>,
    pub correct_identity: Option<bool>,
    pub enough_reads: Option<bool>,
    pub possible_contamination: Option<bool>,
    pub sequence: String,
}

impl CurationVerdict {
    /// Verdict for a specimen whose directory failed the structural gate
    pub fn not_applicable(sample: &str) -> Self {
        Self {
            sample: sample.to_string(),
            correct_length: None,
            correct_identity: None,
            enough_reads: None,
            possible_contamination: None,
            sequence: String::new(),
        }
    }

    /// A barcode is accepted when length and read-count checks pass,
    /// no contamination is flagged, and the identity check (if tracked)
    /// did not fail.
    pub fn accept(&self) -> bool {
        self.correct_length == Some(true)
            && self.enough_reads == Some(true)
            && self.possible_contamination == Some(false)
            && self.correct_identity != Some(false)
    }
}

/// Error types for the co1curate library
#[derive(Debug, thiserror::Error)]
pub enum CurateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid sequence record: {0}")]
    InvalidRecord(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("External tool failure: {0}")]
    ExternalTool(String),
}

pub type CurateResult<T> = Result<T, CurateError>;
