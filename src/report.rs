//! Parsing of the external merge tool's textual report
//!
//! The report layout is a stable contract with the merge tool: 0-indexed
//! lines 15 and 16 name the two input fragments together with their `size=N`
//! annotations, which carry the fragment read counts, and line 22 holds the
//! alignment identity as a parenthesised percentage.

use crate::{CurateError, CurateResult};
use std::path::Path;

pub const FRAGMENT_A_LINE: usize = 15;
pub const FRAGMENT_B_LINE: usize = 16;
pub const IDENTITY_LINE: usize = 22;

/// Read counts and identity extracted from one specimen's merge report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub fragment_a_reads: u64,
    pub fragment_b_reads: u64,
    /// Identity percentage exactly as the tool formats it, e.g. "30.8";
    /// `None` when the report carries no parseable identity line
    pub identity: Option<String>,
}

/// Read count from a report line: the integer after the final `=`.
///
/// The fragment names themselves contain `=` (they keep their `size=N`
/// cluster annotation), so only the final field is the count.
fn parse_read_count(line: &str) -> CurateResult<u64> {
    line.trim_end()
        .rsplit('=')
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<u64>()
        .map_err(|_| {
            CurateError::InvalidRecord(format!("no read count in report line: {}", line))
        })
}

/// Identity percentage from a line such as `# Identity: 199/646 (30.8%)`
fn parse_identity(line: &str) -> Option<String> {
    let open = line.find('(')?;
    let rest = &line[open + 1..];
    let close = rest.find("%)")?;
    Some(rest[..close].to_string())
}

/// Parse one specimen's merge report.
///
/// A report too short to carry the read-count lines is malformed; a missing
/// or unparseable identity line only leaves `identity` unset.
pub fn parse_merge_report<P: AsRef<Path>>(path: P) -> CurateResult<MergeReport> {
    let content = std::fs::read_to_string(&path)
        .map_err(|_| CurateError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;
    let lines: Vec<&str> = content.lines().collect();

    let line_a = lines.get(FRAGMENT_A_LINE).ok_or_else(|| {
        CurateError::InvalidRecord(format!(
            "merge report {} has only {} lines",
            path.as_ref().display(),
            lines.len()
        ))
    })?;
    let line_b = lines.get(FRAGMENT_B_LINE).ok_or_else(|| {
        CurateError::InvalidRecord(format!(
            "merge report {} has only {} lines",
            path.as_ref().display(),
            lines.len()
        ))
    })?;

    let fragment_a_reads = parse_read_count(line_a)?;
    let fragment_b_reads = parse_read_count(line_b)?;
    let identity = lines.get(IDENTITY_LINE).and_then(|line| parse_identity(line));

    Ok(MergeReport {
        fragment_a_reads,
        fragment_b_reads,
        identity,
    })
}

#[cfg(test)]
pub(crate) fn report_text(size_a: u64, size_b: u64, identity: &str) -> String {
    format!(
        "########################################\n\
         # Program: merger\n\
         # Rundate: Tue  1 Jul 2025 12:00:00\n\
         # Commandline: merger\n\
         #    -asequence spec1_a.fasta\n\
         #    -bsequence spec1_b.fasta\n\
         #    -outfile spec1.merger\n\
         #    -outseq spec1.fasta\n\
         # Align_format: simple\n\
         # Report_file: spec1.merger\n\
         ########################################\n\
         \n\
         #=======================================\n\
         #\n\
         # Aligned_sequences: 2\n\
         # 1: c1;size={}\n\
         # 2: c2;size={}\n\
         # Matrix: EDNAFULL\n\
         # Gap_penalty: 50.0\n\
         # Extend_penalty: 5.0\n\
         #\n\
         # Length: 646\n\
         # Identity:     199/646 ({}%)\n\
         # Similarity:   199/646 (30.8%)\n",
        size_a, size_b, identity
    )
}
