//! Fragment extraction and contamination screening for dereplicated clusters
//!
//! The input is an abundance-ordered cluster FASTA for one specimen. The two
//! dominant clusters become Fragment A and Fragment B; residual clusters
//! above a fraction of the top abundance are flagged as possible
//! contamination. Merging the fragment pair is delegated to an external
//! pairwise merge tool whose report is consumed by the consensus validator.

use crate::{CurateError, CurateResult};
use bio::io::fasta;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Fraction of the top cluster's abundance above which a residual cluster
/// is flagged as possible contamination
pub const CONTAMINATION_FRACTION: f64 = 0.1;

/// Cluster abundance parsed from the `size=N` annotation in the record header
pub fn parse_cluster_size(record: &fasta::Record) -> CurateResult<u64> {
    let header = match record.desc() {
        Some(desc) => format!("{} {}", record.id(), desc),
        None => record.id().to_string(),
    };

    let start = header.find("size=").ok_or_else(|| {
        CurateError::InvalidRecord(format!("no size annotation in header: {}", header))
    })? + "size=".len();

    let digits: String = header[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse::<u64>().map_err(|_| {
        CurateError::InvalidRecord(format!("malformed size annotation in header: {}", header))
    })
}

/// The two dominant clusters plus residual clusters flagged as possible
/// contamination
#[derive(Debug, Clone)]
pub struct ClusterSplit {
    pub fragment_a: fasta::Record,
    pub fragment_b: fasta::Record,
    pub contamination: Vec<fasta::Record>,
}

/// Split an abundance-ordered cluster list into the fragment pair and the
/// contamination set.
///
/// The first cluster is Fragment A and the second Fragment B,
/// unconditionally; the given ordering is trusted, not recomputed. Returns
/// `None` when fewer than two clusters exist. Residual clusters at or below
/// the contamination threshold are discarded silently.
pub fn split_clusters(records: Vec<fasta::Record>) -> CurateResult<Option<ClusterSplit>> {
    if records.len() < 2 {
        return Ok(None);
    }

    let sizes: Vec<u64> = records
        .iter()
        .map(parse_cluster_size)
        .collect::<CurateResult<_>>()?;
    let threshold = sizes[0] as f64 * CONTAMINATION_FRACTION;

    let contamination: Vec<fasta::Record> = records[2..]
        .iter()
        .zip(&sizes[2..])
        .filter(|(_, &size)| size as f64 > threshold)
        .map(|(record, _)| record.clone())
        .collect();

    let mut records = records.into_iter();
    let (fragment_a, fragment_b) = match (records.next(), records.next()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(None),
    };

    Ok(Some(ClusterSplit {
        fragment_a,
        fragment_b,
        contamination,
    }))
}

/// File layout produced for one specimen, named after the output directory
#[derive(Debug, Clone)]
pub struct FragmentFiles {
    pub fragment_a: PathBuf,
    pub fragment_b: PathBuf,
    pub contamination: PathBuf,
    pub merge_report: PathBuf,
    pub merged_fasta: PathBuf,
}

impl FragmentFiles {
    pub fn in_dir(output_dir: &Path) -> Self {
        let prefix = output_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("specimen")
            .to_string();

        Self {
            fragment_a: output_dir.join(format!("{}_a.fasta", prefix)),
            fragment_b: output_dir.join(format!("{}_b.fasta", prefix)),
            contamination: output_dir.join(format!("{}_contamination.fasta", prefix)),
            merge_report: output_dir.join(format!("{}.merger", prefix)),
            merged_fasta: output_dir.join(format!("{}.fasta", prefix)),
        }
    }
}

/// Invoke the external pairwise merge tool on the fragment pair.
///
/// The subprocess is bounded by `timeout`; a timeout, a non-zero exit, or an
/// empty output file is an external-tool failure for this specimen only and
/// never aborts the batch.
pub fn run_merger(merger: &str, files: &FragmentFiles, timeout: Duration) -> CurateResult<()> {
    let mut child = Command::new(merger)
        .arg("-asequence")
        .arg(&files.fragment_a)
        .arg("-bsequence")
        .arg(&files.fragment_b)
        .arg("-outfile")
        .arg(&files.merge_report)
        .arg("-outseq")
        .arg(&files.merged_fasta)
        .spawn()
        .map_err(|e| CurateError::ExternalTool(format!("failed to launch {}: {}", merger, e)))?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if started.elapsed() > timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CurateError::ExternalTool(format!(
                    "{} timed out after {:?}",
                    merger, timeout
                )));
            }
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    };

    if !status.success() {
        return Err(CurateError::ExternalTool(format!(
            "{} exited with {}",
            merger, status
        )));
    }

    for path in [&files.merge_report, &files.merged_fasta] {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(CurateError::ExternalTool(format!(
                "{} produced no output in {}",
                merger,
                path.display()
            )));
        }
    }

    Ok(())
}

/// Extract the fragment pair for one specimen and merge it.
///
/// Returns `Ok(None)` when the specimen holds fewer than two clusters and is
/// skipped. The contamination file is always written, empty when nothing was
/// flagged, so downstream stages can use its size as the contamination flag.
pub fn extract_fragments(
    input: &Path,
    output_dir: &Path,
    merger: &str,
    timeout: Duration,
) -> CurateResult<Option<FragmentFiles>> {
    if !input.is_file() {
        return Err(CurateError::FileNotFound(
            input.to_string_lossy().to_string(),
        ));
    }

    let file = File::open(input)?;
    let records: Vec<fasta::Record> = fasta::Reader::new(file)
        .records()
        .collect::<Result<_, _>>()?;

    let split = match split_clusters(records)? {
        Some(split) => split,
        None => {
            log::warn!(
                "{} holds fewer than two clusters, skipping specimen",
                input.display()
            );
            return Ok(None);
        }
    };

    std::fs::create_dir_all(output_dir)?;
    let files = FragmentFiles::in_dir(output_dir);

    let mut writer_a = fasta::Writer::new(File::create(&files.fragment_a)?);
    writer_a.write_record(&split.fragment_a)?;
    writer_a.flush()?;

    let mut writer_b = fasta::Writer::new(File::create(&files.fragment_b)?);
    writer_b.write_record(&split.fragment_b)?;
    writer_b.flush()?;

    let mut contamination = fasta::Writer::new(File::create(&files.contamination)?);
    for record in &split.contamination {
        contamination.write_record(record)?;
    }
    contamination.flush()?;

    if !split.contamination.is_empty() {
        log::warn!(
            "{} residual clusters flagged as possible contamination for {}",
            split.contamination.len(),
            input.display()
        );
    }

    run_merger(merger, &files, timeout)?;

    Ok(Some(files))
}
