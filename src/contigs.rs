//! Contig quality classification for assembled specimens

use crate::{ContigThresholds, CurateError, CurateResult};
use bio::io::fasta;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Quality tier of a single assembled contig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContigTier {
    Good,
    Medium,
}

/// Assembly coverage parsed from the trailing underscore-separated field of
/// the record header, e.g. `NODE_1_length_650_cov_75.471`.
///
/// The coverage field is assumed always present and well formed; a header
/// that does not end in a number is an input-format error for the file.
pub fn parse_coverage(record: &fasta::Record) -> CurateResult<f64> {
    let header = match record.desc() {
        Some(desc) => format!("{} {}", record.id(), desc),
        None => record.id().to_string(),
    };

    let field = header.rsplit('_').next().unwrap_or(&header);
    field.parse::<f64>().map_err(|_| {
        CurateError::InvalidRecord(format!("no coverage annotation in header: {}", header))
    })
}

/// Tier a contig by coverage and length
pub fn contig_tier(
    length: usize,
    coverage: f64,
    thresholds: &ContigThresholds,
) -> Option<ContigTier> {
    if coverage <= thresholds.min_coverage {
        return None;
    }

    if length > thresholds.good_min_length {
        Some(ContigTier::Good)
    } else if length > thresholds.medium_min_length {
        Some(ContigTier::Medium)
    } else {
        None
    }
}

/// Outcome of selecting a single contig for one specimen
#[derive(Debug, Clone)]
pub enum Selection {
    Good(fasta::Record),
    Medium(fasta::Record),
    /// Zero or several qualifying contigs; nothing is emitted and the
    /// specimen is kept for manual inspection
    Problematic,
}

/// Pick at most one contig for a specimen.
///
/// Exactly one good contig wins; a single medium contig is used only when no
/// good contig exists at all; any other combination is problematic.
pub fn select_contig(
    records: &[fasta::Record],
    thresholds: &ContigThresholds,
) -> CurateResult<Selection> {
    let mut good = Vec::new();
    let mut medium = Vec::new();

    for record in records {
        let coverage = parse_coverage(record)?;
        match contig_tier(record.seq().len(), coverage, thresholds) {
            Some(ContigTier::Good) => good.push(record),
            Some(ContigTier::Medium) => medium.push(record),
            None => {}
        }
    }

    Ok(if good.len() == 1 {
        Selection::Good(good[0].clone())
    } else if good.is_empty() && medium.len() == 1 {
        Selection::Medium(medium[0].clone())
    } else {
        Selection::Problematic
    })
}

/// Destination files for the classifier's aggregate outputs
#[derive(Debug, Clone)]
pub struct ClassifierOutputs {
    pub good_fasta: PathBuf,
    pub medium_fasta: PathBuf,
    pub problem_list: PathBuf,
    pub quarantine_dir: PathBuf,
}

/// Batch counts returned by a classification pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClassifySummary {
    pub total: usize,
    pub good: usize,
    pub medium: usize,
    pub problematic: usize,
    pub parse_failures: usize,
}

/// Classify every per-specimen assembly FASTA in a directory.
///
/// The selected contig is re-identified to the specimen name (the file stem)
/// and appended to the good or medium aggregate. Problematic specimens are
/// listed in the problem file and their source FASTA copied into the
/// quarantine directory for review. A file whose coverage annotation cannot
/// be parsed is logged and counted; the batch continues.
pub fn classify_assemblies(
    assembly_dir: &Path,
    thresholds: &ContigThresholds,
    outputs: &ClassifierOutputs,
) -> CurateResult<ClassifySummary> {
    if !assembly_dir.is_dir() {
        return Err(CurateError::FileNotFound(
            assembly_dir.to_string_lossy().to_string(),
        ));
    }

    let mut fasta_files: Vec<PathBuf> = std::fs::read_dir(assembly_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("fasta"))
        .collect();
    fasta_files.sort();

    std::fs::create_dir_all(&outputs.quarantine_dir)?;
    let mut good_writer = fasta::Writer::new(File::create(&outputs.good_fasta)?);
    let mut medium_writer = fasta::Writer::new(File::create(&outputs.medium_fasta)?);
    let mut problem_names = Vec::new();

    let mut summary = ClassifySummary::default();

    for path in &fasta_files {
        summary.total += 1;
        let specimen = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let file = File::open(path)?;
        let records: Vec<fasta::Record> = fasta::Reader::new(file)
            .records()
            .collect::<Result<_, _>>()?;

        match select_contig(&records, thresholds) {
            Ok(Selection::Good(record)) => {
                good_writer.write(&specimen, None, record.seq())?;
                summary.good += 1;
            }
            Ok(Selection::Medium(record)) => {
                medium_writer.write(&specimen, None, record.seq())?;
                summary.medium += 1;
            }
            Ok(Selection::Problematic) => {
                let file_name = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                std::fs::copy(path, outputs.quarantine_dir.join(&file_name))?;
                problem_names.push(file_name);
                summary.problematic += 1;
            }
            Err(e @ CurateError::InvalidRecord(_)) => {
                log::error!("Skipping {}: {}", path.display(), e);
                summary.parse_failures += 1;
            }
            Err(e) => return Err(e),
        }
    }

    good_writer.flush()?;
    medium_writer.flush()?;

    let mut problem_list = File::create(&outputs.problem_list)?;
    for name in &problem_names {
        writeln!(problem_list, "{}", name)?;
    }

    log::info!(
        "Classified {} assemblies: {} good, {} medium, {} problematic, {} parse failures",
        summary.total,
        summary.good,
        summary.medium,
        summary.problematic,
        summary.parse_failures
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn contig(id: &str, length: usize) -> fasta::Record {
        let seq = vec![b'A'; length];
        fasta::Record::with_attrs(id, None, &seq)
    }

    #[test]
    fn test_contig_tier_boundaries() {
        let th = ContigThresholds::default();

        // coverage must strictly exceed the threshold
        assert_eq!(contig_tier(650, 50.0, &th), None);
        assert_eq!(contig_tier(650, 50.1, &th), Some(ContigTier::Good));

        // 600 is the last medium length, 601 the first good one
        assert_eq!(contig_tier(600, 80.0, &th), Some(ContigTier::Medium));
        assert_eq!(contig_tier(601, 80.0, &th), Some(ContigTier::Good));

        // 400 does not qualify at all
        assert_eq!(contig_tier(400, 80.0, &th), None);
        assert_eq!(contig_tier(401, 80.0, &th), Some(ContigTier::Medium));
    }

    #[test]
    fn test_parse_coverage() {
        let record = contig("NODE_1_length_650_cov_75.471", 650);
        assert_eq!(parse_coverage(&record).unwrap(), 75.471);

        let record = contig("contig1", 650);
        assert!(matches!(
            parse_coverage(&record),
            Err(CurateError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_select_single_good_contig() {
        let th = ContigThresholds::default();
        let records = vec![
            contig("NODE_1_length_650_cov_80.0", 650),
            contig("NODE_2_length_300_cov_80.0", 300),
        ];

        match select_contig(&records, &th).unwrap() {
            Selection::Good(record) => assert_eq!(record.seq().len(), 650),
            other => panic!("expected Good, got {:?}", other),
        }
    }

    #[test]
    fn test_select_good_beats_medium() {
        let th = ContigThresholds::default();
        let records = vec![
            contig("NODE_1_length_650_cov_80.0", 650),
            contig("NODE_2_length_500_cov_80.0", 500),
        ];

        assert!(matches!(
            select_contig(&records, &th).unwrap(),
            Selection::Good(_)
        ));
    }

    #[test]
    fn test_select_two_good_is_problematic() {
        let th = ContigThresholds::default();
        let records = vec![
            contig("NODE_1_length_650_cov_80.0", 650),
            contig("NODE_2_length_700_cov_80.0", 700),
        ];

        assert!(matches!(
            select_contig(&records, &th).unwrap(),
            Selection::Problematic
        ));

        // a lone medium contig does not rescue a specimen with several good ones
        let records = vec![
            contig("NODE_1_length_650_cov_80.0", 650),
            contig("NODE_2_length_700_cov_80.0", 700),
            contig("NODE_3_length_500_cov_80.0", 500),
        ];
        assert!(matches!(
            select_contig(&records, &th).unwrap(),
            Selection::Problematic
        ));
    }

    #[test]
    fn test_select_single_medium_contig() {
        let th = ContigThresholds::default();
        let records = vec![
            contig("NODE_1_length_500_cov_80.0", 500),
            contig("NODE_2_length_300_cov_80.0", 300),
        ];

        assert!(matches!(
            select_contig(&records, &th).unwrap(),
            Selection::Medium(_)
        ));
    }

    #[test]
    fn test_select_nothing_qualifying_is_problematic() {
        let th = ContigThresholds::default();
        let records = vec![contig("NODE_1_length_650_cov_10.0", 650)];

        assert!(matches!(
            select_contig(&records, &th).unwrap(),
            Selection::Problematic
        ));
    }

    fn write_assembly(dir: &Path, name: &str, contigs: &[(&str, usize)]) {
        let mut content = String::new();
        for (id, length) in contigs {
            content.push_str(&format!(">{}\n{}\n", id, "A".repeat(*length)));
        }
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn outputs(dir: &Path) -> ClassifierOutputs {
        ClassifierOutputs {
            good_fasta: dir.join("good_contigs.fasta"),
            medium_fasta: dir.join("medium_contigs.fasta"),
            problem_list: dir.join("problem_specimens.txt"),
            quarantine_dir: dir.join("problem_specimens"),
        }
    }

    #[test]
    fn test_classify_assemblies() {
        let dir = tempdir().unwrap();
        let assemblies = dir.path().join("assemblies");
        std::fs::create_dir(&assemblies).unwrap();

        write_assembly(
            &assemblies,
            "spec1.fasta",
            &[("NODE_1_length_650_cov_80.0", 650)],
        );
        write_assembly(
            &assemblies,
            "spec2.fasta",
            &[
                ("NODE_1_length_650_cov_80.0", 650),
                ("NODE_2_length_700_cov_80.0", 700),
            ],
        );
        write_assembly(
            &assemblies,
            "spec3.fasta",
            &[("NODE_1_length_500_cov_80.0", 500)],
        );

        let out = outputs(dir.path());
        let summary =
            classify_assemblies(&assemblies, &ContigThresholds::default(), &out).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.good, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.problematic, 1);
        assert_eq!(summary.parse_failures, 0);

        // selected records are re-identified to their specimen names
        let good = std::fs::read_to_string(&out.good_fasta).unwrap();
        assert!(good.starts_with(">spec1"));
        let medium = std::fs::read_to_string(&out.medium_fasta).unwrap();
        assert!(medium.starts_with(">spec3"));

        let problems = std::fs::read_to_string(&out.problem_list).unwrap();
        assert_eq!(problems, "spec2.fasta\n");
        assert!(out.quarantine_dir.join("spec2.fasta").exists());
    }

    #[test]
    fn test_classify_assemblies_is_idempotent() {
        let dir = tempdir().unwrap();
        let assemblies = dir.path().join("assemblies");
        std::fs::create_dir(&assemblies).unwrap();
        write_assembly(
            &assemblies,
            "spec1.fasta",
            &[("NODE_1_length_650_cov_80.0", 650)],
        );

        let out = outputs(dir.path());
        let first =
            classify_assemblies(&assemblies, &ContigThresholds::default(), &out).unwrap();
        let good_first = std::fs::read_to_string(&out.good_fasta).unwrap();

        let second =
            classify_assemblies(&assemblies, &ContigThresholds::default(), &out).unwrap();
        let good_second = std::fs::read_to_string(&out.good_fasta).unwrap();

        assert_eq!(first, second);
        assert_eq!(good_first, good_second);
    }

    #[test]
    fn test_classify_assemblies_counts_parse_failures() {
        let dir = tempdir().unwrap();
        let assemblies = dir.path().join("assemblies");
        std::fs::create_dir(&assemblies).unwrap();
        write_assembly(&assemblies, "broken.fasta", &[("contig1", 650)]);

        let out = outputs(dir.path());
        let summary =
            classify_assemblies(&assemblies, &ContigThresholds::default(), &out).unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(summary.good + summary.medium + summary.problematic, 0);
    }

    #[test]
    fn test_classify_assemblies_missing_directory() {
        let dir = tempdir().unwrap();
        let out = outputs(dir.path());

        let err = classify_assemblies(
            &dir.path().join("absent"),
            &ContigThresholds::default(),
            &out,
        )
        .unwrap_err();
        assert!(matches!(err, CurateError::FileNotFound(_)));
    }
}
