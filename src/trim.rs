//! Primer detection and trimming of merged amplicon reads
//!
//! Each merged read is classified by a single-pass state machine: try the
//! Fragment A forward primer first, then every concrete oligo of the
//! degenerate Fragment B reverse primer in expansion order, and fall through
//! to NoPrimer. MatchedA/MatchedB are accepting terminal states; TooShort
//! and NoPrimer are rejecting terminal states. Every read lands in exactly
//! one state, so nothing is dropped silently.

use crate::primers::PrimerSet;
use crate::utils::is_gzipped;
use crate::{AmpliconGeometry, CurateError, CurateResult};
use bio::io::fastq;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// First occurrence of `pattern` in `text`
fn find_subsequence(text: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > text.len() {
        return None;
    }
    text.windows(pattern.len()).position(|window| window == pattern)
}

/// Copy of a read restricted to `[start, end)`, identifier preserved
fn slice_record(record: &fastq::Record, start: usize, end: usize) -> fastq::Record {
    fastq::Record::with_attrs(
        record.id(),
        record.desc(),
        &record.seq()[start..end],
        &record.qual()[start..end],
    )
}

/// Terminal classification of a merged read
#[derive(Debug, Clone)]
pub enum ReadClass {
    /// Fragment A read trimmed to the interior between both primers
    MatchedA(fastq::Record),
    /// Fragment B read trimmed to the window upstream of the reverse primer
    MatchedB(fastq::Record),
    /// A primer was found but the read cannot yield a full fragment
    TooShort,
    /// Neither the forward primer nor any reverse oligo variant was found
    NoPrimer,
}

/// Per-file tallies, returned from each pass and combined by the caller
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrimTally {
    pub total: usize,
    pub fragment_a: usize,
    pub fragment_b: usize,
    pub too_short: usize,
    pub no_primer: usize,
}

impl TrimTally {
    pub fn record(&mut self, class: &ReadClass) {
        self.total += 1;
        match class {
            ReadClass::MatchedA(_) => self.fragment_a += 1,
            ReadClass::MatchedB(_) => self.fragment_b += 1,
            ReadClass::TooShort => self.too_short += 1,
            ReadClass::NoPrimer => self.no_primer += 1,
        }
    }

    /// Reads that ended in a rejecting state
    pub fn rejected(&self) -> usize {
        self.too_short + self.no_primer
    }

    pub fn merge(&mut self, other: &TrimTally) {
        self.total += other.total;
        self.fragment_a += other.fragment_a;
        self.fragment_b += other.fragment_b;
        self.too_short += other.too_short;
        self.no_primer += other.no_primer;
    }

    pub fn summary_line(&self, file_name: &str) -> String {
        format!(
            "File {}, Total Reads: {}, Missing Primers: {}, Reads Too Short: {}, \
             Fragment A Reads: {}, Fragment B Reads: {}, Filtered Out Reads: {}",
            file_name,
            self.total,
            self.no_primer,
            self.too_short,
            self.fragment_a,
            self.fragment_b,
            self.rejected()
        )
    }
}

/// Classify a single merged read against the primer set
///
/// Fragment A: the read is accepted only if it spans `fragment_a_span` bases
/// from the forward-primer position; the trimmed copy keeps the interior
/// between both primers and must have exactly `fragment_a_interior` bases,
/// which rejects partial matches whose position math nominally succeeded.
///
/// Fragment B: the first reverse oligo variant whose first occurrence lies
/// beyond `reverse_min_pos` wins; no best-match search over the remaining
/// variants is attempted. The trimmed copy keeps `fragment_b_interior` bases
/// immediately upstream of the hit. A hit too close to the read origin to
/// fit that window rejects the read as too short.
pub fn classify_read(
    record: &fastq::Record,
    primers: &PrimerSet,
    geometry: &AmpliconGeometry,
) -> ReadClass {
    let seq = record.seq();

    if let Some(index) = find_subsequence(seq, &primers.fragment_a_forward) {
        if seq.len() < index + geometry.fragment_a_span {
            return ReadClass::TooShort;
        }

        let start = index + primers.fragment_a_forward.len();
        let end = std::cmp::min(index + geometry.fragment_a_span + 1, seq.len());
        if start < end && end - start == geometry.fragment_a_interior {
            return ReadClass::MatchedA(slice_record(record, start, end));
        }
        return ReadClass::TooShort;
    }

    for variant in &primers.reverse_variants {
        let index = match find_subsequence(seq, variant) {
            Some(index) if index > geometry.reverse_min_pos => index,
            _ => continue,
        };

        if seq.len() > geometry.fragment_b_min_len && index >= geometry.fragment_b_interior {
            let start = index - geometry.fragment_b_interior;
            return ReadClass::MatchedB(slice_record(record, start, index));
        }
        return ReadClass::TooShort;
    }

    ReadClass::NoPrimer
}

/// Sibling audit file for reads that were not sliced
pub fn unfiltered_path<P: AsRef<Path>>(output: P) -> PathBuf {
    let output = output.as_ref();
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("trimmed");

    let name = match output.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{}_unfiltered.{}", stem, ext),
        None => format!("{}_unfiltered", stem),
    };

    output.with_file_name(name)
}

/// Reject geometry values that cannot describe a real amplicon
pub fn validate_geometry(geometry: &AmpliconGeometry) -> CurateResult<()> {
    if geometry.fragment_a_interior >= geometry.fragment_a_span {
        return Err(CurateError::InvalidConfig(
            "fragment_a_interior must be smaller than fragment_a_span".to_string(),
        ));
    }

    if geometry.fragment_b_interior > geometry.fragment_b_min_len {
        return Err(CurateError::InvalidConfig(
            "fragment_b_interior must not exceed fragment_b_min_len".to_string(),
        ));
    }

    Ok(())
}

/// Trim every read in a merged-read FASTQ file
///
/// Accepted reads are written to `output` (all Fragment A reads first, then
/// all Fragment B reads); rejected reads are written unmodified to the
/// sibling unfiltered file for audit. Gzipped input is handled
/// transparently.
pub fn trim_file<P: AsRef<Path>>(
    input: P,
    primers: &PrimerSet,
    geometry: &AmpliconGeometry,
    output: P,
) -> CurateResult<TrimTally> {
    let file = File::open(&input)
        .map_err(|_| CurateError::FileNotFound(input.as_ref().to_string_lossy().to_string()))?;

    let reader: Box<dyn Read> = if is_gzipped(&input)? {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut tally = TrimTally::default();
    let mut fragment_a_reads = Vec::new();
    let mut fragment_b_reads = Vec::new();
    let mut filtered_out = Vec::new();

    for result in fastq::Reader::new(reader).records() {
        let record = result.map_err(|e| CurateError::InvalidRecord(e.to_string()))?;
        let class = classify_read(&record, primers, geometry);
        tally.record(&class);

        match class {
            ReadClass::MatchedA(cut) => fragment_a_reads.push(cut),
            ReadClass::MatchedB(cut) => fragment_b_reads.push(cut),
            ReadClass::TooShort | ReadClass::NoPrimer => filtered_out.push(record),
        }
    }

    let mut curated = fastq::Writer::new(File::create(&output)?);
    for record in fragment_a_reads.iter().chain(fragment_b_reads.iter()) {
        curated.write_record(record)?;
    }
    curated.flush()?;

    let mut unfiltered = fastq::Writer::new(File::create(unfiltered_path(&output))?);
    for record in &filtered_out {
        unfiltered.write_record(record)?;
    }
    unfiltered.flush()?;

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primers::expand_degenerate;
    use tempfile::tempdir;

    // 25 nt, the length of the supported forward primer
    const FORWARD: &[u8] = b"GGTCAACAAATCATAAAGATATTGG";
    // 26 nt reverse oligo that cannot occur in the A/C filler
    const REVERSE: &[u8] = b"GGGGGGGGGGGGGGGGGGGGGGGGGG";

    fn filler(len: usize) -> Vec<u8> {
        b"AC".iter().copied().cycle().take(len).collect()
    }

    fn read_from(seq: Vec<u8>) -> fastq::Record {
        let qual = vec![b'F'; seq.len()];
        fastq::Record::with_attrs("read1", None, &seq, &qual)
    }

    fn primer_set() -> PrimerSet {
        PrimerSet {
            fragment_a_forward: FORWARD.to_vec(),
            fragment_b_reverse: REVERSE.to_vec(),
            reverse_variants: vec![REVERSE.to_vec()],
        }
    }

    fn fragment_a_read(junk: usize, interior: usize) -> fastq::Record {
        let mut seq = filler(junk);
        seq.extend_from_slice(FORWARD);
        seq.extend_from_slice(&filler(interior));
        read_from(seq)
    }

    #[test]
    fn test_fragment_a_accepted_and_trimmed() {
        let geometry = AmpliconGeometry::default();
        // 5 + 25 + 430 = 460 >= 5 + 454
        let record = fragment_a_read(5, 430);

        match classify_read(&record, &primer_set(), &geometry) {
            ReadClass::MatchedA(cut) => {
                assert_eq!(cut.id(), "read1");
                assert_eq!(cut.seq().len(), 430);
                assert_eq!(cut.seq(), &record.seq()[30..460]);
                assert_eq!(cut.qual().len(), 430);
            }
            other => panic!("expected MatchedA, got {:?}", other),
        }
    }

    #[test]
    fn test_fragment_a_at_read_start() {
        let geometry = AmpliconGeometry::default();
        let record = fragment_a_read(0, 430);

        match classify_read(&record, &primer_set(), &geometry) {
            ReadClass::MatchedA(cut) => assert_eq!(cut.seq(), &record.seq()[25..455]),
            other => panic!("expected MatchedA, got {:?}", other),
        }
    }

    #[test]
    fn test_fragment_a_read_too_short() {
        let geometry = AmpliconGeometry::default();
        // length 445 with the primer at index 5: 5 + 454 > 445
        let record = fragment_a_read(5, 415);
        assert_eq!(record.seq().len(), 445);

        assert!(matches!(
            classify_read(&record, &primer_set(), &geometry),
            ReadClass::TooShort
        ));
    }

    #[test]
    fn test_fragment_a_interior_off_by_one_rejected() {
        let geometry = AmpliconGeometry::default();
        // length exactly index + span leaves a 429-base interior
        let record = fragment_a_read(5, 429);
        assert_eq!(record.seq().len(), 459);

        assert!(matches!(
            classify_read(&record, &primer_set(), &geometry),
            ReadClass::TooShort
        ));
    }

    fn fragment_b_read(hit_at: usize, total_len: usize) -> fastq::Record {
        let mut seq = filler(hit_at);
        seq.extend_from_slice(REVERSE);
        seq.extend_from_slice(&filler(total_len - seq.len()));
        read_from(seq)
    }

    #[test]
    fn test_fragment_b_accepted_and_trimmed() {
        let geometry = AmpliconGeometry::default();
        let record = fragment_b_read(420, 460);

        match classify_read(&record, &primer_set(), &geometry) {
            ReadClass::MatchedB(cut) => {
                assert_eq!(cut.seq().len(), 415);
                assert_eq!(cut.seq(), &record.seq()[5..420]);
            }
            other => panic!("expected MatchedB, got {:?}", other),
        }
    }

    #[test]
    fn test_fragment_b_read_too_short() {
        let geometry = AmpliconGeometry::default();
        // hit beyond the minimum offset but the read itself is too short
        let record = fragment_b_read(410, 445);

        assert!(matches!(
            classify_read(&record, &primer_set(), &geometry),
            ReadClass::TooShort
        ));
    }

    #[test]
    fn test_fragment_b_window_does_not_fit() {
        let geometry = AmpliconGeometry::default();
        // hit at 405 clears reverse_min_pos but not the 415-base window
        let record = fragment_b_read(405, 460);

        assert!(matches!(
            classify_read(&record, &primer_set(), &geometry),
            ReadClass::TooShort
        ));
    }

    #[test]
    fn test_first_reverse_variant_beyond_offset_wins() {
        let geometry = AmpliconGeometry::default();
        let variants = expand_degenerate(b"GGGGGGGGGGGGGGGGGGGGGGGGGR");
        assert_eq!(variants.len(), 2);
        let primers = PrimerSet {
            fragment_a_forward: FORWARD.to_vec(),
            fragment_b_reverse: b"GGGGGGGGGGGGGGGGGGGGGGGGGR".to_vec(),
            reverse_variants: variants,
        };

        // read carries the G-only second variant; the tail opens with C so
        // the A-terminated first variant cannot match one position later
        let mut seq = filler(420);
        seq.extend_from_slice(b"GGGGGGGGGGGGGGGGGGGGGGGGGG");
        seq.push(b'C');
        seq.extend_from_slice(&filler(13));
        let record = read_from(seq);

        match classify_read(&record, &primers, &geometry) {
            ReadClass::MatchedB(cut) => assert_eq!(cut.seq(), &record.seq()[5..420]),
            other => panic!("expected MatchedB, got {:?}", other),
        }
    }

    #[test]
    fn test_no_primer() {
        let geometry = AmpliconGeometry::default();
        let record = read_from(filler(460));

        assert!(matches!(
            classify_read(&record, &primer_set(), &geometry),
            ReadClass::NoPrimer
        ));
    }

    #[test]
    fn test_empty_variant_list_gives_no_primer() {
        let geometry = AmpliconGeometry::default();
        let primers = PrimerSet {
            fragment_a_forward: FORWARD.to_vec(),
            fragment_b_reverse: Vec::new(),
            reverse_variants: Vec::new(),
        };
        let record = fragment_b_read(420, 460);

        assert!(matches!(
            classify_read(&record, &primers, &geometry),
            ReadClass::NoPrimer
        ));
    }

    #[test]
    fn test_tally_record_and_merge() {
        let mut tally = TrimTally::default();
        tally.record(&ReadClass::TooShort);
        tally.record(&ReadClass::NoPrimer);
        tally.record(&ReadClass::NoPrimer);

        let mut other = TrimTally::default();
        other.record(&ReadClass::MatchedA(read_from(filler(10))));
        other.merge(&tally);

        assert_eq!(other.total, 4);
        assert_eq!(other.fragment_a, 1);
        assert_eq!(other.too_short, 1);
        assert_eq!(other.no_primer, 2);
        assert_eq!(other.rejected(), 3);
    }

    #[test]
    fn test_unfiltered_path() {
        assert_eq!(
            unfiltered_path(Path::new("out/trimmed.fq")),
            PathBuf::from("out/trimmed_unfiltered.fq")
        );
        assert_eq!(
            unfiltered_path(Path::new("trimmed")),
            PathBuf::from("trimmed_unfiltered")
        );
    }

    #[test]
    fn test_validate_geometry() {
        assert!(validate_geometry(&AmpliconGeometry::default()).is_ok());

        let bad = AmpliconGeometry {
            fragment_a_interior: 500,
            ..AmpliconGeometry::default()
        };
        assert!(matches!(
            validate_geometry(&bad),
            Err(CurateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_trim_file_round_trip() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("merged.fq");
        let output = dir.path().join("trimmed.fq");

        let reads = vec![
            ("a_read", fragment_a_read(5, 430)),
            ("b_read", fragment_b_read(420, 460)),
            ("junk", read_from(filler(460))),
        ];

        {
            let mut writer = fastq::Writer::to_file(&input).unwrap();
            for (id, record) in &reads {
                writer
                    .write(id, None, record.seq(), record.qual())
                    .unwrap();
            }
        }

        let geometry = AmpliconGeometry::default();
        let tally = trim_file(&input, &primer_set(), &geometry, &output).unwrap();

        assert_eq!(tally.total, 3);
        assert_eq!(tally.fragment_a, 1);
        assert_eq!(tally.fragment_b, 1);
        assert_eq!(tally.no_primer, 1);
        assert_eq!(tally.rejected(), 1);

        let curated: Vec<_> = fastq::Reader::from_file(&output)
            .unwrap()
            .records()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(curated.len(), 2);
        // Fragment A reads precede Fragment B reads
        assert_eq!(curated[0].id(), "a_read");
        assert_eq!(curated[0].seq(), &reads[0].1.seq()[30..460]);
        assert_eq!(curated[1].id(), "b_read");
        assert_eq!(curated[1].seq(), &reads[1].1.seq()[5..420]);

        let unfiltered: Vec<_> = fastq::Reader::from_file(unfiltered_path(&output))
            .unwrap()
            .records()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(unfiltered.len(), 1);
        assert_eq!(unfiltered[0].id(), "junk");
        assert_eq!(unfiltered[0].seq(), reads[2].1.seq());
    }

    #[test]
    fn test_trim_file_missing_input() {
        let dir = tempdir().unwrap();
        let geometry = AmpliconGeometry::default();
        let err = trim_file(
            &dir.path().join("absent.fq"),
            &primer_set(),
            &geometry,
            &dir.path().join("out.fq"),
        )
        .unwrap_err();

        assert!(matches!(err, CurateError::FileNotFound(_)));
    }
}
