//! Primer file parsing and degenerate-primer expansion

use crate::{CurateError, CurateResult};
use bio::alphabets::dna;
use bio::io::fasta;
use std::fs::File;
use std::path::Path;

/// Concrete bases encoded by an IUPAC nucleotide letter, in A,C,G,T order
fn iupac_bases(letter: u8) -> &'static [u8] {
    match letter.to_ascii_uppercase() {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' => b"T",
        b'M' => b"AC",
        b'R' => b"AG",
        b'W' => b"AT",
        b'S' => b"CG",
        b'Y' => b"CT",
        b'K' => b"GT",
        b'V' => b"ACG",
        b'H' => b"ACT",
        b'D' => b"AGT",
        b'B' => b"CGT",
        b'N' => b"ACGT",
        _ => b"",
    }
}

/// Number of positions in a pattern holding an ambiguity code
pub fn degeneracy(pattern: &[u8]) -> usize {
    pattern
        .iter()
        .filter(|&&letter| iupac_bases(letter).len() > 1)
        .count()
}

/// Exhaustively expand a degenerate pattern into concrete oligos.
///
/// The expansion is deterministic: each position contributes its bases in
/// A,C,G,T order, with the leftmost position varying slowest. Every variant
/// has the exact length of the pattern. A pattern containing a letter with
/// no IUPAC meaning expands to no variants at all.
pub fn expand_degenerate(pattern: &[u8]) -> Vec<Vec<u8>> {
    let mut variants: Vec<Vec<u8>> = vec![Vec::with_capacity(pattern.len())];

    for &letter in pattern {
        let bases = iupac_bases(letter);
        if bases.is_empty() {
            return Vec::new();
        }

        let mut extended = Vec::with_capacity(variants.len() * bases.len());
        for variant in &variants {
            for &base in bases {
                let mut oligo = variant.clone();
                oligo.push(base);
                extended.push(oligo);
            }
        }
        variants = extended;
    }

    variants
}

/// Read primer sequences in file order, reverse-complementing every second
/// record. Reverse complementing is IUPAC-aware, so degenerate reverse
/// primers keep their ambiguity codes.
pub fn read_primers<P: AsRef<Path>>(path: P) -> CurateResult<Vec<Vec<u8>>> {
    let file = File::open(&path)
        .map_err(|_| CurateError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let mut primers = Vec::new();
    for (index, result) in fasta::Reader::new(file).records().enumerate() {
        let record = result?;
        if (index + 1) % 2 == 0 {
            primers.push(dna::revcomp(record.seq()));
        } else {
            primers.push(record.seq().to_vec());
        }
    }

    Ok(primers)
}

/// The primers driving read classification
///
/// The primer file holds forward and reverse primers alternately, one
/// forward/reverse pair per fragment: Fragment A first, Fragment B second.
/// Only the Fragment A forward primer and the (degenerate) Fragment B
/// reverse primer take part in classification.
#[derive(Debug, Clone)]
pub struct PrimerSet {
    pub fragment_a_forward: Vec<u8>,
    pub fragment_b_reverse: Vec<u8>,
    /// Concrete oligos of the degenerate reverse primer, in expansion order
    pub reverse_variants: Vec<Vec<u8>>,
}

impl PrimerSet {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CurateResult<Self> {
        let primers = read_primers(&path)?;

        if primers.len() < 4 {
            return Err(CurateError::InvalidConfig(format!(
                "primer file {} holds {} records, expected at least 4 (two forward/reverse pairs)",
                path.as_ref().display(),
                primers.len()
            )));
        }

        let fragment_a_forward = primers[0].clone();
        let fragment_b_reverse = primers[3].clone();
        let reverse_variants = expand_degenerate(&fragment_b_reverse);

        if reverse_variants.is_empty() {
            log::warn!(
                "Reverse primer {} expanded to no oligo variants; no Fragment B read will match",
                String::from_utf8_lossy(&fragment_b_reverse)
            );
        } else {
            log::info!(
                "Reverse primer has {} ambiguous positions, {} oligo variants",
                degeneracy(&fragment_b_reverse),
                reverse_variants.len()
            );
        }

        Ok(Self {
            fragment_a_forward,
            fragment_b_reverse,
            reverse_variants,
        })
    }
}
