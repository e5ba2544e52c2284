//! CLI binary for primer detection and read trimming

use clap::Parser;
use co1curate_rs::{
    primers::PrimerSet,
    trim::{trim_file, unfiltered_path, validate_geometry},
    utils::{ensure_parent_dirs, validate_file_readable, Timer},
    AmpliconGeometry, CurateError, CurateResult,
};
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trim_reads")]
#[command(about = "Trims merged CO1 amplicon reads of their degenerate primers")]
#[command(long_about = "
Scans each merged read for the Fragment A forward primer and, failing that,
for every concrete oligo of the degenerate Fragment B reverse primer.
Matched reads are trimmed to their fragment interiors at fixed offsets;
reads that are too short for a full fragment or carry no primer at all are
diverted to the unfiltered audit file next to the output.

The primer file holds forward and reverse primers alternately, one pair per
fragment; every second record is reverse-complemented on load. The offsets
are specific to the supported amplicon and primer set, so the tool expects
the standard dual-fragment CO1 configuration.

Gzipped input FASTQ files are read transparently.
")]
struct Args {
    /// Merged read file in FASTQ format (optionally gzipped)
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Primer file in FASTA format
    #[arg(long, value_name = "FILE")]
    primers: PathBuf,

    /// Curated output FASTQ; rejected reads go to the sibling unfiltered file
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn run() -> CurateResult<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting read trimming");
    log::info!("Input reads: {:?}", args.input);
    log::info!("Primer file: {:?}", args.primers);
    log::info!("Output file: {:?}", args.output);

    validate_file_readable(&args.input)?;
    validate_file_readable(&args.primers)?;
    ensure_parent_dirs(&args.output)?;

    let geometry = AmpliconGeometry::default();
    validate_geometry(&geometry)?;

    let primer_set = PrimerSet::from_file(&args.primers)?;
    log::info!(
        "Forward primer: {}",
        String::from_utf8_lossy(&primer_set.fragment_a_forward)
    );
    log::info!(
        "Reverse primer: {} ({} oligo variants)",
        String::from_utf8_lossy(&primer_set.fragment_b_reverse),
        primer_set.reverse_variants.len()
    );

    let _timer = Timer::new("Trimming reads");
    let tally = trim_file(&args.input, &primer_set, &geometry, &args.output)?;

    let file_name = args
        .input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    println!("{}", tally.summary_line(file_name));

    log::info!("Curated reads written to: {:?}", args.output);
    log::info!(
        "Unfiltered reads written to: {:?}",
        unfiltered_path(&args.output)
    );
    log::info!("Trimming completed successfully");

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: CurateError) -> ! {
    match error {
        CurateError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the read and primer files exist and are readable.");
        }
        CurateError::InvalidRecord(msg) => {
            eprintln!("Error: Invalid sequence record: {}", msg);
            eprintln!("Please check that your FASTQ file is properly formatted.");
        }
        CurateError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("The primer file must hold two forward/reverse primer pairs.");
        }
        CurateError::ExternalTool(msg) => {
            eprintln!("Error: External tool failure: {}", msg);
        }
        CurateError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        CurateError::Csv(ref e) => {
            eprintln!("Error: CSV processing error: {}", e);
            eprintln!("This is unexpected in the trimming workflow. Please report this issue.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
