//! CLI binary for contig quality classification

use clap::Parser;
use co1curate_rs::{
    contigs::{classify_assemblies, ClassifierOutputs},
    utils::{ensure_parent_dirs, Timer},
    ContigThresholds, CurateError, CurateResult,
};
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "classify_contigs")]
#[command(about = "Selects the best assembled contig per specimen and quarantines problem cases")]
#[command(long_about = "
Classifies the assembled contigs of every specimen in a directory. A contig
qualifies as good when its coverage and length clear the configured
thresholds, and as medium when only the length falls into the lower band.
A specimen contributes exactly one contig to the good or medium aggregate
FASTA; specimens with zero or several qualifying contigs are recorded in the
problem list and their assembly files are copied into the quarantine
directory for manual inspection.

Coverage is read from the trailing underscore-separated field of each contig
header, as written by the assembler.
")]
struct Args {
    /// Directory containing per-specimen assembly FASTA files
    #[arg(long, value_name = "DIR")]
    assemblies: PathBuf,

    /// Aggregate FASTA receiving good-quality contigs
    #[arg(long, value_name = "FILE", default_value = "good_contigs.fasta")]
    good_output: PathBuf,

    /// Aggregate FASTA receiving medium-quality contigs
    #[arg(long, value_name = "FILE", default_value = "medium_contigs.fasta")]
    medium_output: PathBuf,

    /// List of specimens needing manual inspection
    #[arg(long, value_name = "FILE", default_value = "problem_specimens.txt")]
    problem_list: PathBuf,

    /// Directory receiving copies of problematic assemblies
    #[arg(long, value_name = "DIR", default_value = "problem_specimens")]
    quarantine_dir: PathBuf,

    /// Minimum coverage a contig must exceed to qualify
    #[arg(long, default_value_t = 50.0)]
    min_coverage: f64,

    /// Length a contig must exceed to be good quality
    #[arg(long, default_value_t = 600)]
    good_min_length: usize,

    /// Length a contig must exceed to be medium quality
    #[arg(long, default_value_t = 400)]
    medium_min_length: usize,

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

    log::info!("Starting contig classification");
    log::info!("Assembly directory: {:?}", args.assemblies);
    log::info!("Good output: {:?}", args.good_output);
    log::info!("Medium output: {:?}", args.medium_output);
    log::info!("Quarantine directory: {:?}", args.quarantine_dir);

    if args.medium_min_length >= args.good_min_length {
        return Err(CurateError::InvalidConfig(
            "medium_min_length must be below good_min_length".to_string(),
        ));
    }

    ensure_parent_dirs(&args.good_output)?;
    ensure_parent_dirs(&args.medium_output)?;
    ensure_parent_dirs(&args.problem_list)?;

    let thresholds = ContigThresholds {
        min_coverage: args.min_coverage,
        good_min_length: args.good_min_length,
        medium_min_length: args.medium_min_length,
    };
    let outputs = ClassifierOutputs {
        good_fasta: args.good_output.clone(),
        medium_fasta: args.medium_output.clone(),
        problem_list: args.problem_list.clone(),
        quarantine_dir: args.quarantine_dir.clone(),
    };

    let _timer = Timer::new("Classifying assemblies");
    let summary = classify_assemblies(&args.assemblies, &thresholds, &outputs)?;

    println!("Total Assemblies: {}", summary.total);
    println!("Good Quality Contigs: {}", summary.good);
    println!("Medium Quality Contigs: {}", summary.medium);
    println!("Problem Assemblies: {}", summary.problematic);
    if summary.parse_failures > 0 {
        println!("Unparsable Assemblies: {}", summary.parse_failures);
    }

    log::info!("Classification completed successfully");

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: CurateError) -> ! {
    match error {
        CurateError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the assembly directory exists and is readable.");
        }
        CurateError::InvalidRecord(msg) => {
            eprintln!("Error: Invalid sequence record: {}", msg);
            eprintln!("Please check that your assembly FASTA headers carry a coverage field.");
        }
        CurateError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check your threshold parameters.");
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
            eprintln!("This is unexpected in the classification workflow. Please report this issue.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
