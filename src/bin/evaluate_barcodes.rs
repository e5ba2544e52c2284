//! CLI binary for final consensus validation

use clap::Parser;
use co1curate_rs::{
    consensus::evaluate_consensus_dirs,
    utils::{ensure_parent_dirs, get_num_cpus, Timer},
    BarcodeCriteria, CurateError, CurateResult,
};
use env_logger::Env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evaluate_barcodes")]
#[command(about = "Validates merged consensus barcodes and aggregates the accepted set")]
#[command(long_about = "
Walks every specimen directory under the consensus parent directory. A
directory must hold exactly five files (merged sequence, merge report,
fragment A, fragment B, contamination flag); incomplete directories are
recorded with every criterion marked NA and excluded from the curated set.

For complete directories the merged sequence length, the fragment read
counts and identity percentage from the merge report, and the contamination
flag file are combined into per-specimen accept/reject verdicts. One row
per specimen is written to the summary table; accepted barcodes are
aggregated into the curated FASTA.
")]
struct Args {
    /// Parent directory of per-specimen consensus directories
    #[arg(long, value_name = "DIR")]
    consensus_dir: PathBuf,

    /// Summary table with one row per specimen
    #[arg(long, value_name = "FILE", default_value = "barcode_summary.csv")]
    summary: PathBuf,

    /// Aggregate FASTA of accepted barcodes
    #[arg(long, value_name = "FILE", default_value = "curated_barcodes.fasta")]
    curated: PathBuf,

    /// Exact length of a full-length barcode
    #[arg(long, default_value_t = 646)]
    expected_length: usize,

    /// Expected identity percentage as formatted by the merge tool
    #[arg(long, default_value = "30.8")]
    expected_identity: String,

    /// Disable the identity criterion
    #[arg(long)]
    skip_identity: bool,

    /// Combined fragment read count must strictly exceed this
    #[arg(long, default_value_t = 40)]
    min_reads: u64,

    /// Number of threads to use for parallel evaluation
    #[arg(long, default_value_t = get_num_cpus())]
    num_threads: usize,

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

    log::info!("Starting consensus evaluation");
    log::info!("Consensus directory: {:?}", args.consensus_dir);
    log::info!("Summary table: {:?}", args.summary);
    log::info!("Curated output: {:?}", args.curated);
    log::info!("Number of threads: {}", args.num_threads);

    if args.num_threads == 0 {
        return Err(CurateError::InvalidConfig(
            "num_threads must be at least 1".to_string(),
        ));
    }

    ensure_parent_dirs(&args.summary)?;
    ensure_parent_dirs(&args.curated)?;

    let criteria = BarcodeCriteria {
        expected_length: args.expected_length,
        expected_identity: if args.skip_identity {
            None
        } else {
            Some(args.expected_identity.clone())
        },
        min_read_total: args.min_reads,
    };

    let _timer = Timer::new("Evaluating consensus directories");
    let summary = evaluate_consensus_dirs(
        &args.consensus_dir,
        &criteria,
        &args.summary,
        &args.curated,
        args.num_threads,
    )?;

    println!("Total Specimens: {}", summary.total);
    println!("Accepted Barcodes: {}", summary.accepted);
    println!("Incomplete Specimens: {}", summary.not_applicable);

    if summary.total > 0 {
        let rate = (summary.accepted as f64 / summary.total as f64) * 100.0;
        log::info!("Acceptance rate: {:.1}%", rate);
    }

    log::info!("Summary written to: {:?}", args.summary);
    log::info!("Curated barcodes written to: {:?}", args.curated);
    log::info!("Evaluation completed successfully");

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: CurateError) -> ! {
    match error {
        CurateError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the consensus directory exists and is readable.");
        }
        CurateError::InvalidRecord(msg) => {
            eprintln!("Error: Invalid sequence record: {}", msg);
            eprintln!("Please check the merge reports and consensus FASTA files.");
        }
        CurateError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check your criteria parameters.");
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
            eprintln!("Please check the summary output path.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
