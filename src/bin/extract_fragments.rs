//! CLI binary for fragment extraction and contamination screening

use clap::Parser;
use co1curate_rs::{
    fragments::extract_fragments,
    utils::{validate_file_readable, Timer},
    CurateError, CurateResult,
};
use env_logger::Env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "extract_fragments")]
#[command(about = "Extracts the two dominant read clusters of a specimen and merges them")]
#[command(long_about = "
Reads one specimen's dereplicated cluster FASTA, ordered by descending
abundance as produced by the dereplication step. The two most abundant
clusters become Fragment A and Fragment B and are written to their own
files; every later cluster whose abundance exceeds 10% of the top cluster
is flagged as possible contamination and written to the contamination file
(the file is always created, empty when nothing was flagged).

The fragment pair is then merged with the external pairwise merge tool,
producing the merge report and the merged consensus sequence consumed by
the evaluation step. The merge subprocess is bounded by a timeout; a
timeout, non-zero exit, or empty output counts as a failure for this
specimen only.
")]
struct Args {
    /// Dereplicated cluster FASTA for one specimen
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Output directory; its basename becomes the specimen file prefix
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Pairwise merge executable to invoke
    #[arg(long, value_name = "CMD", default_value = "merger")]
    merger: String,

    /// Timeout for the merge subprocess, in seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,

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

    log::info!("Starting fragment extraction");
    log::info!("Input clusters: {:?}", args.input);
    log::info!("Output directory: {:?}", args.output_dir);
    log::info!("Merge tool: {}", args.merger);

    validate_file_readable(&args.input)?;

    let _timer = Timer::new("Extracting fragments");
    let outcome = extract_fragments(
        &args.input,
        &args.output_dir,
        &args.merger,
        Duration::from_secs(args.timeout),
    )?;

    match outcome {
        Some(files) => {
            println!("Fragment A: {}", files.fragment_a.display());
            println!("Fragment B: {}", files.fragment_b.display());
            println!("Contamination: {}", files.contamination.display());
            println!("Merge report: {}", files.merge_report.display());
            println!("Merged sequence: {}", files.merged_fasta.display());
            log::info!("Fragment extraction completed successfully");
        }
        None => {
            println!(
                "Skipped {}: fewer than two clusters, no fragments extractable",
                args.input.display()
            );
        }
    }

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: CurateError) -> ! {
    match error {
        CurateError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the cluster file exists and is readable.");
        }
        CurateError::InvalidRecord(msg) => {
            eprintln!("Error: Invalid sequence record: {}", msg);
            eprintln!("Please check that cluster headers carry a size annotation.");
        }
        CurateError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
        }
        CurateError::ExternalTool(msg) => {
            eprintln!("Error: External tool failure: {}", msg);
            eprintln!("Please check that the merge tool is installed and on PATH.");
        }
        CurateError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        CurateError::Csv(ref e) => {
            eprintln!("Error: CSV processing error: {}", e);
            eprintln!("This is unexpected in the extraction workflow. Please report this issue.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
