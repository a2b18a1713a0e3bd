#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point: runs the synthetic workload sequentially, then on worker threads, and
//! prints the timing and heap lines of both modes.
//!
//! Excluded from mutation testing; the integration tests drive it as a subprocess.

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use load_compare::{
    Harness, HeapTracker, ModeReport, ModeSelection, RunConfig, SyntheticTask, WorkloadProfile,
};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOCATOR: HeapTracker<std::alloc::System> = HeapTracker::system();

/// Compare sequential and multithreaded execution of an identical synthetic workload.
#[derive(FromArgs)]
struct Args {
    /// task invocations per worker (default 20)
    #[argh(option, default = "RunConfig::DEFAULT_REPETITIONS")]
    repetitions: u64,

    /// number of workers, or outer iterations in sequential mode (default 20)
    #[argh(option, default = "RunConfig::DEFAULT_CONCURRENCY")]
    concurrency: usize,

    /// which modes to run: sequential, concurrent or both (default both)
    #[argh(option, default = "ModeSelection::Both")]
    mode: ModeSelection,

    /// dimension of the matrices multiplied by each task (default 200)
    #[argh(option, default = "WorkloadProfile::REFERENCE.matrix_size")]
    matrix_size: u32,

    /// directory for the per-task scratch files (default: current directory)
    #[argh(option, default = "PathBuf::from(\".\")")]
    scratch_dir: PathBuf,

    /// log harness progress to standard error
    #[argh(switch, short = 'v')]
    verbose: bool,
}

#[cfg_attr(test, mutants::skip)]
fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "load_compare=debug"
    } else {
        "load_compare=warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    init_logging(args.verbose);

    let config = RunConfig::new(args.repetitions, args.concurrency);
    let task = SyntheticTask::new(
        WorkloadProfile::REFERENCE.with_matrix_size(args.matrix_size),
        args.scratch_dir,
    );
    let harness = Harness::new(config, &task);

    let output = match args.mode {
        ModeSelection::Both => harness.compare().map(|comparison| comparison.to_string()),
        selection => selection
            .modes()
            .iter()
            .map(|&mode| {
                harness
                    .run(mode)
                    .map(|report| format!("{}\n{report}", ModeReport::heading(mode)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|sections| sections.join("\n\n")),
    };

    match output {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
