//! Code size measurement tool.
//!
//! Implements the measure-script contract for the code size objective:
//! prints the total measured size on stdout and appends per-compilation
//! result rows to the output file. The driver parses stdout as the
//! per-executable result, so all diagnostics go to stderr.

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mtune::{Error, Result, manifest, resolver, sizes};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "mtune-measure-size")]
#[command(about = "Measure per-compilation code size of an executable")]
#[command(version)]
struct Args {
    /// Path to the executable
    #[arg(long, value_name = "FILE")]
    exec_path: PathBuf,

    /// File containing the compilation ids for the executable
    #[arg(long, value_name = "FILE")]
    compilation_ids: PathBuf,

    /// Output file to append executable results to
    #[arg(long, value_name = "FILE")]
    out: PathBuf,

    /// Flags to use when executing the program (accepted for the
    /// measure-script contract; size measurement never runs it)
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    #[allow(dead_code)]
    exec_flags: String,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "mtune=debug" } else { "mtune=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().unwrap()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(total) => {
            println!("{total}");
            std::process::exit(EXIT_SUCCESS);
        }
        Err(e) => {
            error!(error = %e, exec = %args.exec_path.display(), "failed to measure executable");
            // The contract still expects a scalar on stdout.
            println!("0");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(args: &Args) -> Result<u64> {
    let exec_path = resolver::absolutize(&args.exec_path)?;
    let compilation_ids = resolver::absolutize(&args.compilation_ids)?;
    let out = resolver::absolutize(&args.out)?;

    for path in [&exec_path, &compilation_ids] {
        if !path.exists() {
            return Err(Error::MissingPath(path.clone()));
        }
    }

    let compilations = manifest::read_compilation_ids(&compilation_ids)?;
    sizes::measure_executable(&exec_path, &compilations, &out)
}
