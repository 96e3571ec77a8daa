//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "mtune")]
#[command(about = "Iterative compiler flag tuning via combined elimination")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for the flag configuration minimizing the measured result
    Tune {
        /// Directory containing the source to build
        #[arg(long, value_name = "DIR")]
        src_dir: PathBuf,

        /// Directory to hold each tuning run
        #[arg(long, value_name = "DIR")]
        run_dir: PathBuf,

        /// Command to use to compile C source
        #[arg(long)]
        cc: String,

        /// Command to use to compile C++ source
        #[arg(long)]
        cxx: String,

        /// Command to use to compile Fortran source
        #[arg(long)]
        fort: String,

        /// Database to store generated compilations in
        #[arg(long, value_name = "FILE")]
        database: PathBuf,

        /// File containing extracted features for the source being built
        #[arg(long, value_name = "FILE")]
        features: PathBuf,

        /// Base optimization level to start from (-O3 or -Os)
        #[arg(long, value_name = "OPT", allow_hyphen_values = true)]
        base_opt: String,

        /// Script to build the benchmarks
        #[arg(long)]
        build_script: String,

        /// Script to measure the resultant executables
        #[arg(long)]
        measure_script: String,

        /// Flags to be used in all compilations
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        build_flags: String,

        /// Flags to use when executing generated programs
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        exec_flags: String,

        /// Number of test builds to run in parallel (0 = auto)
        #[arg(short = 'j', long, default_value = "1")]
        jobs: usize,

        /// Enable wrapper debug output during builds
        #[arg(long)]
        debug: bool,
    },
    /// Extract features with the compiler plugin, without searching
    Extract {
        /// Directory containing the source to build
        #[arg(long, value_name = "DIR")]
        src_dir: PathBuf,

        /// Build directory (must not exist yet)
        #[arg(long, value_name = "DIR")]
        build_dir: PathBuf,

        /// Install directory (must not exist yet)
        #[arg(long, value_name = "DIR")]
        install_dir: PathBuf,

        /// Command to use to compile C source
        #[arg(long)]
        cc: String,

        /// Command to use to compile C++ source
        #[arg(long)]
        cxx: String,

        /// Command to use to compile Fortran source
        #[arg(long)]
        fort: String,

        /// Database to store extracted features into
        #[arg(long, value_name = "FILE")]
        database: PathBuf,

        /// Directory holding the feature extraction plugin
        #[arg(long, value_name = "DIR")]
        lib_dir: PathBuf,

        /// Script to build the benchmarks
        #[arg(long)]
        build_script: String,

        /// File to output the extracted features to
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Common arguments to be used when building
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        build_flags: String,

        /// Enable debug output during feature extraction
        #[arg(long)]
        debug: bool,
    },
}
