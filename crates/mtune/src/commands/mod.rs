//! Command implementations.

mod extract;
mod tune;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Tune {
            src_dir,
            run_dir,
            cc,
            cxx,
            fort,
            database,
            features,
            base_opt,
            build_script,
            measure_script,
            build_flags,
            exec_flags,
            jobs,
            debug,
        } => tune::cmd_tune(
            src_dir,
            run_dir,
            cc,
            cxx,
            fort,
            database,
            features,
            base_opt,
            build_script,
            measure_script,
            build_flags,
            exec_flags,
            *jobs,
            *debug,
        ),
        Commands::Extract {
            src_dir,
            build_dir,
            install_dir,
            cc,
            cxx,
            fort,
            database,
            lib_dir,
            build_script,
            out,
            build_flags,
            debug,
        } => extract::cmd_extract(
            src_dir,
            build_dir,
            install_dir,
            cc,
            cxx,
            fort,
            database,
            lib_dir,
            build_script,
            out,
            build_flags,
            *debug,
        ),
    }
}
