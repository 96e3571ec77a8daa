//! Combined elimination tuning command.

use std::fs;
use std::path::Path;

use tracing::{error, info};

use mtune::builder::{self, BuildRequest};
use mtune::search::{self, SearchOutcome};
use mtune::trial::{TrialConfig, TrialRunner};
use mtune::{Error, Result, flags, resolver};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `tune` command.
#[allow(clippy::too_many_arguments)]
pub fn cmd_tune(
    src_dir: &Path,
    run_dir: &Path,
    cc: &str,
    cxx: &str,
    fort: &str,
    database: &Path,
    features: &Path,
    base_opt: &str,
    build_script: &str,
    measure_script: &str,
    build_flags: &str,
    exec_flags: &str,
    jobs: usize,
    debug: bool,
) -> i32 {
    match run_tune(
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
    ) {
        Ok(outcome) => {
            let tokens: Vec<String> = outcome.best_flags.iter().map(|f| f.token()).collect();
            info!(
                result = outcome.best_result,
                trials = outcome.trials,
                flags = %tokens.join(" "),
                "tuning complete"
            );
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "tuning failed");
            EXIT_FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_tune(
    src_dir: &Path,
    run_dir: &Path,
    cc: &str,
    cxx: &str,
    fort: &str,
    database: &Path,
    features: &Path,
    base_opt: &str,
    build_script: &str,
    measure_script: &str,
    build_flags: &str,
    exec_flags: &str,
    jobs: usize,
    debug: bool,
) -> Result<SearchOutcome> {
    let src_dir = resolver::absolutize(src_dir)?;
    let run_dir = resolver::absolutize(run_dir)?;
    let database = resolver::absolutize(database)?;
    let features = resolver::absolutize(features)?;

    for path in [&src_dir, &run_dir, &database, &features] {
        if !path.exists() {
            return Err(Error::MissingPath(path.clone()));
        }
    }
    for cmd in [cc, cxx, fort] {
        if !resolver::is_command_on_path(cmd) {
            return Err(Error::CommandNotFound(cmd.to_string()));
        }
    }

    let base_opt = base_opt.trim();
    if base_opt != "-O3" && base_opt != "-Os" {
        return Err(Error::InvalidBaseOpt(base_opt.to_string()));
    }

    let jobs = if jobs == 0 {
        num_cpus::get().saturating_sub(2).max(1)
    } else {
        jobs
    };

    let version = flags::detect_compiler_version(cc)?;
    let candidates = flags::candidates(version);
    info!(version, candidates = candidates.len(), "detected compiler version");

    baseline_build(
        &src_dir,
        &run_dir,
        cc,
        cxx,
        fort,
        build_script,
        build_flags,
        base_opt,
    )?;

    let runner = TrialRunner {
        cfg: TrialConfig {
            src_dir,
            cc: cc.to_string(),
            cxx: cxx.to_string(),
            fort: fort.to_string(),
            database,
            features,
            build_script: build_script.to_string(),
            measure_script: measure_script.to_string(),
            base_flags: build_flags.to_string(),
            base_opt: base_opt.to_string(),
            exec_flags: exec_flags.to_string(),
            debug,
        },
        run_dir,
    };
    search::run(&runner, candidates, jobs)
}

/// Build once at the bare preset. The result is never measured; it
/// proves the source builds before the search commits hours to it and
/// leaves a reference tree under `base/`.
#[allow(clippy::too_many_arguments)]
fn baseline_build(
    src_dir: &Path,
    run_dir: &Path,
    cc: &str,
    cxx: &str,
    fort: &str,
    build_script: &str,
    build_flags: &str,
    base_opt: &str,
) -> Result<()> {
    let build_dir = run_dir.join("base").join("build");
    let install_dir = run_dir.join("base").join("install");
    for dir in [&build_dir, &install_dir] {
        if dir.exists() {
            return Err(Error::PathExists(dir.clone()));
        }
        fs::create_dir_all(dir)?;
    }

    let flags = if build_flags.is_empty() {
        base_opt.to_string()
    } else {
        format!("{build_flags} {base_opt}")
    };
    let ok = builder::build(&BuildRequest {
        src_dir,
        build_dir: &build_dir,
        install_dir: &install_dir,
        build_script,
        cc,
        cxx,
        fort,
        build_flags: &flags,
    })?;
    if ok { Ok(()) } else { Err(Error::BaselineBuildFailed) }
}
