//! One build-and-measure trial.
//!
//! A trial owns a fresh `build/` and `install/` pair, builds the source
//! through the wrapper compilers (which record the compilation-id
//! manifest), and measures every installed executable.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::builder::{self, BuildRequest};
use crate::flags::Flag;
use crate::search::{RunTrial, TrialId};
use crate::{WRAPPER_PREFIX, measure, resolver};

/// Failure sentinel for trial results; valid measurements are strictly
/// positive.
pub const FAILED_TRIAL: f64 = 0.0;

/// Everything a trial needs besides its flag vector and directory.
#[derive(Clone, Debug)]
pub struct TrialConfig {
    pub src_dir: PathBuf,
    pub cc: String,
    pub cxx: String,
    pub fort: String,
    pub database: PathBuf,
    pub features: PathBuf,
    pub build_script: String,
    pub measure_script: String,
    /// Operator flags common to all compilations.
    pub base_flags: String,
    /// The base optimization preset, `-O3` or `-Os`.
    pub base_opt: String,
    pub exec_flags: String,
    pub debug: bool,
}

/// Run one trial in `trial_dir`, returning the measured scalar or
/// [`FAILED_TRIAL`].
pub fn run(cfg: &TrialConfig, trial_dir: &Path, flags: &[Flag]) -> f64 {
    run_inner(cfg, trial_dir, flags).unwrap_or(FAILED_TRIAL)
}

fn run_inner(cfg: &TrialConfig, trial_dir: &Path, flags: &[Flag]) -> Option<f64> {
    let build_dir = trial_dir.join("build");
    let install_dir = trial_dir.join("install");
    if build_dir.exists() || install_dir.exists() {
        error!(dir = %trial_dir.display(), "trial directory is already in use");
        return None;
    }
    for dir in [&build_dir, &install_dir] {
        fs::create_dir_all(dir)
            .map_err(|e| error!(error = %e, dir = %dir.display(), "failed to create trial directory"))
            .ok()?;
    }

    let compilations = install_dir.join("compilations.csv");
    let results = install_dir.join("results.csv");

    // The wrappers compile as usual while recording which flags each
    // compilation ran with, keyed by compilation id.
    let cc = format!("{WRAPPER_PREFIX}{}", cfg.cc);
    let cxx = format!("{WRAPPER_PREFIX}{}", cfg.cxx);
    let fort = format!("{WRAPPER_PREFIX}{}", cfg.fort);
    for wrapper in [&cc, &cxx, &fort] {
        if !resolver::is_command_on_path(wrapper) {
            error!(command = %wrapper, "wrapper compiler is not on the path");
            return None;
        }
    }

    let mut parts: Vec<String> = Vec::new();
    if cfg.debug {
        parts.push("-fmageec-debug".to_string());
    }
    parts.push("-fmageec-mode=gather".to_string());
    parts.push(format!("-fmageec-database={}", cfg.database.display()));
    parts.push(format!("-fmageec-features={}", cfg.features.display()));
    parts.push(format!("-fmageec-out={}", compilations.display()));
    if !cfg.base_flags.is_empty() {
        parts.push(cfg.base_flags.clone());
    }
    parts.push(cfg.base_opt.clone());
    parts.extend(flags.iter().map(Flag::token));
    let build_flags = parts.join(" ");

    let built = builder::build(&BuildRequest {
        src_dir: &cfg.src_dir,
        build_dir: &build_dir,
        install_dir: &install_dir,
        build_script: &cfg.build_script,
        cc: &cc,
        cxx: &cxx,
        fort: &fort,
        build_flags: &build_flags,
    })
    .map_err(|e| error!(error = %e, "build failed"))
    .ok()?;
    if !built {
        error!(src = %cfg.src_dir.display(), "failed to build source");
        return None;
    }

    let Some(measure_script) = resolver::resolve_script(&cfg.measure_script) else {
        error!(
            script = %cfg.measure_script,
            "failed to find script to measure benchmark result"
        );
        return None;
    };
    let exec_flags = (!cfg.exec_flags.is_empty()).then_some(cfg.exec_flags.as_str());
    measure::measure_install_tree(&measure_script, &install_dir, &compilations, &results, exec_flags)
}

/// Production trial executor: one `test.<id>` directory per trial under
/// the run directory.
pub struct TrialRunner {
    pub cfg: TrialConfig,
    pub run_dir: PathBuf,
}

impl RunTrial for TrialRunner {
    fn run(&self, id: TrialId, flags: &[Flag]) -> f64 {
        let trial_dir = self.run_dir.join(format!("test.{id}"));
        run(&self.cfg, &trial_dir, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> TrialConfig {
        TrialConfig {
            src_dir: dir.to_path_buf(),
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
            fort: "gfortran".to_string(),
            database: dir.join("db.mageec"),
            features: dir.join("features.csv"),
            build_script: "build.sh".to_string(),
            measure_script: "measure.sh".to_string(),
            base_flags: String::new(),
            base_opt: "-Os".to_string(),
            exec_flags: String::new(),
            debug: false,
        }
    }

    #[test]
    fn test_preexisting_build_dir_fails_trial() {
        let dir = tempfile::tempdir().unwrap();
        let trial_dir = dir.path().join("test.0");
        fs::create_dir_all(trial_dir.join("build")).unwrap();

        let result = run(&config(dir.path()), &trial_dir, &[]);
        assert_eq!(result, FAILED_TRIAL);
    }

    #[test]
    fn test_missing_wrapper_fails_trial() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.cc = "no-such-compiler-zzz".to_string();
        let trial_dir = dir.path().join("test.0");

        let result = run(&cfg, &trial_dir, &[Flag::enabled("dce")]);
        assert_eq!(result, FAILED_TRIAL);
        // The directories were still created; the driver never reuses
        // a trial id, so this is fine.
        assert!(trial_dir.join("build").exists());
    }

    #[test]
    fn test_runner_places_trials_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TrialRunner {
            cfg: config(dir.path()),
            run_dir: dir.path().to_path_buf(),
        };
        // Fails on the missing wrapper, but the trial directory layout
        // is observable.
        let result = RunTrial::run(&runner, 7, &[]);
        assert_eq!(result, FAILED_TRIAL);
        assert!(dir.path().join("test.7").join("install").exists());
    }
}
