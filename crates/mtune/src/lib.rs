//! mtune - combined elimination tuning of compiler optimization flags.
//!
//! Starting from a base optimization preset with every individually
//! controllable flag enabled, the search disables flags one at a time,
//! keeping a flip whenever a rebuilt-and-remeasured benchmark improves
//! on the best result so far. Builds go through an operator-supplied
//! build script; results come from a measurement script run against
//! every executable the build installs.

pub mod builder;
pub mod flags;
pub mod manifest;
pub mod measure;
pub mod resolver;
pub mod search;
pub mod sizes;
pub mod trial;

use std::path::PathBuf;

use thiserror::Error;

/// Prefix turning a compiler command into its wrapper, which compiles
/// as usual while recording the compilation-id manifest.
pub const WRAPPER_PREFIX: &str = "mageec-";

/// Feature extraction plugin loaded by the compiler during `extract`.
pub const GCC_PLUGIN_NAME: &str = "libgcc_feature_extract";

/// Driver errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ELF error: {0}")]
    Elf(#[from] mtune_elf::ElfError),
    #[error("Path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("Path already exists: {0}")]
    PathExists(PathBuf),
    #[error("Command is not on the path: {0}")]
    CommandNotFound(String),
    #[error("Cannot parse compiler version from {0:?}")]
    VersionParse(String),
    #[error("Invalid base optimization level {0:?}, expected -O3 or -Os")]
    InvalidBaseOpt(String),
    #[error("Baseline build failed")]
    BaselineBuildFailed,
    #[error("Initial test run failed")]
    InitialTrialFailed,
    #[error("Build failed during {0}")]
    BuildFailed(&'static str),
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
