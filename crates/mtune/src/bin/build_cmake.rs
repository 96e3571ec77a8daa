//! Reference build script for CMake projects.
//!
//! Implements the build-script contract: configure with CMake, then
//! `make` and `make install` inside the build directory. Useful as-is
//! for benchmarks with a plain CMake build, and as a template for
//! custom build scripts.

use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mtune::{Error, Result, resolver};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "mtune-build-cmake")]
#[command(about = "Build a project using CMake and Makefiles")]
#[command(version)]
struct Args {
    /// Directory containing the source to build
    #[arg(long, value_name = "DIR")]
    src_dir: PathBuf,

    /// Directory to hold the build files
    #[arg(long, value_name = "DIR")]
    build_dir: PathBuf,

    /// Directory to hold the installed files
    #[arg(long, value_name = "DIR")]
    install_dir: PathBuf,

    /// Command to use to compile C source
    #[arg(long)]
    cc: String,

    /// Command to use to compile C++ source
    #[arg(long)]
    cxx: String,

    /// Command to use to compile Fortran source (accepted for the
    /// build-script contract; the CMake configuration ignores it)
    #[arg(long)]
    #[allow(dead_code)]
    fort: String,

    /// Flags to be used in all compilations
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    build_flags: String,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mtune=info".parse().unwrap()))
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            error!(error = %e, "build failed");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let src_dir = resolver::absolutize(&args.src_dir)?;
    let build_dir = resolver::absolutize(&args.build_dir)?;
    let install_dir = resolver::absolutize(&args.install_dir)?;

    for dir in [&src_dir, &build_dir, &install_dir] {
        if !dir.exists() {
            return Err(Error::MissingPath(dir.clone()));
        }
    }
    for cmd in ["cmake", "make", args.cc.as_str(), args.cxx.as_str()] {
        if !resolver::is_command_on_path(cmd) {
            return Err(Error::CommandNotFound(cmd.to_string()));
        }
    }

    let mut configure = Command::new("cmake");
    configure
        .current_dir(&build_dir)
        .arg(&src_dir)
        .args(["-G", "Unix Makefiles"])
        .arg(format!("-DCMAKE_C_COMPILER={}", args.cc))
        .arg(format!("-DCMAKE_CXX_COMPILER={}", args.cxx));
    if !args.build_flags.is_empty() {
        configure
            .arg(format!("-DCMAKE_C_FLAGS={}", args.build_flags))
            .arg(format!("-DCMAKE_CXX_FLAGS={}", args.build_flags));
    }
    configure.arg(format!("-DCMAKE_INSTALL_PREFIX={}", install_dir.display()));
    run_step(configure, &build_dir, "configure")?;

    let mut build = Command::new("make");
    build.current_dir(&build_dir);
    run_step(build, &build_dir, "build")?;

    let mut install = Command::new("make");
    install.current_dir(&build_dir).arg("install");
    run_step(install, &build_dir, "install")
}

fn run_step(mut cmd: Command, build_dir: &Path, step: &'static str) -> Result<()> {
    info!(step, dir = %build_dir.display(), cmd = ?cmd, "running build step");
    let status = cmd.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::BuildFailed(step))
    }
}
