//! Feature extraction command.
//!
//! A single build with the compiler plugin loaded; no search. The
//! plugin writes the features file the tuning run later associates
//! with compilation ids.

use std::fs;
use std::path::Path;

use tracing::{error, info};

use mtune::builder::{self, BuildRequest};
use mtune::{Error, GCC_PLUGIN_NAME, Result, resolver};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `extract` command.
#[allow(clippy::too_many_arguments)]
pub fn cmd_extract(
    src_dir: &Path,
    build_dir: &Path,
    install_dir: &Path,
    cc: &str,
    cxx: &str,
    fort: &str,
    database: &Path,
    lib_dir: &Path,
    build_script: &str,
    out: &Path,
    build_flags: &str,
    debug: bool,
) -> i32 {
    match run_extract(
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
    ) {
        Ok(()) => {
            info!(out = %out.display(), "feature extraction complete");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "feature extraction failed");
            EXIT_FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_extract(
    src_dir: &Path,
    build_dir: &Path,
    install_dir: &Path,
    cc: &str,
    cxx: &str,
    fort: &str,
    database: &Path,
    lib_dir: &Path,
    build_script: &str,
    out: &Path,
    build_flags: &str,
    debug: bool,
) -> Result<()> {
    let src_dir = resolver::absolutize(src_dir)?;
    let build_dir = resolver::absolutize(build_dir)?;
    let install_dir = resolver::absolutize(install_dir)?;
    let database = resolver::absolutize(database)?;
    let lib_dir = resolver::absolutize(lib_dir)?;
    let out = resolver::absolutize(out)?;

    for path in [&src_dir, &database] {
        if !path.exists() {
            return Err(Error::MissingPath(path.clone()));
        }
    }
    // The build must start from a clean tree.
    for dir in [&build_dir, &install_dir] {
        if dir.exists() {
            return Err(Error::PathExists(dir.clone()));
        }
    }
    for cmd in [cc, cxx, fort] {
        if !resolver::is_command_on_path(cmd) {
            return Err(Error::CommandNotFound(cmd.to_string()));
        }
    }

    let plugin = lib_dir.join(format!("{GCC_PLUGIN_NAME}.so"));
    info!(plugin = %plugin.display(), "checking for feature extraction plugin");
    if !plugin.exists() {
        return Err(Error::MissingPath(plugin));
    }

    fs::create_dir_all(&build_dir)?;
    fs::create_dir_all(&install_dir)?;

    let mut parts = vec![format!("-fplugin={}", plugin.display())];
    if debug {
        parts.push(format!("-fplugin-arg-{GCC_PLUGIN_NAME}-debug"));
    }
    parts.push(format!(
        "-fplugin-arg-{GCC_PLUGIN_NAME}-database={}",
        database.display()
    ));
    parts.push(format!("-fplugin-arg-{GCC_PLUGIN_NAME}-out={}", out.display()));
    if !build_flags.is_empty() {
        parts.push(build_flags.to_string());
    }

    info!("performing feature extraction");
    let ok = builder::build(&BuildRequest {
        src_dir: &src_dir,
        build_dir: &build_dir,
        install_dir: &install_dir,
        build_script,
        cc,
        cxx,
        fort,
        build_flags: &parts.join(" "),
    })?;
    if ok {
        Ok(())
    } else {
        Err(Error::BuildFailed("feature extraction"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn extract(dir: &Path, build_script: &str) -> Result<()> {
        run_extract(
            &dir.join("src"),
            &dir.join("build"),
            &dir.join("install"),
            "sh",
            "sh",
            "sh",
            &dir.join("db"),
            dir,
            build_script,
            &dir.join("features.csv"),
            "",
            false,
        )
    }

    fn scaffold(dir: &Path) {
        fs::create_dir(dir.join("src")).unwrap();
        fs::write(dir.join("db"), "").unwrap();
        fs::write(dir.join(format!("{GCC_PLUGIN_NAME}.so")), "").unwrap();
    }

    #[test]
    fn test_preexisting_build_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());
        fs::create_dir(dir.path().join("build")).unwrap();
        assert!(matches!(
            extract(dir.path(), "build.sh"),
            Err(Error::PathExists(_))
        ));
    }

    #[test]
    fn test_missing_plugin_rejected() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());
        fs::remove_file(dir.path().join(format!("{GCC_PLUGIN_NAME}.so"))).unwrap();
        assert!(matches!(
            extract(dir.path(), "build.sh"),
            Err(Error::MissingPath(_))
        ));
    }

    #[test]
    fn test_plugin_flags_passed_to_build() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path());

        let seen = dir.path().join("seen.txt");
        let script = dir.path().join("build.sh");
        fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > {}\n", seen.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        extract(dir.path(), script.to_str().unwrap()).unwrap();

        let args = fs::read_to_string(&seen).unwrap();
        assert!(args.contains(&format!("-fplugin={}", dir.path().join(format!("{GCC_PLUGIN_NAME}.so")).display())));
        assert!(args.contains(&format!("-fplugin-arg-{GCC_PLUGIN_NAME}-database=")));
        assert!(args.contains(&format!("-fplugin-arg-{GCC_PLUGIN_NAME}-out=")));
        // Directories were created by the driver.
        assert!(dir.path().join("build").exists());
        assert!(dir.path().join("install").exists());
    }
}
