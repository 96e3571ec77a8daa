//! Build script invocation.

use std::path::Path;
use std::process::Command;

use tracing::{debug, error, info};

use crate::{Error, Result, resolver};

/// One build of the source tree through the operator-supplied script.
#[derive(Clone, Debug)]
pub struct BuildRequest<'a> {
    pub src_dir: &'a Path,
    pub build_dir: &'a Path,
    pub install_dir: &'a Path,
    pub build_script: &'a str,
    pub cc: &'a str,
    pub cxx: &'a str,
    pub fort: &'a str,
    pub build_flags: &'a str,
}

/// Run the build script with the fixed command-line contract.
///
/// Returns `Ok(true)` iff the script exits zero. Its stdout and stderr
/// are inherited so build output reaches the operator directly.
///
/// # Errors
///
/// Fails when a directory is missing or the script cannot be spawned.
pub fn build(req: &BuildRequest<'_>) -> Result<bool> {
    for dir in [req.src_dir, req.build_dir, req.install_dir] {
        if !dir.is_absolute() || !dir.exists() {
            return Err(Error::MissingPath(dir.to_path_buf()));
        }
    }

    let Some(script) = resolver::resolve_script(req.build_script) else {
        error!(script = req.build_script, "failed to find build script");
        return Ok(false);
    };

    info!(
        src = %req.src_dir.display(),
        build = %req.build_dir.display(),
        install = %req.install_dir.display(),
        script = %script.display(),
        "building source"
    );

    let mut cmd = Command::new(&script);
    cmd.arg("--src-dir")
        .arg(req.src_dir)
        .arg("--build-dir")
        .arg(req.build_dir)
        .arg("--install-dir")
        .arg(req.install_dir)
        .arg("--cc")
        .arg(req.cc)
        .arg("--cxx")
        .arg(req.cxx)
        .arg("--fort")
        .arg(req.fort)
        .arg("--build-flags")
        .arg(req.build_flags);
    debug!(cmd = ?cmd, "running build script");

    let status = cmd.status()?;
    if !status.success() {
        error!(script = %script.display(), code = status.code(), "build script failed");
    }
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_build_passes_contract_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let script = write_script(
            dir.path(),
            "build.sh",
            &format!("echo \"$@\" > {}", out.display()),
        );

        let ok = build(&BuildRequest {
            src_dir: dir.path(),
            build_dir: dir.path(),
            install_dir: dir.path(),
            build_script: script.to_str().unwrap(),
            cc: "cc",
            cxx: "c++",
            fort: "gfortran",
            build_flags: "-O3 -fdce",
        })
        .unwrap();
        assert!(ok);

        let args = fs::read_to_string(&out).unwrap();
        assert!(args.contains("--src-dir"));
        assert!(args.contains("--cc cc"));
        assert!(args.contains("--fort gfortran"));
        assert!(args.contains("--build-flags -O3 -fdce"));
    }

    #[test]
    fn test_build_reports_script_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "build.sh", "exit 3");

        let ok = build(&BuildRequest {
            src_dir: dir.path(),
            build_dir: dir.path(),
            install_dir: dir.path(),
            build_script: script.to_str().unwrap(),
            cc: "cc",
            cxx: "c++",
            fort: "gfortran",
            build_flags: "",
        })
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_build_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = build(&BuildRequest {
            src_dir: &missing,
            build_dir: dir.path(),
            install_dir: dir.path(),
            build_script: "build.sh",
            cc: "cc",
            cxx: "c++",
            fort: "gfortran",
            build_flags: "",
        });
        assert!(matches!(result, Err(Error::MissingPath(_))));
    }

    #[test]
    fn test_build_missing_script_is_a_failed_build() {
        let dir = tempfile::tempdir().unwrap();
        let ok = build(&BuildRequest {
            src_dir: dir.path(),
            build_dir: dir.path(),
            install_dir: dir.path(),
            build_script: "mtune-no-such-script-zzz",
            cc: "cc",
            cxx: "c++",
            fort: "gfortran",
            build_flags: "",
        })
        .unwrap();
        assert!(!ok);
    }
}
