//! Executable discovery and measurement.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, error};

use crate::Result;

/// Recursively collect regular files with any executable bit set.
///
/// Symbolic links to files are followed; links to directories are not.
/// The result is sorted so measurement order is stable.
///
/// # Errors
///
/// Fails when a directory cannot be read.
pub fn find_executables(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, out)?;
        } else if let Ok(meta) = fs::metadata(&path)
            && meta.is_file()
            && meta.permissions().mode() & 0o111 != 0
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Invoke the measure script once, returning the scalar it prints.
///
/// A non-zero exit or an unparseable stdout yields `None`. stderr is
/// inherited so the script's diagnostics reach the operator.
pub fn run_measure_script(
    script: &Path,
    exec_path: &Path,
    compilation_ids: &Path,
    out: &Path,
    exec_flags: Option<&str>,
) -> Option<f64> {
    let mut cmd = Command::new(script);
    cmd.arg("--exec-path")
        .arg(exec_path)
        .arg("--compilation-ids")
        .arg(compilation_ids)
        .arg("--out")
        .arg(out);
    if let Some(flags) = exec_flags {
        cmd.arg("--exec-flags").arg(flags);
    }
    debug!(cmd = ?cmd, "running measure script");

    let child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| error!(error = %e, script = %script.display(), "failed to run measure script"))
        .ok()?;
    let output = child
        .wait_with_output()
        .map_err(|e| error!(error = %e, "failed to wait for measure script"))
        .ok()?;

    if !output.status.success() {
        error!(exec = %exec_path.display(), "failed to measure executable");
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    match text.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            error!(exec = %exec_path.display(), stdout = %text.trim(), "measure script did not print a number");
            None
        }
    }
}

/// Measure every executable under the install tree and sum the results.
///
/// Any single failure aborts the whole measurement with `None`.
pub fn measure_install_tree(
    script: &Path,
    install_dir: &Path,
    compilation_ids: &Path,
    results: &Path,
    exec_flags: Option<&str>,
) -> Option<f64> {
    let executables = find_executables(install_dir)
        .map_err(|e| error!(error = %e, dir = %install_dir.display(), "failed to scan install tree"))
        .ok()?;

    let mut total = 0.0;
    for exec_path in &executables {
        total += run_measure_script(script, exec_path, compilation_ids, results, exec_flags)?;
    }
    Some(total)
}
