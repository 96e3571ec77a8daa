//! Command and script resolution.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Check whether `cmd` resolves to an executable file on the search
/// path. An absolute path counts when it points at an executable.
#[must_use]
pub fn is_command_on_path(cmd: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| is_executable(&dir.join(cmd)))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Locate a build or measure script.
///
/// Resolution order: the search path first, then the directory holding
/// the driver binary itself, then the working directory.
#[must_use]
pub fn resolve_script(name: &str) -> Option<PathBuf> {
    if is_command_on_path(name) {
        return Some(PathBuf::from(name));
    }

    if !Path::new(name).is_absolute()
        && let Ok(exe) = env::current_exe()
    {
        let exe = fs::canonicalize(&exe).unwrap_or(exe);
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    let fallback = absolutize(Path::new(name)).ok()?;
    fallback.exists().then_some(fallback)
}

/// Turn a path absolute against the working directory.
///
/// # Errors
///
/// Fails only when the working directory cannot be determined.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_is_on_path() {
        assert!(is_command_on_path("sh"));
    }

    #[test]
    fn test_missing_command_is_not_on_path() {
        assert!(!is_command_on_path("mtune-no-such-command-zzz"));
    }

    #[test]
    fn test_absolute_executable_counts_as_on_path() {
        // Joining an absolute path onto a search directory yields the
        // absolute path itself, so these resolve through the same check.
        assert!(is_command_on_path("/bin/sh"));
    }

    #[test]
    fn test_resolve_script_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("measure.sh");
        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();

        // Plain files are still found through the working-directory
        // fallback even without the executable bit.
        let resolved = resolve_script(script.to_str().unwrap()).unwrap();
        assert_eq!(resolved, script);
    }

    #[test]
    fn test_resolve_script_missing() {
        assert!(resolve_script("mtune-no-such-script-zzz").is_none());
    }

    #[test]
    fn test_absolutize_keeps_absolute_paths() {
        let path = Path::new("/usr/share");
        assert_eq!(absolutize(path).unwrap(), path);
    }

    #[test]
    fn test_absolutize_anchors_relative_paths() {
        let abs = absolutize(Path::new("somewhere")).unwrap();
        assert!(abs.is_absolute());
        assert!(abs.ends_with("somewhere"));
    }
}
