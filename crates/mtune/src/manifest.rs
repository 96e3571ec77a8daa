//! Compilation-id manifest reader.
//!
//! The wrapper compilers append one CSV row per compilation:
//! `source_path,entry_kind,name,compilation,compilation_id`, with
//! `entry_kind` selecting module- or function-level entries.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::Result;

/// Module- or function-level compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Module,
    Function,
}

impl EntryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
        }
    }
}

/// A named compilation with its identifier.
///
/// The identifier is opaque here; it only links the row back to the
/// features database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub id: String,
}

/// Every compilation recorded for one source file.
#[derive(Clone, Debug, Default)]
pub struct SourceCompilations {
    pub module: Option<ManifestEntry>,
    pub functions: Vec<ManifestEntry>,
}

/// Parse a compilation-id CSV into a per-source-file map.
///
/// Rows with the wrong field count or a row kind other than
/// `compilation` are skipped. Duplicate module rows per source file and
/// duplicate function rows per `(source, function)` are dropped with a
/// warning; the first occurrence wins. Rows whose source file does not
/// exist on disk are dropped too.
///
/// # Errors
///
/// Fails only when the file itself cannot be read.
pub fn read_compilation_ids(path: &Path) -> Result<FxHashMap<PathBuf, SourceCompilations>> {
    let file = File::open(path)?;
    let mut by_source: FxHashMap<PathBuf, SourceCompilations> = FxHashMap::default();

    for line in BufReader::new(file).lines() {
        let line = line?;
        let values: Vec<&str> = line.split(',').collect();
        if values.len() != 5 {
            continue;
        }
        if values[3] != "compilation" {
            continue;
        }

        let src_path = PathBuf::from(values[0]);
        if !src_path.exists() {
            warn!(
                path = values[0],
                "compilation id references a non-existent file, ignoring"
            );
            continue;
        }

        let name = values[2].trim().to_string();
        let id = values[4].trim().to_string();
        match values[1] {
            "module" => {
                let entry = by_source.entry(src_path).or_default();
                if entry.module.is_some() {
                    warn!(
                        path = values[0],
                        "multiple module compilation ids for source file, ignoring"
                    );
                    continue;
                }
                entry.module = Some(ManifestEntry { name, id });
            }
            "function" => {
                let entry = by_source.entry(src_path).or_default();
                if entry.functions.iter().any(|f| f.name == name) {
                    warn!(
                        path = values[0],
                        function = %name,
                        "multiple compilation ids for function, ignoring"
                    );
                    continue;
                }
                entry.functions.push(ManifestEntry { name, id });
            }
            other => {
                warn!(kind = other, line = %line, "unknown entry in compilation id file");
            }
        }
    }

    Ok(by_source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Write a manifest plus the source files it references.
    fn manifest_with_sources(rows: &[String]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("compilations.csv");
        fs::write(&manifest, rows.join("\n")).unwrap();
        (dir, manifest)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "int x;").unwrap();
        path
    }

    #[test]
    fn test_module_and_function_rows() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.c");
        let rows = [
            format!("{},module,a,compilation,10", src.display()),
            format!("{},function,main,compilation,11", src.display()),
            format!("{},function,helper,compilation,12", src.display()),
        ];
        let manifest = dir.path().join("compilations.csv");
        fs::write(&manifest, rows.join("\n")).unwrap();

        let map = read_compilation_ids(&manifest).unwrap();
        let comps = &map[&src];
        assert_eq!(
            comps.module,
            Some(ManifestEntry {
                name: "a".to_string(),
                id: "10".to_string()
            })
        );
        assert_eq!(comps.functions.len(), 2);
        assert_eq!(comps.functions[0].name, "main");
        assert_eq!(comps.functions[1].id, "12");
    }

    #[test]
    fn test_first_duplicate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.c");
        let rows = [
            format!("{},module,a,compilation,10", src.display()),
            format!("{},module,a2,compilation,20", src.display()),
            format!("{},function,main,compilation,11", src.display()),
            format!("{},function,main,compilation,21", src.display()),
        ];
        let manifest = dir.path().join("compilations.csv");
        fs::write(&manifest, rows.join("\n")).unwrap();

        let map = read_compilation_ids(&manifest).unwrap();
        let comps = &map[&src];
        assert_eq!(comps.module.as_ref().unwrap().id, "10");
        assert_eq!(comps.functions.len(), 1);
        assert_eq!(comps.functions[0].id, "11");
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let (_dir, manifest) = manifest_with_sources(&[
            "too,few,fields".to_string(),
            "a,b,c,d,e,f".to_string(),
            "/nonexistent-zzz/a.c,module,a,compilation,10".to_string(),
            "some,module,name,not-compilation,10".to_string(),
        ]);

        let map = read_compilation_ids(&manifest).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_unknown_entry_kind_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.c");
        let rows = [
            format!("{},loop,l1,compilation,10", src.display()),
            format!("{},function,main,compilation,11", src.display()),
        ];
        let manifest = dir.path().join("compilations.csv");
        fs::write(&manifest, rows.join("\n")).unwrap();

        let map = read_compilation_ids(&manifest).unwrap();
        let comps = &map[&src];
        assert!(comps.module.is_none());
        assert_eq!(comps.functions.len(), 1);
    }

    #[test]
    fn test_whitespace_trimmed_from_name_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let src = touch(dir.path(), "a.c");
        let rows = [format!("{},function,main, compilation,11", src.display())];
        let manifest = dir.path().join("compilations.csv");
        fs::write(&manifest, rows.join("\n")).unwrap();

        // The row kind is not trimmed, so this row is skipped entirely.
        let map = read_compilation_ids(&manifest).unwrap();
        assert!(map.is_empty());

        let rows = [format!("{},function, main ,compilation, 11 ", src.display())];
        fs::write(&manifest, rows.join("\n")).unwrap();
        let map = read_compilation_ids(&manifest).unwrap();
        let comps = &map[&src];
        assert_eq!(comps.functions[0].name, "main");
        assert_eq!(comps.functions[0].id, "11");
    }
}
