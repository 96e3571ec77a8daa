//! Code size measurement for one executable.
//!
//! Joins three views of the same build: the DWARF compilation units
//! (which source files went in), the symbol table (how big each
//! function came out), and the compilation-id manifest (which compiler
//! invocation produced them).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::warn;

use mtune_elf::{ElfFile, compilation_units};

use crate::Result;
use crate::manifest::{EntryKind, SourceCompilations};

/// Measure the executable, appending one result row per compilation id
/// to `out`, and return the total of all accepted symbol sizes.
///
/// Functions missing from the symbol table (usually inlined away) and
/// zero-sized symbols are skipped with a warning. The module size is
/// the sum of its functions' sizes. A compilation id may be recorded
/// several times; rows are emitted as-is and deduplicated downstream.
///
/// # Errors
///
/// Fails when the executable cannot be read, is not ELF, carries no
/// DWARF information, or the results file cannot be appended to.
pub fn measure_executable(
    exec_path: &Path,
    compilations: &FxHashMap<PathBuf, SourceCompilations>,
    out: &Path,
) -> Result<u64> {
    let data = fs::read(exec_path)?;
    let elf = ElfFile::parse(&data)?;
    let units = compilation_units(&elf)?;
    let symbol_sizes = elf.symbol_sizes();

    let mut rows = RowSet::default();
    let mut total: u64 = 0;

    for unit in &units {
        let Some(src_path) = unit.source_path() else {
            warn!(name = ?unit.name, "compilation unit has no resolvable source path");
            continue;
        };
        if !src_path.exists() {
            warn!(path = %src_path.display(), "file referenced in executable does not exist");
            continue;
        }
        let Some(comps) = compilations.get(&src_path) else {
            warn!(
                path = %src_path.display(),
                "file referenced in executable has no associated compilation ids, ignoring"
            );
            continue;
        };

        let mut module_size: u64 = 0;
        for func in &comps.functions {
            if let Some(&size) = symbol_sizes.get(func.name.as_str()) {
                if size == 0 {
                    warn!(function = %func.name, "size of function is 0, ignoring");
                } else {
                    total += size;
                    rows.record(&func.id, &src_path, EntryKind::Function, &func.name, size);
                }
                module_size += size;
            } else {
                // Present in a compilation but absent from the final
                // executable, which usually means it was inlined.
                warn!(
                    function = %func.name,
                    "function appeared in a compilation but not in the final executable"
                );
            }
        }

        if let Some(module) = &comps.module {
            if module_size == 0 {
                warn!(module = %module.name, "size of module is 0, ignoring");
            } else {
                rows.record(&module.id, &src_path, EntryKind::Module, &module.name, module_size);
            }
        }
    }

    rows.append_to(out)?;
    Ok(total)
}

/// Result rows grouped by compilation id, in first-occurrence order.
#[derive(Default)]
struct RowSet {
    order: Vec<String>,
    sizes: FxHashMap<String, Vec<u64>>,
    meta: FxHashMap<String, (PathBuf, EntryKind, String)>,
}

impl RowSet {
    fn record(&mut self, id: &str, src: &Path, kind: EntryKind, name: &str, size: u64) {
        if !self.sizes.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.sizes.entry(id.to_string()).or_default().push(size);
        self.meta
            .insert(id.to_string(), (src.to_path_buf(), kind, name.to_string()));
    }

    /// Append every row to the results file, one whole row per write.
    fn append_to(&self, out: &Path) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(out)?;
        for id in &self.order {
            let (src, kind, name) = &self.meta[id];
            for size in &self.sizes[id] {
                let row = format!(
                    "{},{},{},result,{},size,{}\n",
                    src.display(),
                    kind.as_str(),
                    name,
                    id,
                    size
                );
                file.write_all(row.as_bytes())?;
            }
        }
        Ok(())
    }
}
