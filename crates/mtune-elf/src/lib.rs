//! Read-only ELF and DWARF parser for measuring installed executables.
//!
//! Parses section headers and symbol tables for per-symbol sizes, and
//! decodes the root DIE of every DWARF compilation unit to recover the
//! source files an executable was built from. Executables are never
//! modified.

mod constants;
pub mod dwarf;
mod file;
mod header;

#[doc(hidden)]
pub mod testimage;

pub use constants::*;
pub use dwarf::{CompUnit, compilation_units};
pub use file::*;
pub use header::*;

use thiserror::Error;

/// ELF and DWARF parsing errors.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("ELF data too small")]
    TooSmall,
    #[error("Invalid ELF magic number")]
    InvalidMagic,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Unsupported ELF data encoding: {0}")]
    UnsupportedEncoding(u8),
    #[error("Section header out of bounds")]
    SectionOutOfBounds,
    #[error("Section data out of bounds")]
    SectionDataOutOfBounds,
    #[error("No DWARF debug information")]
    NoDebugInfo,
    #[error("Truncated DWARF data in {0}")]
    TruncatedDwarf(&'static str),
    #[error("Unsupported DWARF version: {0}")]
    UnsupportedDwarfVersion(u16),
    #[error("Missing abbreviation code {code} in table at {offset:#x}")]
    MissingAbbrev { code: u64, offset: u64 },
    #[error("Unknown attribute form {0:#x}")]
    UnknownForm(u64),
}

pub type Result<T> = std::result::Result<T, ElfError>;
