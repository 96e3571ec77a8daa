//! Minimal DWARF reader for compilation unit source paths.
//!
//! Decodes only the root DIE of each unit in `.debug_info`, enough to
//! recover `DW_AT_name` and `DW_AT_comp_dir`. Children are never walked;
//! the unit length is used to jump to the next unit. Supports DWARF
//! versions 2 through 5 in both 32- and 64-bit formats.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::header::Endian;
use crate::{ElfError, ElfFile, Result};

const DW_AT_NAME: u64 = 0x03;
const DW_AT_COMP_DIR: u64 = 0x1b;
const DW_AT_STR_OFFSETS_BASE: u64 = 0x72;

const DW_FORM_ADDR: u64 = 0x01;
const DW_FORM_BLOCK2: u64 = 0x03;
const DW_FORM_BLOCK4: u64 = 0x04;
const DW_FORM_DATA2: u64 = 0x05;
const DW_FORM_DATA4: u64 = 0x06;
const DW_FORM_DATA8: u64 = 0x07;
const DW_FORM_STRING: u64 = 0x08;
const DW_FORM_BLOCK: u64 = 0x09;
const DW_FORM_BLOCK1: u64 = 0x0a;
const DW_FORM_DATA1: u64 = 0x0b;
const DW_FORM_FLAG: u64 = 0x0c;
const DW_FORM_SDATA: u64 = 0x0d;
const DW_FORM_STRP: u64 = 0x0e;
const DW_FORM_UDATA: u64 = 0x0f;
const DW_FORM_REF_ADDR: u64 = 0x10;
const DW_FORM_REF1: u64 = 0x11;
const DW_FORM_REF2: u64 = 0x12;
const DW_FORM_REF4: u64 = 0x13;
const DW_FORM_REF8: u64 = 0x14;
const DW_FORM_REF_UDATA: u64 = 0x15;
const DW_FORM_INDIRECT: u64 = 0x16;
const DW_FORM_SEC_OFFSET: u64 = 0x17;
const DW_FORM_EXPRLOC: u64 = 0x18;
const DW_FORM_FLAG_PRESENT: u64 = 0x19;
const DW_FORM_STRX: u64 = 0x1a;
const DW_FORM_ADDRX: u64 = 0x1b;
const DW_FORM_REF_SUP4: u64 = 0x1c;
const DW_FORM_STRP_SUP: u64 = 0x1d;
const DW_FORM_DATA16: u64 = 0x1e;
const DW_FORM_LINE_STRP: u64 = 0x1f;
const DW_FORM_REF_SIG8: u64 = 0x20;
const DW_FORM_IMPLICIT_CONST: u64 = 0x21;
const DW_FORM_LOCLISTX: u64 = 0x22;
const DW_FORM_RNGLISTX: u64 = 0x23;
const DW_FORM_REF_SUP8: u64 = 0x24;
const DW_FORM_STRX1: u64 = 0x25;
const DW_FORM_STRX2: u64 = 0x26;
const DW_FORM_STRX3: u64 = 0x27;
const DW_FORM_STRX4: u64 = 0x28;
const DW_FORM_ADDRX1: u64 = 0x29;
const DW_FORM_ADDRX2: u64 = 0x2a;
const DW_FORM_ADDRX3: u64 = 0x2b;
const DW_FORM_ADDRX4: u64 = 0x2c;

const DW_UT_COMPILE: u8 = 0x01;
const DW_UT_TYPE: u8 = 0x02;
const DW_UT_PARTIAL: u8 = 0x03;
const DW_UT_SKELETON: u8 = 0x04;
const DW_UT_SPLIT_COMPILE: u8 = 0x05;
const DW_UT_SPLIT_TYPE: u8 = 0x06;

/// Name and compilation directory of one compilation unit.
#[derive(Clone, Debug, Default)]
pub struct CompUnit {
    pub name: Option<String>,
    pub comp_dir: Option<String>,
}

impl CompUnit {
    /// Resolve the unit to an absolute source path.
    ///
    /// An absolute `DW_AT_name` is used as-is; a relative one is joined
    /// to `DW_AT_comp_dir` and then canonicalized to resolve symbolic
    /// links (falling back to the joined path if the file is gone).
    /// Returns `None` when the unit carries no usable path.
    #[must_use]
    pub fn source_path(&self) -> Option<PathBuf> {
        let name = Path::new(self.name.as_ref()?);
        if name.is_absolute() {
            return Some(name.to_path_buf());
        }
        let joined = Path::new(self.comp_dir.as_ref()?).join(name);
        if !joined.is_absolute() {
            return None;
        }
        Some(fs::canonicalize(&joined).unwrap_or(joined))
    }
}

/// Enumerate the compilation units of an ELF image.
///
/// # Errors
///
/// Returns [`ElfError::NoDebugInfo`] when the image has no `.debug_info`
/// section, and a parse error for malformed DWARF data.
pub fn compilation_units(elf: &ElfFile<'_>) -> Result<Vec<CompUnit>> {
    let info = match elf.section_by_name(".debug_info") {
        Some(s) if s.size > 0 => elf.section_data(s)?,
        _ => return Err(ElfError::NoDebugInfo),
    };
    let abbrev = section_or_empty(elf, ".debug_abbrev")?;
    let strs = StrSections {
        debug_str: section_or_empty(elf, ".debug_str")?,
        line_str: section_or_empty(elf, ".debug_line_str")?,
        str_offsets: section_or_empty(elf, ".debug_str_offsets")?,
    };

    let endian = elf.header.data;
    let mut r = Reader::new(info, endian, ".debug_info");
    let mut abbrev_cache: FxHashMap<u64, FxHashMap<u64, Vec<AttrSpec>>> = FxHashMap::default();
    let mut units = Vec::new();

    while r.remaining() > 0 {
        let (unit, next) = parse_unit(&mut r, abbrev, &mut abbrev_cache, &strs, endian)?;
        if let Some(unit) = unit {
            units.push(unit);
        }
        r.seek(next)?;
    }

    Ok(units)
}

fn section_or_empty<'data>(elf: &ElfFile<'data>, name: &str) -> Result<&'data [u8]> {
    elf.section_by_name(name)
        .map_or(Ok(&[] as &[u8]), |s| elf.section_data(s))
}

struct UnitCtx {
    dwarf64: bool,
    version: u16,
    address_size: u8,
}

/// Parse one unit header plus its root DIE.
///
/// Returns the unit (when it is a kind that carries a root DIE) and the
/// offset of the next unit.
fn parse_unit(
    r: &mut Reader<'_>,
    abbrev: &[u8],
    abbrev_cache: &mut FxHashMap<u64, FxHashMap<u64, Vec<AttrSpec>>>,
    strs: &StrSections<'_>,
    endian: Endian,
) -> Result<(Option<CompUnit>, usize)> {
    let first = r.u32()?;
    let (dwarf64, unit_length) = if first == 0xffff_ffff {
        (true, r.u64()?)
    } else {
        (false, u64::from(first))
    };
    let length = usize::try_from(unit_length).map_err(|_| r.truncated())?;
    let next = r.pos().checked_add(length).ok_or_else(|| r.truncated())?;
    if length == 0 || next > r.len() {
        return Err(r.truncated());
    }

    let version = r.u16()?;
    if !(2..=5).contains(&version) {
        return Err(ElfError::UnsupportedDwarfVersion(version));
    }

    let (abbrev_offset, address_size) = if version >= 5 {
        let unit_type = r.u8()?;
        let address_size = r.u8()?;
        let abbrev_offset = r.offset(dwarf64)?;
        match unit_type {
            DW_UT_COMPILE | DW_UT_PARTIAL => {}
            DW_UT_SKELETON | DW_UT_SPLIT_COMPILE => r.skip(8)?,
            DW_UT_TYPE | DW_UT_SPLIT_TYPE => {
                r.skip(8 + if dwarf64 { 8 } else { 4 })?;
            }
            _ => return Ok((None, next)),
        }
        (abbrev_offset, address_size)
    } else {
        let abbrev_offset = r.offset(dwarf64)?;
        let address_size = r.u8()?;
        (abbrev_offset, address_size)
    };

    if !abbrev_cache.contains_key(&abbrev_offset) {
        let table = parse_abbrev_table(abbrev, abbrev_offset, endian)?;
        abbrev_cache.insert(abbrev_offset, table);
    }
    let table = &abbrev_cache[&abbrev_offset];

    let code = r.uleb128()?;
    if code == 0 {
        // Unit without DIEs.
        return Ok((None, next));
    }
    let specs = table.get(&code).ok_or(ElfError::MissingAbbrev {
        code,
        offset: abbrev_offset,
    })?;

    let ctx = UnitCtx {
        dwarf64,
        version,
        address_size,
    };

    let mut name_ref = None;
    let mut comp_dir_ref = None;
    let mut str_offsets_base = None;

    for spec in specs {
        let mut form = spec.form;
        while form == DW_FORM_INDIRECT {
            form = r.uleb128()?;
        }
        let value = read_attr_value(r, form, &ctx, strs)?;
        match spec.at {
            DW_AT_NAME => name_ref = value.into_str_ref().or(name_ref),
            DW_AT_COMP_DIR => comp_dir_ref = value.into_str_ref().or(comp_dir_ref),
            DW_AT_STR_OFFSETS_BASE => {
                if let AttrValue::Uint(v) = value {
                    str_offsets_base = Some(v);
                }
            }
            _ => {}
        }
    }

    // String indices can only be resolved once the whole DIE has been
    // read: DW_AT_str_offsets_base may come after the strings using it.
    let resolve = |sr: Option<StrRef>| match sr? {
        StrRef::Resolved(s) => Some(s),
        StrRef::Strx(index) => strs.resolve_strx(index, str_offsets_base, dwarf64, endian),
    };

    Ok((
        Some(CompUnit {
            name: resolve(name_ref),
            comp_dir: resolve(comp_dir_ref),
        }),
        next,
    ))
}

struct AttrSpec {
    at: u64,
    form: u64,
}

fn parse_abbrev_table(
    abbrev: &[u8],
    offset: u64,
    endian: Endian,
) -> Result<FxHashMap<u64, Vec<AttrSpec>>> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&o| o <= abbrev.len())
        .ok_or(ElfError::TruncatedDwarf(".debug_abbrev"))?;
    let mut r = Reader::new(&abbrev[start..], endian, ".debug_abbrev");
    let mut table = FxHashMap::default();

    while r.remaining() > 0 {
        let code = r.uleb128()?;
        if code == 0 {
            break;
        }
        let _tag = r.uleb128()?;
        let _has_children = r.u8()?;

        let mut attrs = Vec::new();
        loop {
            let at = r.uleb128()?;
            let form = r.uleb128()?;
            if at == 0 && form == 0 {
                break;
            }
            // The constant value lives in the abbreviation itself.
            if form == DW_FORM_IMPLICIT_CONST {
                let _ = r.sleb128()?;
            }
            attrs.push(AttrSpec { at, form });
        }
        table.insert(code, attrs);
    }
    Ok(table)
}

struct StrSections<'a> {
    debug_str: &'a [u8],
    line_str: &'a [u8],
    str_offsets: &'a [u8],
}

impl StrSections<'_> {
    /// Resolve a `DW_FORM_strx*` index through `.debug_str_offsets`.
    fn resolve_strx(
        &self,
        index: u64,
        base: Option<u64>,
        dwarf64: bool,
        endian: Endian,
    ) -> Option<String> {
        let entry_size: u64 = if dwarf64 { 8 } else { 4 };
        // Without an explicit base the entries start right after the
        // DWARF 5 section header.
        let base = base.unwrap_or(if dwarf64 { 16 } else { 8 });
        let entry = base.checked_add(index.checked_mul(entry_size)?)?;
        let entry = usize::try_from(entry).ok()?;
        if entry + entry_size as usize > self.str_offsets.len() {
            return None;
        }
        let str_offset = if dwarf64 {
            endian.read_u64(self.str_offsets, entry)
        } else {
            u64::from(endian.read_u32(self.str_offsets, entry))
        };
        read_cstr(self.debug_str, str_offset)
    }
}

/// Read a NUL-terminated string out of a string section.
fn read_cstr(section: &[u8], offset: u64) -> Option<String> {
    let start = usize::try_from(offset).ok()?;
    if start >= section.len() {
        return None;
    }
    let bytes = &section[start..];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Some(String::from_utf8_lossy(&bytes[..len]).into_owned())
}

enum StrRef {
    Resolved(String),
    Strx(u64),
}

enum AttrValue {
    Str(String),
    StrIndex(u64),
    Uint(u64),
    Skipped,
}

impl AttrValue {
    fn into_str_ref(self) -> Option<StrRef> {
        match self {
            Self::Str(s) => Some(StrRef::Resolved(s)),
            Self::StrIndex(i) => Some(StrRef::Strx(i)),
            Self::Uint(_) | Self::Skipped => None,
        }
    }
}

/// Read (or skip) one attribute value of the given form.
#[allow(clippy::too_many_lines)]
fn read_attr_value(
    r: &mut Reader<'_>,
    form: u64,
    ctx: &UnitCtx,
    strs: &StrSections<'_>,
) -> Result<AttrValue> {
    let value = match form {
        DW_FORM_ADDR => {
            r.skip(ctx.address_size as usize)?;
            AttrValue::Skipped
        }
        DW_FORM_BLOCK1 => {
            let len = r.u8()? as usize;
            r.skip(len)?;
            AttrValue::Skipped
        }
        DW_FORM_BLOCK2 => {
            let len = r.u16()? as usize;
            r.skip(len)?;
            AttrValue::Skipped
        }
        DW_FORM_BLOCK4 => {
            let len = r.u32()? as usize;
            r.skip(len)?;
            AttrValue::Skipped
        }
        DW_FORM_BLOCK | DW_FORM_EXPRLOC => {
            let len = usize::try_from(r.uleb128()?).map_err(|_| r.truncated())?;
            r.skip(len)?;
            AttrValue::Skipped
        }
        DW_FORM_DATA1 => AttrValue::Uint(u64::from(r.u8()?)),
        DW_FORM_DATA2 => AttrValue::Uint(u64::from(r.u16()?)),
        DW_FORM_DATA4 => AttrValue::Uint(u64::from(r.u32()?)),
        DW_FORM_DATA8 => AttrValue::Uint(r.u64()?),
        DW_FORM_DATA16 => {
            r.skip(16)?;
            AttrValue::Skipped
        }
        DW_FORM_SDATA => {
            let _ = r.sleb128()?;
            AttrValue::Skipped
        }
        DW_FORM_UDATA => AttrValue::Uint(r.uleb128()?),
        DW_FORM_STRING => AttrValue::Str(r.cstr()?),
        DW_FORM_STRP => {
            let offset = r.offset(ctx.dwarf64)?;
            read_cstr(strs.debug_str, offset).map_or(AttrValue::Skipped, AttrValue::Str)
        }
        DW_FORM_LINE_STRP => {
            let offset = r.offset(ctx.dwarf64)?;
            read_cstr(strs.line_str, offset).map_or(AttrValue::Skipped, AttrValue::Str)
        }
        DW_FORM_STRP_SUP => {
            let _ = r.offset(ctx.dwarf64)?;
            AttrValue::Skipped
        }
        DW_FORM_STRX => AttrValue::StrIndex(r.uleb128()?),
        DW_FORM_STRX1 => AttrValue::StrIndex(u64::from(r.u8()?)),
        DW_FORM_STRX2 => AttrValue::StrIndex(u64::from(r.u16()?)),
        DW_FORM_STRX3 => AttrValue::StrIndex(u64::from(r.u24()?)),
        DW_FORM_STRX4 => AttrValue::StrIndex(u64::from(r.u32()?)),
        DW_FORM_ADDRX | DW_FORM_LOCLISTX | DW_FORM_RNGLISTX | DW_FORM_REF_UDATA => {
            let _ = r.uleb128()?;
            AttrValue::Skipped
        }
        DW_FORM_ADDRX1 | DW_FORM_REF1 => {
            r.skip(1)?;
            AttrValue::Skipped
        }
        DW_FORM_ADDRX2 | DW_FORM_REF2 => {
            r.skip(2)?;
            AttrValue::Skipped
        }
        DW_FORM_ADDRX3 => {
            r.skip(3)?;
            AttrValue::Skipped
        }
        DW_FORM_ADDRX4 | DW_FORM_REF4 | DW_FORM_REF_SUP4 => {
            r.skip(4)?;
            AttrValue::Skipped
        }
        DW_FORM_REF8 | DW_FORM_REF_SIG8 | DW_FORM_REF_SUP8 => {
            r.skip(8)?;
            AttrValue::Skipped
        }
        DW_FORM_REF_ADDR => {
            // DWARF 2 encoded this as an address rather than an offset.
            if ctx.version == 2 {
                r.skip(ctx.address_size as usize)?;
            } else {
                let _ = r.offset(ctx.dwarf64)?;
            }
            AttrValue::Skipped
        }
        DW_FORM_SEC_OFFSET => AttrValue::Uint(r.offset(ctx.dwarf64)?),
        DW_FORM_FLAG => AttrValue::Uint(u64::from(r.u8()?)),
        DW_FORM_FLAG_PRESENT => AttrValue::Uint(1),
        DW_FORM_IMPLICIT_CONST => AttrValue::Skipped,
        other => return Err(ElfError::UnknownForm(other)),
    };
    Ok(value)
}

/// Bounds-checked byte cursor over a DWARF section.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
    section: &'static str,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], endian: Endian, section: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            endian,
            section,
        }
    }

    fn truncated(&self) -> ElfError {
        ElfError::TruncatedDwarf(self.section)
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.truncated());
        }
        self.pos = pos;
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(self.truncated());
        }
        self.pos += n;
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(self.truncated());
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(self.truncated());
        }
        let v = self.endian.read_u16(self.data, self.pos);
        self.pos += 2;
        Ok(v)
    }

    fn u24(&mut self) -> Result<u32> {
        if self.remaining() < 3 {
            return Err(self.truncated());
        }
        let b = &self.data[self.pos..self.pos + 3];
        self.pos += 3;
        let v = match self.endian {
            Endian::Little => {
                u32::from(b[0]) | (u32::from(b[1]) << 8) | (u32::from(b[2]) << 16)
            }
            Endian::Big => (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]),
        };
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(self.truncated());
        }
        let v = self.endian.read_u32(self.data, self.pos);
        self.pos += 4;
        Ok(v)
    }

    fn u64(&mut self) -> Result<u64> {
        if self.remaining() < 8 {
            return Err(self.truncated());
        }
        let v = self.endian.read_u64(self.data, self.pos);
        self.pos += 8;
        Ok(v)
    }

    /// Read a DWARF offset: 4 bytes in the 32-bit format, 8 in the 64-bit.
    fn offset(&mut self, dwarf64: bool) -> Result<u64> {
        if dwarf64 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    fn uleb128(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift < 64 {
                value |= u64::from(byte & 0x7f) << shift;
            }
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 + 7 {
                return Err(self.truncated());
            }
        }
    }

    fn sleb128(&mut self) -> Result<i64> {
        let mut value = 0i64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift < 64 {
                value |= i64::from(byte & 0x7f) << shift;
            }
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    value |= -1i64 << shift;
                }
                return Ok(value);
            }
            if shift > 63 + 7 {
                return Err(self.truncated());
            }
        }
    }

    /// Read a NUL-terminated string, consuming the terminator.
    fn cstr(&mut self) -> Result<String> {
        let bytes = &self.data[self.pos..];
        let len = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.truncated())?;
        self.pos += len + 1;
        Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SHT_PROGBITS;
    use crate::testimage::{ImageBuilder, abbrev_compile_unit, uleb, unit_v4, unit_v5};

    fn parse_units(info: Vec<u8>, abbrev: Vec<u8>, extra: &[(&str, Vec<u8>)]) -> Vec<CompUnit> {
        let mut builder = ImageBuilder::new();
        builder.section(".debug_info", SHT_PROGBITS, info);
        builder.section(".debug_abbrev", SHT_PROGBITS, abbrev);
        for (name, data) in extra {
            builder.section(name, SHT_PROGBITS, data.clone());
        }
        let image = builder.build();
        let elf = ElfFile::parse(&image).unwrap();
        compilation_units(&elf).unwrap()
    }

    #[test]
    fn test_inline_strings_two_units() {
        let abbrev = abbrev_compile_unit(&[(DW_AT_NAME, DW_FORM_STRING), (DW_AT_COMP_DIR, DW_FORM_STRING)]);

        let mut die1 = Vec::new();
        uleb(&mut die1, 1);
        die1.extend(b"foo.c\0");
        die1.extend(b"/work/src\0");

        let mut die2 = Vec::new();
        uleb(&mut die2, 1);
        die2.extend(b"/abs/bar.c\0");
        die2.extend(b"/work\0");

        let mut info = unit_v4(&die1);
        info.extend(unit_v4(&die2));

        let units = parse_units(info, abbrev, &[]);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name.as_deref(), Some("foo.c"));
        assert_eq!(units[0].comp_dir.as_deref(), Some("/work/src"));
        assert_eq!(units[1].name.as_deref(), Some("/abs/bar.c"));
    }

    #[test]
    fn test_strp_and_line_strp() {
        let abbrev = abbrev_compile_unit(&[(DW_AT_NAME, DW_FORM_STRP), (DW_AT_COMP_DIR, DW_FORM_LINE_STRP)]);

        let debug_str = b"\0main.c\0".to_vec();
        let line_str = b"\0/home/dev\0".to_vec();

        let mut die = Vec::new();
        uleb(&mut die, 1);
        die.extend(1u32.to_le_bytes()); // offset of "main.c"
        die.extend(1u32.to_le_bytes()); // offset of "/home/dev"

        let units = parse_units(
            unit_v5(&die),
            abbrev,
            &[(".debug_str", debug_str), (".debug_line_str", line_str)],
        );
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name.as_deref(), Some("main.c"));
        assert_eq!(units[0].comp_dir.as_deref(), Some("/home/dev"));
    }

    #[test]
    fn test_strx_with_offsets_table() {
        // str_offsets_base deliberately follows the strx attribute to
        // exercise deferred resolution.
        let abbrev = abbrev_compile_unit(&[
            (DW_AT_NAME, DW_FORM_STRX1),
            (DW_AT_STR_OFFSETS_BASE, DW_FORM_SEC_OFFSET),
        ]);

        let debug_str = b"\0unit.c\0".to_vec();

        // DWARF 5 .debug_str_offsets: length, version, padding, entries.
        let mut str_offsets = Vec::new();
        str_offsets.extend(8u32.to_le_bytes()); // unit length
        str_offsets.extend(5u16.to_le_bytes()); // version
        str_offsets.extend(0u16.to_le_bytes()); // padding
        str_offsets.extend(1u32.to_le_bytes()); // entry 0 -> "unit.c"

        let mut die = Vec::new();
        uleb(&mut die, 1);
        die.push(0); // strx1 index 0
        die.extend(8u32.to_le_bytes()); // str_offsets_base

        let units = parse_units(
            unit_v5(&die),
            abbrev,
            &[
                (".debug_str", debug_str),
                (".debug_str_offsets", str_offsets),
            ],
        );
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name.as_deref(), Some("unit.c"));
        assert!(units[0].comp_dir.is_none());
    }

    #[test]
    fn test_unrelated_attributes_skipped() {
        const DW_AT_PRODUCER: u64 = 0x25;
        const DW_AT_LOW_PC: u64 = 0x11;
        let abbrev = abbrev_compile_unit(&[
            (DW_AT_PRODUCER, DW_FORM_STRING),
            (DW_AT_NAME, DW_FORM_STRING),
            (DW_AT_LOW_PC, DW_FORM_ADDR),
            (DW_AT_COMP_DIR, DW_FORM_STRING),
        ]);

        let mut die = Vec::new();
        uleb(&mut die, 1);
        die.extend(b"GNU C17\0");
        die.extend(b"x.c\0");
        die.extend([0u8; 8]); // low_pc
        die.extend(b"/d\0");

        let units = parse_units(unit_v4(&die), abbrev, &[]);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name.as_deref(), Some("x.c"));
        assert_eq!(units[0].comp_dir.as_deref(), Some("/d"));
    }

    #[test]
    fn test_no_debug_info() {
        let image = ImageBuilder::new().build();
        let elf = ElfFile::parse(&image).unwrap();
        assert!(matches!(
            compilation_units(&elf),
            Err(ElfError::NoDebugInfo)
        ));
    }

    #[test]
    fn test_source_path_joins_relative_name() {
        let unit = CompUnit {
            name: Some("foo.c".to_string()),
            comp_dir: Some("/work/src".to_string()),
        };
        // Nothing exists at that path, so canonicalization falls back to
        // the plain join.
        assert_eq!(unit.source_path(), Some(PathBuf::from("/work/src/foo.c")));
    }

    #[test]
    fn test_source_path_absolute_name_used_as_is() {
        let unit = CompUnit {
            name: Some("/work/src/foo.c".to_string()),
            comp_dir: Some("/elsewhere".to_string()),
        };
        assert_eq!(unit.source_path(), Some(PathBuf::from("/work/src/foo.c")));
    }

    #[test]
    fn test_source_path_resolves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("foo.c"), "int main;").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let unit = CompUnit {
            name: Some("foo.c".to_string()),
            comp_dir: Some(link.to_string_lossy().into_owned()),
        };
        let expected = std::fs::canonicalize(real.join("foo.c")).unwrap();
        assert_eq!(unit.source_path(), Some(expected));
    }

    #[test]
    fn test_missing_comp_dir_for_relative_name() {
        let unit = CompUnit {
            name: Some("foo.c".to_string()),
            comp_dir: None,
        };
        assert!(unit.source_path().is_none());
    }
}
