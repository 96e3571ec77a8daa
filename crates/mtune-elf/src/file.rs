//! ELF file parser.

use rustc_hash::FxHashMap;

use crate::constants::*;
use crate::header::{Class, ElfHeader, Endian, SectionHeader, Symbol};
use crate::{ElfError, Result};

/// Parsed ELF file.
///
/// Borrows the raw image so that large debug sections are sliced rather
/// than copied.
#[derive(Debug)]
pub struct ElfFile<'data> {
    data: &'data [u8],
    pub header: ElfHeader,
    pub sections: Vec<SectionHeader>,
    pub symbols: Vec<Symbol>,
}

impl<'data> ElfFile<'data> {
    /// Parse an ELF image from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is not ELF, uses an unsupported
    /// class or encoding, or has section headers outside the file.
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let header = parse_header(data)?;
        let sections = parse_sections(data, &header)?;
        let symbols = parse_symbols(data, &header, &sections);

        Ok(Self {
            data,
            header,
            sections,
            symbols,
        })
    }

    /// Look up a section header by name.
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Slice the file contents of a section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section extends beyond the file.
    pub fn section_data(&self, section: &SectionHeader) -> Result<&'data [u8]> {
        let start = usize::try_from(section.offset).map_err(|_| ElfError::SectionDataOutOfBounds)?;
        let size = usize::try_from(section.size).map_err(|_| ElfError::SectionDataOutOfBounds)?;
        let end = start
            .checked_add(size)
            .ok_or(ElfError::SectionDataOutOfBounds)?;
        if end > self.data.len() {
            return Err(ElfError::SectionDataOutOfBounds);
        }
        Ok(&self.data[start..end])
    }

    /// Whether the image carries DWARF debug information.
    #[must_use]
    pub fn has_debug_info(&self) -> bool {
        self.section_by_name(".debug_info")
            .is_some_and(|s| s.size > 0)
    }

    /// Map every named symbol to its size.
    ///
    /// All symbol tables are visited in section order; a name that appears
    /// more than once keeps the size seen last, matching a plain
    /// name-keyed walk of the tables.
    #[must_use]
    pub fn symbol_sizes(&self) -> FxHashMap<&str, u64> {
        let mut sizes = FxHashMap::default();
        for sym in &self.symbols {
            if !sym.name.is_empty() {
                sizes.insert(sym.name.as_str(), sym.size);
            }
        }
        sizes
    }
}

fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    if data.len() < 16 {
        return Err(ElfError::TooSmall);
    }
    if data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    let class = Class::from_ident(data[4])?;
    let endian = Endian::from_ident(data[5])?;
    let abi = data[7];

    let min_size = if class.is_64() { 64 } else { 52 };
    if data.len() < min_size {
        return Err(ElfError::TooSmall);
    }

    let e_type = endian.read_u16(data, 16);
    let machine = endian.read_u16(data, 18);

    let header = if class.is_64() {
        ElfHeader {
            class,
            data: endian,
            abi,
            e_type,
            machine,
            entry: endian.read_u64(data, 24),
            shoff: endian.read_u64(data, 40),
            flags: endian.read_u32(data, 48),
            shentsize: endian.read_u16(data, 58),
            shnum: endian.read_u16(data, 60),
            shstrndx: endian.read_u16(data, 62),
        }
    } else {
        ElfHeader {
            class,
            data: endian,
            abi,
            e_type,
            machine,
            entry: u64::from(endian.read_u32(data, 24)),
            shoff: u64::from(endian.read_u32(data, 32)),
            flags: endian.read_u32(data, 36),
            shentsize: endian.read_u16(data, 46),
            shnum: endian.read_u16(data, 48),
            shstrndx: endian.read_u16(data, 50),
        }
    };
    Ok(header)
}

/// Raw section header before name resolution.
struct RawSection {
    name_idx: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

fn parse_sections(data: &[u8], header: &ElfHeader) -> Result<Vec<SectionHeader>> {
    let mut raw = Vec::with_capacity(header.shnum as usize);
    for i in 0..header.shnum {
        let offset = usize::try_from(header.shoff)
            .map_err(|_| ElfError::SectionOutOfBounds)?
            .checked_add((i as usize) * (header.shentsize as usize))
            .ok_or(ElfError::SectionOutOfBounds)?;
        raw.push(parse_section_header(data, header, offset)?);
    }

    // Section names live in the string table indexed by e_shstrndx.
    let shstrtab = raw.get(header.shstrndx as usize).map(|s| (s.offset, s.size));

    let sections = raw
        .iter()
        .map(|s| SectionHeader {
            name: shstrtab
                .map(|(off, size)| extract_string(data, off, size, u64::from(s.name_idx)))
                .unwrap_or_default(),
            sh_type: s.sh_type,
            flags: s.flags,
            addr: s.addr,
            offset: s.offset,
            size: s.size,
            link: s.link,
            entsize: s.entsize,
        })
        .collect();
    Ok(sections)
}

fn parse_section_header(data: &[u8], header: &ElfHeader, offset: usize) -> Result<RawSection> {
    let endian = header.data;
    if header.class.is_64() {
        if offset + 64 > data.len() {
            return Err(ElfError::SectionOutOfBounds);
        }
        Ok(RawSection {
            name_idx: endian.read_u32(data, offset),
            sh_type: endian.read_u32(data, offset + 4),
            flags: endian.read_u64(data, offset + 8),
            addr: endian.read_u64(data, offset + 16),
            offset: endian.read_u64(data, offset + 24),
            size: endian.read_u64(data, offset + 32),
            link: endian.read_u32(data, offset + 40),
            entsize: endian.read_u64(data, offset + 56),
        })
    } else {
        if offset + 40 > data.len() {
            return Err(ElfError::SectionOutOfBounds);
        }
        Ok(RawSection {
            name_idx: endian.read_u32(data, offset),
            sh_type: endian.read_u32(data, offset + 4),
            flags: u64::from(endian.read_u32(data, offset + 8)),
            addr: u64::from(endian.read_u32(data, offset + 12)),
            offset: u64::from(endian.read_u32(data, offset + 16)),
            size: u64::from(endian.read_u32(data, offset + 20)),
            link: endian.read_u32(data, offset + 24),
            entsize: u64::from(endian.read_u32(data, offset + 36)),
        })
    }
}

/// Parse every symbol table (`.symtab` and `.dynsym`) in section order.
fn parse_symbols(data: &[u8], header: &ElfHeader, sections: &[SectionHeader]) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for section in sections {
        if section.sh_type != SHT_SYMTAB && section.sh_type != SHT_DYNSYM {
            continue;
        }

        // Symbol names live in the string table linked via sh_link.
        let Some(strtab) = sections.get(section.link as usize) else {
            continue;
        };

        let entsize = section.entsize as usize;
        if entsize == 0 {
            continue;
        }
        let count = (section.size as usize) / entsize;
        for i in 0..count {
            let offset = (section.offset as usize) + i * entsize;
            if let Some(sym) = parse_symbol(data, header, strtab, offset) {
                symbols.push(sym);
            }
        }
    }

    symbols
}

fn parse_symbol(
    data: &[u8],
    header: &ElfHeader,
    strtab: &SectionHeader,
    offset: usize,
) -> Option<Symbol> {
    let endian = header.data;
    let (name_idx, value, size, info, shndx) = if header.class.is_64() {
        // ELF64 symbol: 24 bytes
        if offset + 24 > data.len() {
            return None;
        }
        (
            endian.read_u32(data, offset),
            endian.read_u64(data, offset + 8),
            endian.read_u64(data, offset + 16),
            data[offset + 4],
            endian.read_u16(data, offset + 6),
        )
    } else {
        // ELF32 symbol: 16 bytes
        if offset + 16 > data.len() {
            return None;
        }
        (
            endian.read_u32(data, offset),
            u64::from(endian.read_u32(data, offset + 4)),
            u64::from(endian.read_u32(data, offset + 8)),
            data[offset + 12],
            endian.read_u16(data, offset + 14),
        )
    };

    Some(Symbol {
        name: extract_string(data, strtab.offset, strtab.size, u64::from(name_idx)),
        value,
        size,
        sym_type: info & 0xf,
        binding: info >> 4,
        shndx,
    })
}

/// Extract a NUL-terminated string from a string table.
fn extract_string(data: &[u8], table_offset: u64, table_size: u64, index: u64) -> String {
    let Some(start) = table_offset
        .checked_add(index)
        .and_then(|v| usize::try_from(v).ok())
    else {
        return String::new();
    };
    let end = usize::try_from(table_offset.saturating_add(table_size))
        .unwrap_or(data.len())
        .min(data.len());
    if start >= end {
        return String::new();
    }

    let bytes = &data[start..end];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testimage::{ImageBuilder, build_symtab};

    #[test]
    fn test_invalid_magic() {
        let data = [0u8; 64];
        assert!(matches!(ElfFile::parse(&data), Err(ElfError::InvalidMagic)));
    }

    #[test]
    fn test_too_small() {
        let data = [0x7f, 0x45, 0x4c, 0x46];
        assert!(matches!(ElfFile::parse(&data), Err(ElfError::TooSmall)));
    }

    #[test]
    fn test_unsupported_class() {
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(&ELF_MAGIC);
        data[4] = 7;
        data[5] = ELF_DATA_LSB;
        assert!(matches!(
            ElfFile::parse(&data),
            Err(ElfError::UnsupportedClass(7))
        ));
    }

    #[test]
    fn test_empty_image_parses() {
        let image = ImageBuilder::new().build();
        let elf = ElfFile::parse(&image).unwrap();
        assert_eq!(elf.header.class, Class::Elf64);
        assert_eq!(elf.header.data, Endian::Little);
        assert!(!elf.has_debug_info());
        assert!(elf.symbols.is_empty());
    }

    #[test]
    fn test_section_names_resolved() {
        let mut builder = ImageBuilder::new();
        builder.section(".debug_info", SHT_PROGBITS, vec![1, 2, 3]);
        let image = builder.build();

        let elf = ElfFile::parse(&image).unwrap();
        let section = elf.section_by_name(".debug_info").unwrap();
        assert_eq!(section.size, 3);
        assert_eq!(elf.section_data(section).unwrap(), &[1, 2, 3]);
        assert!(elf.has_debug_info());
    }

    #[test]
    fn test_symbol_sizes() {
        let (symtab, strtab) = build_symtab(&[("main", 0x1000, 42), ("helper", 0x2000, 10)]);

        let mut builder = ImageBuilder::new();
        let strtab_idx = builder.section(".strtab", SHT_STRTAB, strtab);
        builder.symtab(".symtab", symtab, strtab_idx);
        let image = builder.build();

        let elf = ElfFile::parse(&image).unwrap();
        let sizes = elf.symbol_sizes();
        assert_eq!(sizes.get("main"), Some(&42));
        assert_eq!(sizes.get("helper"), Some(&10));
        assert_eq!(sizes.len(), 2);
    }

    #[test]
    fn test_symbol_fields() {
        let (symtab, strtab) = build_symtab(&[("fn_a", 0x4000, 7)]);

        let mut builder = ImageBuilder::new();
        let strtab_idx = builder.section(".strtab", SHT_STRTAB, strtab);
        builder.symtab(".symtab", symtab, strtab_idx);
        let image = builder.build();

        let elf = ElfFile::parse(&image).unwrap();
        let sym = elf.symbols.iter().find(|s| s.name == "fn_a").unwrap();
        assert_eq!(sym.value, 0x4000);
        assert_eq!(sym.size, 7);
        assert_eq!(sym.sym_type, STT_FUNC);
    }

    #[test]
    fn test_zero_sized_symbol_kept_in_map() {
        // Size policy belongs to the measurement layer, not the parser.
        let (symtab, strtab) = build_symtab(&[("empty", 0x1000, 0)]);

        let mut builder = ImageBuilder::new();
        let strtab_idx = builder.section(".strtab", SHT_STRTAB, strtab);
        builder.symtab(".symtab", symtab, strtab_idx);
        let image = builder.build();

        let elf = ElfFile::parse(&image).unwrap();
        assert_eq!(elf.symbol_sizes().get("empty"), Some(&0));
    }
}
