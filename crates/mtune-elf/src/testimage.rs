//! Test support: ELF64 little-endian image builder.
//!
//! Produces just enough of an image for parser and measurement tests: a
//! file header, section data, a section name table and the section
//! header table, plus helpers for hand-assembling DWARF sections. Not
//! part of the public API.

use crate::constants::{ELF_MAGIC, SHT_STRTAB, SHT_SYMTAB};

struct SectionSpec {
    name: String,
    sh_type: u32,
    data: Vec<u8>,
    link: u32,
    entsize: u64,
}

#[derive(Default)]
pub struct ImageBuilder {
    sections: Vec<SectionSpec>,
}

impl ImageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section; returns its index in the section header table.
    pub fn section(&mut self, name: &str, sh_type: u32, data: Vec<u8>) -> usize {
        self.sections.push(SectionSpec {
            name: name.to_string(),
            sh_type,
            data,
            link: 0,
            entsize: 0,
        });
        // Index 0 is the null section.
        self.sections.len()
    }

    /// Add a symbol table section linked to its string table.
    pub fn symtab(&mut self, name: &str, data: Vec<u8>, strtab_index: usize) -> usize {
        self.sections.push(SectionSpec {
            name: name.to_string(),
            sh_type: SHT_SYMTAB,
            data,
            link: u32::try_from(strtab_index).unwrap(),
            entsize: 24,
        });
        self.sections.len()
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        // Section name table: empty name first, then one entry per section.
        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for s in &self.sections {
            name_offsets.push(u32::try_from(shstrtab.len()).unwrap());
            shstrtab.extend(s.name.bytes());
            shstrtab.push(0);
        }
        let shstrtab_name = u32::try_from(shstrtab.len()).unwrap();
        shstrtab.extend(b".shstrtab");
        shstrtab.push(0);

        let mut offset = 64usize;
        let mut data_offsets = Vec::new();
        for s in &self.sections {
            data_offsets.push(offset);
            offset += s.data.len();
        }
        let shstrtab_offset = offset;
        offset += shstrtab.len();
        let shoff = offset;
        let shnum = self.sections.len() + 2;

        let mut image = Vec::new();
        image.extend(&ELF_MAGIC);
        image.push(2); // ELFCLASS64
        image.push(1); // little-endian
        image.push(1); // EV_CURRENT
        image.push(0); // System V ABI
        image.extend([0u8; 8]); // ABI version + padding
        push_u16(&mut image, 2); // ET_EXEC
        push_u16(&mut image, 62); // EM_X86_64
        push_u32(&mut image, 1); // e_version
        push_u64(&mut image, 0); // e_entry
        push_u64(&mut image, 0); // e_phoff
        push_u64(&mut image, shoff as u64);
        push_u32(&mut image, 0); // e_flags
        push_u16(&mut image, 64); // e_ehsize
        push_u16(&mut image, 0); // e_phentsize
        push_u16(&mut image, 0); // e_phnum
        push_u16(&mut image, 64); // e_shentsize
        push_u16(&mut image, u16::try_from(shnum).unwrap());
        push_u16(&mut image, u16::try_from(shnum - 1).unwrap()); // e_shstrndx
        assert_eq!(image.len(), 64);

        for s in &self.sections {
            image.extend(&s.data);
        }
        image.extend(&shstrtab);

        assert_eq!(image.len(), shoff);
        image.extend([0u8; 64]); // null section header
        for (i, s) in self.sections.iter().enumerate() {
            push_section_header(
                &mut image,
                name_offsets[i],
                s.sh_type,
                data_offsets[i] as u64,
                s.data.len() as u64,
                s.link,
                s.entsize,
            );
        }
        push_section_header(
            &mut image,
            shstrtab_name,
            SHT_STRTAB,
            shstrtab_offset as u64,
            shstrtab.len() as u64,
            0,
            0,
        );
        image
    }
}

/// Build `.symtab` and `.strtab` contents from `(name, value, size)`
/// triples. Every symbol is a global function bound to section 1.
#[must_use]
pub fn build_symtab(symbols: &[(&str, u64, u64)]) -> (Vec<u8>, Vec<u8>) {
    let mut symtab = vec![0u8; 24]; // null symbol
    let mut strtab = vec![0u8];

    for (name, value, size) in symbols {
        let name_offset = u32::try_from(strtab.len()).unwrap();
        strtab.extend(name.bytes());
        strtab.push(0);

        push_u32(&mut symtab, name_offset);
        symtab.push(0x12); // STB_GLOBAL, STT_FUNC
        symtab.push(0); // st_other
        push_u16(&mut symtab, 1); // st_shndx
        push_u64(&mut symtab, *value);
        push_u64(&mut symtab, *size);
    }
    (symtab, strtab)
}

/// Append a ULEB128-encoded value.
pub fn uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Abbreviation table with a single compile-unit declaration (code 1)
/// carrying the given `(attribute, form)` pairs.
#[must_use]
pub fn abbrev_compile_unit(attr_forms: &[(u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    uleb(&mut out, 1); // code
    uleb(&mut out, 0x11); // DW_TAG_compile_unit
    out.push(1); // has children
    for &(at, form) in attr_forms {
        uleb(&mut out, at);
        uleb(&mut out, form);
    }
    out.push(0);
    out.push(0);
    out.push(0); // end of table
    out
}

/// Wrap a root DIE in a DWARF 4 unit header.
#[must_use]
pub fn unit_v4(die: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(4u16.to_le_bytes()); // version
    body.extend(0u32.to_le_bytes()); // abbrev offset
    body.push(8); // address size
    body.extend(die);

    let mut out = Vec::new();
    out.extend(u32::try_from(body.len()).unwrap().to_le_bytes());
    out.extend(body);
    out
}

/// Wrap a root DIE in a DWARF 5 compile-unit header.
#[must_use]
pub fn unit_v5(die: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(5u16.to_le_bytes()); // version
    body.push(0x01); // DW_UT_compile
    body.push(8); // address size
    body.extend(0u32.to_le_bytes()); // abbrev offset
    body.extend(die);

    let mut out = Vec::new();
    out.extend(u32::try_from(body.len()).unwrap().to_le_bytes());
    out.extend(body);
    out
}

/// Build a complete image with DWARF sections describing one unit with
/// inline `DW_AT_name` / `DW_AT_comp_dir` strings, plus the given
/// symbols.
#[must_use]
pub fn image_with_unit(name: &str, comp_dir: &str, symbols: &[(&str, u64, u64)]) -> Vec<u8> {
    const DW_AT_NAME: u64 = 0x03;
    const DW_AT_COMP_DIR: u64 = 0x1b;
    const DW_FORM_STRING: u64 = 0x08;

    let abbrev = abbrev_compile_unit(&[(DW_AT_NAME, DW_FORM_STRING), (DW_AT_COMP_DIR, DW_FORM_STRING)]);

    let mut die = Vec::new();
    uleb(&mut die, 1);
    die.extend(name.bytes());
    die.push(0);
    die.extend(comp_dir.bytes());
    die.push(0);

    let (symtab, strtab) = build_symtab(symbols);

    let mut builder = ImageBuilder::new();
    builder.section(".debug_info", crate::constants::SHT_PROGBITS, unit_v4(&die));
    builder.section(".debug_abbrev", crate::constants::SHT_PROGBITS, abbrev);
    let strtab_idx = builder.section(".strtab", SHT_STRTAB, strtab);
    builder.symtab(".symtab", symtab, strtab_idx);
    builder.build()
}

#[allow(clippy::too_many_arguments)]
fn push_section_header(
    out: &mut Vec<u8>,
    name: u32,
    sh_type: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
) {
    push_u32(out, name);
    push_u32(out, sh_type);
    push_u64(out, 0); // flags
    push_u64(out, 0); // addr
    push_u64(out, offset);
    push_u64(out, size);
    push_u32(out, link);
    push_u32(out, 0); // info
    push_u64(out, 0); // addralign
    push_u64(out, entsize);
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend(value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend(value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend(value.to_le_bytes());
}
