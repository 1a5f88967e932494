//! Section header table

use log::trace;

use crate::error::{PeError, PeResult};
use crate::reader::{offset_add, ByteReader};
use crate::tables::flag_names;

pub const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;
pub const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
pub const IMAGE_SCN_CNT_UNINITIALIZED_DATA: u32 = 0x0000_0080;
pub const IMAGE_SCN_ALIGN_MASK: u32 = 0x00F0_0000;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
pub const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
pub const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

/// Section flags (`IMAGE_SCN_*`), excluding the 4-bit alignment field.
pub const SECTION_FLAGS: &[(&str, u32)] = &[
    ("TYPE_NO_PAD", 0x0000_0008),
    ("CNT_CODE", IMAGE_SCN_CNT_CODE),
    ("CNT_INITIALIZED_DATA", IMAGE_SCN_CNT_INITIALIZED_DATA),
    ("CNT_UNINITIALIZED_DATA", IMAGE_SCN_CNT_UNINITIALIZED_DATA),
    ("LNK_OTHER", 0x0000_0100),
    ("LNK_INFO", 0x0000_0200),
    ("LNK_REMOVE", 0x0000_0800),
    ("LNK_COMDAT", 0x0000_1000),
    ("NO_DEFER_SPEC_EXC", 0x0000_4000),
    ("GPREL", 0x0000_8000),
    ("MEM_PURGEABLE", 0x0002_0000),
    ("MEM_LOCKED", 0x0004_0000),
    ("MEM_PRELOAD", 0x0008_0000),
    ("LNK_NRELOC_OVFL", 0x0100_0000),
    ("MEM_DISCARDABLE", 0x0200_0000),
    ("MEM_NOT_CACHED", 0x0400_0000),
    ("MEM_NOT_PAGED", 0x0800_0000),
    ("MEM_SHARED", 0x1000_0000),
    ("MEM_EXECUTE", IMAGE_SCN_MEM_EXECUTE),
    ("MEM_READ", IMAGE_SCN_MEM_READ),
    ("MEM_WRITE", IMAGE_SCN_MEM_WRITE),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Raw 8-byte name. Not necessarily NUL-terminated; long names stored
    /// in the string table ("/123") are not resolved.
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_line_numbers: u32,
    pub num_of_relocations: u16,
    pub num_of_line_numbers: u16,
    pub characteristics: u32,
}

impl SectionHeader {
    pub const SIZE: usize = 40;

    pub fn parse(r: &ByteReader, offset: usize) -> PeResult<Self> {
        r.bytes(offset, Self::SIZE)?;

        Ok(Self {
            name: r.array(offset)?,
            virtual_size: r.u32(offset + 8)?,
            virtual_address: r.u32(offset + 12)?,
            size_of_raw_data: r.u32(offset + 16)?,
            pointer_to_raw_data: r.u32(offset + 20)?,
            pointer_to_relocations: r.u32(offset + 24)?,
            pointer_to_line_numbers: r.u32(offset + 28)?,
            num_of_relocations: r.u16(offset + 32)?,
            num_of_line_numbers: r.u16(offset + 34)?,
            characteristics: r.u32(offset + 36)?,
        })
    }

    /// Section name up to the first NUL, lossily decoded.
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn flag_names(&self) -> Vec<&'static str> {
        flag_names(SECTION_FLAGS, self.characteristics)
    }

    /// Alignment in bytes encoded in the `IMAGE_SCN_ALIGN_*` field.
    pub fn alignment(&self) -> Option<u32> {
        match (self.characteristics & IMAGE_SCN_ALIGN_MASK) >> 20 {
            0 | 0xF => None,
            n => Some(1 << (n - 1)),
        }
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics & IMAGE_SCN_MEM_EXECUTE != 0
    }

    /// Whether `rva` falls inside this section's virtual extent.
    pub fn contains_rva(&self, rva: u32) -> bool {
        let start = self.virtual_address as u64;
        let extent = self.virtual_size.max(self.size_of_raw_data) as u64;
        let rva = rva as u64;
        rva >= start && rva < start + extent
    }

    /// File offset backing `rva`, if it lies in this section's raw data.
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        if !self.contains_rva(rva) {
            return None;
        }
        let delta = rva - self.virtual_address;
        if delta >= self.size_of_raw_data {
            // Zero-fill tail, no bytes on disk
            return None;
        }
        (self.pointer_to_raw_data as usize).checked_add(delta as usize)
    }
}

/// Decode `count` contiguous section headers starting at `offset`.
///
/// A table that runs off the end of the buffer is reported as
/// [`PeError::TruncatedSectionTable`] rather than silently shortened.
pub fn parse_section_table(
    r: &ByteReader,
    offset: usize,
    count: u16,
    max_sections: u16,
) -> PeResult<Vec<SectionHeader>> {
    if count > max_sections {
        return Err(PeError::TooManySections {
            count,
            max: max_sections,
        });
    }

    let mut sections = Vec::with_capacity(count as usize);
    for i in 0..count {
        let base = offset_add("section header", offset, i as usize * SectionHeader::SIZE)?;
        let section = SectionHeader::parse(r, base).map_err(|e| match e {
            PeError::OutOfBounds { .. } => PeError::TruncatedSectionTable {
                declared: count,
                decoded: i,
            },
            other => other,
        })?;
        trace!("section {} '{}' at 0x{:X}", i, section.name_str(), base);
        sections.push(section);
    }
    Ok(sections)
}
