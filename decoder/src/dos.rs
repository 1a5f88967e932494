//! DOS (MZ) stub header

use crate::error::{PeError, PeResult};
use crate::reader::ByteReader;

/// DOS MZ magic bytes
pub const MZ_MAGIC: [u8; 2] = *b"MZ";

/// The legacy header at offset 0 of every PE image.
///
/// Only `signature` and `pe_offset` matter to a PE loader; the rest is kept
/// so the whole 64-byte record can be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosHeader {
    pub signature: [u8; 2],
    pub last_page_size: u16,
    pub file_num_pages: u16,
    pub num_reloc_items: u16,
    pub header_num_paragraphs: u16,
    pub min_extra_paragraphs: u16,
    pub max_extra_paragraphs: u16,
    pub initial_rel_ss: u16,
    pub initial_sp: u16,
    pub checksum: u16,
    pub initial_ip: u16,
    pub initial_rel_cs: u16,
    pub reloc_tbl_address: u16,
    pub overlay_num: u16,
    pub reserved1: [u8; 8],
    pub oem_id: u16,
    pub oem_info: u16,
    pub reserved2: [u8; 20],
    /// File offset of the "PE\0\0" signature (`e_lfanew`)
    pub pe_offset: u32,
}

impl DosHeader {
    pub const SIZE: usize = 64;

    pub fn parse(r: &ByteReader) -> PeResult<Self> {
        // Fail up front instead of at the last field
        r.bytes(0, Self::SIZE)?;

        Ok(Self {
            signature: r.array(0)?,
            last_page_size: r.u16(2)?,
            file_num_pages: r.u16(4)?,
            num_reloc_items: r.u16(6)?,
            header_num_paragraphs: r.u16(8)?,
            min_extra_paragraphs: r.u16(10)?,
            max_extra_paragraphs: r.u16(12)?,
            initial_rel_ss: r.u16(14)?,
            initial_sp: r.u16(16)?,
            checksum: r.u16(18)?,
            initial_ip: r.u16(20)?,
            initial_rel_cs: r.u16(22)?,
            reloc_tbl_address: r.u16(24)?,
            overlay_num: r.u16(26)?,
            reserved1: r.array(28)?,
            oem_id: r.u16(36)?,
            oem_info: r.u16(38)?,
            reserved2: r.array(40)?,
            pe_offset: r.u32(60)?,
        })
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == MZ_MAGIC
    }

    pub fn signature_error(&self) -> PeError {
        PeError::InvalidSignature {
            what: "DOS",
            expected: MZ_MAGIC.to_vec(),
            found: self.signature.to_vec(),
        }
    }

    /// Check that `pe_offset` lies past this header and inside a file of
    /// `file_len` bytes.
    pub fn validate_pe_offset(&self, file_len: usize) -> PeResult<usize> {
        let offset = self.pe_offset as usize;
        if offset < Self::SIZE {
            return Err(PeError::MalformedOffset {
                what: "PE signature",
                detail: format!("0x{:X} overlaps the DOS header", offset),
            });
        }
        if offset >= file_len {
            return Err(PeError::MalformedOffset {
                what: "PE signature",
                detail: format!("0x{:X} is past end of file (0x{:X} bytes)", offset, file_len),
            });
        }
        Ok(offset)
    }
}

/// Check if the given bytes start with MZ magic
pub fn is_pe_magic(magic: &[u8]) -> bool {
    magic.len() >= 2 && magic[..2] == MZ_MAGIC
}
