//! Import directory: descriptor walk and name resolution

use log::{debug, trace};

use crate::error::PeResult;
use crate::reader::ByteReader;

/// Upper bound on lookup-table entries read per imported DLL.
pub const MAX_THUNKS_PER_DLL: usize = 4096;

/// Longest DLL or function name read from the image.
pub const MAX_NAME_LEN: usize = 512;

const ORDINAL_FLAG32: u64 = 0x8000_0000;
const ORDINAL_FLAG64: u64 = 0x8000_0000_0000_0000;

/// `IMAGE_IMPORT_DESCRIPTOR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportDescriptor {
    /// RVA of the import lookup table
    pub orig_first_thunk: u32,
    pub time_date_stamp: u32,
    pub forward_chain: u32,
    /// RVA of the NUL-terminated DLL name
    pub name_rva: u32,
    /// RVA of the import address table
    pub first_thunk: u32,
}

impl ImportDescriptor {
    pub const SIZE: usize = 20;

    pub fn parse(r: &ByteReader, offset: usize) -> PeResult<Self> {
        r.bytes(offset, Self::SIZE)?;

        Ok(Self {
            orig_first_thunk: r.u32(offset)?,
            time_date_stamp: r.u32(offset + 4)?,
            forward_chain: r.u32(offset + 8)?,
            name_rva: r.u32(offset + 12)?,
            first_thunk: r.u32(offset + 16)?,
        })
    }

    /// The all-zero descriptor that terminates the table.
    pub fn is_null(&self) -> bool {
        *self == Self::default()
    }

    /// RVA of the table to walk for function names. Old binders leave
    /// `orig_first_thunk` zero and only fill the IAT.
    pub fn lookup_table_rva(&self) -> u32 {
        if self.orig_first_thunk != 0 {
            self.orig_first_thunk
        } else {
            self.first_thunk
        }
    }
}

/// One entry of an import lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedFunction {
    ByName { hint: u16, name: String },
    ByOrdinal(u16),
    /// Hint/name RVA that no section covers
    Unresolved { rva: u32 },
}

/// A DLL and the functions the image takes from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedLibrary {
    pub name: String,
    pub descriptor: ImportDescriptor,
    pub functions: Vec<ImportedFunction>,
}

/// Decode descriptors from `offset` until the all-zero terminator or until
/// `max_entries` slots have been read.
///
/// The terminator is not included in the result.
pub fn walk_descriptors(
    r: &ByteReader,
    offset: usize,
    max_entries: usize,
) -> PeResult<Vec<ImportDescriptor>> {
    let mut descriptors = Vec::new();
    for i in 0..max_entries {
        let base = offset + i * ImportDescriptor::SIZE;
        let desc = ImportDescriptor::parse(r, base)?;
        if desc.is_null() {
            trace!("import terminator at 0x{:X}", base);
            return Ok(descriptors);
        }
        descriptors.push(desc);
    }
    debug!(
        "import walk reached the directory size limit ({} entries) without a terminator",
        max_entries
    );
    Ok(descriptors)
}

/// Walk an import lookup table at file offset `offset`.
///
/// `resolve` maps hint/name RVAs to file offsets.
pub fn walk_lookup_table<F>(
    r: &ByteReader,
    offset: usize,
    is_pe32plus: bool,
    resolve: F,
) -> PeResult<Vec<ImportedFunction>>
where
    F: Fn(u32) -> Option<usize>,
{
    let (entry_size, ordinal_flag) = if is_pe32plus {
        (8, ORDINAL_FLAG64)
    } else {
        (4, ORDINAL_FLAG32)
    };

    let mut functions = Vec::new();
    for i in 0..MAX_THUNKS_PER_DLL {
        let e_off = offset + i * entry_size;
        let entry = if is_pe32plus {
            r.u64(e_off)?
        } else {
            r.u32(e_off)? as u64
        };
        if entry == 0 {
            break;
        }

        if entry & ordinal_flag != 0 {
            functions.push(ImportedFunction::ByOrdinal((entry & 0xFFFF) as u16));
            continue;
        }

        let hint_rva = (entry & 0x7FFF_FFFF) as u32;
        match resolve(hint_rva) {
            Some(hint_off) => functions.push(ImportedFunction::ByName {
                hint: r.u16(hint_off)?,
                name: r.cstr(hint_off + 2, MAX_NAME_LEN)?,
            }),
            None => functions.push(ImportedFunction::Unresolved { rva: hint_rva }),
        }
    }
    Ok(functions)
}
