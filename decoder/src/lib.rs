//! rupe decoder
//!
//! Read-only decoding of Windows PE (Portable Executable) images:
//! - DOS stub header and PE signature
//! - COFF file header
//! - Optional header (PE32 and PE32+) with its 16 data directories
//! - Section header table
//! - Import descriptors, with DLL and function names resolved on demand
//!
//! Every structure location is computed from fields decoded earlier in the
//! same file, so every offset is checked before it is used. Decoding never
//! mutates or copies the input buffer; [`PeFile`] borrows it.
//!
//! ```no_run
//! use rupe_decoder::{DataDirectoryType, PeFile};
//!
//! let data = std::fs::read("example.exe").unwrap();
//! let pe = PeFile::parse(&data).unwrap();
//! println!("{} sections", pe.sections().len());
//! println!("imports at {:?}", pe.directory(DataDirectoryType::Import));
//! ```

#[macro_use]
mod tables;

pub mod coff;
pub mod data_dir;
pub mod dos;
pub mod error;
pub mod import;
pub mod optional;
pub mod options;
pub mod pe;
pub mod reader;
pub mod section;

#[cfg(test)]
mod testutil;

pub use coff::{CoffHeader, Machine, FILE_CHARACTERISTICS};
pub use data_dir::{DataDirectories, DataDirectory, DataDirectoryType, NUM_DATA_DIRECTORIES};
pub use dos::{is_pe_magic, DosHeader};
pub use error::{PeError, PeResult};
pub use import::{ImportDescriptor, ImportedFunction, ImportedLibrary};
pub use optional::{OptionalHeader, Subsystem, DLL_CHARACTERISTICS};
pub use options::{DecodeOptions, ImportAddressing};
pub use pe::{HeaderChain, PeFile};
pub use reader::ByteReader;
pub use section::{SectionHeader, SECTION_FLAGS};
