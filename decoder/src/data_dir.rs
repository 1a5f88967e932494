//! Data directory table (the 16 `(virtual_address, size)` pairs at the end of
//! the optional header)

use crate::error::{PeError, PeResult};
use crate::reader::ByteReader;

pub const NUM_DATA_DIRECTORIES: usize = 16;

/// Semantic index of each data directory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataDirectoryType {
    Export = 0,
    Import = 1,
    Resource = 2,
    Exception = 3,
    Certificate = 4,
    Relocation = 5,
    Debug = 6,
    Architecture = 7,
    GlobalPtr = 8,
    Tls = 9,
    LoadConfig = 10,
    BoundImport = 11,
    ImportAddressTable = 12,
    DelayImportDescriptor = 13,
    ComRuntimeHeader = 14,
    Reserved = 15,
}

impl DataDirectoryType {
    pub const ALL: [DataDirectoryType; NUM_DATA_DIRECTORIES] = [
        DataDirectoryType::Export,
        DataDirectoryType::Import,
        DataDirectoryType::Resource,
        DataDirectoryType::Exception,
        DataDirectoryType::Certificate,
        DataDirectoryType::Relocation,
        DataDirectoryType::Debug,
        DataDirectoryType::Architecture,
        DataDirectoryType::GlobalPtr,
        DataDirectoryType::Tls,
        DataDirectoryType::LoadConfig,
        DataDirectoryType::BoundImport,
        DataDirectoryType::ImportAddressTable,
        DataDirectoryType::DelayImportDescriptor,
        DataDirectoryType::ComRuntimeHeader,
        DataDirectoryType::Reserved,
    ];

    pub fn from_index(index: usize) -> PeResult<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(PeError::InvalidDirectoryIndex(index))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DataDirectoryType::Export => "Export Table",
            DataDirectoryType::Import => "Import Table",
            DataDirectoryType::Resource => "Resource Table",
            DataDirectoryType::Exception => "Exception Table",
            DataDirectoryType::Certificate => "Certificate Table",
            DataDirectoryType::Relocation => "Base Relocation Table",
            DataDirectoryType::Debug => "Debug",
            DataDirectoryType::Architecture => "Architecture",
            DataDirectoryType::GlobalPtr => "Global Ptr",
            DataDirectoryType::Tls => "TLS Table",
            DataDirectoryType::LoadConfig => "Load Config Table",
            DataDirectoryType::BoundImport => "Bound Import",
            DataDirectoryType::ImportAddressTable => "IAT",
            DataDirectoryType::DelayImportDescriptor => "Delay Import Descriptor",
            DataDirectoryType::ComRuntimeHeader => "CLR Runtime Header",
            DataDirectoryType::Reserved => "Reserved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub const SIZE: usize = 8;

    pub fn parse(r: &ByteReader, offset: usize) -> PeResult<Self> {
        Ok(Self {
            virtual_address: r.u32(offset)?,
            size: r.u32(offset + 4)?,
        })
    }

    /// Zero address or zero size means the image has no such table.
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }
}

/// The fixed 16-slot directory array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataDirectories([DataDirectory; NUM_DATA_DIRECTORIES]);

impl DataDirectories {
    pub fn new(entries: [DataDirectory; NUM_DATA_DIRECTORIES]) -> Self {
        Self(entries)
    }

    /// Decode `count` entries (at most 16) starting at `offset`; slots past
    /// `count` stay zeroed.
    pub fn parse(r: &ByteReader, offset: usize, count: usize) -> PeResult<Self> {
        let mut entries = [DataDirectory::default(); NUM_DATA_DIRECTORIES];
        for (i, entry) in entries.iter_mut().enumerate().take(count) {
            *entry = DataDirectory::parse(r, offset + i * DataDirectory::SIZE)?;
        }
        Ok(Self(entries))
    }

    pub fn get(&self, index: usize) -> PeResult<&DataDirectory> {
        self.0.get(index).ok_or(PeError::InvalidDirectoryIndex(index))
    }

    pub fn entry(&self, kind: DataDirectoryType) -> &DataDirectory {
        &self.0[kind.index()]
    }

    #[cfg(test)]
    pub(crate) fn entry_mut(&mut self, kind: DataDirectoryType) -> &mut DataDirectory {
        &mut self.0[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataDirectoryType, &DataDirectory)> {
        DataDirectoryType::ALL.into_iter().zip(self.0.iter())
    }

    pub fn as_slice(&self) -> &[DataDirectory] {
        &self.0
    }
}
