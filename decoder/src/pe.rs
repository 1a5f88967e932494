//! Header chain decoding and the decoded image view

use log::{debug, warn};

use crate::coff::{check_pe_signature, CoffHeader, Machine, PE_SIG};
use crate::data_dir::{DataDirectories, DataDirectory, DataDirectoryType};
use crate::dos::DosHeader;
use crate::error::{PeError, PeResult};
use crate::import::{self, ImportDescriptor, ImportedFunction, ImportedLibrary, MAX_NAME_LEN};
use crate::optional::{OptionalHeader, Subsystem};
use crate::options::{DecodeOptions, ImportAddressing};
use crate::reader::{offset_add, ByteReader};
use crate::section::{parse_section_table, SectionHeader};

/// Everything the header chain produced, in decode order.
///
/// Each slot is filled as soon as its structure decodes, so after a failure
/// the earlier structures are still available next to `error`.
#[derive(Debug, Clone, Default)]
pub struct HeaderChain {
    pub dos: Option<DosHeader>,
    pub coff: Option<CoffHeader>,
    pub optional: Option<OptionalHeader>,
    pub sections: Option<Vec<SectionHeader>>,
    pub error: Option<PeError>,
}

impl HeaderChain {
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Self {
        let mut chain = Self::default();
        if let Err(e) = decode_headers(&ByteReader::new(data), options, &mut chain) {
            chain.error = Some(e);
        }
        chain
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

struct Decoded {
    dos: DosHeader,
    coff: CoffHeader,
    optional: OptionalHeader,
    sections: Vec<SectionHeader>,
    section_table_offset: usize,
}

fn decode_headers(
    r: &ByteReader,
    options: &DecodeOptions,
    progress: &mut HeaderChain,
) -> PeResult<Decoded> {
    // DOS header
    let dos = DosHeader::parse(r)?;
    progress.dos = Some(dos.clone());
    if !dos.has_valid_signature() {
        if options.strict_signature {
            return Err(dos.signature_error());
        }
        warn!(
            "DOS signature is {:02X?}, not MZ; continuing in lenient mode",
            dos.signature
        );
    }

    // PE signature
    let pe_offset = dos.validate_pe_offset(r.len())?;
    debug!("PE signature at 0x{:X}", pe_offset);
    check_pe_signature(r, pe_offset)?;

    // COFF header
    let coff_offset = offset_add("COFF header", pe_offset, PE_SIG.len())?;
    let coff = CoffHeader::parse(r, coff_offset)?;
    progress.coff = Some(coff.clone());
    debug!(
        "COFF header at 0x{:X}: machine {}, {} sections, optional header {} bytes",
        coff_offset, coff.machine, coff.number_of_sections, coff.size_of_opt_header
    );

    // Optional header + data directories
    let opt_offset = offset_add("optional header", coff_offset, CoffHeader::SIZE)?;
    let optional = OptionalHeader::parse(r, opt_offset, options.honor_declared_directory_count)?;
    progress.optional = Some(optional.clone());
    debug!(
        "Optional header at 0x{:X}: magic 0x{:X}, {} declared directories",
        opt_offset, optional.magic, optional.number_of_rva_and_sizes
    );

    // Section table follows the declared optional header size, which may
    // differ from the fixed layout
    let section_table_offset = offset_add(
        "section table",
        opt_offset,
        coff.size_of_opt_header as usize,
    )?;
    debug!("Section table at 0x{:X}", section_table_offset);
    let sections = parse_section_table(
        r,
        section_table_offset,
        coff.number_of_sections,
        options.max_sections,
    )?;
    progress.sections = Some(sections.clone());

    Ok(Decoded {
        dos,
        coff,
        optional,
        sections,
        section_table_offset,
    })
}

/// A decoded PE image borrowing the raw file bytes.
#[derive(Debug, Clone)]
pub struct PeFile<'a> {
    data: &'a [u8],
    options: DecodeOptions,
    dos: DosHeader,
    coff: CoffHeader,
    optional: OptionalHeader,
    sections: Vec<SectionHeader>,
    section_table_offset: usize,
}

impl<'a> PeFile<'a> {
    /// Decode with default (strict) options.
    pub fn parse(data: &'a [u8]) -> PeResult<Self> {
        Self::parse_with(data, DecodeOptions::default())
    }

    pub fn parse_with(data: &'a [u8], options: DecodeOptions) -> PeResult<Self> {
        Self::decode(data, options, &mut HeaderChain::default())
    }

    /// Decode once; on failure hand back everything that decoded before the
    /// error, with `error` set.
    pub fn parse_or_partial(data: &'a [u8], options: DecodeOptions) -> Result<Self, HeaderChain> {
        let mut progress = HeaderChain::default();
        Self::decode(data, options, &mut progress).map_err(|e| {
            progress.error = Some(e);
            progress
        })
    }

    fn decode(
        data: &'a [u8],
        options: DecodeOptions,
        progress: &mut HeaderChain,
    ) -> PeResult<Self> {
        let decoded = decode_headers(&ByteReader::new(data), &options, progress)?;
        Ok(Self {
            data,
            options,
            dos: decoded.dos,
            coff: decoded.coff,
            optional: decoded.optional,
            sections: decoded.sections,
            section_table_offset: decoded.section_table_offset,
        })
    }

    fn reader(&self) -> ByteReader<'a> {
        ByteReader::new(self.data)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn dos(&self) -> &DosHeader {
        &self.dos
    }

    pub fn coff(&self) -> &CoffHeader {
        &self.coff
    }

    pub fn optional(&self) -> &OptionalHeader {
        &self.optional
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    /// File offset of the first section header.
    pub fn section_table_offset(&self) -> usize {
        self.section_table_offset
    }

    pub fn machine(&self) -> Machine {
        self.coff.machine
    }

    pub fn subsystem(&self) -> Subsystem {
        self.optional.subsystem
    }

    pub fn is_pe32plus(&self) -> bool {
        self.optional.is_pe32plus()
    }

    pub fn data_directories(&self) -> &DataDirectories {
        &self.optional.data_directories
    }

    /// Look up a data directory by raw index (0-15).
    pub fn data_directory(&self, index: usize) -> PeResult<&DataDirectory> {
        self.optional.data_directories.get(index)
    }

    pub fn directory(&self, kind: DataDirectoryType) -> &DataDirectory {
        self.optional.data_directories.entry(kind)
    }

    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name_str() == name)
    }

    pub fn section_for_rva(&self, rva: u32) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.contains_rva(rva))
    }

    /// Raw bytes of a section as stored in the file.
    pub fn section_data(&self, section: &SectionHeader) -> PeResult<&'a [u8]> {
        self.reader().bytes(
            section.pointer_to_raw_data as usize,
            section.size_of_raw_data as usize,
        )
    }

    /// Translate an RVA into a file offset.
    ///
    /// The section containing `rva` decides the offset. RVAs no section
    /// covers map to themselves when they fall inside the headers.
    pub fn rva_to_offset(&self, rva: u32) -> PeResult<usize> {
        if let Some(offset) = self.sections.iter().find_map(|s| s.rva_to_offset(rva)) {
            return Ok(offset);
        }
        if rva < self.optional.size_of_headers && (rva as usize) < self.data.len() {
            return Ok(rva as usize);
        }
        Err(PeError::UnmappedRva(rva))
    }

    /// Name and thunk RVAs always go through the section table; in direct
    /// mode an unmapped value is taken as a file offset.
    fn resolve_rva(&self, rva: u32) -> Option<usize> {
        match self.rva_to_offset(rva) {
            Ok(offset) => Some(offset),
            Err(_) if self.options.import_addressing == ImportAddressing::Direct => {
                Some(rva as usize)
            }
            Err(_) => None,
        }
    }

    fn import_table_offset(&self, dir: &DataDirectory) -> PeResult<usize> {
        match self.options.import_addressing {
            ImportAddressing::Translated => self.rva_to_offset(dir.virtual_address),
            ImportAddressing::Direct => Ok(dir.virtual_address as usize),
        }
    }

    /// Decode the import descriptor table.
    ///
    /// The scan stops at the first all-zero descriptor; the directory size
    /// only caps how many slots are read. A missing import directory yields
    /// an empty list.
    pub fn imports(&self) -> PeResult<Vec<ImportDescriptor>> {
        let dir = self.directory(DataDirectoryType::Import);
        if !dir.is_present() {
            return Ok(Vec::new());
        }
        let offset = self.import_table_offset(dir)?;
        let ceiling = dir.size as usize / ImportDescriptor::SIZE;
        debug!(
            "Import directory RVA 0x{:08X} -> file offset 0x{:X}, at most {} descriptors",
            dir.virtual_address, offset, ceiling
        );
        import::walk_descriptors(&self.reader(), offset, ceiling)
    }

    pub fn import_dll_name(&self, desc: &ImportDescriptor) -> PeResult<String> {
        let offset = self
            .resolve_rva(desc.name_rva)
            .ok_or(PeError::UnmappedRva(desc.name_rva))?;
        self.reader().cstr(offset, MAX_NAME_LEN)
    }

    pub fn import_functions(&self, desc: &ImportDescriptor) -> PeResult<Vec<ImportedFunction>> {
        let table_rva = desc.lookup_table_rva();
        if table_rva == 0 {
            return Ok(Vec::new());
        }
        let offset = self
            .resolve_rva(table_rva)
            .ok_or(PeError::UnmappedRva(table_rva))?;
        import::walk_lookup_table(&self.reader(), offset, self.is_pe32plus(), |rva| {
            self.resolve_rva(rva)
        })
    }

    /// Imports with DLL and function names resolved.
    pub fn imported_libraries(&self) -> PeResult<Vec<ImportedLibrary>> {
        self.imports()?
            .into_iter()
            .map(|descriptor| {
                Ok(ImportedLibrary {
                    name: self.import_dll_name(&descriptor)?,
                    functions: self.import_functions(&descriptor)?,
                    descriptor,
                })
            })
            .collect()
    }
}
