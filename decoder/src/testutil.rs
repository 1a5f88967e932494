//! Synthetic PE image encoder for tests

use crate::coff::{CoffHeader, Machine, PE_SIG};
use crate::data_dir::{DataDirectories, DataDirectory, DataDirectoryType, NUM_DATA_DIRECTORIES};
use crate::dos::DosHeader;
use crate::import::ImportDescriptor;
use crate::optional::{OptionalHeader, Subsystem, PE32PLUS_MAGIC, PE32_MAGIC};
use crate::section::SectionHeader;

/// Header values plus extra bytes, encoded into a flat file image by
/// [`ImageBuilder::build`].
pub struct ImageBuilder {
    pub dos: DosHeader,
    pub coff: CoffHeader,
    pub optional: OptionalHeader,
    /// Written instead of `optional.data_directories` when set
    pub raw_directories: Option<[DataDirectory; NUM_DATA_DIRECTORIES]>,
    pub sections: Vec<SectionHeader>,
    pub patches: Vec<(usize, Vec<u8>)>,
    pub file_size: Option<usize>,
}

impl ImageBuilder {
    pub fn pe32() -> Self {
        Self {
            dos: DosHeader {
                signature: *b"MZ",
                last_page_size: 0x90,
                file_num_pages: 3,
                num_reloc_items: 0,
                header_num_paragraphs: 4,
                min_extra_paragraphs: 0,
                max_extra_paragraphs: 0xFFFF,
                initial_rel_ss: 0,
                initial_sp: 0xB8,
                checksum: 0,
                initial_ip: 0,
                initial_rel_cs: 0,
                reloc_tbl_address: 0x40,
                overlay_num: 0,
                reserved1: [0; 8],
                oem_id: 0,
                oem_info: 0,
                reserved2: [0; 20],
                pe_offset: 0x80,
            },
            coff: CoffHeader {
                machine: Machine::I386,
                number_of_sections: 0,
                time_date_stamp: 0x4A5B_C60F,
                pointer_to_symbol_table: 0,
                number_of_symbols: 0,
                size_of_opt_header: 224,
                characteristics: 0x0102,
            },
            optional: OptionalHeader {
                magic: PE32_MAGIC,
                major_linker_version: 14,
                minor_linker_version: 29,
                size_of_code: 0x200,
                size_of_initialized_data: 0x400,
                size_of_uninitialized_data: 0,
                address_of_entry_point: 0x1010,
                base_of_code: 0x1000,
                base_of_data: Some(0x2000),
                image_base: 0x0040_0000,
                section_alignment: 0x1000,
                file_alignment: 0x200,
                major_operating_system_version: 6,
                minor_operating_system_version: 0,
                major_image_version: 0,
                minor_image_version: 0,
                major_subsystem_version: 6,
                minor_subsystem_version: 0,
                win32_version_value: 0,
                size_of_image: 0x4000,
                size_of_headers: 0x400,
                check_sum: 0,
                subsystem: Subsystem::WindowsConsole,
                dll_characteristics: 0x8140,
                size_of_stack_reserve: 0x10_0000,
                size_of_stack_commit: 0x1000,
                size_of_heap_reserve: 0x10_0000,
                size_of_heap_commit: 0x1000,
                loader_flags: 0,
                number_of_rva_and_sizes: NUM_DATA_DIRECTORIES as u32,
                data_directories: DataDirectories::default(),
            },
            raw_directories: None,
            sections: Vec::new(),
            patches: Vec::new(),
            file_size: None,
        }
    }

    pub fn pe32plus() -> Self {
        let mut b = Self::pe32();
        b.coff.machine = Machine::Amd64;
        b.coff.size_of_opt_header = 240;
        b.coff.characteristics = 0x0022;
        b.optional.magic = PE32PLUS_MAGIC;
        b.optional.base_of_data = None;
        b.optional.image_base = 0x1_4000_0000;
        b
    }

    pub fn section(
        name: &str,
        virtual_address: u32,
        virtual_size: u32,
        pointer_to_raw_data: u32,
        size_of_raw_data: u32,
        characteristics: u32,
    ) -> SectionHeader {
        let mut raw_name = [0u8; 8];
        let len = name.len().min(8);
        raw_name[..len].copy_from_slice(&name.as_bytes()[..len]);
        SectionHeader {
            name: raw_name,
            virtual_size,
            virtual_address,
            size_of_raw_data,
            pointer_to_raw_data,
            pointer_to_relocations: 0,
            pointer_to_line_numbers: 0,
            num_of_relocations: 0,
            num_of_line_numbers: 0,
            characteristics,
        }
    }

    /// Append a section header and bump `number_of_sections`.
    pub fn push_section(&mut self, section: SectionHeader) {
        self.sections.push(section);
        self.coff.number_of_sections += 1;
    }

    pub fn set_directory(&mut self, kind: DataDirectoryType, virtual_address: u32, size: u32) {
        *self.optional.data_directories.entry_mut(kind) = DataDirectory {
            virtual_address,
            size,
        };
    }

    /// Write `bytes` at file offset `offset`.
    pub fn place(&mut self, offset: usize, bytes: &[u8]) {
        self.patches.push((offset, bytes.to_vec()));
    }

    pub fn encode_import(desc: &ImportDescriptor) -> Vec<u8> {
        let mut out = Vec::with_capacity(ImportDescriptor::SIZE);
        for v in [
            desc.orig_first_thunk,
            desc.time_date_stamp,
            desc.forward_chain,
            desc.name_rva,
            desc.first_thunk,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let pe = self.dos.pe_offset as usize;
        let coff = pe + PE_SIG.len();
        let opt = coff + CoffHeader::SIZE;
        let fixed = if self.optional.magic == PE32PLUS_MAGIC {
            OptionalHeader::PE32PLUS_FIXED_SIZE
        } else {
            OptionalHeader::PE32_FIXED_SIZE
        };
        let dirs = opt + fixed;
        let table = opt + self.coff.size_of_opt_header as usize;

        let mut size = (dirs + NUM_DATA_DIRECTORIES * DataDirectory::SIZE)
            .max(table + self.sections.len() * SectionHeader::SIZE);
        for s in &self.sections {
            size = size.max((s.pointer_to_raw_data + s.size_of_raw_data) as usize);
        }
        for (off, bytes) in &self.patches {
            size = size.max(off + bytes.len());
        }
        if let Some(fs) = self.file_size {
            size = size.max(fs);
        }

        let mut w = Writer(vec![0u8; size]);

        let d = &self.dos;
        w.bytes(0, &d.signature);
        for (i, v) in [
            d.last_page_size,
            d.file_num_pages,
            d.num_reloc_items,
            d.header_num_paragraphs,
            d.min_extra_paragraphs,
            d.max_extra_paragraphs,
            d.initial_rel_ss,
            d.initial_sp,
            d.checksum,
            d.initial_ip,
            d.initial_rel_cs,
            d.reloc_tbl_address,
            d.overlay_num,
        ]
        .into_iter()
        .enumerate()
        {
            w.u16(2 + i * 2, v);
        }
        w.bytes(28, &d.reserved1);
        w.u16(36, d.oem_id);
        w.u16(38, d.oem_info);
        w.bytes(40, &d.reserved2);
        w.u32(60, d.pe_offset);

        w.bytes(pe, &PE_SIG);

        let c = &self.coff;
        w.u16(coff, c.machine.code());
        w.u16(coff + 2, c.number_of_sections);
        w.u32(coff + 4, c.time_date_stamp);
        w.u32(coff + 8, c.pointer_to_symbol_table);
        w.u32(coff + 12, c.number_of_symbols);
        w.u16(coff + 16, c.size_of_opt_header);
        w.u16(coff + 18, c.characteristics);

        let o = &self.optional;
        let plus = o.magic == PE32PLUS_MAGIC;
        w.u16(opt, o.magic);
        w.0[opt + 2] = o.major_linker_version;
        w.0[opt + 3] = o.minor_linker_version;
        w.u32(opt + 4, o.size_of_code);
        w.u32(opt + 8, o.size_of_initialized_data);
        w.u32(opt + 12, o.size_of_uninitialized_data);
        w.u32(opt + 16, o.address_of_entry_point);
        w.u32(opt + 20, o.base_of_code);
        if plus {
            w.u64(opt + 24, o.image_base);
        } else {
            w.u32(opt + 24, o.base_of_data.unwrap_or(0));
            w.u32(opt + 28, o.image_base as u32);
        }
        w.u32(opt + 32, o.section_alignment);
        w.u32(opt + 36, o.file_alignment);
        w.u16(opt + 40, o.major_operating_system_version);
        w.u16(opt + 42, o.minor_operating_system_version);
        w.u16(opt + 44, o.major_image_version);
        w.u16(opt + 46, o.minor_image_version);
        w.u16(opt + 48, o.major_subsystem_version);
        w.u16(opt + 50, o.minor_subsystem_version);
        w.u32(opt + 52, o.win32_version_value);
        w.u32(opt + 56, o.size_of_image);
        w.u32(opt + 60, o.size_of_headers);
        w.u32(opt + 64, o.check_sum);
        w.u16(opt + 68, o.subsystem.code());
        w.u16(opt + 70, o.dll_characteristics);
        let tail = if plus {
            w.u64(opt + 72, o.size_of_stack_reserve);
            w.u64(opt + 80, o.size_of_stack_commit);
            w.u64(opt + 88, o.size_of_heap_reserve);
            w.u64(opt + 96, o.size_of_heap_commit);
            opt + 104
        } else {
            w.u32(opt + 72, o.size_of_stack_reserve as u32);
            w.u32(opt + 76, o.size_of_stack_commit as u32);
            w.u32(opt + 80, o.size_of_heap_reserve as u32);
            w.u32(opt + 84, o.size_of_heap_commit as u32);
            opt + 88
        };
        w.u32(tail, o.loader_flags);
        w.u32(tail + 4, o.number_of_rva_and_sizes);

        let entries: Vec<DataDirectory> = match &self.raw_directories {
            Some(raw) => raw.to_vec(),
            None => o.data_directories.as_slice().to_vec(),
        };
        for (i, dd) in entries.iter().enumerate() {
            w.u32(dirs + i * DataDirectory::SIZE, dd.virtual_address);
            w.u32(dirs + i * DataDirectory::SIZE + 4, dd.size);
        }

        for (i, s) in self.sections.iter().enumerate() {
            let base = table + i * SectionHeader::SIZE;
            w.bytes(base, &s.name);
            w.u32(base + 8, s.virtual_size);
            w.u32(base + 12, s.virtual_address);
            w.u32(base + 16, s.size_of_raw_data);
            w.u32(base + 20, s.pointer_to_raw_data);
            w.u32(base + 24, s.pointer_to_relocations);
            w.u32(base + 28, s.pointer_to_line_numbers);
            w.u16(base + 32, s.num_of_relocations);
            w.u16(base + 34, s.num_of_line_numbers);
            w.u32(base + 36, s.characteristics);
        }

        for (off, bytes) in &self.patches {
            w.bytes(*off, bytes);
        }

        w.0
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn bytes(&mut self, off: usize, b: &[u8]) {
        self.0[off..off + b.len()].copy_from_slice(b);
    }

    fn u16(&mut self, off: usize, v: u16) {
        self.bytes(off, &v.to_le_bytes());
    }

    fn u32(&mut self, off: usize, v: u32) {
        self.bytes(off, &v.to_le_bytes());
    }

    fn u64(&mut self, off: usize, v: u64) {
        self.bytes(off, &v.to_le_bytes());
    }
}
