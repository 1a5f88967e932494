//! PE optional header (PE32 and PE32+ layouts)

use log::warn;

use crate::data_dir::{DataDirectories, NUM_DATA_DIRECTORIES};
use crate::error::PeResult;
use crate::reader::{offset_add, ByteReader};
use crate::tables::flag_names;

pub const PE32_MAGIC: u16 = 0x10b;
pub const PE32PLUS_MAGIC: u16 = 0x20b;
pub const ROM_MAGIC: u16 = 0x107;

code_enum! {
    /// Windows subsystem required to run the image.
    pub enum Subsystem: u16 {
        Unspecified = 0 => "unspecified",
        Native = 1 => "native",
        WindowsGui = 2 => "windows_gui",
        WindowsConsole = 3 => "windows_console",
        Os2Console = 5 => "os2_console",
        PosixConsole = 7 => "posix_console",
        NativeWin9xDriver = 8 => "native_win9x_driver",
        WindowsCeGui = 9 => "windows_ce_gui",
        EfiApplication = 10 => "efi_application",
        EfiBootServiceDriver = 11 => "efi_boot_service_driver",
        EfiRuntimeDriver = 12 => "efi_runtime_driver",
        EfiRom = 13 => "efi_rom",
        Xbox = 14 => "xbox",
        WindowsBootApplication = 16 => "windows_boot_application",
    }
}

/// DLL characteristics (`IMAGE_DLLCHARACTERISTICS_*`)
pub const DLL_CHARACTERISTICS: &[(&str, u16)] = &[
    ("HIGH_ENTROPY_VA", 0x0020),
    ("DYNAMIC_BASE", 0x0040),
    ("FORCE_INTEGRITY", 0x0080),
    ("NX_COMPAT", 0x0100),
    ("NO_ISOLATION", 0x0200),
    ("NO_SEH", 0x0400),
    ("NO_BIND", 0x0800),
    ("APPCONTAINER", 0x1000),
    ("WDM_DRIVER", 0x2000),
    ("GUARD_CF", 0x4000),
    ("TERMINAL_SERVER_AWARE", 0x8000),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    /// Absent in PE32+
    pub base_of_data: Option<u32>,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: Subsystem,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: DataDirectories,
}

impl OptionalHeader {
    /// Fixed fields before the directory array, PE32
    pub const PE32_FIXED_SIZE: usize = 96;
    /// Fixed fields before the directory array, PE32+
    pub const PE32PLUS_FIXED_SIZE: usize = 112;

    /// Decode the optional header at `offset`.
    ///
    /// With `honor_declared_count` only `number_of_rva_and_sizes` directories
    /// (capped at 16) are read; otherwise all 16 are.
    pub fn parse(r: &ByteReader, offset: usize, honor_declared_count: bool) -> PeResult<Self> {
        let magic = r.u16(offset)?;
        let is_pe32plus = magic == PE32PLUS_MAGIC;
        if magic != PE32_MAGIC && magic != PE32PLUS_MAGIC && magic != ROM_MAGIC {
            warn!("Unrecognized optional header magic 0x{:X}, assuming PE32 layout", magic);
        }

        let fixed = if is_pe32plus {
            Self::PE32PLUS_FIXED_SIZE
        } else {
            Self::PE32_FIXED_SIZE
        };
        r.bytes(offset, fixed)?;

        let (base_of_data, image_base) = if is_pe32plus {
            (None, r.u64(offset + 24)?)
        } else {
            (Some(r.u32(offset + 24)?), r.u32(offset + 28)? as u64)
        };

        // Stack/heap sizes widen to 8 bytes in PE32+, shifting the tail
        let (stack_reserve, stack_commit, heap_reserve, heap_commit, tail) = if is_pe32plus {
            (
                r.u64(offset + 72)?,
                r.u64(offset + 80)?,
                r.u64(offset + 88)?,
                r.u64(offset + 96)?,
                offset + 104,
            )
        } else {
            (
                r.u32(offset + 72)? as u64,
                r.u32(offset + 76)? as u64,
                r.u32(offset + 80)? as u64,
                r.u32(offset + 84)? as u64,
                offset + 88,
            )
        };

        let number_of_rva_and_sizes = r.u32(tail + 4)?;
        let dir_count = if honor_declared_count {
            (number_of_rva_and_sizes as usize).min(NUM_DATA_DIRECTORIES)
        } else {
            NUM_DATA_DIRECTORIES
        };
        let dir_offset = offset_add("data directories", offset, fixed)?;
        let data_directories = DataDirectories::parse(r, dir_offset, dir_count)?;

        Ok(Self {
            magic,
            major_linker_version: r.u8(offset + 2)?,
            minor_linker_version: r.u8(offset + 3)?,
            size_of_code: r.u32(offset + 4)?,
            size_of_initialized_data: r.u32(offset + 8)?,
            size_of_uninitialized_data: r.u32(offset + 12)?,
            address_of_entry_point: r.u32(offset + 16)?,
            base_of_code: r.u32(offset + 20)?,
            base_of_data,
            image_base,
            section_alignment: r.u32(offset + 32)?,
            file_alignment: r.u32(offset + 36)?,
            major_operating_system_version: r.u16(offset + 40)?,
            minor_operating_system_version: r.u16(offset + 42)?,
            major_image_version: r.u16(offset + 44)?,
            minor_image_version: r.u16(offset + 46)?,
            major_subsystem_version: r.u16(offset + 48)?,
            minor_subsystem_version: r.u16(offset + 50)?,
            win32_version_value: r.u32(offset + 52)?,
            size_of_image: r.u32(offset + 56)?,
            size_of_headers: r.u32(offset + 60)?,
            check_sum: r.u32(offset + 64)?,
            subsystem: Subsystem::from_code(r.u16(offset + 68)?),
            dll_characteristics: r.u16(offset + 70)?,
            size_of_stack_reserve: stack_reserve,
            size_of_stack_commit: stack_commit,
            size_of_heap_reserve: heap_reserve,
            size_of_heap_commit: heap_commit,
            loader_flags: r.u32(tail)?,
            number_of_rva_and_sizes,
            data_directories,
        })
    }

    pub fn is_pe32plus(&self) -> bool {
        self.magic == PE32PLUS_MAGIC
    }

    /// Size of the fields preceding the directory array.
    pub fn fixed_size(&self) -> usize {
        if self.is_pe32plus() {
            Self::PE32PLUS_FIXED_SIZE
        } else {
            Self::PE32_FIXED_SIZE
        }
    }

    pub fn dll_characteristic_names(&self) -> Vec<&'static str> {
        flag_names(DLL_CHARACTERISTICS, self.dll_characteristics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_dir::{DataDirectory, DataDirectoryType};
    use crate::testutil::ImageBuilder;

    fn opt_offset(b: &ImageBuilder) -> usize {
        b.dos.pe_offset as usize + 4 + 20
    }

    #[test]
    fn test_pe32_fields() {
        let b = ImageBuilder::pe32();
        let data = b.build();
        let opt = OptionalHeader::parse(&ByteReader::new(&data), opt_offset(&b), true).unwrap();
        assert_eq!(opt, b.optional);
        assert!(!opt.is_pe32plus());
        assert!(opt.base_of_data.is_some());
    }

    #[test]
    fn test_pe32plus_fields() {
        let mut b = ImageBuilder::pe32plus();
        b.optional.image_base = 0x1_4000_0000;
        b.optional.size_of_stack_reserve = 0x1_0000_0000;
        b.optional.dll_characteristics = 0x8160;
        let data = b.build();
        let opt = OptionalHeader::parse(&ByteReader::new(&data), opt_offset(&b), true).unwrap();
        assert_eq!(opt, b.optional);
        assert!(opt.is_pe32plus());
        assert_eq!(opt.base_of_data, None);
        assert_eq!(
            opt.dll_characteristic_names(),
            vec!["HIGH_ENTROPY_VA", "DYNAMIC_BASE", "NX_COMPAT", "TERMINAL_SERVER_AWARE"]
        );
    }

    #[test]
    fn test_declared_directory_count() {
        let mut b = ImageBuilder::pe32();
        b.optional.number_of_rva_and_sizes = 2;
        // The encoder still writes all 16 slots
        b.raw_directories = Some([DataDirectory { virtual_address: 0x5000, size: 0x40 }; 16]);
        let data = b.build();
        let r = ByteReader::new(&data);

        let honored = OptionalHeader::parse(&r, opt_offset(&b), true).unwrap();
        assert!(honored.data_directories.entry(DataDirectoryType::Import).is_present());
        assert!(!honored.data_directories.entry(DataDirectoryType::Resource).is_present());

        let fixed = OptionalHeader::parse(&r, opt_offset(&b), false).unwrap();
        assert!(fixed.data_directories.entry(DataDirectoryType::Reserved).is_present());
    }

    #[test]
    fn test_subsystem_lookup() {
        assert_eq!(Subsystem::from_code(3), Subsystem::WindowsConsole);
        assert_eq!(Subsystem::from_code(4), Subsystem::Unknown(4));
        assert_eq!(Subsystem::from_code(10).name(), "efi_application");
        assert_eq!(Subsystem::Unknown(99).to_string(), "unknown(0x63)");
    }

    #[test]
    fn test_truncated_optional_header() {
        let b = ImageBuilder::pe32();
        let data = b.build();
        let cut = &data[..opt_offset(&b) + 50];
        assert!(OptionalHeader::parse(&ByteReader::new(cut), opt_offset(&b), true).is_err());
    }
}
