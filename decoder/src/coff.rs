//! PE signature and COFF file header

use crate::error::{PeError, PeResult};
use crate::reader::ByteReader;
use crate::tables::flag_names;

/// PE signature bytes
pub const PE_SIG: [u8; 4] = [b'P', b'E', 0, 0];

code_enum! {
    /// Target CPU from the COFF `machine` field.
    pub enum Machine: u16 {
        Unspecified = 0x0000 => "unspecified",
        I386 = 0x014c => "i386",
        R3000 = 0x0162 => "r3000",
        R4000 = 0x0166 => "r4000",
        R10000 = 0x0168 => "r10000",
        WceMipsV2 = 0x0169 => "wcemipsv2",
        Alpha = 0x0184 => "alpha",
        Sh3 = 0x01a2 => "sh3",
        Sh3Dsp = 0x01a3 => "sh3dsp",
        Sh3E = 0x01a4 => "sh3e",
        Sh4 = 0x01a6 => "sh4",
        Sh5 = 0x01a8 => "sh5",
        Arm = 0x01c0 => "arm",
        Thumb = 0x01c2 => "thumb",
        ArmNt = 0x01c4 => "armnt",
        Am33 = 0x01d3 => "am33",
        PowerPc = 0x01f0 => "powerpc",
        PowerPcFp = 0x01f1 => "powerpcfp",
        Ia64 = 0x0200 => "ia64",
        Mips16 = 0x0266 => "mips16",
        Alpha64 = 0x0284 => "alpha64",
        MipsFpu = 0x0366 => "mipsfpu",
        MipsFpu16 = 0x0466 => "mipsfpu16",
        TriCore = 0x0520 => "tricore",
        Cef = 0x0cef => "cef",
        Ebc = 0x0ebc => "ebc",
        RiscV32 = 0x5032 => "riscv32",
        RiscV64 = 0x5064 => "riscv64",
        Amd64 = 0x8664 => "amd64",
        M32R = 0x9041 => "m32r",
        Arm64 = 0xaa64 => "arm64",
        Cee = 0xc0ee => "cee",
    }
}

/// COFF characteristics (`IMAGE_FILE_*`)
pub const FILE_CHARACTERISTICS: &[(&str, u16)] = &[
    ("RELOCS_STRIPPED", 0x0001),
    ("EXECUTABLE_IMAGE", 0x0002),
    ("LINE_NUMS_STRIPPED", 0x0004),
    ("LOCAL_SYMS_STRIPPED", 0x0008),
    ("AGGRESSIVE_WS_TRIM", 0x0010),
    ("LARGE_ADDRESS_AWARE", 0x0020),
    ("BYTES_REVERSED_LO", 0x0080),
    ("32BIT_MACHINE", 0x0100),
    ("DEBUG_STRIPPED", 0x0200),
    ("REMOVABLE_RUN_FROM_SWAP", 0x0400),
    ("NET_RUN_FROM_SWAP", 0x0800),
    ("SYSTEM", 0x1000),
    ("DLL", 0x2000),
    ("UP_SYSTEM_ONLY", 0x4000),
    ("BYTES_REVERSED_HI", 0x8000),
];

pub const IMAGE_FILE_EXECUTABLE_IMAGE: u16 = 0x0002;
pub const IMAGE_FILE_DLL: u16 = 0x2000;

/// COFF File Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_opt_header: u16,
    pub characteristics: u16,
}

impl CoffHeader {
    pub const SIZE: usize = 20;

    pub fn parse(r: &ByteReader, offset: usize) -> PeResult<Self> {
        r.bytes(offset, Self::SIZE)?;

        Ok(Self {
            machine: Machine::from_code(r.u16(offset)?),
            number_of_sections: r.u16(offset + 2)?,
            time_date_stamp: r.u32(offset + 4)?,
            pointer_to_symbol_table: r.u32(offset + 8)?,
            number_of_symbols: r.u32(offset + 12)?,
            size_of_opt_header: r.u16(offset + 16)?,
            characteristics: r.u16(offset + 18)?,
        })
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics & IMAGE_FILE_DLL != 0
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics & IMAGE_FILE_EXECUTABLE_IMAGE != 0
    }

    pub fn characteristic_names(&self) -> Vec<&'static str> {
        flag_names(FILE_CHARACTERISTICS, self.characteristics)
    }
}

/// Verify the 4-byte PE signature at `offset`.
pub fn check_pe_signature(r: &ByteReader, offset: usize) -> PeResult<()> {
    let found: [u8; 4] = r.array(offset)?;
    if found != PE_SIG {
        return Err(PeError::InvalidSignature {
            what: "PE",
            expected: PE_SIG.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
