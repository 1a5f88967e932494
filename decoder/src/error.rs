use thiserror::Error;

/// Errors raised while decoding a PE image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeError {
    #[error("Invalid {what} signature: expected {expected:02X?}, found {found:02X?}")]
    InvalidSignature {
        what: &'static str,
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    #[error("Malformed offset for {what}: {detail}")]
    MalformedOffset {
        what: &'static str,
        detail: String,
    },

    #[error("Read of {len} bytes at offset 0x{offset:X} exceeds buffer of {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("Section table truncated: {declared} sections declared, only {decoded} fit in the file")]
    TruncatedSectionTable { declared: u16, decoded: u16 },

    #[error("Section count {count} exceeds the limit of {max}")]
    TooManySections { count: u16, max: u16 },

    #[error("Data directory index {0} is out of range (0-15)")]
    InvalidDirectoryIndex(usize),

    #[error("RVA 0x{0:08X} is not covered by any section")]
    UnmappedRva(u32),
}

pub type PeResult<T> = Result<T, PeError>;
