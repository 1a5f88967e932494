//! Bounds-checked little-endian field reads over an immutable byte buffer.
//!
//! Every structure decoder in this crate goes through [`ByteReader`]; it is
//! the only place that compares an offset against the buffer length.

use crate::error::{PeError, PeResult};

/// Read-only cursor-less view over the raw file bytes.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> PeResult<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(PeError::OutOfBounds {
            offset,
            len,
            available: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(PeError::OutOfBounds {
                offset,
                len,
                available: self.data.len(),
            });
        }
        Ok(&self.data[offset..end])
    }

    /// Copy a fixed-length span into an array.
    pub fn array<const N: usize>(&self, offset: usize) -> PeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub fn u8(&self, offset: usize) -> PeResult<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u16(&self, offset: usize) -> PeResult<u16> {
        Ok(u16::from_le_bytes(self.array(offset)?))
    }

    pub fn u32(&self, offset: usize) -> PeResult<u32> {
        Ok(u32::from_le_bytes(self.array(offset)?))
    }

    pub fn u64(&self, offset: usize) -> PeResult<u64> {
        Ok(u64::from_le_bytes(self.array(offset)?))
    }

    /// Read a NUL-terminated string of at most `max` bytes.
    ///
    /// A missing terminator is tolerated: the string then runs to `max` or to
    /// the end of the buffer, whichever comes first. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn cstr(&self, offset: usize, max: usize) -> PeResult<String> {
        if offset >= self.data.len() {
            return Err(PeError::OutOfBounds {
                offset,
                len: 1,
                available: self.data.len(),
            });
        }
        let limit = self.data.len().min(offset.saturating_add(max));
        let window = &self.data[offset..limit];
        let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
        Ok(String::from_utf8_lossy(&window[..end]).into_owned())
    }
}

/// Add a field-derived delta to an offset, rejecting overflow.
pub fn offset_add(what: &'static str, base: usize, delta: usize) -> PeResult<usize> {
    base.checked_add(delta).ok_or_else(|| PeError::MalformedOffset {
        what,
        detail: format!("0x{:X} + 0x{:X} overflows", base, delta),
    })
}
