//! Memory access seam and little-endian primitive decoding.
//!
//! All table walking goes through a [`MemoryReader`]. The reader copies bytes
//! out of some address space (a live process, a kernel, a memory image) and
//! reports unreadable addresses as a [`ReadFault`]. The `read_*` helpers
//! decode fixed-width little-endian integers on top of it.

use crate::AcpiError;

/// A failed read of `size` bytes at `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFault {
    /// First address of the failed read.
    pub addr: u64,
    /// Number of bytes requested.
    pub size: usize,
}

/// Source of raw bytes for ACPI table decoding.
///
/// An implementation must either fill `buf` completely with the bytes found
/// at `addr..addr + buf.len()` or fail. Partial reads are not an outcome:
/// if any byte in the range is unreadable the whole read fails.
///
/// Implementations must not assume the pages behind `addr` are resident or
/// mapped, and must never fabricate bytes for an unreadable range.
pub trait MemoryReader {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadFault`] if any byte of the range cannot be read.
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadFault>;
}

impl<R: MemoryReader + ?Sized> MemoryReader for &R {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        (**self).read(addr, buf)
    }
}

/// Read exactly `N` bytes at `addr`.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if the range is unreadable.
pub fn read_bytes<const N: usize>(
    reader: &impl MemoryReader,
    addr: u64,
) -> Result<[u8; N], AcpiError> {
    let mut buf = [0u8; N];
    reader.read(addr, &mut buf)?;
    Ok(buf)
}

/// Read a `u8` at `addr`.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if the byte is unreadable.
pub fn read_u8(reader: &impl MemoryReader, addr: u64) -> Result<u8, AcpiError> {
    read_bytes::<1>(reader, addr).map(|[b]| b)
}

/// Read a little-endian `u32` at `addr`.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if any byte is unreadable.
pub fn read_u32(reader: &impl MemoryReader, addr: u64) -> Result<u32, AcpiError> {
    read_bytes(reader, addr).map(u32::from_le_bytes)
}

/// Read a little-endian `u64` at `addr`.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if any byte is unreadable.
pub fn read_u64(reader: &impl MemoryReader, addr: u64) -> Result<u64, AcpiError> {
    read_bytes(reader, addr).map(u64::from_le_bytes)
}

/// A [`MemoryReader`] over a byte slice that is mapped at `base`.
///
/// Reads that touch any address outside `base..base + data.len()` fail, so
/// with a non-zero `base` the null address is never readable.
#[derive(Debug, Clone, Copy)]
pub struct SliceMemory<'a> {
    base: u64,
    data: &'a [u8],
}

impl<'a> SliceMemory<'a> {
    /// Map `data` at address `base`.
    #[must_use]
    pub fn new(base: u64, data: &'a [u8]) -> Self {
        Self { base, data }
    }

    /// Returns the address of the first mapped byte.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Returns the number of mapped bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no bytes are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl MemoryReader for SliceMemory<'_> {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        let fault = ReadFault {
            addr,
            size: buf.len(),
        };
        let start = addr
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .ok_or(fault)?;
        let end = start.checked_add(buf.len()).ok_or(fault)?;
        let src = self.data.get(start..end).ok_or(fault)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
