//! System Description Table (SDT) header access and checksum utilities.
//!
//! Every ACPI table other than the RSDP starts with the same 36-byte header.
//! Only the signature and length are needed to walk and decode tables; the
//! revision is exposed for diagnostics.

use crate::reader::{self, MemoryReader};
use crate::AcpiError;

/// The size of an SDT header in bytes.
pub const SDT_HEADER_SIZE: u64 = 36;

/// Byte offset of the 4-byte signature.
const SIGNATURE_OFFSET: u64 = 0;

/// Byte offset of the `u32` table length.
const LENGTH_OFFSET: u64 = 4;

/// Byte offset of the revision byte.
const REVISION_OFFSET: u64 = 8;

/// Number of bytes summed per read when computing a checksum.
const CHECKSUM_CHUNK: usize = 64;

/// The parts of an SDT header this crate consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    /// 4-byte ASCII signature identifying the table type.
    pub signature: [u8; 4],
    /// Total length of the table, including the header, in bytes.
    pub length: u32,
    /// Revision of the table structure.
    pub revision: u8,
}

/// Read the 4-byte signature of the table at `addr`.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if the signature is unreadable.
pub fn read_signature(reader: &impl MemoryReader, addr: u64) -> Result<[u8; 4], AcpiError> {
    reader::read_bytes(reader, addr.wrapping_add(SIGNATURE_OFFSET))
}

/// Read the declared length of the table at `addr`.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if the length field is unreadable.
pub fn read_length(reader: &impl MemoryReader, addr: u64) -> Result<u32, AcpiError> {
    reader::read_u32(reader, addr.wrapping_add(LENGTH_OFFSET))
}

/// Check that the table at `addr` carries `expected` as its signature.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`] on mismatch, or
/// [`AcpiError::ReadFault`] if the signature is unreadable.
pub fn expect_signature(
    reader: &impl MemoryReader,
    addr: u64,
    expected: &[u8; 4],
) -> Result<(), AcpiError> {
    if &read_signature(reader, addr)? == expected {
        Ok(())
    } else {
        Err(AcpiError::InvalidSignature { addr })
    }
}

/// Validate the signature of the table at `addr` and read its header.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`] if the signature is not
/// `expected`, or [`AcpiError::ReadFault`] if the header is unreadable.
pub fn table_header(
    reader: &impl MemoryReader,
    addr: u64,
    expected: &[u8; 4],
) -> Result<TableHeader, AcpiError> {
    expect_signature(reader, addr, expected)?;
    Ok(TableHeader {
        signature: *expected,
        length: read_length(reader, addr)?,
        revision: reader::read_u8(reader, addr.wrapping_add(REVISION_OFFSET))?,
    })
}

/// Sum `len` bytes starting at `addr`, modulo 256.
///
/// # Errors
///
/// Returns [`AcpiError::ReadFault`] if any byte in the range is unreadable.
pub fn checksum(reader: &impl MemoryReader, addr: u64, len: u64) -> Result<u8, AcpiError> {
    let mut sum: u8 = 0;
    let mut chunk = [0u8; CHECKSUM_CHUNK];
    let mut done = 0;
    while done < len {
        // Bounded by CHECKSUM_CHUNK, so the cast cannot truncate.
        #[allow(clippy::cast_possible_truncation)]
        let n = (len - done).min(CHECKSUM_CHUNK as u64) as usize;
        reader.read(addr.wrapping_add(done), &mut chunk[..n])?;
        for &byte in &chunk[..n] {
            sum = sum.wrapping_add(byte);
        }
        done += n as u64;
    }
    Ok(sum)
}

/// Validate the checksum of the whole table at `addr`.
///
/// ACPI tables are designed so that the sum of all bytes in the table,
/// header included, equals zero (mod 256).
///
/// # Errors
///
/// Returns [`AcpiError::InvalidChecksum`] if the bytes do not sum to zero,
/// or [`AcpiError::ReadFault`] if any byte is unreadable.
pub fn validate_checksum(reader: &impl MemoryReader, addr: u64) -> Result<(), AcpiError> {
    let length = read_length(reader, addr)?;
    if checksum(reader, addr, u64::from(length))? == 0 {
        Ok(())
    } else {
        Err(AcpiError::InvalidChecksum { addr })
    }
}
