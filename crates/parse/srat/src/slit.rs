//! System Locality Information Table (SLIT) parsing.
//!
//! The SLIT provides a matrix of relative distances between NUMA nodes
//! (system localities). Each entry is a `u8` value where 10 represents
//! the local distance and higher values indicate increasing cost.

use crate::reader::{self, MemoryReader};
use crate::sdt::{self, SDT_HEADER_SIZE};
use crate::AcpiError;

/// SLIT table signature.
pub const SLIT_SIGNATURE: &[u8; 4] = b"SLIT";

/// Byte offset of `Number of System Localities`, right after the header.
const NUM_LOCALITIES_OFFSET: u64 = SDT_HEADER_SIZE;

/// Byte offset of the first matrix entry.
const MATRIX_OFFSET: u64 = NUM_LOCALITIES_OFFSET + 8;

/// A SLIT located in the target's memory.
///
/// Matrix entries are read on demand by [`Slit::distance`].
pub struct Slit<R: MemoryReader> {
    reader: R,
    addr: u64,
    length: u32,
    num_localities: u64,
}

impl<R: MemoryReader> Slit<R> {
    /// Open the SLIT at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::InvalidSignature`] if the table signature is not
    /// `SLIT`, [`AcpiError::MalformedRecord`] if the table is too short to
    /// hold the locality count, or [`AcpiError::ReadFault`].
    pub fn parse(reader: R, addr: u64) -> Result<Self, AcpiError> {
        let header = sdt::table_header(&reader, addr, SLIT_SIGNATURE)?;
        if u64::from(header.length) < MATRIX_OFFSET {
            return Err(AcpiError::MalformedRecord {
                offset: u32::try_from(NUM_LOCALITIES_OFFSET).unwrap_or(u32::MAX),
            });
        }
        let num_localities =
            reader::read_u64(&reader, addr.wrapping_add(NUM_LOCALITIES_OFFSET))?;
        log::debug!("acpi: SLIT at {addr:#x}, {num_localities} localities");
        Ok(Self {
            reader,
            addr,
            length: header.length,
            num_localities,
        })
    }

    /// Open the SLIT at `addr`, refusing tables that declare more than
    /// `max_length` bytes.
    ///
    /// # Errors
    ///
    /// As [`Slit::parse`], plus [`AcpiError::TableTooLarge`].
    pub fn parse_with_limit(reader: R, addr: u64, max_length: u32) -> Result<Self, AcpiError> {
        let slit = Self::parse(reader, addr)?;
        if slit.length > max_length {
            return Err(AcpiError::TableTooLarge {
                addr,
                length: slit.length,
            });
        }
        Ok(slit)
    }

    /// Returns the address of the table.
    #[must_use]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Returns the declared length of the table, header included.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Returns the number of system localities (NUMA nodes).
    #[must_use]
    pub fn num_localities(&self) -> u64 {
        self.num_localities
    }

    /// Returns the relative distance from locality `from` to locality `to`.
    ///
    /// A distance of 10 indicates the same locality. Returns `Ok(None)` if
    /// either index is out of range.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::MalformedRecord`] if the matrix entry lies past
    /// the end of the table, or [`AcpiError::ReadFault`] if it is unreadable.
    pub fn distance(&self, from: u64, to: u64) -> Result<Option<u8>, AcpiError> {
        if from >= self.num_localities || to >= self.num_localities {
            return Ok(None);
        }
        let offset = from
            .checked_mul(self.num_localities)
            .and_then(|row| row.checked_add(to))
            .and_then(|index| index.checked_add(MATRIX_OFFSET))
            .unwrap_or(u64::MAX);
        if offset >= u64::from(self.length) {
            return Err(AcpiError::MalformedRecord {
                offset: u32::try_from(offset).unwrap_or(u32::MAX),
            });
        }
        reader::read_u8(&self.reader, self.addr.wrapping_add(offset)).map(Some)
    }
}
