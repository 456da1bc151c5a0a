//! `hadron-srat` --- a standalone, `no_std` locator and decoder for the ACPI
//! System Resource Affinity Table.
//!
//! Starting from the address of the RSDP, this crate resolves the RSDT or
//! XSDT, walks its entries to find a table by signature, and decodes the
//! variable-length affinity records of the SRAT (processor and memory
//! proximity domains). The SLIT locality matrix is available as well.
//!
//! Nothing is ever dereferenced directly. Every byte is fetched through a
//! [`MemoryReader`], which may fail (for instance when the target address
//! space has no page mapped at the requested address). Such failures are
//! propagated as [`AcpiError::ReadFault`]; they are never replaced by a
//! default value.
//!
//! # Usage
//!
//! ```ignore
//! let tables = AcpiTables::new(rsdp_address, my_reader)?;
//! let srat = tables.srat()?;
//! for record in srat.records() {
//!     let record = record?;
//!     // ...
//! }
//! ```

#![no_std]
#![warn(missing_docs)]

pub mod reader;
pub mod rsdp;
pub mod rsdt;
pub mod sdt;
pub mod slit;
pub mod srat;

#[cfg(test)]
mod testutil;

use core::fmt;

// Re-export key types at crate root for convenience.
pub use reader::{MemoryReader, ReadFault, SliceMemory};
pub use rsdp::resolve_root;
pub use rsdt::{MatchingTableIter, RootEntries, RootTableKind, find_table};
pub use sdt::TableHeader;
pub use slit::Slit;
pub use srat::{
    AffinityRecord, MemoryRange, ProcessorAffinity, Srat, SratRecordIter, decode_srat,
};

/// Errors that can occur while locating or decoding ACPI tables.
///
/// Every variant carries the address, offset or signature that caused it so
/// callers can report (and tests can assert on) the exact failure point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiError {
    /// The memory reader could not supply `size` bytes at `addr`.
    ReadFault {
        /// First address of the failed read.
        addr: u64,
        /// Number of bytes requested.
        size: usize,
    },
    /// The bytes at `addr` did not match the expected 4- or 8-byte signature.
    InvalidSignature {
        /// Address of the structure whose signature was checked.
        addr: u64,
    },
    /// The RSDP at `rsdp` names a null RSDT/XSDT.
    MissingRootTable {
        /// Address of the RSDP.
        rsdp: u64,
    },
    /// No entry of the root table points at a table with this signature.
    NotFound {
        /// The signature that was searched for.
        signature: [u8; 4],
    },
    /// The SRAT record at `offset` (relative to the start of the table)
    /// reports a zero length or extends past the end of the table, or a
    /// SLIT entry lies outside its table.
    MalformedRecord {
        /// Byte offset of the record from the start of its table.
        offset: u32,
    },
    /// The byte sum of the structure at `addr` is not zero.
    InvalidChecksum {
        /// Address of the structure whose checksum was checked.
        addr: u64,
    },
    /// The table at `addr` declares a length larger than the caller allows.
    TableTooLarge {
        /// Address of the table.
        addr: u64,
        /// Length declared in the table header.
        length: u32,
    },
}

impl AcpiError {
    /// Returns `true` if this error only reports an absent table.
    ///
    /// Unlike the other variants, a missing table is a normal outcome on
    /// machines that have no NUMA topology to describe.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ReadFault> for AcpiError {
    fn from(fault: ReadFault) -> Self {
        Self::ReadFault {
            addr: fault.addr,
            size: fault.size,
        }
    }
}

impl fmt::Display for AcpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFault { addr, size } => {
                write!(f, "cannot read {size} byte(s) at {addr:#x}")
            }
            Self::InvalidSignature { addr } => write!(f, "invalid table signature at {addr:#x}"),
            Self::MissingRootTable { rsdp } => {
                write!(f, "RSDP at {rsdp:#x} does not name a root table")
            }
            Self::NotFound { signature } => {
                write!(f, "no {} table in the root table", Signature(signature))
            }
            Self::MalformedRecord { offset } => {
                write!(f, "malformed affinity record at offset {offset:#x}")
            }
            Self::InvalidChecksum { addr } => write!(f, "bad checksum for table at {addr:#x}"),
            Self::TableTooLarge { addr, length } => {
                write!(f, "table at {addr:#x} declares an oversized length of {length} bytes")
            }
        }
    }
}

impl core::error::Error for AcpiError {}

/// Displays a 4-byte table signature, escaping non-printable bytes.
pub struct Signature<'a>(pub &'a [u8; 4]);

impl fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", char::from(byte))?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

/// Root of the ACPI table hierarchy, discovered from the RSDP.
///
/// This is the primary entry point. Construct it with [`AcpiTables::new`]
/// from the RSDP address and a [`MemoryReader`], then look tables up by
/// signature. Nothing is cached: every lookup reads the live address space
/// again.
pub struct AcpiTables<R: MemoryReader> {
    /// Reader used for every memory access.
    reader: R,
    /// Address of the RSDT or XSDT.
    root_addr: u64,
    /// Which of the two root tables `root_addr` points at.
    kind: RootTableKind,
}

impl<R: MemoryReader> AcpiTables<R> {
    /// Validate the RSDP at `rsdp_addr` and resolve the root table.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::InvalidSignature`] if the RSDP signature is
    /// wrong, [`AcpiError::MissingRootTable`] if it names a null root table,
    /// or [`AcpiError::ReadFault`] if the RSDP cannot be read.
    pub fn new(rsdp_addr: u64, reader: R) -> Result<Self, AcpiError> {
        let (root_addr, kind) = rsdp::resolve_root(&reader, rsdp_addr)?;
        Ok(Self {
            reader,
            root_addr,
            kind,
        })
    }

    /// Search the root table for the first table with the given signature.
    ///
    /// # Errors
    ///
    /// See [`rsdt::find_table`].
    pub fn find_table(&self, signature: &[u8; 4]) -> Result<u64, AcpiError> {
        rsdt::find_table(&self.reader, self.root_addr, self.kind, signature)
    }

    /// Returns an iterator over every table with the given signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the root table itself cannot be validated.
    pub fn find_all_tables<'a>(
        &'a self,
        signature: &'a [u8; 4],
    ) -> Result<MatchingTableIter<'a, R>, AcpiError> {
        rsdt::find_all_tables(&self.reader, self.root_addr, self.kind, signature)
    }

    /// Locate and open the SRAT.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::NotFound`] if there is no SRAT, or another
    /// [`AcpiError`] variant if the root table or the SRAT header is bad.
    pub fn srat(&self) -> Result<Srat<&R>, AcpiError> {
        let addr = self.find_table(srat::SRAT_SIGNATURE)?;
        Srat::parse(&self.reader, addr)
    }

    /// Locate and open the SRAT, rejecting tables longer than `max_length`.
    ///
    /// # Errors
    ///
    /// As [`AcpiTables::srat`], plus [`AcpiError::TableTooLarge`].
    pub fn srat_with_limit(&self, max_length: u32) -> Result<Srat<&R>, AcpiError> {
        let addr = self.find_table(srat::SRAT_SIGNATURE)?;
        Srat::parse_with_limit(&self.reader, addr, max_length)
    }

    /// Locate and open the SLIT.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::NotFound`] if there is no SLIT, or another
    /// [`AcpiError`] variant if the table is malformed.
    pub fn slit(&self) -> Result<Slit<&R>, AcpiError> {
        let addr = self.find_table(slit::SLIT_SIGNATURE)?;
        Slit::parse(&self.reader, addr)
    }

    /// Locate and open the SLIT, rejecting tables longer than `max_length`.
    ///
    /// # Errors
    ///
    /// As [`AcpiTables::slit`], plus [`AcpiError::TableTooLarge`].
    pub fn slit_with_limit(&self, max_length: u32) -> Result<Slit<&R>, AcpiError> {
        let addr = self.find_table(slit::SLIT_SIGNATURE)?;
        Slit::parse_with_limit(&self.reader, addr, max_length)
    }

    /// Returns a reference to the underlying [`MemoryReader`].
    #[must_use]
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Returns the address of the RSDT or XSDT.
    #[must_use]
    pub fn root_addr(&self) -> u64 {
        self.root_addr
    }

    /// Returns whether the root table is an RSDT or an XSDT.
    #[must_use]
    pub fn kind(&self) -> RootTableKind {
        self.kind
    }
}
