//! RSDT / XSDT table enumeration.
//!
//! The Root System Description Table (RSDT, 32-bit entries) and its 64-bit
//! counterpart (XSDT) contain pointers to all other ACPI tables. This module
//! provides an iterator over those entries and helpers to locate tables by
//! their 4-byte signature.

use core::fmt;

use crate::reader::{self, MemoryReader};
use crate::sdt::{self, SDT_HEADER_SIZE};
use crate::{AcpiError, Signature};

/// RSDT table signature.
pub const RSDT_SIGNATURE: &[u8; 4] = b"RSDT";

/// XSDT table signature.
pub const XSDT_SIGNATURE: &[u8; 4] = b"XSDT";

/// Size in bytes of a single table-pointer entry in the RSDT (32-bit).
const RSDT_ENTRY_SIZE: u64 = 4;

/// Size in bytes of a single table-pointer entry in the XSDT (64-bit).
const XSDT_ENTRY_SIZE: u64 = 8;

/// Which root table an RSDP names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootTableKind {
    /// Root System Description Table, 32-bit entries.
    Rsdt,
    /// Extended System Description Table, 64-bit entries.
    Xsdt,
}

impl RootTableKind {
    /// The signature the root table must carry.
    #[must_use]
    pub fn signature(self) -> &'static [u8; 4] {
        match self {
            Self::Rsdt => RSDT_SIGNATURE,
            Self::Xsdt => XSDT_SIGNATURE,
        }
    }

    /// Size of one entry (and the stride between entries) in bytes.
    #[must_use]
    pub fn entry_size(self) -> u64 {
        match self {
            Self::Rsdt => RSDT_ENTRY_SIZE,
            Self::Xsdt => XSDT_ENTRY_SIZE,
        }
    }
}

impl fmt::Display for RootTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Signature(self.signature()), f)
    }
}

/// Iterator over the table addresses stored in an RSDT or XSDT.
///
/// Entries are produced in table order, null entries included. RSDT
/// entries are zero-extended to 64 bits. The iterator stops for good after
/// the first failed read.
pub struct RootEntries<'a, R: MemoryReader> {
    reader: &'a R,
    /// Address of the first entry (just past the SDT header).
    entries_addr: u64,
    kind: RootTableKind,
    /// Index of the next entry to read.
    index: u64,
    /// Number of entries in the table.
    count: u64,
    failed: bool,
}

impl<'a, R: MemoryReader> RootEntries<'a, R> {
    /// Validate the root table at `root_addr` and prepare to iterate it.
    ///
    /// The entry count is `(length - 36) / entry_size`, rounded down. Well
    /// formed firmware never leaves a remainder; a trailing partial entry is
    /// ignored, and a length shorter than the header yields no entries.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::InvalidSignature`] if the table does not carry
    /// the signature matching `kind`, or [`AcpiError::ReadFault`] if its
    /// header is unreadable.
    pub fn new(reader: &'a R, root_addr: u64, kind: RootTableKind) -> Result<Self, AcpiError> {
        sdt::expect_signature(reader, root_addr, kind.signature())?;
        let length = u64::from(sdt::read_length(reader, root_addr)?);
        let count = length.saturating_sub(SDT_HEADER_SIZE) / kind.entry_size();
        log::trace!("acpi: {kind} at {root_addr:#x}: length {length}, {count} entries");

        Ok(Self {
            reader,
            entries_addr: root_addr.wrapping_add(SDT_HEADER_SIZE),
            kind,
            index: 0,
            count,
            failed: false,
        })
    }

    /// Returns the total number of entries in the table.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.count
    }
}

impl<R: MemoryReader> Iterator for RootEntries<'_, R> {
    type Item = Result<u64, AcpiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.count {
            return None;
        }

        let entry_addr = self
            .entries_addr
            .wrapping_add(self.index * self.kind.entry_size());
        let entry = match self.kind {
            RootTableKind::Xsdt => reader::read_u64(self.reader, entry_addr),
            RootTableKind::Rsdt => reader::read_u32(self.reader, entry_addr).map(u64::from),
        };
        self.index += 1;
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.failed {
            0
        } else {
            usize::try_from(self.count - self.index).unwrap_or(usize::MAX)
        };
        (0, Some(remaining))
    }
}

/// Search the RSDT/XSDT for the first table whose signature is `signature`.
///
/// Entries are visited in table order and the first match wins. Null
/// entries are skipped without reading anything at address 0.
///
/// # Arguments
///
/// * `reader`: source of the target's memory.
/// * `root_addr`: address of the RSDT or XSDT.
/// * `kind`: which of the two root tables `root_addr` points at.
/// * `signature`: the 4-byte ASCII table signature to search for.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`] if the root table is not an
/// RSDT/XSDT as `kind` says, [`AcpiError::NotFound`] if no entry matches, or
/// [`AcpiError::ReadFault`] if an entry or a candidate signature is
/// unreadable.
pub fn find_table(
    reader: &impl MemoryReader,
    root_addr: u64,
    kind: RootTableKind,
    signature: &[u8; 4],
) -> Result<u64, AcpiError> {
    let mut matches = find_all_tables(reader, root_addr, kind, signature)?;
    match matches.next() {
        Some(found) => {
            let addr = found?;
            log::debug!("acpi: found {} at {addr:#x}", Signature(signature));
            Ok(addr)
        }
        None => Err(AcpiError::NotFound {
            signature: *signature,
        }),
    }
}

/// Search the RSDT/XSDT for all tables whose signature is `signature`.
///
/// Returns a [`MatchingTableIter`] that yields the address of every matching
/// table in entry order. This is useful for tables that may appear several
/// times, such as SSDTs.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`] or [`AcpiError::ReadFault`] if the
/// root table itself is bad. Errors met while scanning are yielded by the
/// iterator.
pub fn find_all_tables<'a, R: MemoryReader>(
    reader: &'a R,
    root_addr: u64,
    kind: RootTableKind,
    signature: &'a [u8; 4],
) -> Result<MatchingTableIter<'a, R>, AcpiError> {
    Ok(MatchingTableIter {
        reader,
        entries: RootEntries::new(reader, root_addr, kind)?,
        signature,
        failed: false,
    })
}

/// Iterator that yields the addresses of all tables matching a signature in
/// the RSDT/XSDT.
pub struct MatchingTableIter<'a, R: MemoryReader> {
    reader: &'a R,
    entries: RootEntries<'a, R>,
    signature: &'a [u8; 4],
    failed: bool,
}

/// Classify one root table entry: `Some(addr)` if it points at a table with
/// the wanted signature.
fn check_entry(
    reader: &impl MemoryReader,
    signature: &[u8; 4],
    entry: Result<u64, AcpiError>,
) -> Result<Option<u64>, AcpiError> {
    let table = entry?;
    if table == 0 {
        log::trace!("acpi: skipping null root table entry");
        return Ok(None);
    }
    let found = sdt::read_signature(reader, table)?;
    log::trace!("acpi: entry {table:#x} is {}", Signature(&found));
    Ok((&found == signature).then_some(table))
}

impl<R: MemoryReader> Iterator for MatchingTableIter<'_, R> {
    type Item = Result<u64, AcpiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        for entry in self.entries.by_ref() {
            match check_entry(self.reader, self.signature, entry) {
                Ok(Some(table)) => return Some(Ok(table)),
                Ok(None) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::reader::SliceMemory;
    use crate::testutil::{ImageBuilder, plain_table};
    use std::vec::Vec;

    const BASE: u64 = 0x7FE0_0000;

    #[test]
    fn first_match_wins() {
        let mut image = ImageBuilder::new(BASE);
        let a = image.table(&plain_table(b"FOOX", &[]));
        let b = image.table(&plain_table(b"SRAT", &[0; 8]));
        let c = image.table(&plain_table(b"SRAT", &[0; 8]));

        let xsdt = image.xsdt(&[a, b, c]);
        let rsdt = image.rsdt(&[a, b, c]);
        let image = image.finish();
        let mem = image.memory();

        assert_eq!(find_table(&mem, xsdt, RootTableKind::Xsdt, b"SRAT"), Ok(b));
        assert_eq!(find_table(&mem, rsdt, RootTableKind::Rsdt, b"SRAT"), Ok(b));
        assert_eq!(find_table(&mem, rsdt, RootTableKind::Rsdt, b"FOOX"), Ok(a));
    }

    #[test]
    fn all_matches_in_entry_order() {
        let mut image = ImageBuilder::new(BASE);
        let ssdt1 = image.table(&plain_table(b"SSDT", &[]));
        let dsdt = image.table(&plain_table(b"APIC", &[]));
        let ssdt2 = image.table(&plain_table(b"SSDT", &[]));
        let xsdt = image.xsdt(&[ssdt2, dsdt, ssdt1]);
        let image = image.finish();
        let mem = image.memory();

        let found: Vec<_> = find_all_tables(&mem, xsdt, RootTableKind::Xsdt, b"SSDT")
            .unwrap()
            .collect();
        assert_eq!(found, [Ok(ssdt2), Ok(ssdt1)]);
    }

    #[test]
    fn null_entries_are_skipped() {
        // Address 0 is outside the image: reading it would fault.
        let mut image = ImageBuilder::new(BASE);
        let srat = image.table(&plain_table(b"SRAT", &[0; 8]));
        let xsdt = image.xsdt(&[0, 0, srat]);
        let image = image.finish();
        let mem = image.memory();

        assert_eq!(find_table(&mem, xsdt, RootTableKind::Xsdt, b"SRAT"), Ok(srat));
    }

    #[test]
    fn not_found_after_full_scan() {
        let mut image = ImageBuilder::new(BASE);
        let apic = image.table(&plain_table(b"APIC", &[]));
        let rsdt = image.rsdt(&[apic, 0]);
        let image = image.finish();
        let mem = image.memory();

        assert_eq!(
            find_table(&mem, rsdt, RootTableKind::Rsdt, b"SRAT"),
            Err(AcpiError::NotFound { signature: *b"SRAT" })
        );
    }

    #[test]
    fn root_signature_must_match_kind() {
        let mut image = ImageBuilder::new(BASE);
        let rsdt = image.rsdt(&[]);
        let image = image.finish();
        let mem = image.memory();

        assert_eq!(
            find_table(&mem, rsdt, RootTableKind::Xsdt, b"SRAT"),
            Err(AcpiError::InvalidSignature { addr: rsdt })
        );
    }

    #[test]
    fn every_single_byte_root_signature_mutation_is_rejected() {
        let mut image = ImageBuilder::new(BASE);
        let srat = image.table(&plain_table(b"SRAT", &[]));
        let xsdt = image.xsdt(&[srat]);
        let pristine = image.finish();
        let offset = usize::try_from(xsdt - BASE).unwrap();

        for index in 0..4 {
            for flip in [0x01u8, 0x40, 0x80] {
                let mut data = pristine.memory_bytes().to_vec();
                data[offset + index] ^= flip;
                let mem = SliceMemory::new(BASE, &data);
                assert_eq!(
                    find_table(&mem, xsdt, RootTableKind::Xsdt, b"SRAT"),
                    Err(AcpiError::InvalidSignature { addr: xsdt })
                );
            }
        }
    }

    #[test]
    fn entry_count_truncates_partial_entry() {
        let mut image = ImageBuilder::new(BASE);
        let srat = image.table(&plain_table(b"SRAT", &[]));
        // One full XSDT entry plus 4 stray bytes.
        let mut body = srat.to_le_bytes().to_vec();
        body.extend_from_slice(&[0xFF; 4]);
        let xsdt = image.table(&plain_table(b"XSDT", &body));
        let image = image.finish();
        let mem = image.memory();

        let entries = RootEntries::new(&mem, xsdt, RootTableKind::Xsdt).unwrap();
        assert_eq!(entries.entry_count(), 1);
        let collected: Vec<_> = entries.collect();
        assert_eq!(collected, [Ok(srat)]);
    }

    #[test]
    fn short_root_table_has_no_entries() {
        let mut table = plain_table(b"RSDT", &[]);
        table[4..8].copy_from_slice(&20u32.to_le_bytes());
        let mut image = ImageBuilder::new(BASE);
        let rsdt = image.table(&table);
        let image = image.finish();
        let mem = image.memory();

        let entries = RootEntries::new(&mem, rsdt, RootTableKind::Rsdt).unwrap();
        assert_eq!(entries.entry_count(), 0);
        assert_eq!(
            find_table(&mem, rsdt, RootTableKind::Rsdt, b"SRAT"),
            Err(AcpiError::NotFound { signature: *b"SRAT" })
        );
    }

    #[test]
    fn unreadable_candidate_faults() {
        let mut image = ImageBuilder::new(BASE);
        let xsdt = image.xsdt(&[0xDEAD_0000]);
        let image = image.finish();
        let mem = image.memory();

        assert_eq!(
            find_table(&mem, xsdt, RootTableKind::Xsdt, b"SRAT"),
            Err(AcpiError::ReadFault {
                addr: 0xDEAD_0000,
                size: 4
            })
        );
    }

    #[test]
    fn truncated_entry_array_faults_once() {
        let mut table = plain_table(b"XSDT", &[]);
        // Claims two entries the image does not hold.
        table[4..8].copy_from_slice(&52u32.to_le_bytes());
        let mut image = ImageBuilder::new(BASE);
        let xsdt = image.table(&table);
        let image = image.finish();
        let mem = image.memory();

        let mut entries = RootEntries::new(&mem, xsdt, RootTableKind::Xsdt).unwrap();
        assert_eq!(
            entries.next(),
            Some(Err(AcpiError::ReadFault {
                addr: xsdt + 36,
                size: 8
            }))
        );
        assert_eq!(entries.next(), None);
    }
}
