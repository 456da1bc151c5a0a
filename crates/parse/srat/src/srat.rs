//! System Resource Affinity Table (SRAT) parsing.
//!
//! The SRAT describes NUMA topology by mapping processors and memory regions
//! to proximity domains (NUMA nodes). After the fixed part of the table comes
//! a packed sequence of variable-length affinity records, each starting with
//! a one-byte type and a one-byte length.

use core::iter::FusedIterator;

use crate::reader::{self, MemoryReader};
use crate::sdt;
use crate::AcpiError;

/// SRAT table signature.
pub const SRAT_SIGNATURE: &[u8; 4] = b"SRAT";

/// Offset of the first affinity record: the 36-byte SDT header followed by
/// an 8-byte reserved region.
pub const SRAT_RECORDS_OFFSET: u32 = 44;

/// Offset of the first affinity record when the fixed part is laid out as
/// in the ACPI specification (4-byte table revision plus 8 reserved bytes).
pub const ACPI_SRAT_RECORDS_OFFSET: u32 = 48;

/// Record type 0: Processor Local APIC/SAPIC Affinity.
const TYPE_PROCESSOR_LOCAL_APIC: u8 = 0;
/// Record type 1: Memory Affinity.
const TYPE_MEMORY_AFFINITY: u8 = 1;
/// Record type 2: Processor Local x2APIC Affinity.
const TYPE_PROCESSOR_LOCAL_X2APIC: u8 = 2;

/// A single decoded SRAT affinity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffinityRecord {
    /// Type 0: Processor Local APIC/SAPIC Affinity.
    ProcessorLocalApic {
        /// Proximity domain (`u32` at record offset 4).
        proximity_domain: u32,
    },
    /// Type 1: Memory Affinity.
    MemoryAffinity {
        /// Base address of the memory range (`u64` at record offset 8).
        base_address: u64,
        /// Length of the memory range in bytes (`u64` at record offset 16).
        length: u64,
    },
    /// Type 2: Processor Local x2APIC Affinity.
    ProcessorLocalX2Apic {
        /// Proximity domain (`u32` at record offset 8).
        proximity_domain: u32,
    },
    /// A record type this crate does not decode. Preserved, not dropped.
    Unknown {
        /// The record type byte.
        record_type: u8,
        /// The record length including the 2-byte header.
        record_length: u8,
    },
}

impl AffinityRecord {
    /// Returns the on-disk type byte this record was decoded from.
    #[must_use]
    pub fn record_type(&self) -> u8 {
        match self {
            Self::ProcessorLocalApic { .. } => TYPE_PROCESSOR_LOCAL_APIC,
            Self::MemoryAffinity { .. } => TYPE_MEMORY_AFFINITY,
            Self::ProcessorLocalX2Apic { .. } => TYPE_PROCESSOR_LOCAL_X2APIC,
            Self::Unknown { record_type, .. } => *record_type,
        }
    }

    /// Returns the proximity domain of a processor record.
    #[must_use]
    pub fn proximity_domain(&self) -> Option<u32> {
        match self {
            Self::ProcessorLocalApic { proximity_domain }
            | Self::ProcessorLocalX2Apic { proximity_domain } => Some(*proximity_domain),
            _ => None,
        }
    }
}

/// A memory range taken from an enabled [`AffinityRecord::MemoryAffinity`]
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    /// Proximity domain owning the range (`u32` at record offset 2).
    pub proximity_domain: u32,
    /// First byte of the range.
    pub base_address: u64,
    /// Length of the range in bytes.
    pub length: u64,
}

/// A processor and the proximity domain it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorAffinity {
    /// Local APIC ID (type 0, `u8` at record offset 3) or x2APIC ID
    /// (type 2, `u32` at record offset 4).
    pub processor_id: u32,
    /// Proximity domain of the processor.
    pub proximity_domain: u32,
}

/// Memory affinity field offsets read only by [`Srat::memory_ranges`].
const MEMORY_DOMAIN_OFFSET: u32 = 2;
const MEMORY_FLAGS_OFFSET: u32 = 28;
/// Bit 0 of the memory affinity flags: the entry is in use.
const MEMORY_FLAG_ENABLED: u32 = 1 << 0;

/// Processor ID offsets read only by [`Srat::processor_domains`].
const APIC_ID_OFFSET: u32 = 3;
const X2APIC_ID_OFFSET: u32 = 4;

/// Decode the record at `offset` bytes into the SRAT at `table_addr`, whose
/// declared length is `table_length`.
///
/// Returns the record together with its on-disk length, which is how far
/// the next record lies from this one. Unknown record types are returned as
/// [`AffinityRecord::Unknown`].
///
/// Every byte read lies below `table_length`: the 2-byte header, and the
/// fields of known record types (8 bytes for type 0, 24 for type 1, 12 for
/// type 2).
///
/// # Errors
///
/// Returns [`AcpiError::MalformedRecord`] if the record reports a zero
/// length or a field it needs extends past `table_length`, or
/// [`AcpiError::ReadFault`] if a byte inside the table is unreadable.
pub fn decode_record(
    reader: &impl MemoryReader,
    table_addr: u64,
    table_length: u32,
    offset: u32,
) -> Result<(AffinityRecord, u8), AcpiError> {
    let within = |end: u32| {
        if u64::from(offset) + u64::from(end) > u64::from(table_length) {
            Err(AcpiError::MalformedRecord { offset })
        } else {
            Ok(())
        }
    };
    let record = table_addr.wrapping_add(u64::from(offset));
    let field = |at: u64| record.wrapping_add(at);

    within(2)?;
    let record_type = reader::read_u8(reader, record)?;
    let record_length = reader::read_u8(reader, field(1))?;
    if record_length == 0 {
        return Err(AcpiError::MalformedRecord { offset });
    }

    let decoded = match record_type {
        TYPE_PROCESSOR_LOCAL_APIC => {
            within(8)?;
            AffinityRecord::ProcessorLocalApic {
                proximity_domain: reader::read_u32(reader, field(4))?,
            }
        }
        TYPE_MEMORY_AFFINITY => {
            within(24)?;
            AffinityRecord::MemoryAffinity {
                base_address: reader::read_u64(reader, field(8))?,
                length: reader::read_u64(reader, field(16))?,
            }
        }
        TYPE_PROCESSOR_LOCAL_X2APIC => {
            within(12)?;
            AffinityRecord::ProcessorLocalX2Apic {
                proximity_domain: reader::read_u32(reader, field(8))?,
            }
        }
        _ => AffinityRecord::Unknown {
            record_type,
            record_length,
        },
    };
    Ok((decoded, record_length))
}

/// An SRAT located in the target's memory.
///
/// Nothing beyond the header is read until [`Srat::records`] is iterated.
pub struct Srat<R: MemoryReader> {
    reader: R,
    /// Address of the table.
    addr: u64,
    /// Declared length of the table, header included.
    length: u32,
    /// Offset of the first affinity record.
    records_offset: u32,
}

impl<R: MemoryReader> Srat<R> {
    /// Open the SRAT at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::InvalidSignature`] if the table signature is not
    /// `SRAT`, or [`AcpiError::ReadFault`] if the header is unreadable.
    pub fn parse(reader: R, addr: u64) -> Result<Self, AcpiError> {
        let header = sdt::table_header(&reader, addr, SRAT_SIGNATURE)?;
        log::debug!(
            "acpi: SRAT at {addr:#x}, length {}, revision {}",
            header.length,
            header.revision
        );
        Ok(Self {
            reader,
            addr,
            length: header.length,
            records_offset: SRAT_RECORDS_OFFSET,
        })
    }

    /// Open the SRAT at `addr`, refusing tables that declare more than
    /// `max_length` bytes.
    ///
    /// # Errors
    ///
    /// As [`Srat::parse`], plus [`AcpiError::TableTooLarge`].
    pub fn parse_with_limit(reader: R, addr: u64, max_length: u32) -> Result<Self, AcpiError> {
        let srat = Self::parse(reader, addr)?;
        if srat.length > max_length {
            return Err(AcpiError::TableTooLarge {
                addr,
                length: srat.length,
            });
        }
        Ok(srat)
    }

    /// Start record iteration at `offset` instead of [`SRAT_RECORDS_OFFSET`].
    #[must_use]
    pub fn with_records_offset(mut self, offset: u32) -> Self {
        self.records_offset = offset;
        self
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

    /// Returns an iterator over the affinity records.
    #[must_use]
    pub fn records(&self) -> SratRecordIter<&R> {
        SratRecordIter::new(&self.reader, self.addr, self.length, self.records_offset)
    }

    /// Consumes the table and returns an iterator over its affinity records.
    #[must_use]
    pub fn into_records(self) -> SratRecordIter<R> {
        SratRecordIter::new(self.reader, self.addr, self.length, self.records_offset)
    }

    /// Returns the memory ranges of enabled memory affinity records, each
    /// with the proximity domain that owns it.
    ///
    /// The domain (offset 2) and flags (offset 28) are read on demand and
    /// must lie inside both the record and the table. Disabled entries and
    /// other record kinds are skipped; errors are still yielded.
    pub fn memory_ranges(&self) -> impl Iterator<Item = Result<MemoryRange, AcpiError>> + '_ {
        self.located_records().filter_map(move |located| {
            let located = match located {
                Ok(located) => located,
                Err(err) => return Some(Err(err)),
            };
            let AffinityRecord::MemoryAffinity {
                base_address,
                length,
            } = located.record
            else {
                return None;
            };
            self.memory_range(&located, base_address, length).transpose()
        })
    }

    /// Returns the processor ID and proximity domain of every processor
    /// affinity record, in table order.
    ///
    /// The APIC ID (type 0, `u8` at offset 3) and x2APIC ID (type 2, `u32`
    /// at offset 4) are read on demand and must lie inside both the record
    /// and the table. Other record kinds are skipped; errors are still
    /// yielded.
    pub fn processor_domains(
        &self,
    ) -> impl Iterator<Item = Result<ProcessorAffinity, AcpiError>> + '_ {
        self.located_records().filter_map(move |located| {
            let located = match located {
                Ok(located) => located,
                Err(err) => return Some(Err(err)),
            };
            let processor_id = match located.record {
                AffinityRecord::ProcessorLocalApic { .. } => self
                    .record_field(&located, APIC_ID_OFFSET, 1)
                    .and_then(|addr| reader::read_u8(&self.reader, addr))
                    .map(u32::from),
                AffinityRecord::ProcessorLocalX2Apic { .. } => self
                    .record_field(&located, X2APIC_ID_OFFSET, 4)
                    .and_then(|addr| reader::read_u32(&self.reader, addr)),
                _ => return None,
            };
            let proximity_domain = located.record.proximity_domain()?;
            Some(processor_id.map(|processor_id| ProcessorAffinity {
                processor_id,
                proximity_domain,
            }))
        })
    }

    fn memory_range(
        &self,
        located: &Located,
        base_address: u64,
        length: u64,
    ) -> Result<Option<MemoryRange>, AcpiError> {
        let flags = reader::read_u32(
            &self.reader,
            self.record_field(located, MEMORY_FLAGS_OFFSET, 4)?,
        )?;
        if flags & MEMORY_FLAG_ENABLED == 0 {
            log::trace!("acpi: SRAT +{:#x}: memory range disabled", located.offset);
            return Ok(None);
        }
        let proximity_domain = reader::read_u32(
            &self.reader,
            self.record_field(located, MEMORY_DOMAIN_OFFSET, 4)?,
        )?;
        Ok(Some(MemoryRange {
            proximity_domain,
            base_address,
            length,
        }))
    }

    /// Records paired with their offset and on-disk length.
    fn located_records(&self) -> impl Iterator<Item = Result<Located, AcpiError>> + '_ {
        let mut records = self.records();
        core::iter::from_fn(move || records.next_located())
    }

    /// Address of the `size`-byte field at `at` within a located record.
    fn record_field(&self, located: &Located, at: u32, size: u32) -> Result<u64, AcpiError> {
        let end = u64::from(at) + u64::from(size);
        if end > u64::from(located.length)
            || u64::from(located.offset) + end > u64::from(self.length)
        {
            return Err(AcpiError::MalformedRecord {
                offset: located.offset,
            });
        }
        Ok(self
            .addr
            .wrapping_add(u64::from(located.offset))
            .wrapping_add(u64::from(at)))
    }
}

/// A decoded record and where it sits in its table.
#[derive(Clone, Copy)]
struct Located {
    offset: u32,
    length: u8,
    record: AffinityRecord,
}

/// Locate the records of the SRAT at `addr`.
///
/// Equivalent to `Srat::parse(reader, addr)?.into_records()`.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`] if the table signature is not
/// `SRAT`, or [`AcpiError::ReadFault`] if the header is unreadable.
pub fn decode_srat<R: MemoryReader>(reader: R, addr: u64) -> Result<SratRecordIter<R>, AcpiError> {
    Ok(Srat::parse(reader, addr)?.into_records())
}

/// Lazy iterator over SRAT affinity records.
///
/// Each step decodes one record and advances by its on-disk length. The
/// sequence ends once the running offset reaches the table length, and no
/// record field is read past that length. The first error is yielded once,
/// after which the iterator is exhausted: a zero-length record cannot be
/// stepped over, and a failed read leaves the position of the next record
/// unknown.
pub struct SratRecordIter<R: MemoryReader> {
    reader: R,
    table_addr: u64,
    table_length: u32,
    offset: u32,
    done: bool,
}

impl<R: MemoryReader> SratRecordIter<R> {
    fn new(reader: R, table_addr: u64, table_length: u32, offset: u32) -> Self {
        Self {
            reader,
            table_addr,
            table_length,
            offset,
            done: false,
        }
    }

    /// Returns the offset of the next record from the start of the table.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn next_located(&mut self) -> Option<Result<Located, AcpiError>> {
        if self.done || self.offset >= self.table_length {
            self.done = true;
            return None;
        }

        let offset = self.offset;
        match decode_record(&self.reader, self.table_addr, self.table_length, offset) {
            Ok((record, length)) => {
                log::trace!("acpi: SRAT +{offset:#x}: {record:?}");
                // Saturation also ends iteration: `table_length` is a u32.
                self.offset = offset.saturating_add(u32::from(length));
                Some(Ok(Located {
                    offset,
                    length,
                    record,
                }))
            }
            Err(err) => {
                log::debug!("acpi: SRAT decoding stopped at +{offset:#x}: {err}");
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: MemoryReader> Iterator for SratRecordIter<R> {
    type Item = Result<AffinityRecord, AcpiError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_located()
            .map(|located| located.map(|located| located.record))
    }
}

impl<R: MemoryReader> FusedIterator for SratRecordIter<R> {}
