//! Report structures shared by the text and JSON outputs.

use std::fmt;

use anyhow::Result;
use hadron_srat::{AffinityRecord, RootTableKind};
use serde::Serialize;

use crate::config::OutputFormat;

/// Write `report` to stdout in the configured format.
pub fn emit<T: Serialize + fmt::Display>(report: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

/// Result of the `root` subcommand.
#[derive(Debug, Serialize)]
pub struct RootReport {
    pub rsdp: u64,
    pub revision: u8,
    pub kind: String,
    pub root_addr: u64,
    pub entries: Vec<EntryReport>,
}

/// One root table entry.
#[derive(Debug, Serialize)]
pub struct EntryReport {
    pub index: usize,
    pub addr: u64,
    /// `None` for a null entry or an unreadable table.
    pub signature: Option<String>,
}

impl RootReport {
    pub fn new(rsdp: u64, revision: u8, kind: RootTableKind, root_addr: u64) -> Self {
        Self {
            rsdp,
            revision,
            kind: kind.to_string(),
            root_addr,
            entries: Vec::new(),
        }
    }
}

impl fmt::Display for RootReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "RSDP at {:#x} (revision {}): {} at {:#x}, {} entries",
            self.rsdp,
            self.revision,
            self.kind,
            self.root_addr,
            self.entries.len()
        )?;
        for entry in &self.entries {
            let signature = entry.signature.as_deref().unwrap_or("-");
            writeln!(f, "  [{:>3}] {:#018x} {signature}", entry.index, entry.addr)?;
        }
        Ok(())
    }
}

/// Result of the `find` subcommand.
#[derive(Debug, Serialize)]
pub struct FindReport {
    pub signature: String,
    pub tables: Vec<TableReport>,
}

/// A table located by signature.
#[derive(Debug, Serialize)]
pub struct TableReport {
    pub addr: u64,
    pub length: u32,
    pub revision: u8,
}

impl fmt::Display for FindReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            writeln!(
                f,
                "{} at {:#x}: {} bytes, revision {}",
                self.signature, table.addr, table.length, table.revision
            )?;
        }
        Ok(())
    }
}

/// Result of the `srat` subcommand.
#[derive(Debug, Serialize)]
pub struct SratReport {
    pub addr: u64,
    pub length: u32,
    pub records: Vec<RecordReport>,
}

/// A decoded affinity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordReport {
    ProcessorLocalApic { proximity_domain: u32 },
    MemoryAffinity { base_address: u64, length: u64 },
    ProcessorLocalX2Apic { proximity_domain: u32 },
    Unknown { record_type: u8, record_length: u8 },
}

impl From<AffinityRecord> for RecordReport {
    fn from(record: AffinityRecord) -> Self {
        match record {
            AffinityRecord::ProcessorLocalApic { proximity_domain } => {
                Self::ProcessorLocalApic { proximity_domain }
            }
            AffinityRecord::MemoryAffinity {
                base_address,
                length,
            } => Self::MemoryAffinity {
                base_address,
                length,
            },
            AffinityRecord::ProcessorLocalX2Apic { proximity_domain } => {
                Self::ProcessorLocalX2Apic { proximity_domain }
            }
            AffinityRecord::Unknown {
                record_type,
                record_length,
            } => Self::Unknown {
                record_type,
                record_length,
            },
        }
    }
}

impl fmt::Display for RecordReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ProcessorLocalApic { proximity_domain } => {
                write!(f, "apic    domain {proximity_domain}")
            }
            Self::ProcessorLocalX2Apic { proximity_domain } => {
                write!(f, "x2apic  domain {proximity_domain}")
            }
            Self::MemoryAffinity {
                base_address,
                length,
            } => write!(f, "memory  {base_address:#018x} +{length:#x}"),
            Self::Unknown {
                record_type,
                record_length,
            } => write!(f, "unknown type {record_type}, {record_length} bytes"),
        }
    }
}

impl fmt::Display for SratReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SRAT at {:#x}: {} bytes, {} records",
            self.addr,
            self.length,
            self.records.len()
        )?;
        for record in &self.records {
            writeln!(f, "  {record}")?;
        }
        Ok(())
    }
}

/// Result of the `slit` subcommand.
#[derive(Debug, Serialize)]
pub struct SlitReport {
    pub addr: u64,
    pub localities: u64,
    /// Row `i` holds the distances from locality `i`.
    pub matrix: Vec<Vec<u8>>,
}

impl fmt::Display for SlitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SLIT at {:#x}: {} localities", self.addr, self.localities)?;
        for (from, row) in self.matrix.iter().enumerate() {
            write!(f, "  {from:>3}:")?;
            for distance in row {
                write!(f, " {distance:>3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
