//! ACPI SRAT dumper.
//!
//! Walks the ACPI tables of a live process (through `/proc/<pid>/mem`) or of
//! a raw memory image, starting from a known RSDP address, and prints the
//! root table, tables located by signature, the SRAT affinity records or the
//! SLIT distance matrix.

mod cli;
mod config;
mod memory;
mod report;
mod verbose;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use hadron_srat::{AcpiError, AcpiTables, MemoryReader, RootEntries, Signature, rsdp, sdt};

use crate::cli::Command;
use crate::config::DumpConfig;
use crate::memory::Source;
use crate::report::{EntryReport, FindReport, RootReport, SlitReport, SratReport, TableReport};

/// Exit status for a table that is simply not present.
const EXIT_ABSENT: u8 = 2;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(AcpiError::NotFound { signature }) = err.downcast_ref::<AcpiError>() {
                if !verbose::is_quiet() {
                    eprintln!("{} table absent", Signature(signature));
                }
                return ExitCode::from(EXIT_ABSENT);
            }
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    let mut config = DumpConfig::load(cli.config.as_deref())?;
    config.apply_overrides(cli);
    let source = Source::open(cli)?;

    match cli.command {
        Command::Root { rsdp } => cmd_root(&source, rsdp, &config),
        Command::Find { rsdp, signature } => cmd_find(&source, rsdp, &signature, &config),
        Command::Srat { rsdp } => cmd_srat(&source, rsdp, &config),
        Command::Slit { rsdp } => cmd_slit(&source, rsdp, &config),
    }
}

// ===========================================================================
// Table access
// ===========================================================================

/// Resolve the root table, validating checksums if configured.
fn open_tables<'a>(
    source: &'a Source,
    rsdp_addr: u64,
    config: &DumpConfig,
) -> Result<AcpiTables<&'a Source>> {
    let tables = AcpiTables::new(rsdp_addr, source)
        .with_context(|| format!("resolving the RSDP at {rsdp_addr:#x}"))?;
    if config.verify_checksums {
        let revision = rsdp::validate_rsdp(source, rsdp_addr)?;
        rsdp::validate_rsdp_checksum(source, rsdp_addr, revision)
            .context("RSDP checksum")?;
        verify_table(source, tables.root_addr())?;
    }
    Ok(tables)
}

fn verify_table(reader: &impl MemoryReader, addr: u64) -> Result<()> {
    sdt::validate_checksum(reader, addr).with_context(|| format!("table at {addr:#x}"))
}

// ===========================================================================
// Commands
// ===========================================================================

/// List the root table entries and the signature each one points at.
fn cmd_root(source: &Source, rsdp_addr: u64, config: &DumpConfig) -> Result<()> {
    let tables = open_tables(source, rsdp_addr, config)?;
    let revision = rsdp::validate_rsdp(source, rsdp_addr)?;
    let mut report = RootReport::new(rsdp_addr, revision, tables.kind(), tables.root_addr());

    let entries = RootEntries::new(source, tables.root_addr(), tables.kind())?;
    for (index, entry) in entries.enumerate() {
        let addr = entry.context("reading root table entries")?;
        let signature = if addr == 0 {
            None
        } else {
            match sdt::read_signature(source, addr) {
                Ok(signature) => Some(Signature(&signature).to_string()),
                Err(err) => {
                    log::warn!("root entry {index}: {err}");
                    None
                }
            }
        };
        report.entries.push(EntryReport {
            index,
            addr,
            signature,
        });
    }
    report::emit(&report, config.format)
}

/// List every table carrying `signature`.
fn cmd_find(
    source: &Source,
    rsdp_addr: u64,
    signature: &[u8; 4],
    config: &DumpConfig,
) -> Result<()> {
    let tables = open_tables(source, rsdp_addr, config)?;
    let mut report = FindReport {
        signature: Signature(signature).to_string(),
        tables: Vec::new(),
    };
    for addr in tables.find_all_tables(signature)? {
        let addr = addr?;
        let header = sdt::table_header(source, addr, signature)?;
        if config.verify_checksums {
            verify_table(source, addr)?;
        }
        report.tables.push(TableReport {
            addr,
            length: header.length,
            revision: header.revision,
        });
    }
    if report.tables.is_empty() {
        return Err(AcpiError::NotFound {
            signature: *signature,
        }
        .into());
    }
    report::emit(&report, config.format)
}

/// Decode every SRAT affinity record.
fn cmd_srat(source: &Source, rsdp_addr: u64, config: &DumpConfig) -> Result<()> {
    let tables = open_tables(source, rsdp_addr, config)?;
    let srat = tables
        .srat_with_limit(config.max_table_length)?
        .with_records_offset(config.records_offset);
    if config.verify_checksums {
        verify_table(source, srat.addr())?;
    }

    let mut report = SratReport {
        addr: srat.addr(),
        length: srat.length(),
        records: Vec::new(),
    };
    for record in srat.records() {
        let record = record.with_context(|| format!("decoding the SRAT at {:#x}", srat.addr()))?;
        report.records.push(record.into());
    }
    report::emit(&report, config.format)
}

/// Print the SLIT distance matrix.
fn cmd_slit(source: &Source, rsdp_addr: u64, config: &DumpConfig) -> Result<()> {
    let tables = open_tables(source, rsdp_addr, config)?;
    let slit = tables.slit_with_limit(config.max_table_length)?;
    if config.verify_checksums {
        verify_table(source, slit.addr())?;
    }

    let mut report = SlitReport {
        addr: slit.addr(),
        localities: slit.num_localities(),
        matrix: Vec::new(),
    };
    for from in 0..slit.num_localities() {
        let mut row = Vec::new();
        for to in 0..slit.num_localities() {
            // Both indices are in range, so a distance is always present.
            if let Some(distance) = slit.distance(from, to)? {
                row.push(distance);
            }
        }
        report.matrix.push(row);
    }
    report::emit(&report, config.format)
}
