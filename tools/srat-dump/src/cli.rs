//! Command-line interface definitions for srat-dump.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::OutputFormat;

/// Locate and decode the ACPI SRAT of a live process or memory image.
#[derive(Parser)]
#[command(name = "srat-dump", version, about)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Read the address space of a running process through /proc/<PID>/mem.
    #[arg(long, global = true, conflicts_with = "image")]
    pub pid: Option<u32>,

    /// Read from a raw memory image file instead of a process.
    #[arg(long, global = true, requires = "base")]
    pub image: Option<PathBuf>,

    /// Address the first byte of `--image` is mapped at.
    #[arg(long, global = true, value_parser = parse_address)]
    pub base: Option<u64>,

    /// Configuration file (default: ./srat-dump.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Refuse tables that declare more than this many bytes.
    #[arg(long, global = true, value_parser = parse_u32)]
    pub max_table_length: Option<u32>,

    /// Offset of the first SRAT record from the start of the table.
    #[arg(long, global = true, value_parser = parse_u32)]
    pub records_offset: Option<u32>,

    /// Validate RSDP and table checksums before decoding.
    #[arg(long, global = true)]
    pub verify_checksums: bool,

    /// Only report errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log every table and record touched to stderr.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Resolve the root table and list its entries.
    Root {
        /// Address of the RSDP.
        #[arg(value_parser = parse_address)]
        rsdp: u64,
    },
    /// List every table with the given signature.
    Find {
        /// Address of the RSDP.
        #[arg(value_parser = parse_address)]
        rsdp: u64,
        /// Four-character table signature, e.g. APIC.
        #[arg(value_parser = parse_signature)]
        signature: [u8; 4],
    },
    /// Decode the affinity records of the SRAT.
    Srat {
        /// Address of the RSDP.
        #[arg(value_parser = parse_address)]
        rsdp: u64,
    },
    /// Print the SLIT locality distance matrix.
    Slit {
        /// Address of the RSDP.
        #[arg(value_parser = parse_address)]
        rsdp: u64,
    },
}

/// Parse an address given in `0x` hex or decimal, with optional `_`
/// separators.
pub fn parse_address(s: &str) -> Result<u64, String> {
    let cleaned = s.trim().replace('_', "");
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|err| format!("invalid address '{s}': {err}"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_address(s)?;
    u32::try_from(value).map_err(|_| format!("'{s}' does not fit in 32 bits"))
}

/// Parse a four-character ASCII table signature.
pub fn parse_signature(s: &str) -> Result<[u8; 4], String> {
    let bytes: [u8; 4] = s
        .as_bytes()
        .try_into()
        .map_err(|_| format!("signature '{s}' is not 4 bytes long"))?;
    if !bytes.iter().all(u8::is_ascii_graphic) {
        return Err(format!("signature '{s}' is not printable ASCII"));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_in_hex_and_decimal() {
        assert_eq!(parse_address("0x7fe1000"), Ok(0x7FE_1000));
        assert_eq!(parse_address("0XFEED_0000"), Ok(0xFEED_0000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0x").is_err());
        assert!(parse_address("rsdp").is_err());
        assert!(parse_address("0x1_0000_0000_0000_0000").is_err());
    }

    #[test]
    fn u32_values_reject_overflow() {
        assert_eq!(parse_u32("0x100000"), Ok(0x10_0000));
        assert!(parse_u32("0x1_0000_0000").is_err());
    }

    #[test]
    fn signatures() {
        assert_eq!(parse_signature("SRAT"), Ok(*b"SRAT"));
        assert!(parse_signature("SRA").is_err());
        assert!(parse_signature("SRATX").is_err());
        assert!(parse_signature("SR T").is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "srat-dump", "srat", "0xE0000", "--image", "mem.bin", "--base", "0", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.base, Some(0));
        assert!(matches!(cli.command, Command::Srat { rsdp: 0xE_0000 }));
    }

    #[test]
    fn image_requires_base() {
        assert!(Cli::try_parse_from(["srat-dump", "--image", "mem.bin", "srat", "0"]).is_err());
    }

    #[test]
    fn pid_conflicts_with_image() {
        assert!(
            Cli::try_parse_from([
                "srat-dump", "--pid", "1", "--image", "m", "--base", "0", "root", "0",
            ])
            .is_err()
        );
    }
}
