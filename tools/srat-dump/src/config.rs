//! Dump settings.
//!
//! Deserialized from `srat-dump.toml` in the working directory (or the file
//! named by `--config`). Command-line flags override file values.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

use crate::cli::Cli;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "srat-dump.toml";

/// Default for [`DumpConfig::max_table_length`]: 1 MiB.
pub const DEFAULT_MAX_TABLE_LENGTH: u32 = 1 << 20;

/// How reports are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One pretty-printed JSON document.
    Json,
}

/// Resolved dump settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpConfig {
    /// Largest table length accepted before any record is decoded.
    pub max_table_length: u32,
    /// Validate RSDP and table checksums.
    pub verify_checksums: bool,
    /// Output format.
    pub format: OutputFormat,
    /// Offset of the first SRAT record (44, or 48 for the ACPI layout).
    pub records_offset: u32,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            max_table_length: DEFAULT_MAX_TABLE_LENGTH,
            verify_checksums: false,
            format: OutputFormat::Text,
            records_offset: hadron_srat::srat::SRAT_RECORDS_OFFSET,
        }
    }
}

impl DumpConfig {
    /// Parse a configuration file's contents.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid srat-dump configuration")
    }

    /// Load the file named by `explicit`, or `srat-dump.toml` from the
    /// working directory if it exists, or fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(CONFIG_FILE_NAME).is_file() => Path::new(CONFIG_FILE_NAME),
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("in {}", path.display()))?;
        log::debug!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(max) = cli.max_table_length {
            self.max_table_length = max;
        }
        if let Some(offset) = cli.records_offset {
            self.records_offset = offset;
        }
        if cli.verify_checksums {
            self.verify_checksums = true;
        }
    }
}
