//! Memory readers backed by a live process or a memory image file.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use hadron_srat::{MemoryReader, ReadFault, SliceMemory};

use crate::cli::Cli;

/// The address space tables are read from.
pub enum Source {
    /// A running process.
    Process(ProcessMemory),
    /// A raw image loaded into memory.
    Image(ImageFile),
}

impl Source {
    /// Open the source selected by `--pid` or `--image`/`--base`.
    pub fn open(cli: &Cli) -> Result<Self> {
        match (cli.pid, &cli.image, cli.base) {
            (Some(pid), _, _) => Ok(Self::Process(ProcessMemory::open(pid)?)),
            (None, Some(path), Some(base)) => Ok(Self::Image(ImageFile::load(path, base)?)),
            _ => bail!("no memory source: pass --pid <PID> or --image <FILE> --base <ADDR>"),
        }
    }
}

impl MemoryReader for Source {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        match self {
            Self::Process(process) => process.read(addr, buf),
            Self::Image(image) => image.memory().read(addr, buf),
        }
    }
}

/// Positional reads from `/proc/<pid>/mem`.
///
/// Pages that are not mapped in the target fail with `EIO`, which surfaces
/// as a [`ReadFault`].
pub struct ProcessMemory {
    pid: u32,
    file: File,
}

impl ProcessMemory {
    /// Open the memory of process `pid` for reading.
    pub fn open(pid: u32) -> Result<Self> {
        let path = format!("/proc/{pid}/mem");
        let file = File::open(&path).with_context(|| format!("failed to open {path}"))?;
        log::debug!("mem: reading process {pid}");
        Ok(Self { pid, file })
    }
}

impl MemoryReader for ProcessMemory {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<(), ReadFault> {
        self.file.read_exact_at(buf, addr).map_err(|err| {
            log::trace!(
                "mem: pid {} read of {} byte(s) at {addr:#x} failed: {err}",
                self.pid,
                buf.len()
            );
            ReadFault {
                addr,
                size: buf.len(),
            }
        })
    }
}

/// A memory image file mapped at a fixed base address.
pub struct ImageFile {
    base: u64,
    data: Vec<u8>,
}

impl ImageFile {
    /// Load the whole image at `path`, placing its first byte at `base`.
    pub fn load(path: &Path, base: u64) -> Result<Self> {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        log::debug!(
            "mem: {} byte(s) from {} mapped at {base:#x}",
            data.len(),
            path.display()
        );
        Ok(Self { base, data })
    }

    /// Returns a reader over the image.
    pub fn memory(&self) -> SliceMemory<'_> {
        SliceMemory::new(self.base, &self.data)
    }
}
