//! Root System Description Pointer (RSDP) validation and root table
//! resolution.
//!
//! The RSDP is the entry point into the ACPI table hierarchy. ACPI 1.0
//! defines a 20-byte structure holding a 32-bit RSDT address, while ACPI
//! 2.0+ extends it to 36 bytes with a 64-bit XSDT address.

use crate::reader::{self, MemoryReader};
use crate::rsdt::RootTableKind;
use crate::sdt;
use crate::AcpiError;

/// Expected signature bytes (note the trailing space).
pub const RSDP_SIGNATURE: &[u8; 8] = b"RSD PTR ";

/// Size of the ACPI 1.0 RSDP structure in bytes.
pub const RSDP_V1_SIZE: u64 = 20;

/// Size of the ACPI 2.0+ RSDP structure in bytes.
pub const RSDP_V2_SIZE: u64 = 36;

/// Byte offset of the revision field.
const REVISION_OFFSET: u64 = 15;

/// Byte offset of the 32-bit RSDT address.
const RSDT_ADDRESS_OFFSET: u64 = 16;

/// Byte offset of the 64-bit XSDT address (ACPI 2.0+ only).
const XSDT_ADDRESS_OFFSET: u64 = 24;

/// First revision that carries an XSDT address.
const XSDT_MIN_REVISION: u8 = 2;

/// Validate the RSDP signature at `addr` and return its revision byte.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`] if the 8 bytes at `addr` are not
/// `"RSD PTR "`, or [`AcpiError::ReadFault`] if they are unreadable.
pub fn validate_rsdp(reader: &impl MemoryReader, addr: u64) -> Result<u8, AcpiError> {
    let signature: [u8; 8] = reader::read_bytes(reader, addr)?;
    if &signature != RSDP_SIGNATURE {
        return Err(AcpiError::InvalidSignature { addr });
    }
    reader::read_u8(reader, addr.wrapping_add(REVISION_OFFSET))
}

/// Return the root table named by an already validated RSDP.
///
/// Revision 2 and later use the 64-bit XSDT pointer; earlier revisions use
/// the 32-bit RSDT pointer, zero-extended.
///
/// # Errors
///
/// Returns [`AcpiError::MissingRootTable`] if the selected pointer is zero,
/// or [`AcpiError::ReadFault`] if it is unreadable.
pub fn root_table(
    reader: &impl MemoryReader,
    addr: u64,
    revision: u8,
) -> Result<(u64, RootTableKind), AcpiError> {
    let (root, kind) = if revision >= XSDT_MIN_REVISION {
        let xsdt = reader::read_u64(reader, addr.wrapping_add(XSDT_ADDRESS_OFFSET))?;
        (xsdt, RootTableKind::Xsdt)
    } else {
        let rsdt = reader::read_u32(reader, addr.wrapping_add(RSDT_ADDRESS_OFFSET))?;
        (u64::from(rsdt), RootTableKind::Rsdt)
    };

    if root == 0 {
        return Err(AcpiError::MissingRootTable { rsdp: addr });
    }
    Ok((root, kind))
}

/// Validate the RSDP at `addr` and resolve the RSDT or XSDT it names.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidSignature`], [`AcpiError::MissingRootTable`]
/// or [`AcpiError::ReadFault`].
pub fn resolve_root(
    reader: &impl MemoryReader,
    addr: u64,
) -> Result<(u64, RootTableKind), AcpiError> {
    let revision = validate_rsdp(reader, addr)?;
    let (root, kind) = root_table(reader, addr, revision)?;
    log::debug!("acpi: RSDP rev {revision} at {addr:#x} -> {kind:?} at {root:#x}");
    Ok((root, kind))
}

/// Validate the RSDP checksums.
///
/// The first 20 bytes must always sum to zero. For revision 2 and later the
/// full 36-byte structure must sum to zero as well.
///
/// # Errors
///
/// Returns [`AcpiError::InvalidChecksum`] if either sum is non-zero, or
/// [`AcpiError::ReadFault`] if the structure is unreadable.
pub fn validate_rsdp_checksum(
    reader: &impl MemoryReader,
    addr: u64,
    revision: u8,
) -> Result<(), AcpiError> {
    if sdt::checksum(reader, addr, RSDP_V1_SIZE)? != 0 {
        return Err(AcpiError::InvalidChecksum { addr });
    }
    if revision >= XSDT_MIN_REVISION && sdt::checksum(reader, addr, RSDP_V2_SIZE)? != 0 {
        return Err(AcpiError::InvalidChecksum { addr });
    }
    Ok(())
}
