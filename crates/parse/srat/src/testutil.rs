//! Synthetic firmware images for unit tests.

extern crate std;

use std::vec::Vec;

use crate::reader::SliceMemory;

/// Structures are placed on 16-byte boundaries, like the RSDP in firmware.
const ALIGN: usize = 16;

/// Lays out RSDP, root tables and SDTs in one contiguous image.
pub(crate) struct ImageBuilder {
    base: u64,
    data: Vec<u8>,
}

/// A finished image; hand out readers with [`Image::memory`].
pub(crate) struct Image {
    base: u64,
    data: Vec<u8>,
}

impl Image {
    pub(crate) fn memory(&self) -> SliceMemory<'_> {
        SliceMemory::new(self.base, &self.data)
    }

    pub(crate) fn memory_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ImageBuilder {
    pub(crate) fn new(base: u64) -> Self {
        Self {
            base,
            data: Vec::new(),
        }
    }

    /// Appends `bytes` and returns the address they were placed at.
    pub(crate) fn table(&mut self, bytes: &[u8]) -> u64 {
        while self.data.len() % ALIGN != 0 {
            self.data.push(0);
        }
        let addr = self.base + self.data.len() as u64;
        self.data.extend_from_slice(bytes);
        addr
    }

    /// Appends an RSDT holding 32-bit pointers to `entries`.
    pub(crate) fn rsdt(&mut self, entries: &[u64]) -> u64 {
        let body: Vec<u8> = entries
            .iter()
            .flat_map(|&e| u32::try_from(e).unwrap().to_le_bytes())
            .collect();
        self.table(&plain_table(b"RSDT", &body))
    }

    /// Appends an XSDT holding 64-bit pointers to `entries`.
    pub(crate) fn xsdt(&mut self, entries: &[u64]) -> u64 {
        let body: Vec<u8> = entries.iter().flat_map(|&e| e.to_le_bytes()).collect();
        self.table(&plain_table(b"XSDT", &body))
    }

    /// Appends a 36-byte RSDP with valid checksums.
    pub(crate) fn rsdp(&mut self, revision: u8, rsdt: u64, xsdt: u64) -> u64 {
        let mut rsdp = Vec::with_capacity(36);
        rsdp.extend_from_slice(b"RSD PTR ");
        rsdp.push(0); // checksum
        rsdp.extend_from_slice(b"HADRON");
        rsdp.push(revision);
        rsdp.extend_from_slice(&u32::try_from(rsdt).unwrap().to_le_bytes());
        rsdp.extend_from_slice(&36u32.to_le_bytes());
        rsdp.extend_from_slice(&xsdt.to_le_bytes());
        rsdp.push(0); // extended checksum
        rsdp.extend_from_slice(&[0; 3]);
        rsdp[8] = fix_checksum(&rsdp[..20]);
        rsdp[32] = fix_checksum(&rsdp);
        self.table(&rsdp)
    }

    pub(crate) fn finish(self) -> Image {
        Image {
            base: self.base,
            data: self.data,
        }
    }
}

/// Returns the byte that makes `bytes` sum to zero, assuming the slot it
/// goes into currently holds zero.
fn fix_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    0u8.wrapping_sub(sum)
}

/// Builds an SDT with a valid header and checksum around `body`.
pub(crate) fn plain_table(signature: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let length = u32::try_from(36 + body.len()).unwrap();
    let mut table = Vec::with_capacity(length as usize);
    table.extend_from_slice(signature);
    table.extend_from_slice(&length.to_le_bytes());
    table.push(1); // revision
    table.push(0); // checksum
    table.extend_from_slice(b"HADRON");
    table.extend_from_slice(b"SYNTHETC");
    table.extend_from_slice(&1u32.to_le_bytes()); // OEM revision
    table.extend_from_slice(b"HDRN"); // creator ID
    table.extend_from_slice(&1u32.to_le_bytes()); // creator revision
    table.extend_from_slice(body);
    table[9] = fix_checksum(&table);
    table
}

/// Builds an SRAT whose records start 44 bytes into the table.
pub(crate) fn srat_table(records: &[Vec<u8>]) -> Vec<u8> {
    let mut body = std::vec![0u8; 8]; // reserved
    for record in records {
        body.extend_from_slice(record);
    }
    plain_table(b"SRAT", &body)
}

/// Type 0 record, 16 bytes, proximity domain at +4, APIC ID 0.
pub(crate) fn apic_record(proximity_domain: u32) -> Vec<u8> {
    apic_record_with_id(0, proximity_domain)
}

/// Type 0 record with the APIC ID at +3.
pub(crate) fn apic_record_with_id(apic_id: u8, proximity_domain: u32) -> Vec<u8> {
    let mut rec = std::vec![0u8, 16, 0, apic_id];
    rec.extend_from_slice(&proximity_domain.to_le_bytes());
    rec.extend_from_slice(&[0; 8]);
    rec
}

/// Enabled type 1 record in domain 0, 40 bytes, base at +8 and length at +16.
pub(crate) fn memory_record(base_address: u64, length: u64) -> Vec<u8> {
    memory_record_in(0, base_address, length, true)
}

/// Type 1 record with the domain at +2 and the enabled flag at +28.
pub(crate) fn memory_record_in(
    proximity_domain: u32,
    base_address: u64,
    length: u64,
    enabled: bool,
) -> Vec<u8> {
    let mut rec = std::vec![1u8, 40];
    rec.extend_from_slice(&proximity_domain.to_le_bytes());
    rec.extend_from_slice(&[0; 2]);
    rec.extend_from_slice(&base_address.to_le_bytes());
    rec.extend_from_slice(&length.to_le_bytes());
    rec.extend_from_slice(&[0; 4]);
    rec.extend_from_slice(&u32::from(enabled).to_le_bytes());
    rec.extend_from_slice(&[0; 8]);
    rec
}

/// Type 2 record, 24 bytes, proximity domain at +8, x2APIC ID 0.
pub(crate) fn x2apic_record(proximity_domain: u32) -> Vec<u8> {
    x2apic_record_with_id(0, proximity_domain)
}

/// Type 2 record with the x2APIC ID at +4.
pub(crate) fn x2apic_record_with_id(x2apic_id: u32, proximity_domain: u32) -> Vec<u8> {
    let mut rec = std::vec![2u8, 24, 0, 0];
    rec.extend_from_slice(&x2apic_id.to_le_bytes());
    rec.extend_from_slice(&proximity_domain.to_le_bytes());
    rec.extend_from_slice(&[0; 12]);
    rec
}

/// A record of an arbitrary type, zero-filled to `length` bytes.
pub(crate) fn raw_record(record_type: u8, length: u8) -> Vec<u8> {
    let mut rec = std::vec![0u8; usize::from(length).max(2)];
    rec[0] = record_type;
    rec[1] = length;
    rec
}
