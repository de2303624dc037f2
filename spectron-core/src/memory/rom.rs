/*
    Copyright (C) 2024-2026  Spectron Developers

    This file is part of SPECTRON, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! ROM role assignment per model and page signature identification.
use sha2::{Digest, Sha256};

use super::{MemoryError, Result, PAGE_SIZE};

/// ROM sizes accepted by [crate::memory::Memory::load_rom], in bytes.
pub const SUPPORTED_ROM_SIZES: [usize; 7] = [
    0x4000, 0x8000, 0x10000, 0x20000, 0x40000, 0x80000, 0x100000
];

/// Known ROM page signatures, informational only.
///
/// An unknown signature is not a load failure; it is reported through the
/// logging channel so a frontend can flag unidentified firmware.
pub const KNOWN_SIGNATURES: [(&str, &str); 4] = [
    ("8d93c3342321e9d1e51d60afcd7d15f6a7afd978c231b43435a7c0757c60b9a3", "128k ROM 1 (48k BASIC)"),
    ("3ba308f23b9471d13d9ba30c23030059a9ce5d4b317b85b86274b132651d1425", "128k ROM 0 (128k editor & menu)"),
    ("1ef928538972ed8f0425c4469f3f471267393f7635b813f000de0fec4ea39fa3", "TR-DOS v5.04TM ROM"),
    ("9d4bf28f2d1a9acac9907c918be3c3070f7250bc677919cface5e253a199fc7a", "HRom boot"),
];

/// Validates a ROM blob size and returns the number of 16 KiB banks.
pub fn validate_rom_size(len: usize) -> Result<u8> {
    if SUPPORTED_ROM_SIZES.contains(&len) {
        Ok((len / PAGE_SIZE) as u8)
    }
    else {
        Err(MemoryError::InvalidRomSize(len))
    }
}

/// The SHA-256 signature of a single ROM page as a lowercase hex string.
pub fn page_signature(page: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(page);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use core::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Looks a signature up in the table of known ROM images.
pub fn lookup_rom_signature(signature: &str) -> Option<&'static str> {
    KNOWN_SIGNATURES.iter()
        .find(|(sig, _)| *sig == signature)
        .map(|(_, name)| *name)
}

/// The roles a model assigns to its ROM banks.
///
/// Which bank serves as the system, TR-DOS, 128 editor and 48 BASIC ROM
/// differs between models; banking rules select among these roles.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct RomSet {
    /// Service or shadow monitor ROM bank, when present.
    pub sys: Option<u8>,
    /// TR-DOS ROM bank, when present.
    pub dos: Option<u8>,
    /// 128k editor/menu ROM bank, when present.
    pub rom128: Option<u8>,
    /// 48k BASIC (SOS) ROM bank.
    pub sos: u8,
}

impl RomSet {
    /// 48k: a single SOS bank.
    pub fn single() -> Self {
        RomSet { sys: None, dos: None, rom128: None, sos: 0 }
    }

    /// 128k/+2: editor in bank 0, BASIC in bank 1.
    pub fn spectrum128() -> Self {
        RomSet { sys: None, dos: None, rom128: Some(0), sos: 1 }
    }

    /// +2A/+3: four banks, syscalls in bank 1, DOS in bank 2.
    pub fn plus3() -> Self {
        RomSet { sys: Some(1), dos: Some(2), rom128: Some(0), sos: 3 }
    }

    /// Pentagon and the Scorpion family: service, DOS, 128, SOS.
    pub fn pentagon() -> Self {
        RomSet { sys: Some(0), dos: Some(1), rom128: Some(2), sos: 3 }
    }

    /// Kay 1024: 128 editor first, service last.
    pub fn kay() -> Self {
        RomSet { sys: Some(3), dos: Some(2), rom128: Some(0), sos: 1 }
    }

    /// ATM3: SOS first.
    pub fn atm3() -> Self {
        RomSet { sys: Some(3), dos: Some(1), rom128: Some(2), sos: 0 }
    }

    /// Whether this set carries a TR-DOS capable ROM.
    #[inline]
    pub fn has_dos(&self) -> bool {
        self.dos.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_size_set_membership() {
        assert_eq!(validate_rom_size(0x4000).unwrap(), 1);
        assert_eq!(validate_rom_size(0x10000).unwrap(), 4);
        assert_eq!(validate_rom_size(0x100000).unwrap(), 64);
        assert!(validate_rom_size(0x4001).is_err());
        assert!(validate_rom_size(0xC000).is_err());
        assert!(validate_rom_size(0).is_err());
    }

    #[test]
    fn signature_is_hex_sha256() {
        let page = vec![0u8; PAGE_SIZE];
        let sig = page_signature(&page);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        // all-zero 16 KiB page, independently computed
        assert_eq!(&sig,
            "4fe7b59af6de3b665b67788cc2f99892ab827efae3a467342b3bb4e3bc8e5bfe");
        assert!(lookup_rom_signature(&sig).is_none());
    }
}
