/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    For the full copyright notice, see the lib.rs file.
*/
/*! **TRD**/**SCL** TR-DOS disk image format utilities.

These parse the on-disk *format* only: a 163840-byte flat TR-DOS image (80 tracks, 2 sides,
16 sectors/track, 256 bytes/sector) for `.trd`, or the more compact catalog-plus-files `.scl`
container, converted into the same flat sector image. Neither the FDC (`1818BB1`) protocol
state machine nor the disk-controller ports that would read/write this image a sector at a
time are implemented here; a future controller is expected to be handed the [`TrdosImage`]
bytes this module produces and to expose them through its own ports.
*/
use std::io::{self, Error, ErrorKind, Read, Result};

pub const SECTOR_SIZE: usize = 256;
pub const SECTORS_PER_TRACK: usize = 16;
pub const TRACKS_80_2_SIDES: usize = 80 * 2;
pub const IMAGE_SIZE_80_2_SIDES: usize = TRACKS_80_2_SIDES * SECTORS_PER_TRACK * SECTOR_SIZE;

const SCL_MAGIC: &[u8; 8] = b"SINCLAIR";
const CATALOG_ENTRY_SIZE: usize = 16;
const CATALOG_ENTRIES_MAX: usize = 128;
/// Logical sector holding the disk information block (track 0, sector 8, 0-based).
const DISK_INFO_SECTOR: usize = 8;
const TRDOS_ID_MARKER: u8 = 0x10;

/// One TR-DOS catalog entry: an 8-byte name, a 1-byte type, two 16-bit parameters whose
/// meaning depends on the type (start address/autostart line for BASIC, start address for
/// CODE), the file's length in sectors, and the sector it starts at (`track*16 + sector`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: [u8; 8],
    pub file_type: u8,
    pub param1: u16,
    pub param2: u16,
    pub length_sectors: u8,
    pub start_sector: u8,
}

impl CatalogEntry {
    fn is_deleted(&self) -> bool {
        self.name[0] == 0x01
    }

    fn is_empty(&self) -> bool {
        self.name[0] == 0x00
    }

    fn from_bytes(b: &[u8; CATALOG_ENTRY_SIZE]) -> Self {
        CatalogEntry {
            name: b[0..8].try_into().unwrap(),
            file_type: b[8],
            param1: u16::from_le_bytes([b[9], b[10]]),
            param2: u16::from_le_bytes([b[11], b[12]]),
            length_sectors: b[13],
            start_sector: b[14],
        }
    }

    fn to_bytes(self) -> [u8; CATALOG_ENTRY_SIZE] {
        let mut out = [0u8; CATALOG_ENTRY_SIZE];
        out[0..8].copy_from_slice(&self.name);
        out[8] = self.file_type;
        out[9..11].copy_from_slice(&self.param1.to_le_bytes());
        out[11..13].copy_from_slice(&self.param2.to_le_bytes());
        out[13] = self.length_sectors;
        out[14] = self.start_sector;
        out[15] = 0;
        out
    }

    /// The filename trimmed of trailing spaces, lossily decoded (TR-DOS names are
    /// effectively Latin-1/ASCII).
    pub fn display_name(&self) -> String {
        let trimmed = self.name.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.name[..trimmed]).into_owned()
    }
}

/// A decoded flat TR-DOS disk image: the full sector-addressable byte buffer plus the
/// catalog entries found in it.
#[derive(Debug, Clone)]
pub struct TrdosImage {
    pub sectors: Vec<u8>,
    pub entries: Vec<CatalogEntry>,
    pub disk_type: u8,
    pub label: [u8; 8],
}

impl TrdosImage {
    fn new(total_tracks: usize) -> Self {
        TrdosImage {
            sectors: vec![0u8; total_tracks * SECTORS_PER_TRACK * SECTOR_SIZE],
            entries: Vec::new(),
            disk_type: 0x16,
            label: [b' '; 8],
        }
    }

    fn sector_offset(sector_index: usize) -> usize {
        sector_index * SECTOR_SIZE
    }

    fn write_disk_info(&mut self, file_count: u8, free_sectors: u16) {
        let offset = Self::sector_offset(DISK_INFO_SECTOR);
        let info = &mut self.sectors[offset..offset + SECTOR_SIZE];
        info[0xE5] = self.disk_type;
        info[0xE6] = file_count;
        info[0xE7..0xE9].copy_from_slice(&free_sectors.to_le_bytes());
        info[0xE9] = TRDOS_ID_MARKER;
        info[0xF6..0xFE].copy_from_slice(&self.label);
    }

    /// Reads the catalog directly out of `sectors` (used after parsing a native `.trd`
    /// image, where the catalog is already laid out on disk).
    fn read_catalog_from_sectors(&mut self) {
        for i in 0..CATALOG_ENTRIES_MAX {
            let offset = i * CATALOG_ENTRY_SIZE;
            let bytes: [u8; CATALOG_ENTRY_SIZE] = self.sectors[offset..offset + CATALOG_ENTRY_SIZE]
                .try_into()
                .unwrap();
            let entry = CatalogEntry::from_bytes(&bytes);
            if entry.is_empty() {
                break;
            }
            if !entry.is_deleted() {
                self.entries.push(entry);
            }
        }
        let offset = Self::sector_offset(DISK_INFO_SECTOR);
        self.disk_type = self.sectors[offset + 0xE5];
        self.label.copy_from_slice(&self.sectors[offset + 0xF6..offset + 0xFE]);
    }
}

/// Reads a native flat TR-DOS `.trd` image (all sectors already laid out) and decodes its
/// catalog.
///
/// # Errors
/// Returns an error if the stream isn't a whole number of sectors or is too large to be a
/// valid 80-track, double-sided image.
pub fn load_trd<R: Read>(mut src: R) -> Result<TrdosImage> {
    let mut bytes = Vec::new();
    src.read_to_end(&mut bytes)?;
    if bytes.is_empty() || bytes.len() % SECTOR_SIZE != 0 {
        return Err(Error::new(ErrorKind::InvalidData, "TRD: size is not a whole number of sectors"));
    }
    if bytes.len() > IMAGE_SIZE_80_2_SIDES {
        return Err(Error::new(ErrorKind::InvalidData, "TRD: image larger than an 80-track double-sided disk"));
    }
    let mut image = TrdosImage::new(TRACKS_80_2_SIDES);
    image.sectors[..bytes.len()].copy_from_slice(&bytes);
    image.read_catalog_from_sectors();
    Ok(image)
}

/// Parses a `.scl` container (catalog followed by concatenated file bodies, no gaps) and
/// synthesizes a flat [`TrdosImage`] laid out the way TR-DOS itself would: catalog in the
/// first 8 sectors of track 0, disk info in the 9th, file bodies packed starting at the
/// 10th sector in catalog order.
///
/// # Errors
/// Returns an error if the magic header doesn't match, the declared file count doesn't fit
/// the catalog, or the stream is truncated relative to what the catalog declares.
pub fn load_scl<R: Read>(mut src: R) -> Result<TrdosImage> {
    let mut magic = [0u8; 8];
    src.read_exact(&mut magic)?;
    if &magic != SCL_MAGIC {
        return Err(Error::new(ErrorKind::InvalidData, "SCL: missing 'SINCLAIR' magic header"));
    }
    let mut count_buf = [0u8; 1];
    src.read_exact(&mut count_buf)?;
    let file_count = count_buf[0] as usize;
    if file_count > CATALOG_ENTRIES_MAX {
        return Err(Error::new(ErrorKind::InvalidData, "SCL: too many files for a TR-DOS catalog"));
    }

    let mut entries = Vec::with_capacity(file_count);
    for _ in 0..file_count {
        let mut buf = [0u8; 14];
        src.read_exact(&mut buf)?;
        let mut full = [0u8; CATALOG_ENTRY_SIZE];
        full[..14].copy_from_slice(&buf);
        entries.push(CatalogEntry::from_bytes(&full));
    }

    let mut bodies = Vec::with_capacity(file_count);
    for entry in &entries {
        let len = entry.length_sectors as usize * SECTOR_SIZE;
        let mut body = vec![0u8; len];
        src.read_exact(&mut body)?;
        bodies.push(body);
    }

    let used_sectors: usize = entries.iter().map(|e| e.length_sectors as usize).sum();
    let data_start_sector = DISK_INFO_SECTOR + 1;
    let total_sectors_needed = data_start_sector + used_sectors;
    let total_tracks = (total_sectors_needed + SECTORS_PER_TRACK - 1) / SECTORS_PER_TRACK;
    let mut image = TrdosImage::new(total_tracks.max(TRACKS_80_2_SIDES / 2));

    let mut cursor = data_start_sector;
    let mut placed = Vec::with_capacity(file_count);
    for (entry, body) in entries.iter().zip(bodies.iter()) {
        let mut placed_entry = *entry;
        placed_entry.start_sector = cursor as u8;
        let offset = TrdosImage::sector_offset(cursor);
        image.sectors[offset..offset + body.len()].copy_from_slice(body);
        cursor += entry.length_sectors as usize;
        placed.push(placed_entry);
    }

    for (i, entry) in placed.iter().enumerate() {
        let offset = i * CATALOG_ENTRY_SIZE;
        image.sectors[offset..offset + CATALOG_ENTRY_SIZE].copy_from_slice(&entry.to_bytes().to_vec());
    }

    let total_sectors = image.sectors.len() / SECTOR_SIZE;
    let free_sectors = total_sectors.saturating_sub(total_sectors_needed) as u16;
    image.write_disk_info(file_count as u8, free_sectors);
    image.entries = placed;
    Ok(image)
}

/// Dispatches on the 8-byte SCL magic to pick the right loader; falls back to `.trd` parsing
/// (a bare sector dump has no fixed magic of its own).
pub fn load_disk_image<R: Read>(mut src: R) -> Result<TrdosImage> {
    let mut first8 = [0u8; 8];
    let n = src.read(&mut first8)?;
    let rest: Vec<u8> = {
        let mut buf = Vec::new();
        src.read_to_end(&mut buf)?;
        buf
    };
    let mut all = Vec::with_capacity(n + rest.len());
    all.extend_from_slice(&first8[..n]);
    all.extend_from_slice(&rest);
    if n == 8 && &first8 == SCL_MAGIC {
        load_scl(io::Cursor::new(all))
    } else {
        load_trd(io::Cursor::new(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scl_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(SCL_MAGIC);
        out.push(1);
        let mut name = [b' '; 8];
        name[..4].copy_from_slice(b"GAME");
        let entry = CatalogEntry {
            name,
            file_type: b'C',
            param1: 0x8000,
            param2: 512,
            length_sectors: 2,
            start_sector: 0,
        };
        out.extend_from_slice(&entry.to_bytes()[..14]);
        out.extend(std::iter::repeat(0xAAu8).take(2 * SECTOR_SIZE));
        out
    }

    #[test]
    fn loads_a_single_file_scl_and_relocates_it_onto_a_flat_image() {
        let image = load_scl(io::Cursor::new(sample_scl_bytes())).unwrap();
        assert_eq!(image.entries.len(), 1);
        let entry = image.entries[0];
        assert_eq!(entry.display_name(), "GAME");
        assert_eq!(entry.length_sectors, 2);
        let offset = TrdosImage::sector_offset(entry.start_sector as usize);
        assert_eq!(&image.sectors[offset..offset + 4], &[0xAA; 4]);
    }

    #[test]
    fn scl_with_bad_magic_is_rejected() {
        let mut bytes = sample_scl_bytes();
        bytes[0] = b'X';
        assert!(load_scl(io::Cursor::new(bytes)).is_err());
    }

    #[test]
    fn trd_rejects_a_stream_that_is_not_a_whole_sector_count() {
        let bytes = vec![0u8; SECTOR_SIZE + 1];
        assert!(load_trd(io::Cursor::new(bytes)).is_err());
    }

    #[test]
    fn trd_round_trips_disk_info_fields() {
        let mut sectors = vec![0u8; SECTOR_SIZE * (DISK_INFO_SECTOR + 1)];
        let offset = DISK_INFO_SECTOR * SECTOR_SIZE;
        sectors[offset + 0xE5] = 0x16;
        sectors[offset + 0xE6] = 3;
        sectors[offset + 0xF6..offset + 0xFE].copy_from_slice(b"MYDISK  ");
        let image = load_trd(io::Cursor::new(sectors)).unwrap();
        assert_eq!(image.disk_type, 0x16);
        assert_eq!(&image.label, b"MYDISK  ");
    }

    #[test]
    fn dispatch_recognizes_scl_magic_and_falls_back_to_trd() {
        let scl = load_disk_image(io::Cursor::new(sample_scl_bytes())).unwrap();
        assert_eq!(scl.entries.len(), 1);

        let trd_bytes = vec![0u8; SECTOR_SIZE * (DISK_INFO_SECTOR + 1)];
        let trd = load_disk_image(io::Cursor::new(trd_bytes)).unwrap();
        assert_eq!(trd.entries.len(), 0);
    }
}
