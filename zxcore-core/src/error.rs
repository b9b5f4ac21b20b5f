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
//! Error kinds surfaced across the engine: a `#[non_exhaustive]` enum with a `Display` impl
//! plus `std::error::Error`, never a panic for conditions a host can recover from.
use core::fmt;
use std::path::PathBuf;

/// Fatal or surfaced-to-host errors (see spec §7).
#[non_exhaustive]
#[derive(Debug)]
pub enum EngineError {
    /// A ROM image file could not be read.
    RomLoadFailed { path: PathBuf },
    /// A ROM image's size was not a multiple of 16 KiB.
    RomSizeInvalid { path: PathBuf, size: usize },
    /// The requested machine model has no registered port decoder.
    UnknownModel { id: u16 },
    /// A loaded snapshot did not match any recognised format.
    SnapshotFormatInvalid { kind: &'static str, offset: usize },
    /// A loaded disk image failed a structural sanity check.
    DiskImageInvalid { reason: &'static str },
    /// Reading or parsing a snapshot, tape, or disk image file failed at the I/O layer.
    Io { operation: &'static str, source: std::io::Error },
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::RomLoadFailed { path } =>
                write!(f, "failed to load ROM image: {}", path.display()),
            EngineError::RomSizeInvalid { path, size } =>
                write!(f, "ROM image {} has invalid size {} (not a multiple of 16 KiB)", path.display(), size),
            EngineError::UnknownModel { id } =>
                write!(f, "unknown machine model id {}", id),
            EngineError::SnapshotFormatInvalid { kind, offset } =>
                write!(f, "invalid {} snapshot data at offset {}", kind, offset),
            EngineError::DiskImageInvalid { reason } =>
                write!(f, "invalid disk image: {}", reason),
            EngineError::Io { operation, source } =>
                write!(f, "{} failed: {}", operation, source),
        }
    }
}
