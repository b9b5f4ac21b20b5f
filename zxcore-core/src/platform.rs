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
//! Platform-wide tagged enums: machine models, RAM page counts and the
//! logging module/submodule tags used to scope `log` targets (spec §2 row 1).
use core::fmt;

use crate::clock::FrameTiming;

/// Every machine model this engine can emulate (spec §1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(serde::Serialize, serde::Deserialize))]
pub enum Model {
    Spectrum48,
    Spectrum128,
    SpectrumPlus2,
    SpectrumPlus2A,
    SpectrumPlus3,
    Pentagon128,
    Pentagon512,
    Pentagon1024,
    Scorpion256,
    Profi,
    TsConf,
}

impl Model {
    /// Number of 16 KiB RAM pages in the page pool for this model (spec §3).
    pub const fn ram_pages(self) -> u16 {
        match self {
            Model::Spectrum48 => 3,
            Model::Spectrum128 | Model::SpectrumPlus2 => 8,
            Model::SpectrumPlus2A | Model::SpectrumPlus3 => 8,
            Model::Pentagon128 => 8,
            Model::Pentagon512 => 32,
            Model::Pentagon1024 => 64,
            Model::Scorpion256 => 16,
            Model::Profi => 8,
            Model::TsConf => 256,
        }
    }

    /// Number of distinct 16 KiB ROM pages this model's ROM set is split into.
    pub const fn rom_pages(self) -> u16 {
        match self {
            Model::Spectrum48 => 1,
            Model::Spectrum128 | Model::SpectrumPlus2 => 2,
            Model::SpectrumPlus2A | Model::SpectrumPlus3 => 4,
            Model::Pentagon128 | Model::Pentagon512 | Model::Pentagon1024 => 2,
            Model::Scorpion256 => 4,
            Model::Profi => 4,
            Model::TsConf => 4,
        }
    }

    /// Frame timing parameters (spec §2, "One frame = a fixed number of t-states").
    pub const fn frame_timing(self) -> FrameTiming {
        match self {
            Model::Spectrum48 => FrameTiming::ZX48,
            Model::Spectrum128 | Model::SpectrumPlus2
                | Model::SpectrumPlus2A | Model::SpectrumPlus3 => FrameTiming::ZX128,
            Model::Pentagon128 | Model::Pentagon512 | Model::Pentagon1024
                | Model::Scorpion256 | Model::Profi | Model::TsConf => FrameTiming::PENTAGON,
        }
    }

    /// Whether this model has the 128K-style `0x7FFD`/AY-driven memory paging at all.
    pub const fn has_ay(self) -> bool {
        !matches!(self, Model::Spectrum48)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Model::Spectrum48 => "ZX Spectrum 48K",
            Model::Spectrum128 => "ZX Spectrum 128K",
            Model::SpectrumPlus2 => "ZX Spectrum +2",
            Model::SpectrumPlus2A => "ZX Spectrum +2A",
            Model::SpectrumPlus3 => "ZX Spectrum +3",
            Model::Pentagon128 => "Pentagon 128",
            Model::Pentagon512 => "Pentagon 512",
            Model::Pentagon1024 => "Pentagon 1024",
            Model::Scorpion256 => "Scorpion ZS-256",
            Model::Profi => "Profi",
            Model::TsConf => "TSConf",
        };
        f.write_str(name)
    }
}

/// Logging module tags, mirroring the ten-module split used to scope per-module/submodule log
/// verbosity. zxcore doesn't reimplement a runtime filter on top of this (the logging back-end
/// is a host concern) but keeps the same tag set as `log::Record` targets so a host's `log`
/// backend can filter on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Module {
    Unknown,
    Core,
    Z80,
    Memory,
    Io,
    Disk,
    Video,
    Sound,
    Dma,
    Debugger,
}

impl Module {
    pub const fn target(self) -> &'static str {
        match self {
            Module::Unknown => "zxcore::unknown",
            Module::Core => "zxcore::core",
            Module::Z80 => "zxcore::z80",
            Module::Memory => "zxcore::memory",
            Module::Io => "zxcore::io",
            Module::Disk => "zxcore::disk",
            Module::Video => "zxcore::video",
            Module::Sound => "zxcore::sound",
            Module::Dma => "zxcore::dma",
            Module::Debugger => "zxcore::debugger",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pentagon512_has_32_ram_pages() {
        assert_eq!(Model::Pentagon512.ram_pages(), 32);
    }

    #[test]
    fn model_frame_timing_matches_spec_budgets() {
        assert_eq!(Model::Spectrum48.frame_timing().frame_tstates, 69_888);
        assert_eq!(Model::Spectrum128.frame_timing().frame_tstates, 70_908);
        assert_eq!(Model::Pentagon128.frame_timing().frame_tstates, 71_680);
    }
}
