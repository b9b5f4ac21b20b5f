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
//! Mnemonic tables shared between the interpreter and the disassembler (spec §4.8
//! "Decoded instruction", §4.3). Every Z80 opcode decomposes as `xx yyy zzz` (with `yyy` further
//! splitting into `pp q`), which is what lets one small table stand in for 256 entries per
//! prefix instead of hand-listing each one.
use core::fmt;

/// Which prefix byte(s), if any, preceded the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    None,
    Cb,
    Ed,
    Dd,
    Fd,
    /// `DD CB disp op` / `FD CB disp op`: indexed bit/rotate-shift instructions.
    DdCb,
    FdCb,
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Prefix::None => "",
            Prefix::Cb => "CB",
            Prefix::Ed => "ED",
            Prefix::Dd => "DD",
            Prefix::Fd => "FD",
            Prefix::DdCb => "DDCB",
            Prefix::FdCb => "FDCB",
        };
        f.write_str(s)
    }
}

pub const R_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
pub const RP_NAMES: [&str; 4] = ["BC", "DE", "HL", "SP"];
pub const RP2_NAMES: [&str; 4] = ["BC", "DE", "HL", "AF"];
pub const CC_NAMES: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
pub const ALU_NAMES: [&str; 8] = ["ADD A,", "ADC A,", "SUB", "SBC A,", "AND", "XOR", "OR", "CP"];
pub const ROT_NAMES: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];

/// Index register name substituted for `HL`/`(HL)` under a DD/FD prefix.
pub fn index_name(prefix: Prefix) -> &'static str {
    match prefix {
        Prefix::Dd | Prefix::DdCb => "IX",
        Prefix::Fd | Prefix::FdCb => "IY",
        _ => "HL",
    }
}

/// Splits an opcode byte into the `x`, `y`, `z`, `p`, `q` fields used throughout the decode
/// tables (the standard "undocumented Z80" bit layout: `xxyyyzzz`, `yyy = ppq`).
#[derive(Clone, Copy, Debug)]
pub struct OpcodeFields {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub p: u8,
    pub q: u8,
}

impl OpcodeFields {
    pub fn decompose(opcode: u8) -> Self {
        OpcodeFields {
            x: (opcode >> 6) & 0b11,
            y: (opcode >> 3) & 0b111,
            z: opcode & 0b111,
            p: (opcode >> 4) & 0b11,
            q: (opcode >> 3) & 0b1,
        }
    }
}

/// Static per-instruction metadata: mnemonic text (with placeholders `%d`/`%n`/`%nn` this
/// caller substitutes), operand byte count beyond the opcode, and nominal (uncontended) T-states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrInfo {
    pub mnemonic: String,
    pub extra_bytes: u8,
    pub tstates: u8,
}
