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
//! The Z80 register file (spec §3 "Z80 register file").
use bitflags::bitflags;

bitflags! {
    /// Flag bits of the F register.
    #[derive(Default)]
    pub struct Flags: u8 {
        const C  = 0b0000_0001;
        const N  = 0b0000_0010;
        const PV = 0b0000_0100;
        const X  = 0b0000_1000;
        const H  = 0b0001_0000;
        const Y  = 0b0010_0000;
        const Z  = 0b0100_0000;
        const S  = 0b1000_0000;
    }
}

/// Interrupt mode, as set by IM 0/1/2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntMode {
    Im0,
    Im1,
    Im2,
}

/// One 16-bit register pair plus its shadow, addressable as two 8-bit halves.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct RegPair(pub u16);

impl RegPair {
    #[inline] pub fn hi(self) -> u8 { (self.0 >> 8) as u8 }
    #[inline] pub fn lo(self) -> u8 { (self.0 & 0xFF) as u8 }
    #[inline] pub fn set_hi(&mut self, v: u8) { self.0 = (self.0 & 0x00FF) | ((v as u16) << 8); }
    #[inline] pub fn set_lo(&mut self, v: u8) { self.0 = (self.0 & 0xFF00) | v as u16; }
}

/// Full register file (spec §3): PC, SP, I, R; AF/BC/DE/HL and their shadows; IX/IY; flags;
/// interrupt mode, IFF1/IFF2, halted, the frame-relative t-state counter and `eipos`.
#[derive(Clone, Debug)]
pub struct Registers {
    pub af: RegPair,
    pub bc: RegPair,
    pub de: RegPair,
    pub hl: RegPair,
    pub af_alt: RegPair,
    pub bc_alt: RegPair,
    pub de_alt: RegPair,
    pub hl_alt: RegPair,
    pub ix: u16,
    pub iy: u16,
    pub pc: u16,
    pub sp: u16,
    pub i: u8,
    pub r: u8,
    pub im: IntMode,
    pub iff1: bool,
    pub iff2: bool,
    pub halted: bool,
    /// T-state counter within the current frame (spec §3 `t`).
    pub t: i32,
    /// T-state at which the last EI executed; IRQ acceptance is deferred by one instruction
    /// while `t` hasn't advanced past this (spec §3 `eipos`, §4.3 "EI-deferral").
    pub eipos: i32,
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            af: RegPair(0xFFFF),
            bc: RegPair(0xFFFF),
            de: RegPair(0xFFFF),
            hl: RegPair(0xFFFF),
            af_alt: RegPair(0xFFFF),
            bc_alt: RegPair(0xFFFF),
            de_alt: RegPair(0xFFFF),
            hl_alt: RegPair(0xFFFF),
            ix: 0xFFFF,
            iy: 0xFFFF,
            pc: 0,
            sp: 0xFFFF,
            i: 0,
            r: 0,
            im: IntMode::Im0,
            iff1: false,
            iff2: false,
            halted: false,
            t: 0,
            eipos: i32::MIN / 2,
        }
    }
}

impl Registers {
    #[inline] pub fn a(&self) -> u8 { self.af.hi() }
    #[inline] pub fn f(&self) -> Flags { Flags::from_bits_truncate(self.af.lo()) }
    #[inline] pub fn set_a(&mut self, v: u8) { self.af.set_hi(v); }
    #[inline] pub fn set_f(&mut self, f: Flags) { self.af.set_lo(f.bits()); }

    #[inline] pub fn b(&self) -> u8 { self.bc.hi() }
    #[inline] pub fn c(&self) -> u8 { self.bc.lo() }
    #[inline] pub fn set_b(&mut self, v: u8) { self.bc.set_hi(v); }
    #[inline] pub fn set_c(&mut self, v: u8) { self.bc.set_lo(v); }

    #[inline] pub fn d(&self) -> u8 { self.de.hi() }
    #[inline] pub fn e(&self) -> u8 { self.de.lo() }
    #[inline] pub fn set_d(&mut self, v: u8) { self.de.set_hi(v); }
    #[inline] pub fn set_e(&mut self, v: u8) { self.de.set_lo(v); }

    #[inline] pub fn h(&self) -> u8 { self.hl.hi() }
    #[inline] pub fn l(&self) -> u8 { self.hl.lo() }
    #[inline] pub fn set_h(&mut self, v: u8) { self.hl.set_hi(v); }
    #[inline] pub fn set_l(&mut self, v: u8) { self.hl.set_lo(v); }

    /// `R` increments by one on every M1 cycle, preserving bit 7 (spec: bit 7 is the "refresh
    /// holds" bit and is left alone by the CPU itself).
    #[inline]
    pub fn bump_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    pub fn exx(&mut self) {
        core::mem::swap(&mut self.bc, &mut self.bc_alt);
        core::mem::swap(&mut self.de, &mut self.de_alt);
        core::mem::swap(&mut self.hl, &mut self.hl_alt);
    }

    pub fn ex_af_af(&mut self) {
        core::mem::swap(&mut self.af, &mut self.af_alt);
    }
}
