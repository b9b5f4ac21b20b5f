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
//! 8-bit ALU primitives and their flag side effects, split out from `exec.rs` so the opcode
//! dispatcher reads as decode-then-call rather than decode-and-inline-arithmetic.
use super::regs::Flags;

#[inline]
fn parity_even(v: u8) -> bool {
    v.count_ones() % 2 == 0
}

#[inline]
fn sz53(v: u8) -> Flags {
    let mut f = Flags::empty();
    if v == 0 { f |= Flags::Z; }
    if v & 0x80 != 0 { f |= Flags::S; }
    f |= Flags::from_bits_truncate(v & (Flags::X.bits() | Flags::Y.bits()));
    f
}

pub fn add8(a: u8, b: u8, carry_in: bool) -> (u8, Flags) {
    let c = carry_in as u16;
    let sum = a as u16 + b as u16 + c;
    let result = sum as u8;
    let mut f = sz53(result);
    if sum > 0xFF { f |= Flags::C; }
    if (a & 0x0F) + (b & 0x0F) + c as u8 > 0x0F { f |= Flags::H; }
    let overflow = (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0;
    if overflow { f |= Flags::PV; }
    (result, f)
}

pub fn sub8(a: u8, b: u8, carry_in: bool) -> (u8, Flags) {
    let c = carry_in as u16;
    let diff = (a as u16).wrapping_sub(b as u16).wrapping_sub(c);
    let result = diff as u8;
    let mut f = sz53(result) | Flags::N;
    if (a as u16) < (b as u16) + c { f |= Flags::C; }
    if (a & 0x0F) < (b & 0x0F) + c as u8 { f |= Flags::H; }
    let overflow = (a ^ b) & 0x80 != 0 && (a ^ result) & 0x80 != 0;
    if overflow { f |= Flags::PV; }
    (result, f)
}

pub fn and8(a: u8, b: u8) -> (u8, Flags) {
    let result = a & b;
    let mut f = sz53(result) | Flags::H;
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn or8(a: u8, b: u8) -> (u8, Flags) {
    let result = a | b;
    let mut f = sz53(result);
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn xor8(a: u8, b: u8) -> (u8, Flags) {
    let result = a ^ b;
    let mut f = sz53(result);
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

/// `INC r` never touches the carry flag.
pub fn inc8(a: u8) -> (u8, Flags, bool) {
    let result = a.wrapping_add(1);
    let mut f = sz53(result);
    if a & 0x0F == 0x0F { f |= Flags::H; }
    if a == 0x7F { f |= Flags::PV; }
    (result, f, false)
}

/// `DEC r` never touches the carry flag.
pub fn dec8(a: u8) -> (u8, Flags, bool) {
    let result = a.wrapping_sub(1);
    let mut f = sz53(result) | Flags::N;
    if a & 0x0F == 0x00 { f |= Flags::H; }
    if a == 0x80 { f |= Flags::PV; }
    (result, f, false)
}

pub fn rlc(v: u8) -> (u8, Flags) {
    let carry = v & 0x80 != 0;
    let result = v.rotate_left(1);
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn rrc(v: u8) -> (u8, Flags) {
    let carry = v & 0x01 != 0;
    let result = v.rotate_right(1);
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn rl(v: u8, carry_in: bool) -> (u8, Flags) {
    let carry = v & 0x80 != 0;
    let result = (v << 1) | carry_in as u8;
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn rr(v: u8, carry_in: bool) -> (u8, Flags) {
    let carry = v & 0x01 != 0;
    let result = (v >> 1) | ((carry_in as u8) << 7);
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn sla(v: u8) -> (u8, Flags) {
    let carry = v & 0x80 != 0;
    let result = v << 1;
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

/// Undocumented `SLL`/`SL1`: shifts left but sets bit 0, used by some `DDCB`/`FDCB` tables.
pub fn sll(v: u8) -> (u8, Flags) {
    let carry = v & 0x80 != 0;
    let result = (v << 1) | 1;
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn sra(v: u8) -> (u8, Flags) {
    let carry = v & 0x01 != 0;
    let result = (v >> 1) | (v & 0x80);
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

pub fn srl(v: u8) -> (u8, Flags) {
    let carry = v & 0x01 != 0;
    let result = v >> 1;
    let mut f = sz53(result);
    if carry { f |= Flags::C; }
    if parity_even(result) { f |= Flags::PV; }
    (result, f)
}

/// `BIT n,r`: Z/PV reflect the tested bit, S only meaningful for bit 7, C is preserved by the
/// caller (not touched here), X/Y come from the value under test except when the operand is
/// `(HL)` — callers pass the correct "undocumented flags source" byte in `xy_source`.
pub fn bit(n: u8, v: u8, xy_source: u8) -> Flags {
    let set = v & (1 << n) != 0;
    let mut f = Flags::H;
    f |= Flags::from_bits_truncate(xy_source & (Flags::X.bits() | Flags::Y.bits()));
    if !set { f |= Flags::Z | Flags::PV; }
    if n == 7 && set { f |= Flags::S; }
    f
}

pub fn daa(a: u8, f: Flags) -> (u8, Flags) {
    let mut correction: u8 = 0;
    let mut carry = f.contains(Flags::C);
    let half = f.contains(Flags::H);
    let neg = f.contains(Flags::N);
    let lo = a & 0x0F;
    if half || lo > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let result = if neg { a.wrapping_sub(correction) } else { a.wrapping_add(correction) };
    let half_out = if neg {
        half && lo < 6
    } else {
        lo > 9
    };
    let mut out = sz53(result);
    if carry { out |= Flags::C; }
    if half_out { out |= Flags::H; }
    if neg { out |= Flags::N; }
    if parity_even(result) { out |= Flags::PV; }
    (result, out)
}

/// `ADD HL,rr` / `ADD IX,rr`: only C/H/N/X/Y change, S/Z/PV are left alone by the caller.
pub fn add16(a: u16, b: u16) -> (u16, Flags) {
    let sum = a as u32 + b as u32;
    let result = sum as u16;
    let mut f = Flags::from_bits_truncate((result >> 8) as u8 & (Flags::X.bits() | Flags::Y.bits()));
    if sum > 0xFFFF { f |= Flags::C; }
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF { f |= Flags::H; }
    (result, f)
}

/// `ADC HL,rr`: full flag set, unlike `ADD HL,rr`.
pub fn adc16(a: u16, b: u16, carry_in: bool) -> (u16, Flags) {
    let c = carry_in as u32;
    let sum = a as u32 + b as u32 + c;
    let result = sum as u16;
    let mut f = Flags::from_bits_truncate((result >> 8) as u8 & (Flags::X.bits() | Flags::Y.bits()));
    if result == 0 { f |= Flags::Z; }
    if result & 0x8000 != 0 { f |= Flags::S; }
    if sum > 0xFFFF { f |= Flags::C; }
    if (a & 0x0FFF) + (b & 0x0FFF) + c as u16 > 0x0FFF { f |= Flags::H; }
    let overflow = (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0;
    if overflow { f |= Flags::PV; }
    (result, f)
}

pub fn sbc16(a: u16, b: u16, carry_in: bool) -> (u16, Flags) {
    let c = carry_in as u32;
    let diff = (a as u32).wrapping_sub(b as u32).wrapping_sub(c);
    let result = diff as u16;
    let mut f = Flags::from_bits_truncate((result >> 8) as u8 & (Flags::X.bits() | Flags::Y.bits())) | Flags::N;
    if result == 0 { f |= Flags::Z; }
    if result & 0x8000 != 0 { f |= Flags::S; }
    if (a as u32) < (b as u32) + c { f |= Flags::C; }
    if (a & 0x0FFF) < (b & 0x0FFF) + c as u16 { f |= Flags::H; }
    let overflow = (a ^ b) & 0x8000 != 0 && (a ^ result) & 0x8000 != 0;
    if overflow { f |= Flags::PV; }
    (result, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add8_sets_half_and_overflow() {
        let (r, f) = add8(0x0F, 0x01, false);
        assert_eq!(r, 0x10);
        assert!(f.contains(Flags::H));
        assert!(!f.contains(Flags::C));
    }

    #[test]
    fn sub8_signed_overflow() {
        let (r, f) = sub8(0x80, 0x01, false);
        assert_eq!(r, 0x7F);
        assert!(f.contains(Flags::PV));
    }

    #[test]
    fn bit_test_sets_zero_when_clear() {
        let f = bit(7, 0x00, 0x00);
        assert!(f.contains(Flags::Z));
    }

    #[test]
    fn daa_after_bcd_addition() {
        let (r, f) = daa(0x9A, Flags::empty());
        assert_eq!(r, 0x00);
        assert!(f.contains(Flags::C));
    }
}
