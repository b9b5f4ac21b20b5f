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
//! The Z80 disassembler (spec §4.8). Shares the same prefix/opcode decomposition the
//! interpreter uses (`xxyyyzzz`), so every opcode the CPU can execute has a matching mnemonic
//! here; there is no separate hand-maintained 256-row table to fall out of sync.
use bitflags::bitflags;

use crate::z80::tables::{OpcodeFields, Prefix, ALU_NAMES, CC_NAMES, R_NAMES, ROT_NAMES, RP2_NAMES, RP_NAMES};

bitflags! {
    /// Per-instruction traits the step-over/step-out logic and the UI need (spec §3 "Decoded
    /// instruction" flags bitset).
    pub struct InstrFlags: u16 {
        const PREFIX    = 0b0000_0001;
        const SKIPPABLE = 0b0000_0010;
        const REL_JUMP  = 0b0000_0100;
        const MEM_BYTE  = 0b0000_1000;
        const MEM_WORD  = 0b0001_0000;
        const MEM_ADDR  = 0b0010_0000;
        const CONDITION = 0b0100_0000;
        const VAR_T     = 0b1000_0000;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub mnemonic: String,
    pub length: u8,
    pub cycles_unconditional: u8,
    pub cycles_taken: u8,
    pub cycles_not_taken: u8,
    pub flags: InstrFlags,
    pub jump_target: Option<u16>,
}

/// `z == 6` (`(hl)`/`(ix+d)`/`(iy+d)`) is always handled by `operand_for` before this is called.
fn r_name(prefix: Prefix, z: u8) -> String {
    match (prefix, z) {
        (Prefix::Dd, 4) => "ixh".into(),
        (Prefix::Dd, 5) => "ixl".into(),
        (Prefix::Fd, 4) => "iyh".into(),
        (Prefix::Fd, 5) => "iyl".into(),
        _ => R_NAMES[z as usize].to_lowercase(),
    }
}

fn rp_name(prefix: Prefix, p: u8) -> String {
    if p == 2 {
        match prefix {
            Prefix::Dd => return "ix".into(),
            Prefix::Fd => return "iy".into(),
            _ => {}
        }
    }
    RP_NAMES[p as usize].to_lowercase()
}

/// Decodes one instruction starting at `buf[0]`. `buf` must contain enough trailing bytes for
/// the longest possible encoding (4) or decoding simply stops early with a shorter `length`.
pub fn decode(buf: &[u8]) -> DecodedInstruction {
    let mut pos = 0usize;
    let mut prefix = Prefix::None;
    loop {
        match buf.get(pos) {
            Some(0xDD) => { prefix = Prefix::Dd; pos += 1; }
            Some(0xFD) => { prefix = Prefix::Fd; pos += 1; }
            _ => break,
        }
    }
    let opcode = *buf.get(pos).unwrap_or(&0x00);
    pos += 1;
    match opcode {
        0xCB => decode_cb(buf, pos, prefix),
        0xED => decode_ed(buf, pos),
        _ => decode_base(buf, pos, prefix, opcode),
    }
}

fn byte_at(buf: &[u8], pos: usize) -> u8 { *buf.get(pos).unwrap_or(&0) }
fn word_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([byte_at(buf, pos), byte_at(buf, pos + 1)])
}

fn basic(mnemonic: impl Into<String>, length: u8, t: u8) -> DecodedInstruction {
    DecodedInstruction {
        mnemonic: mnemonic.into(),
        length,
        cycles_unconditional: t,
        cycles_taken: t,
        cycles_not_taken: t,
        flags: InstrFlags::empty(),
        jump_target: None,
    }
}

fn decode_base(buf: &[u8], mut pos: usize, prefix: Prefix, opcode: u8) -> DecodedInstruction {
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::decompose(opcode);
    let base_len = pos as u8; // opcode bytes consumed so far (prefix + opcode)
    match (x, z) {
        (0, 0) if y == 0 => basic("nop", base_len, 4),
        (0, 0) if y == 1 => basic("ex af,af'", base_len, 4),
        (0, 0) if y == 2 => {
            let d = byte_at(buf, pos) as i8;
            pos += 1;
            let mut i = basic(format!("djnz {}", signed_hex(d)), pos as u8, 13);
            i.cycles_not_taken = 8;
            i.flags = InstrFlags::REL_JUMP | InstrFlags::CONDITION | InstrFlags::VAR_T;
            i
        }
        (0, 0) if y == 3 => {
            let d = byte_at(buf, pos) as i8;
            pos += 1;
            let mut i = basic(format!("jr {}", signed_hex(d)), pos as u8, 12);
            i.flags = InstrFlags::REL_JUMP;
            i
        }
        (0, 0) => {
            let d = byte_at(buf, pos) as i8;
            pos += 1;
            let cc = CC_NAMES[(y - 4) as usize].to_lowercase();
            let mut i = basic(format!("jr {},{}", cc, signed_hex(d)), pos as u8, 12);
            i.cycles_not_taken = 7;
            i.flags = InstrFlags::REL_JUMP | InstrFlags::CONDITION | InstrFlags::VAR_T;
            i
        }
        (0, 1) if q == 0 => {
            let nn = word_at(buf, pos);
            pos += 2;
            basic(format!("ld {},#{:04x}", rp_name(prefix, p), nn), pos as u8, 10)
        }
        (0, 1) => basic(format!("add {},{}", rp_name(prefix, 2), rp_name(prefix, p)), base_len, 11),
        (0, 2) => match (p, q) {
            (0, 0) => basic("ld (bc),a", base_len, 7),
            (0, 1) => basic("ld a,(bc)", base_len, 7),
            (1, 0) => basic("ld (de),a", base_len, 7),
            (1, 1) => basic("ld a,(de)", base_len, 7),
            (2, 0) => { let nn = word_at(buf, pos); pos += 2; basic(format!("ld (#{:04x}),{}", nn, rp_name(prefix, 2)), pos as u8, 16) }
            (2, 1) => { let nn = word_at(buf, pos); pos += 2; basic(format!("ld {},(#{:04x})", rp_name(prefix, 2), nn), pos as u8, 16) }
            (3, 0) => { let nn = word_at(buf, pos); pos += 2; basic(format!("ld (#{:04x}),a", nn), pos as u8, 13) }
            (3, 1) => { let nn = word_at(buf, pos); pos += 2; basic(format!("ld a,(#{:04x})", nn), pos as u8, 13) }
            _ => unreachable!(),
        },
        (0, 3) => basic(format!("{} {}", if q == 0 { "inc" } else { "dec" }, rp_name(prefix, p)), base_len, 6),
        (0, 4) | (0, 5) => {
            let mnemonic = if x == 0 && z == 4 { "inc" } else { "dec" };
            let (operand, extra) = operand_for(buf, pos, prefix, y);
            pos += extra;
            basic(format!("{} {}", mnemonic, operand), pos as u8, if y == 6 { 11 } else { 4 })
        }
        (0, 6) => {
            let (operand, extra) = operand_for(buf, pos, prefix, y);
            pos += extra;
            let n = byte_at(buf, pos);
            pos += 1;
            basic(format!("ld {},#{:02x}", operand, n), pos as u8, if y == 6 { 10 } else { 7 })
        }
        (0, 7) => {
            let names = ["rlca", "rrca", "rla", "rra", "daa", "cpl", "scf", "ccf"];
            basic(names[y as usize], base_len, 4)
        }
        (1, _) if z == 6 && y == 6 => basic("halt", base_len, 4),
        (1, _) => {
            let (dst, extra1) = operand_for(buf, pos, prefix, y);
            let mut p2 = pos + extra1;
            let (src, extra2) = operand_for(buf, p2, prefix, z);
            p2 += extra2;
            basic(format!("ld {},{}", dst, src), p2 as u8, if y == 6 || z == 6 { 7 } else { 4 })
        }
        (2, _) => {
            let (operand, extra) = operand_for(buf, pos, prefix, z);
            pos += extra;
            basic(format!("{} {}", ALU_NAMES[y as usize].to_lowercase().trim_end_matches("a,"), operand).replace("  ", " "), pos as u8, if z == 6 { 7 } else { 4 })
        }
        (3, 0) => { let cc = CC_NAMES[y as usize].to_lowercase(); let mut i = basic(format!("ret {}", cc), base_len, 11); i.cycles_not_taken = 5; i.flags = InstrFlags::CONDITION | InstrFlags::VAR_T; i }
        (3, 1) if q == 0 => basic(format!("pop {}", if p == 3 { "af".into() } else { rp_name(prefix, p) }), base_len, 10),
        (3, 1) => match p {
            0 => { let mut i = basic("ret", base_len, 10); i.flags = InstrFlags::SKIPPABLE; i }
            1 => basic("exx", base_len, 4),
            2 => { let mut i = basic(format!("jp ({})", rp_name(prefix, 2)), base_len, 4); i.flags = InstrFlags::SKIPPABLE; i }
            3 => basic(format!("ld sp,{}", rp_name(prefix, 2)), base_len, 6),
            _ => unreachable!(),
        },
        (3, 2) => { let nn = word_at(buf, pos); pos += 2; let cc = CC_NAMES[y as usize].to_lowercase(); let mut i = basic(format!("jp {},#{:04x}", cc, nn), pos as u8, 10); i.flags = InstrFlags::CONDITION; i.jump_target = Some(nn); i }
        (3, 3) => match y {
            0 => { let nn = word_at(buf, pos); pos += 2; let mut i = basic(format!("jp #{:04x}", nn), pos as u8, 10); i.jump_target = Some(nn); i }
            // opcode 0xCB is intercepted by `decode` before reaching here.
            1 => unreachable!("0xCB handled by decode()"),
            2 => { let n = byte_at(buf, pos); pos += 1; basic(format!("out (#{:02x}),a", n), pos as u8, 11) }
            3 => { let n = byte_at(buf, pos); pos += 1; basic(format!("in a,(#{:02x})", n), pos as u8, 11) }
            4 => basic(format!("ex (sp),{}", rp_name(prefix, 2)), base_len, 19),
            5 => basic("ex de,hl", base_len, 4),
            6 => basic("di", base_len, 4),
            7 => basic("ei", base_len, 4),
            _ => unreachable!(),
        },
        (3, 4) => { let nn = word_at(buf, pos); pos += 2; let cc = CC_NAMES[y as usize].to_lowercase(); let mut i = basic(format!("call {},#{:04x}", cc, nn), pos as u8, 17); i.cycles_not_taken = 10; i.flags = InstrFlags::CONDITION | InstrFlags::VAR_T; i.jump_target = Some(nn); i }
        (3, 5) if q == 0 => basic(format!("push {}", if p == 3 { "af".into() } else { rp_name(prefix, p) }), base_len, 11),
        (3, 5) => { let nn = word_at(buf, pos); pos += 2; let mut i = basic(format!("call #{:04x}", nn), pos as u8, 17); i.jump_target = Some(nn); i }
        (3, 6) => { let n = byte_at(buf, pos); pos += 1; basic(format!("{} #{:02x}", ALU_NAMES[y as usize].to_lowercase().trim_end_matches("a,"), n), pos as u8, 7) }
        (3, 7) => basic(format!("rst #{:02x}", y * 8), base_len, 11),
        _ => basic("?", base_len, 4),
    }
}

/// Returns the mnemonic-ready operand text for register/prefix-aware operand `z`, and how many
/// extra bytes (beyond the opcode) it consumed (a displacement byte for `(ix+d)`/`(iy+d)`).
fn operand_for(buf: &[u8], pos: usize, prefix: Prefix, z: u8) -> (String, usize) {
    if z == 6 && matches!(prefix, Prefix::Dd | Prefix::Fd) {
        let d = byte_at(buf, pos) as i8;
        let reg = if prefix == Prefix::Dd { "ix" } else { "iy" };
        (format!("({}{})", reg, signed_hex(d)), 1)
    } else {
        (r_name(prefix, z), 0)
    }
}

/// Renders a signed displacement in traditional Z80 assembler notation: `+#10` / `-#05`.
fn signed_hex(d: i8) -> String {
    if d < 0 {
        format!("-#{:02x}", d.unsigned_abs())
    } else {
        format!("+#{:02x}", d)
    }
}

fn decode_cb(buf: &[u8], pos: usize, prefix: Prefix) -> DecodedInstruction {
    if matches!(prefix, Prefix::Dd | Prefix::Fd) {
        // DD CB disp op / FD CB disp op: displacement precedes the CB sub-opcode.
        let disp = byte_at(buf, pos) as i8;
        let sub = byte_at(buf, pos + 1);
        let OpcodeFields { x, y, .. } = OpcodeFields::decompose(sub);
        let reg = if prefix == Prefix::Dd { "ix" } else { "iy" };
        let addr = format!("({}{})", reg, signed_hex(disp));
        let mnemonic = match x {
            0 => format!("{} {}", ROT_NAMES[y as usize].to_lowercase(), addr),
            1 => format!("bit {},{}", y, addr),
            2 => format!("res {},{}", y, addr),
            3 => format!("set {},{}", y, addr),
            _ => unreachable!(),
        };
        basic(mnemonic, (pos + 2) as u8, if x == 1 { 20 } else { 23 })
    } else {
        let sub = byte_at(buf, pos);
        let OpcodeFields { x, y, z, .. } = OpcodeFields::decompose(sub);
        let operand = r_name(Prefix::None, z);
        let mnemonic = match x {
            0 => format!("{} {}", ROT_NAMES[y as usize].to_lowercase(), operand),
            1 => format!("bit {},{}", y, operand),
            2 => format!("res {},{}", y, operand),
            3 => format!("set {},{}", y, operand),
            _ => unreachable!(),
        };
        basic(mnemonic, (pos + 1) as u8, if z == 6 { if x == 1 { 12 } else { 15 } } else { 8 })
    }
}

fn decode_ed(buf: &[u8], mut pos: usize) -> DecodedInstruction {
    let opcode = byte_at(buf, pos);
    pos += 1;
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::decompose(opcode);
    let base_len = pos as u8;
    match (x, z) {
        (1, 0) if y == 6 => basic("in (c)", base_len, 12),
        (1, 0) => basic(format!("in {},(c)", R_NAMES[y as usize].to_lowercase()), base_len, 12),
        (1, 1) if y == 6 => basic("out (c),0", base_len, 12),
        (1, 1) => basic(format!("out (c),{}", R_NAMES[y as usize].to_lowercase()), base_len, 12),
        (1, 2) => basic(format!("{} hl,{}", if q == 0 { "sbc" } else { "adc" }, RP_NAMES[p as usize].to_lowercase()), base_len, 15),
        (1, 3) => {
            let nn = word_at(buf, pos);
            pos += 2;
            if q == 0 {
                basic(format!("ld (#{:04x}),{}", nn, RP_NAMES[p as usize].to_lowercase()), pos as u8, 20)
            } else {
                basic(format!("ld {},(#{:04x})", RP_NAMES[p as usize].to_lowercase(), nn), pos as u8, 20)
            }
        }
        (1, 4) => basic("neg", base_len, 8),
        (1, 5) => basic(if y == 0 { "retn" } else { "reti" }, base_len, 14),
        (1, 6) => basic(format!("im {}", match y & 0b11 { 0 | 1 => 0, 2 => 1, _ => 2 }), base_len, 8),
        (1, 7) => {
            let names = ["ld i,a", "ld r,a", "ld a,i", "ld a,r", "rrd", "rld", "nop", "nop"];
            basic(names[y as usize], base_len, if y >= 4 && y <= 5 { 18 } else { 9 })
        }
        (2, _) if y >= 4 => {
            let names: [[&str; 4]; 4] = [
                ["ldi", "ldd", "ldir", "lddr"],
                ["cpi", "cpd", "cpir", "cpdr"],
                ["ini", "ind", "inir", "indr"],
                ["outi", "outd", "otir", "otdr"],
            ];
            let family = z as usize;
            let decrement = (y & 1) != 0;
            let repeat = y >= 6;
            let idx = match (decrement, repeat) {
                (false, false) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (true, true) => 3,
            };
            let mnemonic = names[family][idx];
            let mut i = basic(mnemonic, base_len, if repeat { 21 } else { 16 });
            if repeat { i.cycles_not_taken = 16; i.flags = InstrFlags::VAR_T; }
            i
        }
        _ => basic("nop", base_len, 8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cb_47_is_bit_0_a() {
        let d = decode(&[0xCB, 0x47]);
        assert_eq!(d.mnemonic, "bit 0,a");
        assert_eq!(d.length, 2);
    }

    #[test]
    fn ddcb_10_46_is_bit_0_ix_plus_16() {
        let d = decode(&[0xDD, 0xCB, 0x10, 0x46]);
        assert_eq!(d.mnemonic, "bit 0,(ix+#10)");
        assert_eq!(d.length, 4);
    }

    #[test]
    fn ed_b0_is_ldir() {
        let d = decode(&[0xED, 0xB0]);
        assert_eq!(d.mnemonic, "ldir");
        assert_eq!(d.cycles_taken, 21);
        assert_eq!(d.cycles_not_taken, 16);
    }

    #[test]
    fn nop_is_one_byte() {
        let d = decode(&[0x00]);
        assert_eq!(d.mnemonic, "nop");
        assert_eq!(d.length, 1);
    }

    #[test]
    fn jp_nn_captures_jump_target() {
        let d = decode(&[0xC3, 0x34, 0x12]);
        assert_eq!(d.mnemonic, "jp #1234");
        assert_eq!(d.jump_target, Some(0x1234));
    }
}
