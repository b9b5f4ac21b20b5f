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
//! Opcode decode and execution (spec §4.3 "Decoded instruction", §3 "Z80 register file").
//!
//! Every opcode byte decomposes as `xxyyyzzz` (`yyy` further splits into `ppq`); dispatch reads
//! those fields off the byte rather than indexing 256 hand-written closures per prefix table.
use super::alu;
use super::bus::Bus;
use super::regs::{Flags, IntMode, Registers};
use super::tables::OpcodeFields;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Idx { Hl, Ix, Iy }

impl Idx {
    fn get(self, regs: &Registers) -> u16 {
        match self {
            Idx::Hl => regs.hl.0,
            Idx::Ix => regs.ix,
            Idx::Iy => regs.iy,
        }
    }
    fn set(self, regs: &mut Registers, v: u16) {
        match self {
            Idx::Hl => regs.hl.0 = v,
            Idx::Ix => regs.ix = v,
            Idx::Iy => regs.iy = v,
        }
    }
}

/// Runs one instruction (including any `DD`/`FD`/`DD CB`/`FD CB` prefix chain) and returns the
/// number of T-states it consumed. Interrupt acceptance is the caller's job (see `irq.rs`).
pub fn step<B: Bus>(regs: &mut Registers, bus: &mut B) -> i32 {
    let t0 = regs.t;
    if regs.halted {
        regs.bump_r();
        bus.tick(4);
        regs.t += 4;
        return regs.t - t0;
    }

    let mut idx = Idx::Hl;
    let mut opcode = fetch_opcode(regs, bus);
    loop {
        match opcode {
            0xDD => { idx = Idx::Ix; opcode = fetch_opcode(regs, bus); }
            0xFD => { idx = Idx::Iy; opcode = fetch_opcode(regs, bus); }
            _ => break,
        }
    }

    match opcode {
        0xCB if idx == Idx::Hl => exec_cb(regs, bus, Idx::Hl, None),
        0xCB => {
            let disp = fetch8(regs, bus) as i8;
            let sub = fetch_opcode(regs, bus);
            exec_cb_indexed(regs, bus, idx, disp, sub);
        }
        0xED => exec_ed(regs, bus, idx),
        _ => exec_base(regs, bus, idx, opcode),
    }

    regs.t - t0
}

fn fetch_opcode<B: Bus>(regs: &mut Registers, bus: &mut B) -> u8 {
    let pc = regs.pc;
    let v = bus.mem_fetch(pc);
    regs.pc = pc.wrapping_add(1);
    regs.bump_r();
    bus.tick(4);
    regs.t += 4;
    v
}

fn fetch8<B: Bus>(regs: &mut Registers, bus: &mut B) -> u8 {
    let pc = regs.pc;
    let v = bus.mem_read(pc);
    regs.pc = pc.wrapping_add(1);
    bus.tick(3);
    regs.t += 3;
    v
}

fn fetch16<B: Bus>(regs: &mut Registers, bus: &mut B) -> u16 {
    let lo = fetch8(regs, bus);
    let hi = fetch8(regs, bus);
    u16::from_le_bytes([lo, hi])
}

fn read8<B: Bus>(regs: &mut Registers, bus: &mut B, addr: u16) -> u8 {
    let v = bus.mem_read(addr);
    bus.tick(3);
    regs.t += 3;
    v
}

fn write8<B: Bus>(regs: &mut Registers, bus: &mut B, addr: u16, v: u8) {
    bus.mem_write(addr, v);
    bus.tick(3);
    regs.t += 3;
}

fn push16<B: Bus>(regs: &mut Registers, bus: &mut B, v: u16) {
    let [lo, hi] = v.to_le_bytes();
    regs.sp = regs.sp.wrapping_sub(1);
    write8(regs, bus, regs.sp, hi);
    regs.sp = regs.sp.wrapping_sub(1);
    write8(regs, bus, regs.sp, lo);
}

fn pop16<B: Bus>(regs: &mut Registers, bus: &mut B) -> u16 {
    let lo = read8(regs, bus, regs.sp);
    regs.sp = regs.sp.wrapping_add(1);
    let hi = read8(regs, bus, regs.sp);
    regs.sp = regs.sp.wrapping_add(1);
    u16::from_le_bytes([lo, hi])
}

fn internal<B: Bus>(regs: &mut Registers, bus: &mut B, cycles: i32) {
    bus.tick(cycles);
    regs.t += cycles;
}

/// Resolves operand `z` (register or `(HL)`/`(IX+d)`/`(IY+d)`) for read, consuming the extra
/// displacement fetch and internal delay an indexed `(HL)` substitute costs.
fn read_r<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx, z: u8) -> u8 {
    if z == 6 {
        let addr = effective_hl(regs, bus, idx);
        return read8(regs, bus, addr);
    }
    read_reg8(regs, idx, z)
}

fn write_r<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx, z: u8, v: u8) {
    if z == 6 {
        let addr = effective_hl(regs, bus, idx);
        write8(regs, bus, addr, v);
        return;
    }
    write_reg8(regs, idx, z, v);
}

/// `(HL)`/`(IX+d)`/`(IY+d)` effective address, fetching and consuming the displacement byte
/// (plus 5 T-states of index-arithmetic) when `idx` is `IX`/`IY`.
fn effective_hl<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx) -> u16 {
    match idx {
        Idx::Hl => regs.hl.0,
        Idx::Ix | Idx::Iy => {
            let disp = fetch8(regs, bus) as i8 as i16;
            internal(regs, bus, 5);
            idx.get(regs).wrapping_add(disp as u16)
        }
    }
}

fn read_reg8(regs: &Registers, idx: Idx, z: u8) -> u8 {
    match (idx, z) {
        (_, 0) => regs.b(),
        (_, 1) => regs.c(),
        (_, 2) => regs.d(),
        (_, 3) => regs.e(),
        (Idx::Hl, 4) => regs.h(),
        (Idx::Hl, 5) => regs.l(),
        (Idx::Ix, 4) => (regs.ix >> 8) as u8,
        (Idx::Ix, 5) => (regs.ix & 0xFF) as u8,
        (Idx::Iy, 4) => (regs.iy >> 8) as u8,
        (Idx::Iy, 5) => (regs.iy & 0xFF) as u8,
        (_, 7) => regs.a(),
        _ => unreachable!("z=6 handled by caller"),
    }
}

fn write_reg8(regs: &mut Registers, idx: Idx, z: u8, v: u8) {
    match (idx, z) {
        (_, 0) => regs.set_b(v),
        (_, 1) => regs.set_c(v),
        (_, 2) => regs.set_d(v),
        (_, 3) => regs.set_e(v),
        (Idx::Hl, 4) => regs.set_h(v),
        (Idx::Hl, 5) => regs.set_l(v),
        (Idx::Ix, 4) => regs.ix = (regs.ix & 0x00FF) | ((v as u16) << 8),
        (Idx::Ix, 5) => regs.ix = (regs.ix & 0xFF00) | v as u16,
        (Idx::Iy, 4) => regs.iy = (regs.iy & 0x00FF) | ((v as u16) << 8),
        (Idx::Iy, 5) => regs.iy = (regs.iy & 0xFF00) | v as u16,
        (_, 7) => regs.set_a(v),
        _ => unreachable!("z=6 handled by caller"),
    }
}

fn read_rp(regs: &Registers, idx: Idx, p: u8) -> u16 {
    match p {
        0 => regs.bc.0,
        1 => regs.de.0,
        2 => idx.get(regs),
        3 => regs.sp,
        _ => unreachable!(),
    }
}

fn write_rp(regs: &mut Registers, idx: Idx, p: u8, v: u16) {
    match p {
        0 => regs.bc.0 = v,
        1 => regs.de.0 = v,
        2 => idx.set(regs, v),
        3 => regs.sp = v,
        _ => unreachable!(),
    }
}

fn test_cc(regs: &Registers, cc: u8) -> bool {
    let f = regs.f();
    match cc {
        0 => !f.contains(Flags::Z),
        1 => f.contains(Flags::Z),
        2 => !f.contains(Flags::C),
        3 => f.contains(Flags::C),
        4 => !f.contains(Flags::PV),
        5 => f.contains(Flags::PV),
        6 => !f.contains(Flags::S),
        7 => f.contains(Flags::S),
        _ => unreachable!(),
    }
}

fn apply_alu(regs: &mut Registers, y: u8, operand: u8) {
    let a = regs.a();
    let carry = regs.f().contains(Flags::C);
    let (result, flags) = match y {
        0 => alu::add8(a, operand, false),
        1 => alu::add8(a, operand, carry),
        2 => alu::sub8(a, operand, false),
        3 => alu::sub8(a, operand, carry),
        4 => alu::and8(a, operand),
        5 => alu::xor8(a, operand),
        6 => alu::or8(a, operand),
        7 => {
            let (_, f) = alu::sub8(a, operand, false);
            regs.set_f(f);
            return;
        }
        _ => unreachable!(),
    };
    regs.set_a(result);
    regs.set_f(flags);
}

fn exec_base<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx, opcode: u8) {
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::decompose(opcode);
    match (x, z) {
        (0, 0) => match y {
            0 => {}
            1 => regs.ex_af_af(),
            2 => {
                let d = fetch8(regs, bus) as i8;
                internal(regs, bus, 1);
                let b = regs.b().wrapping_sub(1);
                regs.set_b(b);
                if b != 0 { regs.pc = regs.pc.wrapping_add(d as u16); internal(regs, bus, 5); }
            }
            3 => {
                let d = fetch8(regs, bus) as i8;
                regs.pc = regs.pc.wrapping_add(d as u16);
                internal(regs, bus, 5);
            }
            4..=7 => {
                let d = fetch8(regs, bus) as i8;
                if test_cc(regs, y - 4) {
                    regs.pc = regs.pc.wrapping_add(d as u16);
                    internal(regs, bus, 5);
                }
            }
            _ => unreachable!(),
        },
        (0, 1) => {
            if q == 0 {
                let nn = fetch16(regs, bus);
                write_rp(regs, idx, p, nn);
            } else {
                let (r, f) = alu::add16(read_rp(regs, idx, p), idx.get(regs));
                idx.set(regs, r);
                let preserved = regs.f() & (Flags::S | Flags::Z | Flags::PV);
                regs.set_f(f | preserved);
                internal(regs, bus, 7);
            }
        }
        (0, 2) => {
            match (p, q) {
                (0, 0) => { let a = regs.a(); write8(regs, bus, regs.bc.0, a); }
                (0, 1) => { let v = read8(regs, bus, regs.bc.0); regs.set_a(v); }
                (1, 0) => { let a = regs.a(); write8(regs, bus, regs.de.0, a); }
                (1, 1) => { let v = read8(regs, bus, regs.de.0); regs.set_a(v); }
                (2, 0) => {
                    let nn = fetch16(regs, bus);
                    let v = idx.get(regs);
                    write8(regs, bus, nn, v as u8);
                    write8(regs, bus, nn.wrapping_add(1), (v >> 8) as u8);
                }
                (2, 1) => {
                    let nn = fetch16(regs, bus);
                    let lo = read8(regs, bus, nn);
                    let hi = read8(regs, bus, nn.wrapping_add(1));
                    idx.set(regs, u16::from_le_bytes([lo, hi]));
                }
                (3, 0) => {
                    let nn = fetch16(regs, bus);
                    let a = regs.a();
                    write8(regs, bus, nn, a);
                }
                (3, 1) => {
                    let nn = fetch16(regs, bus);
                    let v = read8(regs, bus, nn);
                    regs.set_a(v);
                }
                _ => unreachable!(),
            }
        }
        (0, 3) => {
            let cur = read_rp(regs, idx, p);
            let next = if q == 0 { cur.wrapping_add(1) } else { cur.wrapping_sub(1) };
            write_rp(regs, idx, p, next);
            internal(regs, bus, 2);
        }
        (0, 4) => {
            let v = read_r(regs, bus, idx, y);
            let (r, f, _) = alu::inc8(v);
            let preserved = regs.f() & Flags::C;
            regs.set_f(f | preserved);
            write_r(regs, bus, idx, y, r);
        }
        (0, 5) => {
            let v = read_r(regs, bus, idx, y);
            let (r, f, _) = alu::dec8(v);
            let preserved = regs.f() & Flags::C;
            regs.set_f(f | preserved);
            write_r(regs, bus, idx, y, r);
        }
        (0, 6) => {
            let n = fetch8(regs, bus);
            write_r(regs, bus, idx, y, n);
        }
        (0, 7) => exec_accumulator_misc(regs, y),
        (1, _) if z == 6 && y == 6 => { regs.halted = true; }
        (1, _) => {
            let v = read_r(regs, bus, idx, z);
            write_r(regs, bus, idx, y, v);
        }
        (2, _) => {
            let v = read_r(regs, bus, idx, z);
            apply_alu(regs, y, v);
        }
        (3, 0) => {
            internal(regs, bus, 1);
            if test_cc(regs, y) {
                regs.pc = pop16(regs, bus);
            }
        }
        (3, 1) if q == 0 => {
            let v = pop16(regs, bus);
            if p == 3 { regs.af.0 = v; } else { write_rp(regs, idx, p, v); }
        }
        (3, 1) => match p {
            0 => regs.pc = pop16(regs, bus),
            1 => { regs.exx(); }
            2 => regs.pc = idx.get(regs),
            3 => regs.sp = idx.get(regs),
            _ => unreachable!(),
        },
        (3, 2) => {
            let nn = fetch16(regs, bus);
            if test_cc(regs, y) { regs.pc = nn; }
        }
        (3, 3) => match y {
            0 => regs.pc = fetch16(regs, bus),
            1 => exec_cb(regs, bus, idx, None),
            2 => { let n = fetch8(regs, bus); let a = regs.a(); bus.io_write(((a as u16) << 8) | n as u16, a); }
            3 => { let n = fetch8(regs, bus); let a = regs.a(); let v = bus.io_read(((a as u16) << 8) | n as u16); regs.set_a(v); }
            4 => {
                let sp = regs.sp;
                let lo = read8(regs, bus, sp);
                let hi = read8(regs, bus, sp.wrapping_add(1));
                let old = idx.get(regs);
                write8(regs, bus, sp.wrapping_add(1), (old >> 8) as u8);
                write8(regs, bus, sp, old as u8);
                idx.set(regs, u16::from_le_bytes([lo, hi]));
                internal(regs, bus, 2);
            }
            5 => { let hl = regs.hl.0; regs.hl.0 = regs.de.0; regs.de.0 = hl; }
            6 => { regs.iff1 = false; regs.iff2 = false; }
            7 => { regs.iff1 = true; regs.iff2 = true; regs.eipos = regs.t; }
            _ => unreachable!(),
        },
        (3, 4) => {
            let nn = fetch16(regs, bus);
            if test_cc(regs, y) {
                internal(regs, bus, 1);
                let pc = regs.pc;
                push16(regs, bus, pc);
                regs.pc = nn;
            }
        }
        (3, 5) if q == 0 => {
            internal(regs, bus, 1);
            let v = if p == 3 { regs.af.0 } else { read_rp(regs, idx, p) };
            push16(regs, bus, v);
        }
        (3, 5) => {
            internal(regs, bus, 1);
            let nn = fetch16(regs, bus);
            let pc = regs.pc;
            push16(regs, bus, pc);
            regs.pc = nn;
        }
        (3, 6) => {
            let n = fetch8(regs, bus);
            apply_alu(regs, y, n);
        }
        (3, 7) => {
            internal(regs, bus, 1);
            let pc = regs.pc;
            push16(regs, bus, pc);
            regs.pc = (y as u16) * 8;
        }
        _ => {}
    }
}

fn exec_accumulator_misc(regs: &mut Registers, y: u8) {
    let a = regs.a();
    let preserved = regs.f() & (Flags::S | Flags::Z | Flags::PV);
    match y {
        0 => { let (r, f) = alu::rlc(a); regs.set_a(r); regs.set_f((f & !(Flags::S | Flags::Z | Flags::PV)) | preserved); }
        1 => { let (r, f) = alu::rrc(a); regs.set_a(r); regs.set_f((f & !(Flags::S | Flags::Z | Flags::PV)) | preserved); }
        2 => { let c = regs.f().contains(Flags::C); let (r, f) = alu::rl(a, c); regs.set_a(r); regs.set_f((f & !(Flags::S | Flags::Z | Flags::PV)) | preserved); }
        3 => { let c = regs.f().contains(Flags::C); let (r, f) = alu::rr(a, c); regs.set_a(r); regs.set_f((f & !(Flags::S | Flags::Z | Flags::PV)) | preserved); }
        4 => { let (r, f) = alu::daa(a, regs.f()); regs.set_a(r); regs.set_f(f); }
        5 => {
            let r = !a;
            regs.set_a(r);
            let mut f = regs.f();
            f |= Flags::H | Flags::N;
            f &= !(Flags::X | Flags::Y);
            f |= Flags::from_bits_truncate(r & (Flags::X.bits() | Flags::Y.bits()));
            regs.set_f(f);
        }
        6 => {
            let mut f = regs.f();
            f &= !(Flags::H | Flags::N | Flags::X | Flags::Y);
            f |= Flags::C;
            f |= Flags::from_bits_truncate(a & (Flags::X.bits() | Flags::Y.bits()));
            regs.set_f(f);
        }
        7 => {
            let mut f = regs.f();
            let c = f.contains(Flags::C);
            f &= !(Flags::N | Flags::X | Flags::Y);
            if c { f |= Flags::H; } else { f.remove(Flags::H); }
            f.set(Flags::C, !c);
            f |= Flags::from_bits_truncate(a & (Flags::X.bits() | Flags::Y.bits()));
            regs.set_f(f);
        }
        _ => unreachable!(),
    }
}

fn exec_cb<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx, _unused: Option<()>) {
    let opcode = fetch_opcode(regs, bus);
    let OpcodeFields { x, y, z, .. } = OpcodeFields::decompose(opcode);
    let v = read_r(regs, bus, idx, z);
    match x {
        0 => {
            let carry_in = regs.f().contains(Flags::C);
            let (r, f) = rot_shift(y, v, carry_in);
            regs.set_f(f);
            write_r(regs, bus, idx, z, r);
        }
        1 => {
            let preserved = regs.f() & Flags::C;
            let f = alu::bit(y, v, v) | preserved;
            regs.set_f(f);
        }
        2 => { let r = v & !(1 << y); write_r(regs, bus, idx, z, r); }
        3 => { let r = v | (1 << y); write_r(regs, bus, idx, z, r); }
        _ => unreachable!(),
    }
}

/// `DD CB disp op` / `FD CB disp op`: the displacement was already consumed by the caller, the
/// operand is always `(IX+d)`/`(IY+d)`, and — undocumented but universally emulated — the
/// result is also copied into register `z` when `z != 6`.
fn exec_cb_indexed<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx, disp: i8, opcode: u8) {
    let addr = idx.get(regs).wrapping_add(disp as u16);
    internal(regs, bus, 2);
    let v = read8(regs, bus, addr);
    let OpcodeFields { x, y, z, .. } = OpcodeFields::decompose(opcode);
    match x {
        0 => {
            let carry_in = regs.f().contains(Flags::C);
            let (r, f) = rot_shift(y, v, carry_in);
            regs.set_f(f);
            write8(regs, bus, addr, r);
            if z != 6 { write_reg8(regs, Idx::Hl, z, r); }
        }
        1 => {
            let preserved = regs.f() & Flags::C;
            let f = alu::bit(y, v, (addr >> 8) as u8) | preserved;
            regs.set_f(f);
            internal(regs, bus, 1);
        }
        2 => {
            let r = v & !(1 << y);
            write8(regs, bus, addr, r);
            if z != 6 { write_reg8(regs, Idx::Hl, z, r); }
        }
        3 => {
            let r = v | (1 << y);
            write8(regs, bus, addr, r);
            if z != 6 { write_reg8(regs, Idx::Hl, z, r); }
        }
        _ => unreachable!(),
    }
}

fn rot_shift(y: u8, v: u8, carry_in: bool) -> (u8, Flags) {
    match y {
        0 => alu::rlc(v),
        1 => alu::rrc(v),
        2 => alu::rl(v, carry_in),
        3 => alu::rr(v, carry_in),
        4 => alu::sla(v),
        5 => alu::sra(v),
        6 => alu::sll(v),
        7 => alu::srl(v),
        _ => unreachable!(),
    }
}

fn exec_ed<B: Bus>(regs: &mut Registers, bus: &mut B, idx: Idx) {
    let _ = idx; // ED-prefixed instructions ignore any preceding DD/FD (undefined behavior on real hardware)
    let opcode = fetch_opcode(regs, bus);
    let OpcodeFields { x, y, z, p, q } = OpcodeFields::decompose(opcode);
    match (x, z) {
        (1, 0) => {
            let v = bus.io_read(regs.bc.0);
            if y != 6 { write_reg8(regs, Idx::Hl, y, v); }
            let mut f = alu::and8(v, v).1 & !(Flags::C);
            f.set(Flags::C, regs.f().contains(Flags::C));
            regs.set_f(f);
        }
        (1, 1) => {
            let v = if y == 6 { 0 } else { read_reg8(regs, Idx::Hl, y) };
            bus.io_write(regs.bc.0, v);
        }
        (1, 2) => {
            let rp = read_rp(regs, Idx::Hl, p);
            if q == 0 {
                let (r, f) = alu::sbc16(regs.hl.0, rp, regs.f().contains(Flags::C));
                regs.hl.0 = r;
                regs.set_f(f);
            } else {
                let (r, f) = alu::adc16(regs.hl.0, rp, regs.f().contains(Flags::C));
                regs.hl.0 = r;
                regs.set_f(f);
            }
            internal(regs, bus, 7);
        }
        (1, 3) => {
            let nn = fetch16(regs, bus);
            if q == 0 {
                let v = read_rp(regs, Idx::Hl, p);
                write8(regs, bus, nn, v as u8);
                write8(regs, bus, nn.wrapping_add(1), (v >> 8) as u8);
            } else {
                let lo = read8(regs, bus, nn);
                let hi = read8(regs, bus, nn.wrapping_add(1));
                write_rp(regs, Idx::Hl, p, u16::from_le_bytes([lo, hi]));
            }
        }
        (1, 4) => { let a = regs.a(); let (r, f) = alu::sub8(0, a, false); regs.set_a(r); regs.set_f(f); }
        (1, 5) => {
            regs.pc = pop16(regs, bus);
            if y == 0 { regs.iff1 = regs.iff2; }
        }
        (1, 6) => { regs.im = match y & 0b11 { 0 | 1 => IntMode::Im0, 2 => IntMode::Im1, _ => IntMode::Im2 }; }
        (1, 7) => exec_ed_misc(regs, bus, y),
        (2, 0..=3) if y >= 4 => exec_block(regs, bus, y, z),
        _ => {}
    }
}

fn exec_ed_misc<B: Bus>(regs: &mut Registers, bus: &mut B, y: u8) {
    match y {
        0 => { let i = regs.i; write8_a_from_special(regs, i); internal(regs, bus, 1); }
        1 => { let r = regs.r; write8_a_from_special(regs, r); internal(regs, bus, 1); }
        2 => { regs.i = regs.a(); internal(regs, bus, 1); }
        3 => { regs.r = regs.a(); internal(regs, bus, 1); }
        4 => {
            let a = regs.a();
            let hl = regs.hl.0;
            let m = read8(regs, bus, hl);
            let new_m = (m << 4) | (a & 0x0F);
            let new_a = (a & 0xF0) | (m >> 4);
            write8(regs, bus, hl, new_m);
            regs.set_a(new_a);
            let preserved = regs.f() & Flags::C;
            regs.set_f(alu::and8(new_a, new_a).1 & !Flags::H | preserved);
            internal(regs, bus, 4);
        }
        5 => {
            let a = regs.a();
            let hl = regs.hl.0;
            let m = read8(regs, bus, hl);
            let new_m = (m >> 4) | (a << 4);
            let new_a = (a & 0xF0) | (m & 0x0F);
            write8(regs, bus, hl, new_m);
            regs.set_a(new_a);
            let preserved = regs.f() & Flags::C;
            regs.set_f(alu::and8(new_a, new_a).1 & !Flags::H | preserved);
            internal(regs, bus, 4);
        }
        _ => {}
    }
}

fn write8_a_from_special(regs: &mut Registers, v: u8) {
    regs.set_a(v);
    let mut f = Flags::empty();
    if v == 0 { f |= Flags::Z; }
    if v & 0x80 != 0 { f |= Flags::S; }
    f |= Flags::from_bits_truncate(v & (Flags::X.bits() | Flags::Y.bits()));
    if regs.iff2 { f |= Flags::PV; }
    let preserved = regs.f() & Flags::C;
    regs.set_f(f | preserved);
}

/// LDI/LDD/LDIR/LDDR, CPI/CPD/CPIR/CPDR, INI/IND/INIR/INDR, OUTI/OUTD/OTIR/OTDR
/// (`y` selects the operation family, `z` selects increment-vs-decrement and repeat).
fn exec_block<B: Bus>(regs: &mut Registers, bus: &mut B, y: u8, z: u8) {
    let decrement = z & 0b10 != 0;
    let repeat = z & 0b01 != 0;
    let step: i16 = if decrement { -1 } else { 1 };
    match y {
        4 => { // LD family
            let v = read8(regs, bus, regs.hl.0);
            write8(regs, bus, regs.de.0, v);
            regs.hl.0 = regs.hl.0.wrapping_add(step as u16);
            regs.de.0 = regs.de.0.wrapping_add(step as u16);
            regs.bc.0 = regs.bc.0.wrapping_sub(1);
            let n = regs.a().wrapping_add(v);
            let mut f = regs.f() & (Flags::S | Flags::Z | Flags::C);
            if regs.bc.0 != 0 { f |= Flags::PV; }
            if n & 0x02 != 0 { f |= Flags::Y; }
            if n & 0x08 != 0 { f |= Flags::X; }
            regs.set_f(f);
            if repeat && regs.bc.0 != 0 {
                regs.pc = regs.pc.wrapping_sub(2);
                internal(regs, bus, 5);
            }
        }
        5 => { // CP family
            let v = read8(regs, bus, regs.hl.0);
            let a = regs.a();
            let (result, mut f) = alu::sub8(a, v, false);
            regs.hl.0 = regs.hl.0.wrapping_add(step as u16);
            regs.bc.0 = regs.bc.0.wrapping_sub(1);
            f.set(Flags::PV, regs.bc.0 != 0);
            let half = f.contains(Flags::H);
            let n = result.wrapping_sub(if half { 1 } else { 0 });
            f &= !(Flags::X | Flags::Y);
            if n & 0x02 != 0 { f |= Flags::Y; }
            if n & 0x08 != 0 { f |= Flags::X; }
            let preserved_c = regs.f() & Flags::C;
            regs.set_f(f | preserved_c);
            internal(regs, bus, 5);
            if repeat && regs.bc.0 != 0 && result != 0 {
                regs.pc = regs.pc.wrapping_sub(2);
                internal(regs, bus, 5);
            }
        }
        6 => { // IN family
            let v = bus.io_read(regs.bc.0);
            write8(regs, bus, regs.hl.0, v);
            regs.hl.0 = regs.hl.0.wrapping_add(step as u16);
            let b = regs.b().wrapping_sub(1);
            regs.set_b(b);
            let mut f = alu::and8(b, b).1;
            f.set(Flags::Z, b == 0);
            f |= Flags::N;
            regs.set_f(f);
            if repeat && b != 0 {
                regs.pc = regs.pc.wrapping_sub(2);
                internal(regs, bus, 5);
            }
        }
        7 => { // OUT family
            let v = read8(regs, bus, regs.hl.0);
            let b = regs.b().wrapping_sub(1);
            regs.set_b(b);
            bus.io_write(regs.bc.0, v);
            regs.hl.0 = regs.hl.0.wrapping_add(step as u16);
            let mut f = alu::and8(b, b).1;
            f.set(Flags::Z, b == 0);
            f |= Flags::N;
            regs.set_f(f);
            if repeat && b != 0 {
                regs.pc = regs.pc.wrapping_sub(2);
                internal(regs, bus, 5);
            }
        }
        _ => {}
    }
}
