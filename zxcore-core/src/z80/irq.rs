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
//! Maskable interrupt acceptance (spec §2 "ULA raises /INT once per frame", §4.3
//! "EI-deferral"). The ULA's single interrupt line is the only one this engine models — the
//! family never exposes a usable NMI to software running under these chipsets.
use super::bus::Bus;
use super::regs::{IntMode, Registers};

/// Checks the interrupt line and, if it should be serviced now, pushes PC and redirects
/// execution per the current interrupt mode. Returns the T-states the acknowledge cycle cost,
/// or 0 if no interrupt was accepted.
pub fn maybe_accept<B: Bus>(regs: &mut Registers, bus: &mut B) -> i32 {
    if !regs.iff1 || !bus.int_line() {
        return 0;
    }
    // An EI immediately followed by accepting the interrupt it enabled would re-enter the
    // handler before the one instruction EI is required to execute first.
    if regs.t <= regs.eipos {
        return 0;
    }
    regs.iff1 = false;
    regs.iff2 = false;
    if regs.halted {
        regs.halted = false;
        regs.pc = regs.pc.wrapping_add(1);
    }
    regs.bump_r();
    let t0 = regs.t;
    match regs.im {
        IntMode::Im0 => {
            // A real IM 0 machine expects the interrupting device to drive an instruction onto
            // the data bus; this family always drives `0xFF` (RST 38h) on that cycle.
            bus.tick(6);
            regs.t += 6;
            let pc = regs.pc;
            push(regs, bus, pc);
            regs.pc = 0x0038;
        }
        IntMode::Im1 => {
            bus.tick(7);
            regs.t += 7;
            let pc = regs.pc;
            push(regs, bus, pc);
            regs.pc = 0x0038;
        }
        IntMode::Im2 => {
            bus.tick(7);
            regs.t += 7;
            let vec_lo = bus.interrupt_data();
            let addr = ((regs.i as u16) << 8) | vec_lo as u16;
            let lo = bus.mem_read(addr);
            let hi = bus.mem_read(addr.wrapping_add(1));
            bus.tick(6);
            regs.t += 6;
            let pc = regs.pc;
            push(regs, bus, pc);
            regs.pc = u16::from_le_bytes([lo, hi]);
        }
    }
    regs.t - t0
}

fn push<B: Bus>(regs: &mut Registers, bus: &mut B, v: u16) {
    let [lo, hi] = v.to_le_bytes();
    regs.sp = regs.sp.wrapping_sub(1);
    bus.mem_write(regs.sp, hi);
    bus.tick(3);
    regs.t += 3;
    regs.sp = regs.sp.wrapping_sub(1);
    bus.mem_write(regs.sp, lo);
    bus.tick(3);
    regs.t += 3;
}
