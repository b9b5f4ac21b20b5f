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
//! The Z80 interpreter (spec §3 "Z80 register file", §4.3). `Cpu` owns nothing but the register
//! file; every memory, port and clock access goes through the [`Bus`] the caller provides, so
//! the same interpreter runs unmodified across every machine model in [`crate::platform::Model`].
mod alu;
mod bus;
mod exec;
mod irq;
mod regs;
pub mod tables;

pub use bus::{Bus, MemMode};
pub use regs::{Flags, IntMode, RegPair, Registers};

/// A bare Z80 core: register file plus the fetch/execute/interrupt-acceptance loop.
#[derive(Clone, Debug, Default)]
pub struct Cpu {
    pub regs: Registers,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu::default()
    }

    /// Resets to the power-on register state (spec §4.3 `reset`): PC=0, SP/AF/BC/DE/HL=0xFFFF,
    /// interrupts disabled, IM 0.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
    }

    /// Runs one instruction, first giving the interrupt line a chance to redirect execution,
    /// and returns the number of T-states consumed (spec §3 `t`).
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> i32 {
        let accepted = irq::maybe_accept(&mut self.regs, bus);
        if accepted > 0 {
            return accepted;
        }
        exec::step(&mut self.regs, bus)
    }

    pub fn pc(&self) -> u16 { self.regs.pc }
    pub fn set_pc(&mut self, pc: u16) { self.regs.pc = pc; }
    pub fn is_halted(&self) -> bool { self.regs.halted }

    /// Samples the interrupt line once, outside of instruction execution (spec §4.9
    /// `z80.accept_irq()`, called at the frame boundary). Returns the T-states the acknowledge
    /// cycle cost, or 0 if IFF1 is clear, the line is low, or the EI-deferral window is open.
    pub fn accept_irq<B: Bus>(&mut self, bus: &mut B) -> i32 {
        irq::maybe_accept(&mut self.regs, bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Flat 64 KiB RAM test harness with no ports, no contention, and interrupts tied low.
    struct FlatBus {
        mem: [u8; 0x10000],
        ports: HashMap<u16, u8>,
        int_line: bool,
    }

    impl FlatBus {
        fn new() -> Self {
            FlatBus { mem: [0; 0x10000], ports: HashMap::new(), int_line: false }
        }
        fn load(&mut self, addr: u16, bytes: &[u8]) {
            for (i, b) in bytes.iter().enumerate() {
                self.mem[addr as usize + i] = *b;
            }
        }
    }

    impl Bus for FlatBus {
        fn mode(&self) -> MemMode { MemMode::Fast }
        fn mem_read(&mut self, addr: u16) -> u8 { self.mem[addr as usize] }
        fn mem_write(&mut self, addr: u16, value: u8) { self.mem[addr as usize] = value; }
        fn io_read(&mut self, port: u16) -> u8 { *self.ports.get(&port).unwrap_or(&0xFF) }
        fn io_write(&mut self, port: u16, value: u8) { self.ports.insert(port, value); }
        fn tick(&mut self, _cycles: i32) {}
        fn int_line(&self) -> bool { self.int_line }
    }

    #[test]
    fn ld_a_n_loads_immediate() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        bus.load(0, &[0x3E, 0x42]); // LD A,0x42
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a(), 0x42);
        assert_eq!(cpu.regs.t, 7);
    }

    #[test]
    fn add_a_b_sets_flags() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        bus.load(0, &[0x3E, 0xFF, 0x06, 0x01, 0x80]); // LD A,0xFF; LD B,1; ADD A,B
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a(), 0x00);
        assert!(cpu.regs.f().contains(Flags::Z));
        assert!(cpu.regs.f().contains(Flags::C));
    }

    #[test]
    fn jp_nn_sets_pc() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        bus.load(0, &[0xC3, 0x00, 0x80]); // JP 0x8000
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x8000);
    }

    #[test]
    fn call_and_ret_round_trip() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        cpu.regs.sp = 0xFFF0;
        bus.load(0, &[0xCD, 0x00, 0x10]); // CALL 0x1000
        bus.load(0x1000, &[0xC9]); // RET
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x1000);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x0003);
    }

    #[test]
    fn halt_then_im1_interrupt_wakes_cpu() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        cpu.regs.sp = 0xFFF0;
        cpu.regs.iff1 = true;
        cpu.regs.iff2 = true;
        bus.load(0, &[0x76]); // HALT
        cpu.step(&mut bus);
        assert!(cpu.is_halted());
        bus.int_line = true;
        cpu.step(&mut bus);
        assert!(!cpu.is_halted());
        assert_eq!(cpu.pc(), 0x0038);
    }

    #[test]
    fn ei_defers_interrupt_acceptance_by_one_instruction() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        cpu.regs.sp = 0xFFF0;
        bus.int_line = true;
        bus.load(0, &[0xFB, 0x00]); // EI; NOP
        cpu.step(&mut bus); // EI: does not accept, even though the line is already high
        assert_eq!(cpu.pc(), 1);
        cpu.step(&mut bus); // NOP executes uninterrupted
        assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn ldir_copies_block_and_decrements_bc() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        bus.load(0x8000, &[1, 2, 3]);
        cpu.regs.hl.0 = 0x8000;
        cpu.regs.de.0 = 0x9000;
        cpu.regs.bc.0 = 3;
        bus.load(0, &[0xED, 0xB0]); // LDIR
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.bc.0, 0);
        assert_eq!(bus.mem[0x9000], 1);
        assert_eq!(bus.mem[0x9001], 2);
        assert_eq!(bus.mem[0x9002], 3);
        assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn bit_instruction_sets_zero_flag() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        cpu.regs.set_b(0x00);
        bus.load(0, &[0xCB, 0x40]); // BIT 0,B
        cpu.step(&mut bus);
        assert!(cpu.regs.f().contains(Flags::Z));
    }

    #[test]
    fn indexed_load_reads_ix_plus_displacement() {
        let mut cpu = Cpu::new();
        let mut bus = FlatBus::new();
        cpu.regs.ix = 0x9000;
        bus.load(0x9005, &[0x77]);
        bus.load(0, &[0xDD, 0x7E, 0x05]); // LD A,(IX+5)
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a(), 0x77);
    }
}
