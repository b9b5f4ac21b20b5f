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
//! The interface the Z80 core uses to reach memory and ports (spec §4.3 "MemMode").
//!
//! `step()` checks `mode()` exactly once per instruction rather than branching on every single
//! memory access, per the REDESIGN FLAG calling for a single enum branched once instead of a
//! function-pointer swap per access.

/// Whether the current `step()` should take the hot, unchecked path or consult the debugger
/// substrate on every access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemMode {
    /// No breakpoints or access tracking armed: read/write/in/out go straight through.
    Fast,
    /// At least one breakpoint or tracked region is armed: every access is reported to the bus
    /// so the debugger substrate can intercept it.
    Debug,
}

/// Everything the CPU core needs from its host: banked memory, I/O ports, and contention.
///
/// Implemented once per concrete machine (by [`crate::context::Context`]'s internal bus view);
/// the interpreter itself is generic over this trait so it never depends on a concrete chipset.
pub trait Bus {
    fn mode(&self) -> MemMode;

    fn mem_read(&mut self, addr: u16) -> u8;
    fn mem_write(&mut self, addr: u16, value: u8);

    /// Opcode fetch; distinct from `mem_read` because contention and the access tracker record
    /// M1 cycles separately from ordinary data reads (spec §4.9 `EXECUTION_CPU_STEP`).
    fn mem_fetch(&mut self, addr: u16) -> u8 {
        self.mem_read(addr)
    }

    fn io_read(&mut self, port: u16) -> u8;
    fn io_write(&mut self, port: u16, value: u8);

    /// Advances the shared t-state clock by `cycles` wall-clock T-states, applying memory or
    /// I/O contention if the host models it. Called after every M-cycle.
    fn tick(&mut self, cycles: i32);

    /// True when a maskable interrupt line is asserted and should be sampled at the end of the
    /// current instruction (spec §2, "ULA raises /INT once per frame").
    fn int_line(&self) -> bool;

    /// The data bus value presented during an IM 0 interrupt acknowledge cycle, or the low byte
    /// of the IM 2 vector table address. Most peripherals present `0xFF` (floating bus).
    fn interrupt_data(&self) -> u8 { 0xFF }
}
