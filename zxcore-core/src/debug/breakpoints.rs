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
//! Breakpoint manager (spec §3 "Breakpoint", §4.9, §8 scenario D). Checked by the scheduler
//! between instructions (memory breakpoints) and by the port decoder's IN/OUT dispatch (port
//! breakpoints); IDs are monotonic and never reused so a stale handle can't collide with a
//! freshly added breakpoint.
use bitflags::bitflags;

bitflags! {
    /// `subtype` bitset (spec §3): which kinds of access arm a breakpoint.
    pub struct BreakpointKind: u8 {
        const READ      = 0b0000_0001;
        const WRITE     = 0b0000_0010;
        const EXEC      = 0b0000_0100;
        const PORT_IN   = 0b0000_1000;
        const PORT_OUT  = 0b0001_0000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakpointTarget {
    Memory(u16),
    Port(u16),
}

#[derive(Clone, Debug)]
pub struct Breakpoint {
    pub id: u32,
    pub target: BreakpointTarget,
    pub kind: BreakpointKind,
    pub active: bool,
    pub hit_count: u64,
}

/// Why a temporary step breakpoint was installed, so the scheduler can tell a step-completion
/// hit apart from a user breakpoint hit (spec §4.9 `StepOver`/`StepOut`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Into,
    Over,
    Out,
}

/// Owns all breakpoints plus the at-most-one transient step breakpoint used to implement
/// `StepInstruction`/`StepOver`/`StepOut` (spec §4.9: "installing a temporary breakpoint at the
/// address of the instruction following the current one").
#[derive(Default)]
pub struct BreakpointManager {
    next_id: u32,
    breakpoints: Vec<Breakpoint>,
    step: Option<(u16, StepKind)>,
}

impl BreakpointManager {
    pub fn new() -> Self {
        BreakpointManager::default()
    }

    pub fn add_memory(&mut self, address: u16, kind: BreakpointKind) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.breakpoints.push(Breakpoint {
            id,
            target: BreakpointTarget::Memory(address),
            kind,
            active: true,
            hit_count: 0,
        });
        id
    }

    pub fn add_port(&mut self, port: u16, kind: BreakpointKind) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.breakpoints.push(Breakpoint {
            id,
            target: BreakpointTarget::Port(port),
            kind,
            active: true,
            hit_count: 0,
        });
        id
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|b| b.id != id);
        self.breakpoints.len() != before
    }

    pub fn set_active(&mut self, id: u32, active: bool) {
        if let Some(bp) = self.breakpoints.iter_mut().find(|b| b.id == id) {
            bp.active = active;
        }
    }

    pub fn get(&self, id: u32) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|b| b.id == id)
    }

    pub fn all(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn clear(&mut self) {
        self.breakpoints.clear();
    }

    /// Called by the scheduler before executing the instruction at `pc`. Returns the id of the
    /// first active EXEC breakpoint matching `pc`, bumping its hit count.
    pub fn check_exec(&mut self, pc: u16) -> Option<u32> {
        self.check_memory(pc, BreakpointKind::EXEC)
    }

    pub fn check_read(&mut self, addr: u16) -> Option<u32> {
        self.check_memory(addr, BreakpointKind::READ)
    }

    pub fn check_write(&mut self, addr: u16) -> Option<u32> {
        self.check_memory(addr, BreakpointKind::WRITE)
    }

    fn check_memory(&mut self, addr: u16, kind: BreakpointKind) -> Option<u32> {
        for bp in self.breakpoints.iter_mut() {
            if bp.active && bp.target == BreakpointTarget::Memory(addr) && bp.kind.contains(kind) {
                bp.hit_count += 1;
                return Some(bp.id);
            }
        }
        None
    }

    pub fn check_port_in(&mut self, port: u16) -> Option<u32> {
        self.check_port(port, BreakpointKind::PORT_IN)
    }

    pub fn check_port_out(&mut self, port: u16) -> Option<u32> {
        self.check_port(port, BreakpointKind::PORT_OUT)
    }

    fn check_port(&mut self, port: u16, kind: BreakpointKind) -> Option<u32> {
        for bp in self.breakpoints.iter_mut() {
            if bp.active && bp.target == BreakpointTarget::Port(port) && bp.kind.contains(kind) {
                bp.hit_count += 1;
                return Some(bp.id);
            }
        }
        None
    }

    /// Installs the transient breakpoint backing `StepInstruction`/`StepOver`/`StepOut`.
    pub fn arm_step(&mut self, address: u16, kind: StepKind) {
        self.step = Some((address, kind));
    }

    /// Clears and returns the step target if `pc` matches it; the scheduler uses this instead
    /// of a regular breakpoint id so stepping never shows up in `all()`.
    pub fn take_step_hit(&mut self, pc: u16) -> Option<StepKind> {
        match self.step {
            Some((addr, kind)) if addr == pc => {
                self.step = None;
                Some(kind)
            }
            _ => None,
        }
    }

    pub fn cancel_step(&mut self) {
        self.step = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_breakpoint_fires_on_matching_pc() {
        let mut mgr = BreakpointManager::new();
        let id = mgr.add_memory(0x05ED, BreakpointKind::EXEC);
        assert_eq!(mgr.check_exec(0x05ED), Some(id));
        assert_eq!(mgr.get(id).unwrap().hit_count, 1);
        assert_eq!(mgr.check_exec(0x1234), None);
    }

    #[test]
    fn inactive_breakpoint_does_not_fire() {
        let mut mgr = BreakpointManager::new();
        let id = mgr.add_memory(0x8000, BreakpointKind::WRITE);
        mgr.set_active(id, false);
        assert_eq!(mgr.check_write(0x8000), None);
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut mgr = BreakpointManager::new();
        let a = mgr.add_memory(0x0000, BreakpointKind::EXEC);
        let b = mgr.add_memory(0x0001, BreakpointKind::EXEC);
        mgr.remove(a);
        let c = mgr.add_memory(0x0002, BreakpointKind::EXEC);
        assert!(b != a && c != a && c != b);
    }

    #[test]
    fn port_breakpoint_matches_direction() {
        let mut mgr = BreakpointManager::new();
        mgr.add_port(0xFE, BreakpointKind::PORT_OUT);
        assert_eq!(mgr.check_port_in(0xFE), None);
        assert!(mgr.check_port_out(0xFE).is_some());
    }

    #[test]
    fn step_over_breakpoint_is_transient() {
        let mut mgr = BreakpointManager::new();
        mgr.arm_step(0x8003, StepKind::Over);
        assert_eq!(mgr.take_step_hit(0x8000), None);
        assert_eq!(mgr.take_step_hit(0x8003), Some(StepKind::Over));
        assert_eq!(mgr.take_step_hit(0x8003), None);
    }
}
