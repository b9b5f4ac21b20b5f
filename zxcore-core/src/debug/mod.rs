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
//! The debugger substrate (spec §4.6-4.9): disassembler, label manager, breakpoint manager,
//! memory-access tracker and call-trace buffer. These are independent components; `Debugger`
//! just bundles them the way the scheduler expects to find them on its `Context` (spec §9
//! "raw back-pointers -> context handle").
pub mod access_tracker;
pub mod breakpoints;
pub mod call_trace;
pub mod disassembler;
pub mod labels;

pub use access_tracker::AccessTracker;
pub use breakpoints::BreakpointManager;
pub use call_trace::CallTraceBuffer;
pub use labels::LabelManager;

/// Bundles the four always-present debugger components. Owned by the top-level `Context`;
/// the scheduler and disassembler borrow it for the duration of a single call, never past it.
pub struct Debugger {
    pub breakpoints: BreakpointManager,
    pub labels: LabelManager,
    pub access_tracker: AccessTracker,
    pub call_trace: CallTraceBuffer,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger {
            breakpoints: BreakpointManager::new(),
            labels: LabelManager::new(),
            access_tracker: AccessTracker::new(access_tracker::TrackingMode::Z80AddressSpace),
            call_trace: CallTraceBuffer::new(),
        }
    }
}
