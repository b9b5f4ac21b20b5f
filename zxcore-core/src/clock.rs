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
//! T-state clock types shared by the Z80 core, the video rasteriser and audio synthesis.
//!
//! Rather than a packed `VideoTs`/`VFrameTs` scheme, a frame's t-state counter here is a plain
//! signed integer: `t` is modeled as a scalar field on the Z80 register file, and the scheduler
//! wraps it at the frame boundary by plain subtraction (see `scheduler` in the top-level crate).

/// A t-state counter, signed so the scheduler can carry negative overshoot/eipos values
/// across a frame wrap without special-casing the subtraction.
pub type FTs = i32;

/// Per-model frame timing, constant for the lifetime of a chipset instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    /// Total t-states in one PAL frame for this model.
    pub frame_tstates: FTs,
    /// T-states per raster line.
    pub tstates_per_line: FTs,
    /// CPU clock in Hz (informational; used by audio resamplers).
    pub cpu_hz: u32,
}

impl FrameTiming {
    pub const ZX48: FrameTiming = FrameTiming { frame_tstates: 69_888, tstates_per_line: 224, cpu_hz: 3_500_000 };
    pub const ZX128: FrameTiming = FrameTiming { frame_tstates: 70_908, tstates_per_line: 228, cpu_hz: 3_546_900 };
    pub const PENTAGON: FrameTiming = FrameTiming { frame_tstates: 71_680, tstates_per_line: 224, cpu_hz: 3_500_000 };

    /// Number of raster lines in a frame, derived from the two constants above.
    #[inline]
    pub fn lines_per_frame(&self) -> FTs {
        self.frame_tstates / self.tstates_per_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zx48_partitions_evenly() {
        assert_eq!(FrameTiming::ZX48.lines_per_frame(), 312);
    }

    #[test]
    fn pentagon_partitions_evenly() {
        assert_eq!(FrameTiming::PENTAGON.lines_per_frame(), 320);
    }
}
