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
//! Narrow interop traits between the port decoder and the tape/snapshot loaders.
use core::num::NonZeroU32;

pub use crate::ports::flags::ReadEarMode;

/// Feeds buffered `EAR in` (tape input) pulse transitions to a port decoder.
pub trait EarIn {
    /// Sets the `EAR in` bit state after `delta_fts` T-states counted from the last recorded change.
    fn set_ear_in(&mut self, ear_in: bool, delta_fts: u32);
    /// Feeds the buffer with a run of time-interval pulses, each value being the T-state delta
    /// after which the `EAR in` bit toggles.
    fn feed_ear_in<I: Iterator<Item = NonZeroU32>>(
        &mut self,
        fts_deltas: I,
        max_frames_threshold: Option<usize>,
    );
    /// Drops all buffered but not yet consumed `EAR in` changes, resetting the line to `ear_in`.
    fn purge_ear_in_changes(&mut self, ear_in: bool);
    /// The current read-ear fallback mode.
    fn read_ear_mode(&self) -> ReadEarMode {
        ReadEarMode::Clear
    }
    /// Changes the read-ear fallback mode.
    fn set_read_ear_mode(&mut self, _mode: ReadEarMode) {}
}

/// Produces a frame's buffered `MIC out` transitions as a pulse iterator, for tape saving.
pub trait MicOut<'a> {
    type PulseIter: Iterator<Item = NonZeroU32> + 'a;
    fn mic_out_pulse_iter(&'a self) -> Self::PulseIter;
}
