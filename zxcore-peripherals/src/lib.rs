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
//! Emulator components of various ZX Spectrum peripheral devices: joystick, mouse, AY/Turbo
//! Sound chip selection, and a parallel/Kempston printer. ZX Interface 1 (microdrive/RS-232/
//! ZX Net) and general serial/storage devices are not part of this engine's scope and have been
//! dropped rather than carried as unreachable modules.
#[macro_use]
extern crate bitflags;

pub mod ay;
pub mod bus;
pub mod joystick;
pub mod mouse;
pub mod parallel;
pub mod zxprinter;
