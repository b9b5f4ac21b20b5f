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
//! The core components of the zxcore library: banked memory, the Z80 interpreter, model port
//! decoders, the ULA video rasteriser, the message bus and the debugger substrate.
pub mod audio;
pub mod ay;
pub mod bus;
pub mod chip;
pub mod clock;
pub mod context;
pub mod debug;
pub mod error;
pub mod memory;
pub mod platform;
pub mod ports;
pub mod rom;
pub mod scheduler;
pub mod video;
pub mod z80;
