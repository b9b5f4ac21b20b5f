/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! **Z80** snapshot format utilities.
//!
//! See the format reference on [World of Spectrum](https://worldofspectrum.org/faq/reference/z80format.htm).
//!
//! ## Implementation specifics
//!
//! When reading from the **Z80** file:
//!
//! * Hardware modes for Interface 1, +D, DISCiPLE, SAM RAM and Timex machines load onto the
//!   plain model they're an add-on to; the peripheral ROM itself isn't restored.
//!
//! When writing to the **Z80** file:
//!
//! * ROMs are not saved.
//! * Joystick bindings are not tracked by this engine and are not written.
mod common;
mod compress;
mod decompress;
mod loader;
mod saver;

pub use loader::*;
pub use saver::*;
