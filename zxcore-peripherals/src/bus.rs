/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! System bus device emulators to be used with [ControlUnit][zxcore_core::chip::ControlUnit]s.
pub mod ay;
pub mod debug;
pub mod joystick;
pub mod mouse;
pub mod parallel;
pub mod zxprinter;
