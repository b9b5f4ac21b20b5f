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
//! `zxcore` is a thin top-level crate that re-exports the focused sub-crates
//! (`zxcore-core`, and optionally `zxcore-audio`/`zxcore-formats`/`zxcore-peripherals`)
//! and wires them together behind a narrow host-facing command surface.
//!
//! Everything that actually emulates a machine lives in [`zxcore_core`]; this crate's
//! own job is the [`Engine`] wrapper below, not a second copy of the engine internals.
pub use zxcore_core as core;

#[cfg(feature = "audio")]
pub use zxcore_audio as audio;

#[cfg(feature = "formats")]
pub use zxcore_formats as formats;

#[cfg(feature = "peripherals")]
pub use zxcore_peripherals as peripherals;

use std::fs;
use std::path::Path;

use zxcore_core::bus::{Event, Topic};
use zxcore_core::context::{Context, EngineConfig};
use zxcore_core::debug::breakpoints::BreakpointManager;
use zxcore_core::error::EngineError;
use zxcore_core::platform::Model;
use zxcore_core::scheduler::{self, FrameOutcome};
use zxcore_core::video::Framebuffer;

/// Host-facing wrapper around a [`Context`], exposing the command surface a UI or CLI
/// drives the emulator through. One `Engine` owns exactly one running machine; swapping
/// models means dropping it and calling [`Engine::init`] again.
pub struct Engine {
    ctx: Context,
    #[cfg(feature = "formats")]
    tape: Option<Vec<u8>>,
    #[cfg(feature = "formats")]
    disk: Option<zxcore_formats::disk::TrdosImage>,
}

impl Engine {
    /// `Init`: builds a fresh machine of `model`, loading the given ROM images in bank
    /// order. Fatal on a ROM read/size failure (spec §7).
    pub fn init(model: Model, rom_images: Vec<std::path::PathBuf>) -> Result<Self, EngineError> {
        let mut config = EngineConfig::new(model);
        config.rom_images = rom_images;
        Ok(Engine {
            ctx: Context::new(config)?,
            #[cfg(feature = "formats")]
            tape: None,
            #[cfg(feature = "formats")]
            disk: None,
        })
    }

    /// `Release`: tears the machine down. Plain `drop` does the same; this just gives the
    /// command surface an explicit name for it.
    pub fn release(self) {
        drop(self)
    }

    /// `Reset`: cold-resets the CPU and re-applies the model's default memory paging.
    pub fn reset(&mut self) {
        self.ctx.reset();
    }

    /// `Pause`.
    pub fn pause(&mut self) {
        self.ctx.pause();
    }

    /// `Resume`.
    pub fn resume(&mut self) {
        self.ctx.resume();
    }

    /// `IsPaused`.
    pub fn is_paused(&self) -> bool {
        self.ctx.is_paused()
    }

    /// `Step`: executes exactly one instruction.
    pub fn step(&mut self) -> FrameOutcome {
        scheduler::step_instruction(&mut self.ctx)
    }

    /// `StepOver`: executes one instruction, running a `CALL`/`RST` to completion.
    pub fn step_over(&mut self) -> FrameOutcome {
        scheduler::step_over(&mut self.ctx)
    }

    /// `StepOut`: runs until the current subroutine returns.
    pub fn step_out(&mut self) -> FrameOutcome {
        scheduler::step_out(&mut self.ctx)
    }

    /// Runs one display refresh. Named distinctly from the command surface's
    /// `StartAsync`/`Stop` pair: those name a host-driven run loop thread, which is
    /// explicitly the host's job (spec §1 "desktop shell" Non-goal), not this crate's.
    pub fn run_frame(&mut self) -> FrameOutcome {
        scheduler::run_frame(&mut self.ctx)
    }

    /// `GetFramebuffer`.
    pub fn framebuffer(&self) -> &Framebuffer {
        self.ctx.framebuffer()
    }

    /// `GetContext`.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// `GetContext` (mutable access, e.g. for a debugger UI driving `scheduler` calls
    /// directly, or for `set_key_row`/`set_ear_in`).
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// `GetBreakpointManager`.
    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.ctx.debugger.breakpoints
    }

    /// `GetBreakpointManager` (mutable).
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointManager {
        &mut self.ctx.debugger.breakpoints
    }

    /// Subscribes to a message-bus topic (spec §4.10); the command surface doesn't name
    /// this separately but every state change a host displays flows through it.
    pub fn subscribe<F>(&mut self, topic: Topic, callback: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.ctx.subscribe(topic, callback);
    }

    /// `LoadSnapshot`: reads a `.sna` or `.z80` file and applies it directly to the running
    /// machine's [`Context`], dispatching on the file extension.
    #[cfg(feature = "formats")]
    pub fn load_snapshot(&mut self, path: &Path) -> Result<(), EngineError> {
        let raw = fs::read(path).map_err(|source| EngineError::Io { operation: "read snapshot file", source })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
        let mut cursor = std::io::Cursor::new(raw);
        match ext.as_str() {
            "sna" => zxcore_formats::sna::load_sna(&mut cursor, &mut self.ctx)
                .map_err(|source| EngineError::Io { operation: "load .sna snapshot", source }),
            "z80" => zxcore_formats::z80::load_z80(&mut cursor, &mut self.ctx)
                .map_err(|source| EngineError::Io { operation: "load .z80 snapshot", source }),
            _ => Err(EngineError::SnapshotFormatInvalid { kind: "unrecognised extension (expected .sna or .z80)", offset: 0 }),
        }
    }

    /// `LoadTape`: reads a `.tap` file as-is, or converts a `.tzx` file's Standard/Turbo
    /// Speed Data blocks into TAP chunks. The resulting TAP image is held by the `Engine`
    /// for the host to feed through pulse-level playback or ROM fast-loading, since
    /// [`Context`] itself carries no tape state of its own.
    #[cfg(feature = "formats")]
    pub fn load_tape(&mut self, path: &Path) -> Result<(), EngineError> {
        let raw = fs::read(path).map_err(|source| EngineError::Io { operation: "read tape file", source })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
        let tap_bytes = match ext.as_str() {
            "tap" => raw,
            "tzx" => {
                let mut writer = zxcore_formats::tap::write_tap(std::io::Cursor::new(Vec::new()))
                    .map_err(|source| EngineError::Io { operation: "prepare TZX-to-TAP conversion", source })?;
                zxcore_formats::tzx::convert_tzx_to_tap(&raw[..], &mut writer)
                    .map_err(|source| EngineError::Io { operation: "convert .tzx tape", source })?;
                writer.end_pulse_chunk().map_err(|source| EngineError::Io { operation: "convert .tzx tape", source })?;
                writer.flush().map_err(|source| EngineError::Io { operation: "convert .tzx tape", source })?;
                writer.into_inner().into_inner().into_inner()
            }
            _ => return Err(EngineError::SnapshotFormatInvalid { kind: "unrecognised tape extension (expected .tap or .tzx)", offset: 0 }),
        };
        self.tape = Some(tap_bytes);
        Ok(())
    }

    /// Returns the bytes of the tape image most recently loaded via [`Engine::load_tape`],
    /// in TAP form, for the host to drive pulse-level playback from.
    #[cfg(feature = "formats")]
    pub fn tape(&self) -> Option<&[u8]> {
        self.tape.as_deref()
    }

    /// Removes the currently loaded tape image, if any.
    #[cfg(feature = "formats")]
    pub fn eject_tape(&mut self) {
        self.tape = None;
    }

    /// `LoadDisk`: reads and structurally validates a `.scl` or `.trd` disk image. Only the
    /// image's catalogue and sector layout are parsed here; simulating full FDC controller
    /// I/O against it is out of scope (spec §1 Non-goal), so the parsed image is simply held
    /// for the host or a disk-aware port decoder to inspect.
    #[cfg(feature = "formats")]
    pub fn load_disk(&mut self, path: &Path) -> Result<(), EngineError> {
        let raw = fs::read(path).map_err(|source| EngineError::Io { operation: "read disk image file", source })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
        let image = match ext.as_str() {
            "trd" => zxcore_formats::disk::load_trd(&raw[..]),
            "scl" => zxcore_formats::disk::load_scl(&raw[..]),
            _ => return Err(EngineError::DiskImageInvalid { reason: "unrecognised disk extension (expected .trd or .scl)" }),
        }.map_err(|source| EngineError::Io { operation: "parse disk image", source })?;
        self.disk = Some(image);
        Ok(())
    }

    /// Returns the disk image most recently loaded via [`Engine::load_disk`].
    #[cfg(feature = "formats")]
    pub fn disk(&self) -> Option<&zxcore_formats::disk::TrdosImage> {
        self.disk.as_ref()
    }

    /// Removes the currently loaded disk image, if any.
    #[cfg(feature = "formats")]
    pub fn eject_disk(&mut self) {
        self.disk = None;
    }

    /// `GetLogger`: this engine logs through the ambient `log` facade rather than an owned
    /// logger handle, so there's nothing to hand back except the level a host has configured
    /// via `log::set_max_level`.
    pub fn log_level(&self) -> log::LevelFilter {
        log::max_level()
    }

    /// `SetAudioCallback`: renders AY and beeper/MIC output through a band-limited
    /// synthesizer and hands the host a flat `f32` sample buffer once per frame.
    #[cfg(feature = "audio")]
    pub fn set_audio_callback<F>(&mut self, sample_rate: u32, callback: F)
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let channels = if self.ctx.ay.is_some() { 3 } else { 1 };
        let mut synth = zxcore_audio::synth::BandLimited::<f32>::new(channels);
        {
            use zxcore_core::audio::Blep;
            let timing = self.ctx.timing;
            synth.ensure_frame_time(sample_rate, timing.cpu_hz as f64, timing.frame_tstates, audio_sink::MARGIN_TSTATES);
        }
        self.ctx.set_audio_sink(audio_sink::CallbackAudioSink { synth, channels, mixdown: Vec::new(), callback });
    }

    /// Detaches the audio sink installed by [`Engine::set_audio_callback`], if any.
    #[cfg(feature = "audio")]
    pub fn clear_audio_callback(&mut self) {
        self.ctx.clear_audio_sink();
    }
}

#[cfg(feature = "audio")]
mod audio_sink {
    use zxcore_core::audio::{AudioSink, Blep};
    use zxcore_core::clock::FTs;

    /// Two Z80 `NOP`-ish instructions' worth of slack against a frame's final pulse
    /// landing right on the boundary.
    pub(super) const MARGIN_TSTATES: FTs = 2 * 23;

    pub(super) struct CallbackAudioSink<F> {
        pub(super) synth: zxcore_audio::synth::BandLimited<f32>,
        pub(super) channels: usize,
        pub(super) mixdown: Vec<f32>,
        pub(super) callback: F,
    }

    impl<F: FnMut(&[f32]) + Send> AudioSink for CallbackAudioSink<F> {
        fn ensure_frame_time(&mut self, sample_rate: u32, ts_rate: f64, frame_ts: FTs, margin_ts: FTs) {
            self.synth.ensure_frame_time(sample_rate, ts_rate, frame_ts, margin_ts);
        }

        fn add_step(&mut self, channel: usize, timestamp: FTs, delta: f32) {
            self.synth.add_step(channel, timestamp, delta);
        }

        fn end_frame(&mut self, timestamp: FTs) -> usize {
            let nsamples = self.synth.end_frame(timestamp);
            self.mixdown.clear();
            self.mixdown.resize(nsamples, 0.0);
            for channel in 0..self.channels {
                for (dst, sample) in self.mixdown.iter_mut().zip(self.synth.sum_iter::<f32>(channel)) {
                    *dst += sample / self.channels as f32;
                }
            }
            self.synth.next_frame();
            (self.callback)(&self.mixdown);
            nsamples
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_builds_a_runnable_machine() {
        let engine = Engine::init(Model::Spectrum48, Vec::new()).unwrap();
        assert!(!engine.is_paused());
    }

    #[test]
    fn pause_resume_round_trips() {
        let mut engine = Engine::init(Model::Spectrum48, Vec::new()).unwrap();
        engine.pause();
        assert!(engine.is_paused());
        engine.resume();
        assert!(!engine.is_paused());
    }

    #[test]
    fn step_advances_the_program_counter() {
        let mut engine = Engine::init(Model::Spectrum48, Vec::new()).unwrap();
        engine.context_mut().memory.load_rom_page(0, &[0x00, 0x00]);
        engine.step();
        assert_eq!(engine.context().cpu.pc(), 1);
    }
}
