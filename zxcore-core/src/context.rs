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
//! The per-machine aggregate (spec §9 "raw back-pointers -> context handle"): owns the Z80 core,
//! the memory manager, the port decoder, the ULA renderer, the ROM service, the debugger
//! substrate and the message bus, and is the single [`Bus`] implementor the interpreter runs
//! against. Nothing outside this module borrows CPU and peripherals simultaneously; every other
//! component reaches the others only through a `Context` method.
use std::path::PathBuf;

use crate::audio::{AudioSink, EarMicAmps4};
use crate::ay::Ay3_8912;
use crate::bus::{Event, MessageBus, Topic};
use crate::clock::{FTs, FrameTiming};
use crate::debug::Debugger;
use crate::error::EngineError;
use crate::memory::MemoryManager;
use crate::platform::Model;
use crate::ports::PortDecoder;
use crate::rom::RomService;
use crate::video::UlaVideo;
use crate::z80::{Bus, Cpu, MemMode};

/// Construction parameters for a [`Context`] (spec §2.3 "Configuration"). Validation only; no
/// file-format config parsing lives here — that stays a host/GUI-layer concern, same as the
/// split between a plain config struct and a config-file loader elsewhere in this codebase.
pub struct EngineConfig {
    pub model: Model,
    /// ROM images to load in order, each split into consecutive pages starting at page 0.
    pub rom_images: Vec<PathBuf>,
    /// Whether the access tracker should start in the `Capturing` state.
    pub start_tracking: bool,
    /// Whether the renderer should draw incrementally (`ScreenHQ = on`) or batch-render once per
    /// frame (spec §4.9 "cheap no-op under HQ=off").
    pub screen_hq: bool,
}

impl EngineConfig {
    pub fn new(model: Model) -> Self {
        EngineConfig {
            model,
            rom_images: Vec::new(),
            start_tracking: false,
            screen_hq: false,
        }
    }
}

pub struct Context {
    pub model: Model,
    pub cpu: Cpu,
    pub memory: MemoryManager,
    pub ports: PortDecoder,
    pub video: UlaVideo,
    pub rom: RomService,
    pub debugger: Debugger,
    pub bus: MessageBus,
    pub timing: FrameTiming,
    pub screen_hq: bool,
    /// The machine's AY-3-8912, present whenever [`Model::has_ay`] says it should be.
    pub ay: Option<Ay3_8912>,
    frame_counter: u32,
    keys: [u8; 8],
    ear_in: bool,
    paused: bool,
    pending_hit: Option<u32>,
    /// `(T-state, 2-bit EAR/MIC out level)` edges recorded since the last audio flush.
    earmic_changes: Vec<(FTs, u8)>,
    earmic_level: u8,
    audio_sink: Option<Box<dyn AudioSink>>,
}

impl Context {
    /// Builds a fresh machine for `config.model`, loads `config.rom_images` into the ROM pool
    /// in order, applies the model's default paging, and resets the CPU (spec §4.9 `Init`).
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let model = config.model;
        let mut memory = MemoryManager::new(model.ram_pages(), model.rom_pages());
        let mut rom = RomService::new();
        let mut next_page = 0;
        for path in &config.rom_images {
            let n = rom.load_rom_image(&mut memory, path, next_page)?;
            next_page += n;
        }
        let mut ports = PortDecoder::for_model(model);
        ports.reset(&mut memory);
        let mut debugger = Debugger::new();
        if config.start_tracking {
            debugger.access_tracker.start(model.ram_pages() as u32 + model.rom_pages() as u32);
        }
        let mut cpu = Cpu::new();
        cpu.reset();
        Ok(Context {
            model,
            cpu,
            memory,
            ports,
            video: UlaVideo::new(model.frame_timing()),
            rom,
            debugger,
            bus: MessageBus::new(),
            timing: model.frame_timing(),
            screen_hq: config.screen_hq,
            ay: if model.has_ay() { Some(Ay3_8912::new()) } else { None },
            frame_counter: 0,
            keys: [0xFF; 8],
            ear_in: false,
            paused: false,
            pending_hit: None,
            earmic_changes: Vec::new(),
            earmic_level: 0,
            audio_sink: None,
        })
    }

    /// Installs the destination the next [`Context::flush_audio_frame`] calls render into.
    /// Lives here rather than on the top-level `Engine` so `run_frame` can flush automatically;
    /// see [`crate::audio::AudioSink`] for why this takes a boxed sink instead of a `zxcore-audio`
    /// type directly (`zxcore-core` can't depend on the crates that depend on it).
    pub fn set_audio_sink(&mut self, sink: impl AudioSink + 'static) {
        self.audio_sink = Some(Box::new(sink));
    }

    pub fn clear_audio_sink(&mut self) {
        self.audio_sink = None;
    }

    /// Renders this frame's AY register writes and EAR/MIC level edges into the installed audio
    /// sink, if any, and clears both queues. `end_ts` is the frame's T-state length.
    pub(crate) fn flush_audio_frame(&mut self, end_ts: FTs) {
        if let Some(sink) = self.audio_sink.as_deref_mut() {
            if let Some(ay) = self.ay.as_mut() {
                ay.render_frame(sink, end_ts, [0, 1, 2]);
            }
            crate::audio::render_audio_frame_ts::<EarMicAmps4<f32>, f32, _, _>(
                self.earmic_level,
                Some(end_ts),
                &self.earmic_changes,
                sink,
                if self.ay.is_some() { 2 } else { 0 },
            );
            sink.end_frame(end_ts);
        }
        if let Some(&(_, level)) = self.earmic_changes.last() {
            self.earmic_level = level;
        }
        self.earmic_changes.clear();
    }

    /// Cold-resets the CPU and paging, and republishes [`Event::SystemReset`] (spec §4.9
    /// `Reset`). ROM and RAM contents are left untouched, matching real hardware.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.ports.reset(&mut self.memory);
        self.debugger.access_tracker.reset_halt_detection();
        self.frame_counter = 0;
        self.pending_hit = None;
        self.bus.publish(Event::SystemReset);
    }

    pub fn is_paused(&self) -> bool { self.paused }

    pub fn pause(&mut self) {
        self.paused = true;
        self.bus.publish(Event::EmulatorStateChange { paused: true });
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.bus.publish(Event::EmulatorStateChange { paused: false });
    }

    pub fn framebuffer(&self) -> &crate::video::Framebuffer {
        &self.video.framebuffer
    }

    /// Which RAM page the ULA currently reads the screen from: the shadow screen (bank 7) when
    /// `0x7FFD` bit 3 is set, otherwise the conventional bank 5.
    pub fn screen_ram_page(&self) -> u16 {
        if self.ports.screen_is_shadow() { 7 } else { 5 }
    }

    /// Replaces one of the eight keyboard half-row states (spec §1 "Keyboard" peripheral); bit
    /// clear means the corresponding key is pressed, matching the ULA's active-low matrix.
    pub fn set_key_row(&mut self, row: usize, bits: u8) {
        self.keys[row] = bits;
    }

    pub fn set_ear_in(&mut self, ear_in: bool) {
        self.ear_in = ear_in;
    }

    fn mem_mode(&self) -> MemMode {
        if self.debugger.breakpoints.all().iter().any(|b| b.active) {
            MemMode::Debug
        } else {
            MemMode::Fast
        }
    }

    /// Runs exactly one instruction against this context's bus, pulling the breakpoint hit (if
    /// any) it may have recorded along the way.
    pub fn step_cpu(&mut self) -> i32 {
        let mode = self.mem_mode();
        let cpu_t = self.cpu.regs.t;
        let mut view = CpuBus {
            memory: &mut self.memory,
            ports: &mut self.ports,
            video: &mut self.video,
            debugger: &mut self.debugger,
            keys: &self.keys,
            ear_in: self.ear_in,
            mode,
            cpu_t,
            pending_hit: None,
            ay: self.ay.as_mut(),
            earmic_changes: &mut self.earmic_changes,
            earmic_level: self.earmic_level,
        };
        let cycles = self.cpu.step(&mut view);
        self.pending_hit = view.pending_hit;
        self.earmic_level = view.earmic_level;
        cycles
    }

    /// Samples the interrupt line at the frame boundary (spec §4.9 `z80.accept_irq()`).
    pub fn accept_irq(&mut self) -> i32 {
        let mode = self.mem_mode();
        let cpu_t = self.cpu.regs.t;
        let mut view = CpuBus {
            memory: &mut self.memory,
            ports: &mut self.ports,
            video: &mut self.video,
            debugger: &mut self.debugger,
            keys: &self.keys,
            ear_in: self.ear_in,
            mode,
            cpu_t,
            pending_hit: None,
            ay: self.ay.as_mut(),
            earmic_changes: &mut self.earmic_changes,
            earmic_level: self.earmic_level,
        };
        let cycles = self.cpu.accept_irq(&mut view);
        self.earmic_level = view.earmic_level;
        cycles
    }

    /// Takes and clears whatever read/write/port breakpoint the last [`Context::step_cpu`] call
    /// tripped, for the scheduler to publish and pause on.
    pub fn take_pending_breakpoint(&mut self) -> Option<u32> {
        self.pending_hit.take()
    }

    pub(crate) fn bump_frame_counter(&mut self) -> u32 {
        self.frame_counter = self.frame_counter.wrapping_add(1);
        self.frame_counter
    }

    pub fn frame_counter(&self) -> u32 { self.frame_counter }

    pub(crate) fn publish(&mut self, event: Event) {
        self.bus.publish(event);
    }

    pub(crate) fn set_paused_flag(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn subscribe<F>(&mut self, topic: Topic, callback: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.bus.subscribe(topic, callback);
    }
}

/// Borrows every `Context` field the CPU core needs except `cpu` itself, so `cpu.step(&mut view)`
/// never aliases its own register file. Built fresh for every [`Context::step_cpu`]/`accept_irq`
/// call; nothing outlives the call that created it.
struct CpuBus<'a> {
    memory: &'a mut MemoryManager,
    ports: &'a mut PortDecoder,
    video: &'a mut UlaVideo,
    debugger: &'a mut Debugger,
    keys: &'a [u8; 8],
    ear_in: bool,
    mode: MemMode,
    /// `regs.t` as it stood when this step began; used for the once-per-instruction `/INT`
    /// sample window, not updated mid-step.
    cpu_t: FTs,
    pending_hit: Option<u32>,
    ay: Option<&'a mut Ay3_8912>,
    earmic_changes: &'a mut Vec<(FTs, u8)>,
    earmic_level: u8,
}

impl<'a> CpuBus<'a> {
    fn read_keyboard_row(&self, port: u16) -> u8 {
        let hi = (port >> 8) as u8;
        let mut row_bits = 0x1Fu8;
        for row in 0..8 {
            if hi & (1 << row) == 0 {
                row_bits &= self.keys[row] & 0x1F;
            }
        }
        let ear_bit = if self.ear_in { 0b0100_0000 } else { 0 };
        row_bits | ear_bit | 0b1010_0000
    }
}

impl<'a> Bus for CpuBus<'a> {
    fn mode(&self) -> MemMode { self.mode }

    fn mem_read(&mut self, addr: u16) -> u8 {
        let value = self.memory.read_z80(addr);
        if self.mode == MemMode::Debug {
            if self.pending_hit.is_none() {
                self.pending_hit = self.debugger.breakpoints.check_read(addr);
            }
            // The caller PC isn't available from inside the bus view; the tracker's LRU of
            // caller addresses is keyed off `Context::step_cpu`'s breakpoint-checked PC instead,
            // so 0 here only means "unattributed".
            self.debugger.access_tracker.track_memory_read(self.memory, addr, value, 0);
        }
        value
    }

    fn mem_write(&mut self, addr: u16, value: u8) {
        if self.mode == MemMode::Debug {
            if self.pending_hit.is_none() {
                self.pending_hit = self.debugger.breakpoints.check_write(addr);
            }
        }
        self.memory.write_z80(addr, value);
        if self.mode == MemMode::Debug {
            self.debugger.access_tracker.track_memory_write(self.memory, addr, value, 0);
        }
    }

    fn mem_fetch(&mut self, addr: u16) -> u8 {
        let value = self.memory.read_z80(addr);
        if self.mode == MemMode::Debug {
            self.debugger.access_tracker.track_memory_execute(self.memory, addr, value, 0);
        }
        value
    }

    fn io_read(&mut self, port: u16) -> u8 {
        if let Some(value) = self.ports.decode_in(port) {
            return value;
        }
        match self.ports.classify(port) {
            crate::ports::PortKind::Ula => self.read_keyboard_row(port),
            crate::ports::PortKind::AyData => {
                self.ay.as_deref().map(Ay3_8912::read).unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn io_write(&mut self, port: u16, value: u8) {
        if self.mode == MemMode::Debug && self.pending_hit.is_none() {
            self.pending_hit = self.debugger.breakpoints.check_port_out(port);
        }
        let kind = self.ports.decode_out(self.memory, port, value);
        match kind {
            crate::ports::PortKind::Ula => {
                self.video.border_color = value & 0b0000_0111;
                let level = ((value >> 4) & 1) << 1 | ((value >> 3) & 1);
                if level != self.earmic_level {
                    self.earmic_changes.push((self.cpu_t, level));
                    self.earmic_level = level;
                }
            }
            crate::ports::PortKind::AyRegister => {
                if let Some(ay) = self.ay.as_deref_mut() {
                    ay.select(value);
                }
            }
            crate::ports::PortKind::AyData => {
                if let Some(ay) = self.ay.as_deref_mut() {
                    ay.write(self.cpu_t, value);
                }
            }
            _ => {}
        }
    }

    fn tick(&mut self, _cycles: i32) {
        // Contention modelling is out of scope for this pass; the scheduler drives the video
        // rasteriser from `regs.t` directly rather than from per-M-cycle tick counts.
    }

    fn int_line(&self) -> bool {
        (0..32).contains(&self.cpu_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_context() -> Context {
        let config = EngineConfig::new(Model::Spectrum48);
        let mut ctx = Context::new(config).unwrap();
        ctx.ports.reset(&mut ctx.memory);
        ctx
    }

    #[test]
    fn fresh_context_has_unhalted_cpu_at_zero() {
        let ctx = boot_context();
        assert_eq!(ctx.cpu.pc(), 0);
        assert!(!ctx.cpu.is_halted());
    }

    #[test]
    fn step_cpu_executes_instruction_from_mapped_rom() {
        let mut ctx = boot_context();
        ctx.memory.load_rom_page(0, &[0x3E, 0x42]); // LD A,0x42
        let cycles = ctx.step_cpu();
        assert_eq!(cycles, 7);
        assert_eq!(ctx.cpu.regs.a(), 0x42);
    }

    #[test]
    fn ula_out_sets_border_color() {
        let mut ctx = boot_context();
        ctx.memory.load_rom_page(0, &[0x3E, 0x02, 0xD3, 0xFE]); // LD A,2; OUT (0xFE),A
        ctx.step_cpu();
        ctx.step_cpu();
        assert_eq!(ctx.video.border_color, 0x02);
    }

    #[test]
    fn ula_out_records_earmic_edge() {
        let mut ctx = boot_context();
        // LD A,0x18 (bits 3 and 4 set); OUT (0xFE),A
        ctx.memory.load_rom_page(0, &[0x3E, 0x18, 0xD3, 0xFE]);
        ctx.step_cpu();
        ctx.step_cpu();
        assert_eq!(ctx.earmic_changes.last().map(|&(_, level)| level), Some(0b11));
    }

    #[test]
    fn ay_ports_round_trip_through_the_chip_on_a_128k_machine() {
        let config = EngineConfig::new(Model::Spectrum128);
        let mut ctx = Context::new(config).unwrap();
        ctx.ports.reset(&mut ctx.memory);
        assert!(ctx.ay.is_some());
        let mode = ctx.mem_mode();
        let cpu_t = ctx.cpu.regs.t;
        let mut view = CpuBus {
            memory: &mut ctx.memory,
            ports: &mut ctx.ports,
            video: &mut ctx.video,
            debugger: &mut ctx.debugger,
            keys: &ctx.keys,
            ear_in: false,
            mode,
            cpu_t,
            pending_hit: None,
            ay: ctx.ay.as_mut(),
            earmic_changes: &mut ctx.earmic_changes,
            earmic_level: ctx.earmic_level,
        };
        view.io_write(0xFFFD, 7); // select MixerControl
        view.io_write(0xBFFD, 0x3E); // write it
        view.io_write(0xFFFD, 7); // re-select to read back
        assert_eq!(view.io_read(0xBFFD), 0x3E);
    }

    #[test]
    fn keyboard_row_reports_pressed_key_as_clear_bit() {
        let mut ctx = boot_context();
        ctx.set_key_row(0, 0b1111_1110); // CAPS SHIFT (bit 0) held on row 0xFE
        let mut view = CpuBus {
            memory: &mut ctx.memory,
            ports: &mut ctx.ports,
            video: &mut ctx.video,
            debugger: &mut ctx.debugger,
            keys: &ctx.keys,
            ear_in: false,
            mode: MemMode::Fast,
            cpu_t: 0,
            pending_hit: None,
            ay: ctx.ay.as_mut(),
            earmic_changes: &mut ctx.earmic_changes,
            earmic_level: ctx.earmic_level,
        };
        assert_eq!(view.io_read(0xFEFE) & 0x1F, 0b0001_1110);
    }

    #[test]
    fn exec_breakpoint_is_not_tripped_by_step_cpu_itself() {
        let mut ctx = boot_context();
        ctx.memory.load_rom_page(0, &[0x00, 0x00]);
        ctx.debugger.breakpoints.add_memory(0x0000, crate::debug::breakpoints::BreakpointKind::EXEC);
        ctx.step_cpu();
        assert!(ctx.take_pending_breakpoint().is_none());
    }
}
