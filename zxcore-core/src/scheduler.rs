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
//! The main loop (spec §4.9). A host calls [`run_frame`] once per display refresh (driving it
//! from its own thread/timer is the host's job, per spec §1's "desktop shell" Non-goal); this
//! module only contains the per-frame work, not the thread that repeats it.
use crate::bus::Event;
use crate::context::Context;
use crate::debug::breakpoints::StepKind;
use crate::debug::disassembler;

/// What [`run_frame`] (or a single-step call) stopped for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A full frame ran to completion (subject to interrupt acceptance and t-state wraparound).
    FrameReady { frame_counter: u32 },
    /// A user breakpoint fired; the context is left paused with `pc` at the breakpoint address.
    BreakpointHit { id: u32, address: u16 },
}

/// Runs t-states up to one frame's worth, then accepts the interrupt, wraps the clock and
/// publishes `FRAME_READY` (spec §4.9 pseudocode, reproduced here step for step). Returns
/// immediately without doing anything if the context is paused.
pub fn run_frame(ctx: &mut Context) -> FrameOutcome {
    if ctx.is_paused() {
        return FrameOutcome::FrameReady { frame_counter: ctx.frame_counter() };
    }
    loop {
        if ctx.cpu.regs.t >= ctx.timing.frame_tstates {
            break;
        }
        let pc = ctx.cpu.pc();
        if let Some(id) = ctx.debugger.breakpoints.check_exec(pc) {
            ctx.pause();
            ctx.publish(Event::BreakpointHit { id, address: pc });
            return FrameOutcome::BreakpointHit { id, address: pc };
        }
        ctx.step_cpu();
        if let Some(id) = ctx.take_pending_breakpoint() {
            let address = ctx.cpu.pc();
            ctx.pause();
            ctx.publish(Event::BreakpointHit { id, address });
            return FrameOutcome::BreakpointHit { id, address };
        }
        if ctx.screen_hq {
            let t = ctx.cpu.regs.t;
            let screen_page = ctx.screen_ram_page();
            ctx.video.draw_up_to(t, &ctx.memory, screen_page);
        }
    }
    if !ctx.screen_hq {
        let screen_page = ctx.screen_ram_page();
        ctx.video.render_frame_batch(&ctx.memory, screen_page);
    }
    ctx.accept_irq();
    let frame_t = ctx.timing.frame_tstates;
    ctx.flush_audio_frame(frame_t);
    ctx.cpu.regs.t -= frame_t;
    ctx.cpu.regs.eipos -= frame_t;
    ctx.video.begin_frame();
    let frame_counter = ctx.bump_frame_counter();
    ctx.publish(Event::VideoFrameRefresh { frame_counter });
    ctx.publish(Event::AudioFrameReady { frame_counter });
    FrameOutcome::FrameReady { frame_counter }
}

/// `Step`: executes exactly one instruction, ignoring the frame t-state budget and the paused
/// flag (spec §4.9, §6 command surface). Still honours an EXEC breakpoint at the current `pc`.
pub fn step_instruction(ctx: &mut Context) -> FrameOutcome {
    let pc = ctx.cpu.pc();
    if let Some(id) = ctx.debugger.breakpoints.check_exec(pc) {
        ctx.pause();
        ctx.publish(Event::BreakpointHit { id, address: pc });
        return FrameOutcome::BreakpointHit { id, address: pc };
    }
    ctx.step_cpu();
    if let Some(id) = ctx.take_pending_breakpoint() {
        let address = ctx.cpu.pc();
        ctx.pause();
        ctx.publish(Event::BreakpointHit { id, address });
        return FrameOutcome::BreakpointHit { id, address };
    }
    ctx.set_paused_flag(true);
    FrameOutcome::FrameReady { frame_counter: ctx.frame_counter() }
}

/// Upper bound on instructions run while chasing a transient step breakpoint, so a runaway
/// `JP`/tight loop can't hang a `StepOver`/`StepOut` call forever.
const MAX_STEP_INSTRUCTIONS: u32 = 1_000_000;

/// `StepOver`: runs past a `CALL`/`RST` in one go by arming a temporary breakpoint just after it
/// (spec §4.9: "installing a temporary breakpoint at the address of the instruction following the
/// current one"); any other instruction behaves exactly like [`step_instruction`].
pub fn step_over(ctx: &mut Context) -> FrameOutcome {
    let pc = ctx.cpu.pc();
    let decoded = decode_at(ctx, pc);
    let is_call = decoded.mnemonic.starts_with("call") || decoded.mnemonic.starts_with("rst");
    if !is_call {
        return step_instruction(ctx);
    }
    let after = pc.wrapping_add(decoded.length as u16);
    ctx.debugger.breakpoints.arm_step(after, StepKind::Over);
    run_until_step_hit(ctx, StepKind::Over)
}

/// `StepOut`: arms a temporary breakpoint at the address on top of the stack (the return address
/// of the call we're presumed to be inside) and runs until it's hit (spec §4.9).
pub fn step_out(ctx: &mut Context) -> FrameOutcome {
    let return_addr = ctx.memory.read_z80_16(ctx.cpu.regs.sp);
    ctx.debugger.breakpoints.arm_step(return_addr, StepKind::Out);
    run_until_step_hit(ctx, StepKind::Out)
}

fn decode_at(ctx: &Context, pc: u16) -> disassembler::DecodedInstruction {
    let mut buf = [0u8; 4];
    for (i, b) in buf.iter_mut().enumerate() {
        *b = ctx.memory.read_z80(pc.wrapping_add(i as u16));
    }
    disassembler::decode(&buf)
}

fn run_until_step_hit(ctx: &mut Context, kind: StepKind) -> FrameOutcome {
    for _ in 0..MAX_STEP_INSTRUCTIONS {
        let pc = ctx.cpu.pc();
        if let Some(hit_kind) = ctx.debugger.breakpoints.take_step_hit(pc) {
            debug_assert_eq!(hit_kind, kind);
            ctx.set_paused_flag(true);
            return FrameOutcome::FrameReady { frame_counter: ctx.frame_counter() };
        }
        if let Some(id) = ctx.debugger.breakpoints.check_exec(pc) {
            ctx.debugger.breakpoints.cancel_step();
            ctx.pause();
            ctx.publish(Event::BreakpointHit { id, address: pc });
            return FrameOutcome::BreakpointHit { id, address: pc };
        }
        ctx.step_cpu();
        if let Some(id) = ctx.take_pending_breakpoint() {
            ctx.debugger.breakpoints.cancel_step();
            let address = ctx.cpu.pc();
            ctx.pause();
            ctx.publish(Event::BreakpointHit { id, address });
            return FrameOutcome::BreakpointHit { id, address };
        }
    }
    ctx.debugger.breakpoints.cancel_step();
    ctx.set_paused_flag(true);
    FrameOutcome::FrameReady { frame_counter: ctx.frame_counter() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineConfig;
    use crate::platform::Model;

    fn boot() -> Context {
        Context::new(EngineConfig::new(Model::Spectrum48)).unwrap()
    }

    #[test]
    fn run_frame_wraps_t_states_and_bumps_frame_counter() {
        let mut ctx = boot();
        ctx.memory.load_rom_page(0, &[0x18, 0xFE]); // JR $ (spins on itself)
        let outcome = run_frame(&mut ctx);
        match outcome {
            FrameOutcome::FrameReady { frame_counter } => assert_eq!(frame_counter, 1),
            _ => panic!("expected a completed frame"),
        }
        assert!(ctx.cpu.regs.t < ctx.timing.frame_tstates);
    }

    #[test]
    fn run_frame_flushes_audio_without_a_sink_installed() {
        let mut ctx = boot();
        ctx.memory.load_rom_page(0, &[0x3E, 0x10, 0xD3, 0xFE, 0x18, 0xFA]); // LD A,0x10;OUT(FE),A;JR $-6
        let outcome = run_frame(&mut ctx);
        assert!(matches!(outcome, FrameOutcome::FrameReady { .. }));
    }

    #[test]
    fn run_frame_stops_and_reports_exec_breakpoint() {
        let mut ctx = boot();
        ctx.memory.load_rom_page(0, &[0x00, 0x00, 0x00]);
        ctx.debugger.breakpoints.add_memory(0x0001, crate::debug::breakpoints::BreakpointKind::EXEC);
        let outcome = run_frame(&mut ctx);
        assert_eq!(outcome, FrameOutcome::BreakpointHit { id: 0, address: 0x0001 });
        assert!(ctx.is_paused());
    }

    #[test]
    fn step_instruction_advances_exactly_one_opcode() {
        let mut ctx = boot();
        ctx.memory.load_rom_page(0, &[0x00, 0x00]);
        step_instruction(&mut ctx);
        assert_eq!(ctx.cpu.pc(), 1);
    }

    #[test]
    fn step_over_skips_a_call_in_one_go() {
        let mut ctx = boot();
        // CALL 0x0010; NOP -- and a RET at 0x0010.
        let mut rom = [0u8; crate::memory::PAGE_SIZE];
        rom[0] = 0xCD;
        rom[1] = 0x10;
        rom[2] = 0x00;
        rom[0x0010] = 0xC9; // RET
        ctx.memory.load_rom_page(0, &rom);
        ctx.cpu.regs.sp = 0x5000;
        let outcome = step_over(&mut ctx);
        assert_eq!(ctx.cpu.pc(), 3);
        assert!(matches!(outcome, FrameOutcome::FrameReady { .. }));
    }
}
