/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::convert::TryInto;
use core::iter;
use std::io::{self, Write, Result};

use zxcore_core::context::Context;
use zxcore_core::platform::Model;
use zxcore_core::video::BorderColor;

use crate::snapshot::*;
use crate::StructWrite;
use super::common::*;
use super::compress::*;

fn init_z80_header(header: &mut Header, version: Z80Version, ctx: &Context, border: BorderColor) {
    let regs = &ctx.cpu.regs;
    let r = regs.r;
    let flags1 = if version == Z80Version::V1 {
        Flags1::MEM_COMPRESSED
    }
    else {
        Flags1::empty()
    }
    .with_border_color(border)
    .with_refresh_high_bit(r);
    let flags2 = Flags2::empty()
        .with_interrupt_mode(regs.im)
        .with_issue2_emulation(zxcore_core::chip::ReadEarMode::Issue3);

    header.a = regs.af.hi();
    header.f = regs.af.lo();
    header.bc = regs.bc.0.to_le_bytes();
    header.hl = regs.hl.0.to_le_bytes();
    header.pc = if version == Z80Version::V1 { regs.pc } else { 0 }.to_le_bytes();
    header.sp = regs.sp.to_le_bytes();
    header.i = regs.i;
    header.r7 = r & ((!0) >> 1);
    header.flags1 = flags1.bits();
    header.de = regs.de.0.to_le_bytes();
    header.bc_alt = regs.bc_alt.0.to_le_bytes();
    header.de_alt = regs.de_alt.0.to_le_bytes();
    header.hl_alt = regs.hl_alt.0.to_le_bytes();
    header.a_alt = regs.af_alt.hi();
    header.f_alt = regs.af_alt.lo();
    header.iy = regs.iy.to_le_bytes();
    header.ix = regs.ix.to_le_bytes();
    header.iff1 = if regs.iff1 { !0 } else { 0 };
    header.iff2 = if regs.iff2 { !0 } else { 0 };
    header.flags2 = flags2.bits();
}

/// Picks the V2/V3 `hw_mode` byte for a model this crate emulates. Inverse of
/// [`super::loader::select_hw_model`]'s non-extension branches.
fn hw_mode_for(model: Model, result: &mut SnapshotResult) -> u8 {
    match model {
        Model::Spectrum48 => 0,
        Model::Spectrum128 => 3,
        Model::SpectrumPlus2 => 12,
        Model::SpectrumPlus2A => 13,
        Model::SpectrumPlus3 => {
            result.insert(SnapshotResult::MODEL_NSUP);
            7
        }
        Model::Pentagon128 => 9,
        Model::Scorpion256 => 10,
        Model::Pentagon512 | Model::Pentagon1024 | Model::Profi | Model::TsConf => {
            result.insert(SnapshotResult::MODEL_NSUP);
            9
        }
    }
}

fn init_z80_header_ex(head_ex: &mut HeaderEx, ctx: &Context, result: &mut SnapshotResult) {
    head_ex.pc = ctx.cpu.regs.pc.to_le_bytes();
    head_ex.hw_mode = hw_mode_for(ctx.model, result);

    if let Some(ay) = ctx.ay.as_ref() {
        head_ex.ay_sel_reg = ay.selected_register();
        head_ex.ay_regs = ay.register_snapshot();
    }

    head_ex.port1 = match ctx.model {
        Model::Spectrum128 | Model::SpectrumPlus2 | Model::SpectrumPlus2A | Model::SpectrumPlus3
            | Model::Pentagon128 | Model::Pentagon512 | Model::Pentagon1024
            | Model::Scorpion256 | Model::Profi | Model::TsConf => ctx.ports.standard_paging_byte(),
        Model::Spectrum48 => 0,
    };
    head_ex.flags3 = Flags3::empty().bits();
    result.insert(SnapshotResult::JOYSTICK_NSUP);
}

fn save_ram_pages<W: Write, I: Iterator<Item=(u8, u16, bool)>>(
        mut wr: W,
        ctx: &Context,
        pages: I
    ) -> Result<()>
{
    let mut buf = Vec::with_capacity(0x1000);
    for (ptype, index, is_rom) in pages {
        buf.clear();
        let mem_slice: &[u8] = if is_rom {
            &ctx.memory.rom_page(index)[..]
        } else {
            &ctx.memory.ram_page(index)[..]
        };
        compress_write_all(mem_slice, &mut buf)?;
        let (mem_head, slice) = match buf.len().try_into() {
            Ok(core::u16::MAX)|Err(..) => {
                (MemoryHeader::new(core::u16::MAX, ptype), mem_slice)
            }
            Ok(length) => (MemoryHeader::new(length, ptype), &buf[..]),
        };
        mem_head.write_struct(wr.by_ref())?;
        wr.write_all(slice)?;
    }
    wr.flush()
}

fn save_all_v2v3<W: Write>(
        version: Z80Version,
        ctx: &Context,
        header: &Header,
        head_ex: &HeaderEx,
        mut wr: W
    ) -> Result<()>
{
    header.write_struct(wr.by_ref())?;
    let ex_len: u16 = match version {
        Z80Version::V2 => 23,
        Z80Version::V3 if head_ex.port2 != 0 => 55,
        Z80Version::V3 => 54,
        _ => unreachable!()
    };
    wr.write_all(&ex_len.to_le_bytes()[..])?;
    head_ex.write_struct_with_limit(wr.by_ref(), ex_len as usize)?;

    match ctx.model {
        Model::Spectrum48 => {
            save_ram_pages(wr, ctx, [(8u8, 0u16, false), (4, 1, false), (5, 2, false)].into_iter())
        }
        _ => {
            save_ram_pages(wr, ctx,
                iter::once((0u8, 1u16, true))
                    .chain((0..8u16).map(|page| (page as u8 + 3, page, false)))
            )
        }
    }
}

/// Saves a **Z80** version 1 file into `wr` from `ctx`. Only valid for [`Model::Spectrum48`].
///
/// # Errors
/// This function may return an error from attempts to write the file or if `ctx`'s model can't
/// be represented by this version of the format.
pub fn save_z80v1<W: Write>(ctx: &Context, mut wr: W) -> Result<SnapshotResult> {
    if ctx.model != Model::Spectrum48 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput,
                        "Z80: can't create a version 1 snapshot of this computer model"))
    };
    let mut result = SnapshotResult::OK;
    if ctx.ay.is_some() {
        result.insert(SnapshotResult::SOUND_CHIP_NSUP);
    }
    result.insert(SnapshotResult::JOYSTICK_NSUP);

    let border = BorderColor::from_bits_truncate(ctx.video.border_color & 0x07);

    let mut header = Header::default();
    init_z80_header(&mut header, Z80Version::V1, ctx, border);

    header.write_struct(wr.by_ref())?;
    let mem_slice = &ctx.memory.ram_page(0)[..];
    compress_write_all(mem_slice, wr.by_ref())?;
    let mem_slice = &ctx.memory.ram_page(1)[..];
    compress_write_all(mem_slice, wr.by_ref())?;
    let mem_slice = &ctx.memory.ram_page(2)[..];
    compress_write_all(mem_slice, wr.by_ref())?;

    wr.write_all(MEMORY_V1_TERM)?;
    wr.flush()?;
    Ok(result)
}

/// Saves a **Z80** version 2 file into `wr` from `ctx`.
///
/// # Errors
/// This function may return an error from attempts to write the file.
pub fn save_z80v2<W: Write>(ctx: &Context, wr: W) -> Result<SnapshotResult> {
    let mut result = SnapshotResult::OK;
    let border = BorderColor::from_bits_truncate(ctx.video.border_color & 0x07);

    let mut header = Header::default();
    init_z80_header(&mut header, Z80Version::V2, ctx, border);

    let mut head_ex = HeaderEx::default();
    init_z80_header_ex(&mut head_ex, ctx, &mut result);

    save_all_v2v3(Z80Version::V2, ctx, &header, &head_ex, wr)?;
    Ok(result)
}

/// Saves a **Z80** version 3 file into `wr` from `ctx`.
///
/// # Errors
/// This function may return an error from attempts to write the file.
pub fn save_z80v3<W: Write>(ctx: &Context, wr: W) -> Result<SnapshotResult> {
    let mut result = SnapshotResult::OK;
    let border = BorderColor::from_bits_truncate(ctx.video.border_color & 0x07);

    let mut header = Header::default();
    init_z80_header(&mut header, Z80Version::V3, ctx, border);

    let mut head_ex = HeaderEx::default();
    init_z80_header_ex(&mut head_ex, ctx, &mut result);

    let (ts_lo, ts_hi) = cycles_to_z80(ctx.cpu.regs.t, ctx.model);
    head_ex.ts_lo = ts_lo.to_le_bytes();
    head_ex.ts_hi = ts_hi;
    head_ex.fn1 = !0;
    head_ex.fn2 = !0;

    if let Model::SpectrumPlus2A | Model::SpectrumPlus3 = ctx.model {
        head_ex.port2 = 0;
    }

    save_all_v2v3(Z80Version::V3, ctx, &header, &head_ex, wr)?;
    Ok(result)
}
