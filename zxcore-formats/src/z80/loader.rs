use std::io::{self, Read, Result};

use zxcore_core::context::Context;
use zxcore_core::platform::Model;
use zxcore_core::z80::regs::RegPair;

use crate::snapshot::*;
use crate::StructRead;

use super::common::*;
use super::decompress::*;

/// Maps a **Z80** v2/v3 `hw_mode` byte (plus the "alternate" bit in `flags3`) to one of the
/// models this crate actually emulates. Hardware the **Z80** format can encode but this engine
/// doesn't wire up a peripheral for (Interface 1, +D, DISCiPLE, SAM RAM, Timex) collapses onto
/// the plain model it's an add-on to; snapshots that depend on that peripheral ROM being paged
/// in won't restore correctly, but the register/memory state does.
fn select_hw_model(version: Z80Version, head_ex: &HeaderEx) -> Option<Model> {
    let hw_mode = head_ex.hw_mode;
    let flags3 = Flags3::from(head_ex.flags3);
    use Z80Version::*;
    Some(match (hw_mode, version) {
        (0, _) | (1, _) | (2, _) => Model::Spectrum48,
        (3, V2) | (4, V3) if flags3.is_alt_hw_mode() => Model::SpectrumPlus2,
        (3, V2) | (4, V3) => Model::Spectrum128,
        (3, V3) => Model::Spectrum48,
        (4, V2) | (5, V3) => Model::Spectrum128,
        (6, V3) => Model::Spectrum128,
        (7, _) | (8, _) if flags3.is_alt_hw_mode() => Model::SpectrumPlus2A,
        (7, _) | (8, _) => Model::SpectrumPlus3,
        (9, _) => Model::Pentagon128,
        (10, _) => Model::Scorpion256,
        (12, _) => Model::SpectrumPlus2,
        (13, _) => Model::SpectrumPlus2A,
        _ => return None,
    })
}

/// Maps a V2/V3 memory page number onto a RAM or ROM pool index, for the models this crate
/// emulates. `None` means the page number doesn't apply to `model` (e.g. a SAM RAM bank on a
/// plain 48k machine) and should be skipped.
fn mem_page_to_slot(page: u8, model: Model) -> Option<(bool, u16)> {
    match model {
        Model::Spectrum48 => match page {
            8 => Some((false, 0)),
            4 => Some((false, 1)),
            5 => Some((false, 2)),
            _ => None,
        },
        _ => match page {
            0 => Some((true, 1)),
            2 => Some((true, 0)),
            3..=10 => Some((false, (page - 3) as u16)),
            _ => None,
        },
    }
}

fn apply_header(head: &Header, ctx: &mut Context) -> Result<()> {
    ctx.cpu.reset();
    let regs = &mut ctx.cpu.regs;
    regs.i = head.i;
    regs.hl_alt = RegPair(u16::from_le_bytes(head.hl_alt));
    regs.de_alt = RegPair(u16::from_le_bytes(head.de_alt));
    regs.bc_alt = RegPair(u16::from_le_bytes(head.bc_alt));
    regs.af_alt = RegPair(u16::from_le_bytes([head.f_alt, head.a_alt]));
    regs.hl = RegPair(u16::from_le_bytes(head.hl));
    regs.de = RegPair(u16::from_le_bytes(head.de));
    regs.bc = RegPair(u16::from_le_bytes(head.bc));
    regs.iy = u16::from_le_bytes(head.iy);
    regs.ix = u16::from_le_bytes(head.ix);
    regs.iff1 = head.iff1 != 0;
    regs.iff2 = head.iff2 != 0;
    regs.r = Flags1::from(head.flags1).mix_r(head.r7);
    regs.af = RegPair(u16::from_le_bytes([head.f, head.a]));
    regs.sp = u16::from_le_bytes(head.sp);
    regs.im = Flags2::from(head.flags2).interrupt_mode()?;
    regs.pc = u16::from_le_bytes(head.pc);
    Ok(())
}

/// Loads a **Z80** file into `ctx`. `ctx`'s model is overwritten to whatever the file's header
/// describes (clamped to the models in [`Model`]); callers that want to reject a mismatched
/// model should check `ctx.model` after a successful call.
pub fn load_z80<R: Read>(mut rd: R, ctx: &mut Context) -> Result<()> {
    let header = Header::read_new_struct(rd.by_ref())?;
    let mut version = Z80Version::V1;

    apply_header(&header, ctx)?;

    let header_ex = if ctx.cpu.regs.pc == 0 {
        let (ver, head_ex) = load_header_ex(rd.by_ref())?;
        version = ver;
        ctx.cpu.regs.pc = u16::from_le_bytes(head_ex.pc);
        let model = select_hw_model(version, &head_ex).ok_or_else(||
            io::Error::new(io::ErrorKind::InvalidData, "Z80: unsupported hardware mode")
        )?;
        ctx.model = model;
        Some(head_ex)
    }
    else {
        ctx.model = Model::Spectrum48;
        None
    };

    let flags1 = Flags1::from(header.flags1);
    let border = flags1.border_color();
    ctx.video.border_color = u8::from(border);
    let mut buf = Vec::new();
    if version == Z80Version::V1 {
        if flags1.is_mem_compressed() {
            rd.read_to_end(&mut buf)?;
            let buf = match buf.get(buf.len().saturating_sub(4)..) {
                Some(MEMORY_V1_TERM) => &buf[..buf.len() - 4],
                _ => &buf[..]
            };
            let mut decompress = MemDecompress::new(buf);
            for page in 0..3u16 {
                decompress.read_exact(&mut ctx.memory.ram_page_mut(page)[..])?;
            }
        }
        else {
            for page in 0..3u16 {
                rd.read_exact(&mut ctx.memory.ram_page_mut(page)[..])?;
            }
        }
    }
    else {
        while let Some((len, page, is_compressed)) = load_mem_header(rd.by_ref())? {
            let (is_rom, index) = mem_page_to_slot(page, ctx.model).ok_or_else(||
                io::Error::new(io::ErrorKind::InvalidData, "Z80: unsupported memory page")
            )?;
            let dest: &mut [u8] = if is_rom {
                &mut ctx.memory.rom_page_mut(index)[..]
            } else {
                &mut ctx.memory.ram_page_mut(index)[..]
            };
            if is_compressed {
                buf.resize(len, 0);
                rd.read_exact(&mut buf)?;
                let mut decompress = MemDecompress::new(&buf);
                decompress.read_exact(dest)?;
            }
            else {
                rd.by_ref().take(len as u64).read_exact(dest)?;
            }
        }
    }

    if let Some(head_ex) = header_ex {
        if ctx.model.has_ay() {
            if let Some(ay) = ctx.ay.as_mut() {
                for (reg, &value) in head_ex.ay_regs.iter().enumerate() {
                    ay.select(reg as u8);
                    ay.write(0, value);
                }
                ay.select(head_ex.ay_sel_reg & 0x0F);
            }
        }

        if version == Z80Version::V3 {
            let ts = z80_to_cycles(u16::from_le_bytes(head_ex.ts_lo), head_ex.ts_hi, ctx.model);
            ctx.cpu.regs.t = ts;
        }

        match ctx.model {
            Model::Spectrum128 | Model::SpectrumPlus2 | Model::SpectrumPlus2A
                | Model::SpectrumPlus3 | Model::Pentagon128 | Model::Pentagon512
                | Model::Pentagon1024 | Model::Scorpion256 | Model::Profi | Model::TsConf => {
                ctx.ports.decode_out(&mut ctx.memory, 0x7ffd, head_ex.port1);
            }
            Model::Spectrum48 => {}
        }
    }
    Ok(())
}
