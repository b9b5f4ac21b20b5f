/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    For the full copyright notice, see the lib.rs file.
*/
/*! **SNA** snapshot format utilities.

48k `SNA` file (LSB first):

| offset | size  | description                              |
|--------|-------|------------------------------------------|
|      0 |     1 | register: I                              |
|      1 |     6 | registers: HL', DE', BC'                 |
|      7 |     2 | registers: AF'                           |
|      9 |     6 | registers: HL, DE, BC                    |
|     15 |     4 | registers: IY, IX                        |
|     19 |     1 | interrupt flags: bit 1=IFF1, bit 2=IFF1) |
|     20 |     1 | register: R                              |
|     21 |     4 | registers: AF                             |
|     23 |     4 | register: SP                             |
|     25 |     1 | interrupt mode: 0=IM0, 1=IM1, 2=IM2      |
|     26 |     1 | border color: 0..=7                      |
|     27 | 49152 | bytes: RAM 16384..=65535                 |

Total size: `49179` bytes

128k extended `SNA` file:

| offset | size  | description                                   |
|--------|-------|-----------------------------------------------|
|      0 |    27 | 48k `SNA` header                              |
|     27 | 16384 | bytes: RAM page 1, bank 5                     |
|  16411 | 16384 | bytes: RAM page 2, bank 2                     |
|  32795 | 16384 | bytes: RAM page 3, currently paged bank       |
|  49179 |     2 | register:  PC                                 |
|  49181 |     1 | byte: last OUT to 0x7ffd                      |
|  49182 |     1 | byte: TR-DOS ROM 1=paged, 0=not paged         |
|  49183 |*16384 | bytes: remaining RAM banks in ascending order |

Total size:
* `131103` bytes if RAM page 3 is not one of bank 5 or bank 2
* `147487` bytes if RAM page 3 is bank 5 or bank 2 (included twice)

Loading and saving operate directly on a [`zxcore_core::context::Context`]: there's one concrete
CPU and one concrete memory manager in this crate, so there's nothing for a generic snapshot
trait to abstract over.
*/
use std::io::{ErrorKind, Error, Read, Write, Seek, SeekFrom, Result};

use zxcore_core::{
    context::Context,
    ports::flags::Ula128MemFlags,
    video::BorderColor,
    z80::regs::{IntMode, RegPair},
};

use crate::{StructRead, StructWrite};
use super::snapshot::*;

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
#[repr(packed)]
struct SnaHeader {
    i: u8,
    hl_alt: [u8;2],
    de_alt: [u8;2],
    bc_alt: [u8;2],
    f_alt: u8,
    a_alt: u8,
    hl: [u8;2],
    de: [u8;2],
    bc: [u8;2],
    iy: [u8;2],
    ix: [u8;2],
    iffs: u8,
    r: u8,
    f: u8,
    a: u8,
    sp: [u8;2],
    im: u8,
    border: u8
}

#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
#[repr(packed)]
struct SnaHeader128 {
    pc: [u8;2],
    port_data: u8,
    trdos_rom: u8
}

// Structs must be packed and consist of `u8` or/and arrays of `u8` primitives only.
unsafe impl StructRead for SnaHeader {}
unsafe impl StructRead for SnaHeader128 {}
unsafe impl StructWrite for SnaHeader {}
unsafe impl StructWrite for SnaHeader128 {}

/// The length in bytes of the 48k **SNA** file.
pub const SNA_LENGTH: u64 = 49179;

const PAGE_SIZE: usize = 0x4000;

fn int_mode_from_byte(byte: u8) -> Result<IntMode> {
    match byte {
        0 => Ok(IntMode::Im0),
        1 => Ok(IntMode::Im1),
        2 => Ok(IntMode::Im2),
        _ => Err(Error::new(ErrorKind::InvalidData, "Not a proper SNA block: invalid interrupt mode")),
    }
}

fn int_mode_to_byte(im: IntMode) -> u8 {
    match im {
        IntMode::Im0 => 0,
        IntMode::Im1 => 1,
        IntMode::Im2 => 2,
    }
}

fn read_header<R: Read>(rd: R, ctx: &mut Context) -> Result<BorderColor> {
    let sna = SnaHeader::read_new_struct(rd)?;
    ctx.cpu.reset();
    let regs = &mut ctx.cpu.regs;
    regs.i = sna.i;
    regs.hl_alt = RegPair(u16::from_le_bytes(sna.hl_alt));
    regs.de_alt = RegPair(u16::from_le_bytes(sna.de_alt));
    regs.bc_alt = RegPair(u16::from_le_bytes(sna.bc_alt));
    regs.af_alt = RegPair(u16::from_le_bytes([sna.f_alt, sna.a_alt]));
    regs.hl = RegPair(u16::from_le_bytes(sna.hl));
    regs.de = RegPair(u16::from_le_bytes(sna.de));
    regs.bc = RegPair(u16::from_le_bytes(sna.bc));
    regs.iy = u16::from_le_bytes(sna.iy);
    regs.ix = u16::from_le_bytes(sna.ix);
    let iff = sna.iffs & (1<<2) != 0;
    regs.iff1 = iff;
    regs.iff2 = iff;
    regs.r = sna.r;
    regs.af = RegPair(u16::from_le_bytes([sna.f, sna.a]));
    regs.sp = u16::from_le_bytes(sna.sp);
    regs.im = int_mode_from_byte(sna.im)?;
    BorderColor::from_bits(sna.border & 0x07)
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "SNA: invalid border color"))
}

/// Reads a 48k **SNA** file and inserts its content into the provided machine's memory and
/// registers. Returns a border color on success.
///
/// # Note
/// This function handles only the 48k **SNA** files.
///
/// # Errors
/// This function will return an error if the file is too small.
/// Other errors may also be returned from attempts to read the file.
pub fn read_sna48<R: Read>(mut rd: R, ctx: &mut Context) -> Result<BorderColor> {
    let border = read_header(rd.by_ref(), ctx)?;
    let sp = ctx.cpu.regs.sp;
    ctx.cpu.regs.sp = sp.wrapping_add(2);
    ctx.cpu.regs.r = ctx.cpu.regs.r.wrapping_add(2); // RETN would increase this 2 times
    let mut buf = [0u8; 1];
    for addr in 0x4000..=0xFFFFu32 {
        rd.read_exact(&mut buf).map_err(|_| {
           Error::new(ErrorKind::InvalidData, "SNA: needs at least 48k RAM memory")
        })?;
        ctx.memory.write_z80(addr as u16, buf[0]);
    }
    ctx.cpu.regs.pc = ctx.memory.read_z80_16(sp);
    Ok(border)
}

/// Reads a slice of RAM, page by page, from `rd` into `mem`'s RAM page pool, where `range` is
/// expressed in linear RAM byte offsets (`page * PAGE_SIZE .. (page + 1) * PAGE_SIZE`).
fn read_ram_range<R: Read>(rd: &mut R, mem: &mut zxcore_core::memory::MemoryManager, start: usize, end: usize) -> Result<()> {
    let mut offset = start;
    while offset < end {
        let page = (offset / PAGE_SIZE) as u16;
        let page_off = offset % PAGE_SIZE;
        let take = (end - offset).min(PAGE_SIZE - page_off);
        rd.read_exact(&mut mem.ram_page_mut(page)[page_off..page_off + take])?;
        offset += take;
    }
    Ok(())
}

/// Loads an **SNA** file from `rd` into `ctx`.
///
/// Requires both [Read] and [Seek] implementations to determine the file version.
///
/// # Errors
/// This function will return an error if the file size is incorrect, the stream doesn't match
/// `ctx`'s model, or there is something wrong with the format.
/// Other errors may also be returned from attempts to read the file.
pub fn load_sna<R: Read + Seek>(mut rd: R, ctx: &mut Context) -> Result<()> {
    let cur_pos = rd.seek(SeekFrom::Current(0))?;
    let end_pos = rd.seek(SeekFrom::Current(SNA_LENGTH as i64))?;
    if end_pos - cur_pos != SNA_LENGTH {
        return Err(Error::new(ErrorKind::InvalidData, "SNA: wrong size of the supplied stream"));
    }

    let mut sna_ext = SnaHeader128::default();
    let ext_read = sna_ext.read_struct_or_nothing(rd.by_ref())?;

    rd.seek(SeekFrom::Start(cur_pos))?;

    if !ext_read {
        return load_sna48(rd, ctx)
    }

    if ctx.model == zxcore_core::platform::Model::Spectrum48 {
        return Err(Error::new(ErrorKind::InvalidInput, "SNA: 128k snapshot needs a 128k-family model"));
    }

    let border = read_header(rd.by_ref(), ctx)?;
    ctx.cpu.regs.pc = u16::from_le_bytes(sna_ext.pc);
    ctx.video.border_color = u8::from(border);

    let index48 = [5usize, 2];
    let last_page = Ula128MemFlags::from_bits_truncate(sna_ext.port_data)
                    .last_ram_page_bank() as usize;
    for &page in index48.iter().chain(
                    Some(&last_page).filter(|n| !index48.contains(n))
                ) {
        read_ram_range(&mut rd, &mut ctx.memory, page * PAGE_SIZE, (page + 1) * PAGE_SIZE)?;
    }

    rd.seek(SeekFrom::Current(core::mem::size_of::<SnaHeader128>() as i64))?;

    for page in (0..8usize).filter(|n| !index48.contains(n) && *n != last_page) {
        read_ram_range(&mut rd, &mut ctx.memory, page * PAGE_SIZE, (page + 1) * PAGE_SIZE)?;
    }

    ctx.ports.decode_out(&mut ctx.memory, 0x7ffd, sna_ext.port_data);
    Ok(())
}

/// Loads a 48k **SNA** file from `rd` into `ctx`.
///
/// # Note
/// This function handles only the 48k **SNA** files.
///
/// # Errors
/// This function will return an error if the file is too small or the `SP` register points into the ROM page.
/// Other errors may also be returned from attempts to read the file.
pub fn load_sna48<R: Read>(mut rd: R, ctx: &mut Context) -> Result<()> {
    let border = read_header(rd.by_ref(), ctx)?;
    let sp = ctx.cpu.regs.sp;
    if sp < 0x4000 || sp == 0xFFFF  {
        return Err(Error::new(ErrorKind::InvalidData, "SNA: can't determine the PC address"))
    }
    ctx.cpu.regs.sp = sp.wrapping_add(2);
    ctx.cpu.regs.r = ctx.cpu.regs.r.wrapping_add(2); // RETN would increase this 2 times
    ctx.video.border_color = u8::from(border);

    let pc_offset = sp as usize - 0x4000;
    read_ram_range(&mut rd, &mut ctx.memory, 0, pc_offset)?;
    let mut pc = [0u8;2];
    rd.read_exact(&mut pc)?;
    ctx.cpu.regs.pc = u16::from_le_bytes(pc);
    let rest_offset = pc_offset + 2;
    if rest_offset < 0xC000 {
        read_ram_range(&mut rd, &mut ctx.memory, rest_offset, 0xC000)?;
    }
    Ok(())
}

fn make_header(ctx: &Context) -> SnaHeader {
    let regs = &ctx.cpu.regs;
    let mut sna = SnaHeader {
        i: regs.i,
        hl_alt: regs.hl_alt.0.to_le_bytes(),
        de_alt: regs.de_alt.0.to_le_bytes(),
        bc_alt: regs.bc_alt.0.to_le_bytes(),
        hl: regs.hl.0.to_le_bytes(),
        de: regs.de.0.to_le_bytes(),
        bc: regs.bc.0.to_le_bytes(),
        iy: regs.iy.to_le_bytes(),
        ix: regs.ix.to_le_bytes(),
        r: regs.r,
        im: int_mode_to_byte(regs.im),
        sp: regs.sp.to_le_bytes(),
        ..Default::default()
    };
    sna.a_alt = regs.af_alt.hi();
    sna.f_alt = regs.af_alt.lo();
    sna.a = regs.af.hi();
    sna.f = regs.af.lo();
    sna.iffs = (regs.iff1 as u8) << 2;
    sna
}

fn write_ram_range<W: Write>(wr: &mut W, mem: &zxcore_core::memory::MemoryManager, start: usize, end: usize) -> Result<()> {
    let mut offset = start;
    while offset < end {
        let page = (offset / PAGE_SIZE) as u16;
        let page_off = offset % PAGE_SIZE;
        let take = (end - offset).min(PAGE_SIZE - page_off);
        wr.write_all(&mem.ram_page(page)[page_off..page_off + take])?;
        offset += take;
    }
    Ok(())
}

/// Saves an **SNA** file into `wr` from `ctx`'s current state.
///
/// # Errors
/// This function may return an error from attempts to write the file or if for some reason
/// a snapshot could not be created (e.g. `SP` doesn't point into RAM).
pub fn save_sna<W: Write>(ctx: &Context, mut wr: W) -> Result<SnapshotResult> {
    use zxcore_core::platform::Model::*;
    let mut result = SnapshotResult::KEYB_ISSUE_NSUP;
    let is_128 = match ctx.model {
        Spectrum48 => false,
        Spectrum128 | SpectrumPlus2 => true,
        SpectrumPlus2A | SpectrumPlus3 | Pentagon128 | Pentagon512 | Pentagon1024
            | Scorpion256 | Profi | TsConf => {
            result.insert(SnapshotResult::MODEL_NSUP);
            true
        }
    };

    if ctx.ay.is_some() && !is_128 {
        result.insert(SnapshotResult::SOUND_CHIP_NSUP);
    }

    let mut sna = make_header(ctx);
    sna.border = ctx.video.border_color & 0x07;

    if !is_128 {
        return save_sna48(ctx, sna, wr, result)
    }

    let memflags = Ula128MemFlags::from_bits_truncate(ctx.ports.standard_paging_byte());
    let mut sna_ext = SnaHeader128 {
        pc: ctx.cpu.regs.pc.to_le_bytes(),
        port_data: memflags.bits(),
        ..Default::default()
    };

    sna.write_struct(wr.by_ref())?;

    let last_page: usize = memflags.last_ram_page_bank() as usize;
    let index48 = [5usize, 2, last_page];
    for &page in index48.iter() {
        write_ram_range(&mut wr, &ctx.memory, page * PAGE_SIZE, (page + 1) * PAGE_SIZE)?;
    }

    sna_ext.write_struct(wr.by_ref())?;

    for page in (0..8usize).filter(|n| !index48.contains(n) && *n != last_page) {
        write_ram_range(&mut wr, &ctx.memory, page * PAGE_SIZE, (page + 1) * PAGE_SIZE)?;
    }

    wr.flush()?;
    Ok(result)
}

fn save_sna48<W: Write>(
        ctx: &Context,
        mut sna: SnaHeader,
        mut wr: W,
        result: SnapshotResult
    ) -> Result<SnapshotResult>
{
    const ROMSIZE: usize = 0x4000;
    let ramtop = 0xFFFF;
    let sp = ctx.cpu.regs.sp.wrapping_sub(2);
    if (sp as usize) < ROMSIZE || sp as usize >= ramtop  {
        return Err(Error::new(ErrorKind::InvalidData, "SNA: can't store the PC address"))
    }
    sna.sp = sp.to_le_bytes();
    sna.write_struct(wr.by_ref())?;
    let pc = ctx.cpu.regs.pc.to_le_bytes();
    let pc_offset = sp as usize - ROMSIZE;
    write_ram_range(&mut wr, &ctx.memory, 0, pc_offset)?;
    wr.write_all(&pc)?;
    write_ram_range(&mut wr, &ctx.memory, pc_offset + 2, (ramtop + 1) - ROMSIZE)?;
    wr.flush()?;
    Ok(result)
}
