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
//! The per-t-state ULA rasteriser (spec §4.5, "Raster state" / "Framebuffer" in §3).
pub mod pixel;

use pixel::{Palette, SpectrumPalA8R8G8B8};

use bitflags::bitflags;

use crate::clock::{FTs, FrameTiming};
use crate::memory::MemoryManager;

bitflags! {
    /// The three EAR/MIC-adjacent bits of port `0xFE` that select the border colour.
    #[derive(Default)]
    pub struct BorderColor: u8 {
        const BLACK   = 0b000;
        const BLUE    = 0b001;
        const RED     = 0b010;
        const MAGENTA = 0b011;
        const GREEN   = 0b100;
        const CYAN    = 0b101;
        const YELLOW  = 0b110;
        const WHITE   = 0b111;
    }
}

/// Error returned by `BorderColor::try_from` for a byte outside `0..=7`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryFromU8BorderColorError(pub u8);

impl core::fmt::Display for TryFromU8BorderColorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "converted integer ({}) out of range for `BorderColor`", self.0)
    }
}

impl std::error::Error for TryFromU8BorderColorError {}

impl core::convert::TryFrom<u8> for BorderColor {
    type Error = TryFromU8BorderColorError;
    fn try_from(color: u8) -> Result<Self, Self::Error> {
        BorderColor::from_bits(color).ok_or(TryFromU8BorderColorError(color))
    }
}

impl From<BorderColor> for u8 {
    fn from(color: BorderColor) -> u8 {
        color.bits()
    }
}

/// What a given t-state within a line renders (spec §3 "Raster state").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    Blank,
    Border,
    Screen,
}

/// The geometric partition of one frame into blank/border/screen regions, rebuilt whenever the
/// video mode changes (spec §4.5).
#[derive(Clone, Debug)]
pub struct RasterState {
    pub total_tstates_per_frame: FTs,
    pub tstates_per_line: FTs,
    pub top_blank_lines: FTs,
    pub top_border_lines: FTs,
    pub screen_lines: FTs,
    pub bottom_border_lines: FTs,
    pub left_border_tstates: FTs,
    pub screen_tstates: FTs,
    pub right_border_tstates: FTs,
    /// One entry per t-state within a line; shared across all lines of the same region type.
    pub render_type_table: Vec<RenderKind>,
}

impl RasterState {
    /// Builds the raster partition for a 48K/Pentagon-shaped timing (24 blank, 24/48 border,
    /// 128 screen, 24/48 border t-states per half-line side) scaled to `timing.tstates_per_line`.
    pub fn for_timing(timing: FrameTiming) -> Self {
        let tstates_per_line = timing.tstates_per_line;
        let border_side = (tstates_per_line - 128 - 24) / 2;
        let mut render_type_table = vec![RenderKind::Blank; tstates_per_line as usize];
        for t in 0..tstates_per_line {
            render_type_table[t as usize] = if t < 24 {
                RenderKind::Blank
            } else if t < 24 + border_side {
                RenderKind::Border
            } else if t < 24 + border_side + 128 {
                RenderKind::Screen
            } else if t < 24 + border_side + 128 + border_side {
                RenderKind::Border
            } else {
                RenderKind::Blank
            };
        }
        RasterState {
            total_tstates_per_frame: timing.frame_tstates,
            tstates_per_line,
            top_blank_lines: 16,
            top_border_lines: 48,
            screen_lines: 192,
            bottom_border_lines: timing.lines_per_frame() - 16 - 48 - 192,
            left_border_tstates: 24 + border_side,
            screen_tstates: 128,
            right_border_tstates: border_side,
            render_type_table,
        }
    }

    pub fn lines_per_frame(&self) -> FTs {
        self.total_tstates_per_frame / self.tstates_per_line
    }
}

/// Row-major ARGB8888 pixel surface owned exclusively by the renderer; the host gets a
/// read-only view between `FRAME_READY` and the next scheduler tick (spec §5).
#[derive(Clone)]
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Framebuffer { width, height, pixels: vec![0; width * height] }
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }
}

/// ZX Spectrum's interleaved screen address layout: `y6 y5 | y2 y1 y0 | y5' y4 y3 | x4..x0`
/// (spec §4.5 "Address helpers").
pub fn screen_addr(x: u8, y: u8, base: u16) -> u16 {
    let col = (x >> 3) as u16 & 0x1F;
    let row_third = (y >> 6) as u16 & 0b11;
    let row_char = (y >> 3) as u16 & 0b111;
    let row_line = y as u16 & 0b111;
    base
        .wrapping_add(row_third << 11)
        .wrapping_add(row_line << 8)
        .wrapping_add(row_char << 5)
        .wrapping_add(col)
}

/// Attribute cell address for pixel `(x, y)`: `base + 0x1800 + (y/8)*32 + x/8`.
pub fn attr_addr(x: u8, y: u8, base: u16) -> u16 {
    base
        .wrapping_add(0x1800)
        .wrapping_add((y as u16 / 8) * 32)
        .wrapping_add(x as u16 / 8)
}

const INK_MASK: u8 = 0b0000_0111;
const PAPER_SHIFT: u8 = 3;
const BRIGHT_BIT: u8 = 0b0100_0000;
const FLASH_BIT: u8 = 0b1000_0000;

fn attr_colors(attr: u8, flash_phase: bool) -> (u8, u8) {
    let bright = if attr & BRIGHT_BIT != 0 { 8 } else { 0 };
    let mut ink = (attr & INK_MASK) | bright;
    let mut paper = ((attr >> PAPER_SHIFT) & INK_MASK) | bright;
    if attr & FLASH_BIT != 0 && flash_phase {
        core::mem::swap(&mut ink, &mut paper);
    }
    (ink, paper)
}

/// The ULA screen renderer: owns the framebuffer, the raster geometry, the flash counter and
/// the current border colour (driven by whatever routes `0xFE` OUTs here).
pub struct UlaVideo {
    pub raster: RasterState,
    pub framebuffer: Framebuffer,
    pub border_color: u8,
    frame_counter: u32,
    flash_phase: bool,
    /// Last t-state drawn up to, reset every frame (spec `Draw(tstate)`).
    drawn_up_to: FTs,
}

impl UlaVideo {
    pub fn new(timing: FrameTiming) -> Self {
        let raster = RasterState::for_timing(timing);
        UlaVideo {
            framebuffer: Framebuffer::new(256, 192 + 2 * 32),
            raster,
            border_color: 7,
            frame_counter: 0,
            flash_phase: false,
            drawn_up_to: 0,
        }
    }

    /// Advances the per-frame flash toggle (every 16 frames) and resets the incremental
    /// draw cursor; called once at the scheduler's frame boundary.
    pub fn begin_frame(&mut self) {
        self.drawn_up_to = 0;
        self.frame_counter = self.frame_counter.wrapping_add(1);
        if self.frame_counter % 16 == 0 {
            self.flash_phase = !self.flash_phase;
        }
    }

    /// `Draw(tstate)`: the HQ=on incremental path. Renders every whole line fully covered by
    /// `[drawn_up_to, t)` pixel-by-pixel from `memory`'s currently mapped screen bank.
    pub fn draw_up_to(&mut self, t: FTs, memory: &MemoryManager, screen_page: u16) {
        while self.drawn_up_to < t && self.drawn_up_to < self.raster.total_tstates_per_frame {
            self.draw_tstate(self.drawn_up_to, memory, screen_page);
            self.drawn_up_to += 1;
        }
    }

    fn draw_tstate(&mut self, t: FTs, memory: &MemoryManager, screen_page: u16) {
        let line = t / self.raster.tstates_per_line;
        let col = t % self.raster.tstates_per_line;
        let kind = self.raster.render_type_table[col as usize];
        let y = line - self.raster.top_blank_lines - self.raster.top_border_lines;
        match kind {
            RenderKind::Blank => {}
            RenderKind::Border => {
                let color = pixel_argb(self.border_color);
                let fb_y = (line - self.raster.top_blank_lines) as usize;
                let fb_x = (col - 0) as usize * 2;
                self.framebuffer.put(fb_x, fb_y, color);
                self.framebuffer.put(fb_x + 1, fb_y, color);
            }
            RenderKind::Screen if (0..192).contains(&y) => {
                let screen_col = (col - self.raster.left_border_tstates) as u8;
                let x = screen_col * 8;
                let row = y as u8;
                self.draw_char_column(memory, screen_page, x, row);
            }
            RenderKind::Screen => {}
        }
    }

    fn draw_char_column(&mut self, memory: &MemoryManager, screen_page: u16, x: u8, y: u8) {
        let page = memory.ram_page(screen_page);
        let pixel_addr = screen_addr(x, y, 0x0000);
        let attr_addr = attr_addr(x, y, 0x0000);
        let byte = page[pixel_addr as usize];
        let attr = page[attr_addr as usize];
        let (ink, paper) = attr_colors(attr, self.flash_phase);
        let fb_y = (self.raster.top_border_lines + y as FTs) as usize;
        for bit in 0..8u8 {
            let set = byte & (0x80 >> bit) != 0;
            let color = pixel_argb(if set { ink } else { paper });
            let fb_x = (self.raster.left_border_tstates as usize - 24) + (x as usize + bit as usize);
            self.framebuffer.put(fb_x, fb_y, color);
        }
    }

    /// `render_frame_batch()`: the HQ=off fast path. Skips the incremental t-state walk and
    /// paints border, then the 256x192 screen area, 8 pixels (one attribute cell width) at a
    /// time, directly from the mapped screen page.
    pub fn render_frame_batch(&mut self, memory: &MemoryManager, screen_page: u16) {
        let border = pixel_argb(self.border_color);
        for p in self.framebuffer.pixels.iter_mut() {
            *p = border;
        }
        let page = memory.ram_page(screen_page);
        for y in 0..192u16 {
            for cx in 0..32u16 {
                let x = (cx * 8) as u8;
                let pixel_addr = screen_addr(x, y as u8, 0x0000);
                let attr_addr = attr_addr(x, y as u8, 0x0000);
                let byte = page[pixel_addr as usize];
                let attr = page[attr_addr as usize];
                let (ink, paper) = attr_colors(attr, self.flash_phase);
                let fb_y = self.raster.top_border_lines as usize + y as usize;
                for bit in 0..8u8 {
                    let set = byte & (0x80 >> bit) != 0;
                    let color = pixel_argb(if set { ink } else { paper });
                    self.framebuffer.put(x as usize + bit as usize, fb_y, color);
                }
            }
        }
    }
}

fn pixel_argb(index: u8) -> u32 {
    SpectrumPalA8R8G8B8::get_pixel(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_type_table_partitions_48k_line() {
        let raster = RasterState::for_timing(FrameTiming::ZX48);
        assert_eq!(raster.render_type_table[0], RenderKind::Blank);
        assert_eq!(raster.render_type_table[47], RenderKind::Blank);
        assert_eq!(raster.render_type_table[48], RenderKind::Border);
        assert_eq!(raster.render_type_table[71], RenderKind::Border);
        assert_eq!(raster.render_type_table[72], RenderKind::Screen);
        assert_eq!(raster.render_type_table[199], RenderKind::Screen);
        assert_eq!(raster.render_type_table[200], RenderKind::Border);
        assert_eq!(raster.render_type_table[223], RenderKind::Border);
        assert_eq!(raster.render_type_table.len(), 224);
    }

    #[test]
    fn render_type_table_partitions_128k_line() {
        let raster = RasterState::for_timing(FrameTiming::ZX128);
        assert_eq!(raster.render_type_table.len(), 228);
        assert_eq!(raster.render_type_table[227], RenderKind::Blank);
    }

    #[test]
    fn screen_addr_matches_reference_formula() {
        for y in 0..=191u8 {
            for x in (0..=255u8).step_by(17) {
                let got = screen_addr(x, y, 0x4000);
                let y6y5 = (y >> 6) as u16 & 0b11;
                let y2y1y0 = y as u16 & 0b111;
                let y5y4y3 = (y >> 3) as u16 & 0b111;
                let expected = 0x4000u16
                    .wrapping_add(y6y5 << 11)
                    .wrapping_add(y2y1y0 << 8)
                    .wrapping_add(y5y4y3 << 5)
                    .wrapping_add((x >> 3) as u16);
                assert_eq!(got, expected);
            }
        }
    }

    #[test]
    fn attr_addr_is_0x1800_plus_cell_offset() {
        assert_eq!(attr_addr(0, 0, 0x4000), 0x5800);
        assert_eq!(attr_addr(8, 8, 0x4000), 0x5800 + 33);
    }
}
