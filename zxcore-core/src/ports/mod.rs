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
//! Port decoders (spec §4.4). The source's base-class-with-virtuals hierarchy becomes a tagged
//! sum over concrete decoders dispatched by a single `match` — no trait object, no RTTI (spec §9
//! "Virtual dispatch for port decoders -> enum + dispatch").
pub mod flags;

use crate::memory::MemoryManager;
use crate::platform::Model;

/// What a decoded port access targets; memory-paging targets are handled in-place by
/// [`PortDecoder::decode_out`], everything else is routed to peripherals by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    /// `0xFE`, even port: ULA border/beeper/tape-out on write, keyboard/EAR on read.
    Ula,
    /// `0xFFFD`: AY register-select / Turbo Sound chip select.
    AyRegister,
    /// `0xBFFD`: AY data port.
    AyData,
    /// `0x7FFD` (or model-specific equivalent): RAM/ROM/screen paging, handled here.
    Paging,
    /// `0x1FFD`/`0xDFFD`: extended paging, handled here.
    ExtendedPaging,
    /// Not decoded by this layer; the caller should try registered peripherals (FDC, HDD,
    /// joystick, serial, ...).
    Unclaimed,
}

fn is_ula(port: u16) -> bool {
    port & 0x0001 == 0x0000
}

fn is_ay_data(port: u16) -> bool {
    port & 0xC002 == 0x8000
}

fn is_ay_register(port: u16) -> bool {
    port & 0xC002 == 0xC000
}

fn is_7ffd_standard(port: u16) -> bool {
    port & 0x8002 == 0x0000
}

fn is_7ffd_scorpion(port: u16) -> bool {
    port & 0xD027 == 0x5025
}

fn is_1ffd_plus3(port: u16) -> bool {
    port & 0xF002 == 0x1000
}

fn is_1ffd_scorpion(port: u16) -> bool {
    port & 0xD027 == 0x1025
}

fn is_dffd_profi(port: u16) -> bool {
    port & 0x2002 == 0x0000
}

/// Per-model memory-paging state: which RAM page backs bank 3, which ROM page backs bank 0,
/// which RAM page the ULA should read the screen from, and whether the paging latch is locked.
#[derive(Clone, Copy, Debug, Default)]
struct PagingState {
    ram_page: u8,
    rom_page: u8,
    screen_shadow: bool,
    locked: bool,
}

/// A concrete port decoder for one machine model. Construct via [`PortDecoder::for_model`];
/// `decode_in`/`decode_out` dispatch on the stored [`Model`] rather than through a vtable.
pub struct PortDecoder {
    model: Model,
    paging: PagingState,
}

impl PortDecoder {
    pub fn for_model(model: Model) -> Self {
        PortDecoder { model, paging: PagingState::default() }
    }

    pub fn model(&self) -> Model { self.model }

    /// Resets paging to the model's defaults and clears the lock latch (spec testable property
    /// 5: the lock only ever clears on reset).
    pub fn reset(&mut self, memory: &mut MemoryManager) {
        self.paging = PagingState::default();
        self.apply_paging(memory);
    }

    pub fn screen_is_shadow(&self) -> bool {
        self.paging.screen_shadow
    }

    /// Classifies `port` without touching any state, for the disassembler/breakpoint manager
    /// and for test property 4 ("each `is_port_X` predicate equals the reference expression").
    pub fn classify(&self, port: u16) -> PortKind {
        if is_ula(port) {
            return PortKind::Ula;
        }
        if self.model.has_ay() {
            if is_ay_data(port) { return PortKind::AyData; }
            if is_ay_register(port) { return PortKind::AyRegister; }
        }
        match self.model {
            Model::Scorpion256 => {
                if is_7ffd_scorpion(port) { return PortKind::Paging; }
                if is_1ffd_scorpion(port) { return PortKind::ExtendedPaging; }
            }
            Model::SpectrumPlus2A | Model::SpectrumPlus3 => {
                if is_7ffd_standard(port) { return PortKind::Paging; }
                if is_1ffd_plus3(port) { return PortKind::ExtendedPaging; }
            }
            Model::Profi => {
                if is_7ffd_standard(port) { return PortKind::Paging; }
                if is_dffd_profi(port) { return PortKind::ExtendedPaging; }
            }
            Model::Spectrum128 | Model::SpectrumPlus2
                | Model::Pentagon128 | Model::Pentagon512 | Model::Pentagon1024
                | Model::TsConf => {
                if is_7ffd_standard(port) { return PortKind::Paging; }
            }
            Model::Spectrum48 => {}
        }
        PortKind::Unclaimed
    }

    /// Handles an OUT. Paging ports mutate `memory` in place and return `PortKind::Paging`(or
    /// `ExtendedPaging`); everything else is classified only, for the caller to forward to the
    /// ULA/AY/peripheral it owns.
    pub fn decode_out(&mut self, memory: &mut MemoryManager, port: u16, value: u8) -> PortKind {
        let kind = self.classify(port);
        match kind {
            PortKind::Paging if !self.paging.locked => {
                self.paging.ram_page = value & 0b0000_0111;
                if self.model == Model::Pentagon512 {
                    self.paging.ram_page |= (value & 0b1100_0000) >> 3;
                }
                self.paging.screen_shadow = value & 0b0000_1000 != 0;
                self.paging.rom_page = (self.paging.rom_page & !0b01) | ((value & 0b0001_0000) >> 4);
                if value & 0b0010_0000 != 0 {
                    self.paging.locked = true;
                }
                self.apply_paging(memory);
            }
            PortKind::ExtendedPaging if !self.paging.locked => {
                match self.model {
                    Model::SpectrumPlus2A | Model::SpectrumPlus3 => {
                        let normal = value & 0b0000_0001;
                        let special = value & 0b0000_0010 != 0;
                        if !special {
                            self.paging.rom_page = (self.paging.rom_page & 0b01) | (normal << 1);
                        }
                    }
                    Model::Profi | Model::Scorpion256 => {
                        self.paging.rom_page = (self.paging.rom_page & 0b01) | ((value & 0b0000_0011) << 1);
                    }
                    _ => {}
                }
                self.apply_paging(memory);
            }
            _ => {}
        }
        kind
    }

    /// Handles an IN on a port this decoder owns. Returns `None` for ports it doesn't claim, or
    /// for paging ports whose "read back" mode isn't modelled (spec: "unimplemented modes return
    /// 0xFF on IN").
    pub fn decode_in(&self, port: u16) -> Option<u8> {
        match self.classify(port) {
            PortKind::Paging | PortKind::ExtendedPaging => Some(0xFF),
            PortKind::Unclaimed => None,
            _ => None,
        }
    }

    /// Reconstructs the standard `0x7FFD` paging byte (bits 0-2 RAM bank, bit 3 screen shadow,
    /// bit 4 ROM low bit, bit 5 lock) from the current paging state, for snapshot savers that
    /// need to write back the last OUT to that port.
    pub fn standard_paging_byte(&self) -> u8 {
        (self.paging.ram_page & 0b0000_0111)
        | if self.paging.screen_shadow { 0b0000_1000 } else { 0 }
        | ((self.paging.rom_page & 0b01) << 4)
        | if self.paging.locked { 0b0010_0000 } else { 0 }
    }

    fn apply_paging(&self, memory: &mut MemoryManager) {
        if self.model == Model::Spectrum48 {
            // Flat 48K layout: three fixed RAM blocks, no paging pool to switch between.
            memory.map_ram_page(1, 0);
            memory.map_ram_page(2, 1);
            memory.map_ram_page(3, 2);
        } else {
            memory.map_ram_page(3, self.paging.ram_page as u16);
            memory.map_ram_page(1, 5);
            memory.map_ram_page(2, 2);
        }
        memory.map_rom_page(0, self.paging.rom_page as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ula_port_is_any_even_port() {
        assert!(is_ula(0xFE));
        assert!(is_ula(0x00FE));
        assert!(!is_ula(0xFF));
    }

    #[test]
    fn pentagon_7ffd_pages_ram_into_bank3() {
        let mut mem = MemoryManager::new(32, 2);
        let mut dec = PortDecoder::for_model(Model::Pentagon128);
        dec.reset(&mut mem);
        dec.decode_out(&mut mem, 0x7FFD, 0x07);
        mem.ram_page_mut(7)[0] = 0xAB;
        assert_eq!(mem.read_z80(0xC000), 0xAB);
    }

    #[test]
    fn paging_lock_blocks_further_outs_until_reset() {
        let mut mem = MemoryManager::new(8, 2);
        let mut dec = PortDecoder::for_model(Model::Spectrum128);
        dec.reset(&mut mem);
        dec.decode_out(&mut mem, 0x7FFD, 0x07); // page 7, no lock
        dec.decode_out(&mut mem, 0x7FFD, 0x27); // page 7, lock bit set
        dec.decode_out(&mut mem, 0x7FFD, 0x00); // should be ignored
        mem.ram_page_mut(7)[0] = 0x55;
        assert_eq!(mem.read_z80(0xC000), 0x55);
        dec.reset(&mut mem);
        dec.decode_out(&mut mem, 0x7FFD, 0x00);
        mem.ram_page_mut(0)[0] = 0x99;
        assert_eq!(mem.read_z80(0xC000), 0x99);
    }

    #[test]
    fn pentagon512_extends_ram_page_to_five_bits() {
        let mut mem = MemoryManager::new(32, 2);
        let mut dec = PortDecoder::for_model(Model::Pentagon512);
        dec.reset(&mut mem);
        dec.decode_out(&mut mem, 0x7FFD, 0b0100_0011); // page bits 0b11 | bit6 -> page 0b01_0011 = 19
        mem.ram_page_mut(19)[0] = 0x77;
        assert_eq!(mem.read_z80(0xC000), 0x77);
    }

    #[test]
    fn screen_shadow_flag_tracks_bit3() {
        let mut mem = MemoryManager::new(8, 2);
        let mut dec = PortDecoder::for_model(Model::Spectrum128);
        dec.reset(&mut mem);
        assert!(!dec.screen_is_shadow());
        dec.decode_out(&mut mem, 0x7FFD, 0b0000_1000);
        assert!(dec.screen_is_shadow());
    }
}
