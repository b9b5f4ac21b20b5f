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
//! A concrete AY-3-8910/8912 programmable sound generator, addressed through the two
//! `0xFFFD`/`0xBFFD`-style register-select/data ports decoded by [`crate::ports`].
//!
//! This lives in `zxcore-core` rather than behind a peripherals trait: [`crate::context::Context`]
//! owns exactly one concrete chip per machine that has one ([`crate::platform::Model::has_ay`]),
//! the same way it owns one concrete [`crate::video::UlaVideo`].
use crate::audio::{AmpLevels, Blep, SampleDelta};
use crate::clock::FTs;

/// Internal clock divisor: the chip's own oscillator runs at 1/16th of its input clock.
pub const INTERNAL_CLOCK_DIVISOR: FTs = 16;
/// The AY clock is derived from the CPU clock divided by two on every 8-bit Spectrum clone.
pub const HOST_CLOCK_RATIO: FTs = 2;

/// Logarithmic amplitude levels for the AY-3-891x, closest to the datasheet claims.
#[allow(clippy::excessive_precision)]
pub const AMPS: [f32; 16] = [
    0.000_000, 0.007_813, 0.011_049, 0.015_625,
    0.022_097, 0.031_250, 0.044_194, 0.062_500,
    0.088_388, 0.125_000, 0.176_777, 0.250_000,
    0.353_553, 0.500_000, 0.707_107, 1.000_000,
];

/// [`AmpLevels`] implementation using [`AMPS`]. Handles the lowest 4 bits of `level`.
pub struct AyAmps<T>(core::marker::PhantomData<T>);
impl AmpLevels<f32> for AyAmps<f32> {
    #[inline(always)]
    fn amp_level(level: u32) -> f32 {
        AMPS[(level & 15) as usize]
    }
}

/// The 14 addressable AY registers (register 14/15, I/O port A/B, are exposed but unused on
/// every Spectrum clone this engine targets: the two I/O lines aren't wired to anything).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AyRegister {
    ToneFineA = 0, ToneCoarseA = 1,
    ToneFineB = 2, ToneCoarseB = 3,
    ToneFineC = 4, ToneCoarseC = 5,
    NoisePeriod = 6,
    MixerControl = 7,
    AmpLevelA = 8, AmpLevelB = 9, AmpLevelC = 10,
    EnvPerFine = 11, EnvPerCoarse = 12,
    EnvShape = 13,
    IoA = 14, IoB = 15,
}

/// Register index -> valid-bit mask, used to sanitize a raw register-select write.
pub const REG_MASKS: [u8; 16] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x1F, 0xFF,
    0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF,
];

impl AyRegister {
    fn from_index(index: u8) -> Option<Self> {
        use AyRegister::*;
        Some(match index & 0x0F {
            0 => ToneFineA, 1 => ToneCoarseA,
            2 => ToneFineB, 3 => ToneCoarseB,
            4 => ToneFineC, 5 => ToneCoarseC,
            6 => NoisePeriod,
            7 => MixerControl,
            8 => AmpLevelA, 9 => AmpLevelB, 10 => AmpLevelC,
            11 => EnvPerFine, 12 => EnvPerCoarse,
            13 => EnvShape,
            14 => IoA, 15 => IoB,
            _ => return None,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AmpLevel(u8);

impl AmpLevel {
    #[inline]
    fn set(&mut self, level: u8) {
        self.0 = level & 0x1F;
    }
    #[inline]
    fn is_env_control(self) -> bool {
        self.0 & 0x10 != 0
    }
    #[inline]
    fn level(self) -> u8 {
        self.0 & 0x0F
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Mixer(u8);

impl Mixer {
    #[inline]
    fn has_tone(self) -> bool {
        self.0 & 1 == 0
    }
    #[inline]
    fn has_noise(self) -> bool {
        self.0 & 8 == 0
    }
    #[inline]
    fn next_chan(&mut self) {
        self.0 >>= 1
    }
}

const ENV_SHAPE_CONT_MASK: u8 = 0b0000_1000;
const ENV_SHAPE_ATTACK_MASK: u8 = 0b0000_0100;
const ENV_SHAPE_ALT_MASK: u8 = 0b0000_0010;
const ENV_SHAPE_HOLD_MASK: u8 = 0b0000_0001;
const ENV_LEVEL_REV_MASK: u8 = 0b1000_0000;
const ENV_LEVEL_MOD_MASK: u8 = 0b0100_0000;
const ENV_LEVEL_MASK: u8 = 0x0F;
const ENV_CYCLE_MASK: u8 = 0xF0;

#[derive(Debug, Clone, Copy)]
struct EnvelopeControl {
    period: u16,
    tick: u16,
    cycle: u8,
    level: u8,
}

impl Default for EnvelopeControl {
    fn default() -> Self {
        EnvelopeControl { period: 1, tick: 0, cycle: 0, level: 0 }
    }
}

impl EnvelopeControl {
    fn set_shape(&mut self, shape: u8) {
        self.tick = 0;
        self.cycle = shape & !ENV_CYCLE_MASK;
        self.level = if shape & ENV_SHAPE_ATTACK_MASK != 0 {
            ENV_LEVEL_MOD_MASK
        } else {
            ENV_LEVEL_MOD_MASK | ENV_LEVEL_REV_MASK | ENV_LEVEL_MASK
        };
    }
    fn set_period_fine(&mut self, lo: u8) {
        self.set_period(self.period & 0xFF00 | lo as u16)
    }
    fn set_period_coarse(&mut self, hi: u8) {
        self.set_period(u16::from_le_bytes([self.period as u8, hi]))
    }
    fn set_period(&mut self, mut period: u16) {
        if period == 0 { period = 1 }
        self.period = period;
        if self.tick >= period {
            self.tick %= period;
        }
    }
    fn update_level(&mut self) -> u8 {
        let EnvelopeControl { period, mut tick, mut level, .. } = *self;
        if tick >= period {
            tick -= period;
            if level & ENV_LEVEL_MOD_MASK != 0 {
                level = (level & !ENV_LEVEL_MASK)
                    | (if level & ENV_LEVEL_REV_MASK == 0 {
                        level.wrapping_add(1)
                    } else {
                        level.wrapping_sub(1)
                    } & ENV_LEVEL_MASK);
                let cycle = self.cycle.wrapping_add(0x10);
                if cycle & ENV_CYCLE_MASK == 0 {
                    if cycle & ENV_SHAPE_CONT_MASK == 0 {
                        level = 0;
                    } else if cycle & ENV_SHAPE_HOLD_MASK != 0 {
                        if cycle & ENV_SHAPE_ALT_MASK == 0 {
                            level ^= ENV_LEVEL_MOD_MASK | ENV_LEVEL_MASK;
                        } else {
                            level ^= ENV_LEVEL_MOD_MASK;
                        }
                    } else if cycle & ENV_SHAPE_ALT_MASK != 0 {
                        level ^= ENV_LEVEL_REV_MASK | ENV_LEVEL_MASK;
                    }
                }
                self.level = level;
                self.cycle = cycle;
            }
        }
        self.tick = tick.wrapping_add(1);
        level & ENV_LEVEL_MASK
    }
}

const NOISE_PERIOD_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Copy)]
struct NoiseControl {
    rng: i32,
    period: u8,
    tick: u8,
    low: bool,
}

impl Default for NoiseControl {
    fn default() -> Self {
        NoiseControl { rng: 1, period: 0, tick: 0, low: false }
    }
}

impl NoiseControl {
    fn set_period(&mut self, mut period: u8) {
        period &= NOISE_PERIOD_MASK;
        if period == 0 { period = 1 }
        self.period = period;
        if self.tick >= period {
            self.tick %= period;
        }
    }
    fn update_is_low(&mut self) -> bool {
        let NoiseControl { mut rng, period, mut tick, mut low } = *self;
        if tick >= period {
            tick -= period;
            if (rng + 1) & 2 != 0 {
                low = !low;
                self.low = low;
            }
            rng = (-(rng & 1) & 0x12000) ^ (rng >> 1);
            self.rng = rng;
        }
        self.tick = tick.wrapping_add(1);
        low
    }
}

const TONE_GEN_MIN_THRESHOLD: u16 = 5;
const TONE_PERIOD_MASK: u16 = 0xFFF;

#[derive(Debug, Default, Clone, Copy)]
struct ToneControl {
    period: u16,
    tick: u16,
    low: bool,
}

impl ToneControl {
    fn set_period_fine(&mut self, lo: u8) {
        self.set_period(self.period & 0xFF00 | lo as u16)
    }
    fn set_period_coarse(&mut self, hi: u8) {
        self.set_period(u16::from_le_bytes([self.period as u8, hi]))
    }
    fn set_period(&mut self, mut period: u16) {
        period &= TONE_PERIOD_MASK;
        if period == 0 { period = 1 }
        self.period = period;
        if self.tick >= period * 2 {
            self.tick %= period * 2;
        }
    }
    fn update_is_low(&mut self) -> bool {
        let ToneControl { period, mut tick, mut low } = *self;
        if period < TONE_GEN_MIN_THRESHOLD {
            low = false;
        } else if tick >= period {
            tick -= period;
            low = !low;
            self.low = low;
        }
        self.tick = tick.wrapping_add(2);
        low
    }
}

/// A single `(time, register, value)` write recorded between two frame renders.
#[derive(Debug, Clone, Copy)]
struct RegChange {
    time: FTs,
    reg: AyRegister,
    val: u8,
}

/// Concrete AY-3-8910/8912 chip state: 16 shadow registers, tone/noise/envelope generators
/// and a queue of pending register writes awaiting the next [`Ay3_8912::render_frame`] call.
#[derive(Debug, Clone)]
pub struct Ay3_8912 {
    selected: u8,
    regs: [u8; 16],
    pending: Vec<RegChange>,
    current_ts: FTs,
    last_levels: [u8; 3],
    amp_levels: [AmpLevel; 3],
    env_control: EnvelopeControl,
    noise_control: NoiseControl,
    tone_control: [ToneControl; 3],
    mixer: Mixer,
}

impl Default for Ay3_8912 {
    fn default() -> Self {
        Ay3_8912 {
            selected: 0,
            regs: [0; 16],
            pending: Vec::new(),
            current_ts: 0,
            last_levels: [0; 3],
            amp_levels: Default::default(),
            env_control: Default::default(),
            noise_control: Default::default(),
            tone_control: Default::default(),
            mixer: Default::default(),
        }
    }
}

impl Ay3_8912 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Selects the active register (a write to the `0xFFFD`-style register-select port).
    pub fn select(&mut self, value: u8) {
        self.selected = value & 0x0F;
    }

    /// Writes `value` to the currently selected register at T-state `time` (a write to the
    /// `0xBFFD`-style data port). The change is queued and only takes effect at the next
    /// [`Ay3_8912::render_frame`] call, so the chip audibly reacts at the right point in time.
    pub fn write(&mut self, time: FTs, value: u8) {
        if let Some(reg) = AyRegister::from_index(self.selected) {
            let masked = value & REG_MASKS[self.selected as usize];
            self.regs[self.selected as usize] = masked;
            self.pending.push(RegChange { time, reg, val: masked });
        }
    }

    /// Reads back the currently selected register's shadow value (a read of the data port).
    pub fn read(&self) -> u8 {
        self.regs[self.selected as usize]
    }

    /// The currently selected register index, for snapshot formats that record it.
    pub fn selected_register(&self) -> u8 {
        self.selected
    }

    /// The 16 shadow register values, for snapshot formats that dump the whole bank.
    pub fn register_snapshot(&self) -> [u8; 16] {
        self.regs
    }

    /// Renders queued register changes as square-wave pulses into `blep`, advancing the
    /// internal clock up to `end_ts` and mapping the three tone channels onto `channels`.
    pub fn render_frame<A>(&mut self, blep: &mut A, end_ts: FTs, channels: [usize; 3])
    where
        A: Blep + ?Sized,
        A::SampleDelta: SampleDelta + Default,
        AyAmps<A::SampleDelta>: AmpLevels<A::SampleDelta>,
    {
        let mut pending = core::mem::take(&mut self.pending);
        let mut change_iter = pending.drain(..).peekable();
        let clock_step = HOST_CLOCK_RATIO * INTERNAL_CLOCK_DIVISOR;
        let mut tick = self.current_ts;
        let mut tone_levels = self.last_levels;
        let mut vol_levels: [A::SampleDelta; 3] = Default::default();
        for (level, tgt) in tone_levels.iter().copied().zip(vol_levels.iter_mut()) {
            *tgt = AyAmps::<A::SampleDelta>::amp_level(level.into());
        }
        while tick < end_ts {
            while let Some(change) = change_iter.peek() {
                if change.time <= tick {
                    let RegChange { reg, val, .. } = change_iter.next().unwrap();
                    self.update_register(reg, val);
                } else {
                    break;
                }
            }
            let env_level = self.env_control.update_level();
            let noise_low = self.noise_control.update_is_low();
            let mut mixer = self.mixer;
            for ((level, tone), tgt) in self.amp_levels.iter()
                .zip(self.tone_control.iter_mut())
                .zip(tone_levels.iter_mut())
            {
                *tgt = if (mixer.has_tone() && tone.update_is_low())
                    || (mixer.has_noise() && noise_low)
                {
                    0
                } else if level.is_env_control() {
                    env_level
                } else {
                    level.level()
                };
                mixer.next_chan();
            }
            for (chan, (level, last_vol)) in channels.iter().copied()
                .zip(tone_levels.iter().copied().zip(vol_levels.iter_mut()))
            {
                let vol = AyAmps::<A::SampleDelta>::amp_level(level.into());
                if let Some(delta) = last_vol.sample_delta(vol) {
                    blep.add_step(chan, tick, delta);
                    *last_vol = vol;
                }
            }
            tick += clock_step;
        }
        for RegChange { reg, val, .. } in change_iter {
            self.update_register(reg, val);
        }
        self.current_ts = tick - end_ts;
        self.last_levels = tone_levels;
    }

    fn update_register(&mut self, reg: AyRegister, val: u8) {
        use AyRegister::*;
        match reg {
            ToneFineA => self.tone_control[0].set_period_fine(val),
            ToneCoarseA => self.tone_control[0].set_period_coarse(val),
            ToneFineB => self.tone_control[1].set_period_fine(val),
            ToneCoarseB => self.tone_control[1].set_period_coarse(val),
            ToneFineC => self.tone_control[2].set_period_fine(val),
            ToneCoarseC => self.tone_control[2].set_period_coarse(val),
            NoisePeriod => self.noise_control.set_period(val),
            MixerControl => self.mixer = Mixer(val),
            AmpLevelA => self.amp_levels[0].set(val),
            AmpLevelB => self.amp_levels[1].set(val),
            AmpLevelC => self.amp_levels[2].set(val),
            EnvPerFine => self.env_control.set_period_fine(val),
            EnvPerCoarse => self.env_control.set_period_coarse(val),
            EnvShape => self.env_control.set_shape(val),
            IoA | IoB => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullBlep(Vec<(usize, FTs, f32)>);
    impl Blep for NullBlep {
        type SampleDelta = f32;
        fn ensure_frame_time(&mut self, _: u32, _: f64, _: FTs, _: FTs) {}
        fn add_step(&mut self, channel: usize, timestamp: FTs, delta: f32) {
            self.0.push((channel, timestamp, delta));
        }
        fn end_frame(&mut self, _: FTs) -> usize { 0 }
    }

    #[test]
    fn register_select_and_write_roundtrip() {
        let mut ay = Ay3_8912::new();
        ay.select(7);
        ay.write(0, 0b0011_1110);
        assert_eq!(ay.read(), 0b0011_1110);
    }

    #[test]
    fn reg_mask_clamps_out_of_range_bits() {
        let mut ay = Ay3_8912::new();
        ay.select(1); // ToneCoarseA, 4-bit register
        ay.write(0, 0xFF);
        assert_eq!(ay.read(), 0x0F);
    }

    #[test]
    fn tone_a_produces_pulses_after_frame_render() {
        let mut ay = Ay3_8912::new();
        ay.select(0);
        ay.write(0, 0x10); // tone A fine period
        ay.select(8);
        ay.write(0, 0x0F); // full volume, channel A
        ay.select(7);
        ay.write(0, 0b1111_1110); // enable tone A, disable noise on A
        let mut blep = NullBlep(Vec::new());
        ay.render_frame(&mut blep, 4000, [0, 1, 2]);
        assert!(!blep.0.is_empty());
    }
}
