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
//! Call-trace buffer (spec §3 "Control-flow event", §4.7, §8 scenario 8). Hot/cold segmented:
//! a growable cold ring records everything, a small hot list pins loops that are still spinning
//! so the cold ring isn't flooded by a tight `DJNZ`.
use std::collections::HashMap;

/// Mirrors [`crate::debug::access_tracker::SessionState`]: a call trace only records events
/// while `Capturing`, so enabling control-flow tracing doesn't cost anything when no debugger
/// front-end is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Capturing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlFlowKind {
    Jp,
    Jr,
    Call,
    Rst,
    Ret,
    Reti,
    Djnz,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BankInfo {
    pub is_rom: bool,
    pub page_num: u16,
}

/// Up to four prefix+opcode+operand bytes; `len` says how many are valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpcodeBytes {
    pub bytes: [u8; 4],
    pub len: u8,
}

impl OpcodeBytes {
    pub fn new(slice: &[u8]) -> Self {
        let mut bytes = [0u8; 4];
        let len = slice.len().min(4);
        bytes[..len].copy_from_slice(&slice[..len]);
        OpcodeBytes { bytes, len: len as u8 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlFlowEvent {
    pub m1_pc: u16,
    pub target_addr: u16,
    pub opcode_bytes: OpcodeBytes,
    pub flags: u8,
    pub kind: ControlFlowKind,
    pub banks: [BankInfo; 4],
    pub sp_after: u16,
    /// Top 3 stack words after a `RET`/`RETI`; zeroed for other event kinds.
    pub stack_top: [u16; 3],
    pub loop_count: u32,
}

/// Identity used for loop-compression and the LRU duplicate-check index (spec §4.7): equal iff
/// `(m1_pc, target_addr, kind, sp, opcode_bytes, banks)` are equal (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EventKey {
    m1_pc: u16,
    target_addr: u16,
    opcode_bytes: OpcodeBytes,
    kind: ControlFlowKind,
    banks: [BankInfo; 4],
    sp_after: u16,
}

impl From<&ControlFlowEvent> for EventKey {
    fn from(e: &ControlFlowEvent) -> Self {
        EventKey {
            m1_pc: e.m1_pc,
            target_addr: e.target_addr,
            opcode_bytes: e.opcode_bytes,
            kind: e.kind,
            banks: e.banks,
            sp_after: e.sp_after,
        }
    }
}

struct HotEvent {
    event: ControlFlowEvent,
    last_seen_frame: u64,
}

pub const CALLTRACE_INITIAL_CAPACITY: usize = 1_000_000;
pub const CALLTRACE_MAX_CAPACITY: usize = (1usize << 30) / std::mem::size_of::<ControlFlowEvent>();
const LRU_INDEX_CAPACITY: usize = 100;

pub struct CallTraceBuffer {
    cold: Vec<ControlFlowEvent>,
    cold_capacity: usize,
    hot: HashMap<EventKey, HotEvent>,
    hot_capacity: usize,
    hot_threshold: u32,
    hot_timeout_frames: u64,
    /// `EventKey -> cold index`, most-recently-used order for O(1) duplicate detection
    /// without scanning the whole cold ring (spec §4.7).
    recent_index: HashMap<EventKey, usize>,
    recent_order: Vec<EventKey>,
    state: SessionState,
}

impl CallTraceBuffer {
    pub fn new() -> Self {
        CallTraceBuffer::with_capacities(CALLTRACE_INITIAL_CAPACITY, 1024, 100, 1)
    }

    pub fn with_capacities(cold_capacity: usize, hot_capacity: usize, hot_threshold: u32, hot_timeout_frames: u64) -> Self {
        CallTraceBuffer {
            cold: Vec::new(),
            cold_capacity: cold_capacity.min(CALLTRACE_MAX_CAPACITY),
            hot: HashMap::new(),
            hot_capacity,
            hot_threshold,
            hot_timeout_frames,
            recent_index: HashMap::new(),
            recent_order: Vec::new(),
            state: SessionState::Stopped,
        }
    }

    pub fn reset(&mut self) {
        self.cold.clear();
        self.hot.clear();
        self.recent_index.clear();
        self.recent_order.clear();
    }

    pub fn cold_len(&self) -> usize {
        self.cold.len()
    }

    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start(&mut self) {
        self.reset();
        self.state = SessionState::Capturing;
    }

    pub fn pause(&mut self) {
        if self.state == SessionState::Capturing {
            self.state = SessionState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == SessionState::Paused {
            self.state = SessionState::Capturing;
        }
    }

    pub fn stop(&mut self) {
        self.state = SessionState::Stopped;
    }

    /// No-op unless a capture session is active (spec §4.7): tracing a tight loop costs nothing
    /// when no debugger front-end has called [`CallTraceBuffer::start`].
    pub fn log_event(&mut self, event: ControlFlowEvent, current_frame: u64) {
        if self.state != SessionState::Capturing {
            return;
        }
        let key = EventKey::from(&event);

        if let Some(hot) = self.hot.get_mut(&key) {
            hot.event.loop_count += 1;
            hot.last_seen_frame = current_frame;
            return;
        }

        if let Some(&idx) = self.recent_index.get(&key) {
            self.cold[idx].loop_count += 1;
            if self.cold[idx].loop_count >= self.hot_threshold {
                self.promote_to_hot(idx, key, current_frame);
            }
            return;
        }

        self.push_cold(event, key);
    }

    fn push_cold(&mut self, event: ControlFlowEvent, key: EventKey) {
        if self.cold.len() >= self.cold_capacity {
            self.cold.remove(0);
            for idx in self.recent_index.values_mut() {
                if *idx > 0 {
                    *idx -= 1;
                }
            }
        }
        let idx = self.cold.len();
        self.cold.push(event);
        self.note_recent(key, idx);
    }

    fn note_recent(&mut self, key: EventKey, idx: usize) {
        self.recent_index.insert(key, idx);
        self.recent_order.push(key);
        if self.recent_order.len() > LRU_INDEX_CAPACITY {
            let evicted = self.recent_order.remove(0);
            self.recent_index.remove(&evicted);
        }
    }

    fn promote_to_hot(&mut self, cold_idx: usize, key: EventKey, current_frame: u64) {
        let event = self.cold.remove(cold_idx);
        self.recent_index.remove(&key);
        self.recent_order.retain(|k| k != &key);
        for idx in self.recent_index.values_mut() {
            if *idx > cold_idx {
                *idx -= 1;
            }
        }
        if self.hot.len() >= self.hot_capacity {
            if let Some((&oldest_key, _)) = self.hot.iter().min_by_key(|(_, h)| h.last_seen_frame) {
                if let Some(expired) = self.hot.remove(&oldest_key) {
                    self.push_cold(expired.event, oldest_key);
                }
            }
        }
        self.hot.insert(key, HotEvent { event, last_seen_frame: current_frame });
    }

    /// Expires hot entries that haven't been seen recently, demoting them back to the cold
    /// ring with their accumulated loop count intact.
    pub fn flush_hot_buffer(&mut self, current_frame: u64) {
        let expired: Vec<EventKey> = self.hot.iter()
            .filter(|(_, h)| current_frame.saturating_sub(h.last_seen_frame) > self.hot_timeout_frames)
            .map(|(&k, _)| k)
            .collect();
        for key in expired {
            if let Some(hot) = self.hot.remove(&key) {
                self.push_cold(hot.event, key);
            }
        }
    }

    pub fn latest_cold(&self, count: usize) -> &[ControlFlowEvent] {
        let start = self.cold.len().saturating_sub(count);
        &self.cold[start..]
    }

    pub fn save_to_file_text(&self) -> String {
        let mut out = String::new();
        for event in &self.cold {
            out.push_str(&format!(
                "{:04X},{:04X},{:?},sp={:04X},loop={}\n",
                event.m1_pc, event.target_addr, event.kind, event.sp_after, event.loop_count
            ));
        }
        out
    }
}

impl Default for CallTraceBuffer {
    fn default() -> Self {
        CallTraceBuffer::new()
    }
}

fn sample_event(pc: u16, target: u16, kind: ControlFlowKind) -> ControlFlowEvent {
    ControlFlowEvent {
        m1_pc: pc,
        target_addr: target,
        opcode_bytes: OpcodeBytes::new(&[0xC3, 0x00, 0x80]),
        flags: 0,
        kind,
        banks: [BankInfo { is_rom: true, page_num: 0 }; 4],
        sp_after: 0xFFFE,
        stack_top: [0, 0, 0],
        loop_count: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_identical_events_collapse_into_one_cold_entry() {
        let mut trace = CallTraceBuffer::with_capacities(1024, 16, 1000, 1);
        trace.start();
        for _ in 0..10 {
            trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Jp), 1);
        }
        assert_eq!(trace.cold_len(), 1);
        assert_eq!(trace.cold[0].loop_count, 10);
    }

    #[test]
    fn reaching_hot_threshold_promotes_entry() {
        let mut trace = CallTraceBuffer::with_capacities(1024, 16, 5, 1);
        trace.start();
        for frame in 0..10u64 {
            trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Djnz), frame);
        }
        assert_eq!(trace.hot_len(), 1);
        assert_eq!(trace.cold_len(), 0);
    }

    #[test]
    fn hot_entry_expires_after_timeout_and_returns_to_cold() {
        let mut trace = CallTraceBuffer::with_capacities(1024, 16, 3, 2);
        trace.start();
        for frame in 0..5u64 {
            trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Djnz), frame);
        }
        assert_eq!(trace.hot_len(), 1);
        trace.flush_hot_buffer(100);
        assert_eq!(trace.hot_len(), 0);
        assert_eq!(trace.cold_len(), 1);
    }

    #[test]
    fn distinct_events_do_not_collapse() {
        let mut trace = CallTraceBuffer::new();
        trace.start();
        trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Call), 0);
        trace.log_event(sample_event(0x9000, 0x9010, ControlFlowKind::Call), 0);
        assert_eq!(trace.cold_len(), 2);
    }

    #[test]
    fn log_event_is_a_no_op_while_stopped() {
        let mut trace = CallTraceBuffer::new();
        assert_eq!(trace.state(), SessionState::Stopped);
        trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Call), 0);
        assert_eq!(trace.cold_len(), 0);
    }

    #[test]
    fn pause_suppresses_logging_and_resume_restores_it() {
        let mut trace = CallTraceBuffer::new();
        trace.start();
        trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Call), 0);
        assert_eq!(trace.cold_len(), 1);

        trace.pause();
        assert_eq!(trace.state(), SessionState::Paused);
        trace.log_event(sample_event(0x9000, 0x9010, ControlFlowKind::Call), 1);
        assert_eq!(trace.cold_len(), 1);

        trace.resume();
        assert_eq!(trace.state(), SessionState::Capturing);
        trace.log_event(sample_event(0x9000, 0x9010, ControlFlowKind::Call), 2);
        assert_eq!(trace.cold_len(), 2);
    }

    #[test]
    fn stop_discards_state_and_further_events_are_ignored() {
        let mut trace = CallTraceBuffer::new();
        trace.start();
        trace.log_event(sample_event(0x8000, 0x8010, ControlFlowKind::Call), 0);
        trace.stop();
        assert_eq!(trace.state(), SessionState::Stopped);
        trace.log_event(sample_event(0x9000, 0x9010, ControlFlowKind::Call), 1);
        assert_eq!(trace.cold_len(), 1);
    }
}
