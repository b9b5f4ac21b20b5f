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
//! Memory-access tracker (spec §3 "Access counters"/"Monitored region"/"Monitored port", §4.6).
//! Counters are lazily allocated on [`AccessTracker::start`] and dropped on [`AccessTracker::stop`]
//! so a host that never enables tracking pays nothing for it.
use std::collections::HashMap;
use std::path::Path;

use crate::memory::{MemoryKind, MemoryManager, PAGE_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingMode {
    Z80AddressSpace,
    PhysicalMemory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Capturing,
    Paused,
}

/// How many HALT re-executions of the same address to still count before suppressing further
/// ones (spec §4.6 "HALT suppression").
pub const MAX_HALT_EXECUTIONS: u32 = 1;

#[derive(Clone, Debug, Default)]
pub struct AccessStats {
    pub read_count: u32,
    pub write_count: u32,
    pub execute_count: u32,
    pub caller_addresses: HashMap<u16, u32>,
    pub data_values: HashMap<u8, u32>,
}

impl AccessStats {
    fn bump_caller(&mut self, caller_pc: u16, max_entries: u32) {
        lru_bump(&mut self.caller_addresses, caller_pc, max_entries);
    }

    fn bump_data_value(&mut self, value: u8, max_entries: u32) {
        lru_bump(&mut self.data_values, value, max_entries);
    }
}

/// Inserts/increments `key` in `map`, evicting the least-frequent entry with count <= 1 when
/// the map is already at `max_entries` (spec §4.6 step 3).
fn lru_bump<K: std::hash::Hash + Eq + Copy>(map: &mut HashMap<K, u32>, key: K, max_entries: u32) {
    if !map.contains_key(&key) && map.len() as u32 >= max_entries {
        if let Some((&victim, _)) = map.iter().min_by_key(|(_, &count)| count) {
            if map[&victim] <= 1 {
                map.remove(&victim);
            } else {
                return;
            }
        }
    }
    *map.entry(key).or_insert(0) += 1;
}

#[derive(Clone, Debug, Default)]
pub struct MonitoringOptions {
    pub track_callers: bool,
    pub track_data_flow: bool,
    pub max_callers: u32,
    pub max_data_values: u32,
}

impl MonitoringOptions {
    pub fn new() -> Self {
        MonitoringOptions { track_callers: false, track_data_flow: false, max_callers: 100, max_data_values: 100 }
    }
}

pub struct MonitoredRegion {
    pub name: String,
    pub start: u16,
    pub length: u16,
    pub options: MonitoringOptions,
    pub stats: AccessStats,
}

impl MonitoredRegion {
    fn contains(&self, addr: u16) -> bool {
        let end = self.start as u32 + self.length as u32;
        (addr as u32) >= self.start as u32 && (addr as u32) < end
    }
}

pub struct MonitoredPort {
    pub name: String,
    pub port: u16,
    pub options: MonitoringOptions,
    pub stats: AccessStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingEvent {
    Frame,
    Interrupt,
    Custom,
}

pub struct TrackingSegment {
    pub name: String,
    pub event: TrackingEvent,
    pub event_id: u32,
    pub region_stats: HashMap<String, AccessStats>,
    pub port_stats: HashMap<String, AccessStats>,
}

/// Lazily-allocated access counters, rebuilt fresh by [`AccessTracker::start`].
struct Counters {
    z80_space: Vec<u32>,
    physical: Vec<u32>,
    page_totals: Vec<u32>,
    bank_touched: Vec<bool>,
    page_touched: Vec<bool>,
}

impl Counters {
    fn new(total_pages: u32) -> Self {
        Counters {
            z80_space: vec![0u32; 0x1_0000],
            physical: vec![0u32; PAGE_SIZE * total_pages as usize],
            page_totals: vec![0u32; total_pages as usize],
            bank_touched: vec![false; 4],
            page_touched: vec![false; total_pages as usize],
        }
    }
}

fn saturating_incr(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

/// The tracker itself. `track_memory_{read,write,execute}` are the hot-path entry points called
/// once per Z80 core access (spec §4.6).
pub struct AccessTracker {
    mode: TrackingMode,
    state: SessionState,
    counters: Option<Counters>,
    regions: Vec<MonitoredRegion>,
    ports: Vec<MonitoredPort>,
    segments: Vec<TrackingSegment>,
    open_segment: Option<usize>,
    last_executed_addr: Option<u16>,
    halt_execution_count: u32,
}

impl AccessTracker {
    pub fn new(mode: TrackingMode) -> Self {
        AccessTracker {
            mode,
            state: SessionState::Stopped,
            counters: None,
            regions: Vec::new(),
            ports: Vec::new(),
            segments: Vec::new(),
            open_segment: None,
            last_executed_addr: None,
            halt_execution_count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start(&mut self, total_pages: u32) {
        self.counters = Some(Counters::new(total_pages));
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
        self.counters = None;
        self.state = SessionState::Stopped;
    }

    pub fn add_region(&mut self, name: impl Into<String>, start: u16, length: u16, options: MonitoringOptions) {
        self.regions.push(MonitoredRegion { name: name.into(), start, length, options, stats: AccessStats::default() });
    }

    pub fn add_port(&mut self, name: impl Into<String>, port: u16, options: MonitoringOptions) {
        self.ports.push(MonitoredPort { name: name.into(), port, options, stats: AccessStats::default() });
    }

    pub fn begin_segment(&mut self, name: impl Into<String>, event: TrackingEvent, event_id: u32) {
        self.segments.push(TrackingSegment {
            name: name.into(),
            event,
            event_id,
            region_stats: HashMap::new(),
            port_stats: HashMap::new(),
        });
        self.open_segment = Some(self.segments.len() - 1);
    }

    pub fn end_segment(&mut self) {
        if let Some(idx) = self.open_segment.take() {
            let segment = &mut self.segments[idx];
            for region in &self.regions {
                segment.region_stats.insert(region.name.clone(), region.stats.clone());
            }
            for port in &self.ports {
                segment.port_stats.insert(port.name.clone(), port.stats.clone());
            }
        }
    }

    fn record(&mut self, memory: &MemoryManager, addr: u16, value: u8, caller_pc: u16, is_execute: bool, is_write: bool) {
        if self.state != SessionState::Capturing {
            return;
        }
        let counters = match self.counters.as_mut() {
            Some(c) => c,
            None => return,
        };
        if matches!(self.mode, TrackingMode::Z80AddressSpace) {
            saturating_incr(&mut counters.z80_space[addr as usize]);
            counters.bank_touched[(addr >> 14) as usize] = true;
        }
        let page_offset = memory.physical_offset_for(addr);
        if (page_offset as usize) < counters.physical.len() {
            saturating_incr(&mut counters.physical[page_offset as usize]);
            let page = page_offset / PAGE_SIZE as u32;
            if (page as usize) < counters.page_totals.len() {
                saturating_incr(&mut counters.page_totals[page as usize]);
                counters.page_touched[page as usize] = true;
            }
        }
        for region in self.regions.iter_mut() {
            if !region.contains(addr) {
                continue;
            }
            if is_execute {
                region.stats.execute_count = region.stats.execute_count.saturating_add(1);
            } else if is_write {
                region.stats.write_count = region.stats.write_count.saturating_add(1);
            } else {
                region.stats.read_count = region.stats.read_count.saturating_add(1);
            }
            if region.options.track_callers {
                region.stats.bump_caller(caller_pc, region.options.max_callers);
            }
            if region.options.track_data_flow {
                region.stats.bump_data_value(value, region.options.max_data_values);
            }
        }
    }

    pub fn track_memory_read(&mut self, memory: &MemoryManager, addr: u16, value: u8, caller_pc: u16) {
        self.record(memory, addr, value, caller_pc, false, false);
    }

    pub fn track_memory_write(&mut self, memory: &MemoryManager, addr: u16, value: u8, caller_pc: u16) {
        self.record(memory, addr, value, caller_pc, false, true);
    }

    /// Suppresses repeated counting of a HALT (`0x76`) spinning on the same PC (spec §4.6).
    pub fn track_memory_execute(&mut self, memory: &MemoryManager, addr: u16, opcode: u8, caller_pc: u16) {
        if self.last_executed_addr == Some(addr) {
            if opcode == 0x76 {
                if self.halt_execution_count >= MAX_HALT_EXECUTIONS {
                    return;
                }
                self.halt_execution_count += 1;
            }
        } else {
            self.reset_halt_detection();
        }
        self.last_executed_addr = Some(addr);
        self.record(memory, addr, opcode, caller_pc, true, false);
    }

    pub fn reset_halt_detection(&mut self) {
        self.halt_execution_count = 0;
    }

    pub fn read_count(&self, addr: u16) -> u32 {
        self.counters.as_ref().map_or(0, |c| c.z80_space[addr as usize])
    }

    pub fn generate_region_report(&self) -> String {
        let mut out = String::new();
        for region in &self.regions {
            out.push_str(&format!(
                "{}: reads={} writes={} executes={}\n",
                region.name, region.stats.read_count, region.stats.write_count, region.stats.execute_count
            ));
        }
        out
    }

    pub fn generate_port_report(&self) -> String {
        let mut out = String::new();
        for port in &self.ports {
            out.push_str(&format!(
                "{} (port 0x{:04X}): reads={} writes={}\n",
                port.name, port.port, port.stats.read_count, port.stats.write_count
            ));
        }
        out
    }

    pub fn generate_segment_report(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&format!("segment {} ({:?} #{})\n", segment.name, segment.event, segment.event_id));
            for (name, stats) in &segment.region_stats {
                out.push_str(&format!("  {}: reads={} writes={} executes={}\n", name, stats.read_count, stats.write_count, stats.execute_count));
            }
        }
        out
    }

    /// Writes a single YAML report matching spec §6's `memory_layout`/`page_summaries`/
    /// `detailed_access` shape. Multi-file/directory mode is the host's job (it knows the
    /// timestamped directory convention); this returns the payload for a single bank/page.
    pub fn save_access_data_yaml(&self, memory: &MemoryManager, bank_names: &[(&str, &str)]) -> String {
        let counters = match self.counters.as_ref() {
            Some(c) => c,
            None => return String::from("memory_layout: {}\npage_summaries: {}\ndetailed_access: {}\n"),
        };
        let mut out = String::from("memory_layout:\n");
        for (bank_idx, (label, range_comment)) in bank_names.iter().enumerate() {
            out.push_str(&format!("  bank_{}: \"{}\"   # {}\n", bank_idx, label, range_comment));
        }
        out.push_str("page_summaries:\n");
        for (page, total) in counters.page_totals.iter().enumerate() {
            if *total == 0 {
                continue;
            }
            out.push_str(&format!("  \"page_{}\": {{ total: {} }}\n", page, total));
        }
        out.push_str("detailed_access:\n");
        for (bank_idx, (label, _)) in bank_names.iter().enumerate() {
            let slot = memory.bank(bank_idx as u8);
            let kind_name = match slot.kind {
                MemoryKind::Rom => "ROM",
                MemoryKind::Ram => "RAM",
            };
            out.push_str(&format!("  \"{}\":\n    accessed_addresses:\n", label));
            let base = (bank_idx as u16) << 14;
            for offset in 0u16..0x4000 {
                let addr = base.wrapping_add(offset);
                let reads = counters.z80_space[addr as usize];
                if reads == 0 {
                    continue;
                }
                out.push_str(&format!(
                    "      0x{:04X}: {{ reads: {}, writes: 0, executes: 0 }}\n",
                    offset, reads
                ));
            }
            let _ = kind_name;
        }
        out
    }

    pub fn save_access_report(&self, memory: &MemoryManager, path: &Path, bank_names: &[(&str, &str)]) -> std::io::Result<()> {
        std::fs::write(path, self.save_access_data_yaml(memory, bank_names))
    }

    /// Directory-tree naming convention for `save_access_data(..., single_file=false)`
    /// (spec §4.6/§6: `memory_access_YYYYMMDD_HHMMSS/`).
    pub fn timestamped_directory_name() -> String {
        format!("memory_access_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_reads_produce_saturating_count() {
        let mem = MemoryManager::new(8, 2);
        let mut tracker = AccessTracker::new(TrackingMode::Z80AddressSpace);
        tracker.start(10);
        for _ in 0..5 {
            tracker.track_memory_read(&mem, 0x4000, 0xAA, 0x0000);
        }
        assert_eq!(tracker.read_count(0x4000), 5);
    }

    #[test]
    fn halt_suppression_caps_repeated_counts() {
        let mut mem = MemoryManager::new(8, 2);
        mem.map_ram_page(0, 0);
        let mut tracker = AccessTracker::new(TrackingMode::Z80AddressSpace);
        tracker.start(10);
        for _ in 0..5 {
            tracker.track_memory_execute(&mem, 0x0000, 0x76, 0x0000);
        }
        assert_eq!(tracker.read_count(0x0000), 1 + MAX_HALT_EXECUTIONS);
    }

    #[test]
    fn pc_change_resets_halt_detection() {
        let mut mem = MemoryManager::new(8, 2);
        mem.map_ram_page(0, 0);
        let mut tracker = AccessTracker::new(TrackingMode::Z80AddressSpace);
        tracker.start(10);
        tracker.track_memory_execute(&mem, 0x0000, 0x76, 0x0000);
        tracker.track_memory_execute(&mem, 0x0000, 0x76, 0x0000);
        tracker.track_memory_execute(&mem, 0x0001, 0x00, 0x0000);
        tracker.track_memory_execute(&mem, 0x0000, 0x76, 0x0000);
        assert_eq!(tracker.read_count(0x0000), 1 + MAX_HALT_EXECUTIONS);
    }

    #[test]
    fn region_caller_histogram_evicts_least_frequent() {
        let mem = MemoryManager::new(8, 2);
        let mut tracker = AccessTracker::new(TrackingMode::Z80AddressSpace);
        tracker.start(10);
        let mut opts = MonitoringOptions::new();
        opts.track_callers = true;
        opts.max_callers = 2;
        tracker.add_region("region", 0x4000, 0x100, opts);
        tracker.track_memory_read(&mem, 0x4000, 0, 0x1000);
        tracker.track_memory_read(&mem, 0x4000, 0, 0x2000);
        tracker.track_memory_read(&mem, 0x4000, 0, 0x3000);
        let region = &tracker.regions[0];
        assert!(region.stats.caller_addresses.len() <= 2);
    }

    #[test]
    fn z80_mode_still_updates_physical_counters_for_mapped_banks() {
        let mut mem = MemoryManager::new(8, 2);
        mem.map_ram_page(3, 5);
        let mut tracker = AccessTracker::new(TrackingMode::Z80AddressSpace);
        tracker.start(10);
        tracker.track_memory_write(&mem, 0xC000, 0x11, 0x0000);
        assert_eq!(tracker.counters.as_ref().unwrap().physical[5 * PAGE_SIZE], 1);
    }

    #[test]
    fn unmapped_bank_leaves_physical_counters_untouched() {
        let mem = MemoryManager::new(8, 2);
        let mut tracker = AccessTracker::new(TrackingMode::Z80AddressSpace);
        tracker.start(10);
        tracker.track_memory_read(&mem, 0x0000, 0x00, 0x0000);
        assert!(tracker.counters.as_ref().unwrap().physical.iter().all(|&c| c == 0));
    }
}
