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
//! Label manager (spec §4.8, §6, §8 scenario F). Labels are held by value in a single store
//! indexed by name; the z80-address and physical-address indices map to that name rather than
//! aliasing the label itself (spec §9 "Shared-pointer labels -> no aliasing").
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// `bank`/`bank_offset` use `ANY` to mean "not bank-qualified"; such labels are absent from the
/// physical-address index (spec §3 Label invariant).
pub const BANK_ANY: u8 = 0xFF;
pub const BANK_OFFSET_ANY: u16 = 0xFFFF;
/// Parse-error sentinel for addresses (spec §6 "0xFFFF and 0xFFFFFFFF are parse-error sentinels").
pub const PARSE_ERROR_16: u16 = 0xFFFF;
pub const PARSE_ERROR_32: u32 = 0xFFFF_FFFF;
/// Marks [`Label::physical_address`] as unresolved.
pub const SENTINEL_UNRESOLVED: u32 = 0xFFFF_FFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelKind {
    Code,
    Data,
    Bss,
    Const,
    Port,
    Unspecified,
}

impl LabelKind {
    fn as_str(self) -> &'static str {
        match self {
            LabelKind::Code => "code",
            LabelKind::Data => "data",
            LabelKind::Bss => "bss",
            LabelKind::Const => "const",
            LabelKind::Port => "port",
            LabelKind::Unspecified => "",
        }
    }

    fn parse(s: &str) -> LabelKind {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => LabelKind::Code,
            "data" => LabelKind::Data,
            "bss" => LabelKind::Bss,
            "const" => LabelKind::Const,
            "port" => LabelKind::Port,
            _ => LabelKind::Unspecified,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub z80_address: u16,
    pub bank: u8,
    pub bank_offset: u16,
    pub physical_address: u32,
    pub kind: LabelKind,
    pub module: String,
    pub comment: String,
    pub active: bool,
}

impl Label {
    pub fn new(name: impl Into<String>, z80_address: u16) -> Self {
        Label {
            name: name.into(),
            z80_address,
            bank: BANK_ANY,
            bank_offset: BANK_OFFSET_ANY,
            physical_address: SENTINEL_UNRESOLVED,
            kind: LabelKind::Unspecified,
            module: String::new(),
            comment: String::new(),
            active: true,
        }
    }

    fn is_physically_resolved(&self) -> bool {
        self.bank != BANK_ANY && self.physical_address != SENTINEL_UNRESOLVED
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Map,
    Sym,
    Vice,
    Sjasm,
    Z88dk,
}

impl FileFormat {
    fn detect_by_extension(path: &Path) -> Option<FileFormat> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("map") => Some(FileFormat::Map),
            Some("sym") => Some(FileFormat::Sym),
            _ => None,
        }
    }

    /// Falls back to sniffing the first non-comment line (spec §4.8 "detection is by extension
    /// first, then by the first non-comment line").
    fn detect_by_content(text: &str) -> FileFormat {
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with("al C:") {
                return FileFormat::Vice;
            }
            if trimmed.starts_with("DEFC ") {
                return FileFormat::Z88dk;
            }
            if trimmed.contains(" EQU ") || trimmed.contains(" equ ") {
                return FileFormat::Sjasm;
            }
            return FileFormat::Sym;
        }
        FileFormat::Sym
    }
}

fn trim_comment(line: &str) -> &str {
    match line.find(';') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Accepts `0x`, `$`, `#`, or no prefix (spec §6), case-insensitively.
fn parse_hex(token: &str) -> Option<u32> {
    let t = token.trim();
    let digits = t
        .strip_prefix("0x").or_else(|| t.strip_prefix("0X"))
        .or_else(|| t.strip_prefix('$'))
        .or_else(|| t.strip_prefix('#'))
        .unwrap_or(t);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

fn parse_type_annotation(rest: &str) -> LabelKind {
    if let (Some(start), Some(end)) = (rest.find('('), rest.find(')')) {
        if end > start {
            return LabelKind::parse(&rest[start + 1..end]);
        }
    }
    LabelKind::Unspecified
}

/// Indexes labels by name, z80-address and physical-address; every mutation keeps all three
/// indices in agreement (spec §3 Label invariant, §8 scenario 6).
#[derive(Default)]
pub struct LabelManager {
    by_name: HashMap<String, Label>,
    by_z80_address: HashMap<u16, String>,
    by_physical_address: HashMap<u32, String>,
}

impl LabelManager {
    pub fn new() -> Self {
        LabelManager::default()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Inserts or replaces a label by name. Re-indexes the z80/physical maps, dropping any stale
    /// entry that pointed at the old value of `name`.
    pub fn add(&mut self, label: Label) {
        if let Some(old) = self.by_name.get(&label.name) {
            if self.by_z80_address.get(&old.z80_address).map(String::as_str) == Some(label.name.as_str()) {
                self.by_z80_address.remove(&old.z80_address);
            }
            if old.is_physically_resolved() {
                if self.by_physical_address.get(&old.physical_address).map(String::as_str) == Some(label.name.as_str()) {
                    self.by_physical_address.remove(&old.physical_address);
                }
            }
        }
        self.by_z80_address.insert(label.z80_address, label.name.clone());
        if label.is_physically_resolved() {
            self.by_physical_address.insert(label.physical_address, label.name.clone());
        }
        self.by_name.insert(label.name.clone(), label);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        if let Some(label) = self.by_name.remove(name) {
            self.by_z80_address.remove(&label.z80_address);
            if label.is_physically_resolved() {
                self.by_physical_address.remove(&label.physical_address);
            }
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_z80_address.clear();
        self.by_physical_address.clear();
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Label> {
        self.by_name.get(name)
    }

    pub fn get_by_z80_address(&self, addr: u16) -> Option<&Label> {
        self.by_z80_address.get(&addr).and_then(|name| self.by_name.get(name))
    }

    pub fn get_by_physical_address(&self, addr: u32) -> Option<&Label> {
        self.by_physical_address.get(&addr).and_then(|name| self.by_name.get(name))
    }

    pub fn all(&self) -> impl Iterator<Item = &Label> {
        self.by_name.values()
    }

    pub fn load(&mut self, path: &Path, text: &str) -> Result<usize, String> {
        let format = FileFormat::detect_by_extension(path).unwrap_or_else(|| FileFormat::detect_by_content(text));
        self.load_with_format(text, format)
    }

    /// Lenient: unknown lines are skipped, never rejected; an empty file yields zero labels
    /// with `Ok` (spec §4.8).
    pub fn load_with_format(&mut self, text: &str, format: FileFormat) -> Result<usize, String> {
        let mut count = 0usize;
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let parsed = match format {
                FileFormat::Map | FileFormat::Sym => parse_map_or_sym_line(line),
                FileFormat::Vice => parse_vice_line(line),
                FileFormat::Sjasm => parse_sjasm_line(line),
                FileFormat::Z88dk => parse_z88dk_line(line),
            };
            if let Some(label) = parsed {
                self.add(label);
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn save(&self, format: FileFormat) -> String {
        let mut out = String::new();
        out.push_str(&format!("; zxcore label export ({})\n", format.header_name()));
        let mut labels: Vec<&Label> = self.by_name.values().collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        for label in labels {
            out.push_str(&format_label_line(label, format));
            out.push('\n');
        }
        out
    }
}

impl FileFormat {
    fn header_name(self) -> &'static str {
        match self {
            FileFormat::Map => "map",
            FileFormat::Sym => "sym",
            FileFormat::Vice => "vice",
            FileFormat::Sjasm => "sjasm",
            FileFormat::Z88dk => "z88dk",
        }
    }
}

fn format_type_suffix(kind: LabelKind) -> String {
    if kind == LabelKind::Unspecified {
        String::new()
    } else {
        format!(" ({})", kind.as_str())
    }
}

fn format_label_line(label: &Label, format: FileFormat) -> String {
    match format {
        FileFormat::Map | FileFormat::Sym => {
            format!("{:04X} {}{}", label.z80_address, label.name, format_type_suffix(label.kind))
        }
        FileFormat::Vice => {
            format!("al C:{:04X} {}{}", label.z80_address, label.name, format_type_suffix(label.kind))
        }
        FileFormat::Sjasm => {
            format!("{} EQU ${:04X}{}", label.name, label.z80_address, format_type_suffix(label.kind))
        }
        FileFormat::Z88dk => {
            format!("DEFC {} = ${:04X}{}", label.name, label.z80_address, format_type_suffix(label.kind))
        }
    }
}

fn parse_map_or_sym_line(line: &str) -> Option<Label> {
    let body = trim_comment(line);
    let mut parts = body.split_whitespace();
    let addr_tok = parts.next()?;
    let name = parts.next()?;
    let addr = parse_hex(addr_tok)? as u16;
    if addr == PARSE_ERROR_16 {
        return None;
    }
    let rest: String = parts.collect::<Vec<_>>().join(" ");
    let mut label = Label::new(name, addr);
    label.kind = parse_type_annotation(&rest);
    Some(label)
}

fn parse_vice_line(line: &str) -> Option<Label> {
    let body = trim_comment(line);
    let body = body.strip_prefix("al ")?;
    let mut parts = body.split_whitespace();
    let addr_tok = parts.next()?.strip_prefix("C:")?;
    let name = parts.next()?;
    let addr = parse_hex(addr_tok)? as u16;
    let rest: String = parts.collect::<Vec<_>>().join(" ");
    let mut label = Label::new(name, addr);
    label.kind = parse_type_annotation(&rest);
    Some(label)
}

fn parse_sjasm_line(line: &str) -> Option<Label> {
    let body = trim_comment(line);
    let mut parts = body.splitn(2, "EQU");
    let name = parts.next()?.trim();
    let rest = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let mut rest_parts = rest.split_whitespace();
    let addr_tok = rest_parts.next()?;
    let addr = parse_hex(addr_tok)? as u16;
    let tail: String = rest_parts.collect::<Vec<_>>().join(" ");
    let mut label = Label::new(name, addr);
    label.kind = parse_type_annotation(&tail);
    Some(label)
}

fn parse_z88dk_line(line: &str) -> Option<Label> {
    let body = trim_comment(line);
    let body = body.strip_prefix("DEFC ")?;
    let mut parts = body.splitn(2, '=');
    let name = parts.next()?.trim();
    let rest = parts.next()?.trim();
    let mut rest_parts = rest.split_whitespace();
    let addr_tok = rest_parts.next()?;
    let addr = parse_hex(addr_tok)? as u16;
    let tail: String = rest_parts.collect::<Vec<_>>().join(" ");
    let mut label = Label::new(name, addr);
    label.kind = parse_type_annotation(&tail);
    Some(label)
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X} {}", self.z80_address, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_all_three_lookups_agree() {
        let mut mgr = LabelManager::new();
        let mut label = Label::new("RD_SEC", 0xA250);
        label.bank = 3;
        label.physical_address = 0x1_A250;
        mgr.add(label);
        let by_name = mgr.get_by_name("RD_SEC").unwrap();
        let by_addr = mgr.get_by_z80_address(0xA250).unwrap();
        let by_phys = mgr.get_by_physical_address(0x1_A250).unwrap();
        assert_eq!(by_name.name, by_addr.name);
        assert_eq!(by_name.name, by_phys.name);
    }

    #[test]
    fn remove_clears_all_three_indices() {
        let mut mgr = LabelManager::new();
        let mut label = Label::new("FOO", 0x8000);
        label.bank = 0;
        label.physical_address = 0x8000;
        mgr.add(label);
        assert!(mgr.remove("FOO"));
        assert!(mgr.get_by_name("FOO").is_none());
        assert!(mgr.get_by_z80_address(0x8000).is_none());
        assert!(mgr.get_by_physical_address(0x8000).is_none());
    }

    #[test]
    fn bank_any_label_is_absent_from_physical_index() {
        let mut mgr = LabelManager::new();
        mgr.add(Label::new("NOBANK", 0x4000));
        assert!(mgr.get_by_physical_address(SENTINEL_UNRESOLVED).is_none());
        assert!(mgr.get_by_z80_address(0x4000).is_some());
    }

    #[test]
    fn map_file_round_trips_through_sym_save() {
        let mut mgr = LabelManager::new();
        mgr.load_with_format("A250 RD_SEC\n", FileFormat::Map).unwrap();
        let sym_text = mgr.save(FileFormat::Sym);
        let mut reloaded = LabelManager::new();
        reloaded.load_with_format(&sym_text, FileFormat::Sym).unwrap();
        assert_eq!(reloaded.get_by_name("RD_SEC").unwrap().z80_address, 0xA250);
    }

    #[test]
    fn empty_file_loads_zero_labels() {
        let mut mgr = LabelManager::new();
        let count = mgr.load_with_format("; just a comment\n\n", FileFormat::Sym).unwrap();
        assert_eq!(count, 0);
        assert!(mgr.is_empty());
    }

    #[test]
    fn unknown_lines_are_skipped_not_rejected() {
        let mut mgr = LabelManager::new();
        let count = mgr.load_with_format("garbage line with no address\nA250 RD_SEC\n", FileFormat::Map).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn hex_prefixes_are_interchangeable() {
        assert_eq!(parse_hex("0x1234"), Some(0x1234));
        assert_eq!(parse_hex("$1234"), Some(0x1234));
        assert_eq!(parse_hex("#1234"), Some(0x1234));
        assert_eq!(parse_hex("1234"), Some(0x1234));
    }

    #[test]
    fn sjasm_and_z88dk_lines_parse() {
        let mut mgr = LabelManager::new();
        mgr.load_with_format("START EQU $8000 ; (code)\n", FileFormat::Sjasm).unwrap();
        assert_eq!(mgr.get_by_name("START").unwrap().z80_address, 0x8000);
        let mut mgr2 = LabelManager::new();
        mgr2.load_with_format("DEFC TABLE = $9000\n", FileFormat::Z88dk).unwrap();
        assert_eq!(mgr2.get_by_name("TABLE").unwrap().z80_address, 0x9000);
    }
}
