//! Section-scoped key/value text store.
//!
//! Format
//! - `[Section]` opens a section; `key=value` lines belong to the last opened one.
//! - Full-line comments start with `;` or `#`. Blank lines are ignored.
//! - Whitespace around section names, keys and values is trimmed.
//! - Section and entry order is preserved across `load`/`save`.
//!
//! Escapes
//! - Written names, keys and values escape `\`, `=`, line breaks and tabs
//!   (`\\`, `\=`, `\n`, `\r`, `\t`), a leading `#`, `;` or `[` (`\#` ...),
//!   and whitespace at either end (`\u{20}`), so any string survives
//!   `save` then `load`.
//! - On read, an unknown escape such as `\d` is kept literally.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str) -> Self { Self { name: name.to_string(), entries: Vec::new() } }

    pub fn name(&self) -> &str { &self.name }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniFile {
    sections: Vec<Section>,
}

impl IniFile {
    pub fn new() -> Self { Self::default() }

    /// Read `path`. A missing file is an empty store, not an error.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse_named(&text, &path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} does not exist, starting with an empty store", path.display());
                Ok(Self::new())
            }
            Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
        }
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let path = path.as_ref();
        let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        std::fs::write(path, self.to_string()).map_err(io_err)?;
        log::debug!("saved {} sections to {}", self.sections.len(), path.display());
        Ok(())
    }

    fn parse_named(text: &str, origin: &str) -> StoreResult<Self> {
        let mut ini = Self::new();
        let mut current: Option<usize> = None;
        for (idx, raw) in text.lines().enumerate() {
            let syntax = |msg: &str| StoreError::Syntax {
                path: origin.to_string(),
                line: idx + 1,
                msg: msg.to_string(),
            };
            let raw = if idx == 0 { raw.trim_start_matches('\u{feff}') } else { raw };
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| syntax("unterminated section header"))?
                    .trim();
                current = Some(ini.section_index_or_insert(&unescape(name)));
                continue;
            }
            let (key, value) = split_entry(line).ok_or_else(|| syntax("expected key=value"))?;
            let sec = current.ok_or_else(|| syntax("entry outside of any section"))?;
            ini.sections[sec].set(&unescape(key.trim()), &unescape(value.trim()));
        }
        Ok(ini)
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn sections(&self) -> &[Section] { &self.sections }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn get(&self, section: &str, key: &str) -> StoreResult<&str> {
        self.section(section)
            .and_then(|s| s.get(key))
            .ok_or_else(|| StoreError::not_found(section, key))
    }

    pub fn get_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key).unwrap_or(default)
    }

    /// Read and parse a value; `expected` in the error is the target type name.
    pub fn get_parsed<T: FromStr>(&self, section: &str, key: &str) -> StoreResult<T> {
        let raw = self.get(section, key)?;
        raw.parse::<T>().map_err(|_| StoreError::Parse {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            expected: short_type_name::<T>(),
        })
    }

    pub fn has(&self, section: &str, key: &str) -> bool { self.get(section, key).is_ok() }

    /// Insert or overwrite. Any text is accepted; `Display` escapes what the format cannot hold.
    pub fn set(&mut self, section: &str, key: &str, value: impl AsRef<str>) {
        let idx = self.section_index_or_insert(section);
        self.sections[idx].set(key, value.as_ref());
    }

    pub fn remove(&mut self, section: &str, key: &str) -> Option<String> {
        let sec = self.sections.iter_mut().find(|s| s.name == section)?;
        sec.remove(key)
    }

    pub fn remove_section(&mut self, name: &str) -> Option<Section> {
        let idx = self.sections.iter().position(|s| s.name == name)?;
        Some(self.sections.remove(idx))
    }

    pub fn is_empty(&self) -> bool { self.sections.iter().all(Section::is_empty) }
}

impl FromStr for IniFile {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse_named(s, "<string>") }
}

impl std::fmt::Display for IniFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for (i, sec) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            writeln!(out, "[{}]", escape(&sec.name))?;
            for (k, v) in &sec.entries {
                writeln!(out, "{}={}", escape(k), escape(v))?;
            }
        }
        f.write_str(&out)
    }
}

fn escape(s: &str) -> String {
    let last = s.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '#' | ';' | '[' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_whitespace() && (i == 0 || i == last) => {
                out.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') if chars.peek() == Some(&'{') => {
                chars.next();
                let hex: String = chars.by_ref().take_while(|&h| h != '}').collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u{");
                        out.push_str(&hex);
                        out.push('}');
                    }
                }
            }
            Some(other @ ('\\' | '=' | '#' | ';' | '[' | ']')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split at the first `=` that is not escaped.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '=' => return Some((&line[..i], &line[i + 1..])),
            _ => {}
        }
    }
    None
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
