//! # Extended Position Description (EPD) records
//!
//! One line is a FEN key followed by zero or more `<opcode> <value>;`
//! operations. Values are opaque strings; a bare opcode with no value is
//! allowed. Blank lines and lines that don't parse as a FEN-keyed record
//! are preserved verbatim so a round trip through [`EpdFile::parse`] and
//! [`EpdFile::to_string`] never drops content the caller didn't ask to
//! change.

use indexmap::IndexMap;

use crate::error::{CoreError, CoreResult};

pub const OP_DEPTH: &str = "acd";
pub const OP_NODES: &str = "acn";
pub const OP_SECONDS: &str = "acs";
pub const OP_BEST_MOVE: &str = "bm";
pub const OP_CENTIPAWN_EVAL: &str = "ce";
pub const OP_DIRECT_MATE: &str = "dm";
pub const OP_SUPPLIED_MOVE: &str = "sm";
pub const OP_PREDICTED_MOVE: &str = "pm";
pub const OP_PRINCIPAL_VARIATION: &str = "pv";

/// One EPD record: a FEN key plus its ordered opcode/value operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EpdRecord {
    pub fen_key: String,
    ops: IndexMap<String, Option<String>>,
}

impl EpdRecord {
    pub fn new(fen_key: impl Into<String>) -> Self {
        Self {
            fen_key: fen_key.into(),
            ops: IndexMap::new(),
        }
    }

    pub fn set_string(&mut self, opcode: &str, value: impl Into<String>) {
        self.ops.insert(opcode.to_string(), Some(value.into()));
    }

    pub fn set_int(&mut self, opcode: &str, value: i64) {
        self.set_string(opcode, value.to_string());
    }

    pub fn remove(&mut self, opcode: &str) {
        self.ops.shift_remove(opcode);
    }

    pub fn get_string(&self, opcode: &str) -> String {
        self.ops
            .get(opcode)
            .and_then(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn get_int(&self, opcode: &str) -> i64 {
        self.get_string(opcode).parse().unwrap_or(0)
    }

    pub fn has(&self, opcode: &str) -> bool {
        self.ops.contains_key(opcode)
    }

    pub fn to_line(&self) -> String {
        let mut s = self.fen_key.clone();
        for (op, value) in &self.ops {
            s.push(' ');
            s.push_str(op);
            if let Some(v) = value {
                if !v.is_empty() {
                    s.push(' ');
                    s.push_str(v);
                }
            }
            s.push(';');
        }
        s
    }

    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let fen_key_start = parts.next()?;
        let rest = parts.next().unwrap_or("").trim_start();

        // The FEN key is the first four whitespace-separated fields; keep
        // consuming tokens from `rest` until we have them, then treat
        // everything after as opcode/value pairs.
        let mut fen_fields = vec![fen_key_start.to_string()];
        let mut remainder = rest;
        while fen_fields.len() < 4 {
            let mut it = remainder.splitn(2, char::is_whitespace);
            let field = it.next()?;
            if field.is_empty() {
                return None;
            }
            fen_fields.push(field.to_string());
            remainder = it.next().unwrap_or("").trim_start();
        }
        let fen_key = fen_fields.join(" ");

        let mut record = EpdRecord::new(fen_key);
        for op_text in remainder.split(';') {
            let op_text = op_text.trim();
            if op_text.is_empty() {
                continue;
            }
            let mut it = op_text.splitn(2, char::is_whitespace);
            let opcode = it.next()?.to_string();
            let value = it.next().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            record.ops.insert(opcode, value);
        }
        Some(record)
    }
}

#[derive(Debug, Clone)]
enum Line {
    Record(EpdRecord),
    Verbatim(String),
}

/// A whole EPD file: an ordered list of records and verbatim
/// (unparseable or blank) lines, preserved in document order.
#[derive(Debug, Clone, Default)]
pub struct EpdFile {
    lines: Vec<Line>,
}

impl EpdFile {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| match EpdRecord::parse(line) {
                Some(record) if crate::board::Board::from_fen(&format!("{} 0 1", record.fen_key)).is_ok() => {
                    Line::Record(record)
                }
                _ => Line::Verbatim(line.to_string()),
            })
            .collect();
        Self { lines }
    }

    pub fn records(&self) -> impl Iterator<Item = &EpdRecord> {
        self.lines.iter().filter_map(|l| match l {
            Line::Record(r) => Some(r),
            Line::Verbatim(_) => None,
        })
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut EpdRecord> {
        self.lines.iter_mut().filter_map(|l| match l {
            Line::Record(r) => Some(r),
            Line::Verbatim(_) => None,
        })
    }

    pub fn find(&self, fen_key: &str) -> Vec<&EpdRecord> {
        self.records().filter(|r| r.fen_key == fen_key).collect()
    }

    pub fn contains(&self, fen_key: &str) -> bool {
        self.records().any(|r| r.fen_key == fen_key)
    }

    pub fn add(&mut self, record: EpdRecord) {
        self.lines.push(Line::Record(record));
    }

    /// Collapse duplicate-FEN-key lines. A pair collapses outright when
    /// one line's text is a prefix of the other's. Among the remaining
    /// duplicates for a key, keep the single record that uniquely
    /// carries a best-move or weight opcode; if zero or more than one
    /// record qualifies, leave that group untouched and report it.
    pub fn dedupe(&mut self) -> Vec<String> {
        let mut ambiguous = Vec::new();
        let mut keys: Vec<String> = self.records().map(|r| r.fen_key.clone()).collect();
        keys.sort();
        keys.dedup();

        let mut kept: Vec<Line> = Vec::new();
        for line in std::mem::take(&mut self.lines) {
            match line {
                Line::Verbatim(_) => kept.push(line),
                Line::Record(r) => kept.push(Line::Record(r)),
            }
        }

        for key in keys {
            let group_ixs: Vec<usize> = kept
                .iter()
                .enumerate()
                .filter_map(|(i, l)| match l {
                    Line::Record(r) if r.fen_key == key => Some(i),
                    _ => None,
                })
                .collect();
            if group_ixs.len() < 2 {
                continue;
            }

            let texts: Vec<String> = group_ixs
                .iter()
                .map(|&i| match &kept[i] {
                    Line::Record(r) => r.to_line(),
                    Line::Verbatim(s) => s.clone(),
                })
                .collect();

            let mut drop: Vec<bool> = vec![false; group_ixs.len()];
            for a in 0..texts.len() {
                for b in 0..texts.len() {
                    if a != b && !drop[a] && texts[b].starts_with(&texts[a]) && texts[a] != texts[b] {
                        drop[a] = true;
                    }
                }
            }
            let remaining: Vec<usize> = (0..group_ixs.len()).filter(|&i| !drop[i]).collect();
            if remaining.len() < 2 {
                for (i, &ix) in group_ixs.iter().enumerate() {
                    if drop[i] {
                        kept[ix] = Line::Verbatim(String::new());
                    }
                }
                continue;
            }

            let qualifying: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| match &kept[group_ixs[i]] {
                    Line::Record(r) => r.has(OP_BEST_MOVE) || r.has("weight"),
                    Line::Verbatim(_) => false,
                })
                .collect();

            if qualifying.len() == 1 {
                let keep_i = qualifying[0];
                for &i in &remaining {
                    if i != keep_i {
                        kept[group_ixs[i]] = Line::Verbatim(String::new());
                    }
                }
            } else {
                ambiguous.push(key);
            }
        }

        self.lines = kept.into_iter().filter(|l| !matches!(l, Line::Verbatim(s) if s.is_empty())).collect();
        ambiguous
    }

    pub fn to_string_pretty(&self) -> String {
        self.lines
            .iter()
            .map(|l| match l {
                Line::Record(r) => r.to_line(),
                Line::Verbatim(s) => s.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the file to `path`, first copying any existing contents to
    /// a timestamped backup alongside it.
    pub fn save(&self, path: &std::path::Path) -> CoreResult<()> {
        crate::io::write_with_backup(path, self.to_string_pretty().as_bytes()).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_with_multiple_opcodes() {
        let line = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - bm e4; ce 30;";
        let file = EpdFile::parse(line);
        let rec = file.records().next().unwrap();
        assert_eq!(rec.get_string(OP_BEST_MOVE), "e4");
        assert_eq!(rec.get_int(OP_CENTIPAWN_EVAL), 30);
    }

    #[test]
    fn preserves_unparseable_lines_verbatim() {
        let text = "not a fen at all\n\nrnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - bm e4;";
        let file = EpdFile::parse(text);
        assert_eq!(file.to_string_pretty(), text);
    }

    #[test]
    fn dedupe_prefers_unique_best_move_record() {
        let key = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";
        let mut a = EpdRecord::new(key);
        a.set_string(OP_CENTIPAWN_EVAL, "10");
        let mut b = EpdRecord::new(key);
        b.set_string(OP_BEST_MOVE, "e4");
        let mut file = EpdFile::default();
        file.add(a);
        file.add(b);
        let ambiguous = file.dedupe();
        assert!(ambiguous.is_empty());
        assert_eq!(file.records().count(), 1);
        assert_eq!(file.records().next().unwrap().get_string(OP_BEST_MOVE), "e4");
    }
}
