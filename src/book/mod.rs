//! # The position book
//!
//! A FEN-key-indexed store of ranked candidate moves, each carrying the
//! engine's verbatim log lines for audit. The book is the durable output
//! of the analysis controller and the lookup the PGN annotator and the
//! (external) bot matchmaking loop both read from.
//!
//! Internally the index is an [`indexmap::IndexMap`] rather than a
//! `HashMap` so that [`Book::save`] emits positions in the order they
//! were first added — a human diffing the book file sees new positions
//! appended at the bottom, not scattered by hash order.

pub mod select;

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::CoreResult;

/// One engine's verbatim log line for a candidate move, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineLogLine {
    pub depth: u32,
    pub seldepth: u32,
    pub multipv: u32,
    pub centipawns: Option<i32>,
    pub mate: Option<i32>,
    pub nodes: u64,
    pub tb_hits: u64,
    pub time_ms: u64,
    pub pv: Vec<String>,
}

impl EngineLogLine {
    /// The raw text form stored in the book file, matching the shape of
    /// a UCI `info` line so an operator can eyeball it directly.
    pub fn to_raw_line(&self) -> String {
        let mut s = format!(
            "info depth {} seldepth {} multipv {} nodes {} nps 0 tbhits {} time {}",
            self.depth, self.seldepth, self.multipv, self.nodes, self.tb_hits, self.time_ms
        );
        match (self.centipawns, self.mate) {
            (_, Some(m)) => s.push_str(&format!(" score mate {m}")),
            (Some(cp), None) => s.push_str(&format!(" score cp {cp}")),
            (None, None) => {}
        }
        if !self.pv.is_empty() {
            s.push_str(" pv ");
            s.push_str(&self.pv.join(" "));
        }
        s
    }
}

/// The engine attribution block attached to a candidate move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineBlock {
    pub id: String,
    pub log: Vec<EngineLogLine>,
}

/// One candidate move for a position, as stored in the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMove {
    /// SAN move; empty for the sentinel "needs analysis" record.
    pub san: String,
    pub weight: Option<f64>,
    /// Centipawn score in the book's global (white-positive) convention.
    pub centipawns: Option<i32>,
    /// Mate distance in the global convention: positive means the side
    /// with the move in the book's global sense wins, matching sign
    /// conventions used for `centipawns`.
    pub mate: Option<i32>,
    pub timestamp: i64,
    pub engine: EngineBlock,
}

impl CandidateMove {
    pub fn sentinel() -> Self {
        Self {
            san: String::new(),
            weight: None,
            centipawns: None,
            mate: None,
            timestamp: 0,
            engine: EngineBlock {
                id: String::new(),
                log: Vec::new(),
            },
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.san.is_empty()
    }

    /// The second move of this candidate's most recent engine log line's
    /// PV, if any — used as the "ponder" suggestion.
    pub fn ponder_move(&self) -> Option<&str> {
        self.engine.log.last()?.pv.get(1).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub fen_key: String,
    pub moves: Vec<CandidateMove>,
}

/// The position book: FEN key to ranked candidate moves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Book {
    positions: IndexMap<String, PositionRecord>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records with a SAN move, sorted best-first. Sentinel
    /// "needs analysis" entries are excluded.
    pub fn get(&self, fen_key: &str) -> Vec<CandidateMove> {
        let mut moves: Vec<CandidateMove> = self
            .positions
            .get(fen_key)
            .map(|p| p.moves.iter().filter(|m| !m.is_sentinel()).cloned().collect())
            .unwrap_or_default();
        select::sort_candidates(&mut moves);
        moves
    }

    /// All records, sentinels included, sorted best-first (sentinels
    /// sort last since they carry no score).
    pub fn get_all(&self, fen_key: &str) -> Vec<CandidateMove> {
        let mut moves: Vec<CandidateMove> = self
            .positions
            .get(fen_key)
            .map(|p| p.moves.clone())
            .unwrap_or_default();
        select::sort_candidates(&mut moves);
        moves
    }

    pub fn contains(&self, fen_key: &str) -> bool {
        self.positions.contains_key(fen_key)
    }

    /// Insert or replace candidate moves for a position. Same-SAN
    /// records are replaced rather than appended; if any inserted record
    /// carries a SAN, pre-existing sentinel entries are dropped first.
    pub fn add(&mut self, fen_key: &str, new_moves: Vec<CandidateMove>) {
        let entry = self
            .positions
            .entry(fen_key.to_string())
            .or_insert_with(|| PositionRecord {
                fen_key: fen_key.to_string(),
                moves: Vec::new(),
            });

        if new_moves.iter().any(|m| !m.is_sentinel()) {
            entry.moves.retain(|m| !m.is_sentinel());
        }

        for mv in new_moves {
            if let Some(existing) = entry.moves.iter_mut().find(|m| m.san == mv.san) {
                *existing = mv;
            } else {
                entry.moves.push(mv);
            }
        }
    }

    /// Select a best move for `fen_key`, sampling among weighted ties and
    /// uniformly among equal-score ties. Returns the chosen record plus
    /// its ponder suggestion.
    pub fn best_move(&self, fen_key: &str, rng: &mut impl Rng) -> Option<(CandidateMove, Option<String>)> {
        let moves = self.get(fen_key);
        let chosen = select::choose_best(&moves, rng)?;
        let ponder = chosen.ponder_move().map(|s| s.to_string());
        Some((chosen.clone(), ponder))
    }

    /// Materialise records from an external ("online") evaluation
    /// response: one record per supplied PV, attributed to engine id
    /// `lichess`. Only applied when the response meets the minimum depth
    /// and carries at least one PV — shallow online evaluations are not
    /// trustworthy enough to cache.
    pub fn fill_from_online(
        &mut self,
        board: &Board,
        depth: u32,
        nodes: u64,
        pvs: &[Vec<String>],
    ) -> CoreResult<()> {
        const MIN_ONLINE_DEPTH: u32 = 28;
        if depth < MIN_ONLINE_DEPTH || pvs.is_empty() {
            return Ok(());
        }

        let fen_key = board.fen_key();
        let timestamp = chrono::Utc::now().timestamp();
        let mut records = Vec::new();
        for pv in pvs {
            let uci_moves: Vec<&str> = pv.iter().map(|s| s.as_str()).collect();
            let Some(first_uci) = uci_moves.first() else {
                continue;
            };
            let mv = crate::board::Move::from_uci(first_uci).ok_or_else(|| {
                crate::error::CoreError::IllegalMove {
                    fen: board.to_fen(),
                    uci: (*first_uci).to_string(),
                }
            })?;
            let san = board.uci_to_san(mv)?;
            records.push(CandidateMove {
                san,
                weight: None,
                centipawns: None,
                mate: None,
                timestamp,
                engine: EngineBlock {
                    id: "lichess".to_string(),
                    log: vec![EngineLogLine {
                        depth,
                        seldepth: depth,
                        multipv: 1,
                        centipawns: None,
                        mate: None,
                        nodes,
                        tb_hits: 0,
                        time_ms: 0,
                        pv: uci_moves.into_iter().map(|s| s.to_string()).collect(),
                    }],
                },
            });
        }

        self.add(&fen_key, records);
        Ok(())
    }

    /// Prune sentinel entries and emit the book as a TOML document,
    /// positions in the order they were first added.
    pub fn to_toml(&self) -> Result<String, rootcause::Report> {
        let pruned = Book {
            positions: self
                .positions
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        PositionRecord {
                            fen_key: v.fen_key.clone(),
                            moves: v.moves.iter().filter(|m| !m.is_sentinel()).cloned().collect(),
                        },
                    )
                })
                .collect(),
        };
        toml::to_string_pretty(&pruned).map_err(rootcause::Report::from)
    }

    pub fn from_toml(text: &str) -> Result<Self, rootcause::Report> {
        toml::from_str(text).map_err(rootcause::Report::from)
    }

    /// Save to `path`, backing up any existing file first.
    pub fn save(&self, path: &std::path::Path) -> Result<(), rootcause::Report> {
        let text = self.to_toml()?;
        crate::io::write_with_backup(path, text.as_bytes())
    }

    pub fn load(path: &std::path::Path) -> Result<Self, rootcause::Report> {
        let text = crate::io::read_to_string(path)?;
        Self::from_toml(&text)
    }
}
