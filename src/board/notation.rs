//! Standard Algebraic Notation, both directions.
//!
//! `uci_to_san` walks the legal-move list to find disambiguation
//! candidates and check/mate suffixes; `san_to_uci` goes the other way by
//! generating every legal move of the inferred piece family and
//! SAN-encoding each until one matches the input. Ambiguity is resolved
//! entirely by filtering through *legal* moves first — a pinned piece
//! that could geometrically reach the destination is never a
//! disambiguation candidate because it never appears in `legal_moves`.

use crate::board::{Board, Move, PieceKind};
use crate::error::CoreError;

impl Board {
    pub fn uci_to_san(&self, mv: Move) -> Result<String, CoreError> {
        let illegal = || CoreError::IllegalMove {
            fen: self.to_fen(),
            uci: mv.to_uci(),
        };
        let legal = self.legal_moves();
        if !legal.contains(&mv) {
            return Err(illegal());
        }
        let mover = self.piece_at(mv.from).ok_or_else(illegal)?;

        let mut san = String::new();

        let is_castle_short = mover.kind == PieceKind::King && mv.to.file() as i32 - mv.from.file() as i32 == 2;
        let is_castle_long = mover.kind == PieceKind::King && mv.to.file() as i32 - mv.from.file() as i32 == -2;

        if is_castle_short {
            san.push_str("O-O");
        } else if is_castle_long {
            san.push_str("O-O-O");
        } else {
            let is_capture = self.piece_at(mv.to).is_some()
                || (mover.kind == PieceKind::Pawn && Some(mv.to) == self.en_passant_square());

            if mover.kind == PieceKind::Pawn {
                if is_capture {
                    san.push((b'a' + mv.from.file()) as char);
                    san.push('x');
                }
            } else {
                san.push(mover.kind.to_san_letter());
                san.push_str(&disambiguation(self, &legal, mv, mover.kind));
                if is_capture {
                    san.push('x');
                }
            }
            san.push_str(&mv.to.to_algebraic());
            if let Some(promo) = mv.promotion {
                san.push('=');
                san.push(promo.to_san_letter());
            }
        }

        let after = self.apply_move(mv)?;
        if after.is_mate() {
            san.push('#');
        } else if after.is_check() {
            san.push('+');
        }

        Ok(san)
    }

    pub fn san_to_uci(&self, san: &str) -> Result<Move, CoreError> {
        let ambiguous = || CoreError::IllegalOrAmbiguousMove {
            fen: self.to_fen(),
            san: san.to_string(),
        };
        let trimmed = strip_suffix_noise(san);
        let legal = self.legal_moves();
        let mut matches = legal
            .into_iter()
            .filter(|mv| self.uci_to_san(*mv).map(|s| strip_suffix_noise(&s) == trimmed).unwrap_or(false));
        let first = matches.next().ok_or_else(ambiguous)?;
        if matches.next().is_some() {
            return Err(ambiguous());
        }
        Ok(first)
    }
}

/// Drop the check/mate suffix so that e.g. `Nf3` and `Nf3+` compare
/// equal when matching a SAN token against generated candidates (the
/// generated candidate always carries the accurate suffix; a hand-typed
/// or PGN-sourced token may omit or misstate it).
fn strip_suffix_noise(san: &str) -> &str {
    san.trim_end_matches(['+', '#'])
}

fn disambiguation(board: &Board, legal: &[Move], mv: Move, kind: PieceKind) -> String {
    let siblings: Vec<Move> = legal
        .iter()
        .copied()
        .filter(|m| {
            *m != mv
                && m.to == mv.to
                && board.piece_at(m.from).map(|p| p.kind) == Some(kind)
        })
        .collect();
    if siblings.is_empty() {
        return String::new();
    }
    let same_file = siblings.iter().any(|m| m.from.file() == mv.from.file());
    let same_rank = siblings.iter().any(|m| m.from.rank() == mv.from.rank());
    if !same_file {
        String::from((b'a' + mv.from.file()) as char)
    } else if !same_rank {
        String::from((b'1' + mv.from.rank()) as char)
    } else {
        mv.from.to_algebraic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn start_position_knight_and_pawn_san() {
        let board = Board::starting_position();
        assert_eq!(board.uci_to_san(Move::from_uci("g1f3").unwrap()).unwrap(), "Nf3");
        assert_eq!(board.uci_to_san(Move::from_uci("e2e4").unwrap()).unwrap(), "e4");
    }

    #[test]
    fn castle_king_side_san() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(board.uci_to_san(Move::from_uci("e1g1").unwrap()).unwrap(), "O-O");
    }

    #[test]
    fn san_round_trips_through_uci() {
        let mut board = Board::starting_position();
        for uci in ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"] {
            let mv = Move::from_uci(uci).unwrap();
            let san = board.uci_to_san(mv).unwrap();
            assert_eq!(board.san_to_uci(&san).unwrap(), mv);
            board = board.apply_move(mv).unwrap();
        }
    }
}
