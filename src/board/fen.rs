//! # Forsyth-Edwards Notation
//!
//! A FEN string has six space-separated fields: piece placement, side to
//! move, castling rights, en-passant target, half-move clock and
//! full-move number. Piece placement is eight `/`-separated ranks, top
//! rank (rank 8) first, with runs of empty squares run-length encoded as
//! digits.
//!
//! The FEN *key* used throughout the book and engine driver is the first
//! four fields only, with the en-passant field normalised to `-`
//! whenever no enemy pawn could actually capture there — two FENs that
//! differ only in an impossible en-passant flag, or in the move
//! counters, hash to the same key.

use crate::board::{Board, CastlingRights, Color, Piece, Square};
use crate::error::CoreError;

impl Board {
    pub fn from_fen(fen: &str) -> Result<Board, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidFen {
            fen: fen.to_string(),
            reason: reason.to_string(),
        };

        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or_else(|| invalid("missing piece placement"))?;
        let side = fields.next().unwrap_or("w");
        let castling = fields.next().unwrap_or("-");
        let en_passant = fields.next().unwrap_or("-");
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut squares = [None; 64];
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(invalid("expected 8 ranks separated by '/'"));
        }
        for (rank_from_top, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_from_top as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                if let Some(n) = c.to_digit(10) {
                    file += n as u8;
                } else {
                    let piece = Piece::from_fen_char(c).ok_or_else(|| invalid("unrecognised piece letter"))?;
                    if file >= 8 {
                        return Err(invalid("rank overflows 8 files"));
                    }
                    squares[Square::from_file_rank(file, rank).0 as usize] = Some(piece);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(invalid("rank does not sum to 8 files"));
            }
        }

        let side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(invalid("side to move must be 'w' or 'b'")),
        };

        let mut rights = CastlingRights::default();
        if castling != "-" {
            for c in castling.chars() {
                match c {
                    'K' => rights.white_short = true,
                    'Q' => rights.white_long = true,
                    'k' => rights.black_short = true,
                    'q' => rights.black_long = true,
                    _ => return Err(invalid("castling field must be subset of KQkq or '-'")),
                }
            }
        }

        let en_passant = if en_passant == "-" {
            None
        } else {
            Some(Square::from_algebraic(en_passant).ok_or_else(|| invalid("invalid en-passant square"))?)
        };

        let halfmove_clock: u32 = halfmove.parse().map_err(|_| invalid("half-move clock must be an integer"))?;
        let fullmove_number: u32 = fullmove.parse().map_err(|_| invalid("full-move number must be an integer"))?;
        if fullmove_number == 0 {
            return Err(invalid("full-move number must be at least 1"));
        }

        let mut king_square = [Square::new(0); 2];
        let mut kings_seen = [0u8; 2];
        for (ix, sq) in squares.iter().enumerate() {
            if let Some(p) = sq {
                if p.kind == crate::board::PieceKind::King {
                    king_square[p.color.ix()] = Square::new(ix as u8);
                    kings_seen[p.color.ix()] += 1;
                }
            }
        }
        if kings_seen[0] != 1 || kings_seen[1] != 1 {
            return Err(invalid("position must have exactly one king of each colour"));
        }

        Ok(Board {
            squares,
            side_to_move,
            castling: rights,
            en_passant,
            halfmove_clock,
            fullmove_number,
            king_square,
        })
    }

    /// Emit the full six-field FEN. The en-passant field always carries
    /// the raw target square, if any is set — use [`Board::fen_key`] for
    /// the normalised cache identifier.
    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank_from_top in 0..8u8 {
            let rank = 7 - rank_from_top;
            let mut empty_run = 0u8;
            for file in 0..8u8 {
                match self.piece_at(Square::from_file_rank(file, rank)) {
                    Some(p) => {
                        if empty_run > 0 {
                            placement.push((b'0' + empty_run) as char);
                            empty_run = 0;
                        }
                        placement.push(p.to_fen_char());
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                placement.push((b'0' + empty_run) as char);
            }
            if rank_from_top != 7 {
                placement.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };

        let mut castling = String::new();
        if self.castling.white_short {
            castling.push('K');
        }
        if self.castling.white_long {
            castling.push('Q');
        }
        if self.castling.black_short {
            castling.push('k');
        }
        if self.castling.black_long {
            castling.push('q');
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let en_passant = self
            .en_passant
            .map(|sq| sq.to_algebraic())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{placement} {side} {castling} {en_passant} {} {}",
            self.halfmove_clock, self.fullmove_number
        )
    }

    /// The canonical, cache-friendly key: the first four FEN fields, with
    /// the en-passant field collapsed to `-` whenever no enemy pawn could
    /// legally capture on it.
    pub fn fen_key(&self) -> String {
        let full = self.to_fen();
        let mut fields = full.split_whitespace();
        let placement = fields.next().unwrap_or("-");
        let side = fields.next().unwrap_or("w");
        let castling = fields.next().unwrap_or("-");

        let en_passant = if self.en_passant_can_be_captured() {
            self.en_passant.map(|sq| sq.to_algebraic())
        } else {
            None
        };
        let en_passant = en_passant.unwrap_or_else(|| "-".to_string());

        format!("{placement} {side} {castling} {en_passant}")
    }

    /// Whether the en-passant target (if any) is actually reachable by an
    /// enemy pawn standing on the correct rank next to it. Used both to
    /// normalise the FEN key and to validate the en-passant invariant.
    pub(crate) fn en_passant_can_be_captured(&self) -> bool {
        let Some(target) = self.en_passant else {
            return false;
        };
        let attacker_color = self.side_to_move;
        let capture_rank = target.rank();
        let expected_rank = match attacker_color {
            Color::White => 5,
            Color::Black => 2,
        };
        if capture_rank != expected_rank {
            return false;
        }
        for df in [-1i32, 1] {
            let file = target.file() as i32 + df;
            if !(0..8).contains(&file) {
                continue;
            }
            let sq = Square::from_file_rank(file as u8, capture_rank);
            if let Some(p) = self.piece_at(sq) {
                if p.color == attacker_color && p.kind == crate::board::PieceKind::Pawn {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_start_position() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let board = Board::from_fen(fen).unwrap();
        assert_eq!(board.to_fen(), fen);
    }

    #[test]
    fn double_push_sets_en_passant() {
        let board = Board::starting_position();
        let after = board.apply_uci_moves(&["e2e4"]).unwrap();
        assert_eq!(
            after.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn key_normalises_unreachable_en_passant() {
        let with_ep = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let without_ep = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let a = Board::from_fen(with_ep).unwrap();
        let b = Board::from_fen(without_ep).unwrap();
        assert_eq!(a.fen_key(), b.fen_key());
    }

    #[test]
    fn key_ignores_move_counters() {
        let a = Board::from_fen("8/8/8/8/8/8/4K3/4k3 w - - 0 1").unwrap();
        let b = Board::from_fen("8/8/8/8/8/8/4K3/4k3 w - - 12 37").unwrap();
        assert_eq!(a.fen_key(), b.fen_key());
    }
}
