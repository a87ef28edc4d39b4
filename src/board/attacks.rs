//! Attack detection: is a given square attacked by a given colour?
//!
//! This scans outward *from* the target square along every piece's move
//! pattern and asks whether the right kind of enemy piece sits at the
//! far end — the same trick as generating moves for a super-piece parked
//! on the square and checking which of its pseudo-destinations are
//! occupied by an attacker. Early exit on the first hit.

use crate::board::{Board, Color, PieceKind, Square};

const KNIGHT_OFFSETS: [(i32, i32); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2),
    (-1, -2), (-2, -1), (-2, 1), (-1, 2),
];

const KING_OFFSETS: [(i32, i32); 8] = [
    (1, 0), (1, 1), (0, 1), (-1, 1),
    (-1, 0), (-1, -1), (0, -1), (1, -1),
];

const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn offset(sq: Square, df: i32, dr: i32) -> Option<Square> {
    let file = sq.file() as i32 + df;
    let rank = sq.rank() as i32 + dr;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(Square::from_file_rank(file as u8, rank as u8))
    } else {
        None
    }
}

/// Is `square` attacked by any piece of `by_color`?
pub fn is_square_attacked(board: &Board, square: Square, by_color: Color) -> bool {
    for (df, dr) in KNIGHT_OFFSETS {
        if let Some(to) = offset(square, df, dr) {
            if matches!(board.piece_at(to), Some(p) if p.color == by_color && p.kind == PieceKind::Knight) {
                return true;
            }
        }
    }

    for (df, dr) in KING_OFFSETS {
        if let Some(to) = offset(square, df, dr) {
            if matches!(board.piece_at(to), Some(p) if p.color == by_color && p.kind == PieceKind::King) {
                return true;
            }
        }
    }

    for dirs in [BISHOP_DIRS, ROOK_DIRS] {
        let sliders = if dirs == BISHOP_DIRS {
            [PieceKind::Bishop, PieceKind::Queen]
        } else {
            [PieceKind::Rook, PieceKind::Queen]
        };
        for (df, dr) in dirs {
            let mut cur = square;
            while let Some(to) = offset(cur, df, dr) {
                if let Some(p) = board.piece_at(to) {
                    if p.color == by_color && (p.kind == sliders[0] || p.kind == sliders[1]) {
                        return true;
                    }
                    break;
                }
                cur = to;
            }
        }
    }

    // Pawn attacks: a pawn of `by_color` attacks diagonally toward the
    // opposite rank, so we look from `square` back along the pawn's
    // attack direction.
    let pawn_dr = match by_color {
        Color::White => -1,
        Color::Black => 1,
    };
    for df in [-1, 1] {
        if let Some(from) = offset(square, df, pawn_dr) {
            if matches!(board.piece_at(from), Some(p) if p.color == by_color && p.kind == PieceKind::Pawn) {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn back_rank_mate_is_check() {
        let board = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/4R1K1 w - - 0 1").unwrap();
        let after = board.apply_uci_moves(&["e1e8"]).unwrap();
        assert!(after.is_check());
        assert!(after.is_mate());
    }
}
