//! Move application.
//!
//! `apply_move` takes a `Move` already known to be syntactically a UCI
//! move and plays it on a *copy* of the board, updating castling rights,
//! the en-passant target, the two move counters and the side to move. It
//! does not re-derive legality from scratch (that is `legal_moves`'
//! job) but it does reject moves that aren't even pseudo-legal, since a
//! `bestmove`/PV move that doesn't correspond to a piece on its source
//! square is a protocol bug worth surfacing rather than silently
//! miscounting halfmoves.

use crate::board::{Board, CastlingRights, Color, Move, Piece, PieceKind, Square};
use crate::error::CoreError;

pub fn apply_move(board: &Board, mv: Move) -> Result<Board, CoreError> {
    let illegal = || CoreError::IllegalMove {
        fen: board.to_fen(),
        uci: mv.to_uci(),
    };

    let mover = board.piece_at(mv.from).ok_or_else(illegal)?;
    if mover.color != board.side_to_move() {
        return Err(illegal());
    }

    let mut next = board.clone();
    let mut capture = board.piece_at(mv.to).is_some();

    // En-passant capture: a pawn moving onto the target square removes
    // the enemy pawn behind it, not on the target square itself.
    if mover.kind == PieceKind::Pawn && Some(mv.to) == board.en_passant_square() && board.piece_at(mv.to).is_none() {
        let captured_sq = Square::from_file_rank(mv.to.file(), mv.from.rank());
        next.set_piece_at(captured_sq, None);
        capture = true;
    }

    next.set_piece_at(mv.from, None);
    let placed = match mv.promotion {
        Some(kind) => Piece::new(kind, mover.color),
        None => mover,
    };
    next.set_piece_at(mv.to, Some(placed));

    // Castling: a king moving two files drags its rook along.
    if mover.kind == PieceKind::King {
        let file_delta = mv.to.file() as i32 - mv.from.file() as i32;
        if file_delta == 2 {
            let rank = mv.from.rank();
            let rook = next.piece_at(Square::from_file_rank(7, rank));
            next.set_piece_at(Square::from_file_rank(7, rank), None);
            next.set_piece_at(Square::from_file_rank(5, rank), rook);
        } else if file_delta == -2 {
            let rank = mv.from.rank();
            let rook = next.piece_at(Square::from_file_rank(0, rank));
            next.set_piece_at(Square::from_file_rank(0, rank), None);
            next.set_piece_at(Square::from_file_rank(3, rank), rook);
        }
    }

    let mut rights = next.castling_rights();
    update_castling_rights(&mut rights, mover, mv);
    set_castling_rights(&mut next, rights);

    let en_passant = if mover.kind == PieceKind::Pawn && mv.from.rank().abs_diff(mv.to.rank()) == 2 {
        Some(Square::from_file_rank(mv.from.file(), (mv.from.rank() + mv.to.rank()) / 2))
    } else {
        None
    };
    set_en_passant(&mut next, en_passant);

    let reset_clock = mover.kind == PieceKind::Pawn || capture;
    set_halfmove_clock(&mut next, if reset_clock { 0 } else { board.halfmove_clock() + 1 });

    let next_fullmove = if board.side_to_move() == Color::Black {
        board.fullmove_number() + 1
    } else {
        board.fullmove_number()
    };
    set_fullmove_number(&mut next, next_fullmove);

    set_side_to_move(&mut next, board.side_to_move().opponent());

    Ok(next)
}

/// Clear castling rights implicated by a king move, or by either rook's
/// home square being vacated or captured on.
fn update_castling_rights(rights: &mut CastlingRights, mover: Piece, mv: Move) {
    if mover.kind == PieceKind::King {
        rights.clear_both(mover.color);
    }
    for (sq, color, clear) in [
        (Square::from_file_rank(0, 0), Color::White, "long"),
        (Square::from_file_rank(7, 0), Color::White, "short"),
        (Square::from_file_rank(0, 7), Color::Black, "long"),
        (Square::from_file_rank(7, 7), Color::Black, "short"),
    ] {
        if mv.from == sq || mv.to == sq {
            if clear == "long" {
                rights.clear_long(color);
            } else {
                rights.clear_short(color);
            }
        }
    }
}

// The following helpers poke at `Board`'s private fields through the
// crate-internal setters defined alongside the struct; kept here rather
// than as public `Board` methods since only move application needs to
// mutate transients directly.

fn set_castling_rights(board: &mut Board, rights: CastlingRights) {
    board.castling_internal_mut().clone_from(&rights);
}

fn set_en_passant(board: &mut Board, sq: Option<Square>) {
    *board.en_passant_internal_mut() = sq;
}

fn set_halfmove_clock(board: &mut Board, v: u32) {
    *board.halfmove_clock_internal_mut() = v;
}

fn set_fullmove_number(board: &mut Board, v: u32) {
    *board.fullmove_number_internal_mut() = v;
}

fn set_side_to_move(board: &mut Board, color: Color) {
    *board.side_to_move_internal_mut() = color;
}
