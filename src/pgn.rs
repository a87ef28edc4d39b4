//! PGN movetext replay.
//!
//! Takes a raw PGN movetext body (headers already stripped by the
//! caller — header parsing is a collaborator's job, see the module docs
//! in `lib.rs`), strips comments, move numbers, NAGs and result tokens,
//! and resolves each remaining SAN token against a running [`Board`],
//! yielding `(san, uci)` pairs in order.

use crate::board::{Board, Move};
use crate::error::CoreError;

/// One resolved ply: the SAN as it appeared in the movetext, and the UCI
/// move it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayedPly {
    pub san: String,
    pub uci: Move,
}

/// Strip `{ ... }` comments (which may themselves contain braces'
/// siblings like spaces and punctuation, but not nested braces), move
/// numbers (`12.` / `12...`), NAGs (`$7`), and result tokens, leaving
/// only SAN tokens.
fn tokenize(movetext: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(movetext.len());
    let mut depth = 0u32;
    for c in movetext.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ => cleaned.push(c),
        }
    }

    cleaned
        .split_whitespace()
        .filter(|tok| !is_move_number(tok))
        .filter(|tok| !is_result(tok))
        .filter(|tok| !tok.starts_with('$'))
        .map(|tok| tok.to_string())
        .collect()
}

fn is_move_number(tok: &str) -> bool {
    let digits_then_dots = tok.trim_end_matches('.');
    !digits_then_dots.is_empty() && digits_then_dots.chars().all(|c| c.is_ascii_digit()) && tok.contains('.')
}

fn is_result(tok: &str) -> bool {
    matches!(tok, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Replay a movetext body starting from `start`, returning the resolved
/// `(san, uci)` pairs and the board reached after the last ply.
pub fn replay(start: &Board, movetext: &str) -> Result<(Vec<ReplayedPly>, Board), CoreError> {
    let mut board = start.clone();
    let mut plies = Vec::new();

    for (ply, token) in tokenize(movetext).into_iter().enumerate() {
        let uci = board.san_to_uci(&token).map_err(|_| CoreError::UnparseableMovetext {
            fen: board.to_fen(),
            ply,
            token: token.clone(),
        })?;
        board = board.apply_move(uci).map_err(|_| CoreError::UnparseableMovetext {
            fen: board.to_fen(),
            ply,
            token: token.clone(),
        })?;
        plies.push(ReplayedPly { san: token, uci });
    }

    Ok((plies, board))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_simple_opening() {
        let start = Board::starting_position();
        let (plies, board) = replay(&start, "1. e4 e5 2. Nf3 Nc6 3. Bb5 *").unwrap();
        assert_eq!(plies.len(), 5);
        assert_eq!(plies[0].san, "e4");
        assert_eq!(board.side_to_move(), crate::board::Color::Black);
    }

    #[test]
    fn strips_comments_and_nags() {
        let start = Board::starting_position();
        let (plies, _) = replay(&start, "1. e4 {a good move} $1 e5 2. Nf3").unwrap();
        assert_eq!(plies.len(), 3);
    }

    #[test]
    fn reports_unparseable_token_with_context() {
        let start = Board::starting_position();
        let err = replay(&start, "1. e4 Zz9").unwrap_err();
        match err {
            CoreError::UnparseableMovetext { ply, token, .. } => {
                assert_eq!(ply, 1);
                assert_eq!(token, "Zz9");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
