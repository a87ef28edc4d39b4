//! The error taxonomy shared by the board, book, engine driver and
//! analysis controller.
//!
//! Component-internal failures (illegal moves, malformed FEN, ambiguous
//! SAN, ...) are represented as a plain `enum` implementing
//! `std::error::Error` so callers can match on the exact failure. At the
//! boundary with the filesystem or the engine process, these get folded
//! into a [`rootcause::Report`] via the blanket `From` conversion so that
//! IO failures and parse failures can be propagated with `?` without the
//! caller having to know which layer produced them.

use std::fmt;

/// Result alias for component-internal operations that fail with a typed
/// [`CoreError`].
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Result alias for boundary operations (file IO, engine process
/// spawning) that attach free-form context via `rootcause`.
pub type Result<T> = std::result::Result<T, rootcause::Report>;

/// The error taxonomy from the design's error-handling section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A FEN string did not parse: malformed placement, side-to-move,
    /// castling or en-passant field.
    InvalidFen { fen: String, reason: String },
    /// A UCI move is not legal in the position it was applied to.
    IllegalMove { fen: String, uci: String },
    /// A SAN token does not resolve to exactly one legal move.
    IllegalOrAmbiguousMove { fen: String, san: String },
    /// A PGN movetext token could not be resolved against the board.
    UnparseableMovetext {
        fen: String,
        ply: usize,
        token: String,
    },
    /// The engine produced an `info`/`score`/`bestmove` stream that
    /// violates the UCI protocol (unknown keyword in a position that
    /// matters, missing or duplicate `bestmove`, ...).
    EngineProtocolViolation { raw_line: String, reason: String },
    /// The engine child process could not be spawned.
    EngineSpawnFailure { binary: String, reason: String },
    /// The operation was aborted via the driver's cancellation scope.
    Cancelled,
    /// Reading or writing a persistent artefact (book, EPD file) failed.
    Io { path: String, reason: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFen { fen, reason } => {
                write!(f, "invalid FEN `{fen}`: {reason}")
            }
            Self::IllegalMove { fen, uci } => {
                write!(f, "illegal move `{uci}` in position `{fen}`")
            }
            Self::IllegalOrAmbiguousMove { fen, san } => {
                write!(
                    f,
                    "SAN `{san}` does not resolve to a unique legal move in `{fen}`"
                )
            }
            Self::UnparseableMovetext { fen, ply, token } => {
                write!(
                    f,
                    "unparseable movetext token `{token}` at ply {ply} (position `{fen}`)"
                )
            }
            Self::EngineProtocolViolation { raw_line, reason } => {
                write!(f, "engine protocol violation ({reason}): `{raw_line}`")
            }
            Self::EngineSpawnFailure { binary, reason } => {
                write!(f, "failed to spawn engine `{binary}`: {reason}")
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Io { path, reason } => write!(f, "IO failure on `{path}`: {reason}"),
        }
    }
}

impl std::error::Error for CoreError {}
