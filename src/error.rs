//! Error types for the overlay core.
//!
//! Engine and book failures are recovered inside the coordinator; these types
//! exist so that recovery is an explicit branch rather than a silent catch.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the analysis engine process.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine executable not found: {0}")]
    Unavailable(PathBuf),

    #[error("failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("engine process exited")]
    Exited,

    #[error("engine does not support option {0}")]
    UnsupportedOption(&'static str),
}

/// Failures loading a Polyglot opening book.
#[derive(Error, Debug)]
pub enum BookError {
    #[error("failed to read opening book: {0}")]
    Io(#[from] std::io::Error),

    #[error("opening book size {0} is not a multiple of 16 bytes")]
    Truncated(usize),
}

/// Failures reading or writing the persisted overlay configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected move attempts. None of these mutate the position.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("no piece on the source square")]
    NoPiece,

    #[error("piece does not belong to the side to move")]
    NotYourTurn,

    #[error("move is not legal in this position")]
    Illegal,

    #[error("pawn reaches the last rank; a promotion piece is required")]
    PromotionRequired,

    #[error("a promotion choice is pending")]
    PromotionPending,
}

/// Why a background analysis produced no result.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no engine session is running")]
    EngineUnavailable,

    #[error("position is already decided")]
    Terminal,

    #[error("engine call failed: {0}")]
    EngineCallFailed(#[from] EngineError),
}
