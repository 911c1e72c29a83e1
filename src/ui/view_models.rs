//! View models for rendering the move list and the evaluation.
//!
//! These types are DTOs (Data Transfer Objects) that prepare core state
//! for display. They live in the UI layer, not the domain layer.

/// Display data for one move of the game
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveListEntry {
    pub move_num: u32,
    pub is_black: bool,
    pub san: String,
    /// Whether this move gives check
    pub is_check: bool,
    /// Whether this move gives checkmate
    pub is_checkmate: bool,
}

/// Display data for the eval bar and the info area
#[derive(Clone, Debug, PartialEq)]
pub struct EvalDisplay {
    /// `BOOK`, `MATE n` or a signed pawn value like `+0.35`
    pub label: String,
    /// Share of the bar filled for White, 0.0..=1.0
    pub white_fraction: f32,
    /// Best move in UCI notation
    pub best_move: Option<String>,
    pub from_book: bool,
}
