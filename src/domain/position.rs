//! Authoritative board state with a transactional undo stack.
//!
//! Every applied move records the exact position it was played from, so
//! `pop` restores the prior state bit-for-bit. A generation counter ticks on
//! every mutation and is used to recognise stale asynchronous results.

use shakmaty::fen::Fen;
use shakmaty::{Chess, Color, EnPassantMode, Move, Position, Role, Square};

use super::chess::{Piece, is_last_rank, move_to_uci, shakmaty_to_piece};
use super::rules;
use crate::error::MoveError;

/// One entry on the undo stack
#[derive(Clone, Debug)]
struct Ply {
    played: Move,
    before: Chess,
}

/// Result of a successful move attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move was pushed
    Applied(Move),
    /// A pawn reaches the last rank and the queen promotion is legal;
    /// nothing was pushed, a piece must be chosen first
    PromotionPending { from: Square, to: Square },
}

#[derive(Clone, Debug)]
pub struct PositionState {
    /// Set-up position the history starts from; `None` is the standard start
    root: Option<Chess>,
    position: Chess,
    history: Vec<Ply>,
    generation: u64,
}

/// Immutable copy of the board handed to background work and the surface
#[derive(Clone, Debug)]
pub struct PositionSnapshot {
    pub generation: u64,
    /// FEN of the set-up position, `None` for the standard start
    pub root_fen: Option<String>,
    pub position: Chess,
    pub moves: Vec<Move>,
}

impl PositionSnapshot {
    pub fn uci_moves(&self) -> Vec<String> {
        self.moves.iter().map(move_to_uci).collect()
    }

    pub fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }
}

impl PositionState {
    pub fn new() -> Self {
        Self {
            root: None,
            position: Chess::default(),
            history: Vec::new(),
            generation: 0,
        }
    }

    /// Start from an arbitrary legal position with an empty history
    pub fn from_position(position: Chess) -> Self {
        Self {
            root: Some(position.clone()),
            position,
            history: Vec::new(),
            generation: 0,
        }
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn moves(&self) -> impl Iterator<Item = &Move> {
        self.history.iter().map(|ply| &ply.played)
    }

    /// Each played move with the position it was played from, oldest first
    pub fn plies(&self) -> impl Iterator<Item = (&Chess, &Move)> {
        self.history.iter().map(|ply| (&ply.before, &ply.played))
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square).map(shakmaty_to_piece)
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            generation: self.generation,
            root_fen: self
                .root
                .as_ref()
                .map(|root| Fen::from_position(root, EnPassantMode::Legal).to_string()),
            position: self.position.clone(),
            moves: self.moves().cloned().collect(),
        }
    }

    /// Whether the square holds a piece of the side to move
    pub fn select(&self, square: Square) -> bool {
        self.position
            .board()
            .piece_at(square)
            .is_some_and(|p| p.color == self.position.turn())
    }

    /// Whether moving from `from` to `to` is a pawn promotion whose queen
    /// variant is legal
    pub fn is_promotion_move(&self, from: Square, to: Square) -> bool {
        let is_pawn = self.position.board().role_at(from) == Some(Role::Pawn);
        is_pawn
            && is_last_rank(to)
            && rules::find_move(&self.position, from, to, Some(Role::Queen)).is_some()
    }

    /// Validate and apply a user move.
    ///
    /// A last-rank pawn move without a piece is rejected with
    /// [`MoveError::PromotionRequired`]; use [`PositionState::is_promotion_move`]
    /// to route such moves to the promotion flow first.
    pub fn attempt_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> Result<Move, MoveError> {
        let Some(piece) = self.position.board().piece_at(from) else {
            return Err(MoveError::NoPiece);
        };
        if piece.color != self.position.turn() {
            return Err(MoveError::NotYourTurn);
        }
        if promotion.is_none() && self.is_promotion_move(from, to) {
            return Err(MoveError::PromotionRequired);
        }
        let m = rules::find_move(&self.position, from, to, promotion).ok_or(MoveError::Illegal)?;
        self.push(m.clone())?;
        Ok(m)
    }

    /// Push a fully-specified move after checking legality
    pub fn push(&mut self, m: Move) -> Result<(), MoveError> {
        if !rules::is_legal(&self.position, &m) {
            return Err(MoveError::Illegal);
        }
        let before = self.position.clone();
        let after = before.clone().play(m.clone()).map_err(|_| MoveError::Illegal)?;
        self.history.push(Ply { played: m, before });
        self.position = after;
        self.generation += 1;
        Ok(())
    }

    /// Take back the last move; no-op on an empty history
    pub fn pop(&mut self) -> Option<Move> {
        let ply = self.history.pop()?;
        self.position = ply.before;
        self.generation += 1;
        Some(ply.played)
    }

    /// Replace with a set-up position and clear history
    pub fn load(&mut self, position: Chess) {
        self.root = Some(position.clone());
        self.position = position;
        self.history.clear();
        self.generation += 1;
    }

    /// Replace with the standard initial position and clear history
    pub fn reset(&mut self) {
        self.root = None;
        self.position = Chess::default();
        self.history.clear();
        self.generation += 1;
    }

    pub fn is_terminal(&self) -> bool {
        rules::is_terminal(&self.position, self.history.iter().map(|ply| &ply.before))
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::new()
    }
}
