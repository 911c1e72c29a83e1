//! Game model - the move-input state machine in front of the coordinator.
//!
//! Clicks arrive as squares. The first click selects one of the side to
//! move's pieces, the second tries the move. Last-rank pawn moves park the
//! model in `AwaitingPromotionChoice` until a piece is chosen.

use shakmaty::{Move, Role, Square};
use tracing::debug;

use super::coordinator::{AnalysisCoordinator, AnalysisResult, CoreEvent};
use crate::domain::MoveOutcome;
use crate::error::MoveError;

/// Rating change applied by one strength step
pub const RATING_STEP: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    Idle,
    SquareSelected(Square),
    AwaitingPromotionChoice { from: Square, to: Square },
}

/// What a click did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing happened (empty square, opponent piece, or a promotion is pending)
    Ignored,
    Selected(Square),
    Moved(Move),
    PromotionPending { from: Square, to: Square },
    /// The move was refused and the selection cleared
    Rejected(MoveError),
}

/// The main game model: coordinator plus what the surface needs to remember
pub struct GameModel {
    coordinator: AnalysisCoordinator,
    input: InputState,
    flipped: bool,
    /// Most recent analysis that survived the generation check
    last_analysis: AnalysisResult,
    /// Engine suggestion for the pending promotion
    promotion_hint: Option<Role>,
}

impl GameModel {
    pub fn new(coordinator: AnalysisCoordinator) -> Self {
        Self {
            coordinator,
            input: InputState::Idle,
            flipped: false,
            last_analysis: AnalysisResult::none(),
            promotion_hint: None,
        }
    }

    pub fn coordinator(&self) -> &AnalysisCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut AnalysisCoordinator {
        &mut self.coordinator
    }

    pub fn input_state(&self) -> InputState {
        self.input
    }

    pub fn selected_square(&self) -> Option<Square> {
        match self.input {
            InputState::SquareSelected(square) => Some(square),
            _ => None,
        }
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn last_analysis(&self) -> &AnalysisResult {
        &self.last_analysis
    }

    pub fn promotion_hint(&self) -> Option<Role> {
        self.promotion_hint
    }

    /// Handle a click on `square`
    pub fn click(&mut self, square: Square) -> ClickOutcome {
        match self.input {
            InputState::AwaitingPromotionChoice { .. } => ClickOutcome::Ignored,
            InputState::Idle => self.select_or_ignore(square),
            InputState::SquareSelected(from) => {
                match self.coordinator.attempt_move(from, square, None) {
                    Ok(MoveOutcome::Applied(m)) => {
                        self.input = InputState::Idle;
                        self.last_analysis = AnalysisResult::none();
                        ClickOutcome::Moved(m)
                    }
                    Ok(MoveOutcome::PromotionPending { from, to }) => {
                        self.input = InputState::AwaitingPromotionChoice { from, to };
                        self.promotion_hint = None;
                        ClickOutcome::PromotionPending { from, to }
                    }
                    Err(e) => {
                        debug!(%from, to = %square, error = %e, "Move rejected");
                        match self.select_or_ignore(square) {
                            ClickOutcome::Ignored => ClickOutcome::Rejected(e),
                            reselected => reselected,
                        }
                    }
                }
            }
        }
    }

    fn select_or_ignore(&mut self, square: Square) -> ClickOutcome {
        if self.coordinator.board().select(square) {
            self.input = InputState::SquareSelected(square);
            ClickOutcome::Selected(square)
        } else {
            self.input = InputState::Idle;
            ClickOutcome::Ignored
        }
    }

    /// Finish the pending promotion with `role`
    pub fn choose_promotion(&mut self, role: Role) -> Result<Move, MoveError> {
        let m = self.coordinator.commit_promotion(role)?;
        self.input = InputState::Idle;
        self.promotion_hint = None;
        self.last_analysis = AnalysisResult::none();
        Ok(m)
    }

    pub fn cancel_promotion(&mut self) {
        self.coordinator.cancel_promotion();
        self.promotion_hint = None;
        self.input = InputState::Idle;
    }

    pub fn undo(&mut self) -> bool {
        self.clear_input();
        self.coordinator.undo()
    }

    pub fn reset(&mut self) {
        self.clear_input();
        self.coordinator.reset();
    }

    /// Flip the board orientation; returns the new orientation
    pub fn toggle_flip(&mut self) -> bool {
        self.flipped = !self.flipped;
        self.flipped
    }

    /// Move the strength rating by `delta`; returns the clamped rating
    pub fn change_rating(&mut self, delta: i32) -> u32 {
        let current = i64::from(self.coordinator.strength().rating());
        let target = u32::try_from((current + i64::from(delta)).max(0)).unwrap_or(u32::MAX);
        self.coordinator.reconfigure_strength(target)
    }

    /// Apply queued core events and hand them back for display
    pub fn poll(&mut self) -> Vec<CoreEvent> {
        let events = self.coordinator.drain_events();
        for event in &events {
            match event {
                CoreEvent::AnalysisUpdated(result) => self.last_analysis = result.clone(),
                CoreEvent::PromotionRecommendation(role) => self.promotion_hint = Some(*role),
                CoreEvent::PositionChanged(_) => {}
            }
        }
        events
    }

    fn clear_input(&mut self) {
        self.input = InputState::Idle;
        self.promotion_hint = None;
        self.last_analysis = AnalysisResult::none();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coordinator::AnalysisLimits;
    use shakmaty::fen::Fen;
    use shakmaty::{CastlingMode, Chess, Position};
    use std::time::Duration;

    fn model() -> GameModel {
        GameModel::new(AnalysisCoordinator::new(AnalysisLimits::default(), 1500))
    }

    fn promotion_model() -> GameModel {
        let mut game = model();
        let pos: Chess = "8/4P3/8/8/8/8/k7/7K w - - 0 1"
            .parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        game.coordinator_mut().load_position(pos);
        game
    }

    #[test]
    fn test_two_clicks_make_a_move() {
        let mut game = model();
        assert_eq!(game.click(Square::E2), ClickOutcome::Selected(Square::E2));
        assert!(matches!(game.click(Square::E4), ClickOutcome::Moved(_)));
        assert_eq!(game.input_state(), InputState::Idle);
        assert_eq!(game.coordinator().board().history_len(), 1);
    }

    #[test]
    fn test_click_on_empty_or_enemy_square_is_ignored() {
        let mut game = model();
        assert_eq!(game.click(Square::E4), ClickOutcome::Ignored);
        assert_eq!(game.click(Square::E7), ClickOutcome::Ignored);
        assert_eq!(game.input_state(), InputState::Idle);
    }

    #[test]
    fn test_illegal_target_with_own_piece_reselects() {
        let mut game = model();
        game.click(Square::E2);
        assert_eq!(game.click(Square::D2), ClickOutcome::Selected(Square::D2));
        assert_eq!(
            game.click(Square::D5),
            ClickOutcome::Rejected(MoveError::Illegal)
        );
        assert_eq!(game.input_state(), InputState::Idle);
        assert_eq!(game.coordinator().board().history_len(), 0);
    }

    #[test]
    fn test_promotion_waits_for_piece() {
        let mut game = promotion_model();
        game.click(Square::E7);
        assert_eq!(
            game.click(Square::E8),
            ClickOutcome::PromotionPending {
                from: Square::E7,
                to: Square::E8
            }
        );
        assert_eq!(game.click(Square::H1), ClickOutcome::Ignored);
        assert_eq!(game.coordinator().board().history_len(), 0);

        game.choose_promotion(Role::Rook).unwrap();
        let board = game.coordinator().board();
        assert_eq!(board.history_len(), 1);
        assert_eq!(board.position().board().role_at(Square::E8), Some(Role::Rook));
        assert_eq!(game.input_state(), InputState::Idle);
    }

    #[test]
    fn test_promotion_hint_arrives_without_engine() {
        let mut game = promotion_model();
        game.click(Square::E7);
        game.click(Square::E8);
        assert!(game.coordinator().wait_idle(Duration::from_secs(5)));
        game.poll();
        assert_eq!(game.promotion_hint(), Some(Role::Queen));
    }

    #[test]
    fn test_undo_clears_pending_promotion() {
        let mut game = promotion_model();
        game.click(Square::E7);
        game.click(Square::E8);
        assert!(!game.undo());
        assert_eq!(game.input_state(), InputState::Idle);
        assert!(game.coordinator().pending_promotion().is_none());
    }

    #[test]
    fn test_rating_steps_are_clamped() {
        let mut game = model();
        assert_eq!(game.change_rating(RATING_STEP), 1600);
        assert_eq!(game.change_rating(-10_000), 100);
        assert_eq!(game.change_rating(10_000), 3200);
    }

    #[test]
    fn test_flip_toggles() {
        let mut game = model();
        assert!(game.toggle_flip());
        assert!(!game.toggle_flip());
        assert_eq!(game.coordinator().board().position().turn(), shakmaty::Color::White);
    }
}
