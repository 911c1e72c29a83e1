//! Promotion resolver - picks the promotion piece the engine likes best.
//!
//! Each candidate is pushed onto a shadow copy of the board, evaluated with a
//! short search, and popped again. The authoritative board is never touched
//! from the worker thread.

use std::sync::Mutex;

use shakmaty::{Role, Square};
use tracing::{debug, warn};

use super::engine::AnalysisEngine;
use crate::domain::uci::SearchLimit;
use crate::domain::{PROMOTION_ROLES, PositionState};

/// A last-rank pawn move waiting for its promotion piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPromotion {
    pub from: Square,
    pub to: Square,
    /// Identifies the resolver run started for this promotion
    pub token: u64,
    /// Engine recommendation, once it has arrived
    pub recommended: Option<Role>,
}

impl PendingPromotion {
    pub fn new(from: Square, to: Square, token: u64) -> Self {
        Self {
            from,
            to,
            token,
            recommended: None,
        }
    }
}

/// Recommend a promotion piece for `from -> to` in `shadow`.
///
/// Scores are compared from the promoting side's point of view; on equal
/// scores the earlier piece in Q, R, B, N order wins. Falls back to the queen
/// when there is no engine or no candidate could be evaluated. `shadow` is
/// left with the same position and history it came in with.
pub fn resolve(
    engine: &Mutex<Option<Box<dyn AnalysisEngine>>>,
    shadow: &mut PositionState,
    from: Square,
    to: Square,
    limit: SearchLimit,
) -> Role {
    let mut guard = engine.lock().unwrap_or_else(|e| e.into_inner());
    let Some(engine) = guard.as_mut() else {
        debug!("No engine for promotion probe, defaulting to queen");
        return Role::Queen;
    };

    let mut best: Option<(i32, Role)> = None;
    for role in PROMOTION_ROLES {
        if let Err(e) = shadow.attempt_move(from, to, Some(role)) {
            debug!(?role, error = %e, "Promotion candidate rejected");
            continue;
        }
        let evaluation = engine.analyze(&shadow.snapshot(), limit);
        shadow.pop();

        match evaluation {
            Ok(analysis) => {
                // the engine scores for the opponent, who moves next
                let score = analysis.score.flip().as_centipawns();
                debug!(?role, score, "Promotion candidate evaluated");
                if best.is_none_or(|(top, _)| score > top) {
                    best = Some((score, role));
                }
            }
            Err(e) => warn!(?role, error = %e, "Promotion probe failed"),
        }
    }

    best.map_or(Role::Queen, |(_, role)| role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionSnapshot;
    use crate::domain::chess::move_to_uci;
    use crate::domain::uci::Score;
    use crate::error::EngineError;
    use crate::models::engine::{EngineAnalysis, StrengthOptions};
    use shakmaty::fen::Fen;
    use shakmaty::{CastlingMode, Chess, Position};
    use std::time::Duration;

    /// Scores keyed by the last move played; anything else fails
    struct TableEngine(Vec<(&'static str, Score)>);

    impl AnalysisEngine for TableEngine {
        fn configure(&mut self, _: StrengthOptions) -> Result<(), EngineError> {
            Ok(())
        }

        fn analyze(
            &mut self,
            position: &PositionSnapshot,
            _: SearchLimit,
        ) -> Result<EngineAnalysis, EngineError> {
            let last = position.moves.last().map(move_to_uci).unwrap_or_default();
            self.0
                .iter()
                .find(|(m, _)| *m == last)
                .map(|(_, score)| EngineAnalysis {
                    best_move: None,
                    score: *score,
                })
                .ok_or_else(|| EngineError::Protocol(format!("no score for {last}")))
        }

        fn supported_rating_range(&self) -> Option<(u32, u32)> {
            None
        }

        fn shutdown(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn promotion_board() -> PositionState {
        let pos: Chess = "8/4P3/8/8/8/8/k7/7K w - - 0 1"
            .parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        PositionState::from_position(pos)
    }

    fn run(engine: Option<TableEngine>) -> (Role, PositionState, PositionState) {
        let slot: Mutex<Option<Box<dyn AnalysisEngine>>> =
            Mutex::new(engine.map(|e| Box::new(e) as Box<dyn AnalysisEngine>));
        let before = promotion_board();
        let mut shadow = before.clone();
        let role = resolve(
            &slot,
            &mut shadow,
            Square::E7,
            Square::E8,
            SearchLimit::time(Duration::from_millis(50)),
        );
        (role, before, shadow)
    }

    #[test]
    fn test_no_engine_defaults_to_queen() {
        assert_eq!(run(None).0, Role::Queen);
    }

    #[test]
    fn test_best_score_for_promoting_side_wins() {
        let (role, _, _) = run(Some(TableEngine(vec![
            ("e7e8q", Score::Centipawns(-300)),
            ("e7e8r", Score::Centipawns(-200)),
            ("e7e8b", Score::Centipawns(-100)),
            ("e7e8n", Score::Mate(-1)),
        ])));
        assert_eq!(role, Role::Knight);
    }

    #[test]
    fn test_equal_scores_prefer_queen() {
        let (role, _, _) = run(Some(TableEngine(vec![
            ("e7e8q", Score::Centipawns(-900)),
            ("e7e8r", Score::Centipawns(-900)),
            ("e7e8b", Score::Centipawns(-900)),
            ("e7e8n", Score::Centipawns(-900)),
        ])));
        assert_eq!(role, Role::Queen);
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let (role, _, _) = run(Some(TableEngine(vec![
            ("e7e8b", Score::Centipawns(-50)),
            ("e7e8n", Score::Centipawns(-50)),
        ])));
        assert_eq!(role, Role::Bishop);
    }

    #[test]
    fn test_every_probe_fails_defaults_to_queen() {
        assert_eq!(run(Some(TableEngine(Vec::new()))).0, Role::Queen);
    }

    #[test]
    fn test_shadow_board_is_restored() {
        let (_, before, shadow) = run(Some(TableEngine(vec![(
            "e7e8q",
            Score::Centipawns(-900),
        )])));
        assert_eq!(shadow.fen(), before.fen());
        assert_eq!(shadow.history_len(), before.history_len());
        assert_eq!(shadow.position().board(), before.position().board());
    }
}
