//! Scripted engine and book doubles shared by the scenario tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_overlay::domain::chess::move_to_uci;
use chess_overlay::domain::rules::position_key;
use chess_overlay::domain::{OpeningBook, PositionSnapshot, Score, SearchLimit};
use chess_overlay::error::EngineError;
use chess_overlay::models::{AnalysisCoordinator, AnalysisEngine, AnalysisLimits, CoreEvent};
use chess_overlay::models::{EngineAnalysis, StrengthOptions};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move, Position};

pub const WAIT: Duration = Duration::from_secs(10);

/// What the engine double saw
#[derive(Default)]
pub struct EngineStats {
    pub analyses: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub configured: Mutex<Vec<StrengthOptions>>,
    pub limits: Mutex<Vec<SearchLimit>>,
}

impl EngineStats {
    pub fn analyses(&self) -> usize {
        self.analyses.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn last_elo(&self) -> Option<u32> {
        self.configured.lock().unwrap().last().map(|o| o.elo)
    }
}

/// Engine whose score depends on the last move played.
///
/// With a gate installed every `analyze` blocks until the test releases it.
pub struct ScriptedEngine {
    stats: Arc<EngineStats>,
    scores: Vec<(&'static str, Score)>,
    default_score: Score,
    gate: Option<Receiver<()>>,
    range: Option<(u32, u32)>,
    failing: bool,
}

impl ScriptedEngine {
    pub fn new() -> (Self, Arc<EngineStats>) {
        let stats = Arc::new(EngineStats::default());
        let engine = Self {
            stats: Arc::clone(&stats),
            scores: Vec::new(),
            default_score: Score::Centipawns(20),
            gate: None,
            range: Some((1320, 3190)),
            failing: false,
        };
        (engine, stats)
    }

    pub fn score(mut self, last_move: &'static str, score: Score) -> Self {
        self.scores.push((last_move, score));
        self
    }

    pub fn gated(mut self, gate: Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn rating_range(mut self, range: Option<(u32, u32)>) -> Self {
        self.range = range;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

impl AnalysisEngine for ScriptedEngine {
    fn configure(&mut self, options: StrengthOptions) -> Result<(), EngineError> {
        self.stats.configured.lock().unwrap().push(options);
        Ok(())
    }

    fn analyze(
        &mut self,
        position: &PositionSnapshot,
        limit: SearchLimit,
    ) -> Result<EngineAnalysis, EngineError> {
        self.stats.analyses.fetch_add(1, Ordering::SeqCst);
        self.stats.limits.lock().unwrap().push(limit);
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| EngineError::Exited)?;
        }
        if self.failing {
            return Err(EngineError::Protocol("scripted failure".into()));
        }
        let last = position.moves.last().map(move_to_uci).unwrap_or_default();
        let score = self
            .scores
            .iter()
            .find(|(m, _)| *m == last)
            .map_or(self.default_score, |(_, s)| *s);
        let best_move = position.position.legal_moves().first().map(move_to_uci);
        Ok(EngineAnalysis { best_move, score })
    }

    fn supported_rating_range(&self) -> Option<(u32, u32)> {
        self.range
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Book that knows a single position
pub struct OnePositionBook {
    key: u64,
    reply: Move,
    pub lookups: AtomicUsize,
}

impl OnePositionBook {
    pub fn new(position: &Chess, reply: Move) -> Self {
        Self {
            key: position_key(position),
            reply,
            lookups: AtomicUsize::new(0),
        }
    }
}

impl OpeningBook for OnePositionBook {
    fn find(&self, pos: &Chess) -> Option<Move> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        (position_key(pos) == self.key).then(|| self.reply.clone())
    }
}

pub fn coordinator() -> AnalysisCoordinator {
    AnalysisCoordinator::new(AnalysisLimits::default(), 1500)
}

pub fn position(fen: &str) -> Chess {
    fen.parse::<Fen>()
        .unwrap()
        .into_position(CastlingMode::Standard)
        .unwrap()
}

/// White pawn on e7, kings out of the way
pub const PROMOTION_FEN: &str = "8/4P3/8/8/8/8/k7/7K w - - 0 1";

/// Let every worker finish, then collect what reached the surface
pub fn settle(coordinator: &mut AnalysisCoordinator) -> Vec<CoreEvent> {
    assert!(coordinator.wait_idle(WAIT), "workers did not finish");
    coordinator.drain_events()
}
