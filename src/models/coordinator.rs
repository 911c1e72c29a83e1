//! Analysis coordinator - owns the authoritative board and schedules engine
//! work off the interactive thread.
//!
//! Architecture:
//! - Every board mutation bumps the position generation and posts a
//!   `PositionChanged` delivery, then (unless a promotion is pending) spawns an
//!   analysis worker with a snapshot of the board
//! - Workers take the engine lock for the whole engine exchange, so at most one
//!   request talks to the engine at a time
//! - All results travel over a single mpsc channel that only the interactive
//!   thread drains; analysis tagged with an old generation is dropped there
//! - Engine and book failures are logged and swallowed, the surface simply
//!   sees no update

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use shakmaty::{Chess, Move, Position, Role, Square};
use tracing::{debug, info, warn};

use super::engine::{AnalysisEngine, StrengthOptions, UciEngine};
use super::promotion::{self, PendingPromotion};
use crate::domain::chess::move_to_uci;
use crate::domain::uci::{Score, SearchLimit};
use crate::domain::{MoveOutcome, OpeningBook, PolyglotBook, PositionSnapshot, PositionState};
use crate::error::{AnalysisError, EngineError, MoveError};

/// Lowest rating the strength setting accepts
pub const MIN_RATING: u32 = 100;

/// Ceiling used until an engine reports its own
pub const DEFAULT_RATING_CEILING: u32 = 3200;

const DEFAULT_SEARCH_DEPTH: u32 = 15;
const DEFAULT_SEARCH_TIME: Duration = Duration::from_millis(100);
const DEFAULT_PROMOTION_TIME: Duration = Duration::from_millis(50);

type EngineSlot = Arc<Mutex<Option<Box<dyn AnalysisEngine>>>>;

/// Where an analysis result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Book,
    Engine,
    None,
}

/// Evaluation of the current position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Relative to the side to move
    pub score: Score,
    pub best_move: Option<Move>,
    pub source: AnalysisSource,
}

impl AnalysisResult {
    pub fn none() -> Self {
        Self {
            score: Score::default(),
            best_move: None,
            source: AnalysisSource::None,
        }
    }

    pub fn is_book(&self) -> bool {
        self.source == AnalysisSource::Book
    }
}

/// Notifications for the presentation surface, in delivery order
#[derive(Debug, Clone)]
pub enum CoreEvent {
    AnalysisUpdated(AnalysisResult),
    PromotionRecommendation(Role),
    PositionChanged(PositionSnapshot),
}

/// Playing strength requested by the user, bounded by the engine's ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrengthSetting {
    rating: u32,
    ceiling: u32,
}

impl StrengthSetting {
    pub fn new(rating: u32) -> Self {
        let mut setting = Self {
            rating: MIN_RATING,
            ceiling: DEFAULT_RATING_CEILING,
        };
        setting.set_rating(rating);
        setting
    }

    pub fn rating(&self) -> u32 {
        self.rating
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Clamp into `[MIN_RATING, ceiling]` and store; returns the stored value
    pub fn set_rating(&mut self, rating: u32) -> u32 {
        self.rating = rating.clamp(MIN_RATING, self.ceiling);
        self.rating
    }

    /// Lower or raise the ceiling, re-clamping the current rating
    pub fn set_ceiling(&mut self, ceiling: u32) {
        self.ceiling = ceiling.max(MIN_RATING);
        self.rating = self.rating.min(self.ceiling);
    }

    pub fn options(&self) -> StrengthOptions {
        StrengthOptions {
            limit_strength: true,
            elo: self.rating,
        }
    }
}

/// Search bounds for the two kinds of engine work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub search: SearchLimit,
    pub promotion: SearchLimit,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            search: SearchLimit::depth(DEFAULT_SEARCH_DEPTH).with_time(DEFAULT_SEARCH_TIME),
            promotion: SearchLimit::time(DEFAULT_PROMOTION_TIME),
        }
    }
}

/// Messages posted by worker threads to the interactive thread
#[derive(Debug)]
enum Delivery {
    Analysis {
        generation: u64,
        result: AnalysisResult,
    },
    Promotion {
        token: u64,
        role: Role,
    },
    Position(PositionSnapshot),
    EngineStarted {
        rating_range: Option<(u32, u32)>,
    },
}

/// One unit of background engine work
struct AnalysisJob {
    snapshot: PositionSnapshot,
    terminal: bool,
    reconfigure: Option<StrengthOptions>,
    analyze: bool,
    limit: SearchLimit,
}

/// Decrements the in-flight worker count when a worker finishes
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct AnalysisCoordinator {
    board: PositionState,
    pending: Option<PendingPromotion>,
    next_token: u64,
    strength: StrengthSetting,
    limits: AnalysisLimits,
    engine: EngineSlot,
    book: Option<Arc<dyn OpeningBook>>,
    tx: Sender<Delivery>,
    rx: Receiver<Delivery>,
    in_flight: Arc<AtomicUsize>,
}

impl AnalysisCoordinator {
    pub fn new(limits: AnalysisLimits, rating: u32) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            board: PositionState::new(),
            pending: None,
            next_token: 0,
            strength: StrengthSetting::new(rating),
            limits,
            engine: Arc::new(Mutex::new(None)),
            book: None,
            tx,
            rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the board with a set-up position and analyze it
    pub fn load_position(&mut self, position: Chess) {
        self.cancel_promotion();
        self.board.load(position);
        self.on_position_changed();
    }

    pub fn board(&self) -> &PositionState {
        &self.board
    }

    pub fn pending_promotion(&self) -> Option<&PendingPromotion> {
        self.pending.as_ref()
    }

    pub fn strength(&self) -> StrengthSetting {
        self.strength
    }

    pub fn limits(&self) -> AnalysisLimits {
        self.limits
    }

    pub fn set_search_limit(&mut self, limit: SearchLimit) {
        self.limits.search = limit;
    }

    /// Whether an engine session is installed. A busy engine counts as present.
    pub fn has_engine(&self) -> bool {
        match self.engine.try_lock() {
            Ok(guard) => guard.is_some(),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(e)) => e.into_inner().is_some(),
        }
    }

    pub fn set_book(&mut self, book: Option<Arc<dyn OpeningBook>>) {
        self.book = book;
    }

    /// Load a Polyglot book; a missing or unreadable file leaves the
    /// coordinator without a book
    pub fn open_book(&mut self, path: &Path) -> bool {
        match PolyglotBook::open(path) {
            Ok(book) => {
                self.book = Some(Arc::new(book));
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Opening book unavailable");
                self.book = None;
                false
            }
        }
    }

    /// Install an already-running engine session. Strength and analysis are
    /// pushed on the next request.
    ///
    /// Takes the engine lock on the calling thread, so it blocks until any
    /// running search finishes (up to the search budget for depth-only limits).
    pub fn attach_engine(&mut self, engine: Box<dyn AnalysisEngine>) {
        let range = engine.supported_rating_range();
        let previous = lock_engine(&self.engine).replace(engine);
        if let Some(mut previous) = previous {
            shutdown_engine(previous.as_mut());
        }
        self.apply_rating_range(range);
    }

    /// Start the UCI engine at `path` on a background thread.
    ///
    /// Once it is up the rating ceiling is updated from the engine's options,
    /// the strength is pushed, and the current position is analyzed.
    pub fn start_engine(&mut self, path: PathBuf) -> Result<(), EngineError> {
        if !path.is_file() {
            warn!(path = %path.display(), "Engine executable not found");
            return Err(EngineError::Unavailable(path));
        }
        self.start_engine_with(move || {
            UciEngine::start(&path).map(|engine| Box::new(engine) as Box<dyn AnalysisEngine>)
        });
        Ok(())
    }

    /// Start an engine session produced by `factory` on a background thread
    pub fn start_engine_with<F>(&mut self, factory: F)
    where
        F: FnOnce() -> Result<Box<dyn AnalysisEngine>, EngineError> + Send + 'static,
    {
        let slot = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        self.spawn_worker("engine-start", move || match factory() {
            Ok(engine) => {
                let rating_range = engine.supported_rating_range();
                let previous = lock_engine(&slot).replace(engine);
                if let Some(mut previous) = previous {
                    shutdown_engine(previous.as_mut());
                }
                let _ = tx.send(Delivery::EngineStarted { rating_range });
            }
            Err(e) => warn!(error = %e, "Engine failed to start"),
        });
    }

    /// Try a move on the authoritative board.
    ///
    /// A last-rank pawn move without a piece does not touch the board: it
    /// becomes the pending promotion and the resolver is started.
    pub fn attempt_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> Result<MoveOutcome, MoveError> {
        if self.pending.is_some() {
            return Err(MoveError::PromotionPending);
        }
        if promotion.is_none() && self.board.is_promotion_move(from, to) {
            self.begin_promotion(from, to);
            return Ok(MoveOutcome::PromotionPending { from, to });
        }
        let m = self.board.attempt_move(from, to, promotion)?;
        self.on_position_changed();
        Ok(MoveOutcome::Applied(m))
    }

    /// Complete the pending promotion with `role`
    pub fn commit_promotion(&mut self, role: Role) -> Result<Move, MoveError> {
        let Some(pending) = self.pending else {
            return Err(MoveError::Illegal);
        };
        let m = self.board.attempt_move(pending.from, pending.to, Some(role))?;
        self.pending = None;
        self.on_position_changed();
        Ok(m)
    }

    /// Drop the pending promotion; its recommendation will be ignored
    pub fn cancel_promotion(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(token = pending.token, "Promotion cancelled");
        }
    }

    /// Take back the last move. Returns whether anything was undone.
    pub fn undo(&mut self) -> bool {
        self.cancel_promotion();
        if self.board.pop().is_none() {
            return false;
        }
        self.on_position_changed();
        true
    }

    pub fn reset(&mut self) {
        self.cancel_promotion();
        self.board.reset();
        self.on_position_changed();
    }

    /// Clamp `rating` to the current ceiling, push it to the engine and
    /// re-analyze. Returns the stored rating.
    pub fn reconfigure_strength(&mut self, rating: u32) -> u32 {
        let stored = self.strength.set_rating(rating);
        info!(requested = rating, rating = stored, "Engine strength changed");
        self.schedule(Some(self.strength.options()));
        stored
    }

    /// Notify the surface of the new position and analyze it
    pub fn on_position_changed(&mut self) {
        let _ = self.tx.send(Delivery::Position(self.board.snapshot()));
        self.schedule(None);
    }

    /// Analyze the unchanged board again, e.g. after the search limit changed.
    /// The surface gets no position notification.
    pub fn reanalyze(&mut self) {
        self.schedule(None);
    }

    /// Every deliverable event currently queued, in arrival order
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            events.extend(self.accept(delivery));
        }
        events
    }

    /// Wait up to `timeout` for the next deliverable event
    pub fn recv_event_timeout(&mut self, timeout: Duration) -> Option<CoreEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(delivery) => {
                    if let Some(event) = self.accept(delivery) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Whether no worker thread is running
    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Block until every worker has finished or `timeout` passes
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Release the engine session.
    ///
    /// Blocks on the engine lock until an in-flight request finishes, which
    /// for a depth-only search can take up to the engine's search budget.
    /// Also runs on drop.
    pub fn shutdown(&mut self) {
        self.pending = None;
        let engine = lock_engine(&self.engine).take();
        if let Some(mut engine) = engine {
            shutdown_engine(engine.as_mut());
        }
    }

    fn accept(&mut self, delivery: Delivery) -> Option<CoreEvent> {
        match delivery {
            Delivery::Analysis { generation, result } => {
                if generation != self.board.generation() {
                    debug!(
                        generation,
                        current = self.board.generation(),
                        "Discarding stale analysis"
                    );
                    return None;
                }
                Some(CoreEvent::AnalysisUpdated(result))
            }
            Delivery::Promotion { token, role } => match self.pending.as_mut() {
                Some(pending) if pending.token == token => {
                    pending.recommended = Some(role);
                    Some(CoreEvent::PromotionRecommendation(role))
                }
                _ => {
                    debug!(token, "Discarding recommendation for cancelled promotion");
                    None
                }
            },
            Delivery::Position(snapshot) => Some(CoreEvent::PositionChanged(snapshot)),
            Delivery::EngineStarted { rating_range } => {
                self.apply_rating_range(rating_range);
                self.reconfigure_strength(self.strength.rating());
                None
            }
        }
    }

    fn apply_rating_range(&mut self, range: Option<(u32, u32)>) {
        if let Some((_, max)) = range {
            self.strength.set_ceiling(max);
            info!(
                ceiling = max,
                rating = self.strength.rating(),
                "Engine rating ceiling applied"
            );
        }
    }

    fn begin_promotion(&mut self, from: Square, to: Square) {
        self.next_token += 1;
        let token = self.next_token;
        self.pending = Some(PendingPromotion::new(from, to, token));
        debug!(%from, %to, token, "Promotion pending");

        let slot = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        let mut shadow = self.board.clone();
        let limit = self.limits.promotion;
        self.spawn_worker("promotion-probe", move || {
            let role = promotion::resolve(&slot, &mut shadow, from, to, limit);
            let _ = tx.send(Delivery::Promotion { token, role });
        });
    }

    fn schedule(&mut self, reconfigure: Option<StrengthOptions>) {
        let job = AnalysisJob {
            snapshot: self.board.snapshot(),
            terminal: self.board.is_terminal(),
            reconfigure,
            analyze: self.pending.is_none(),
            limit: self.limits.search,
        };
        if job.reconfigure.is_none() && !job.analyze {
            return;
        }
        let slot = Arc::clone(&self.engine);
        let book = self.book.clone();
        let tx = self.tx.clone();
        self.spawn_worker("analysis-worker", move || {
            run_job(&slot, book.as_deref(), &tx, job);
        });
    }

    fn spawn_worker<F>(&self, name: &str, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let counter = Arc::clone(&self.in_flight);
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let _in_flight = InFlight(counter);
            work();
        });
        if let Err(e) = spawned {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(worker = name, error = %e, "Failed to spawn worker thread");
        }
    }
}

impl Drop for AnalysisCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_engine(slot: &EngineSlot) -> MutexGuard<'_, Option<Box<dyn AnalysisEngine>>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

fn shutdown_engine(engine: &mut dyn AnalysisEngine) {
    if let Err(e) = engine.shutdown() {
        warn!(error = %e, "Engine shutdown failed");
    }
}

fn run_job(
    slot: &EngineSlot,
    book: Option<&dyn OpeningBook>,
    tx: &Sender<Delivery>,
    job: AnalysisJob,
) {
    if let Some(options) = job.reconfigure {
        apply_strength(slot, options);
    }
    if !job.analyze {
        return;
    }
    match analyze_position(slot, book, &job) {
        Ok(result) => {
            let _ = tx.send(Delivery::Analysis {
                generation: job.snapshot.generation,
                result,
            });
        }
        Err(AnalysisError::EngineCallFailed(e)) => warn!(error = %e, "Analysis failed"),
        Err(e) => debug!(reason = %e, "No analysis for position"),
    }
}

fn apply_strength(slot: &EngineSlot, options: StrengthOptions) {
    let mut guard = lock_engine(slot);
    let Some(engine) = guard.as_mut() else {
        return;
    };
    match engine.configure(options) {
        Ok(()) => debug!(elo = options.elo, "Engine strength applied"),
        Err(EngineError::UnsupportedOption(name)) => {
            debug!(option = name, "Engine has no strength option")
        }
        Err(e) => {
            warn!(error = %e, "Reconfiguring engine failed, releasing it");
            if let Some(mut engine) = guard.take() {
                shutdown_engine(engine.as_mut());
            }
        }
    }
}

/// Book first, then the engine for positions that are still in play
fn analyze_position(
    slot: &EngineSlot,
    book: Option<&dyn OpeningBook>,
    job: &AnalysisJob,
) -> Result<AnalysisResult, AnalysisError> {
    let position = &job.snapshot.position;
    if let Some(m) = book.and_then(|b| b.find(position)) {
        return Ok(AnalysisResult {
            score: Score::default(),
            best_move: Some(m),
            source: AnalysisSource::Book,
        });
    }
    if job.terminal {
        return Err(AnalysisError::Terminal);
    }

    let mut guard = lock_engine(slot);
    let Some(engine) = guard.as_mut() else {
        return Err(AnalysisError::EngineUnavailable);
    };
    let analysis = match engine.analyze(&job.snapshot, job.limit) {
        Ok(analysis) => analysis,
        Err(e) => {
            if matches!(e, EngineError::Exited | EngineError::Timeout(_)) {
                warn!("Engine session lost");
                drop(guard.take());
            }
            return Err(e.into());
        }
    };

    let best_move = analysis
        .best_move
        .as_deref()
        .and_then(|uci| legal_move_from_uci(position, uci));
    Ok(AnalysisResult {
        score: analysis.score,
        best_move,
        source: AnalysisSource::Engine,
    })
}

fn legal_move_from_uci(position: &Chess, uci: &str) -> Option<Move> {
    position
        .legal_moves()
        .into_iter()
        .find(|m| move_to_uci(m) == uci)
}
