//! Engine process handle - owns a UCI engine subprocess and runs blocking
//! analysis calls against it.
//!
//! Architecture:
//! - Engine stdout is read on a dedicated OS thread and forwarded line by
//!   line over an mpsc channel
//! - Requests are written directly to stdin by whoever holds the handle
//! - Every read waits against a deadline so a hung engine cannot wedge the
//!   caller forever
//!
//! The handle supports exactly one in-flight request; callers serialize
//! access (the coordinator keeps it behind a mutex).

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::domain::PositionSnapshot;
use crate::domain::uci::{
    Score, SearchLimit, UciCommand, UciInfo, UciOption, UciOutputKind, parse_bestmove,
};
use crate::error::EngineError;

/// Time allowed for `uci`/`uciok` and `isready`/`readyok` exchanges
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack on top of a timed search before we ask the engine to stop
const SEARCH_GRACE: Duration = Duration::from_secs(5);

/// Budget for a depth-only search
const DEPTH_ONLY_BUDGET: Duration = Duration::from_secs(60);

/// Time given to answer `stop` with `bestmove`
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Time given to exit after `quit` before the process is killed
const QUIT_GRACE: Duration = Duration::from_millis(500);

const ELO_OPTION: &str = "UCI_Elo";
const LIMIT_STRENGTH_OPTION: &str = "UCI_LimitStrength";

/// Playing-strength options pushed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrengthOptions {
    pub limit_strength: bool,
    pub elo: u32,
}

/// Outcome of one analysis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAnalysis {
    /// First move of the principal variation, in UCI notation
    pub best_move: Option<String>,
    /// Score relative to the side to move in the analyzed position
    pub score: Score,
}

/// A session with an analysis engine.
///
/// Every call may fail with a transport or protocol error.
pub trait AnalysisEngine: Send {
    fn configure(&mut self, options: StrengthOptions) -> Result<(), EngineError>;

    fn analyze(
        &mut self,
        position: &PositionSnapshot,
        limit: SearchLimit,
    ) -> Result<EngineAnalysis, EngineError>;

    /// `(min, max)` rating the engine accepts, if it exposes one
    fn supported_rating_range(&self) -> Option<(u32, u32)>;

    fn shutdown(&mut self) -> Result<(), EngineError>;
}

/// Messages sent from the engine reader thread
#[derive(Debug)]
enum EngineEvent {
    /// A line of output from the engine
    Output(String),
    /// Engine process exited
    Exited,
    /// Reading stdout failed
    Error(String),
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// A UCI engine running as a child process
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    events: Receiver<EngineEvent>,
    name: Option<String>,
    options: Vec<UciOption>,
    alive: bool,
}

impl UciEngine {
    /// Spawn the engine at `path` and complete the UCI handshake
    pub fn start(path: &Path) -> Result<Self, EngineError> {
        if !path.is_file() {
            return Err(EngineError::Unavailable(path.to_path_buf()));
        }
        Self::spawn(Command::new(path))
    }

    /// Spawn an arbitrary command as the engine (stdio is overridden)
    pub fn spawn(mut command: Command) -> Result<Self, EngineError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EngineError::Spawn)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(EngineError::Protocol("engine stdio not captured".into()));
        };

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();
        let reader = thread::Builder::new()
            .name("uci-reader".into())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    match line {
                        Ok(text) => {
                            if event_tx.send(EngineEvent::Output(text)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }
                let _ = event_tx.send(EngineEvent::Exited);
            });
        if let Err(e) = reader {
            let _ = child.kill();
            return Err(EngineError::Io(e));
        }

        let mut engine = Self {
            process: child,
            stdin,
            events: event_rx,
            name: None,
            options: Vec::new(),
            alive: true,
        };
        engine.handshake()?;
        info!(
            name = engine.name.as_deref().unwrap_or("unknown"),
            options = engine.options.len(),
            "Engine started"
        );
        Ok(engine)
    }

    /// Engine name from `id name`
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.option(name).is_some()
    }

    fn option(&self, name: &str) -> Option<&UciOption> {
        self.options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(UciCommand::Uci)?;
        let deadline = Deadline::after(HANDSHAKE_TIMEOUT);
        loop {
            match UciOutputKind::parse(&self.next_line(deadline)?) {
                UciOutputKind::UciOk => break,
                UciOutputKind::Id(rest) => {
                    if let Some(name) = rest.strip_prefix("name ") {
                        self.name = Some(name.trim().to_string());
                    }
                }
                UciOutputKind::Option(rest) => {
                    if let Some(option) = UciOption::parse(&rest) {
                        self.options.push(option);
                    }
                }
                _ => {}
            }
        }
        self.sync()
    }

    /// Round-trip `isready` so subsequent output belongs to the next command
    fn sync(&mut self) -> Result<(), EngineError> {
        self.send(UciCommand::IsReady)?;
        let deadline = Deadline::after(HANDSHAKE_TIMEOUT);
        while UciOutputKind::parse(&self.next_line(deadline)?) != UciOutputKind::ReadyOk {}
        Ok(())
    }

    fn send(&mut self, cmd: UciCommand) -> Result<(), EngineError> {
        let line = cmd.to_uci_string();
        debug!(cmd = %line, "engine <");
        writeln!(self.stdin, "{line}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn next_line(&mut self, deadline: Deadline) -> Result<String, EngineError> {
        match self.events.recv_timeout(deadline.remaining()) {
            Ok(EngineEvent::Output(line)) => {
                debug!(line = line.trim(), "engine >");
                Ok(line)
            }
            Ok(EngineEvent::Error(e)) => {
                self.alive = false;
                Err(EngineError::Protocol(e))
            }
            Ok(EngineEvent::Exited) | Err(RecvTimeoutError::Disconnected) => {
                self.alive = false;
                Err(EngineError::Exited)
            }
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(deadline.budget)),
        }
    }
}

impl AnalysisEngine for UciEngine {
    fn configure(&mut self, options: StrengthOptions) -> Result<(), EngineError> {
        if !self.has_option(ELO_OPTION) {
            return Err(EngineError::UnsupportedOption(ELO_OPTION));
        }
        if self.has_option(LIMIT_STRENGTH_OPTION) {
            self.send(UciCommand::SetOption {
                name: LIMIT_STRENGTH_OPTION.to_string(),
                value: options.limit_strength.to_string(),
            })?;
        }
        self.send(UciCommand::SetOption {
            name: ELO_OPTION.to_string(),
            value: options.elo.to_string(),
        })?;
        self.sync()
    }

    fn analyze(
        &mut self,
        position: &PositionSnapshot,
        limit: SearchLimit,
    ) -> Result<EngineAnalysis, EngineError> {
        if !self.alive {
            return Err(EngineError::Exited);
        }
        self.send(UciCommand::Position {
            fen: position.root_fen.clone(),
            moves: position.uci_moves(),
        })?;
        self.send(UciCommand::Go(limit))?;

        let budget = limit
            .time
            .map(|t| t + SEARCH_GRACE)
            .unwrap_or(DEPTH_ONLY_BUDGET);
        let mut deadline = Deadline::after(budget);
        let mut stopped = false;
        // a bound only stands in until an exact score arrives
        let mut exact: Option<UciInfo> = None;
        let mut bounded: Option<UciInfo> = None;

        loop {
            let line = match self.next_line(deadline) {
                Ok(line) => line,
                Err(EngineError::Timeout(_)) if !stopped => {
                    warn!(?budget, "Engine overran its search budget, sending stop");
                    self.send(UciCommand::Stop)?;
                    stopped = true;
                    deadline = Deadline::after(STOP_GRACE);
                    continue;
                }
                Err(EngineError::Timeout(waited)) => {
                    // the request/response stream is out of step now
                    self.alive = false;
                    return Err(EngineError::Timeout(waited));
                }
                Err(e) => return Err(e),
            };

            match UciOutputKind::parse(&line) {
                UciOutputKind::Info(rest) => {
                    let info = UciInfo::parse(&rest);
                    if !info.is_main_line_score() {
                        continue;
                    }
                    if info.is_exact() {
                        exact = Some(info);
                    } else {
                        bounded = Some(info);
                    }
                }
                UciOutputKind::BestMove(rest) => {
                    let Some(UciInfo {
                        score: Some(score),
                        pv,
                        ..
                    }) = exact.or(bounded)
                    else {
                        return Err(EngineError::Protocol(
                            "search finished without a score".into(),
                        ));
                    };
                    let best_move = pv.into_iter().next().or_else(|| parse_bestmove(&rest));
                    return Ok(EngineAnalysis { best_move, score });
                }
                _ => {}
            }
        }
    }

    fn supported_rating_range(&self) -> Option<(u32, u32)> {
        let option = self.option(ELO_OPTION)?;
        let min = u32::try_from(option.min?).ok()?;
        let max = u32::try_from(option.max?).ok()?;
        Some((min, max))
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.alive {
            let _ = self.send(UciCommand::Quit);
        }
        self.alive = false;

        let deadline = Deadline::after(QUIT_GRACE);
        while deadline.remaining() > Duration::ZERO {
            if self.process.try_wait()?.is_some() {
                info!("Engine exited");
                return Ok(());
            }
            thread::sleep(Duration::from_millis(10));
        }
        warn!("Engine ignored quit, killing it");
        self.process.kill()?;
        self.process.wait()?;
        Ok(())
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // best-effort; a no-op if shutdown already reaped the child
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::PositionState;
    use shakmaty::Square;

    fn fake_engine() -> UciEngine {
        let mut cmd = Command::new("sh");
        cmd.arg(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/fake_engine.sh"
        ));
        UciEngine::spawn(cmd).unwrap()
    }

    #[test]
    fn test_handshake_collects_options() {
        let mut engine = fake_engine();
        assert_eq!(engine.name(), Some("FakeFish 1.0"));
        assert!(engine.has_option("uci_elo"));
        assert_eq!(engine.supported_rating_range(), Some((1320, 2850)));
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_analyze_returns_first_pv_move_and_score() {
        let mut engine = fake_engine();
        let state = PositionState::new();
        let analysis = engine
            .analyze(&state.snapshot(), SearchLimit::depth(5))
            .unwrap();
        assert_eq!(analysis.best_move.as_deref(), Some("e2e4"));
        assert_eq!(analysis.score, Score::Centipawns(31));
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_analyze_reports_mate_scores() {
        let mut engine = fake_engine();
        let mut state = PositionState::new();
        state.attempt_move(Square::F2, Square::F3, None).unwrap();
        let analysis = engine
            .analyze(&state.snapshot(), SearchLimit::time(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(analysis.score, Score::Mate(2));
        assert_eq!(analysis.best_move.as_deref(), Some("e7e5"));
    }

    #[test]
    fn test_analyze_prefers_exact_score_over_later_bound() {
        let mut engine = fake_engine();
        let mut state = PositionState::new();
        state.attempt_move(Square::D2, Square::D4, None).unwrap();
        let analysis = engine
            .analyze(&state.snapshot(), SearchLimit::depth(7))
            .unwrap();
        assert_eq!(analysis.score, Score::Centipawns(40));
        assert_eq!(analysis.best_move.as_deref(), Some("d7d5"));
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_analyze_falls_back_to_bound_score() {
        let mut engine = fake_engine();
        let mut state = PositionState::new();
        state.attempt_move(Square::C2, Square::C4, None).unwrap();
        let analysis = engine
            .analyze(&state.snapshot(), SearchLimit::depth(4))
            .unwrap();
        assert_eq!(analysis.score, Score::Centipawns(-25));
        assert_eq!(analysis.best_move.as_deref(), Some("e7e5"));
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_configure_sets_strength() {
        let mut engine = fake_engine();
        engine
            .configure(StrengthOptions {
                limit_strength: true,
                elo: 1500,
            })
            .unwrap();
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let err = UciEngine::start(Path::new("/nonexistent/stockfish")).err();
        assert!(matches!(err, Some(EngineError::Unavailable(_))));
    }

    #[test]
    fn test_engine_that_exits_fails_handshake() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 0"]);
        assert!(UciEngine::spawn(cmd).is_err());
    }
}
