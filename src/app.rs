//! Application setup and the interactive loop.
//!
//! A line-driven stand-in for the overlay window: stdin is read on its own
//! thread, and the main thread polls both that channel and the core's
//! delivery channel, redrawing the text frame whenever something changed.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use shakmaty::{Role, Square};
use tracing::{info, warn};

use chess_overlay::config::{self, OverlayConfig};
use chess_overlay::domain::chess::{parse_promotion_role, parse_square};
use chess_overlay::domain::SearchLimit;
use chess_overlay::models::game::RATING_STEP;
use chess_overlay::models::{AnalysisCoordinator, ClickOutcome, GameModel, InputState};
use chess_overlay::ui::{BoardLayout, render_frame};

/// How often the main thread checks for core deliveries
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Pixels added or removed per resize step
const SIZE_STEP: f32 = 5.0;

const HELP: &str = "commands: <square> | click X Y | q r b n | cancel | undo | reset | flip | ] [ | + - | depth N | time MS | engine PATH | book PATH | save | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Click(Square),
    ClickAt(f32, f32),
    Promote(Role),
    CancelPromotion,
    Undo,
    Reset,
    Flip,
    RatingUp,
    RatingDown,
    Grow,
    Shrink,
    /// Search depth; 0 removes the depth bound
    Depth(u32),
    /// Move time in milliseconds; 0 removes the time bound
    Time(u64),
    /// Switch to the engine executable at this path and remember it
    Engine(PathBuf),
    /// Switch to the opening book at this path and remember it
    Book(PathBuf),
    Save,
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let head = words.next()?.to_ascii_lowercase();
        if let Some(cmd) = Self::parse_path_command(&head, line) {
            return cmd;
        }
        let cmd = match head.as_str() {
            "quit" | "exit" => Self::Quit,
            "undo" | "u" => Self::Undo,
            "reset" => Self::Reset,
            "flip" | "f" => Self::Flip,
            "cancel" | "esc" => Self::CancelPromotion,
            "]" => Self::RatingUp,
            "[" => Self::RatingDown,
            "+" | "=" => Self::Grow,
            "-" => Self::Shrink,
            "save" => Self::Save,
            "help" | "?" => Self::Help,
            "depth" => Self::Depth(words.next()?.parse().ok()?),
            "time" => Self::Time(words.next()?.parse().ok()?),
            "click" => {
                let x = words.next()?.parse().ok()?;
                let y = words.next()?.parse().ok()?;
                Self::ClickAt(x, y)
            }
            other => {
                if let Some(square) = parse_square(other) {
                    Self::Click(square)
                } else {
                    Self::Promote(parse_promotion_role(other)?)
                }
            }
        };
        // trailing words mean the line was not what it looked like
        words.next().is_none().then_some(cmd)
    }

    /// `engine PATH` / `book PATH`; the path is the rest of the line and may
    /// contain spaces
    fn parse_path_command(head: &str, line: &str) -> Option<Option<Self>> {
        let make: fn(PathBuf) -> Self = match head {
            "engine" => Self::Engine,
            "book" => Self::Book,
            _ => return None,
        };
        let rest = line.trim_start()[head.len()..].trim();
        Some((!rest.is_empty()).then(|| make(PathBuf::from(rest))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    game: GameModel,
    layout: BoardLayout,
    config: OverlayConfig,
    config_path: PathBuf,
    status: Option<String>,
}

impl App {
    pub fn new(config: OverlayConfig, config_path: PathBuf) -> Self {
        let mut coordinator = AnalysisCoordinator::new(config.analysis_limits(), config.elo);

        if let Some(book) = &config.book_path {
            coordinator.open_book(book);
        }
        match &config.engine_path {
            Some(path) => {
                if let Err(e) = coordinator.start_engine(path.clone()) {
                    warn!(error = %e, "Running without an engine");
                }
            }
            None => info!("No engine configured, running without analysis"),
        }

        Self {
            game: GameModel::new(coordinator),
            layout: BoardLayout::new(config.square_size as f32, false),
            config,
            config_path,
            status: None,
        }
    }

    fn handle(&mut self, cmd: ShellCommand) -> Flow {
        self.status = None;
        match cmd {
            ShellCommand::Click(square) => self.click(square),
            ShellCommand::ClickAt(x, y) => match self.layout.pos_to_square(x, y) {
                Some(square) => self.click(square),
                None => self.status = Some("outside the board".into()),
            },
            ShellCommand::Promote(role) => {
                if let InputState::AwaitingPromotionChoice { .. } = self.game.input_state() {
                    if let Err(e) = self.game.choose_promotion(role) {
                        self.status = Some(e.to_string());
                    }
                } else {
                    self.status = Some("no promotion pending".into());
                }
            }
            ShellCommand::CancelPromotion => self.game.cancel_promotion(),
            ShellCommand::Undo => {
                if !self.game.undo() {
                    self.status = Some("nothing to undo".into());
                }
            }
            ShellCommand::Reset => self.game.reset(),
            ShellCommand::Flip => self.layout.flipped = self.game.toggle_flip(),
            ShellCommand::RatingUp => {
                self.game.change_rating(RATING_STEP);
            }
            ShellCommand::RatingDown => {
                self.game.change_rating(-RATING_STEP);
            }
            ShellCommand::Grow => {
                self.layout.resize(SIZE_STEP);
            }
            ShellCommand::Shrink => {
                self.layout.resize(-SIZE_STEP);
            }
            ShellCommand::Depth(depth) => {
                let mut limit = self.game.coordinator().limits().search;
                limit.depth = (depth > 0).then_some(depth);
                self.apply_search_limit(limit);
            }
            ShellCommand::Time(ms) => {
                let mut limit = self.game.coordinator().limits().search;
                limit.time = (ms > 0).then(|| Duration::from_millis(ms));
                self.apply_search_limit(limit);
            }
            ShellCommand::Engine(path) => self.switch_engine(path),
            ShellCommand::Book(path) => self.switch_book(path),
            ShellCommand::Save => self.save_config(),
            ShellCommand::Help => self.status = Some(HELP.into()),
            ShellCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn click(&mut self, square: Square) {
        if let ClickOutcome::Rejected(e) = self.game.click(square) {
            self.status = Some(e.to_string());
        }
    }

    fn apply_search_limit(&mut self, limit: SearchLimit) {
        let coordinator = self.game.coordinator_mut();
        coordinator.set_search_limit(limit);
        coordinator.reanalyze();
    }

    /// Start the engine at `path`; on success the path is saved as the
    /// configured engine
    fn switch_engine(&mut self, path: PathBuf) {
        match self.game.coordinator_mut().start_engine(path.clone()) {
            Ok(()) => {
                self.config.engine_path = Some(path);
                self.save_config();
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    fn switch_book(&mut self, path: PathBuf) {
        let coordinator = self.game.coordinator_mut();
        if !coordinator.open_book(&path) {
            self.status = Some(format!("cannot read opening book {}", path.display()));
            return;
        }
        coordinator.reanalyze();
        self.config.book_path = Some(path);
        self.save_config();
    }

    fn save_config(&mut self) {
        let coordinator = self.game.coordinator();
        let limit = coordinator.limits().search;
        self.config.elo = coordinator.strength().rating();
        self.config.depth = limit.depth.unwrap_or(0);
        self.config.movetime_ms = limit.time.map_or(0, |t| t.as_millis() as u64);
        self.config.square_size = self.layout.square_size() as u32;
        self.status = Some(match config::save(&self.config, &self.config_path) {
            Ok(()) => format!("saved {}", self.config_path.display()),
            Err(e) => e.to_string(),
        });
    }

    fn draw(&self) {
        println!("{}", render_frame(&self.game, &self.layout));
        if let Some(status) = &self.status {
            println!("{status}");
        }
    }

    /// Run until `quit` or end of input, then release the engine
    pub fn run(mut self) -> Result<()> {
        let (line_tx, line_rx) = mpsc::channel::<String>();
        thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .context("failed to spawn stdin reader")?;

        self.draw();
        loop {
            let mut redraw = false;
            match line_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => {
                    match ShellCommand::parse(&line) {
                        Some(cmd) => {
                            if self.handle(cmd) == Flow::Quit {
                                break;
                            }
                        }
                        None => self.status = Some(HELP.into()),
                    }
                    redraw = true;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !self.game.poll().is_empty() {
                redraw = true;
            }
            if redraw {
                self.draw();
            }
        }

        info!("Shutting down");
        self.game.coordinator_mut().shutdown();
        Ok(())
    }
}

/// Load settings and run the shell
pub fn run(config: OverlayConfig, config_path: &Path) -> Result<()> {
    App::new(config, config_path.to_path_buf()).run()
}
