//! UCI (Universal Chess Interface) protocol types and utilities.
//!
//! This module handles the text side of talking to a chess engine: rendering
//! commands and classifying/parsing output lines. It does not touch the
//! process itself (that's done in the models layer).

use std::time::Duration;

/// Search bound for one analysis call. Either bound may be absent; when both
/// are set the engine stops at whichever is reached first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchLimit {
    pub depth: Option<u32>,
    pub time: Option<Duration>,
}

impl SearchLimit {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            time: None,
        }
    }

    pub fn time(time: Duration) -> Self {
        Self {
            depth: None,
            time: Some(time),
        }
    }

    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }
}

/// UCI commands that can be sent to an engine
#[derive(Debug, Clone)]
pub enum UciCommand {
    /// Initialize UCI mode
    Uci,
    /// Check if engine is ready
    IsReady,
    /// Set a new game
    UciNewGame,
    /// Set an engine option
    SetOption { name: String, value: String },
    /// Set position (startpos or FEN, with optional moves)
    Position { fen: Option<String>, moves: Vec<String> },
    /// Start a bounded search
    Go(SearchLimit),
    /// Stop analysis
    Stop,
    /// Quit the engine
    Quit,
}

impl UciCommand {
    /// Convert command to UCI protocol string
    pub fn to_uci_string(&self) -> String {
        match self {
            UciCommand::Uci => "uci".to_string(),
            UciCommand::IsReady => "isready".to_string(),
            UciCommand::UciNewGame => "ucinewgame".to_string(),
            UciCommand::SetOption { name, value } => {
                format!("setoption name {name} value {value}")
            }
            UciCommand::Position { fen, moves } => {
                let mut cmd = match fen {
                    Some(f) => format!("position fen {f}"),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    cmd.push_str(" moves ");
                    cmd.push_str(&moves.join(" "));
                }
                cmd
            }
            UciCommand::Go(limit) => {
                let mut cmd = String::from("go");
                if let Some(depth) = limit.depth {
                    cmd.push_str(&format!(" depth {depth}"));
                }
                if let Some(time) = limit.time {
                    cmd.push_str(&format!(" movetime {}", time.as_millis().max(1)));
                }
                if limit.depth.is_none() && limit.time.is_none() {
                    cmd.push_str(" infinite");
                }
                cmd
            }
            UciCommand::Stop => "stop".to_string(),
            UciCommand::Quit => "quit".to_string(),
        }
    }
}

/// Categorized engine output line
#[derive(Debug, Clone, PartialEq)]
pub enum UciOutputKind {
    /// "uciok" - engine is ready for UCI
    UciOk,
    /// "readyok" - engine is ready
    ReadyOk,
    /// "info ..." - analysis information
    Info(String),
    /// "bestmove ..." - best move found
    BestMove(String),
    /// Engine identification
    Id(String),
    /// Option definition
    Option(String),
    /// Unknown/other output
    Other(String),
}

impl UciOutputKind {
    /// Parse a raw UCI output line into a categorized type
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if line == "uciok" {
            UciOutputKind::UciOk
        } else if line == "readyok" {
            UciOutputKind::ReadyOk
        } else if let Some(rest) = line.strip_prefix("info ") {
            UciOutputKind::Info(rest.to_string())
        } else if let Some(rest) = line.strip_prefix("bestmove") {
            UciOutputKind::BestMove(rest.trim().to_string())
        } else if let Some(rest) = line.strip_prefix("id ") {
            UciOutputKind::Id(rest.to_string())
        } else if let Some(rest) = line.strip_prefix("option ") {
            UciOutputKind::Option(rest.to_string())
        } else {
            UciOutputKind::Other(line.to_string())
        }
    }
}

/// Engine evaluation, relative to the side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawn score
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated)
    Mate(i32),
}

impl Score {
    /// Format score for display (e.g., "+0.35" or "M3" or "-M2")
    pub fn display(&self) -> String {
        match self {
            Score::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Score::Mate(moves) if *moves >= 0 => format!("M{moves}"),
            Score::Mate(moves) => format!("-M{}", moves.abs()),
        }
    }

    /// Get a numeric value for comparison (centipawns, or large value for mate)
    pub fn as_centipawns(&self) -> i32 {
        match self {
            Score::Centipawns(cp) => *cp,
            // Mate in fewer moves is better; being mated sooner is worse
            Score::Mate(moves) if *moves > 0 => 10000 - *moves,
            Score::Mate(moves) => -10000 - *moves,
        }
    }

    /// The same evaluation seen from the other side
    pub fn flip(self) -> Self {
        match self {
            Score::Centipawns(cp) => Score::Centipawns(-cp),
            Score::Mate(moves) => Score::Mate(-moves),
        }
    }
}

impl Default for Score {
    fn default() -> Self {
        Score::Centipawns(0)
    }
}

/// Keywords that terminate a `pv` run inside an info line
const INFO_KEYWORDS: &[&str] = &[
    "depth",
    "seldepth",
    "multipv",
    "score",
    "nodes",
    "nps",
    "time",
    "hashfull",
    "currmove",
    "currmovenumber",
    "string",
    "refutation",
    "currline",
    "tbhits",
    "wdl",
];

/// Parsed UCI info line containing analysis data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UciInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// Multi-PV line number (1-indexed)
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    /// Score is only a bound (lowerbound/upperbound), not exact
    pub bound: bool,
    pub nodes: Option<u64>,
    pub time: Option<u64>,
    /// Principal variation as UCI moves
    pub pv: Vec<String>,
}

impl UciInfo {
    /// Parse a UCI info string (the part after "info ")
    pub fn parse(info_str: &str) -> Self {
        let mut info = UciInfo::default();
        let mut tokens = info_str.split_whitespace().peekable();

        while let Some(token) = tokens.next() {
            match token {
                "depth" => info.depth = tokens.next().and_then(|t| t.parse().ok()),
                "seldepth" => info.seldepth = tokens.next().and_then(|t| t.parse().ok()),
                "multipv" => info.multipv = tokens.next().and_then(|t| t.parse().ok()),
                "nodes" => info.nodes = tokens.next().and_then(|t| t.parse().ok()),
                "time" => info.time = tokens.next().and_then(|t| t.parse().ok()),
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|t| t.parse::<i32>().ok());
                    info.score = match (kind, value) {
                        (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                        (Some("mate"), Some(m)) => Some(Score::Mate(m)),
                        _ => info.score,
                    };
                    if let Some(&("lowerbound" | "upperbound")) = tokens.peek() {
                        info.bound = true;
                        tokens.next();
                    }
                }
                "pv" => {
                    while let Some(&next) = tokens.peek() {
                        if INFO_KEYWORDS.contains(&next) {
                            break;
                        }
                        info.pv.push(next.to_string());
                        tokens.next();
                    }
                }
                // free text runs to end of line
                "string" => break,
                _ => {}
            }
        }

        info
    }

    /// Whether this line carries an evaluation for the main line
    pub fn is_main_line_score(&self) -> bool {
        self.score.is_some() && self.multipv.unwrap_or(1) == 1
    }

    /// Whether the score is an exact evaluation rather than a search bound
    pub fn is_exact(&self) -> bool {
        self.score.is_some() && !self.bound
    }
}

/// Parsed `option` declaration (the part after "option ")
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UciOption {
    pub name: String,
    pub kind: String,
    pub default: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl UciOption {
    pub fn parse(option_str: &str) -> Option<Self> {
        let rest = option_str.trim().strip_prefix("name ")?;
        let (name, rest) = rest.split_once(" type ")?;
        let mut tokens = rest.split_whitespace();
        let mut option = UciOption {
            name: name.trim().to_string(),
            kind: tokens.next()?.to_string(),
            ..Default::default()
        };
        while let Some(token) = tokens.next() {
            match token {
                "default" => option.default = tokens.next().map(str::to_string),
                "min" => option.min = tokens.next().and_then(|t| t.parse().ok()),
                "max" => option.max = tokens.next().and_then(|t| t.parse().ok()),
                _ => {}
            }
        }
        Some(option)
    }
}

/// Extract the move from a `bestmove` payload; "(none)" and "0000" mean no move
pub fn parse_bestmove(payload: &str) -> Option<String> {
    let mv = payload.split_whitespace().next()?;
    match mv {
        "(none)" | "0000" => None,
        _ => Some(mv.to_string()),
    }
}
