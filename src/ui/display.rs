//! Display generation for the text overlay.
//!
//! This module transforms core state into display-ready view models and
//! plain-text frames. It lives in the UI layer and depends on domain +
//! models, not vice versa.

use std::fmt::Write as _;

use shakmaty::san::San;
use shakmaty::{Color, Position, Role};

use crate::domain::chess::{move_endpoints, move_to_uci};
use crate::domain::{PositionState, Score};
use crate::models::{AnalysisResult, AnalysisSource, GameModel, InputState};
use crate::ui::board_layout::BoardLayout;
use crate::ui::view_models::{EvalDisplay, MoveListEntry};

/// Move list with SAN, numbered from the position the game started in
pub fn move_list_display(board: &PositionState) -> Vec<MoveListEntry> {
    board
        .plies()
        .map(|(before, m)| {
            let san = San::from_move(before, m.clone()).to_string();
            let after = before.clone().play(m.clone());
            let (is_check, is_checkmate) = match &after {
                Ok(pos) => (pos.is_check(), pos.is_checkmate()),
                Err(_) => (false, false),
            };
            MoveListEntry {
                move_num: before.fullmoves().get(),
                is_black: before.turn() == Color::Black,
                san,
                is_check,
                is_checkmate,
            }
        })
        .collect()
}

/// Evaluation as seen from White, ready for the bar and the label.
///
/// Scores arrive relative to the side to move, so they are flipped when Black
/// is to move.
pub fn eval_display(result: &AnalysisResult, side_to_move: Color) -> EvalDisplay {
    let white_score = match side_to_move {
        Color::White => result.score,
        Color::Black => result.score.flip(),
    };
    let (label, white_fraction) = match (result.source, white_score) {
        (AnalysisSource::Book, _) => ("BOOK".to_string(), 0.5),
        (AnalysisSource::None, _) => ("...".to_string(), 0.5),
        (AnalysisSource::Engine, Score::Mate(n)) => {
            (format!("MATE {n}"), if n > 0 { 1.0 } else { 0.0 })
        }
        (AnalysisSource::Engine, Score::Centipawns(cp)) => {
            let pawns = cp as f32 / 100.0;
            (format!("{pawns:+.2}"), 1.0 / (1.0 + (-0.5 * pawns).exp()))
        }
    };
    EvalDisplay {
        label,
        white_fraction,
        best_move: result.best_move.as_ref().map(move_to_uci),
        from_book: result.is_book(),
    }
}

/// Vertical text eval bar, White's share filled with `#`
pub fn render_eval_bar(eval: &EvalDisplay, height: usize, flipped: bool) -> Vec<char> {
    let filled = (eval.white_fraction * height as f32).round() as usize;
    let mut cells: Vec<char> = (0..height)
        .map(|i| if i < filled { '#' } else { '.' })
        .collect();
    // White fills from the bottom unless the board is flipped
    if !flipped {
        cells.reverse();
    }
    cells
}

/// Board as text. The selected square is bracketed, best-move squares are
/// wrapped in parentheses.
pub fn render_board(
    board: &PositionState,
    layout: &BoardLayout,
    selected: Option<shakmaty::Square>,
    eval: &EvalDisplay,
    best: Option<&AnalysisResult>,
) -> String {
    let highlight = best
        .and_then(|r| r.best_move.as_ref())
        .and_then(move_endpoints);
    let bar = render_eval_bar(eval, 8, layout.flipped);

    let mut out = String::new();
    for row in 0..8 {
        let Some(rank_square) = layout.cell_to_square(row, 0) else {
            continue;
        };
        let _ = write!(out, "{} {} ", bar[row], rank_square.rank().char());
        for col in 0..8 {
            let Some(square) = layout.cell_to_square(row, col) else {
                continue;
            };
            let glyph = board.piece_at(square).map_or('.', |p| p.symbol());
            let is_best = highlight.is_some_and(|(from, to)| square == from || square == to);
            if selected == Some(square) {
                let _ = write!(out, "[{glyph}]");
            } else if is_best {
                let _ = write!(out, "({glyph})");
            } else {
                let _ = write!(out, " {glyph} ");
            }
        }
        out.push('\n');
    }
    out.push_str("    ");
    for col in 0..8 {
        if let Some(square) = layout.cell_to_square(7, col) {
            let _ = write!(out, " {} ", square.file().char());
        }
    }
    out.push('\n');
    out
}

/// Promotion choices with the recommended one marked
pub fn render_promotion_menu(side: Color, recommended: Option<Role>) -> String {
    let mut out = String::from("RECOMMENDED:");
    for role in crate::domain::PROMOTION_ROLES {
        let symbol = role.of(side).char();
        if recommended == Some(role) {
            let _ = write!(out, " [{symbol}]");
        } else {
            let _ = write!(out, " {symbol}");
        }
    }
    if recommended.is_none() {
        out.push_str("  (thinking...)");
    }
    out
}

/// Full overlay frame: title, board, info lines and any promotion menu
pub fn render_frame(game: &GameModel, layout: &BoardLayout) -> String {
    let coordinator = game.coordinator();
    let board = coordinator.board();
    let analysis = game.last_analysis();
    let eval = eval_display(analysis, board.position().turn());

    let mut out = String::from("== chess overlay ==\n");
    out.push_str(&render_board(
        board,
        layout,
        game.selected_square(),
        &eval,
        Some(analysis),
    ));

    let strength = coordinator.strength();
    let limit = coordinator.limits().search;
    let _ = writeln!(
        out,
        "ELO: {} (max {}) | Depth: {} | Time: {}",
        strength.rating(),
        strength.ceiling(),
        limit.depth.map_or("-".to_string(), |d| d.to_string()),
        limit
            .time
            .map_or("-".to_string(), |t| format!("{}ms", t.as_millis())),
    );
    let _ = writeln!(out, "Eval: {}", eval.label);
    let _ = writeln!(
        out,
        "Best: {}{}",
        eval.best_move.as_deref().unwrap_or("..."),
        if eval.from_book { " (book)" } else { "" }
    );

    let moves = move_list_display(board);
    if !moves.is_empty() {
        out.push_str(&format_move_list(&moves));
        out.push('\n');
    }

    if let InputState::AwaitingPromotionChoice { .. } = game.input_state() {
        out.push_str(&render_promotion_menu(
            board.position().turn(),
            game.promotion_hint(),
        ));
        out.push('\n');
    }
    out
}

/// "1. e4 e5 2. Nf3" style move text
pub fn format_move_list(moves: &[MoveListEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in moves.iter().enumerate() {
        if !out.is_empty() {
            out.push(' ');
        }
        if !entry.is_black {
            let _ = write!(out, "{}. ", entry.move_num);
        } else if i == 0 {
            let _ = write!(out, "{}... ", entry.move_num);
        }
        out.push_str(&entry.san);
        if entry.is_checkmate {
            out.push('#');
        } else if entry.is_check {
            out.push('+');
        }
    }
    out
}
