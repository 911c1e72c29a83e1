//! Rules oracle: legality and game-over detection, delegated to shakmaty.

use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, EnPassantMode, Move, Position, Role, Square};

use super::chess::move_endpoints;

/// Halfmove clock at which the game ends without a claim (75-move rule)
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

/// Repetition count at which the game ends without a claim
const FIVEFOLD: usize = 5;

/// Find the legal move matching user-entered endpoints and promotion piece
pub fn find_move(pos: &Chess, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
    pos.legal_moves().into_iter().find(|m| {
        move_endpoints(m) == Some((from, to)) && m.promotion() == promotion
    })
}

pub fn is_legal(pos: &Chess, m: &Move) -> bool {
    pos.legal_moves().contains(m)
}

/// Polyglot-compatible Zobrist key of a position
pub fn position_key(pos: &Chess) -> u64 {
    pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

/// True on checkmate, stalemate, insufficient material, the 75-move rule, or
/// fivefold repetition. `earlier` are the positions preceding `pos` in the game.
pub fn is_terminal<'a>(pos: &Chess, earlier: impl IntoIterator<Item = &'a Chess>) -> bool {
    if pos.is_checkmate() || pos.is_stalemate() || pos.is_insufficient_material() {
        return true;
    }
    if pos.halfmoves() >= SEVENTY_FIVE_MOVE_PLIES {
        return true;
    }
    let key = position_key(pos);
    let repeats = earlier
        .into_iter()
        .filter(|p| position_key(p) == key)
        .count();
    repeats + 1 >= FIVEFOLD
}
