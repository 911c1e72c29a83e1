//! Pure chess and protocol types. Nothing here spawns threads or processes.

pub mod book;
pub mod chess;
pub mod position;
pub mod rules;
pub mod uci;

pub use book::{OpeningBook, PolyglotBook};
pub use chess::{Piece, PieceColor, PieceKind, PROMOTION_ROLES, parse_square, shakmaty_to_piece};
pub use position::{MoveOutcome, PositionSnapshot, PositionState};
pub use uci::{Score, SearchLimit, UciCommand, UciInfo, UciOutputKind};
