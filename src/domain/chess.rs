//! Pure chess domain types and utilities.
//! No threading or process concerns - this is the domain layer.

use shakmaty::{Color as SColor, File, Move, Rank, Role, Square};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceColor {
    White,
    Black,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: PieceColor,
}

impl Piece {
    /// Board glyph: uppercase for white, lowercase for black
    pub fn symbol(&self) -> char {
        let c = match self.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Rook => 'r',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match self.color {
            PieceColor::White => c.to_ascii_uppercase(),
            PieceColor::Black => c,
        }
    }
}

/// Promotion candidates in tie-breaking priority order
pub const PROMOTION_ROLES: [Role; 4] = [Role::Queen, Role::Rook, Role::Bishop, Role::Knight];

/// Convert shakmaty piece to our domain Piece
pub fn shakmaty_to_piece(piece: shakmaty::Piece) -> Piece {
    let kind = match piece.role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    };
    Piece {
        kind,
        color: to_piece_color(piece.color),
    }
}

pub fn to_piece_color(color: SColor) -> PieceColor {
    match color {
        SColor::White => PieceColor::White,
        SColor::Black => PieceColor::Black,
    }
}

/// Parse a square name like "e4" (case-insensitive)
pub fn parse_square(name: &str) -> Option<Square> {
    name.trim().to_ascii_lowercase().parse().ok()
}

/// Parse a promotion piece letter (q, r, b, n)
pub fn parse_promotion_role(name: &str) -> Option<Role> {
    match name.trim().to_ascii_lowercase().as_str() {
        "q" | "queen" => Some(Role::Queen),
        "r" | "rook" => Some(Role::Rook),
        "b" | "bishop" => Some(Role::Bishop),
        "n" | "knight" => Some(Role::Knight),
        _ => None,
    }
}

/// Whether a square lies on the first or eighth rank
pub fn is_last_rank(square: Square) -> bool {
    square.rank() == Rank::First || square.rank() == Rank::Eighth
}

/// Source and destination squares as the user enters them.
///
/// Castling is entered king-to-destination (e1g1), not king-takes-rook.
pub fn move_endpoints(m: &Move) -> Option<(Square, Square)> {
    match m {
        Move::Normal { from, to, .. } => Some((*from, *to)),
        Move::EnPassant { from, to } => Some((*from, *to)),
        Move::Castle { king, rook } => {
            let king_dest = if rook.file() == File::H {
                Square::from_coords(File::G, rook.rank())
            } else {
                Square::from_coords(File::C, rook.rank())
            };
            Some((*king, king_dest))
        }
        Move::Put { .. } => None,
    }
}

/// Standard (non-960) UCI notation, e.g. "e2e4", "e1g1", "e7e8q"
pub fn move_to_uci(m: &Move) -> String {
    let Some((from, to)) = move_endpoints(m) else {
        return "0000".to_string();
    };
    match m.promotion() {
        Some(role) => format!("{from}{to}{}", role.char()),
        None => format!("{from}{to}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{Chess, Position};

    #[test]
    fn test_parse_square() {
        assert_eq!(parse_square("e2"), Some(Square::E2));
        assert_eq!(parse_square(" H8 "), Some(Square::H8));
        assert_eq!(parse_square("i9"), None);
    }

    #[test]
    fn test_parse_promotion_role() {
        assert_eq!(parse_promotion_role("n"), Some(Role::Knight));
        assert_eq!(parse_promotion_role("Queen"), Some(Role::Queen));
        assert_eq!(parse_promotion_role("k"), None);
    }

    #[test]
    fn test_piece_symbol() {
        let wq = Piece {
            kind: PieceKind::Queen,
            color: PieceColor::White,
        };
        let bn = Piece {
            kind: PieceKind::Knight,
            color: PieceColor::Black,
        };
        assert_eq!(wq.symbol(), 'Q');
        assert_eq!(bn.symbol(), 'n');
    }

    #[test]
    fn test_move_to_uci_normal_and_promotion() {
        let push = Move::Normal {
            role: Role::Pawn,
            from: Square::E2,
            capture: None,
            to: Square::E4,
            promotion: None,
        };
        assert_eq!(move_to_uci(&push), "e2e4");

        let promo = Move::Normal {
            role: Role::Pawn,
            from: Square::E7,
            capture: None,
            to: Square::E8,
            promotion: Some(Role::Knight),
        };
        assert_eq!(move_to_uci(&promo), "e7e8n");
    }

    #[test]
    fn test_castle_uses_king_destination() {
        let short = Move::Castle {
            king: Square::E1,
            rook: Square::H1,
        };
        let long = Move::Castle {
            king: Square::E8,
            rook: Square::A8,
        };
        assert_eq!(move_to_uci(&short), "e1g1");
        assert_eq!(move_to_uci(&long), "e8c8");
    }

    #[test]
    fn test_every_start_move_has_endpoints() {
        let pos = Chess::default();
        for m in &pos.legal_moves() {
            assert!(move_endpoints(m).is_some());
        }
    }
}
