//! Opening book lookup over Polyglot `.bin` files.
//!
//! A book is a flat array of 16-byte big-endian records sorted by position
//! key: `key: u64, move: u16, weight: u16, learn: u32`.

use std::path::Path;

use shakmaty::{Chess, Move, Position, Role, Square};
use tracing::info;

use super::rules::position_key;
use crate::error::BookError;

const ENTRY_SIZE: usize = 16;

/// Anything that can suggest a book move for a position
pub trait OpeningBook: Send + Sync {
    /// Recommended move, or `None` when the position is not in the book
    fn find(&self, pos: &Chess) -> Option<Move>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub key: u64,
    pub raw_move: u16,
    pub weight: u16,
    pub learn: u32,
}

impl BookEntry {
    fn from_bytes(chunk: &[u8]) -> Self {
        let mut key = [0u8; 8];
        key.copy_from_slice(&chunk[0..8]);
        Self {
            key: u64::from_be_bytes(key),
            raw_move: u16::from_be_bytes([chunk[8], chunk[9]]),
            weight: u16::from_be_bytes([chunk[10], chunk[11]]),
            learn: u32::from_be_bytes([chunk[12], chunk[13], chunk[14], chunk[15]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        out[0..8].copy_from_slice(&self.key.to_be_bytes());
        out[8..10].copy_from_slice(&self.raw_move.to_be_bytes());
        out[10..12].copy_from_slice(&self.weight.to_be_bytes());
        out[12..16].copy_from_slice(&self.learn.to_be_bytes());
        out
    }

    /// Decoded (from, to, promotion). Castling is king-takes-rook.
    fn decode(&self) -> (Square, Square, Option<Role>) {
        let m = u32::from(self.raw_move);
        let to = Square::new(m & 0x3f);
        let from = Square::new((m >> 6) & 0x3f);
        let promotion = match (m >> 12) & 0x7 {
            1 => Some(Role::Knight),
            2 => Some(Role::Bishop),
            3 => Some(Role::Rook),
            4 => Some(Role::Queen),
            _ => None,
        };
        (from, to, promotion)
    }

    /// The legal move this entry denotes in `pos`, if any
    fn to_move(&self, pos: &Chess) -> Option<Move> {
        let (from, to, promotion) = self.decode();
        pos.legal_moves().into_iter().find(|m| {
            let endpoints = match m {
                Move::Castle { king, rook } => (*king, *rook),
                _ => match m.from() {
                    Some(f) => (f, m.to()),
                    None => return false,
                },
            };
            endpoints == (from, to) && m.promotion() == promotion
        })
    }
}

/// In-memory Polyglot book
#[derive(Debug, Clone, Default)]
pub struct PolyglotBook {
    entries: Vec<BookEntry>,
}

impl PolyglotBook {
    /// Load the book from a binary file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BookError> {
        let bytes = std::fs::read(path.as_ref())?;
        let book = Self::from_bytes(&bytes)?;
        info!(
            path = %path.as_ref().display(),
            entries = book.len(),
            "Loaded opening book"
        );
        Ok(book)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BookError> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(BookError::Truncated(bytes.len()));
        }
        let mut entries: Vec<BookEntry> = bytes
            .chunks_exact(ENTRY_SIZE)
            .map(BookEntry::from_bytes)
            .collect();
        // stable, so equal keys keep file order
        entries.sort_by_key(|e| e.key);
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries for a position key, in file order
    pub fn entries_for(&self, key: u64) -> &[BookEntry] {
        let start = self.entries.partition_point(|e| e.key < key);
        let end = self.entries.partition_point(|e| e.key <= key);
        &self.entries[start..end]
    }
}

impl OpeningBook for PolyglotBook {
    fn find(&self, pos: &Chess) -> Option<Move> {
        let mut best: Option<(u16, Move)> = None;
        for entry in self.entries_for(position_key(pos)) {
            // zero-weight entries are disabled
            if entry.weight == 0 {
                continue;
            }
            if best.as_ref().is_some_and(|(w, _)| *w >= entry.weight) {
                continue;
            }
            if let Some(m) = entry.to_move(pos) {
                best = Some((entry.weight, m));
            }
        }
        best.map(|(_, m)| m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::CastlingMode;
    use shakmaty::fen::Fen;
    use std::io::Write;

    fn raw(from: Square, to: Square, promo: u16) -> u16 {
        (promo << 12) | ((from as u16) << 6) | (to as u16)
    }

    fn entry(pos: &Chess, from: Square, to: Square, weight: u16) -> BookEntry {
        BookEntry {
            key: position_key(pos),
            raw_move: raw(from, to, 0),
            weight,
            learn: 0,
        }
    }

    fn book_of(entries: &[BookEntry]) -> PolyglotBook {
        let bytes: Vec<u8> = entries.iter().flat_map(|e| e.to_bytes()).collect();
        PolyglotBook::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_highest_weight_wins() {
        let pos = Chess::default();
        let book = book_of(&[
            entry(&pos, Square::E2, Square::E4, 10),
            entry(&pos, Square::D2, Square::D4, 30),
            entry(&pos, Square::G1, Square::F3, 30),
        ]);
        let m = book.find(&pos).unwrap();
        assert_eq!(m.from(), Some(Square::D2));
        assert_eq!(m.to(), Square::D4);
    }

    #[test]
    fn test_unknown_position_not_found() {
        let pos = Chess::default();
        let book = book_of(&[BookEntry {
            key: 42,
            raw_move: raw(Square::E2, Square::E4, 0),
            weight: 1,
            learn: 0,
        }]);
        assert!(book.find(&pos).is_none());
    }

    #[test]
    fn test_illegal_and_zero_weight_entries_skipped() {
        let pos = Chess::default();
        let book = book_of(&[
            entry(&pos, Square::E2, Square::E5, 100),
            entry(&pos, Square::D2, Square::D4, 0),
        ]);
        assert!(book.find(&pos).is_none());
    }

    #[test]
    fn test_castling_is_king_takes_rook() {
        let pos: Chess = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1"
            .parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        let book = book_of(&[entry(&pos, Square::E1, Square::H1, 5)]);
        assert_eq!(
            book.find(&pos),
            Some(Move::Castle {
                king: Square::E1,
                rook: Square::H1
            })
        );
    }

    #[test]
    fn test_truncated_file_rejected() {
        assert!(matches!(
            PolyglotBook::from_bytes(&[0u8; 17]),
            Err(BookError::Truncated(17))
        ));
    }

    #[test]
    fn test_open_from_disk() {
        let pos = Chess::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&entry(&pos, Square::E2, Square::E4, 1).to_bytes())
            .unwrap();
        let book = PolyglotBook::open(file.path()).unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.find(&pos).map(|m| m.to()), Some(Square::E4));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(PolyglotBook::open("/nonexistent/book.bin").is_err());
    }
}
