//! Board layout calculations - handles sizing and coordinate transformations.
//!
//! The overlay draws an eval bar down the left edge and a title strip along
//! the top; the board sits in the remaining area.

use shakmaty::Square;

/// Width of the eval bar left of the board
pub const BAR_WIDTH: f32 = 20.0;
/// Height of the title strip above the board
pub const TITLE_HEIGHT: f32 = 25.0;
/// Height of the info area below the board
pub const INFO_HEIGHT: f32 = 80.0;

pub const MIN_SQUARE_SIZE: f32 = 30.0;
pub const MAX_SQUARE_SIZE: f32 = 120.0;
pub const DEFAULT_SQUARE_SIZE: f32 = 60.0;

/// Handles all layout calculations for the chess board
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardLayout {
    square_size: f32,
    pub flipped: bool,
}

impl BoardLayout {
    pub fn new(square_size: f32, flipped: bool) -> Self {
        Self {
            square_size: square_size.clamp(MIN_SQUARE_SIZE, MAX_SQUARE_SIZE),
            flipped,
        }
    }

    pub fn square_size(&self) -> f32 {
        self.square_size
    }

    /// Grow or shrink the squares, staying within the size limits
    pub fn resize(&mut self, delta: f32) -> f32 {
        self.square_size = (self.square_size + delta).clamp(MIN_SQUARE_SIZE, MAX_SQUARE_SIZE);
        self.square_size
    }

    /// Get the total size of the board (8 squares)
    pub fn board_total_size(&self) -> f32 {
        self.square_size * 8.0
    }

    /// Full overlay size: eval bar + board, title + board + info
    pub fn window_size(&self) -> (f32, f32) {
        (
            BAR_WIDTH + self.board_total_size(),
            TITLE_HEIGHT + self.board_total_size() + INFO_HEIGHT,
        )
    }

    /// Screen row/col (0,0 = top left) of a square under the current orientation
    pub fn square_to_cell(&self, square: Square) -> (usize, usize) {
        let file = square.file() as usize;
        let rank = square.rank() as usize;
        if self.flipped {
            (rank, 7 - file)
        } else {
            (7 - rank, file)
        }
    }

    /// Square shown at screen row/col
    pub fn cell_to_square(&self, row: usize, col: usize) -> Option<Square> {
        if row > 7 || col > 7 {
            return None;
        }
        let (file, rank) = if self.flipped {
            (7 - col, row)
        } else {
            (col, 7 - row)
        };
        let index = u32::try_from(rank * 8 + file).ok()?;
        Some(Square::new(index))
    }

    /// Convert an overlay pixel position to the square under it (if within board)
    pub fn pos_to_square(&self, x: f32, y: f32) -> Option<Square> {
        let board_x = x - BAR_WIDTH;
        let board_y = y - TITLE_HEIGHT;

        if board_x < 0.0 || board_y < 0.0 {
            return None;
        }

        let col = (board_x / self.square_size) as usize;
        let row = (board_y / self.square_size) as usize;
        self.cell_to_square(row, col)
    }

    /// Pixel centre of a square, for drawing the best-move arrow
    pub fn square_center(&self, square: Square) -> (f32, f32) {
        let (row, col) = self.square_to_cell(square);
        let half = self.square_size / 2.0;
        (
            BAR_WIDTH + col as f32 * self.square_size + half,
            TITLE_HEIGHT + row as f32 * self.square_size + half,
        )
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(DEFAULT_SQUARE_SIZE, false)
    }
}
