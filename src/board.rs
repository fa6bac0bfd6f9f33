//! Bitboard playfield: one row mask per row, validity checks, lock and line clear.

use crate::piece::Piece;

/// Cells per piece; also the number of hidden rows above the visible field.
pub const NPARTS: usize = 4;
pub const WIDTH: usize = 10;
pub const HEIGHT: usize = 20 + NPARTS;

/// Mask of a completely occupied row.
pub const FULL_ROW: u16 = ((1u32 << WIDTH) - 1) as u16;

const _: () = assert!(WIDTH <= u16::BITS as usize, "row masks are u16");

/// Occupancy grid. Bit `i` of `rows[y]` set means column `i` of row `y` is taken.
/// Row 0 is the top; rows `0..NPARTS` are the hidden buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: [u16; HEIGHT],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub const fn new() -> Self {
        Self { rows: [0; HEIGHT] }
    }

    #[cfg(test)]
    pub const fn row(&self, y: usize) -> u16 {
        self.rows[y]
    }

    #[cfg(test)]
    pub fn set_row(&mut self, y: usize, mask: u16) {
        self.rows[y] = mask & FULL_ROW;
    }

    /// True if (x, y) is inside the grid and occupied.
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        match (usize::try_from(x), usize::try_from(y)) {
            (Ok(x), Ok(y)) if x < WIDTH && y < HEIGHT => self.rows[y] & (1 << x) != 0,
            _ => false,
        }
    }

    /// True if every cell of `piece` anchored at (x, y) is in bounds and free.
    pub fn is_valid(&self, piece: &Piece, x: i32, y: i32) -> bool {
        piece.cells_at(x, y).all(|(cx, cy)| {
            match (usize::try_from(cx), usize::try_from(cy)) {
                (Ok(cx), Ok(cy)) => cx < WIDTH && cy < HEIGHT && self.rows[cy] & (1 << cx) == 0,
                _ => false,
            }
        })
    }

    /// Lowest anchor row reachable by dropping straight down from `y`.
    pub fn landing_row(&self, piece: &Piece, x: i32, y: i32) -> i32 {
        let mut row = y;
        while self.is_valid(piece, x, row + 1) {
            row += 1;
        }
        row
    }

    /// Merge the piece's cells into the board. Out-of-range cells are ignored;
    /// callers only lock placements that passed `is_valid`.
    pub fn lock(&mut self, piece: &Piece, x: i32, y: i32) {
        for (cx, cy) in piece.cells_at(x, y) {
            if let (Ok(cx), Ok(cy)) = (usize::try_from(cx), usize::try_from(cy)) {
                if cx < WIDTH && cy < HEIGHT {
                    self.rows[cy] |= 1 << cx;
                }
            }
        }
    }

    /// Drop every full row, compacting the rest downward. Returns the number of
    /// rows removed; that many rows at the top are left empty.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut write = HEIGHT;
        for read in (0..HEIGHT).rev() {
            if self.rows[read] == FULL_ROW {
                continue;
            }
            write -= 1;
            self.rows[write] = self.rows[read];
        }
        self.rows[..write].fill(0);
        write
    }

    pub fn reset(&mut self) {
        self.rows = [0; HEIGHT];
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|&r| r == 0)
    }
}
