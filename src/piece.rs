//! Piece catalog and rotation.

use rand::Rng;

/// Colour tag for a drawn cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colour {
    /// Terminal default (empty cell).
    #[default]
    Default,
    /// Reverse video: walls, floor and locked cells.
    Inverted,
    /// Black cell background.
    Background,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Grey,
}

/// The seven tetromino kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    O,
    I,
    J,
    L,
    S,
    Z,
    T,
}

impl PieceKind {
    pub const ALL: [Self; 7] = [Self::O, Self::I, Self::J, Self::L, Self::S, Self::Z, Self::T];

    /// 4 cells relative to the anchor; each (dx, dy), y grows downward.
    pub const fn cells(self) -> [(i8, i8); 4] {
        match self {
            Self::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
            Self::I => [(-1, 0), (0, 0), (1, 0), (2, 0)],
            Self::J => [(-1, 0), (0, 0), (1, 0), (1, 1)],
            Self::L => [(-1, 0), (0, 0), (1, 0), (-1, 1)],
            Self::S => [(-1, 0), (0, 0), (0, 1), (1, 1)],
            Self::Z => [(0, 0), (1, 0), (-1, 1), (0, 1)],
            Self::T => [(-1, 0), (0, 0), (1, 0), (0, 1)],
        }
    }

    pub const fn colour(self) -> Colour {
        match self {
            Self::O => Colour::Grey,
            Self::I => Colour::Cyan,
            Self::J => Colour::Blue,
            Self::L => Colour::Yellow,
            Self::S => Colour::Red,
            Self::Z => Colour::Green,
            Self::T => Colour::Magenta,
        }
    }
}

/// A shape instance. The anchor position lives in the session, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    kind: PieceKind,
    cells: [(i8, i8); 4],
    colour: Colour,
}

impl Piece {
    /// Fresh copy of the catalog template, unrotated.
    pub const fn new(kind: PieceKind) -> Self {
        Self {
            kind,
            cells: kind.cells(),
            colour: kind.colour(),
        }
    }

    /// Uniform kind, then 0..=3 uniform quarter turns.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let kind = PieceKind::ALL[rng.random_range(0..PieceKind::ALL.len())];
        let mut piece = Self::new(kind);
        for _ in 0..rng.random_range(0..4) {
            piece.rotate();
        }
        piece
    }

    /// Quarter turn about the anchor: (x, y) -> (y, -x) on every offset.
    ///
    /// ```text
    ///            []        []        []
    /// [][][] -> [][] -> [][][] -> [][]
    ///   []      []                  []
    /// ```
    pub fn rotate(&mut self) {
        for (x, y) in &mut self.cells {
            (*x, *y) = (*y, -*x);
        }
    }

    pub fn rotated(mut self) -> Self {
        self.rotate();
        self
    }

    #[cfg(test)]
    pub const fn cells(&self) -> &[(i8, i8); 4] {
        &self.cells
    }

    #[inline]
    pub const fn colour(&self) -> Colour {
        self.colour
    }

    #[inline]
    pub const fn kind(&self) -> PieceKind {
        self.kind
    }

    /// Absolute board cells for an anchor at (x, y).
    pub fn cells_at(&self, x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells
            .iter()
            .map(move |&(dx, dy)| (x + i32::from(dx), y + i32::from(dy)))
    }
}
