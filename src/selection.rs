use itertools::iproduct;

use crate::board::Coord;

/// Inclusive axis-aligned rectangle spanned by two cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl Region {
    /// Bounding rectangle of `anchor` and `pointer`, min/max taken per axis.
    pub fn spanning(anchor: Coord, pointer: Coord) -> Self {
        Self {
            min_row: anchor.row.min(pointer.row),
            max_row: anchor.row.max(pointer.row),
            min_col: anchor.col.min(pointer.col),
            max_col: anchor.col.max(pointer.col),
        }
    }

    pub fn contains(&self, coord: Coord) -> bool {
        (self.min_row..=self.max_row).contains(&coord.row)
            && (self.min_col..=self.max_col).contains(&coord.col)
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    /// Every coordinate in the rectangle, row-major
    pub fn cells(&self) -> impl Iterator<Item = Coord> {
        iproduct!(self.min_row..=self.max_row, self.min_col..=self.max_col).map(Coord::from)
    }
}

/// An in-progress drag gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Drag {
    anchor: Coord,
    pointer: Coord,
}

impl Drag {
    pub fn start(at: Coord) -> Self {
        Self {
            anchor: at,
            pointer: at,
        }
    }

    pub fn anchor(&self) -> Coord {
        self.anchor
    }

    pub fn pointer(&self) -> Coord {
        self.pointer
    }

    pub fn move_to(&mut self, pointer: Coord) {
        self.pointer = pointer;
    }

    pub fn region(&self) -> Region {
        Region::spanning(self.anchor, self.pointer)
    }
}
