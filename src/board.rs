use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ROWS: usize = 10;
pub const DEFAULT_COLS: usize = 17;

/// Largest board a session will deal
pub const MAX_ROWS: usize = 100;
pub const MAX_COLS: usize = 100;

/// Smallest and largest digit a cell can hold.
pub const MIN_DIGIT: u8 = 1;
pub const MAX_DIGIT: u8 = 9;

/// A `(row, col)` position on the board
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("board must have at least one row and one column")]
    Empty,
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("cell ({row}, {col}) holds {value}, digits must be 1-9")]
    InvalidDigit { row: usize, col: usize, value: u8 },
}

/// Fixed-size grid of digits. `None` marks a cleared cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Option<u8>>,
}

impl Board {
    /// Deal a board where every cell is a uniformly random digit in 1..=9.
    ///
    /// No attempt is made to guarantee that any region sums to ten.
    pub fn generate<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let cells = (0..rows * cols)
            .map(|_| Some(rng.gen_range(MIN_DIGIT..=MAX_DIGIT)))
            .collect();
        Self { rows, cols, cells }
    }

    /// A board with every cell already cleared
    pub fn blank(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    /// Build a board from explicit rows, validating shape and digit range.
    pub fn from_rows<I, R>(rows: I) -> Result<Self, BoardError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Option<u8>>,
    {
        let mut cells = Vec::new();
        let mut cols = None;
        let mut row_count = 0;

        for (row, values) in rows.into_iter().enumerate() {
            let before = cells.len();
            for (col, value) in values.into_iter().enumerate() {
                if let Some(v) = value {
                    if !(MIN_DIGIT..=MAX_DIGIT).contains(&v) {
                        return Err(BoardError::InvalidDigit { row, col, value: v });
                    }
                }
                cells.push(value);
            }
            let found = cells.len() - before;
            match cols {
                None => cols = Some(found),
                Some(expected) if expected != found => {
                    return Err(BoardError::Ragged {
                        row,
                        expected,
                        found,
                    })
                }
                Some(_) => {}
            }
            row_count += 1;
        }

        match cols {
            Some(cols) if cols > 0 => Ok(Self {
                rows: row_count,
                cols,
                cells,
            }),
            _ => Err(BoardError::Empty),
        }
    }

    /// Shorthand for boards with no cleared cells
    pub fn from_digits<I, R>(rows: I) -> Result<Self, BoardError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = u8>,
    {
        Self::from_rows(
            rows.into_iter()
                .map(|row| row.into_iter().map(Some).collect::<Vec<_>>()),
        )
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    /// Digit at `coord`, or `None` when the cell is cleared or off the board
    pub fn get(&self, coord: Coord) -> Option<u8> {
        self.index(coord).and_then(|i| self.cells[i])
    }

    pub fn is_cleared(&self, coord: Coord) -> bool {
        self.contains(coord) && self.get(coord).is_none()
    }

    /// Number of digits still on the board
    pub fn remaining(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Rows as slices, top to bottom
    pub fn iter_rows(&self) -> impl Iterator<Item = &[Option<u8>]> {
        self.cells.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Empty a cell. Cleared cells stay cleared; off-board coordinates are ignored.
    pub(crate) fn clear(&mut self, coord: Coord) {
        if let Some(i) = self.index(coord) {
            self.cells[i] = None;
        }
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        self.contains(coord).then(|| coord.row * self.cols + coord.col)
    }
}
