use crate::board::{Board, Coord};
use crate::selection::Region;

/// The sum a region's digits must reach to be cleared.
pub const TARGET_SUM: u32 = 10;

/// Result of checking a region against the board
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Cells to clear, row-major. Empty when the region did not match.
    pub cleared: Vec<Coord>,
    /// One point per cleared cell
    pub score_delta: u32,
}

impl MatchOutcome {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn matched(&self) -> bool {
        !self.cleared.is_empty()
    }
}

/// Decide whether `region` clears on `board`. Never mutates the board.
///
/// Only on-board, non-empty cells take part. A region with no digits in it
/// sums to zero and fails like any other non-ten sum.
pub fn evaluate(board: &Board, region: &Region) -> MatchOutcome {
    let digits: Vec<(Coord, u8)> = region
        .cells()
        .filter_map(|coord| board.get(coord).map(|digit| (coord, digit)))
        .collect();

    let sum: u32 = digits.iter().map(|(_, digit)| u32::from(*digit)).sum();

    if digits.is_empty() || sum != TARGET_SUM {
        return MatchOutcome::miss();
    }

    let cleared: Vec<Coord> = digits.into_iter().map(|(coord, _)| coord).collect();
    MatchOutcome {
        score_delta: cleared.len() as u32,
        cleared,
    }
}
