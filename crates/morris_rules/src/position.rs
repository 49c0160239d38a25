//! The 24 board points, their adjacency graph and the 16 mill lines.
//!
//! Point codes form three concentric squares joined by four spokes:
//!
//! ```text
//! A1-------D1-------G1
//! |  B2----D2----F2  |
//! |  |  C3-D3-E3  |  |
//! A4-B4-C4    E4-F4-G4
//! |  |  C5-D5-E5  |  |
//! |  B6----D6----F6  |
//! A7-------D7-------G7
//! ```
//!
//! The codes are part of the external contract and never change.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::instrument;

/// A point on the board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::EnumIter,
)]
#[allow(missing_docs)]
pub enum Position {
    A1,
    D1,
    G1,
    B2,
    D2,
    F2,
    C3,
    D3,
    E3,
    A4,
    B4,
    C4,
    E4,
    F4,
    G4,
    C5,
    D5,
    E5,
    B6,
    D6,
    F6,
    A7,
    D7,
    G7,
}

/// Number of points on the board.
pub const POSITION_COUNT: usize = 24;

/// The 16 mill lines: 8 horizontal followed by 8 vertical.
pub const MILLS: [[Position; 3]; 16] = {
    use Position::*;
    [
        // Horizontal
        [A1, D1, G1],
        [B2, D2, F2],
        [C3, D3, E3],
        [A4, B4, C4],
        [E4, F4, G4],
        [C5, D5, E5],
        [B6, D6, F6],
        [A7, D7, G7],
        // Vertical
        [A1, A4, A7],
        [B2, B4, B6],
        [C3, C4, C5],
        [D1, D2, D3],
        [D5, D6, D7],
        [E3, E4, E5],
        [F2, F4, F6],
        [G1, G4, G7],
    ]
};

/// A position code that names no point on the board.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Unknown position '{}'", code)]
pub struct UnknownPosition {
    /// The rejected code.
    pub code: String,
}

impl Position {
    /// All 24 points in board order (top row to bottom row).
    pub const ALL: [Position; POSITION_COUNT] = {
        use Position::*;
        [
            A1, D1, G1, B2, D2, F2, C3, D3, E3, A4, B4, C4, E4, F4, G4, C5, D5, E5, B6, D6, F6,
            A7, D7, G7,
        ]
    };

    /// Returns the stable two-character code for this point.
    pub fn code(self) -> &'static str {
        use Position::*;
        match self {
            A1 => "A1",
            D1 => "D1",
            G1 => "G1",
            B2 => "B2",
            D2 => "D2",
            F2 => "F2",
            C3 => "C3",
            D3 => "D3",
            E3 => "E3",
            A4 => "A4",
            B4 => "B4",
            C4 => "C4",
            E4 => "E4",
            F4 => "F4",
            G4 => "G4",
            C5 => "C5",
            D5 => "D5",
            E5 => "E5",
            B6 => "B6",
            D6 => "D6",
            F6 => "F6",
            A7 => "A7",
            D7 => "D7",
            G7 => "G7",
        }
    }

    /// Index of this point into board storage (0-23).
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Point stored at the given board index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Points connected to this one by a board line.
    pub fn neighbors(self) -> &'static [Position] {
        use Position::*;
        match self {
            A1 => &[D1, A4],
            D1 => &[A1, G1, D2],
            G1 => &[D1, G4],
            B2 => &[D2, B4],
            D2 => &[B2, F2, D1, D3],
            F2 => &[D2, F4],
            C3 => &[D3, C4],
            D3 => &[C3, E3, D2],
            E3 => &[D3, E4],
            A4 => &[A1, B4, A7],
            B4 => &[A4, B2, C4, B6],
            C4 => &[B4, C3, C5],
            E4 => &[E3, F4, E5],
            F4 => &[E4, F2, G4, F6],
            G4 => &[F4, G1, G7],
            C5 => &[C4, D5],
            D5 => &[C5, E5, D6],
            E5 => &[D5, E4],
            B6 => &[B4, D6],
            D6 => &[B6, F6, D5, D7],
            F6 => &[D6, F4],
            A7 => &[A4, D7],
            D7 => &[A7, G7, D6],
            G7 => &[D7, G4],
        }
    }

    /// Returns true if `other` is one step away along a board line.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.neighbors().contains(&other)
    }

    /// Mill lines passing through this point (always exactly two).
    pub fn mills(self) -> impl Iterator<Item = &'static [Position; 3]> {
        let lines: &'static [[Position; 3]; 16] = &MILLS;
        lines.iter().filter(move |line| line.contains(&self))
    }

    /// Parses a code such as `"d3"` or `" G7 "` (case-insensitive, trimmed).
    #[instrument]
    pub fn parse(code: &str) -> Result<Self, UnknownPosition> {
        let wanted = code.trim();
        Position::iter()
            .find(|pos| pos.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPosition {
                code: code.to_string(),
            })
    }
}

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_matches_index_order() {
        for (index, pos) in Position::ALL.iter().enumerate() {
            assert_eq!(pos.to_index(), index);
            assert_eq!(Position::from_index(index), Some(*pos));
        }
        assert_eq!(Position::from_index(POSITION_COUNT), None);
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        for a in Position::ALL {
            for b in a.neighbors() {
                assert!(b.is_adjacent(a), "{a} -> {b} is not mirrored");
            }
        }
    }

    #[test]
    fn test_edge_count() {
        let degree_sum: usize = Position::ALL.iter().map(|p| p.neighbors().len()).sum();
        // 32 edges on the standard board
        assert_eq!(degree_sum, 64);
    }

    #[test]
    fn test_every_point_lies_on_two_mills() {
        for pos in Position::ALL {
            assert_eq!(pos.mills().count(), 2, "{pos}");
        }
    }

    #[test]
    fn test_mill_lines_are_connected_paths() {
        for [a, b, c] in MILLS {
            assert!(a.is_adjacent(b) && b.is_adjacent(c), "{a}-{b}-{c}");
            assert!(!a.is_adjacent(c));
        }
    }

    #[test]
    fn test_parse_accepts_codes_case_insensitively() {
        assert_eq!(Position::parse("d3"), Ok(Position::D3));
        assert_eq!(" G7 ".parse::<Position>(), Ok(Position::G7));
        for pos in Position::ALL {
            assert_eq!(Position::parse(pos.code()), Ok(pos));
        }
    }

    #[test]
    fn test_parse_rejects_unknown_codes() {
        for bad in ["D4", "H1", "", "A11"] {
            let err = Position::parse(bad).unwrap_err();
            assert_eq!(err.code, bad);
        }
    }

    #[test]
    fn test_serializes_as_code() {
        let json = serde_json::to_string(&Position::C5).unwrap();
        assert_eq!(json, "\"C5\"");
    }
}
