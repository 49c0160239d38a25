//! Piece counters stay within their bounds.

use super::super::{Match, PIECES_PER_PLAYER};
use super::Invariant;

/// Invariant: `pieces_on_board ≤ pieces_placed ≤ 9` for every seat.
pub struct PieceCountsBoundedInvariant;

impl Invariant<Match> for PieceCountsBoundedInvariant {
    fn holds(game: &Match) -> bool {
        game.players().all(|p| {
            p.pieces_placed() <= PIECES_PER_PLAYER && p.pieces_on_board() <= p.pieces_placed()
        })
    }

    fn description() -> &'static str {
        "Piece counters within bounds (on board <= placed <= 9)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, Symbol};

    #[test]
    fn test_new_match_holds() {
        assert!(PieceCountsBoundedInvariant::holds(&Match::new(1, "ana")));
    }

    #[test]
    fn test_full_placement_holds() {
        let mut game = Match::new(1, "ana");
        game.join("bo").unwrap();
        game.force_place(Symbol::X, &Position::ALL[..9]);
        game.force_place(Symbol::O, &Position::ALL[9..18]);
        assert!(PieceCountsBoundedInvariant::holds(&game));
    }

    #[test]
    fn test_tenth_piece_violates() {
        let mut game = Match::new(1, "ana");
        game.join("bo").unwrap();
        game.force_place(Symbol::X, &Position::ALL[..10]);
        assert!(!PieceCountsBoundedInvariant::holds(&game));
    }
}
