//! Board occupancy agrees with each player's on-board counter.

use super::super::{Match, Symbol};
use super::Invariant;

/// Invariant: the number of `X` and `O` pieces on the board equals the
/// corresponding `pieces_on_board`. An empty seat owns no pieces.
pub struct BoardMatchesCountersInvariant;

impl Invariant<Match> for BoardMatchesCountersInvariant {
    fn holds(game: &Match) -> bool {
        [Symbol::X, Symbol::O].into_iter().all(|symbol| {
            let on_board = game.board().count(symbol);
            let counted = game
                .player(symbol)
                .map_or(0, |p| usize::from(p.pieces_on_board()));
            on_board == counted
        })
    }

    fn description() -> &'static str {
        "Board occupancy matches on-board counters"
    }
}
