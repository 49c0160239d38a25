//! Lifecycle status, sub-state, seats and outcome agree.

use super::super::{Match, MatchStatus, SubState};
use super::Invariant;

/// Invariant:
/// - `Waiting` has an empty second seat, `Active` and `Finished` have both
/// - an outcome is present iff the match is `Finished`
/// - sub-state is `Finished` iff the match is `Finished`
pub struct StatusConsistentInvariant;

impl Invariant<Match> for StatusConsistentInvariant {
    fn holds(game: &Match) -> bool {
        let finished = game.status() == MatchStatus::Finished;
        let seated = game.players().count();
        let seats_ok = match game.status() {
            MatchStatus::Waiting => seated == 1,
            MatchStatus::Active | MatchStatus::Finished => seated == 2,
        };
        seats_ok
            && game.outcome().is_some() == finished
            && (game.sub_state() == SubState::Finished) == finished
    }

    fn description() -> &'static str {
        "Status, sub-state, seats and outcome are consistent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    #[test]
    fn test_lifecycle_holds() {
        let mut game = Match::new(1, "ana");
        assert!(StatusConsistentInvariant::holds(&game));
        game.join("bo").unwrap();
        assert!(StatusConsistentInvariant::holds(&game));
        game.forfeit(Symbol::O).unwrap();
        assert!(StatusConsistentInvariant::holds(&game));
    }
}
