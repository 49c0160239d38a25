//! First-class invariants for Nine Men's Morris.
//!
//! Invariants are logical properties that must hold after every committed
//! action. They are testable on their own and checked in debug builds.

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
///
/// Implementations are provided for tuples.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

fn collect(
    failed: impl IntoIterator<Item = Option<&'static str>>,
) -> Result<(), Vec<InvariantViolation>> {
    let violations: Vec<_> = failed
        .into_iter()
        .flatten()
        .map(InvariantViolation::new)
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn failed<S, I: Invariant<S>>(state: &S) -> Option<&'static str> {
    (!I::holds(state)).then(I::description)
}

impl<S, I1, I2, I3> InvariantSet<S> for (I1, I2, I3)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        collect([
            failed::<S, I1>(state),
            failed::<S, I2>(state),
            failed::<S, I3>(state),
        ])
    }
}

impl<S, I1, I2> InvariantSet<S> for (I1, I2)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        collect([failed::<S, I1>(state), failed::<S, I2>(state)])
    }
}

pub mod board_counters;
pub mod piece_counts;
pub mod status_consistent;

pub use board_counters::BoardMatchesCountersInvariant;
pub use piece_counts::PieceCountsBoundedInvariant;
pub use status_consistent::StatusConsistentInvariant;

/// All match invariants as a composable set.
pub type MorrisInvariants = (
    PieceCountsBoundedInvariant,
    BoardMatchesCountersInvariant,
    StatusConsistentInvariant,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Match, Position};

    #[test]
    fn test_invariant_set_holds_for_new_match() {
        let game = Match::new(1, "ana");
        assert!(MorrisInvariants::check_all(&game).is_ok());
    }

    #[test]
    fn test_invariant_set_holds_after_play() {
        let mut game = Match::new(1, "ana");
        game.join("bo").unwrap();
        for pos in [Position::A1, Position::B2, Position::D1, Position::D2] {
            game.place_piece(pos).unwrap();
        }
        assert!(MorrisInvariants::check_all(&game).is_ok());
    }

    #[test]
    fn test_two_invariants_as_set() {
        let game = Match::new(1, "ana");
        type TwoInvariants = (PieceCountsBoundedInvariant, StatusConsistentInvariant);
        assert!(TwoInvariants::check_all(&game).is_ok());
    }
}
