//! Contract-based validation for Nine Men's Morris.
//!
//! Each command has a named precondition composed from small checks.
//! Postconditions re-check the match invariants after a commit.

use super::invariants::{InvariantSet, MorrisInvariants};
use super::{Action, Match, MatchStatus, Phase, Position, RuleViolation, SubState};
use tracing::instrument;

// ─────────────────────────────────────────────────────────────
//  Contract Trait
// ─────────────────────────────────────────────────────────────

/// Preconditions and postconditions for a state transition.
///
/// - Precondition: must hold before the action is applied
/// - Postcondition: must hold between the state before and after
pub trait Contract<S, A> {
    /// Checks preconditions before applying the action.
    fn pre(state: &S, action: &A) -> Result<(), RuleViolation>;

    /// Checks postconditions after applying the action.
    fn post(before: &S, after: &S) -> Result<(), RuleViolation>;
}

// ─────────────────────────────────────────────────────────────
//  Building blocks
// ─────────────────────────────────────────────────────────────

/// Precondition: both seats are filled and nobody has won yet.
pub struct MatchActive;

impl MatchActive {
    /// Checks the match status.
    pub fn check(game: &Match) -> Result<(), RuleViolation> {
        if game.status() != MatchStatus::Active {
            return Err(RuleViolation::WrongStatus {
                required: MatchStatus::Active,
                actual: game.status(),
            });
        }
        Ok(())
    }
}

/// Precondition: no capture is outstanding.
pub struct NoCapturePending;

impl NoCapturePending {
    /// Checks the sub-state.
    pub fn check(game: &Match) -> Result<(), RuleViolation> {
        match game.sub_state() {
            SubState::AwaitingCapture => Err(RuleViolation::CapturePending),
            _ => Ok(()),
        }
    }
}

/// Precondition: the match is in `phase`.
pub struct InPhase;

impl InPhase {
    /// Checks the phase.
    pub fn check(game: &Match, phase: Phase) -> Result<(), RuleViolation> {
        if game.phase() != phase {
            return Err(RuleViolation::WrongPhase(game.phase()));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Command preconditions
// ─────────────────────────────────────────────────────────────

/// Composite precondition for placing a piece.
pub struct LegalPlacement;

impl LegalPlacement {
    /// Validates all preconditions for a placement.
    #[instrument(skip(game), fields(id = game.id()))]
    pub fn check(position: Position, game: &Match) -> Result<(), RuleViolation> {
        MatchActive::check(game)?;
        NoCapturePending::check(game)?;
        InPhase::check(game, Phase::Placement)?;
        if game.current_player().is_none_or(|p| p.pieces_in_hand() == 0) {
            return Err(RuleViolation::NoPiecesInHand);
        }
        if !game.board().is_free(position) {
            return Err(RuleViolation::Occupied(position));
        }
        Ok(())
    }
}

/// Composite precondition for moving a piece.
pub struct LegalMove;

impl LegalMove {
    /// Validates all preconditions for a move, flying included.
    #[instrument(skip(game), fields(id = game.id()))]
    pub fn check(from: Position, to: Position, game: &Match) -> Result<(), RuleViolation> {
        MatchActive::check(game)?;
        NoCapturePending::check(game)?;
        InPhase::check(game, Phase::Movement)?;
        let symbol = game.current();
        game.board().check_move(from, to, symbol, game.can_fly(symbol))
    }
}

/// Composite precondition for capturing a piece.
///
/// A piece inside a formed mill is protected unless every opponent piece
/// is in one.
pub struct LegalCapture;

impl LegalCapture {
    /// Validates all preconditions for a capture.
    #[instrument(skip(game), fields(id = game.id()))]
    pub fn check(position: Position, game: &Match) -> Result<(), RuleViolation> {
        MatchActive::check(game)?;
        if game.sub_state() != SubState::AwaitingCapture {
            return Err(RuleViolation::NoCapturePending);
        }
        let victim = game.current().opponent();
        let board = game.board();
        if !board.is_occupied_by(position, victim) {
            return Err(RuleViolation::NotOpponentPiece(position));
        }
        if board.forms_mill(position, victim) && !board.all_pieces_in_mills(victim) {
            return Err(RuleViolation::ProtectedByMill(position));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Action Contract (Pre + Post)
// ─────────────────────────────────────────────────────────────

/// Contract for every gameplay action.
///
/// Postconditions:
/// - Piece counters stay within bounds
/// - Board occupancy agrees with the counters
/// - Status, sub-state and outcome agree
pub struct ActionContract;

impl Contract<Match, Action> for ActionContract {
    fn pre(game: &Match, action: &Action) -> Result<(), RuleViolation> {
        match *action {
            Action::Place { position } => LegalPlacement::check(position, game),
            Action::Move { from, to } => LegalMove::check(from, to, game),
            Action::Capture { position } => LegalCapture::check(position, game),
        }
    }

    fn post(_before: &Match, after: &Match) -> Result<(), RuleViolation> {
        MorrisInvariants::check_all(after).map_err(|violations| {
            let descriptions = violations
                .iter()
                .map(|v| v.description.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            RuleViolation::InvariantBroken(descriptions)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;
    use Position::*;

    fn active() -> Match {
        let mut game = Match::new(1, "ana");
        game.join("bo").unwrap();
        game
    }

    #[test]
    fn test_precondition_free_point() {
        let game = active();
        assert!(ActionContract::pre(&game, &Action::Place { position: D5 }).is_ok());
    }

    #[test]
    fn test_precondition_occupied_point() {
        let mut game = active();
        game.place_piece(D5).unwrap();
        assert_eq!(
            ActionContract::pre(&game, &Action::Place { position: D5 }),
            Err(RuleViolation::Occupied(D5))
        );
    }

    #[test]
    fn test_capture_pending_blocks_placement() {
        let mut game = active();
        game.force_place(Symbol::X, &[A1, D1]);
        game.force_place(Symbol::O, &[B2, D2]);
        game.place_piece(G1).unwrap();
        assert_eq!(game.sub_state(), SubState::AwaitingCapture);
        assert_eq!(
            ActionContract::pre(&game, &Action::Place { position: C3 }),
            Err(RuleViolation::CapturePending)
        );
        assert!(ActionContract::pre(&game, &Action::Capture { position: B2 }).is_ok());
    }

    #[test]
    fn test_mill_member_protected_while_others_free() {
        let mut game = active();
        game.force_place(Symbol::O, &[B2, D2, F2, C5]);
        game.force_place(Symbol::X, &[A1, D1]);
        game.place_piece(G1).unwrap();
        assert_eq!(
            LegalCapture::check(D2, &game),
            Err(RuleViolation::ProtectedByMill(D2))
        );
        assert!(LegalCapture::check(C5, &game).is_ok());
    }

    #[test]
    fn test_all_in_mills_exception() {
        let mut game = active();
        game.force_place(Symbol::O, &[B2, D2, F2]);
        game.force_place(Symbol::X, &[A1, D1]);
        game.place_piece(G1).unwrap();
        assert!(LegalCapture::check(D2, &game).is_ok());
    }

    #[test]
    fn test_postcondition_holds_after_move() {
        let before = active();
        let mut after = before.clone();
        after.place_piece(A1).unwrap();
        assert!(ActionContract::post(&before, &after).is_ok());
    }
}
