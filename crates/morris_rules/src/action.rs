//! First-class actions and the ways they can be rejected.
//!
//! Actions are domain events, not side effects: they can be validated
//! against a match before anything is mutated, logged, and replayed.

use super::{FinishReason, MatchStatus, Phase, Position, Symbol};
use serde::{Deserialize, Serialize};

/// A gameplay command issued by the player whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Put a piece from hand onto a free point.
    Place {
        /// Target point.
        position: Position,
    },
    /// Slide (or fly) an own piece to a free point.
    Move {
        /// Origin point.
        from: Position,
        /// Destination point.
        to: Position,
    },
    /// Remove an opponent piece after closing a mill.
    Capture {
        /// Point holding the opponent piece.
        position: Position,
    },
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Place { position } => write!(f, "place {position}"),
            Action::Move { from, to } => write!(f, "move {from} -> {to}"),
            Action::Capture { position } => write!(f, "capture {position}"),
        }
    }
}

/// One committed action and who made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ply {
    /// Acting player.
    pub player: Symbol,
    /// What they did.
    pub action: Action,
}

/// State change produced by a committed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// The turn passed to `next`. `phase_changed` is set when this turn
    /// moved the match from placement into movement.
    TurnPassed {
        /// Player now to act.
        next: Symbol,
        /// True if placement just ended.
        phase_changed: bool,
    },
    /// The acting player closed a mill and must capture next.
    MillFormed,
    /// The match ended.
    Finished {
        /// Winning symbol.
        winner: Symbol,
        /// How the match was decided.
        reason: FinishReason,
    },
}

/// Why a command was refused. Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum RuleViolation {
    /// The match is not in the required lifecycle state.
    #[display("Match is {} but must be {}", actual, required)]
    WrongStatus {
        /// Required status.
        required: MatchStatus,
        /// Current status.
        actual: MatchStatus,
    },

    /// The command belongs to the other phase.
    #[display("Match is in the {} phase", _0)]
    WrongPhase(Phase),

    /// A mill was closed and a capture must come first.
    #[display("A capture is pending")]
    CapturePending,

    /// Capture requested without a mill having been formed.
    #[display("No capture is pending")]
    NoCapturePending,

    /// All nine pieces are already on the board or captured.
    #[display("No pieces left in hand")]
    NoPiecesInHand,

    /// Target point is taken.
    #[display("Position {} is occupied", _0)]
    Occupied(Position),

    /// Origin point does not hold one of the acting player's pieces.
    #[display("Position {} does not hold your piece", _0)]
    NotOwnPiece(Position),

    /// Destination is not adjacent and the player cannot fly.
    #[display("{} is not adjacent to {}", to, from)]
    NotAdjacent {
        /// Origin point.
        from: Position,
        /// Destination point.
        to: Position,
    },

    /// Capture target does not hold an opponent piece.
    #[display("Position {} does not hold an opponent piece", _0)]
    NotOpponentPiece(Position),

    /// Capture target sits in a mill while unprotected pieces remain.
    #[display("Position {} is protected by a mill", _0)]
    ProtectedByMill(Position),

    /// Both seats are taken.
    #[display("Match already has two players")]
    MatchFull,

    /// The joining player already holds the other seat.
    #[display("Player '{}' is already seated", _0)]
    AlreadySeated(String),

    /// The named player holds no seat in this match.
    #[display("Player '{}' is not in this match", _0)]
    NotInMatch(String),

    /// A committed state broke a match invariant.
    #[display("Invariant violated: {}", _0)]
    InvariantBroken(String),
}

impl std::error::Error for RuleViolation {}
