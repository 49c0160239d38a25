//! Nine Men's Morris rules - board topology, mill detection and the match
//! state machine.
//!
//! # Architecture
//!
//! - **Position**: the 24 fixed points, adjacency graph and 16 mill lines
//! - **Board**: occupancy plus rule predicates (mills, legal moves)
//! - **Match**: one game; validates every command before mutating
//! - **Contracts / Invariants**: named preconditions and post-commit checks
//!
//! # Example
//!
//! ```
//! use morris_rules::{Match, Position, SubState, Transition};
//!
//! let mut game = Match::new(1, "ana");
//! game.join("bo").unwrap();
//! for pos in [Position::A1, Position::B2, Position::D1, Position::D2] {
//!     game.place_piece(pos).unwrap();
//! }
//! assert_eq!(game.place_piece(Position::G1), Ok(Transition::MillFormed));
//! assert_eq!(game.sub_state(), SubState::AwaitingCapture);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod action;
mod board;
mod contracts;
mod game;
mod invariants;
mod position;
mod types;

// Crate-level exports - Topology
pub use position::{MILLS, POSITION_COUNT, Position, UnknownPosition};

// Crate-level exports - Core types
pub use types::{
    Connection, FLYING_PIECES, FinishReason, LOSING_PIECES, MatchId, MatchStatus, Outcome,
    PIECES_PER_PLAYER, Phase, Player, SubState, Symbol,
};

// Crate-level exports - Actions
pub use action::{Action, Ply, RuleViolation, Transition};

// Crate-level exports - Board and match
pub use board::Board;
pub use game::Match;

// Crate-level exports - Contracts
pub use contracts::{
    ActionContract, Contract, InPhase, LegalCapture, LegalMove, LegalPlacement, MatchActive,
    NoCapturePending,
};

// Crate-level exports - Invariants
pub use invariants::{
    BoardMatchesCountersInvariant, Invariant, InvariantSet, InvariantViolation, MorrisInvariants,
    PieceCountsBoundedInvariant, StatusConsistentInvariant,
};
