//! Core domain types for Nine Men's Morris.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Pieces each player brings to the match.
pub const PIECES_PER_PLAYER: u8 = 9;

/// On-board count at which a player may fly.
pub const FLYING_PIECES: u8 = 3;

/// On-board count at or below which a player who has placed everything loses.
pub const LOSING_PIECES: u8 = 2;

/// Identifier of a match.
pub type MatchId = u64;

/// Piece colour. `X` always takes the first turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
pub enum Symbol {
    /// First player.
    X,
    /// Second player.
    O,
}

impl Symbol {
    /// Returns the other symbol.
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// Whether a player's client is currently attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
pub enum Connection {
    /// Client attached.
    #[default]
    Connected,
    /// Client gone; the seat is kept.
    Disconnected,
}

/// Match-wide game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Phase {
    /// Pieces are being introduced.
    Placement,
    /// Pieces are relocated.
    Movement,
}

/// Turn-level state inside an active match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SubState {
    /// Current player may place or move.
    InProgress,
    /// Current player just closed a mill and must capture.
    AwaitingCapture,
    /// No further commands are accepted.
    Finished,
}

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum MatchStatus {
    /// One player seated, waiting for an opponent.
    Waiting,
    /// Both players seated, game under way.
    Active,
    /// A winner has been declared.
    Finished,
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum FinishReason {
    /// Loser was reduced to two pieces after placing all nine.
    Attrition,
    /// Loser had no legal move in the movement phase.
    Blocked,
    /// Loser disconnected from an active match.
    Forfeit,
}

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Winning symbol.
    pub winner: Symbol,
    /// How the match was decided.
    pub reason: FinishReason,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} wins ({})", self.winner, self.reason)
    }
}

/// A seated player and their piece counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    name: String,
    symbol: Symbol,
    pieces_placed: u8,
    pieces_on_board: u8,
    connection: Connection,
}

impl Player {
    /// Creates a connected player with no pieces placed.
    #[instrument(skip(name), fields(name = %name.as_ref()))]
    pub fn new(name: impl AsRef<str>, symbol: Symbol) -> Self {
        Self {
            name: name.as_ref().to_string(),
            symbol,
            pieces_placed: 0,
            pieces_on_board: 0,
            connection: Connection::Connected,
        }
    }

    /// Player identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Piece colour.
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Pieces introduced so far (never decreases).
    pub fn pieces_placed(&self) -> u8 {
        self.pieces_placed
    }

    /// Pieces currently on the board.
    pub fn pieces_on_board(&self) -> u8 {
        self.pieces_on_board
    }

    /// Pieces still in hand.
    pub fn pieces_in_hand(&self) -> u8 {
        PIECES_PER_PLAYER.saturating_sub(self.pieces_placed)
    }

    /// Connection state.
    pub fn connection(&self) -> Connection {
        self.connection
    }

    /// True once all nine pieces have been placed.
    pub fn has_placed_all(&self) -> bool {
        self.pieces_placed == PIECES_PER_PLAYER
    }

    /// Flying is an individual capability: exactly three pieces left.
    pub fn can_fly(&self) -> bool {
        self.pieces_on_board == FLYING_PIECES
    }

    pub(crate) fn record_placement(&mut self) {
        self.pieces_placed += 1;
        self.pieces_on_board += 1;
    }

    pub(crate) fn record_capture(&mut self) {
        self.pieces_on_board -= 1;
    }

    pub(crate) fn set_connection(&mut self, connection: Connection) {
        self.connection = connection;
    }
}
