//! Read-only views of a match handed to clients.

use derive_getters::Getters;
use derive_new::new;
use morris_rules::{
    Connection, Match, MatchId, MatchStatus, Outcome, Phase, Player, Position, SubState, Symbol,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Seat assignment returned when a player creates or joins a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct MatchHandle {
    match_id: MatchId,
    player: String,
    symbol: Symbol,
}

/// One line of the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct MatchSummary {
    id: MatchId,
    status: MatchStatus,
    players: Vec<String>,
}

impl From<&Match> for MatchSummary {
    fn from(game: &Match) -> Self {
        Self {
            id: game.id(),
            status: game.status(),
            players: game.players().map(|p| p.name().to_string()).collect(),
        }
    }
}

/// A seated player as clients see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PlayerView {
    name: String,
    symbol: Symbol,
    pieces_placed: u8,
    pieces_on_board: u8,
    pieces_in_hand: u8,
    can_fly: bool,
    connection: Connection,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name().to_string(),
            symbol: player.symbol(),
            pieces_placed: player.pieces_placed(),
            pieces_on_board: player.pieces_on_board(),
            pieces_in_hand: player.pieces_in_hand(),
            can_fly: player.can_fly(),
            connection: player.connection(),
        }
    }
}

/// Full state of a match at one point in its event order.
///
/// `last_sequence` is the sequence number of the latest event published for
/// the match; pass it to `events_since` to resume from this snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct MatchSnapshot {
    id: MatchId,
    status: MatchStatus,
    phase: Phase,
    sub_state: SubState,
    current: Symbol,
    board: BTreeMap<Position, Symbol>,
    players: Vec<PlayerView>,
    winner: Option<String>,
    outcome: Option<Outcome>,
    last_sequence: u64,
}

impl MatchSnapshot {
    /// Captures `game` together with the latest event sequence.
    pub fn capture(game: &Match, last_sequence: u64) -> Self {
        Self {
            id: game.id(),
            status: game.status(),
            phase: game.phase(),
            sub_state: game.sub_state(),
            current: game.current(),
            board: game.board().occupied().collect(),
            players: game.players().map(PlayerView::from).collect(),
            winner: game.winner().map(|p| p.name().to_string()),
            outcome: game.outcome(),
            last_sequence,
        }
    }

    /// The player seated as `symbol`.
    pub fn player(&self, symbol: Symbol) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.symbol == symbol)
    }
}
