//! The match state machine.
//!
//! A [`Match`] owns its board and both seats. Every command is checked
//! against [`ActionContract`] before anything changes, so a rejected command
//! leaves the match exactly as it was.

use super::contracts::{ActionContract, Contract, LegalCapture, LegalMove, LegalPlacement};
use super::{
    Action, Board, Connection, FinishReason, LOSING_PIECES, MatchId, MatchStatus, Outcome, Phase,
    Player, Ply, Position, RuleViolation, SubState, Symbol, Transition,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// One game of Nine Men's Morris between two seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    id: MatchId,
    first: Player,
    second: Option<Player>,
    board: Board,
    current: Symbol,
    phase: Phase,
    sub_state: SubState,
    status: MatchStatus,
    outcome: Option<Outcome>,
    history: Vec<Ply>,
}

impl Match {
    /// Opens a match with `name` seated as `X`, waiting for an opponent.
    #[instrument(skip(name), fields(name = %name.as_ref()))]
    pub fn new(id: MatchId, name: impl AsRef<str>) -> Self {
        info!(id, "Match created");
        Self {
            id,
            first: Player::new(name, Symbol::X),
            second: None,
            board: Board::new(),
            current: Symbol::X,
            phase: Phase::Placement,
            sub_state: SubState::InProgress,
            status: MatchStatus::Waiting,
            outcome: None,
            history: Vec::new(),
        }
    }

    /// Match identifier.
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Symbol whose turn it is.
    pub fn current(&self) -> Symbol {
        self.current
    }

    /// Game phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Turn-level state.
    pub fn sub_state(&self) -> SubState {
        self.sub_state
    }

    /// Lifecycle status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Result, once finished.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Winning player, once finished.
    pub fn winner(&self) -> Option<&Player> {
        self.outcome.and_then(|o| self.player(o.winner))
    }

    /// Committed actions in order.
    pub fn history(&self) -> &[Ply] {
        &self.history
    }

    /// The player seated as `symbol`, if any.
    pub fn player(&self, symbol: Symbol) -> Option<&Player> {
        match symbol {
            Symbol::X => Some(&self.first),
            Symbol::O => self.second.as_ref(),
        }
    }

    /// Seated players, `X` first.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        std::iter::once(&self.first).chain(self.second.as_ref())
    }

    /// Player whose turn it is.
    pub fn current_player(&self) -> Option<&Player> {
        self.player(self.current)
    }

    /// Symbol held by `name`, if seated here.
    pub fn seat_of(&self, name: &str) -> Option<Symbol> {
        self.players()
            .find(|p| p.name() == name)
            .map(Player::symbol)
    }

    /// True if `name` holds a seat.
    pub fn has_player(&self, name: &str) -> bool {
        self.seat_of(name).is_some()
    }

    /// True if no further commands are accepted.
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    /// Seats `name` as `O` and starts the match.
    #[instrument(skip(self), fields(id = self.id))]
    pub fn join(&mut self, name: &str) -> Result<(), RuleViolation> {
        if self.second.is_some() {
            warn!("Join rejected, match full");
            return Err(RuleViolation::MatchFull);
        }
        if self.status != MatchStatus::Waiting {
            return Err(RuleViolation::WrongStatus {
                required: MatchStatus::Waiting,
                actual: self.status,
            });
        }
        if self.first.name() == name {
            return Err(RuleViolation::AlreadySeated(name.to_string()));
        }

        self.second = Some(Player::new(name, Symbol::O));
        self.status = MatchStatus::Active;
        info!(first = %self.first.name(), second = %name, "Match started");
        self.check_invariants();
        Ok(())
    }

    /// Places a piece for the current player.
    #[instrument(skip(self), fields(id = self.id, player = %self.current))]
    pub fn place_piece(&mut self, position: Position) -> Result<Transition, RuleViolation> {
        LegalPlacement::check(position, self)?;
        let before = self.debug_copy();

        let symbol = self.current;
        let (board, player) = self.board_and_seat(symbol)?;
        board.place(position, player)?;
        self.history.push(Ply {
            player: symbol,
            action: Action::Place { position },
        });
        info!(%position, "Piece placed");

        let transition = self.after_landing(position);
        self.check_post(before.as_ref());
        Ok(transition)
    }

    /// Moves (or flies) a piece of the current player.
    #[instrument(skip(self), fields(id = self.id, player = %self.current))]
    pub fn move_piece(
        &mut self,
        from: Position,
        to: Position,
    ) -> Result<Transition, RuleViolation> {
        LegalMove::check(from, to, self)?;
        let before = self.debug_copy();

        let symbol = self.current;
        let can_fly = self.can_fly(symbol);
        self.board.move_piece(from, to, symbol, can_fly)?;
        self.history.push(Ply {
            player: symbol,
            action: Action::Move { from, to },
        });
        info!(%from, %to, can_fly, "Piece moved");

        let transition = self.after_landing(to);
        self.check_post(before.as_ref());
        Ok(transition)
    }

    /// Removes an opponent piece after the current player closed a mill.
    #[instrument(skip(self), fields(id = self.id, player = %self.current))]
    pub fn capture_opponent_piece(
        &mut self,
        position: Position,
    ) -> Result<Transition, RuleViolation> {
        LegalCapture::check(position, self)?;
        let before = self.debug_copy();

        let symbol = self.current;
        let victim = symbol.opponent();
        let (board, opponent) = self.board_and_seat(victim)?;
        board.remove(position, opponent)?;
        self.history.push(Ply {
            player: symbol,
            action: Action::Capture { position },
        });
        self.sub_state = SubState::InProgress;
        info!(%position, "Piece captured");

        let attrition = self
            .player(victim)
            .is_some_and(|p| p.has_placed_all() && p.pieces_on_board() <= LOSING_PIECES);
        let transition = if attrition {
            self.finish(symbol, FinishReason::Attrition)
        } else {
            self.pass_turn()
        };
        self.check_post(before.as_ref());
        Ok(transition)
    }

    /// Applies any action for the current player.
    pub fn apply(&mut self, action: Action) -> Result<Transition, RuleViolation> {
        match action {
            Action::Place { position } => self.place_piece(position),
            Action::Move { from, to } => self.move_piece(from, to),
            Action::Capture { position } => self.capture_opponent_piece(position),
        }
    }

    /// Ends an active match, awarding the win to the other seat.
    #[instrument(skip(self), fields(id = self.id))]
    pub fn forfeit(&mut self, loser: Symbol) -> Result<Outcome, RuleViolation> {
        if self.status != MatchStatus::Active {
            return Err(RuleViolation::WrongStatus {
                required: MatchStatus::Active,
                actual: self.status,
            });
        }
        self.finish(loser.opponent(), FinishReason::Forfeit);
        self.check_invariants();
        Ok(Outcome {
            winner: loser.opponent(),
            reason: FinishReason::Forfeit,
        })
    }

    /// Records whether `name`'s client is attached. Returns their symbol.
    #[instrument(skip(self), fields(id = self.id))]
    pub fn set_connection(
        &mut self,
        name: &str,
        connection: Connection,
    ) -> Result<Symbol, RuleViolation> {
        let symbol = self
            .seat_of(name)
            .ok_or_else(|| RuleViolation::NotInMatch(name.to_string()))?;
        self.board_and_seat(symbol)?.1.set_connection(connection);
        debug!(%symbol, %connection, "Connection updated");
        Ok(symbol)
    }

    /// Checks whether `symbol` may fly right now.
    pub fn can_fly(&self, symbol: Symbol) -> bool {
        self.player(symbol).is_some_and(Player::can_fly)
    }

    /// Mill check after a placement or move landed on `position`.
    fn after_landing(&mut self, position: Position) -> Transition {
        if !self.board.forms_mill(position, self.current) {
            return self.pass_turn();
        }
        if self.board.count(self.current.opponent()) == 0 {
            debug!(%position, "Mill formed with nothing to capture");
            return self.pass_turn();
        }
        self.sub_state = SubState::AwaitingCapture;
        info!(%position, "Mill formed");
        Transition::MillFormed
    }

    /// Hands the turn over, then re-checks phase and end conditions.
    fn pass_turn(&mut self) -> Transition {
        let mover = self.current;
        self.current = mover.opponent();

        let was = self.phase;
        if self.phase == Phase::Placement && self.players().all(Player::has_placed_all) {
            self.phase = Phase::Movement;
            info!("Placement complete, movement begins");
        }
        let phase_changed = was != self.phase;

        if phase_changed {
            // Captures during placement can leave a side short once it is over
            for symbol in [self.current, mover] {
                if self
                    .player(symbol)
                    .is_some_and(|p| p.pieces_on_board() <= LOSING_PIECES)
                {
                    return self.finish(symbol.opponent(), FinishReason::Attrition);
                }
            }
        }

        if self.phase == Phase::Movement
            && !self.board.has_any_move(self.current, self.can_fly(self.current))
        {
            info!(blocked = %self.current, "No legal move");
            return self.finish(mover, FinishReason::Blocked);
        }

        debug!(next = %self.current, phase = %self.phase, "Turn passed");
        Transition::TurnPassed {
            next: self.current,
            phase_changed,
        }
    }

    fn finish(&mut self, winner: Symbol, reason: FinishReason) -> Transition {
        self.status = MatchStatus::Finished;
        self.sub_state = SubState::Finished;
        self.outcome = Some(Outcome { winner, reason });
        info!(%winner, %reason, "Match finished");
        Transition::Finished { winner, reason }
    }

    fn board_and_seat(
        &mut self,
        symbol: Symbol,
    ) -> Result<(&mut Board, &mut Player), RuleViolation> {
        let player = match symbol {
            Symbol::X => &mut self.first,
            Symbol::O => self.second.as_mut().ok_or(RuleViolation::WrongStatus {
                required: MatchStatus::Active,
                actual: MatchStatus::Waiting,
            })?,
        };
        Ok((&mut self.board, player))
    }

    fn debug_copy(&self) -> Option<Match> {
        cfg!(debug_assertions).then(|| self.clone())
    }

    fn check_post(&self, before: Option<&Match>) {
        let Some(before) = before else {
            return;
        };
        let result = ActionContract::post(before, self);
        if let Err(e) = &result {
            error!(error = %e, "Postcondition failed");
        }
        debug_assert!(result.is_ok(), "Postcondition failed after committed action");
    }

    fn check_invariants(&self) {
        if cfg!(debug_assertions) {
            self.check_post(Some(self));
        }
    }

    /// Puts pieces straight onto the board, bypassing turn order.
    #[cfg(test)]
    pub(crate) fn force_place(&mut self, symbol: Symbol, positions: &[Position]) {
        for pos in positions {
            let (board, player) = self.board_and_seat(symbol).expect("seat");
            board.place(*pos, player).expect("free point");
        }
    }

    /// Takes pieces straight off the board, bypassing capture rules.
    #[cfg(test)]
    pub(crate) fn force_remove(&mut self, symbol: Symbol, positions: &[Position]) {
        for pos in positions {
            let (board, player) = self.board_and_seat(symbol).expect("seat");
            board.remove(*pos, player).expect("own piece");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Position::*;

    fn active() -> Match {
        let mut game = Match::new(1, "ana");
        game.join("bo").unwrap();
        game
    }

    #[test]
    fn test_new_match_waits_for_opponent() {
        let game = Match::new(7, "ana");
        assert_eq!(game.status(), MatchStatus::Waiting);
        assert_eq!(game.player(Symbol::X).map(Player::name), Some("ana"));
        assert!(game.player(Symbol::O).is_none());
    }

    #[test]
    fn test_commands_rejected_while_waiting() {
        let mut game = Match::new(1, "ana");
        let before = game.clone();
        assert!(matches!(
            game.place_piece(A1),
            Err(RuleViolation::WrongStatus { .. })
        ));
        assert_eq!(game, before);
    }

    #[test]
    fn test_join_rules() {
        let mut game = Match::new(1, "ana");
        assert_eq!(
            game.join("ana"),
            Err(RuleViolation::AlreadySeated("ana".into()))
        );
        game.join("bo").unwrap();
        assert_eq!(game.status(), MatchStatus::Active);
        assert_eq!(game.join("cy"), Err(RuleViolation::MatchFull));
    }

    #[test]
    fn test_placement_alternates() {
        let mut game = active();
        assert_eq!(
            game.place_piece(A1),
            Ok(Transition::TurnPassed {
                next: Symbol::O,
                phase_changed: false
            })
        );
        assert_eq!(game.current(), Symbol::O);
        assert_eq!(game.place_piece(A1), Err(RuleViolation::Occupied(A1)));
        assert_eq!(game.current(), Symbol::O);
    }

    #[test]
    fn test_move_rejected_during_placement() {
        let mut game = active();
        game.place_piece(A1).unwrap();
        assert_eq!(
            game.move_piece(D1, G1),
            Err(RuleViolation::WrongPhase(Phase::Placement))
        );
    }

    #[test]
    fn test_capture_requires_pending_mill() {
        let mut game = active();
        game.place_piece(A1).unwrap();
        assert_eq!(
            game.capture_opponent_piece(A1),
            Err(RuleViolation::NoCapturePending)
        );
    }

    #[test]
    fn test_forfeit_finishes_active_match() {
        let mut game = active();
        let outcome = game.forfeit(Symbol::X).unwrap();
        assert_eq!(outcome.winner, Symbol::O);
        assert_eq!(game.status(), MatchStatus::Finished);
        assert_eq!(game.sub_state(), SubState::Finished);
        assert_eq!(game.winner().map(Player::name), Some("bo"));
        assert!(game.forfeit(Symbol::O).is_err());
    }

    #[test]
    fn test_set_connection_unknown_player() {
        let mut game = active();
        assert_eq!(
            game.set_connection("zed", Connection::Disconnected),
            Err(RuleViolation::NotInMatch("zed".into()))
        );
        assert_eq!(
            game.set_connection("bo", Connection::Disconnected),
            Ok(Symbol::O)
        );
        assert_eq!(
            game.player(Symbol::O).map(Player::connection),
            Some(Connection::Disconnected)
        );
    }

    /// X on A1 D1 G1 A4 with every exit but A7 taken by O.
    fn nearly_blocked() -> Match {
        let mut game = active();
        game.force_place(Symbol::X, &[A1, D1, G1, A4]);
        game.force_place(Symbol::O, &[D2, G4, B4, D7]);
        game.phase = Phase::Movement;
        game.current = Symbol::O;
        game
    }

    #[test]
    fn test_move_that_blocks_opponent_wins() {
        let mut game = nearly_blocked();
        assert_eq!(
            game.move_piece(D7, A7),
            Ok(Transition::Finished {
                winner: Symbol::O,
                reason: FinishReason::Blocked
            })
        );
        assert_eq!(game.status(), MatchStatus::Finished);
        assert_eq!(
            game.move_piece(A7, D7),
            Err(RuleViolation::WrongStatus {
                required: MatchStatus::Active,
                actual: MatchStatus::Finished,
            })
        );
    }

    #[test]
    fn test_move_leaving_exit_keeps_game_going() {
        let mut game = nearly_blocked();
        assert!(matches!(
            game.move_piece(D7, G7),
            Ok(Transition::TurnPassed { next: Symbol::X, .. })
        ));
        assert_eq!(game.status(), MatchStatus::Active);
    }

    #[test]
    fn test_flying_versus_adjacent_on_same_board() {
        let mut flying = active();
        flying.force_place(Symbol::X, &[A1, C3, G7]);
        flying.force_place(Symbol::O, &[D2, B4, F6, D5]);
        flying.phase = Phase::Movement;

        let mut grounded = flying.clone();
        grounded.force_place(Symbol::X, &[E5]);

        assert!(flying.can_fly(Symbol::X));
        assert!(!grounded.can_fly(Symbol::X));
        assert!(flying.move_piece(A1, E4).is_ok());
        assert_eq!(
            grounded.move_piece(A1, E4),
            Err(RuleViolation::NotAdjacent { from: A1, to: E4 })
        );
        assert!(grounded.move_piece(A1, D1).is_ok());
    }

    #[test]
    fn test_capture_to_two_after_placement_wins() {
        let mut game = active();
        game.force_place(Symbol::O, &[C3, E5, G7, B2, F2, D3, E3, F4, F6]);
        game.force_remove(Symbol::O, &[B2, F2, D3, E3, F4, F6]);
        game.force_place(Symbol::X, &[A1, D1, G4, B6]);
        game.phase = Phase::Movement;

        assert_eq!(game.move_piece(G4, G1), Ok(Transition::MillFormed));
        assert_eq!(
            game.capture_opponent_piece(C3),
            Ok(Transition::Finished {
                winner: Symbol::X,
                reason: FinishReason::Attrition
            })
        );
        assert_eq!(game.winner().map(Player::name), Some("ana"));
    }

    #[test]
    fn test_last_placement_ends_match_for_short_side() {
        let mut game = active();
        game.force_place(Symbol::X, &[A1, D1, B2, D2, C3, D3, A4, B4, C4]);
        game.force_remove(Symbol::X, &[A1, D1, B2, D2, C3, D3, A4]);
        game.force_place(Symbol::O, &[E3, F2, G1, E5, F6, G7, D5, D7]);
        game.current = Symbol::O;

        assert_eq!(
            game.place_piece(B6),
            Ok(Transition::Finished {
                winner: Symbol::O,
                reason: FinishReason::Attrition
            })
        );
        assert_eq!(game.phase(), Phase::Movement);
        assert_eq!(game.winner().map(Player::name), Some("bo"));
    }

    #[test]
    fn test_blocked_when_movement_begins() {
        let mut game = active();
        game.force_place(Symbol::X, &[A1, D1, G1, A4, B2, C5, E3, F4, F2]);
        game.force_remove(Symbol::X, &[B2, C5, E3, F4, F2]);
        game.force_place(Symbol::O, &[D2, G4, B4, E5, F6, D6, C3, G7]);
        game.current = Symbol::O;

        assert_eq!(
            game.place_piece(A7),
            Ok(Transition::Finished {
                winner: Symbol::O,
                reason: FinishReason::Blocked
            })
        );
        assert!(!game.can_fly(Symbol::X));
    }

    #[test]
    fn test_capture_from_mill_when_every_piece_is_in_one() {
        let mut game = active();
        game.force_place(Symbol::O, &[A7, D7, G7, B2, F2, D3, E3, F4, C5]);
        game.force_remove(Symbol::O, &[B2, F2, D3, E3, F4, C5]);
        game.force_place(Symbol::X, &[A1, D1, G4, B6]);
        game.phase = Phase::Movement;

        assert!(game.board().all_pieces_in_mills(Symbol::O));
        assert_eq!(game.move_piece(G4, G1), Ok(Transition::MillFormed));
        assert_eq!(
            game.capture_opponent_piece(D7),
            Ok(Transition::Finished {
                winner: Symbol::X,
                reason: FinishReason::Attrition
            })
        );
        assert_eq!(game.board().count(Symbol::O), 2);
    }

    #[test]
    fn test_mill_with_no_opponent_pieces_passes_turn() {
        let mut game = active();
        game.force_place(Symbol::X, &[A1, D1]);
        assert!(matches!(
            game.place_piece(G1),
            Ok(Transition::TurnPassed { next: Symbol::O, .. })
        ));
        assert_eq!(game.sub_state(), SubState::InProgress);
    }
}
