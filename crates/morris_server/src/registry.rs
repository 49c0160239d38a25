//! The match registry: creates, pairs and routes commands to matches.
//!
//! Each match sits behind its own mutex. A command holds that mutex for
//! validate, mutate, persist and publish, so two commands racing on one
//! match are strictly serialized and events leave in commit order.
//!
//! The map of matches has its own lock, held only to insert, look up,
//! remove or list. It is never held while a match lock is acquired; a
//! match lock holder may take it briefly to remove a dissolved lobby.
//!
//! Finished matches stay readable until more than `finished_capacity`
//! newer ones have finished, then they are dropped with their event log.

use derive_more::Display;
use morris_rules::{
    Action, Connection, Match, MatchId, MatchStatus, Ply, Position, RuleViolation, Symbol,
    Transition, UnknownPosition,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, instrument, warn};

use crate::db::{MatchStore, Ranking, StoreError};
use crate::events::{EventBus, EventKind, MatchEvent, Subscription, Topic};
use crate::snapshot::{MatchHandle, MatchSnapshot, MatchSummary};

/// Finished matches kept in memory by default.
pub const DEFAULT_FINISHED_CAPACITY: usize = 64;

/// `None` once a lobby has been dissolved or a finished match released.
type Slot = Arc<Mutex<Option<Match>>>;

/// Why a registry command failed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RegistryError {
    /// No match with this id.
    #[display("Match {} not found", _0)]
    MatchNotFound(MatchId),

    /// A position code names no board point.
    #[display("{}", _0)]
    UnknownPosition(UnknownPosition),

    /// The match refused the command. Nothing changed.
    #[display("{}", _0)]
    Rejected(RuleViolation),

    /// Player names must be non-empty.
    #[display("Player name must not be empty")]
    InvalidName,
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::UnknownPosition(e) => Some(e),
            RegistryError::Rejected(e) => Some(e),
            RegistryError::MatchNotFound(_) | RegistryError::InvalidName => None,
        }
    }
}

impl From<RuleViolation> for RegistryError {
    fn from(violation: RuleViolation) -> Self {
        Self::Rejected(violation)
    }
}

impl From<UnknownPosition> for RegistryError {
    fn from(err: UnknownPosition) -> Self {
        Self::UnknownPosition(err)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn valid_name(name: &str) -> Result<&str, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::InvalidName);
    }
    Ok(name)
}

/// Owns every match the server knows about.
#[derive(Debug)]
pub struct MatchRegistry {
    matches: Mutex<BTreeMap<MatchId, Slot>>,
    pairing: Mutex<()>,
    next_id: AtomicU64,
    ranking: Mutex<Ranking>,
    finished: Mutex<VecDeque<MatchId>>,
    finished_capacity: usize,
    store: Arc<dyn MatchStore>,
    events: Arc<EventBus>,
}

impl MatchRegistry {
    /// Builds a registry from whatever `store` holds. The id counter
    /// resumes above the highest stored id and each restored match keeps
    /// numbering its events where it left off.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if snapshots or the ranking cannot be read.
    #[instrument(skip(store, events))]
    pub fn new(store: Arc<dyn MatchStore>, events: Arc<EventBus>) -> Result<Self, StoreError> {
        let stored = store.load_matches()?;
        let ranking = store.load_ranking()?;

        let next_id = stored
            .iter()
            .map(|saved| saved.game().id())
            .max()
            .map_or(1, |max| max + 1);
        let mut matches = BTreeMap::new();
        for saved in stored {
            let (game, last_sequence) = saved.into_parts();
            if game.is_finished() {
                debug!(id = game.id(), "Skipping finished snapshot");
                continue;
            }
            events.resume(game.id(), last_sequence);
            matches.insert(game.id(), Arc::new(Mutex::new(Some(game))));
        }

        info!(
            restored = matches.len(),
            ranked = ranking.len(),
            next_id,
            "Registry ready"
        );
        Ok(Self {
            matches: Mutex::new(matches),
            pairing: Mutex::new(()),
            next_id: AtomicU64::new(next_id),
            ranking: Mutex::new(ranking),
            finished: Mutex::new(VecDeque::new()),
            finished_capacity: DEFAULT_FINISHED_CAPACITY,
            store,
            events,
        })
    }

    /// Sets how many finished matches stay queryable.
    pub fn with_finished_capacity(mut self, capacity: usize) -> Self {
        self.finished_capacity = capacity;
        self
    }

    /// The bus events are published on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Whether match `id` exists.
    pub fn contains(&self, id: MatchId) -> bool {
        lock(&self.matches).contains_key(&id)
    }

    /// Number of matches held in memory, finished ones included.
    pub fn match_count(&self) -> usize {
        lock(&self.matches).len()
    }

    fn slot(&self, id: MatchId) -> Result<Slot, RegistryError> {
        lock(&self.matches).get(&id).cloned().ok_or_else(|| {
            debug!(id, "Match not found");
            RegistryError::MatchNotFound(id)
        })
    }

    /// Copies the map so match locks can be taken without the map lock.
    fn slots(&self) -> Vec<(MatchId, Slot)> {
        lock(&self.matches)
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    //  Lobby
    // ─────────────────────────────────────────────────────────────

    /// Pairs `name` with the oldest lobby held by someone else, or opens a
    /// new lobby if there is none.
    #[instrument(skip(self))]
    pub fn create_or_join(&self, name: &str) -> Result<MatchHandle, RegistryError> {
        let name = valid_name(name)?;
        let _pairing = lock(&self.pairing);

        for (id, slot) in self.slots() {
            let mut guard = lock(&slot);
            let Some(game) = guard.as_mut() else {
                continue;
            };
            if game.status() != MatchStatus::Waiting || game.has_player(name) {
                continue;
            }
            if let Err(e) = game.join(name) {
                debug!(id, error = %e, "Lobby not joinable");
                continue;
            }
            info!(id, "Paired with waiting lobby");
            self.after_join(game);
            return Ok(MatchHandle::new(id, name.to_string(), Symbol::O));
        }

        self.create_match(name)
    }

    /// Opens a new lobby with `name` seated as `X`.
    #[instrument(skip(self))]
    pub fn create_match(&self, name: &str) -> Result<MatchHandle, RegistryError> {
        let name = valid_name(name)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let slot: Slot = Arc::new(Mutex::new(None));

        // Hold the new match's lock until its first event is out
        let mut guard = lock(&slot);
        let game = guard.insert(Match::new(id, name));
        self.persist(game, 1);
        lock(&self.matches).insert(id, Arc::clone(&slot));
        self.events.publish(id, EventKind::LobbyListChanged);

        info!(id, "Lobby opened");
        Ok(MatchHandle::new(id, name.to_string(), Symbol::X))
    }

    /// Matches that are not finished, in id order.
    #[instrument(skip(self))]
    pub fn list_open_matches(&self) -> Vec<MatchSummary> {
        let open: Vec<_> = self
            .slots()
            .into_iter()
            .filter_map(|(_, slot)| {
                lock(&slot)
                    .as_ref()
                    .filter(|game| !game.is_finished())
                    .map(MatchSummary::from)
            })
            .collect();
        debug!(count = open.len(), "Listed open matches");
        open
    }

    /// Seats `name` in lobby `id`. Capacity and status are re-checked under
    /// the match lock, so a client acting on a stale list is refused.
    #[instrument(skip(self))]
    pub fn join_match(&self, id: MatchId, name: &str) -> Result<MatchHandle, RegistryError> {
        let name = valid_name(name)?;
        let slot = self.slot(id)?;
        let mut guard = lock(&slot);
        let game = guard.as_mut().ok_or(RegistryError::MatchNotFound(id))?;

        game.join(name).inspect_err(|e| {
            warn!(id, error = %e, "Join rejected");
        })?;
        self.after_join(game);
        Ok(MatchHandle::new(id, name.to_string(), Symbol::O))
    }

    fn after_join(&self, game: &Match) {
        let mut kinds = Vec::with_capacity(2);
        let first = game.player(Symbol::X).map(|p| p.name().to_string());
        let second = game.player(Symbol::O).map(|p| p.name().to_string());
        if let (Some(first), Some(second)) = (first, second) {
            kinds.push(EventKind::MatchStarted { first, second });
        }
        kinds.push(EventKind::LobbyListChanged);
        self.persist(game, kinds.len());
        self.publish_all(game.id(), kinds);
    }

    // ─────────────────────────────────────────────────────────────
    //  Gameplay
    // ─────────────────────────────────────────────────────────────

    /// Places a piece for the player whose turn it is.
    #[instrument(skip(self))]
    pub fn place_piece(
        &self,
        id: MatchId,
        position: Position,
    ) -> Result<Transition, RegistryError> {
        self.command(id, |game| game.place_piece(position))
    }

    /// Moves a piece for the player whose turn it is.
    #[instrument(skip(self))]
    pub fn move_piece(
        &self,
        id: MatchId,
        from: Position,
        to: Position,
    ) -> Result<Transition, RegistryError> {
        self.command(id, |game| game.move_piece(from, to))
    }

    /// Captures an opponent piece after a mill.
    #[instrument(skip(self))]
    pub fn capture_opponent_piece(
        &self,
        id: MatchId,
        position: Position,
    ) -> Result<Transition, RegistryError> {
        self.command(id, |game| game.capture_opponent_piece(position))
    }

    /// Runs one gameplay command inside the match's critical section.
    fn command(
        &self,
        id: MatchId,
        apply: impl FnOnce(&mut Match) -> Result<Transition, RuleViolation>,
    ) -> Result<Transition, RegistryError> {
        let slot = self.slot(id)?;
        let mut guard = lock(&slot);
        let game = guard.as_mut().ok_or(RegistryError::MatchNotFound(id))?;

        let transition = apply(game).inspect_err(|e| {
            warn!(id, error = %e, "Command rejected");
        })?;

        let mut kinds: Vec<EventKind> =
            game.history().last().map(ply_event).into_iter().collect();
        match transition {
            Transition::MillFormed => kinds.push(EventKind::MillFormed {
                player: game.current(),
            }),
            Transition::TurnPassed { next, .. } => kinds.push(EventKind::TurnChanged {
                current: next,
                phase: game.phase(),
            }),
            Transition::Finished { .. } => kinds.extend(winner_events(game)),
        }

        let finished = game.is_finished();
        if finished {
            self.retire(game);
        } else {
            self.persist(game, kinds.len());
        }
        self.publish_all(id, kinds);
        drop(guard);

        if finished {
            self.release_finished(id);
        }
        Ok(transition)
    }

    fn publish_all(&self, id: MatchId, kinds: Vec<EventKind>) {
        for kind in kinds {
            self.events.publish(id, kind);
        }
    }

    /// Queues a newly finished match and releases the oldest ones beyond
    /// capacity. Called without any match lock held.
    fn release_finished(&self, id: MatchId) {
        let released: Vec<MatchId> = {
            let mut finished = lock(&self.finished);
            finished.push_back(id);
            let excess = finished.len().saturating_sub(self.finished_capacity);
            finished.drain(..excess).collect()
        };
        for old in released {
            let slot = lock(&self.matches).remove(&old);
            if let Some(slot) = slot {
                // Late callers holding the slot see the match as gone
                *lock(&slot) = None;
            }
            self.events.forget(old);
            debug!(id = old, "Finished match released");
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Queries
    // ─────────────────────────────────────────────────────────────

    /// Full state of match `id`. Two calls with no command in between
    /// return equal snapshots.
    #[instrument(skip(self))]
    pub fn match_state(&self, id: MatchId) -> Result<MatchSnapshot, RegistryError> {
        let slot = self.slot(id)?;
        let guard = lock(&slot);
        let game = guard.as_ref().ok_or(RegistryError::MatchNotFound(id))?;
        Ok(MatchSnapshot::capture(game, self.events.last_sequence(id)))
    }

    /// Win count per player.
    #[instrument(skip(self))]
    pub fn ranking(&self) -> Ranking {
        lock(&self.ranking).clone()
    }

    /// Unfinished matches `name` holds a seat in, such as those restored
    /// after a restart.
    #[instrument(skip(self))]
    pub fn saved_matches_for(&self, name: &str) -> Vec<MatchSummary> {
        self.slots()
            .into_iter()
            .filter_map(|(_, slot)| {
                lock(&slot)
                    .as_ref()
                    .filter(|game| !game.is_finished() && game.has_player(name.trim()))
                    .map(MatchSummary::from)
            })
            .collect()
    }

    /// Logged events of match `id` after sequence `after`.
    #[instrument(skip(self))]
    pub fn events_since(&self, id: MatchId, after: u64) -> Result<Vec<MatchEvent>, RegistryError> {
        self.slot(id)?;
        Ok(self.events.events_since(id, after))
    }

    /// Subscribes to one match or to every match.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.events.subscribe(topic)
    }

    // ─────────────────────────────────────────────────────────────
    //  Connections
    // ─────────────────────────────────────────────────────────────

    /// Handles a client going away.
    ///
    /// - Lobby: the lobby is dissolved.
    /// - Active match: the opponent wins by forfeit.
    /// - Finished match: only the connection state changes.
    #[instrument(skip(self))]
    pub fn disconnect(&self, name: &str, id: MatchId) -> Result<(), RegistryError> {
        let name = valid_name(name)?;
        let slot = self.slot(id)?;
        let mut guard = lock(&slot);
        let game = guard.as_mut().ok_or(RegistryError::MatchNotFound(id))?;

        let symbol = game.set_connection(name, Connection::Disconnected)?;
        let left = EventKind::PlayerDisconnected {
            player: name.to_string(),
        };
        match game.status() {
            MatchStatus::Waiting => {
                *guard = None;
                lock(&self.matches).remove(&id);
                if let Err(e) = self.store.delete_match(id) {
                    error!(id, error = %e, "Failed to delete lobby snapshot");
                }
                self.publish_all(id, vec![left, EventKind::LobbyListChanged]);
                self.events.forget(id);
                info!(id, "Lobby dissolved");
            }
            MatchStatus::Active => {
                game.forfeit(symbol)?;
                self.retire(game);
                let mut kinds = vec![left];
                kinds.extend(winner_events(game));
                self.publish_all(id, kinds);
                drop(guard);
                self.release_finished(id);
                info!(id, loser = %symbol, "Match forfeited");
            }
            MatchStatus::Finished => {
                self.events.publish(id, left);
            }
        }
        Ok(())
    }

    /// Marks `name` connected again. Missed events are not replayed; the
    /// client re-fetches state or calls `events_since`.
    #[instrument(skip(self))]
    pub fn reconnect(&self, name: &str, id: MatchId) -> Result<(), RegistryError> {
        let name = valid_name(name)?;
        let slot = self.slot(id)?;
        let mut guard = lock(&slot);
        let game = guard.as_mut().ok_or(RegistryError::MatchNotFound(id))?;

        game.set_connection(name, Connection::Connected)?;
        if !game.is_finished() {
            self.persist(game, 1);
        }
        self.events.publish(
            id,
            EventKind::PlayerReconnected {
                player: name.to_string(),
            },
        );
        info!(id, "Player reconnected");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    //  Persistence
    // ─────────────────────────────────────────────────────────────

    /// Writes the snapshot together with the sequence the match log will
    /// reach once `pending` more events are published. Failure is logged;
    /// memory stays authoritative.
    fn persist(&self, game: &Match, pending: usize) {
        let last_sequence = self.events.last_sequence(game.id()) + pending as u64;
        if let Err(e) = self.store.save_match(game, last_sequence) {
            error!(id = game.id(), error = %e, "Snapshot write failed");
        }
    }

    /// Drops the snapshot of a finished match and credits the winner.
    fn retire(&self, game: &Match) {
        if let Err(e) = self.store.delete_match(game.id()) {
            error!(id = game.id(), error = %e, "Failed to delete finished snapshot");
        }
        if let Some(winner) = game.winner() {
            self.record_win(winner.name());
        }
    }

    fn record_win(&self, name: &str) {
        let mut ranking = lock(&self.ranking);
        *ranking.entry(name.to_string()).or_default() += 1;
        debug!(player = %name, wins = ranking.get(name).copied().unwrap_or_default(), "Win recorded");
        if let Err(e) = self.store.save_ranking(&ranking) {
            error!(error = %e, "Ranking write failed");
        }
    }
}

fn ply_event(ply: &Ply) -> EventKind {
    match ply.action {
        Action::Place { position } => EventKind::PiecePlaced {
            player: ply.player,
            position,
        },
        Action::Move { from, to } => EventKind::PieceMoved {
            player: ply.player,
            from,
            to,
        },
        Action::Capture { position } => EventKind::PieceRemoved {
            owner: ply.player.opponent(),
            position,
        },
    }
}

/// Terminal events of a finished match.
fn winner_events(game: &Match) -> Vec<EventKind> {
    let (Some(outcome), Some(winner)) = (game.outcome(), game.winner()) else {
        return Vec::new();
    };
    vec![
        EventKind::GameWon {
            winner: winner.name().to_string(),
            symbol: outcome.winner,
            reason: outcome.reason,
        },
        EventKind::GameOver,
        EventKind::LobbyListChanged,
    ]
}
