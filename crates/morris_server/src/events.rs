//! Event broadcasting.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: a full
//! queue drops the event for that subscriber only, a closed queue removes
//! the subscriber. Each match also keeps a short log so that a client can
//! resume from the last sequence number it saw.

use morris_rules::{FinishReason, MatchId, Phase, Position, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, instrument, warn};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A lobby opened, filled, closed or a match finished.
    LobbyListChanged,
    /// The second seat was filled.
    MatchStarted {
        /// Player seated as `X`.
        first: String,
        /// Player seated as `O`.
        second: String,
    },
    /// The turn passed.
    TurnChanged {
        /// Symbol now to act.
        current: Symbol,
        /// Phase after the change.
        phase: Phase,
    },
    /// A piece entered the board.
    PiecePlaced {
        /// Owner of the piece.
        player: Symbol,
        /// Where it went.
        position: Position,
    },
    /// A piece slid or flew.
    PieceMoved {
        /// Owner of the piece.
        player: Symbol,
        /// Origin point.
        from: Position,
        /// Destination point.
        to: Position,
    },
    /// A piece was captured.
    PieceRemoved {
        /// Owner of the captured piece.
        owner: Symbol,
        /// Where it stood.
        position: Position,
    },
    /// The current player closed a mill and must capture.
    MillFormed {
        /// Player who closed it.
        player: Symbol,
    },
    /// A client went away.
    PlayerDisconnected {
        /// Player name.
        player: String,
    },
    /// A client came back.
    PlayerReconnected {
        /// Player name.
        player: String,
    },
    /// A winner was declared.
    GameWon {
        /// Winning player name.
        winner: String,
        /// Winning symbol.
        symbol: Symbol,
        /// How it was decided.
        reason: FinishReason,
    },
    /// No further commands will be accepted.
    GameOver,
}

/// An event tagged with its match and per-match sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Match the event belongs to.
    pub match_id: MatchId,
    /// Position in the match's event order, starting at 1.
    pub sequence: u64,
    /// Payload.
    pub kind: EventKind,
}

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Events of a single match.
    Match(MatchId),
    /// Events of every match.
    Global,
}

impl Topic {
    fn wants(&self, match_id: MatchId) -> bool {
        match self {
            Topic::Match(id) => *id == match_id,
            Topic::Global => true,
        }
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    receiver: mpsc::Receiver<MatchEvent>,
}

impl Subscription {
    /// Subscriber id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribed topic.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Waits for the next event. `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<MatchEvent> {
        self.receiver.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_next(&mut self) -> Option<MatchEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drains everything currently queued.
    pub fn drain(&mut self) -> Vec<MatchEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    topic: Topic,
    sender: mpsc::Sender<MatchEvent>,
}

#[derive(Debug, Default)]
struct MatchLog {
    last_sequence: u64,
    events: VecDeque<MatchEvent>,
}

/// Fan-out of match events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    logs: Mutex<HashMap<MatchId, MatchLog>>,
    next_subscriber: AtomicU64,
    subscriber_capacity: usize,
    log_capacity: usize,
}

impl EventBus {
    /// Creates a bus with the given per-subscriber queue size and
    /// per-match log length.
    #[instrument]
    pub fn new(subscriber_capacity: usize, log_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            logs: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
            subscriber_capacity: subscriber_capacity.max(1),
            log_capacity,
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn logs(&self) -> MutexGuard<'_, HashMap<MatchId, MatchLog>> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber for `topic`.
    #[instrument(skip(self))]
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        self.subscribers().push(Subscriber { id, topic, sender });
        debug!(subscriber = id, "Subscribed");
        Subscription {
            id,
            topic,
            receiver,
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Appends an event to the match log and offers it to every interested
    /// subscriber. Never blocks.
    #[instrument(skip(self, kind), fields(kind = %kind))]
    pub fn publish(&self, match_id: MatchId, kind: EventKind) -> MatchEvent {
        let event = {
            let mut logs = self.logs();
            let log = logs.entry(match_id).or_default();
            log.last_sequence += 1;
            let event = MatchEvent {
                match_id,
                sequence: log.last_sequence,
                kind,
            };
            if self.log_capacity > 0 {
                if log.events.len() == self.log_capacity {
                    log.events.pop_front();
                }
                log.events.push_back(event.clone());
            }
            event
        };

        self.subscribers().retain(|sub| {
            if !sub.topic.wants(match_id) {
                return true;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber = sub.id,
                        sequence = event.sequence,
                        "Subscriber queue full, event dropped"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = sub.id, "Subscriber gone, removing");
                    false
                }
            }
        });
        event
    }

    /// Logged events of `match_id` with a sequence greater than `after`.
    ///
    /// Only the most recent events are retained; a client that fell further
    /// behind should re-fetch the full match state.
    #[instrument(skip(self))]
    pub fn events_since(&self, match_id: MatchId, after: u64) -> Vec<MatchEvent> {
        self.logs()
            .get(&match_id)
            .map(|log| {
                log.events
                    .iter()
                    .filter(|e| e.sequence > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sequence number of the latest event of `match_id` (0 if none).
    pub fn last_sequence(&self, match_id: MatchId) -> u64 {
        self.logs().get(&match_id).map_or(0, |log| log.last_sequence)
    }

    /// Continues the numbering of `match_id` after `last_sequence`, as
    /// restored from storage. Never moves a sequence backwards.
    #[instrument(skip(self))]
    pub fn resume(&self, match_id: MatchId, last_sequence: u64) {
        let mut logs = self.logs();
        let log = logs.entry(match_id).or_default();
        log.last_sequence = log.last_sequence.max(last_sequence);
        debug!(resumed_at = log.last_sequence, "Sequence restored");
    }

    /// Drops the log of a match that no longer exists.
    #[instrument(skip(self))]
    pub fn forget(&self, match_id: MatchId) {
        if let Some(log) = self.logs().remove(&match_id) {
            debug!(dropped = log.events.len(), "Match log released");
        }
    }

    /// Number of matches with a log.
    pub fn tracked_matches(&self) -> usize {
        self.logs().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64, 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_filtering() {
        let bus = EventBus::new(8, 8);
        let mut one = bus.subscribe(Topic::Match(1));
        let mut all = bus.subscribe(Topic::Global);

        bus.publish(1, EventKind::GameOver);
        bus.publish(2, EventKind::LobbyListChanged);

        assert_eq!(one.drain().len(), 1);
        let global = all.drain();
        assert_eq!(global.len(), 2);
        assert_eq!(global[1].match_id, 2);
    }

    #[test]
    fn test_sequences_are_per_match() {
        let bus = EventBus::new(8, 8);
        assert_eq!(bus.publish(1, EventKind::GameOver).sequence, 1);
        assert_eq!(bus.publish(1, EventKind::GameOver).sequence, 2);
        assert_eq!(bus.publish(2, EventKind::GameOver).sequence, 1);
        assert_eq!(bus.last_sequence(1), 2);
        assert_eq!(bus.last_sequence(9), 0);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let bus = EventBus::new(1, 8);
        let mut slow = bus.subscribe(Topic::Match(1));
        let mut fast = bus.subscribe(Topic::Match(1));

        bus.publish(1, EventKind::LobbyListChanged);
        assert!(fast.try_next().is_some());
        bus.publish(1, EventKind::GameOver);

        assert_eq!(fast.try_next().map(|e| e.sequence), Some(2));
        let kept = slow.drain();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, EventKind::LobbyListChanged);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_dropped_subscription_is_removed() {
        let bus = EventBus::new(4, 8);
        let sub = bus.subscribe(Topic::Global);
        assert_eq!(sub.topic(), Topic::Global);
        drop(sub);
        bus.publish(1, EventKind::GameOver);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_events_since_is_bounded() {
        let bus = EventBus::new(4, 3);
        for _ in 0..5 {
            bus.publish(7, EventKind::LobbyListChanged);
        }
        let tail: Vec<u64> = bus.events_since(7, 0).iter().map(|e| e.sequence).collect();
        assert_eq!(tail, vec![3, 4, 5]);
        assert_eq!(bus.events_since(7, 4).len(), 1);
        assert!(bus.events_since(8, 0).is_empty());
    }

    #[test]
    fn test_resume_continues_numbering() {
        let bus = EventBus::new(4, 8);
        bus.resume(3, 41);
        assert_eq!(bus.publish(3, EventKind::GameOver).sequence, 42);
        bus.resume(3, 10);
        assert_eq!(bus.last_sequence(3), 42);
        assert_eq!(bus.events_since(3, 0).len(), 1);
    }

    #[test]
    fn test_forget_releases_log() {
        let bus = EventBus::new(4, 8);
        bus.publish(1, EventKind::GameOver);
        bus.publish(2, EventKind::GameOver);
        bus.forget(1);
        bus.forget(9);
        assert_eq!(bus.tracked_matches(), 1);
        assert!(bus.events_since(1, 0).is_empty());
        assert_eq!(bus.last_sequence(1), 0);
    }
}
