//! Storage seams used by the registry and the account service.

use derive_getters::Getters;
use derive_new::new;
use morris_rules::{Match, MatchId};
use std::collections::BTreeMap;

use crate::db::{Account, StoreError};

/// Win count per player name.
pub type Ranking = BTreeMap<String, u32>;

/// A restored match together with the sequence number of the last event
/// published for it before the snapshot was written.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct SavedMatch {
    game: Match,
    last_sequence: u64,
}

impl SavedMatch {
    /// Splits into the match and its event sequence.
    pub fn into_parts(self) -> (Match, u64) {
        (self.game, self.last_sequence)
    }
}

/// Durable home for match snapshots and the ranking table.
///
/// Snapshot writes overwrite any earlier snapshot with the same id.
pub trait MatchStore: Send + Sync + std::fmt::Debug {
    /// Upserts the full state of `game` and the sequence number its event
    /// log will have reached once the caller publishes.
    fn save_match(&self, game: &Match, last_sequence: u64) -> Result<(), StoreError>;

    /// Removes the snapshot for `id`. Missing ids are not an error.
    fn delete_match(&self, id: MatchId) -> Result<(), StoreError>;

    /// Loads every stored snapshot, ordered by id.
    fn load_matches(&self) -> Result<Vec<SavedMatch>, StoreError>;

    /// Replaces the whole ranking table.
    fn save_ranking(&self, ranking: &Ranking) -> Result<(), StoreError>;

    /// Loads the ranking table.
    fn load_ranking(&self) -> Result<Ranking, StoreError>;
}

/// Durable home for player accounts.
pub trait AccountStore: Send + Sync + std::fmt::Debug {
    /// Inserts an account. Returns `None` if the name is already taken.
    fn create_account(
        &self,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Looks an account up by name.
    fn find_account(&self, name: &str) -> Result<Option<Account>, StoreError>;
}
