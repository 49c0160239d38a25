//! In-memory store for tests and ephemeral servers.

use morris_rules::{Match, MatchId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::db::{Account, AccountStore, MatchStore, Ranking, SavedMatch, StoreError};

#[derive(Debug, Default)]
struct Tables {
    snapshots: BTreeMap<MatchId, (String, u64)>,
    ranking: Ranking,
    accounts: BTreeMap<String, Account>,
}

/// Keeps everything in process memory. Snapshots are still JSON-encoded so
/// that a round trip behaves like the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.tables().snapshots.len()
    }

    /// Overwrites the raw stored state of `id`, bypassing encoding.
    pub fn put_raw_snapshot(&self, id: MatchId, state: impl Into<String>, last_sequence: u64) {
        self.tables()
            .snapshots
            .insert(id, (state.into(), last_sequence));
    }
}

impl MatchStore for MemoryStore {
    #[instrument(skip(self, game), fields(id = game.id()))]
    fn save_match(&self, game: &Match, last_sequence: u64) -> Result<(), StoreError> {
        let state = serde_json::to_string(game)?;
        self.tables()
            .snapshots
            .insert(game.id(), (state, last_sequence));
        debug!(last_sequence, "Snapshot saved");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_match(&self, id: MatchId) -> Result<(), StoreError> {
        self.tables().snapshots.remove(&id);
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_matches(&self) -> Result<Vec<SavedMatch>, StoreError> {
        let tables = self.tables();
        let mut matches = Vec::with_capacity(tables.snapshots.len());
        for (id, (state, last_sequence)) in &tables.snapshots {
            match serde_json::from_str(state) {
                Ok(game) => matches.push(SavedMatch::new(game, *last_sequence)),
                Err(e) => warn!(id, error = %e, "Skipping unreadable snapshot"),
            }
        }
        info!(count = matches.len(), "Snapshots loaded");
        Ok(matches)
    }

    #[instrument(skip(self, ranking))]
    fn save_ranking(&self, ranking: &Ranking) -> Result<(), StoreError> {
        self.tables().ranking = ranking.clone();
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_ranking(&self) -> Result<Ranking, StoreError> {
        Ok(self.tables().ranking.clone())
    }
}

impl AccountStore for MemoryStore {
    #[instrument(skip(self, password_hash))]
    fn create_account(
        &self,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, StoreError> {
        let mut tables = self.tables();
        if tables.accounts.contains_key(name) {
            return Ok(None);
        }
        let id = i32::try_from(tables.accounts.len() + 1)
            .map_err(|_| StoreError::new("Account table full"))?;
        let account = Account::new(
            id,
            name.to_string(),
            password_hash.to_string(),
            chrono::Utc::now().naive_utc(),
        );
        tables.accounts.insert(name.to_string(), account.clone());
        Ok(Some(account))
    }

    #[instrument(skip(self))]
    fn find_account(&self, name: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.tables().accounts.get(name).cloned())
    }
}
