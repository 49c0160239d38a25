//! Database models.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use morris_rules::{Match, MatchId};
use tracing::instrument;

use crate::db::{SavedMatch, StoreError, schema};

/// Persisted snapshot of one unfinished match.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::match_snapshots)]
pub struct SnapshotRow {
    id: i64,
    state: String,
    updated_at: NaiveDateTime,
    last_sequence: i64,
}

impl SnapshotRow {
    /// Decodes the stored JSON back into a match.
    #[instrument(skip(self), fields(id = self.id))]
    pub fn decode(&self) -> Result<SavedMatch, StoreError> {
        let game = serde_json::from_str(&self.state)?;
        Ok(SavedMatch::new(
            game,
            u64::try_from(self.last_sequence).unwrap_or_default(),
        ))
    }
}

/// Insertable snapshot. Written with `REPLACE INTO`, so the last write wins.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::match_snapshots)]
pub struct NewSnapshot {
    id: i64,
    state: String,
    updated_at: NaiveDateTime,
    last_sequence: i64,
}

impl NewSnapshot {
    /// Encodes a match for storage.
    #[instrument(skip(game), fields(id = game.id()))]
    pub fn encode(game: &Match, last_sequence: u64) -> Result<Self, StoreError> {
        let last_sequence = i64::try_from(last_sequence)
            .map_err(|_| StoreError::new(format!("Sequence {} out of range", last_sequence)))?;
        Ok(Self::new(
            to_row_id(game.id())?,
            serde_json::to_string(game)?,
            chrono::Utc::now().naive_utc(),
            last_sequence,
        ))
    }
}

/// One row of the win-ranking table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, new, Getters)]
#[diesel(table_name = schema::rankings)]
pub struct RankingRow {
    player_name: String,
    wins: i32,
}

/// Registered player account.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters, new)]
#[diesel(table_name = schema::accounts)]
pub struct Account {
    id: i32,
    name: String,
    password_hash: String,
    created_at: NaiveDateTime,
}

/// Insertable account.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::accounts)]
pub struct NewAccount {
    name: String,
    password_hash: String,
}

/// Converts a match id into the signed column type.
#[track_caller]
pub fn to_row_id(id: MatchId) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::new(format!("Match id {} out of range", id)))
}
