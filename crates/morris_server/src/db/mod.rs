//! Persistence layer for match snapshots, the ranking table and accounts.

mod error;
mod memory;
mod models;
mod repository;
mod schema;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use models::{Account, NewAccount, NewSnapshot, RankingRow, SnapshotRow, to_row_id};
pub use repository::SqliteStore;
pub use store::{AccountStore, MatchStore, Ranking, SavedMatch};
