//! Nine Men's Morris match server.
//!
//! # Architecture
//!
//! - **MatchRegistry**: owns every match, one lock per match
//! - **EventBus**: per-subscriber bounded queues plus a per-match resume log
//! - **MatchStore**: snapshots and the ranking, in SQLite or in memory
//! - **AccountService**: player registration and login
//! - **http**: axum adapter exposing the registry over JSON and SSE

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod accounts;
mod cli;
mod config;
mod db;
mod events;
mod http;
mod registry;
mod snapshot;

// Crate-level exports - Registry
pub use registry::{DEFAULT_FINISHED_CAPACITY, MatchRegistry, RegistryError};
pub use snapshot::{MatchHandle, MatchSnapshot, MatchSummary, PlayerView};

// Crate-level exports - Events
pub use events::{EventBus, EventKind, MatchEvent, Subscription, Topic};

// Crate-level exports - Persistence
pub use db::{
    Account, AccountStore, MatchStore, MemoryStore, NewAccount, NewSnapshot, Ranking, RankingRow,
    SavedMatch, SnapshotRow, SqliteStore, StoreError, to_row_id,
};

// Crate-level exports - HTTP
pub use http::{
    AccountView, ApiError, AppState, CredentialsRequest, ErrorBody, EventsQuery, MoveRequest,
    PlayerRequest, PositionRequest, router,
};

// Crate-level exports - Accounts
pub use accounts::{AccountError, AccountService};

// Crate-level exports - Configuration
pub use cli::{Cli, Command};
pub use config::{ConfigError, IN_MEMORY, ServerConfig};
