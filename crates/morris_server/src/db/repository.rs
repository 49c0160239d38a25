//! SQLite-backed store for snapshots, rankings and accounts.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use morris_rules::{Match, MatchId};
use tracing::{debug, info, instrument, warn};

use crate::db::{
    Account, AccountStore, MatchStore, NewAccount, NewSnapshot, Ranking, RankingRow, SavedMatch,
    SnapshotRow, StoreError, schema, to_row_id,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// SQLite repository. Opens a fresh connection per operation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `db_path` and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn open(db_path: impl AsRef<str>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_string(),
        };
        let mut conn = store.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("Migrations failed: {}", e)))?;
        info!(path = %store.db_path, migrations = applied.len(), "SqliteStore ready");
        Ok(store)
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, StoreError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            StoreError::new(format!("Failed to connect to '{}': {}", self.db_path, e))
        })?;
        // Commands on different matches may write concurrently
        conn.batch_execute("PRAGMA busy_timeout = 5000;")?;
        Ok(conn)
    }
}

impl MatchStore for SqliteStore {
    #[instrument(skip(self, game), fields(id = game.id()))]
    fn save_match(&self, game: &Match, last_sequence: u64) -> Result<(), StoreError> {
        let row = NewSnapshot::encode(game, last_sequence)?;
        let mut conn = self.connection()?;
        diesel::replace_into(schema::match_snapshots::table)
            .values(&row)
            .execute(&mut conn)?;
        debug!(status = %game.status(), last_sequence, "Snapshot saved");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_match(&self, id: MatchId) -> Result<(), StoreError> {
        let row_id = to_row_id(id)?;
        let mut conn = self.connection()?;
        let removed = diesel::delete(schema::match_snapshots::table.find(row_id))
            .execute(&mut conn)?;
        debug!(removed, "Snapshot deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_matches(&self) -> Result<Vec<SavedMatch>, StoreError> {
        let mut conn = self.connection()?;
        let rows = schema::match_snapshots::table
            .order(schema::match_snapshots::id.asc())
            .select(SnapshotRow::as_select())
            .load(&mut conn)?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.decode() {
                Ok(saved) => matches.push(saved),
                Err(e) => warn!(id = row.id(), error = %e, "Skipping unreadable snapshot"),
            }
        }
        info!(count = matches.len(), "Snapshots loaded");
        Ok(matches)
    }

    #[instrument(skip(self, ranking), fields(players = ranking.len()))]
    fn save_ranking(&self, ranking: &Ranking) -> Result<(), StoreError> {
        let rows: Vec<RankingRow> = ranking
            .iter()
            .map(|(name, wins)| {
                RankingRow::new(name.clone(), i32::try_from(*wins).unwrap_or(i32::MAX))
            })
            .collect();
        let mut conn = self.connection()?;
        conn.transaction::<_, DieselError, _>(|conn| {
            diesel::delete(schema::rankings::table).execute(conn)?;
            diesel::insert_into(schema::rankings::table)
                .values(&rows)
                .execute(conn)?;
            Ok(())
        })?;
        debug!("Ranking rewritten");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_ranking(&self) -> Result<Ranking, StoreError> {
        let mut conn = self.connection()?;
        let rows = schema::rankings::table
            .select(RankingRow::as_select())
            .load(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let wins = u32::try_from(*row.wins()).unwrap_or_default();
                (row.player_name().clone(), wins)
            })
            .collect())
    }
}

impl AccountStore for SqliteStore {
    #[instrument(skip(self, password_hash))]
    fn create_account(
        &self,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<Account>, StoreError> {
        let mut conn = self.connection()?;
        let new_account = NewAccount::new(name.to_string(), password_hash.to_string());

        let result = diesel::insert_into(schema::accounts::table)
            .values(&new_account)
            .returning(Account::as_returning())
            .get_result(&mut conn);

        match result {
            Ok(account) => {
                info!(account_id = account.id(), "Account created");
                Ok(Some(account))
            }
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                debug!("Account name taken");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    fn find_account(&self, name: &str) -> Result<Option<Account>, StoreError> {
        let mut conn = self.connection()?;
        let account = schema::accounts::table
            .filter(schema::accounts::name.eq(name))
            .select(Account::as_select())
            .first(&mut conn)
            .optional()?;
        debug!(found = account.is_some(), "Account lookup");
        Ok(account)
    }
}
