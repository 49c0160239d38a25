//! Player registration and login.

use derive_more::Display;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::db::{Account, AccountStore, StoreError};

/// Why a registration or login failed.
#[derive(Debug, Clone, Display)]
pub enum AccountError {
    /// Another account already uses this name.
    #[display("Name '{}' is already registered", _0)]
    NameTaken(String),

    /// No account with this name.
    #[display("Unknown player '{}'", _0)]
    UnknownPlayer(String),

    /// The password did not match.
    #[display("Wrong password")]
    WrongPassword,

    /// Names and passwords must be non-empty.
    #[display("Name and password must not be empty")]
    InvalidCredentials,

    /// The account table could not be read or written.
    #[display("{}", _0)]
    Store(StoreError),
}

impl std::error::Error for AccountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccountError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Digest stored for `password`, salted with the player name.
fn password_digest(name: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", name, password).as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Registers and authenticates players against an [`AccountStore`].
#[derive(Debug, Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

impl AccountService {
    /// Creates a service over `store`.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// [`AccountError::NameTaken`] if the name exists, or
    /// [`AccountError::Store`] if the store fails.
    #[instrument(skip(self, password))]
    pub fn register(&self, name: &str, password: &str) -> Result<Account, AccountError> {
        let name = name.trim();
        if name.is_empty() || password.is_empty() {
            return Err(AccountError::InvalidCredentials);
        }

        let Some(account) = self
            .store
            .create_account(name, &password_digest(name, password))?
        else {
            warn!("Registration refused, name taken");
            return Err(AccountError::NameTaken(name.to_string()));
        };
        info!(account_id = account.id(), "Player registered");
        Ok(account)
    }

    /// Checks a name and password.
    ///
    /// # Errors
    ///
    /// [`AccountError::UnknownPlayer`] or [`AccountError::WrongPassword`].
    #[instrument(skip(self, password))]
    pub fn login(&self, name: &str, password: &str) -> Result<Account, AccountError> {
        let name = name.trim();
        let account = self
            .store
            .find_account(name)?
            .ok_or_else(|| AccountError::UnknownPlayer(name.to_string()))?;

        if *account.password_hash() != password_digest(name, password) {
            warn!("Login refused");
            return Err(AccountError::WrongPassword);
        }
        debug!(account_id = account.id(), "Login accepted");
        Ok(account)
    }
}
