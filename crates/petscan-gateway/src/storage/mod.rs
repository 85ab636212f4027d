//! Storage abstraction for user accounts
//!
//! This module provides a trait-based abstraction for the account store,
//! with an in-memory (default) and a persistent (PostgreSQL) backend.
//!
//! The gateway never stores tokens: only accounts (email + password hash)
//! are persisted. Token validity is computed from the token itself.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use uuid::Uuid;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// A registered account
#[derive(Clone)]
pub struct UserRecord {
    pub id: Uuid,
    /// Login name and token subject
    pub email: String,
    /// PHC-format Argon2 hash
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a record for a new account
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

impl Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Storage backend trait for accounts
///
/// Implementations must be thread-safe and support concurrent access.
/// Emails are unique; `create` is the only place uniqueness is enforced.
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Look up an account by email
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Check whether an email is registered
    async fn exists_by_email(&self, email: &str) -> Result<bool, StorageError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Insert a new account, failing with `AlreadyExists` on a taken email
    async fn create(&self, user: UserRecord) -> Result<UserRecord, StorageError>;
}
