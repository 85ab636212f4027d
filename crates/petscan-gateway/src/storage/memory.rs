//! In-memory storage backend
//!
//! Default storage implementation using an in-memory hashmap.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

use super::{StorageError, UserRecord, UserStore};

/// In-memory user store implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Database("user table lock poisoned".into())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(email).cloned())
    }

    async fn create(&self, user: UserRecord) -> Result<UserRecord, StorageError> {
        let mut users = self.users.write().map_err(poisoned)?;
        match users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(user.email)),
            Entry::Vacant(slot) => {
                info!(user_id = %user.id, email = %user.email, "Created user");
                Ok(slot.insert(user).clone())
            }
        }
    }
}
