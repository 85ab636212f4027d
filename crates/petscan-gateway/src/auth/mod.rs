//! Account registration and login
//!
//! Both operations end in a freshly issued identity token whose subject is
//! the account's email.

pub mod password;

pub use password::PasswordHasher;

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use petscan_core::{Credentials, IssuedToken, PetscanError, TokenService};

use crate::storage::{StorageError, UserRecord, UserStore};

/// Failures of account operations
#[derive(Error, Debug)]
pub enum AccountError {
    /// Email or password does not satisfy the account policy
    #[error(transparent)]
    Invalid(PetscanError),

    #[error("Email is already taken")]
    EmailTaken,

    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Failed to issue token: {0}")]
    Token(PetscanError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AccountError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(_) => AccountError::EmailTaken,
            other => AccountError::Storage(other),
        }
    }
}

/// Registers accounts and logs them in
#[derive(Debug, Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Create an account and issue its first token
    pub async fn register(&self, credentials: Credentials) -> Result<IssuedToken, AccountError> {
        credentials.validate().map_err(AccountError::Invalid)?;

        if self.users.exists_by_email(&credentials.email).await? {
            warn!(email = %credentials.email, "Registration for taken email");
            return Err(AccountError::EmailTaken);
        }

        let hash = self.hasher.hash(credentials.password).await?;
        // A concurrent registration can still win the race; create() reports it
        let user = self
            .users
            .create(UserRecord::new(credentials.email, hash))
            .await?;

        let issued = self.tokens.issue(&user.email).map_err(AccountError::Token)?;
        info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(issued)
    }

    /// Check credentials and issue a token
    pub async fn login(&self, credentials: Credentials) -> Result<IssuedToken, AccountError> {
        let Some(user) = self.users.find_by_email(&credentials.email).await? else {
            warn!(email = %credentials.email, "Login for unknown email");
            return Err(AccountError::InvalidCredentials);
        };

        if !self
            .hasher
            .verify(credentials.password, user.password_hash.clone())
            .await?
        {
            warn!(email = %user.email, "Login with wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let issued = self.tokens.issue(&user.email).map_err(AccountError::Token)?;
        info!(user_id = %user.id, email = %user.email, "User logged in");
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryStore::new()),
            PasswordHasher::with_params(4096, 1, 1).unwrap(),
            TokenService::from_key_bytes(&[7u8; 32], 60_000).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_register_issues_token_for_email() {
        let service = service();
        let issued = service
            .register(Credentials::new("alice@example.com", "password123"))
            .await
            .unwrap();

        assert_eq!(issued.subject, "alice@example.com");
        let claims = service.tokens().verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = service();
        service
            .register(Credentials::new("alice@example.com", "password123"))
            .await
            .unwrap();

        let err = service
            .register(Credentials::new("alice@example.com", "different456"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken));
        assert_eq!(err.to_string(), "Email is already taken");
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service();

        let err = service
            .register(Credentials::new("not-an-email", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Invalid(PetscanError::InvalidEmail(_))));

        let err = service
            .register(Credentials::new("bob@example.com", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Invalid(PetscanError::InvalidPassword(_))));
        assert!(!service.users().exists_by_email("bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_login() {
        let service = service();
        service
            .register(Credentials::new("alice@example.com", "password123"))
            .await
            .unwrap();

        let issued = service
            .login(Credentials::new("alice@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(issued.subject, "alice@example.com");

        let err = service
            .login(Credentials::new("alice@example.com", "password124"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));

        let err = service
            .login(Credentials::new("nobody@example.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }
}
