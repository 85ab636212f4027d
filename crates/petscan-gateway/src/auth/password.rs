//! Password hashing with Argon2id

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use tracing::error;

use super::AccountError;

/// Hashes and verifies account passwords
///
/// Argon2 is CPU and memory heavy, so both operations run on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Hasher with the argon2 crate's default cost (19 MiB, 2 passes, 1 lane)
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Hasher with explicit cost parameters (memory in KiB)
    pub fn with_params(
        memory_cost: u32,
        time_cost: u32,
        parallelism: u32,
    ) -> Result<Self, AccountError> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    /// Hash a password into PHC string format
    pub async fn hash(&self, password: String) -> Result<String, AccountError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Password hash task panicked");
            AccountError::Hashing(e.to_string())
        })?
        .map_err(|e| {
            error!(error = %e, "Failed to hash password");
            AccountError::Hashing(e.to_string())
        })
    }

    /// Check a password against a stored PHC hash
    ///
    /// A stored hash that cannot be parsed counts as a mismatch.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, AccountError> {
        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&hash) else {
                error!("Stored password hash is not in PHC format");
                return false;
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Password verify task panicked");
            AccountError::Hashing(e.to_string())
        })
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(4096, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse".into()).await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse".into(), hash.clone()).await.unwrap());
        assert!(!hasher.verify("wrong horse".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let hasher = hasher();
        let a = hasher.hash("password123".into()).await.unwrap();
        let b = hasher.hash("password123".into()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_garbage_hash_is_mismatch() {
        assert!(!hasher()
            .verify("password123".into(), "not-a-hash".into())
            .await
            .unwrap());
    }

    #[test]
    fn test_invalid_params() {
        assert!(PasswordHasher::with_params(1, 0, 1).is_err());
    }
}
