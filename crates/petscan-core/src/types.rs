//! Account input types

use serde::{Deserialize, Serialize};

use crate::error::{PetscanError, Result};

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length in characters
pub const MAX_PASSWORD_LEN: usize = 40;

/// Email + password pair submitted at registration or login
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check both fields against the account policy
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Accepts `local@domain` with a non-empty local part, a non-empty domain
/// without leading/trailing dots, and no whitespace.
pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(PetscanError::InvalidEmail("email must not be blank".into()));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(PetscanError::InvalidEmail(
            "email must not contain whitespace".into(),
        ));
    }

    let (local, domain) = email
        .rsplit_once('@')
        .ok_or_else(|| PetscanError::InvalidEmail("email must contain '@'".into()))?;

    if local.is_empty() || local.contains('@') {
        return Err(PetscanError::InvalidEmail(format!(
            "'{}' is not a well-formed email address",
            email
        )));
    }
    if domain.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
    {
        return Err(PetscanError::InvalidEmail(format!(
            "'{}' has an invalid domain",
            email
        )));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(PetscanError::InvalidPassword(
            "password must not be blank".into(),
        ));
    }
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(PetscanError::InvalidPassword(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}
