//! Error types for the petscan core

use thiserror::Error;

/// Result type alias using PetscanError
pub type Result<T> = std::result::Result<T, PetscanError>;

/// Errors raised while configuring the token service or validating account input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PetscanError {
    /// The signing secret is not valid base64
    #[error("Signing secret is not valid base64: {0}")]
    InvalidSecret(String),

    /// The decoded signing secret is too short for HMAC-SHA signing
    #[error("Signing secret is {bits} bits; at least 256 bits are required")]
    WeakSecret { bits: usize },

    /// Token lifetime must be positive
    #[error("Token lifetime must be positive, got {0} ms")]
    InvalidLifetime(i64),

    /// Token could not be encoded or signed
    #[error("Failed to sign token: {0}")]
    Signing(String),

    /// Email does not look like an email address
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password does not satisfy the length policy
    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

/// Reasons a presented bearer token is rejected
///
/// Callers answer every variant with the same "unauthorized" response; the
/// variants only exist so logs can tell them apart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token is empty, not three segments, or its claims do not decode
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Token expiry has passed
    #[error("Token expired")]
    Expired,

    /// Token uses an algorithm or format this service does not accept
    #[error("Unsupported token: {0}")]
    UnsupportedFormat(String),

    /// Signature does not verify under the current secret
    #[error("Invalid token signature")]
    InvalidSignature,
}

impl AuthError {
    /// Short machine-readable label, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "malformed",
            AuthError::Expired => "expired",
            AuthError::UnsupportedFormat(_) => "unsupported",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidKeyFormat => AuthError::UnsupportedFormat(err.to_string()),
            _ => AuthError::Malformed(err.to_string()),
        }
    }
}
