//! Stateless identity tokens
//!
//! Tokens are HMAC-signed JWTs carrying the caller's email as the subject,
//! an issued-at and an expiry. Nothing is stored server-side: a token is
//! valid if its signature verifies under the configured secret and its
//! expiry has not passed.
//!
//! The signing key is the base64-decoded secret. The HMAC variant follows
//! the key length, so a longer secret automatically upgrades the algorithm:
//!
//! | decoded key | algorithm |
//! |-------------|-----------|
//! | ≥ 64 bytes  | HS512     |
//! | ≥ 48 bytes  | HS384     |
//! | ≥ 32 bytes  | HS256     |
//!
//! Anything shorter is refused at construction.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AuthError, PetscanError, Result};

/// Minimum decoded key length (256 bits)
pub const MIN_SECRET_BYTES: usize = 32;

/// Claims carried by every identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the caller's email
    pub sub: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

impl Claims {
    /// The identity this token was issued to
    pub fn subject(&self) -> &str {
        &self.sub
    }
}

/// A freshly signed token together with the values it encodes
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS serialization, ready for an `Authorization: Bearer` header
    pub token: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies identity tokens
#[derive(Clone)]
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("lifetime_ms", &self.lifetime.num_milliseconds())
            .field("key", &"[redacted]")
            .finish()
    }
}

impl TokenService {
    /// Create a token service from a base64-encoded secret
    ///
    /// `lifetime_ms` is the validity window of issued tokens in milliseconds.
    pub fn new(secret_base64: &str, lifetime_ms: i64) -> Result<Self> {
        let key = STANDARD
            .decode(secret_base64.trim())
            .map_err(|e| PetscanError::InvalidSecret(e.to_string()))?;
        Self::from_key_bytes(&key, lifetime_ms)
    }

    /// Create a token service from raw key bytes
    pub fn from_key_bytes(key: &[u8], lifetime_ms: i64) -> Result<Self> {
        if lifetime_ms <= 0 {
            return Err(PetscanError::InvalidLifetime(lifetime_ms));
        }
        let algorithm = algorithm_for_key(key)?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        debug!(?algorithm, key_bytes = key.len(), "Token service initialized");

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            lifetime: Duration::milliseconds(lifetime_ms),
        })
    }

    /// The HMAC algorithm selected for this key
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Validity window of issued tokens
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for `subject`, valid from now for the configured lifetime
    pub fn issue(&self, subject: &str) -> Result<IssuedToken> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if it had been created at `issued_at`
    pub fn issue_at(&self, subject: &str, issued_at: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = issued_at + self.lifetime;
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| PetscanError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            subject: claims.sub,
            issued_at,
            expires_at,
        })
    }

    /// Verify a token and return its claims
    ///
    /// Every failure is logged with its reason; callers should not
    /// distinguish between them when answering the client.
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let result = screen_token(token).and_then(|()| {
            decode::<Claims>(token, &self.decoding_key, &self.validation)
                .map(|data| data.claims)
                .map_err(AuthError::from)
        });

        if let Err(ref e) = result {
            match e {
                AuthError::Malformed(msg) => warn!(reason = e.kind(), "Invalid JWT token: {}", msg),
                AuthError::Expired => warn!(reason = e.kind(), "JWT token is expired"),
                AuthError::UnsupportedFormat(msg) => {
                    warn!(reason = e.kind(), "JWT token is unsupported: {}", msg)
                }
                AuthError::InvalidSignature => {
                    warn!(reason = e.kind(), "JWT signature does not match")
                }
            }
        }

        result
    }
}

/// Pick the strongest HMAC variant the key length supports
fn algorithm_for_key(key: &[u8]) -> Result<Algorithm> {
    match key.len() {
        n if n >= 64 => Ok(Algorithm::HS512),
        n if n >= 48 => Ok(Algorithm::HS384),
        n if n >= MIN_SECRET_BYTES => Ok(Algorithm::HS256),
        n => Err(PetscanError::WeakSecret { bits: n * 8 }),
    }
}

/// Structural checks performed before signature verification
///
/// `jsonwebtoken` reports an unknown `alg` as a JSON error; inspecting the
/// header first lets unsigned or non-HMAC tokens be reported as unsupported
/// rather than malformed.
fn screen_token(token: &str) -> std::result::Result<(), AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::Malformed("token is empty".into()));
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|e| AuthError::Malformed(format!("header is not base64url: {}", e)))?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::Malformed(format!("header is not JSON: {}", e)))?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::Malformed("header has no alg".into()))?;

    if alg.eq_ignore_ascii_case("none") || segments[2].is_empty() {
        return Err(AuthError::UnsupportedFormat(
            "unsigned tokens are not accepted".into(),
        ));
    }
    if !alg.starts_with("HS") {
        return Err(AuthError::UnsupportedFormat(format!(
            "algorithm {} is not accepted",
            alg
        )));
    }

    Ok(())
}
