//! # Petscan Core
//!
//! Identity primitives shared by the petscan gateway.
//!
//! ## Key Concepts
//!
//! - **Identity token**: a stateless, HMAC-signed JWT whose subject is the
//!   caller's email. Validity is computed, never looked up.
//! - **Credentials**: the email + password pair accepted at registration and
//!   login, with the account policy that guards them.
//!
//! ## Token Validity
//!
//! A token is accepted only if all of the following hold:
//!
//! 1. It is a well-formed three-segment JWS using an HMAC algorithm
//! 2. Its signature verifies under the configured secret
//! 3. The current time is before its expiry

pub mod error;
pub mod token;
pub mod types;

pub use error::{AuthError, PetscanError, Result};
pub use token::{Claims, IssuedToken, TokenService};
pub use types::Credentials;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
