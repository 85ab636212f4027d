//! PetScan Gateway
//!
//! HTTP front door for pet image analysis:
//! - Registers accounts and issues identity tokens
//! - Establishes the caller's identity from a bearer token on every request
//! - Runs the analysis worker for authenticated uploads and translates its
//!   result
//!
//! ## API Endpoints
//!
//! ### Public
//! - `GET /health` - Liveness check
//! - `POST /api/auth/register` - Create an account, returns a token
//! - `POST /api/auth/login` - Exchange credentials for a token
//! - `GET /api/auth/verify` - Check a bearer token
//!
//! ### Authenticated
//! - `POST /api/pets/analyze` - Analyze a multipart `image` upload

pub mod api;
pub mod auth;
pub mod config;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use api::middleware::Identity;
pub use auth::{AccountError, AuthService, PasswordHasher};
pub use config::{ConfigError, GatewayConfig};
pub use storage::{MemoryStore, StorageError, UserRecord, UserStore};
#[cfg(feature = "postgres")]
pub use storage::PostgresStore;
