//! API request handlers

pub mod analyze;
pub mod auth;

pub use analyze::analyze_image;
pub use auth::{login, register, verify, AuthResponse};

use std::sync::Arc;

use petscan_worker::ImageAnalyzer;

use crate::auth::AuthService;
use crate::config::GatewayConfig;

/// Application state shared across handlers
pub struct AppState {
    /// Accounts and token issuance
    pub auth: AuthService,
    /// Runs one analysis per accepted upload
    pub analyzer: Arc<dyn ImageAnalyzer>,
    pub config: GatewayConfig,
}
