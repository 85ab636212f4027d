//! Registration, login and token verification handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use petscan_core::{Credentials, IssuedToken};

use super::AppState;
use crate::api::error::ApiError;
use crate::api::middleware::bearer_token;

/// Token handed back after register, login, or verify
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub email: String,
}

impl From<IssuedToken> for AuthResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            email: issued.subject,
        }
    }
}

/// Create an account
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(credentials) = body?;
    let issued = state.auth.register(credentials).await?;
    Ok(Json(issued.into()))
}

/// Exchange credentials for a token
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(credentials) = body?;
    let issued = state.auth.login(credentials).await?;
    Ok(Json(issued.into()))
}

/// Check a bearer token and echo it back with its subject
///
/// GET /api/auth/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthenticated)?;
    let claims = state
        .auth
        .tokens()
        .verify(token)
        .map_err(|_| ApiError::unauthenticated())?;

    info!(email = %claims.sub, "Token verified");
    Ok(Json(AuthResponse {
        token: token.to_string(),
        email: claims.sub,
    }))
}
