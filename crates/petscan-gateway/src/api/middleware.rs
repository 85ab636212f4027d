//! Auth Gate and route policy
//!
//! Two layers with separate jobs:
//!
//! - [`auth_gate`] reads a bearer token, verifies it, and attaches an
//!   [`Identity`] to the request. It never rejects: an absent or invalid
//!   token only means no identity is attached.
//! - [`require_identity`] decides which routes need an identity and answers
//!   401 for the rest.
//!
//! `auth_gate` must wrap `require_identity` (be added after it).

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::handlers::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Paths reachable without an identity
const PUBLIC_PREFIXES: &[&str] = &["/api/auth/"];
const PUBLIC_PATHS: &[&str] = &["/health"];

/// The authenticated caller, valid for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Whether a path is served without an identity
pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Establish the caller's identity from a bearer token, if there is one
pub async fn auth_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(identity) = resolve_identity(&state, request.headers()).await {
        debug!(user_id = %identity.user_id, email = %identity.email, "Identity established");
        request.extensions_mut().insert(identity);
    }
    next.run(request).await
}

async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    let token = bearer_token(headers)?;

    let claims = match state.auth.tokens().verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            // Already logged by the token service with its reason
            debug!(kind = e.kind(), "Bearer token rejected");
            return None;
        }
    };

    match state.auth.users().find_by_email(claims.subject()).await {
        Ok(Some(user)) => Some(Identity {
            user_id: user.id,
            email: user.email,
        }),
        Ok(None) => {
            warn!(email = %claims.subject(), "Valid token for unknown user");
            None
        }
        Err(e) => {
            warn!(error = %e, "User lookup failed during authentication");
            None
        }
    }
}

/// Reject requests to protected routes that carry no identity
pub async fn require_identity(request: Request, next: Next) -> Response {
    if is_public(request.uri().path()) || request.extensions().get::<Identity>().is_some() {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "Rejected unauthenticated request");
    ApiError::unauthenticated().into_response()
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(ApiError::unauthenticated)
    }
}
