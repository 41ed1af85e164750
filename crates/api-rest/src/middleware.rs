//! Bearer token authentication.
//!
//! Extracts `Authorization: Bearer <token>`, verifies it against the configured secret and
//! injects [`AuthUser`] into the request extensions for downstream handlers.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::verify_token;
use api_shared::Claims;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secu_core::models::Role;

/// The authenticated caller.
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn username(&self) -> &str {
        &self.0.sub
    }

    /// [`ApiError::AccessDenied`] unless the caller holds one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.0.has_any_role(roles) {
            return Ok(());
        }
        let wanted: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        Err(ApiError::AccessDenied(format!(
            "requires one of the roles {}",
            wanted.join(", ")
        )))
    }
}

pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match require_auth_inner(state, req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    state: AppState,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(&state.auth, token).map_err(|e| {
        tracing::debug!("rejected bearer token: {e}");
        ApiError::from(e)
    })?;
    req.extensions_mut().insert(AuthUser(claims));
    Ok(next.run(req).await)
}
