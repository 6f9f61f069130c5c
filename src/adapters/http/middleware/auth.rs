//! Authentication middleware and extractor for axum.
//!
//! - `auth_middleware` validates `Bearer` tokens and injects the user into
//!   request extensions
//! - `RequireAuth` rejects requests that carry no authenticated user
//!
//! The middleware goes through the `SessionValidator` port, so tests swap in
//! `MockSessionValidator` without touching the routes.
//!
//! ```text
//! Request → auth_middleware → AuthenticatedUser in extensions
//!                                      ↓
//!                              Handler → RequireAuth reads it back
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::SessionValidator;

/// Auth middleware state - wraps the session validator.
pub type AuthState = Arc<dyn SessionValidator>;

fn auth_error_body(status: StatusCode, code: &str, title: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "code": code,
            "title": title,
            "message": message,
        })),
    )
        .into_response()
}

/// Validates the `Authorization: Bearer <token>` header when present.
///
/// Requests without a token pass through untouched; `RequireAuth` decides
/// whether the route needs one. A token that fails validation is rejected
/// here with 401 (or 503 when the validator is unavailable).
pub async fn auth_middleware(
    State(validator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    let Some(token) = token else {
        return next.run(request).await;
    };

    match validator.validate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(AuthError::ServiceUnavailable(msg)) => {
            tracing::error!("Auth service unavailable: {}", msg);
            auth_error_body(
                StatusCode::SERVICE_UNAVAILABLE,
                "AUTH_UNAVAILABLE",
                "Authentication unavailable",
                "Authentication service unavailable",
            )
        }
        Err(AuthError::TokenExpired) => auth_error_body(
            StatusCode::UNAUTHORIZED,
            "TOKEN_EXPIRED",
            "Unauthorized",
            "Token expired",
        ),
        Err(AuthError::InvalidToken) => auth_error_body(
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Unauthorized",
            "Invalid token",
        ),
    }
}

/// Extractor that requires an authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or(AuthRejection::Unauthenticated)
    }
}

/// Rejection returned by `RequireAuth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No valid authentication token was provided.
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Unauthenticated => auth_error_body(
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Unauthorized",
                "Authentication required",
            ),
        }
    }
}
