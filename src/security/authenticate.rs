//! Identity resolution from the `Authorization` header.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::ApiError;
use crate::identity::{token, with_timeout, Identity, IdentityStore, LookupError, TokenScope};

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub identities: Arc<dyn IdentityStore>,
    pub lookup_timeout: Duration,
}

/// Attach the caller's [`Identity`] to the request, or stop the chain when a
/// credential is presented but cannot be resolved.
///
/// Responses always vary by `Authorization`.
pub async fn authenticate_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = resolve_identity(&state, request.headers()).await;
    let mut response = match resolved {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(kind = err.kind(), "Authentication failed");
            err.into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Resolve the identity for a set of request headers.
pub async fn resolve_identity(state: &AuthState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let value = match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(Identity::Anonymous),
    };

    let plaintext = bearer_token(value)?;
    if !token::is_well_formed(plaintext) {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    let lookup = state
        .identities
        .identity_for_token(TokenScope::Authentication, plaintext);
    match with_timeout(state.lookup_timeout, lookup).await {
        Ok(user) => {
            tracing::debug!(user_id = user.id, "Authenticated request");
            Ok(Identity::authenticated(user))
        }
        Err(LookupError::NotFound) => Err(ApiError::InvalidAuthenticationToken),
        Err(err) => Err(ApiError::server_error(err)),
    }
}

/// Split `Bearer <token>` into its token. Anything but exactly two
/// space-separated parts with the literal `Bearer` scheme is rejected.
fn bearer_token(value: &HeaderValue) -> Result<&str, ApiError> {
    let value = value.to_str().map_err(|_| ApiError::InvalidCredentials)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(ApiError::InvalidCredentials),
    }
}
