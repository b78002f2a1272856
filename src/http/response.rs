//! Error responses.
//!
//! Every stage reports failures through [`ApiError`], which renders as a JSON
//! envelope `{"error": "<message>"}` with the matching status code. Causes of
//! server errors are logged here and never sent to the client.

use std::fmt;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),

    /// The cause is logged, the client only sees the generic message.
    #[error("the server encountered a problem and could not process your request")]
    ServerError(String),
}

impl ApiError {
    pub fn server_error(cause: impl fmt::Display) -> Self {
        ApiError::ServerError(cause.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad-request",
            ApiError::InvalidCredentials => "invalid-credentials",
            ApiError::InvalidAuthenticationToken => "invalid-authentication-token",
            ApiError::AuthenticationRequired => "authentication-required",
            ApiError::InactiveAccount => "inactive-account",
            ApiError::NotPermitted => "not-permitted",
            ApiError::RateLimitExceeded => "rate-limit-exceeded",
            ApiError::NotFound => "not-found",
            ApiError::MethodNotAllowed(_) => "method-not-allowed",
            ApiError::ServerError(_) => "server-error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::ServerError(cause) = &self {
            tracing::error!(error = %cause, "Request failed with server error");
        }
        metrics::record_error_response(self.kind());

        let mut response = (self.status(), Json(json!({ "error": self.to_string() }))).into_response();
        if matches!(self, ApiError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Router fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Router fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
