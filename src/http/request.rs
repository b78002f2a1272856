//! Request-scoped helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Give handlers and stages access to the caller's identity

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::identity::Identity;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Access to the identity the authentication stage attached.
pub trait RequestIdentityExt {
    /// The caller's identity, or `Identity::Anonymous` when none was attached.
    fn identity(&self) -> Identity;
}

impl<B> RequestIdentityExt for Request<B> {
    fn identity(&self) -> Identity {
        self.extensions().get::<Identity>().cloned().unwrap_or_default()
    }
}

/// Read the request ID assigned to `request`, if any.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
}
