//! Cross-origin request handling.
//!
//! Trusted origins are matched exactly. Preflight requests from a trusted
//! origin are answered here; everything else continues downstream, with the
//! allow-origin header added only when the origin is trusted.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::CorsConfig;

const ALLOW_METHODS: &str = "OPTIONS, PUT, PATCH, DELETE";
const ALLOW_HEADERS: &str = "Authorization, Content-Type";

#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    trusted_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(trusted_origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            trusted_origins: trusted_origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &CorsConfig) -> Self {
        Self::new(config.trusted_origins.iter().cloned())
    }

    pub fn is_trusted(&self, origin: &str) -> bool {
        self.trusted_origins.iter().any(|trusted| trusted == origin)
    }
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let trusted_origin = headers
        .get(header::ORIGIN)
        .filter(|origin| origin.to_str().is_ok_and(|origin| policy.is_trusted(origin)))
        .cloned();
    let is_preflight = request.method() == Method::OPTIONS
        && headers
            .get(header::ACCESS_CONTROL_REQUEST_METHOD)
            .is_some_and(|value| !value.is_empty());

    let mut response = if trusted_origin.is_some() && is_preflight {
        let mut response = StatusCode::OK.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        response
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    if let Some(origin) = trusted_origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    response
}
