//! Crash isolation.
//!
//! A panic anywhere downstream becomes a generic 500 response with
//! `Connection: close`, so the connection is not reused after the fault.
//! Panics raised while a response body is already streaming cannot be
//! converted; hyper drops that connection instead.

use std::any::Any;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::ApiError;

pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

pub fn catch_panic_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(recover_panic as PanicHandler)
}

fn recover_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(panic.as_ref());
    tracing::error!(panic = %message, "Recovered from panic while handling request");

    let mut response = ApiError::server_error(format!("panic: {message}")).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::testing::{request, send, send_raw};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn explode() -> &'static str {
        panic!("handler blew up")
    }

    fn router() -> Router {
        Router::new()
            .route("/boom", get(explode))
            .route("/fine", get(|| async { "fine" }))
            .layer(catch_panic_layer())
    }

    #[tokio::test]
    async fn panic_becomes_server_error() {
        let response = send_raw(&router(), request("GET", "/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONNECTION], "close");

        let (_, body) = send(&router(), request("GET", "/boom")).await;
        assert_eq!(
            body["error"],
            "the server encountered a problem and could not process your request"
        );
    }

    #[tokio::test]
    async fn healthy_requests_are_untouched() {
        let response = send_raw(&router(), request("GET", "/fine")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONNECTION).is_none());
    }

    #[test]
    fn extracts_panic_messages() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
