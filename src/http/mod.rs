//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing span)
//!     → [security pipeline admits or rejects]
//!     → handlers.rs (application routes)
//!     → response.rs (JSON error envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, MakeRequestUuidV4, RequestIdentityExt, X_REQUEST_ID};
pub use response::ApiError;
pub use server::HttpServer;
