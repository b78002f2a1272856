//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → recover.rs (convert downstream panics into 500s)
//!     → cors.rs (annotate or answer cross-origin requests)
//!     → rate_limit.rs (per-IP token bucket)
//!     → authenticate.rs (bearer token → Identity)
//!     → authorize.rs (per-route access level)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: every check rejects unless it can prove the caller may proceed
//! - Denials (4xx) and collaborator failures (5xx) are never conflated
//! - The client registry is the only shared mutable state

pub mod authenticate;
pub mod authorize;
pub mod cors;
pub mod pipeline;
pub mod rate_limit;
pub mod recover;

#[cfg(test)]
pub(crate) mod testing;

pub use authorize::Access;
pub use pipeline::{Collaborators, Pipeline};
pub use rate_limit::ClientRegistry;
