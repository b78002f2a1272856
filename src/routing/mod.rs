//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! (path, method router, Access) declarations
//!     → table.rs (attach the access guard as a route layer)
//!     → axum Router with JSON 404/405 fallbacks
//! ```
//!
//! # Design Decisions
//! - Access requirements are data on each route, not nested wrappers
//! - Guards run after authentication, so they only read the attached identity

pub mod table;

pub use table::RouteTable;
