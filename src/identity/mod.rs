//! Caller identity subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → token.rs (well-formedness, hashing)
//!     → store.rs (IdentityStore / PermissionStore contracts)
//!     → user.rs (Identity attached to the request)
//! ```
//!
//! # Design Decisions
//! - Anonymous callers are a variant of `Identity`, never a sentinel user
//! - Nothing here caches across requests
//! - `memory.rs` backs the binary and the tests; real deployments plug in
//!   their own stores behind the same traits

pub mod memory;
pub mod store;
pub mod token;
pub mod user;

pub use memory::MemoryStore;
pub use store::{with_timeout, IdentityStore, LookupError, PermissionStore};
pub use token::{Token, TokenScope};
pub use user::{Identity, PasswordHash, PermissionSet, User};
