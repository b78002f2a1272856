//! API Gatekeeper
//!
//! A request-admission pipeline built with Tokio and Axum. Every request
//! passes a fixed chain of stages before it reaches a handler.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────────┐
//!                     │                       GATEKEEPER                          │
//!                     │                                                           │
//!   Client Request    │  ┌──────────┐   ┌────────┐   ┌──────┐   ┌────────────┐    │
//!   ──────────────────┼─▶│ request  │──▶│recover │──▶│ cors │──▶│ rate limit │    │
//!                     │  │ id/trace │   │        │   │      │   │  (per IP)  │    │
//!                     │  └──────────┘   └────────┘   └──────┘   └─────┬──────┘    │
//!                     │                                               │           │
//!                     │                                               ▼           │
//!   Client Response   │  ┌──────────┐   ┌───────────┐         ┌──────────────┐    │
//!   ◀─────────────────┼──│ handlers │◀──│ authorize │◀────────│ authenticate │    │
//!                     │  │          │   │ per route │         │ bearer token │    │
//!                     │  └──────────┘   └───────────┘         └──────────────┘    │
//!                     │                       │                      │            │
//!                     │                       ▼                      ▼            │
//!                     │              PermissionStore          IdentityStore       │
//!                     │                                                           │
//!                     │  ┌────────────────────────────────────────────────────┐   │
//!                     │  │  config │ observability │ lifecycle (signals, drain)│   │
//!                     │  └────────────────────────────────────────────────────┘   │
//!                     └──────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod identity;
pub mod routing;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatekeeperConfig;
pub use http::{ApiError, HttpServer};
pub use identity::{Identity, IdentityStore, MemoryStore, PermissionStore, User};
pub use lifecycle::Shutdown;
pub use security::{Access, Collaborators, Pipeline};
