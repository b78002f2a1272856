//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All stages produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the trace span
//! - Metric macros are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
