//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! subscription / discovery / snapshot code produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (reload, rejection, conflict counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Admin config dump (see admin module)
//! ```
//!
//! # Design Decisions
//! - Failed updates are invisible to the request path; counters and the
//!   dump's unchanged version field are how they surface
//! - Counters are labeled per subscription / per route table

pub mod logging;
pub mod metrics;
