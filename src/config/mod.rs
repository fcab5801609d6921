//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! control plane resource (JSON value)
//!     → schema.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ScopedRouteConfig (validated, immutable)
//!     → merged into the canonical store by the subscription
//!
//! inline config file (TOML)
//!     → loader.rs (parse & validate at startup)
//!     → InlineScopedRoutes (fixed for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Resources are immutable once parsed; an update replaces by name
//! - Validation separates syntactic (serde) from semantic checks
//! - A resource that fails either check never touches shared state

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::InlineScopedRoutes;
pub use schema::ScopeKeyBuilderConfig;
pub use schema::ScopedRouteConfig;
pub use schema::SourceDescription;
pub use schema::VirtualHostConfig;
