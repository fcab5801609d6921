//! Dynamic scoped routing configuration distribution.
//!
//! Ingests full-state configuration pushes describing named routing scopes
//! from a control-plane source, maintains one authoritative versioned
//! store, and propagates immutable snapshots to every worker thread so the
//! request path reads its routing configuration without locks.
//!
//! # Architecture Overview
//!
//! ```text
//! control plane transport
//!     → subscription (validate, merge into canonical store)
//!     → snapshot propagator (post mutation per worker queue)
//!     → worker snapshot swap (FIFO per worker)
//!     → request path: scope key builder → snapshot lookup → route table
//!
//! on-demand path:
//!     route table missing a virtual host
//!     → discovery (request exactly the missing names)
//!     → bounded wait, merge arrivals by name
//! ```

// Core subsystems
pub mod config;
pub mod discovery;
pub mod provider;
pub mod routing;
pub mod scope;
pub mod snapshot;
pub mod store;
pub mod subscription;

// Cross-cutting concerns
pub mod admin;
pub mod init;
pub mod observability;

pub use config::schema::{ScopedRouteConfig, SourceDescription};
pub use provider::{ConfigProvider, ConfigProviderManager, DynamicProvider, InlineProvider};
pub use scope::{ScopeKey, ScopeKeyBuilder};
pub use snapshot::{WorkerConfigReader, WorkerScopedConfig};
pub use subscription::{ScopedConfigSubscription, SubscriptionIdentity, UpdateError};
