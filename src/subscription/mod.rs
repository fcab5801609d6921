//! Scoped-routes configuration subscription.
//!
//! # Responsibilities
//! - Receive full-state pushes from the control plane transport
//! - Validate the whole batch before touching any shared state
//! - Merge resources into the canonical store (adds, updates, removals)
//! - Post one mutation per operation to every worker thread
//! - Record the version token and bump the reload counter
//!
//! # Data Flow
//! ```text
//! transport → on_update(resources, version)
//!     → parse all → duplicate check → validate all      (pure; abort on error)
//!     → removal set = store names − batch names
//!     → store.add_or_update / store.remove              (control context only)
//!     → SnapshotPropagator::post per operation          (fan out to workers)
//!     → version recorded, reload counter bumped
//! ```
//!
//! # Design Decisions
//! - An update is all-or-nothing: any parse, duplicate, or validation
//!   failure rejects the whole batch with the store byte-for-byte unchanged
//! - Names absent from a push are deletions, not "no change"
//! - Validation failures are returned as values, never unwound
//! - Transport failures leave the last-good configuration serving

pub mod identity;
pub mod transport;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::SystemTime;

use thiserror::Error;

use crate::config::schema::ScopedRouteConfig;
use crate::config::validation::{validate_scoped_route, ValidationError};
use crate::init::InitTarget;
use crate::observability::metrics;
use crate::provider::ConfigProviderManager;
use crate::routing::RouteTableRegistry;
use crate::snapshot::{
    OpKind, ScopedConfigSnapshot, SnapshotOp, SnapshotPropagator, WorkerScopedConfig,
};
use crate::store::{KeyIndexOutcome, RoutingScopeEntry, ScopeConfigStore};

pub use identity::SubscriptionIdentity;
pub use transport::{NullTransport, SubscriptionTransport};

/// Why a full-state update was rejected. The store is untouched in every
/// case; the proxy keeps serving the last applied configuration.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// A resource failed to parse into its typed form.
    #[error("malformed scoped route configuration: {0}")]
    MalformedResource(#[source] serde_json::Error),

    /// Two resources in one batch share a name.
    #[error("duplicate scoped route configuration '{0}' found")]
    DuplicateResourceName(String),

    /// A resource failed semantic validation.
    #[error("invalid scoped route configuration '{name}': {}", format_errors(.errors))]
    Invalid {
        /// Name of the failing resource.
        name: String,
        /// Every validation failure found.
        errors: Vec<ValidationError>,
    },
}

impl UpdateError {
    /// Counter label for this rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            UpdateError::MalformedResource(_) => "malformed",
            UpdateError::DuplicateResourceName(_) => "duplicate_name",
            UpdateError::Invalid { .. } => "validation",
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

struct SubscriptionState {
    store: ScopeConfigStore,
    propagator: SnapshotPropagator,
}

/// A shared subscription to one logical scoped-routes source.
///
/// All mutation runs in the caller's control context; the type is `Sync`
/// only so consumers and the admin dump can hold references. Obtained
/// through [`ConfigProviderManager::get_or_create_subscription`] so equal
/// source identities share one instance.
pub struct ScopedConfigSubscription {
    name: String,
    stat_prefix: String,
    identity: SubscriptionIdentity,
    manager: Weak<ConfigProviderManager>,
    route_tables: Arc<RouteTableRegistry>,
    init_target: InitTarget,
    transport: Arc<dyn SubscriptionTransport>,
    started: AtomicBool,
    state: Mutex<SubscriptionState>,
}

impl ScopedConfigSubscription {
    /// Build a subscription. Use the provider manager to create one unless
    /// wiring tests.
    pub fn new(
        name: &str,
        identity: SubscriptionIdentity,
        manager: Weak<ConfigProviderManager>,
        route_tables: Arc<RouteTableRegistry>,
        init_target: InitTarget,
        transport: Arc<dyn SubscriptionTransport>,
    ) -> Self {
        Self {
            name: name.to_string(),
            stat_prefix: metrics::scoped_rds_prefix(name),
            identity,
            manager,
            route_tables,
            init_target,
            transport,
            started: AtomicBool::new(false),
            state: Mutex::new(SubscriptionState {
                store: ScopeConfigStore::new(),
                propagator: SnapshotPropagator::new(),
            }),
        }
    }

    /// The subscription's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity this subscription is shared under.
    pub fn identity(&self) -> SubscriptionIdentity {
        self.identity
    }

    /// Initiate the transport fetch. Only the first call has an effect.
    pub fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.transport.start();
        }
    }

    /// Register a worker thread, seeded with the current configuration.
    pub fn register_worker(&self) -> WorkerScopedConfig {
        let mut state = self.lock_state();
        let initial = state.store.snapshot();
        state.propagator.register_worker(initial)
    }

    /// Apply a full-state push from the control plane.
    ///
    /// `resources` is the complete current resource set of the source;
    /// anything known locally but absent from the batch is removed.
    pub fn on_update(
        &self,
        resources: &[serde_json::Value],
        version: &str,
    ) -> Result<(), UpdateError> {
        match self.validate_and_apply(resources, version) {
            Ok(()) => {
                self.init_target.ready();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    subscription = %self.name,
                    version = %version,
                    error = %e,
                    "srds: rejecting configuration update, keeping current configuration"
                );
                metrics::record_update_rejected(&self.stat_prefix, e.reason());
                Err(e)
            }
        }
    }

    fn validate_and_apply(
        &self,
        resources: &[serde_json::Value],
        version: &str,
    ) -> Result<(), UpdateError> {
        // Steps 1-3 are pure validation; no shared state is touched until
        // every resource in the batch has passed.
        let mut parsed: Vec<(ScopedRouteConfig, serde_json::Value)> =
            Vec::with_capacity(resources.len());
        for raw in resources {
            let config: ScopedRouteConfig = serde_json::from_value(raw.clone())
                .map_err(UpdateError::MalformedResource)?;
            parsed.push((config, raw.clone()));
        }

        let mut names = HashSet::new();
        for (config, _) in &parsed {
            if !names.insert(config.name.clone()) {
                return Err(UpdateError::DuplicateResourceName(config.name.clone()));
            }
        }

        for (config, _) in &parsed {
            validate_scoped_route(config).map_err(|errors| UpdateError::Invalid {
                name: config.name.clone(),
                errors,
            })?;
        }

        let mut state = self.lock_state();

        // Names omitted from this authoritative push are deletions.
        let mut to_remove: HashSet<String> =
            state.store.scope_names().map(str::to_string).collect();

        for (config, raw) in parsed {
            to_remove.remove(&config.name);
            let table = self.route_tables.get_or_create(&config.route_table);
            let entry = Arc::new(RoutingScopeEntry::new(&config, table, raw));

            tracing::debug!(
                subscription = %self.name,
                scope = %entry.name(),
                "srds: add/update routing scope"
            );
            if let KeyIndexOutcome::Displaced { previous } =
                state.store.add_or_update(Arc::clone(&entry))
            {
                tracing::warn!(
                    subscription = %self.name,
                    scope = %entry.name(),
                    displaced = %previous,
                    key = %entry.key(),
                    "srds: scope key conflict, key index prefers most recent entry"
                );
                metrics::record_key_conflict(&self.stat_prefix);
            }
            state.propagator.post(SnapshotOp {
                version: version.to_string(),
                kind: OpKind::AddOrUpdate(entry),
            });
        }

        for name in to_remove {
            tracing::debug!(
                subscription = %self.name,
                scope = %name,
                "srds: remove routing scope"
            );
            state.store.remove(&name);
            state.propagator.post(SnapshotOp {
                version: version.to_string(),
                kind: OpKind::Remove(name),
            });
        }

        state.store.set_version(version);
        metrics::record_config_reload(&self.stat_prefix);
        tracing::info!(
            subscription = %self.name,
            version = %version,
            scopes = state.store.len(),
            "srds: configuration updated"
        );
        Ok(())
    }

    /// Report a transport-level failure. The store stays at the last-good
    /// version; retry policy belongs to the transport.
    pub fn on_update_failed(&self, error: &dyn std::fmt::Display) {
        tracing::warn!(
            subscription = %self.name,
            error = %error,
            "srds: update fetch failed, keeping current configuration"
        );
        metrics::record_update_rejected(&self.stat_prefix, "transport");
        // First-attempt failure still unblocks startup; the proxy serves
        // whatever configuration it has.
        self.init_target.ready();
    }

    /// Snapshot of the canonical store.
    pub fn snapshot(&self) -> Arc<ScopedConfigSnapshot> {
        self.lock_state().store.snapshot()
    }

    /// Last applied version token (empty before the first update).
    pub fn version(&self) -> String {
        self.lock_state().store.version().to_string()
    }

    /// Wall-clock time of the last applied update.
    pub fn last_updated(&self) -> Option<SystemTime> {
        self.lock_state().store.last_updated()
    }

    /// `(scope_name, source_config)` pairs currently active, for the dump.
    pub fn dump_entries(&self) -> Vec<(String, serde_json::Value)> {
        let state = self.lock_state();
        let mut entries: Vec<(String, serde_json::Value)> = state
            .store
            .entries()
            .map(|e| (e.name().to_string(), e.source_config().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SubscriptionState> {
        self.state.lock().expect("subscription state lock poisoned")
    }
}

impl Drop for ScopedConfigSubscription {
    fn drop(&mut self) {
        // Last consumer reference released: cancel the fetch, unregister
        // from the manager, and never wedge startup.
        self.transport.stop();
        self.init_target.ready();
        if let Some(manager) = self.manager.upgrade() {
            manager.unregister_subscription(self.identity);
        }
        tracing::debug!(subscription = %self.name, "srds: subscription torn down");
    }
}
