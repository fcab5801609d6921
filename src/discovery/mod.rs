//! On-demand virtual host discovery.
//!
//! # Responsibilities
//! - Track virtual host names a route table references but does not hold
//! - Issue an incremental discovery request for exactly the missing names
//! - Hold specific lookups pending with a bounded wait
//! - Merge arrivals into the active route table by name, full replacement
//! - Distinguish "empty update" from "resource not found" for counters
//!
//! # Design Decisions
//! - A wait that exceeds its bound reports a timeout and leaves the route
//!   absent; overall startup is never blocked on an unresolved host
//! - The whole update is validated before the first table mutation
//! - The init target signals ready on first update, on failure, and on
//!   teardown, so discovery can never wedge the readiness gate

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

use crate::config::schema::VirtualHostConfig;
use crate::init::InitTarget;
use crate::observability::metrics;
use crate::routing::{RouteTable, VirtualHost};

/// Collaborator that fetches specific virtual hosts from the control plane.
pub trait OnDemandTransport: Send + Sync {
    /// Request exactly these resource names.
    fn request(&self, names: &[String]);
}

/// A transport that never answers. Used where arrivals are driven directly.
#[derive(Debug, Default)]
pub struct NullOnDemandTransport;

impl OnDemandTransport for NullOnDemandTransport {
    fn request(&self, _names: &[String]) {}
}

/// Why a discovery update was rejected or a wait failed.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A resource failed to parse into its typed form.
    #[error("malformed virtual host resource: {0}")]
    MalformedResource(#[source] serde_json::Error),

    /// Two resources in one update share a name.
    #[error("duplicate virtual host '{0}' found")]
    DuplicateResourceName(String),

    /// The bounded wait elapsed before the virtual host arrived.
    #[error("virtual host '{0}' not resolved within the wait bound")]
    Timeout(String),
}

impl DiscoveryError {
    /// Counter label for this failure.
    pub fn reason(&self) -> &'static str {
        match self {
            DiscoveryError::MalformedResource(_) => "malformed",
            DiscoveryError::DuplicateResourceName(_) => "duplicate_name",
            DiscoveryError::Timeout(_) => "timeout",
        }
    }
}

/// Incremental discovery of a route table's virtual hosts.
pub struct VirtualHostDiscovery {
    table: Arc<RouteTable>,
    transport: Arc<dyn OnDemandTransport>,
    pending: Mutex<HashMap<String, Arc<Notify>>>,
    init_target: InitTarget,
    version: Mutex<String>,
}

impl VirtualHostDiscovery {
    /// Create discovery over an active route table.
    pub fn new(
        table: Arc<RouteTable>,
        transport: Arc<dyn OnDemandTransport>,
        init_target: InitTarget,
    ) -> Self {
        Self {
            table,
            transport,
            pending: Mutex::new(HashMap::new()),
            init_target,
            version: Mutex::new(String::new()),
        }
    }

    /// The route table this discovery fills.
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Version token of the last applied update.
    pub fn version(&self) -> String {
        self.version.lock().expect("discovery version lock poisoned").clone()
    }

    /// Request any of `names` not already present or already requested.
    pub fn demand(&self, names: &[String]) {
        let mut pending = self.lock_pending();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !self.table.has_virtual_host(name) && !pending.contains_key(*name))
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }
        for name in &missing {
            pending.insert(name.clone(), Arc::new(Notify::new()));
        }
        drop(pending);

        tracing::debug!(
            table = %self.table.name(),
            names = ?missing,
            "vhds: requesting missing virtual hosts"
        );
        self.transport.request(&missing);
    }

    /// Resolve one virtual host, waiting up to `bound` for it to arrive.
    ///
    /// Issues a discovery request if the name is not already pending. On
    /// timeout the route stays absent and may resolve later.
    pub async fn wait_for(
        &self,
        name: &str,
        bound: Duration,
    ) -> Result<Arc<VirtualHost>, DiscoveryError> {
        if let Some(vh) = self.table.virtual_host(name) {
            return Ok(vh);
        }
        self.demand(&[name.to_string()]);
        let notify = self
            .lock_pending()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone();

        let deadline = Instant::now() + bound;
        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            // Re-check after arming the waiter so an arrival racing the
            // first check is not missed.
            if let Some(vh) = self.table.virtual_host(name) {
                return Ok(vh);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || timeout(remaining, notified).await.is_err() {
                tracing::warn!(
                    table = %self.table.name(),
                    virtual_host = %name,
                    "vhds: virtual host not resolved within wait bound"
                );
                metrics::record_on_demand_timeout(self.table.name());
                self.prune_pending(name, &notify);
                return Err(DiscoveryError::Timeout(name.to_string()));
            }
        }
    }

    /// Apply an incremental update: added resources and removed names.
    ///
    /// Full-replacement semantics per name, like the scoped-routes merge.
    /// An update with no resources at all is counted separately and does
    /// not change the table.
    pub fn on_update(
        &self,
        added: &[serde_json::Value],
        removed: &[String],
        version: &str,
    ) -> Result<(), DiscoveryError> {
        if added.is_empty() && removed.is_empty() {
            tracing::debug!(table = %self.table.name(), "vhds: empty update");
            metrics::record_vhds_update_empty(self.table.name());
            self.init_target.ready();
            return Ok(());
        }

        // Validate the whole update before the first table mutation.
        let mut parsed: Vec<VirtualHostConfig> = Vec::with_capacity(added.len());
        for raw in added {
            parsed.push(
                serde_json::from_value(raw.clone()).map_err(DiscoveryError::MalformedResource)?,
            );
        }
        let mut names = HashSet::new();
        for config in &parsed {
            if !names.insert(config.name.clone()) {
                return Err(DiscoveryError::DuplicateResourceName(config.name.clone()));
            }
        }

        for config in parsed {
            let name = config.name.clone();
            tracing::debug!(
                table = %self.table.name(),
                virtual_host = %name,
                "vhds: add/update virtual host"
            );
            self.table.insert_virtual_host(Arc::new(VirtualHost::from(config)));
            if let Some(notify) = self.lock_pending().remove(&name) {
                notify.notify_waiters();
            }
        }
        for name in removed {
            tracing::debug!(
                table = %self.table.name(),
                virtual_host = %name,
                "vhds: remove virtual host"
            );
            self.table.remove_virtual_host(name);
        }

        *self
            .version
            .lock()
            .expect("discovery version lock poisoned") = version.to_string();
        metrics::record_vhds_config_reload(self.table.name());
        self.init_target.ready();
        Ok(())
    }

    /// Report a transport-level failure; the table keeps its current
    /// contents and pending waits keep waiting until their bound.
    pub fn on_update_failed(&self, error: &dyn std::fmt::Display) {
        tracing::warn!(
            table = %self.table.name(),
            error = %error,
            "vhds: discovery fetch failed"
        );
        self.init_target.ready();
    }

    /// Drop a pending entry after a timed-out wait, unless another waiter
    /// still holds its notifier. A later demand re-requests the name.
    fn prune_pending(&self, name: &str, notify: &Arc<Notify>) {
        let mut pending = self.lock_pending();
        let abandoned = pending
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, notify) && Arc::strong_count(current) <= 2);
        if abandoned {
            pending.remove(name);
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Notify>>> {
        self.pending.lock().expect("discovery pending lock poisoned")
    }
}

impl Drop for VirtualHostDiscovery {
    fn drop(&mut self) {
        // Teardown must never leave the readiness gate waiting.
        self.init_target.ready();
    }
}
