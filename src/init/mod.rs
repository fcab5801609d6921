//! Startup readiness gate.
//!
//! Components that need initial data before the proxy can serve register a
//! target; the gate considers startup complete once every target has
//! signaled ready (first successful update, first failure, or explicit
//! no-op ready). The wait is bounded: stragglers are reported by name and
//! never block startup indefinitely.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

/// Handle a component uses to signal its initial data is available.
///
/// Cloneable; `ready` is idempotent.
#[derive(Debug, Clone)]
pub struct InitTarget {
    name: String,
    tx: Arc<watch::Sender<bool>>,
}

impl InitTarget {
    /// A detached target for contexts with no gate (tests, inline config).
    pub fn detached(name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            name: name.into(),
            tx: Arc::new(tx),
        }
    }

    /// Signal readiness. Safe to call more than once.
    pub fn ready(&self) {
        if !*self.tx.borrow() {
            tracing::debug!(target = %self.name, "init target ready");
        }
        self.tx.send_replace(true);
    }

    /// Whether this target has signaled ready.
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// The target's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collects init targets and waits for all of them with a bound.
#[derive(Debug, Default)]
pub struct InitManager {
    targets: Mutex<Vec<(String, watch::Receiver<bool>)>>,
}

impl InitManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named target.
    pub fn register(&self, name: &str) -> InitTarget {
        let (tx, rx) = watch::channel(false);
        self.targets
            .lock()
            .expect("init manager lock poisoned")
            .push((name.to_string(), rx));
        InitTarget {
            name: name.to_string(),
            tx: Arc::new(tx),
        }
    }

    /// Wait up to `bound` for every registered target.
    ///
    /// Returns the names of targets still pending when the bound elapsed;
    /// an empty vec means startup is complete.
    pub async fn wait_ready(&self, bound: Duration) -> Vec<String> {
        let targets: Vec<(String, watch::Receiver<bool>)> = self
            .targets
            .lock()
            .expect("init manager lock poisoned")
            .clone();

        let mut pending = Vec::new();
        let deadline = tokio::time::Instant::now() + bound;
        for (name, mut rx) in targets {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let ready = matches!(timeout(remaining, rx.wait_for(|r| *r)).await, Ok(Ok(_)));
            // Timed out, or the target was dropped without signaling.
            if !ready && !*rx.borrow() {
                tracing::warn!(target = %name, "init target not ready within bound");
                pending.push(name);
            }
        }
        pending
    }
}
