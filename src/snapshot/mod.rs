//! Per-worker immutable configuration snapshots and update propagation.
//!
//! # Data Flow
//! ```text
//! control context (subscription)
//!     → SnapshotOp (immutable mutation description)
//!     → per-worker mpsc queue (FIFO, fire-and-forget)
//!     → worker applies op to its own snapshot, swaps the pointer
//!
//! request path (worker thread)
//!     → WorkerConfigReader::lookup
//!     → one atomic pointer load, then a plain map probe
//! ```
//!
//! # Design Decisions
//! - The control context never touches another thread's snapshot; it only
//!   posts mutation descriptions capturing immutable data
//! - Each worker owns its snapshot exclusively and replaces it wholesale,
//!   so readers racing a swap always see one fully formed version
//! - Updates apply strictly in post order per worker (queue FIFO); there
//!   is no cross-worker ordering guarantee
//! - Every posted mutation carries a weak liveness token; a mutation that
//!   outlives its provider is skipped as a no-op

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::routing::RouteTable;
use crate::scope::ScopeKey;
use crate::store::RoutingScopeEntry;

/// An immutable view of the scoped routing configuration.
///
/// Shares entry objects with the canonical store; entries are immutable so
/// sharing across threads is safe.
#[derive(Debug, Default)]
pub struct ScopedConfigSnapshot {
    by_name: HashMap<String, Arc<RoutingScopeEntry>>,
    by_key: HashMap<ScopeKey, String>,
    version: String,
}

impl ScopedConfigSnapshot {
    /// An empty snapshot with no version.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a snapshot from already-consistent maps.
    pub(crate) fn from_parts(
        by_name: HashMap<String, Arc<RoutingScopeEntry>>,
        by_key: HashMap<ScopeKey, String>,
        version: String,
    ) -> Self {
        Self {
            by_name,
            by_key,
            version,
        }
    }

    /// Resolve a scope key to its route table. Plain map probe; never blocks.
    pub fn lookup(&self, key: &ScopeKey) -> Option<Arc<RouteTable>> {
        self.by_key
            .get(key)
            .and_then(|name| self.by_name.get(name))
            .map(|entry| Arc::clone(entry.route_table()))
    }

    /// Fetch a scope entry by name.
    pub fn get(&self, name: &str) -> Option<&Arc<RoutingScopeEntry>> {
        self.by_name.get(name)
    }

    /// The version token this snapshot reflects.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of scopes in this snapshot.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the snapshot holds no scopes.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Produce the snapshot that results from applying one mutation.
    ///
    /// Mirrors the canonical store's merge semantics exactly, including
    /// last-writer-wins on the key index.
    fn apply(&self, op: &SnapshotOp) -> Self {
        let mut by_name = self.by_name.clone();
        let mut by_key = self.by_key.clone();

        match &op.kind {
            OpKind::AddOrUpdate(entry) => {
                if let Some(previous) = by_name.get(entry.name()) {
                    if previous.key() != entry.key()
                        && by_key
                            .get(previous.key())
                            .is_some_and(|owner| owner == previous.name())
                    {
                        by_key.remove(previous.key());
                    }
                }
                by_key.insert(entry.key().clone(), entry.name().to_string());
                by_name.insert(entry.name().to_string(), Arc::clone(entry));
            }
            OpKind::Remove(name) => {
                if let Some(entry) = by_name.remove(name) {
                    if by_key.get(entry.key()).is_some_and(|owner| owner == name) {
                        by_key.remove(entry.key());
                    }
                }
            }
        }

        Self {
            by_name,
            by_key,
            version: op.version.clone(),
        }
    }
}

/// One mutation of the scoped configuration, captured as immutable data.
#[derive(Debug, Clone)]
pub struct SnapshotOp {
    /// Version token of the update this mutation belongs to.
    pub version: String,
    /// The operation to apply.
    pub kind: OpKind,
}

/// The operation carried by a [`SnapshotOp`].
#[derive(Debug, Clone)]
pub enum OpKind {
    /// Insert or replace this entry by name.
    AddOrUpdate(Arc<RoutingScopeEntry>),
    /// Remove the scope with this name.
    Remove(String),
}

/// Liveness marker owned by the propagator; posted mutations hold a weak
/// reference to it so they become no-ops after provider teardown.
#[derive(Debug)]
pub struct ProviderToken;

/// A mutation posted to one worker's queue.
#[derive(Debug)]
pub struct SnapshotMutation {
    guard: Weak<ProviderToken>,
    op: SnapshotOp,
}

/// Fans mutation descriptions out to every registered worker.
///
/// Owned by the subscription's control context; dropping it invalidates
/// any mutations still sitting in worker queues.
#[derive(Debug)]
pub struct SnapshotPropagator {
    workers: Vec<mpsc::UnboundedSender<SnapshotMutation>>,
    token: Arc<ProviderToken>,
}

impl SnapshotPropagator {
    /// Create a propagator with no workers.
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            token: Arc::new(ProviderToken),
        }
    }

    /// Register a worker, seeding it with the given snapshot.
    pub fn register_worker(&mut self, initial: Arc<ScopedConfigSnapshot>) -> WorkerScopedConfig {
        let (tx, rx) = mpsc::unbounded_channel();
        self.workers.push(tx);
        WorkerScopedConfig {
            cell: Arc::new(ArcSwap::new(initial)),
            rx,
        }
    }

    /// Post one mutation to every worker's queue. Non-blocking; workers
    /// that have gone away are skipped.
    pub fn post(&self, op: SnapshotOp) {
        for tx in &self.workers {
            let _ = tx.send(SnapshotMutation {
                guard: Arc::downgrade(&self.token),
                op: op.clone(),
            });
        }
    }

    /// Number of registered workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Default for SnapshotPropagator {
    fn default() -> Self {
        Self::new()
    }
}

/// A worker thread's exclusively owned configuration state: the current
/// snapshot cell plus the queue of pending mutations.
#[derive(Debug)]
pub struct WorkerScopedConfig {
    cell: Arc<ArcSwap<ScopedConfigSnapshot>>,
    rx: mpsc::UnboundedReceiver<SnapshotMutation>,
}

impl WorkerScopedConfig {
    /// A cheap handle for the request path; clones share the same cell.
    pub fn reader(&self) -> WorkerConfigReader {
        WorkerConfigReader {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Apply the oldest pending mutation, if any. Returns whether one was
    /// applied (a stale mutation consumes the slot but counts as skipped).
    pub fn apply_next(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(mutation) => self.apply(mutation),
            Err(_) => false,
        }
    }

    /// Apply every pending mutation in post order. Returns how many were
    /// applied. Intended to be called from the worker's own loop.
    pub fn poll_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(mutation) = self.rx.try_recv() {
            if self.apply(mutation) {
                applied += 1;
            }
        }
        applied
    }

    /// Drive the worker's update loop until the propagator goes away.
    pub async fn run(mut self) {
        while let Some(mutation) = self.rx.recv().await {
            self.apply(mutation);
        }
    }

    fn apply(&self, mutation: SnapshotMutation) -> bool {
        if mutation.guard.upgrade().is_none() {
            tracing::debug!("skipping snapshot mutation for torn-down provider");
            return false;
        }
        let next = self.cell.load().apply(&mutation.op);
        self.cell.store(Arc::new(next));
        true
    }
}

/// Read-only request-path handle to one worker's snapshot.
///
/// `lookup` takes the snapshot pointer once and reads through it, so a
/// concurrent swap can never tear the read.
#[derive(Debug, Clone)]
pub struct WorkerConfigReader {
    cell: Arc<ArcSwap<ScopedConfigSnapshot>>,
}

impl WorkerConfigReader {
    /// Build a reader over a fixed snapshot (inline providers).
    pub fn fixed(snapshot: Arc<ScopedConfigSnapshot>) -> Self {
        Self {
            cell: Arc::new(ArcSwap::new(snapshot)),
        }
    }

    /// Resolve a scope key against the current snapshot.
    pub fn lookup(&self, key: &ScopeKey) -> Option<Arc<RouteTable>> {
        self.cell.load().lookup(key)
    }

    /// The current snapshot in its entirety.
    pub fn snapshot(&self) -> Arc<ScopedConfigSnapshot> {
        self.cell.load_full()
    }

    /// Version token of the current snapshot.
    pub fn version(&self) -> String {
        self.cell.load().version().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ScopedRouteConfig;

    fn entry(name: &str, key: &[&str], table: &str) -> Arc<RoutingScopeEntry> {
        let config = ScopedRouteConfig {
            name: name.into(),
            route_table: table.into(),
            key: key.iter().map(|s| s.to_string()).collect(),
        };
        let source = serde_json::to_value(&config).unwrap();
        Arc::new(RoutingScopeEntry::new(
            &config,
            Arc::new(RouteTable::new(table)),
            source,
        ))
    }

    fn add(entry: Arc<RoutingScopeEntry>, version: &str) -> SnapshotOp {
        SnapshotOp {
            version: version.into(),
            kind: OpKind::AddOrUpdate(entry),
        }
    }

    fn remove(name: &str, version: &str) -> SnapshotOp {
        SnapshotOp {
            version: version.into(),
            kind: OpKind::Remove(name.into()),
        }
    }

    #[test]
    fn test_worker_applies_in_post_order() {
        let mut propagator = SnapshotPropagator::new();
        let mut worker = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));
        let reader = worker.reader();

        propagator.post(add(entry("a", &["us"], "rt-1"), "v1"));
        propagator.post(add(entry("a", &["us"], "rt-2"), "v2"));
        propagator.post(remove("a", "v3"));

        assert_eq!(worker.poll_updates(), 3);
        assert_eq!(reader.version(), "v3");
        assert!(reader.lookup(&ScopeKey::from_fragments(["us"])).is_none());
    }

    #[test]
    fn test_apply_next_steps_through_queue_in_order() {
        let mut propagator = SnapshotPropagator::new();
        let mut worker = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));
        let reader = worker.reader();

        propagator.post(add(entry("a", &["us"], "rt-1"), "v1"));
        propagator.post(add(entry("a", &["us"], "rt-2"), "v2"));

        assert!(worker.apply_next());
        assert_eq!(reader.version(), "v1");
        let table = reader.lookup(&ScopeKey::from_fragments(["us"])).unwrap();
        assert_eq!(table.name(), "rt-1");

        assert!(worker.apply_next());
        assert_eq!(reader.version(), "v2");
        assert!(!worker.apply_next());
    }

    #[test]
    fn test_lookup_sees_latest_applied_snapshot() {
        let mut propagator = SnapshotPropagator::new();
        let mut worker = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));
        let reader = worker.reader();

        propagator.post(add(entry("a", &["us"], "rt-1"), "v1"));
        worker.poll_updates();

        let table = reader.lookup(&ScopeKey::from_fragments(["us"])).unwrap();
        assert_eq!(table.name(), "rt-1");

        propagator.post(add(entry("a", &["us"], "rt-2"), "v2"));
        worker.poll_updates();

        let table = reader.lookup(&ScopeKey::from_fragments(["us"])).unwrap();
        assert_eq!(table.name(), "rt-2");
    }

    #[test]
    fn test_stale_mutation_is_noop_after_propagator_drop() {
        let mut propagator = SnapshotPropagator::new();
        let mut worker = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));
        let reader = worker.reader();

        propagator.post(add(entry("a", &["us"], "rt-1"), "v1"));
        drop(propagator);

        assert_eq!(worker.poll_updates(), 0);
        assert!(reader.lookup(&ScopeKey::from_fragments(["us"])).is_none());
        assert_eq!(reader.version(), "");
    }

    #[test]
    fn test_workers_apply_independently() {
        let mut propagator = SnapshotPropagator::new();
        let mut worker_a = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));
        let mut worker_b = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));

        propagator.post(add(entry("a", &["us"], "rt-1"), "v1"));
        worker_a.poll_updates();

        // Worker B has not applied yet: eventual consistency across workers.
        assert_eq!(worker_a.reader().version(), "v1");
        assert_eq!(worker_b.reader().version(), "");

        worker_b.poll_updates();
        assert_eq!(worker_b.reader().version(), "v1");
    }

    #[test]
    fn test_remove_preserves_displacement_winner() {
        let mut propagator = SnapshotPropagator::new();
        let mut worker = propagator.register_worker(Arc::new(ScopedConfigSnapshot::empty()));
        let reader = worker.reader();

        propagator.post(add(entry("a", &["us"], "rt-a"), "v1"));
        propagator.post(add(entry("b", &["us"], "rt-b"), "v1"));
        propagator.post(remove("a", "v2"));
        worker.poll_updates();

        let table = reader.lookup(&ScopeKey::from_fragments(["us"])).unwrap();
        assert_eq!(table.name(), "rt-b");
    }
}
