//! Canonical scoped-route configuration store.
//!
//! # Responsibilities
//! - Hold the authoritative name → scope entry mapping
//! - Maintain the scope key → name index used for resolution
//! - Track the last applied version token and update timestamp
//! - Produce immutable snapshots for worker threads
//!
//! # Design Decisions
//! - Single logical writer: all mutation happens in the subscription's
//!   control context; the store is never mutated concurrently
//! - Entries are immutable and shared by Arc with every snapshot
//! - Two names claiming one key is not an error: the key index keeps the
//!   most recently applied entry (last writer wins) and the displacement
//!   is reported to the caller for logging and counters

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::schema::ScopedRouteConfig;
use crate::routing::RouteTable;
use crate::scope::ScopeKey;
use crate::snapshot::ScopedConfigSnapshot;

/// A single routing scope: a fixed key bound to a route table.
///
/// Immutable once constructed. An update to the scope produces a new entry
/// that replaces this one by name. The raw source configuration is retained
/// solely for the introspection dump.
#[derive(Debug)]
pub struct RoutingScopeEntry {
    name: String,
    key: ScopeKey,
    route_table: Arc<RouteTable>,
    source_config: serde_json::Value,
}

impl RoutingScopeEntry {
    /// Build an entry from its parsed configuration and resolved table.
    pub fn new(
        config: &ScopedRouteConfig,
        route_table: Arc<RouteTable>,
        source_config: serde_json::Value,
    ) -> Self {
        Self {
            name: config.name.clone(),
            key: ScopeKey::from_fragments(config.key.iter().cloned()),
            route_table,
            source_config,
        }
    }

    /// The scope's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope's lookup key.
    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    /// The route table this scope selects.
    pub fn route_table(&self) -> &Arc<RouteTable> {
        &self.route_table
    }

    /// The raw configuration this entry was built from.
    pub fn source_config(&self) -> &serde_json::Value {
        &self.source_config
    }
}

/// Outcome of a key-index update during [`ScopeConfigStore::add_or_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIndexOutcome {
    /// The key was free or already owned by this scope.
    Clean,
    /// Another scope held this key; the index now prefers the new entry.
    Displaced {
        /// Name of the scope whose key-index mapping was taken over.
        previous: String,
    },
}

/// The canonical, single-writer scope configuration store.
#[derive(Debug, Default)]
pub struct ScopeConfigStore {
    by_name: HashMap<String, Arc<RoutingScopeEntry>>,
    by_key: HashMap<ScopeKey, String>,
    version: String,
    last_updated: Option<SystemTime>,
}

impl ScopeConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry under its name, updating the key index.
    pub fn add_or_update(&mut self, entry: Arc<RoutingScopeEntry>) -> KeyIndexOutcome {
        // A re-added scope may have changed its key; drop the old index
        // mapping if it still points at this scope.
        if let Some(previous) = self.by_name.get(entry.name()).cloned() {
            if previous.key() != entry.key() {
                self.remove_key_index(previous.key(), previous.name());
            }
        }

        let outcome = match self.by_key.get(entry.key()) {
            Some(owner) if owner != entry.name() => KeyIndexOutcome::Displaced {
                previous: owner.clone(),
            },
            _ => KeyIndexOutcome::Clean,
        };

        self.by_key
            .insert(entry.key().clone(), entry.name().to_string());
        self.by_name.insert(entry.name().to_string(), entry);
        outcome
    }

    /// Remove the entry and its key-index mapping if it still points at it.
    pub fn remove(&mut self, name: &str) -> Option<Arc<RoutingScopeEntry>> {
        let entry = self.by_name.remove(name)?;
        self.remove_key_index(entry.key(), name);
        Some(entry)
    }

    fn remove_key_index(&mut self, key: &ScopeKey, name: &str) {
        if self.by_key.get(key).is_some_and(|owner| owner == name) {
            self.by_key.remove(key);
        }
    }

    /// Record the version token of the last applied update.
    pub fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
        self.last_updated = Some(SystemTime::now());
    }

    /// The last applied version token (empty before the first update).
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Wall-clock time of the last applied update.
    pub fn last_updated(&self) -> Option<SystemTime> {
        self.last_updated
    }

    /// Fetch an entry by name.
    pub fn get(&self, name: &str) -> Option<&Arc<RoutingScopeEntry>> {
        self.by_name.get(name)
    }

    /// Resolve a scope key through the key index.
    pub fn resolve(&self, key: &ScopeKey) -> Option<&Arc<RoutingScopeEntry>> {
        self.by_key.get(key).and_then(|name| self.by_name.get(name))
    }

    /// Names of every scope currently present.
    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Iterate over every entry, for introspection.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<RoutingScopeEntry>> {
        self.by_name.values()
    }

    /// Number of scopes currently present.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the store holds no scopes.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Produce an immutable snapshot sharing this store's entries.
    pub fn snapshot(&self) -> Arc<ScopedConfigSnapshot> {
        Arc::new(ScopedConfigSnapshot::from_parts(
            self.by_name.clone(),
            self.by_key.clone(),
            self.version.clone(),
        ))
    }
}
