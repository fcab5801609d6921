//! Configuration providers and the provider manager.
//!
//! # Responsibilities
//! - Present one capability set (current snapshot, last updated, dump)
//!   over both static and subscription-backed configuration
//! - Share one subscription across consumers with equal source identity
//! - Produce the structured introspection dump
//!
//! # Design Decisions
//! - Inline vs. dynamic is a two-variant enum, not a class hierarchy;
//!   callers dispatch on capability
//! - The manager holds only weak registry entries; consumers hold the
//!   owning handles, and a subscription unregisters itself when the last
//!   one is dropped
//! - The dump is introspection only and never feeds the request path

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::schema::{ScopedRouteConfig, SourceDescription};
use crate::config::validation::validate_scoped_route;
use crate::init::InitManager;
use crate::observability::metrics;
use crate::routing::RouteTableRegistry;
use crate::snapshot::{ScopedConfigSnapshot, WorkerConfigReader, WorkerScopedConfig};
use crate::store::{KeyIndexOutcome, RoutingScopeEntry, ScopeConfigStore};
use crate::subscription::{
    ScopedConfigSubscription, SubscriptionIdentity, SubscriptionTransport, UpdateError,
};

/// A provider of scoped routing configuration, static or dynamic.
#[derive(Clone)]
pub enum ConfigProvider {
    /// Fixed configuration set at startup; never changes.
    Inline(Arc<InlineProvider>),
    /// Live configuration backed by a shared subscription.
    Dynamic(DynamicProvider),
}

impl ConfigProvider {
    /// The provider's identifying name.
    pub fn name(&self) -> &str {
        match self {
            ConfigProvider::Inline(p) => p.name(),
            ConfigProvider::Dynamic(p) => p.subscription().name(),
        }
    }

    /// The current configuration snapshot.
    pub fn current_snapshot(&self) -> Arc<ScopedConfigSnapshot> {
        match self {
            ConfigProvider::Inline(p) => p.snapshot(),
            ConfigProvider::Dynamic(p) => p.subscription().snapshot(),
        }
    }

    /// When the configuration last changed (construction time for inline).
    pub fn last_updated(&self) -> Option<SystemTime> {
        match self {
            ConfigProvider::Inline(p) => Some(p.created_at()),
            ConfigProvider::Dynamic(p) => p.subscription().last_updated(),
        }
    }
}

/// Provider over a fixed, validated configuration blob set.
#[derive(Debug)]
pub struct InlineProvider {
    name: String,
    snapshot: Arc<ScopedConfigSnapshot>,
    source_configs: Vec<serde_json::Value>,
    created_at: SystemTime,
}

impl InlineProvider {
    /// The provider's identifying name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed configuration snapshot.
    pub fn snapshot(&self) -> Arc<ScopedConfigSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Request-path reader over the fixed snapshot.
    pub fn reader(&self) -> WorkerConfigReader {
        WorkerConfigReader::fixed(Arc::clone(&self.snapshot))
    }

    /// Construction time, reported as last-updated in the dump.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Owning handle over a shared dynamic subscription.
///
/// Cloning shares the handle; the underlying subscription is torn down
/// when the last handle (across all consumers) is dropped.
#[derive(Clone)]
pub struct DynamicProvider {
    subscription: Arc<ScopedConfigSubscription>,
}

impl DynamicProvider {
    /// The backing subscription.
    pub fn subscription(&self) -> &Arc<ScopedConfigSubscription> {
        &self.subscription
    }

    /// Register a worker thread with the backing subscription.
    pub fn register_worker(&self) -> WorkerScopedConfig {
        self.subscription.register_worker()
    }
}

/// Structured dump of every live provider's state.
#[derive(Debug, Serialize)]
pub struct ConfigDump {
    /// Subscription-backed providers.
    pub dynamic_scoped_route_configs: Vec<DynamicConfigDump>,
    /// Fixed providers.
    pub inline_scoped_route_configs: Vec<InlineConfigDump>,
}

/// Dump section for one dynamic provider.
#[derive(Debug, Serialize)]
pub struct DynamicConfigDump {
    /// Subscription name.
    pub name: String,
    /// Last applied version token.
    pub version: String,
    /// Last update time, seconds since the Unix epoch.
    pub last_updated: Option<u64>,
    /// Currently active scopes.
    pub scopes: Vec<ScopeConfigDump>,
}

/// One active scope in a dynamic dump section.
#[derive(Debug, Serialize)]
pub struct ScopeConfigDump {
    /// Scope name.
    pub name: String,
    /// The raw configuration the scope was built from.
    pub source_config: serde_json::Value,
}

/// Dump section for one inline provider.
#[derive(Debug, Serialize)]
pub struct InlineConfigDump {
    /// Provider name.
    pub name: String,
    /// Construction time, seconds since the Unix epoch.
    pub last_updated: u64,
    /// The fixed configuration blob set.
    pub scopes: Vec<serde_json::Value>,
}

/// Creates providers and shares subscriptions by source identity.
#[derive(Default)]
pub struct ConfigProviderManager {
    subscriptions: Mutex<HashMap<SubscriptionIdentity, Weak<ScopedConfigSubscription>>>,
    inline_providers: Mutex<Vec<Weak<InlineProvider>>>,
}

impl ConfigProviderManager {
    /// Create an empty manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return the subscription registered under `identity`, or build and
    /// register one with `factory`.
    pub fn get_or_create_subscription<F>(
        self: &Arc<Self>,
        identity: SubscriptionIdentity,
        factory: F,
    ) -> Arc<ScopedConfigSubscription>
    where
        F: FnOnce(Weak<ConfigProviderManager>) -> ScopedConfigSubscription,
    {
        let mut subscriptions = self.lock_subscriptions();
        if let Some(existing) = subscriptions.get(&identity).and_then(Weak::upgrade) {
            tracing::debug!(
                identity = %identity,
                subscription = %existing.name(),
                "srds: reusing shared subscription"
            );
            return existing;
        }
        let subscription = Arc::new(factory(Arc::downgrade(self)));
        subscriptions.insert(identity, Arc::downgrade(&subscription));
        subscription
    }

    /// Drop the registry entry for a torn-down subscription. Called from
    /// the subscription's own teardown; a live entry is left alone.
    pub fn unregister_subscription(&self, identity: SubscriptionIdentity) {
        let mut subscriptions = self.lock_subscriptions();
        // strong_count instead of upgrade: this runs from the subscription's
        // Drop, and materializing an Arc under the registry lock could make
        // this thread the one to re-enter it.
        let dead = subscriptions
            .get(&identity)
            .is_some_and(|weak| weak.strong_count() == 0);
        if dead {
            subscriptions.remove(&identity);
        }
    }

    /// Create a dynamic provider, reusing an existing subscription for an
    /// equal source description.
    pub fn create_dynamic_provider(
        self: &Arc<Self>,
        name: &str,
        source: &SourceDescription,
        route_tables: Arc<RouteTableRegistry>,
        init: &InitManager,
        transport: Arc<dyn SubscriptionTransport>,
    ) -> DynamicProvider {
        let identity = SubscriptionIdentity::from_source(source);
        let subscription = self.get_or_create_subscription(identity, |manager| {
            let target = init.register(&format!("scoped_rds.{name}"));
            ScopedConfigSubscription::new(
                name,
                identity,
                manager,
                route_tables,
                target,
                transport,
            )
        });
        subscription.start();
        DynamicProvider { subscription }
    }

    /// Create an inline provider over a fixed scope set.
    pub fn create_inline_provider(
        &self,
        name: &str,
        scopes: Vec<ScopedRouteConfig>,
        route_tables: &RouteTableRegistry,
    ) -> Result<Arc<InlineProvider>, UpdateError> {
        let mut seen = std::collections::HashSet::new();
        for config in &scopes {
            if !seen.insert(config.name.clone()) {
                return Err(UpdateError::DuplicateResourceName(config.name.clone()));
            }
            validate_scoped_route(config).map_err(|errors| UpdateError::Invalid {
                name: config.name.clone(),
                errors,
            })?;
        }

        let mut store = ScopeConfigStore::new();
        let mut source_configs = Vec::with_capacity(scopes.len());
        for config in &scopes {
            let raw = serde_json::to_value(config).map_err(UpdateError::MalformedResource)?;
            let table = route_tables.get_or_create(&config.route_table);
            let entry = Arc::new(RoutingScopeEntry::new(config, table, raw.clone()));
            if let KeyIndexOutcome::Displaced { previous } = store.add_or_update(entry) {
                tracing::warn!(
                    provider = %name,
                    scope = %config.name,
                    displaced = %previous,
                    "inline scoped routes: scope key conflict"
                );
                metrics::record_key_conflict(&metrics::scoped_rds_prefix(name));
            }
            source_configs.push(raw);
        }

        let provider = Arc::new(InlineProvider {
            name: name.to_string(),
            snapshot: store.snapshot(),
            source_configs,
            created_at: SystemTime::now(),
        });
        self.inline_providers
            .lock()
            .expect("inline provider lock poisoned")
            .push(Arc::downgrade(&provider));
        Ok(provider)
    }

    /// Produce the introspection dump over every live provider.
    pub fn dump(&self) -> ConfigDump {
        // Upgrade under the lock, build (and release the Arcs) outside it,
        // so a racing last-reference drop never re-enters the registry lock.
        let live: Vec<Arc<ScopedConfigSubscription>> = self
            .lock_subscriptions()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        let mut dynamic: Vec<DynamicConfigDump> = live
            .into_iter()
            .map(|subscription| DynamicConfigDump {
                name: subscription.name().to_string(),
                version: subscription.version(),
                last_updated: subscription.last_updated().map(epoch_secs),
                scopes: subscription
                    .dump_entries()
                    .into_iter()
                    .map(|(name, source_config)| ScopeConfigDump {
                        name,
                        source_config,
                    })
                    .collect(),
            })
            .collect();
        dynamic.sort_by(|a, b| a.name.cmp(&b.name));

        let mut inline_providers = self
            .inline_providers
            .lock()
            .expect("inline provider lock poisoned");
        inline_providers.retain(|weak| weak.upgrade().is_some());
        let mut inline: Vec<InlineConfigDump> = inline_providers
            .iter()
            .filter_map(Weak::upgrade)
            .map(|provider| InlineConfigDump {
                name: provider.name().to_string(),
                last_updated: epoch_secs(provider.created_at()),
                scopes: provider.source_configs.clone(),
            })
            .collect();
        inline.sort_by(|a, b| a.name.cmp(&b.name));

        ConfigDump {
            dynamic_scoped_route_configs: dynamic,
            inline_scoped_route_configs: inline,
        }
    }

    /// Number of live shared subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.lock_subscriptions()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn lock_subscriptions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<SubscriptionIdentity, Weak<ScopedConfigSubscription>>>
    {
        self.subscriptions
            .lock()
            .expect("subscription registry lock poisoned")
    }
}

fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeKey;

    fn scope(name: &str, key: &[&str], table: &str) -> ScopedRouteConfig {
        ScopedRouteConfig {
            name: name.into(),
            route_table: table.into(),
            key: key.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_inline_provider_fixed_snapshot() {
        let manager = ConfigProviderManager::new();
        let tables = RouteTableRegistry::new();
        let provider = manager
            .create_inline_provider("static", vec![scope("a", &["us"], "rt-a")], &tables)
            .unwrap();

        let reader = provider.reader();
        let table = reader.lookup(&ScopeKey::from_fragments(["us"])).unwrap();
        assert_eq!(table.name(), "rt-a");
    }

    #[test]
    fn test_inline_provider_rejects_duplicates() {
        let manager = ConfigProviderManager::new();
        let tables = RouteTableRegistry::new();
        let err = manager
            .create_inline_provider(
                "static",
                vec![scope("a", &["us"], "rt-a"), scope("a", &["eu"], "rt-a")],
                &tables,
            )
            .unwrap_err();
        assert!(matches!(err, UpdateError::DuplicateResourceName(_)));
    }

    #[test]
    fn test_dump_includes_inline_provider() {
        let manager = ConfigProviderManager::new();
        let tables = RouteTableRegistry::new();
        let _provider = manager
            .create_inline_provider("static", vec![scope("a", &["us"], "rt-a")], &tables)
            .unwrap();

        let dump = manager.dump();
        assert_eq!(dump.inline_scoped_route_configs.len(), 1);
        assert_eq!(dump.inline_scoped_route_configs[0].name, "static");
        assert_eq!(dump.inline_scoped_route_configs[0].scopes.len(), 1);
    }

    #[test]
    fn test_provider_capability_dispatch() {
        let manager = ConfigProviderManager::new();
        let tables = RouteTableRegistry::new();
        let inline = manager
            .create_inline_provider("static", vec![scope("a", &["us"], "rt-a")], &tables)
            .unwrap();

        let provider = ConfigProvider::Inline(inline);
        assert_eq!(provider.name(), "static");
        assert_eq!(provider.current_snapshot().len(), 1);
        assert!(provider.last_updated().is_some());
    }

    #[test]
    fn test_dump_drops_released_inline_provider() {
        let manager = ConfigProviderManager::new();
        let tables = RouteTableRegistry::new();
        let provider = manager
            .create_inline_provider("static", vec![scope("a", &["us"], "rt-a")], &tables)
            .unwrap();
        drop(provider);

        let dump = manager.dump();
        assert!(dump.inline_scoped_route_configs.is_empty());
    }
}
