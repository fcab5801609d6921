//! Route tables and virtual hosts.
//!
//! # Responsibilities
//! - Hold the virtual hosts of each named route table
//! - Support by-name insertion/removal from on-demand discovery
//! - Share tables by reference across scope entries
//!
//! # Design Decisions
//! - Tables are shared via Arc; scope entries never copy them
//! - Virtual host entries are immutable; updates replace by name
//! - Concurrent map allows discovery merges while workers read

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::schema::{RouteTableConfig, VirtualHostConfig};

/// A virtual host within a route table. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualHost {
    /// Unique name within the owning table.
    pub name: String,

    /// Domains served by this virtual host.
    pub domains: Vec<String>,
}

impl From<VirtualHostConfig> for VirtualHost {
    fn from(config: VirtualHostConfig) -> Self {
        Self {
            name: config.name,
            domains: config.domains,
        }
    }
}

/// A named route table holding virtual hosts keyed by name.
#[derive(Debug)]
pub struct RouteTable {
    name: String,
    virtual_hosts: DashMap<String, Arc<VirtualHost>>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            virtual_hosts: DashMap::new(),
        }
    }

    /// Create a table pre-populated from inline configuration.
    pub fn from_config(config: RouteTableConfig) -> Self {
        let table = Self::new(config.name);
        for vh in config.virtual_hosts {
            table.insert_virtual_host(Arc::new(VirtualHost::from(vh)));
        }
        table
    }

    /// The table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or replace a virtual host by name.
    pub fn insert_virtual_host(&self, vh: Arc<VirtualHost>) {
        self.virtual_hosts.insert(vh.name.clone(), vh);
    }

    /// Remove a virtual host by name. Returns whether it was present.
    pub fn remove_virtual_host(&self, name: &str) -> bool {
        self.virtual_hosts.remove(name).is_some()
    }

    /// Look up a virtual host by name.
    pub fn virtual_host(&self, name: &str) -> Option<Arc<VirtualHost>> {
        self.virtual_hosts.get(name).map(|vh| Arc::clone(&vh))
    }

    /// Whether a virtual host with this name is present.
    pub fn has_virtual_host(&self, name: &str) -> bool {
        self.virtual_hosts.contains_key(name)
    }

    /// Number of virtual hosts currently in the table.
    pub fn len(&self) -> usize {
        self.virtual_hosts.len()
    }

    /// Whether the table holds no virtual hosts.
    pub fn is_empty(&self) -> bool {
        self.virtual_hosts.is_empty()
    }
}

/// Registry of route tables shared across scope entries.
///
/// Tables materialize on first reference: a scoped route may name a table
/// before any of its contents have been discovered.
#[derive(Debug, Default)]
pub struct RouteTableRegistry {
    tables: DashMap<String, Arc<RouteTable>>,
}

impl RouteTableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the table with this name, creating an empty one if absent.
    pub fn get_or_create(&self, name: &str) -> Arc<RouteTable> {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RouteTable::new(name)))
            .clone()
    }

    /// Register a pre-populated table, replacing any existing one.
    pub fn insert(&self, table: Arc<RouteTable>) {
        self.tables.insert(table.name().to_string(), table);
    }

    /// Fetch the table with this name if present.
    pub fn get(&self, name: &str) -> Option<Arc<RouteTable>> {
        self.tables.get(name).map(|t| Arc::clone(&t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_replace_virtual_host() {
        let table = RouteTable::new("rt");
        table.insert_virtual_host(Arc::new(VirtualHost {
            name: "vh".into(),
            domains: vec!["a.example.com".into()],
        }));
        table.insert_virtual_host(Arc::new(VirtualHost {
            name: "vh".into(),
            domains: vec!["b.example.com".into()],
        }));

        assert_eq!(table.len(), 1);
        let vh = table.virtual_host("vh").unwrap();
        assert_eq!(vh.domains, vec!["b.example.com"]);
    }

    #[test]
    fn test_registry_get_or_create_shares_instance() {
        let registry = RouteTableRegistry::new();
        let a = registry.get_or_create("rt");
        let b = registry.get_or_create("rt");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_remove_virtual_host() {
        let table = RouteTable::new("rt");
        table.insert_virtual_host(Arc::new(VirtualHost {
            name: "vh".into(),
            domains: vec![],
        }));
        assert!(table.remove_virtual_host("vh"));
        assert!(!table.remove_virtual_host("vh"));
        assert!(table.is_empty());
    }
}
