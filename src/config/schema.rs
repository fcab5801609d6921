//! Configuration schema definitions.
//!
//! This module defines the resource types delivered by the control plane
//! (scoped routes, route tables, virtual hosts) and the locally configured
//! pieces (scope key builder rules, source descriptions). All types derive
//! Serde traits: control-plane resources arrive as JSON values, inline
//! configuration is deserialized from TOML files.

use serde::{Deserialize, Serialize};

/// A scoped route resource: binds a fixed scope key to a route table.
///
/// Delivered by the control plane as part of a full-state push, or declared
/// inline for static providers. Immutable once parsed; updates replace the
/// whole resource by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScopedRouteConfig {
    /// Unique resource name.
    pub name: String,

    /// Name of the route table this scope selects.
    pub route_table: String,

    /// Ordered key fragments this scope matches.
    pub key: Vec<String>,
}

/// A route table declaration (inline configuration only; dynamically
/// discovered tables start empty and fill via on-demand discovery).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteTableConfig {
    /// Unique route table name.
    pub name: String,

    /// Virtual hosts initially present in the table.
    #[serde(default)]
    pub virtual_hosts: Vec<VirtualHostConfig>,
}

/// A virtual host resource inside a route table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtualHostConfig {
    /// Unique name within its route table.
    pub name: String,

    /// Domains served by this virtual host.
    #[serde(default)]
    pub domains: Vec<String>,
}

/// Scope key builder configuration: an ordered list of fragment
/// extraction rules. The built key has one fragment per rule, in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct ScopeKeyBuilderConfig {
    /// Fragment extraction rules, applied in order.
    pub fragments: Vec<FragmentRule>,
}

/// A single fragment extraction rule.
///
/// Without an `element` section the whole header value is the fragment.
/// With one, the header value is split on `element_separator` and the
/// element whose key matches contributes the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FragmentRule {
    /// Header to read the fragment from.
    pub header: String,

    /// Separator between elements within the header value (default ",").
    #[serde(default = "default_element_separator")]
    pub element_separator: String,

    /// Optional keyed-element extraction within the header value.
    #[serde(default)]
    pub element: Option<ElementRule>,
}

/// Keyed-element extraction: pick the element `key<separator>value` and
/// use `value` as the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ElementRule {
    /// Separator between the element key and its value (e.g. "=").
    pub separator: String,

    /// Element key to look up.
    pub key: String,
}

fn default_element_separator() -> String {
    ",".to_string()
}

/// Description of a control-plane source, used to derive the identity
/// under which subscriptions are shared across consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SourceDescription {
    /// Cluster the subscription fetches from.
    pub cluster: String,

    /// Resource type requested from that cluster.
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
}

fn default_resource_type() -> String {
    "scoped_routes".to_string()
}

/// Root of an inline (static) scoped-routes configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InlineScopedRoutes {
    /// Scope key builder rules.
    pub key_builder: ScopeKeyBuilderConfig,

    /// Fixed scoped route set.
    pub scopes: Vec<ScopedRouteConfig>,

    /// Route tables referenced by the scopes.
    pub route_tables: Vec<RouteTableConfig>,
}
