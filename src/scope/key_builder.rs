//! Scope key construction from request attributes.
//!
//! # Responsibilities
//! - Extract one key fragment per configured rule, in order
//! - Support whole-header-value and keyed-element extraction
//! - Yield no key when any configured fragment is missing
//!
//! # Design Decisions
//! - Extraction rules are configuration, not runtime state
//! - Deterministic: same headers always build the same key
//! - A missing fragment means "no key" (lookup misses) rather than a
//!   partial key, so scopes never match on incomplete input

use axum::body::Body;
use axum::http::{HeaderMap, Request};

use crate::config::schema::{FragmentRule, ScopeKeyBuilderConfig};
use crate::scope::key::ScopeKey;

/// Builds scope keys from request headers according to configured rules.
#[derive(Debug, Clone)]
pub struct ScopeKeyBuilder {
    rules: Vec<FragmentRule>,
}

impl ScopeKeyBuilder {
    /// Create a builder from its configuration.
    pub fn new(config: ScopeKeyBuilderConfig) -> Self {
        Self {
            rules: config.fragments,
        }
    }

    /// Build a key from a request. Returns `None` if any fragment is missing.
    pub fn build(&self, req: &Request<Body>) -> Option<ScopeKey> {
        self.build_from_headers(req.headers())
    }

    /// Build a key from a header map. Returns `None` if any fragment is missing.
    pub fn build_from_headers(&self, headers: &HeaderMap) -> Option<ScopeKey> {
        let mut fragments = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            fragments.push(extract_fragment(rule, headers)?);
        }
        Some(ScopeKey::from_fragments(fragments))
    }
}

fn extract_fragment(rule: &FragmentRule, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(&rule.header)?.to_str().ok()?;

    match &rule.element {
        None => Some(value.to_string()),
        Some(element) => value
            .split(&rule.element_separator)
            .filter_map(|part| part.trim().split_once(&element.separator))
            .find(|(key, _)| *key == element.key)
            .map(|(_, fragment)| fragment.to_string()),
    }
}
