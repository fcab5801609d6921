//! Subscription identity derivation.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::config::schema::SourceDescription;

/// Value identity of a logical control-plane source.
///
/// Two consumers whose source descriptions hash equal share one underlying
/// subscription instead of duplicating fetches and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionIdentity(u64);

impl SubscriptionIdentity {
    /// Derive the identity of a source description.
    pub fn from_source(source: &SourceDescription) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for SubscriptionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
