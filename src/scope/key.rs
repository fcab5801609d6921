//! Scope key type.

use std::fmt;

/// An ordered sequence of opaque fragments used to select a routing scope.
///
/// Keys compare by full fragment equality; there is no partial or prefix
/// matching. Built either from a scoped route's configured fragments or
/// from a request by the [`ScopeKeyBuilder`](super::key_builder::ScopeKeyBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    fragments: Vec<String>,
}

impl ScopeKey {
    /// Build a key from its fragments.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// The key's fragments, in order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fragments.join(","))
    }
}
