//! Scope key derivation and matching.
//!
//! # Data Flow
//! ```text
//! Incoming Request (headers)
//!     → key_builder.rs (apply fragment extraction rules)
//!     → ScopeKey (ordered fragments)
//!     → snapshot lookup (exact-match map probe)
//!     → Return: route table reference or None
//! ```
//!
//! # Design Decisions
//! - Exact key matching only; no prefix or wildcard semantics
//! - No allocation-heavy work beyond assembling the fragment vector
//! - Builder rules are frozen at configuration time

pub mod key;
pub mod key_builder;

pub use key::ScopeKey;
pub use key_builder::ScopeKeyBuilder;
