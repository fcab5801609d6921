//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check scoped routes reference a route table and carry a usable key
//! - Detect empty names and empty key fragments
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed resource
//! - Runs before any resource is merged into shared state

use thiserror::Error;

use crate::config::schema::ScopedRouteConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Resource name is empty.
    #[error("scoped route has an empty name")]
    EmptyName,

    /// Scope key has no fragments at all.
    #[error("scoped route '{0}' has an empty scope key")]
    EmptyKey(String),

    /// A key fragment is the empty string.
    #[error("scoped route '{0}' has an empty key fragment")]
    EmptyFragment(String),

    /// No route table is referenced.
    #[error("scoped route '{0}' references no route table")]
    MissingRouteTable(String),
}

/// Validate a single scoped route resource, collecting every failure.
pub fn validate_scoped_route(config: &ScopedRouteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.is_empty() {
        errors.push(ValidationError::EmptyName);
    }
    if config.key.is_empty() {
        errors.push(ValidationError::EmptyKey(config.name.clone()));
    }
    if config.key.iter().any(|fragment| fragment.is_empty()) {
        errors.push(ValidationError::EmptyFragment(config.name.clone()));
    }
    if config.route_table.is_empty() {
        errors.push(ValidationError::MissingRouteTable(config.name.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ScopedRouteConfig {
        ScopedRouteConfig {
            name: "scope-a".into(),
            route_table: "rt-a".into(),
            key: vec!["us".into()],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_scoped_route(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut cfg = valid_config();
        cfg.key.clear();
        let errors = validate_scoped_route(&cfg).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyKey("scope-a".into())]);
    }

    #[test]
    fn test_all_errors_collected() {
        let cfg = ScopedRouteConfig {
            name: String::new(),
            route_table: String::new(),
            key: vec![String::new()],
        };
        let errors = validate_scoped_route(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::EmptyName));
        assert!(errors.contains(&ValidationError::EmptyFragment(String::new())));
        assert!(errors.contains(&ValidationError::MissingRouteTable(String::new())));
    }
}
