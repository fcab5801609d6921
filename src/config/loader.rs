//! Inline configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::InlineScopedRoutes;
use crate::config::validation::{validate_scoped_route, ValidationError};

/// Error type for inline configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for the expected schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantic validation failed.
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate an inline scoped-routes configuration from a TOML file.
pub fn load_inline_config(path: &Path) -> Result<InlineScopedRoutes, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: InlineScopedRoutes = toml::from_str(&content)?;

    let mut errors = Vec::new();
    for scope in &config.scopes {
        if let Err(mut scope_errors) = validate_scoped_route(scope) {
            errors.append(&mut scope_errors);
        }
    }
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "scoped-router-test-{}-{:?}.toml",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_valid_inline_config() {
        let path = write_temp(
            r#"
            [key_builder]
            [[key_builder.fragments]]
            header = "x-region"

            [[scopes]]
            name = "scope-us"
            route_table = "rt-us"
            key = ["us"]

            [[route_tables]]
            name = "rt-us"
            [[route_tables.virtual_hosts]]
            name = "vh-www"
            domains = ["www.example.com"]
            "#,
        );
        let config = load_inline_config(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.scopes.len(), 1);
        assert_eq!(config.scopes[0].name, "scope-us");
        assert_eq!(config.key_builder.fragments[0].header, "x-region");
        assert_eq!(config.route_tables[0].virtual_hosts[0].name, "vh-www");
    }

    #[test]
    fn test_load_rejects_invalid_scope() {
        let path = write_temp(
            r#"
            [[scopes]]
            name = "broken"
            route_table = ""
            key = []
            "#,
        );
        let err = load_inline_config(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
