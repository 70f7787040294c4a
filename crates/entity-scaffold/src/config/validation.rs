//! Resolved-configuration validation.

use crate::error::{Result, ScaffoldError};

use super::types::GeneratorConfig;

pub(crate) fn validate(config: &GeneratorConfig) -> Result<()> {
    if config.connection_string.trim().is_empty() {
        return Err(ScaffoldError::Config(
            "connection string must not be empty".to_string(),
        ));
    }

    if config.namespace.trim().is_empty() {
        return Err(ScaffoldError::Config("namespace must not be empty".to_string()));
    }
    for segment in config.namespace.split('.') {
        if !is_identifier(segment) {
            return Err(ScaffoldError::Config(format!(
                "invalid namespace segment '{}' in '{}'",
                segment, config.namespace
            )));
        }
    }

    if !is_identifier(&config.context_name) {
        return Err(ScaffoldError::Config(format!(
            "invalid context class name '{}'",
            config.context_name
        )));
    }

    if config.output.as_os_str().is_empty() {
        return Err(ScaffoldError::Config(
            "output directory must not be empty".to_string(),
        ));
    }

    if config.max_connections == 0 {
        return Err(ScaffoldError::Config(
            "maxConnections must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("AppDbContext"));
        assert!(is_identifier("_internal"));
        assert!(!is_identifier("1Bad"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("has space"));
    }
}
