//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::error::{Result, ScaffoldError};

impl AppSettings {
    /// Load settings from a JSON file (`appsettings.json` layout).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ScaffoldError::Config(format!("failed to parse config file: {}", e))
        })
    }
}

impl GeneratorConfig {
    /// Validate the resolved configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    const VALID_JSON: &str = r#"{
  "CodeGenerator": {
    "connection": "Server=tcp:localhost,1433;Database=Northwind;User Id=sa;Password=pass",
    "provider": "SqlServer",
    "namespace": "Northwind.Data",
    "output": "./out",
    "pluralize": false,
    "dataAnnotations": true,
    "contextName": "NorthwindContext",
    "maxConnections": 4
  }
}"#;

    #[test]
    fn test_from_json_valid() {
        let settings = AppSettings::from_json(VALID_JSON).unwrap();
        let cg = &settings.code_generator;
        assert_eq!(cg.provider.as_deref(), Some("SqlServer"));
        assert_eq!(cg.namespace.as_deref(), Some("Northwind.Data"));
        assert_eq!(cg.pluralize, Some(false));
        assert_eq!(cg.max_connections, Some(4));
    }

    #[test]
    fn test_from_json_invalid_syntax() {
        let result = AppSettings::from_json("{ not json");
        assert!(matches!(result, Err(ScaffoldError::Config(_))));
    }

    #[test]
    fn test_from_json_empty_object_is_all_defaults() {
        let settings = AppSettings::from_json("{}").unwrap();
        assert!(settings.code_generator.connection.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(VALID_JSON.as_bytes()).unwrap();
        file.flush().unwrap();

        let settings = AppSettings::load(file.path()).unwrap();
        assert_eq!(
            settings.code_generator.context_name.as_deref(),
            Some("NorthwindContext")
        );
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let settings = AppSettings::from_json(
            r#"{ "CodeGenerator": { "connection": "host=localhost user=pg" } }"#,
        )
        .unwrap();
        let config =
            GeneratorConfig::resolve(&settings.code_generator, Overrides::default()).unwrap();

        assert_eq!(config.provider, DatabaseProvider::SqlServer);
        assert_eq!(config.namespace, "GeneratedApp.Data");
        assert_eq!(config.output, PathBuf::from("./Generated"));
        assert!(config.pluralize);
        assert!(config.data_annotations);
        assert_eq!(config.context_name, "AppDbContext");
        assert_eq!(config.max_connections, 10);
        assert!(!config.detect_unique_constraints);
    }

    #[test]
    fn test_resolve_flag_overrides_win() {
        let settings = AppSettings::from_json(VALID_JSON).unwrap();
        let overrides = Overrides {
            namespace: Some("Flag.Namespace".to_string()),
            provider: Some(DatabaseProvider::PostgreSql),
            pluralize: Some(true),
            ..Overrides::default()
        };
        let config = GeneratorConfig::resolve(&settings.code_generator, overrides).unwrap();

        assert_eq!(config.namespace, "Flag.Namespace");
        assert_eq!(config.provider, DatabaseProvider::PostgreSql);
        assert!(config.pluralize, "flag overrides file value");
        assert_eq!(config.context_name, "NorthwindContext");
    }

    #[test]
    fn test_resolve_requires_connection() {
        let result = GeneratorConfig::resolve(&CodeGeneratorConfig::default(), Overrides::default());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("connection"));
    }

    #[test]
    fn test_resolve_rejects_bad_namespace() {
        let settings = AppSettings::from_json(
            r#"{ "CodeGenerator": { "connection": "x", "namespace": "Bad Namespace" } }"#,
        )
        .unwrap();
        assert!(GeneratorConfig::resolve(&settings.code_generator, Overrides::default()).is_err());
    }

    #[test]
    fn test_provider_name_factory_tokens() {
        assert_eq!(
            DatabaseProvider::from_provider_name("Microsoft.Data.SqlClient").unwrap(),
            DatabaseProvider::SqlServer
        );
        assert_eq!(
            DatabaseProvider::from_provider_name("MYSQL.DATA.MYSQLCLIENT").unwrap(),
            DatabaseProvider::MySql
        );
        assert_eq!(
            DatabaseProvider::from_provider_name("npgsql").unwrap(),
            DatabaseProvider::PostgreSql
        );
    }

    #[test]
    fn test_provider_name_unsupported_token_is_reported() {
        let err = DatabaseProvider::from_provider_name("UnsupportedProvider").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unsupported provider"));
        assert!(msg.contains("UnsupportedProvider"));
    }

    #[test]
    fn test_provider_parse_aliases() {
        assert_eq!(
            DatabaseProvider::parse("PostgreSql").unwrap(),
            DatabaseProvider::PostgreSql
        );
        assert_eq!(DatabaseProvider::parse("mssql").unwrap(), DatabaseProvider::SqlServer);
        assert_eq!(DatabaseProvider::parse("MariaDB").unwrap(), DatabaseProvider::MySql);
        assert!(DatabaseProvider::parse("oracle").is_err());
    }

    #[test]
    fn test_default_schemas() {
        assert_eq!(DatabaseProvider::SqlServer.default_schema(), Some("dbo"));
        assert_eq!(DatabaseProvider::PostgreSql.default_schema(), Some("public"));
        assert_eq!(DatabaseProvider::MySql.default_schema(), None);
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let settings = AppSettings::from_json(VALID_JSON).unwrap();
        let config =
            GeneratorConfig::resolve(&settings.code_generator, Overrides::default()).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("Password=pass"));
    }
}
