//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScaffoldError};
use crate::pool::DEFAULT_MAX_CONNECTIONS;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseProvider {
    SqlServer,
    MySql,
    PostgreSql,
}

impl DatabaseProvider {
    /// Discriminate on an ADO provider-name token (case-insensitive).
    ///
    /// Recognized tokens: `microsoft.data.sqlclient`, `mysql.data.mysqlclient`,
    /// `npgsql`. Anything else is an unsupported provider.
    pub fn from_provider_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "microsoft.data.sqlclient" => Ok(DatabaseProvider::SqlServer),
            "mysql.data.mysqlclient" => Ok(DatabaseProvider::MySql),
            "npgsql" => Ok(DatabaseProvider::PostgreSql),
            _ => Err(ScaffoldError::Config(format!(
                "unsupported provider: {}",
                name
            ))),
        }
    }

    /// Lenient parse accepting both provider-name tokens and common engine
    /// aliases, used for config-file and flag values.
    pub fn parse(value: &str) -> Result<Self> {
        if let Ok(provider) = Self::from_provider_name(value) {
            return Ok(provider);
        }
        match value.trim().to_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(DatabaseProvider::SqlServer),
            "mysql" | "mariadb" => Ok(DatabaseProvider::MySql),
            "postgresql" | "postgres" | "pg" => Ok(DatabaseProvider::PostgreSql),
            _ => Err(ScaffoldError::Config(format!(
                "unsupported provider: {}",
                value
            ))),
        }
    }

    /// The invariant ADO provider name.
    pub fn provider_name(&self) -> &'static str {
        match self {
            DatabaseProvider::SqlServer => "Microsoft.Data.SqlClient",
            DatabaseProvider::MySql => "MySql.Data.MySqlClient",
            DatabaseProvider::PostgreSql => "Npgsql",
        }
    }

    /// Default schema introspected when none is configured.
    ///
    /// MySQL has no fixed default; the reader falls back to the connection's
    /// current database.
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            DatabaseProvider::SqlServer => Some("dbo"),
            DatabaseProvider::MySql => None,
            DatabaseProvider::PostgreSql => Some("public"),
        }
    }
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_name())
    }
}

/// The `CodeGenerator` object of `appsettings.json`. Every field is optional;
/// CLI flags override whatever is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeGeneratorConfig {
    /// Database connection string.
    pub connection: Option<String>,

    /// Provider name or engine alias.
    pub provider: Option<String>,

    /// Namespace for emitted code.
    pub namespace: Option<String>,

    /// Output directory.
    pub output: Option<PathBuf>,

    /// Pluralize collection navigation names.
    pub pluralize: Option<bool>,

    /// Emit validation annotations on entity properties.
    pub data_annotations: Option<bool>,

    /// Class name of the emitted context file.
    pub context_name: Option<String>,

    /// Schema to introspect; engine default when absent.
    pub schema: Option<String>,

    /// Connection pool ceiling.
    pub max_connections: Option<usize>,

    /// Route foreign-key configuration through the analyzer's unique-index
    /// predicate instead of never reporting a unique constraint.
    pub detect_unique_constraints: Option<bool>,
}

/// Root of `appsettings.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(rename = "CodeGenerator", default)]
    pub code_generator: CodeGeneratorConfig,
}

/// Fully resolved generator configuration: file values merged with overrides
/// and defaults applied.
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Database connection string.
    pub connection_string: String,

    /// Target engine.
    pub provider: DatabaseProvider,

    /// Namespace for emitted code.
    pub namespace: String,

    /// Output directory.
    pub output: PathBuf,

    /// Pluralize collection navigation names.
    pub pluralize: bool,

    /// Emit validation annotations.
    pub data_annotations: bool,

    /// Context class name.
    pub context_name: String,

    /// Schema to introspect; engine default when `None`.
    pub schema: Option<String>,

    /// Connection pool ceiling.
    pub max_connections: usize,

    /// See [`CodeGeneratorConfig::detect_unique_constraints`].
    pub detect_unique_constraints: bool,
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("connection_string", &"[REDACTED]")
            .field("provider", &self.provider)
            .field("namespace", &self.namespace)
            .field("output", &self.output)
            .field("pluralize", &self.pluralize)
            .field("data_annotations", &self.data_annotations)
            .field("context_name", &self.context_name)
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .field("detect_unique_constraints", &self.detect_unique_constraints)
            .finish()
    }
}

/// Values supplied on the command line, overriding the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub connection: Option<String>,
    pub provider: Option<DatabaseProvider>,
    pub namespace: Option<String>,
    pub output: Option<PathBuf>,
    pub pluralize: Option<bool>,
    pub data_annotations: Option<bool>,
}

impl GeneratorConfig {
    /// Merge file values with CLI overrides and apply defaults.
    pub fn resolve(file: &CodeGeneratorConfig, overrides: Overrides) -> Result<Self> {
        let connection_string = overrides
            .connection
            .or_else(|| file.connection.clone())
            .ok_or_else(|| {
                ScaffoldError::Config(
                    "no connection string: pass --connection or set CodeGenerator.connection"
                        .to_string(),
                )
            })?;

        let provider = match overrides.provider {
            Some(p) => p,
            None => match &file.provider {
                Some(raw) => DatabaseProvider::parse(raw)?,
                None => DatabaseProvider::SqlServer,
            },
        };

        let config = Self {
            connection_string,
            provider,
            namespace: overrides
                .namespace
                .or_else(|| file.namespace.clone())
                .unwrap_or_else(|| "GeneratedApp.Data".to_string()),
            output: overrides
                .output
                .or_else(|| file.output.clone())
                .unwrap_or_else(|| PathBuf::from("./Generated")),
            pluralize: overrides.pluralize.or(file.pluralize).unwrap_or(true),
            data_annotations: overrides
                .data_annotations
                .or(file.data_annotations)
                .unwrap_or(true),
            context_name: file
                .context_name
                .clone()
                .unwrap_or_else(|| "AppDbContext".to_string()),
            schema: file.schema.clone().filter(|s| !s.trim().is_empty()),
            max_connections: file.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
            detect_unique_constraints: file.detect_unique_constraints.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }
}
