//! Error types for the scaffolding library.

use thiserror::Error;

/// Main error type for scaffolding operations.
#[derive(Error, Debug)]
pub enum ScaffoldError {
    /// Configuration error (missing connection string, bad provider, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server connection or catalog query error
    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// MySQL connection or catalog query error
    #[error("MySQL error: {0}")]
    MySql(#[from] sqlx::Error),

    /// PostgreSQL connection or catalog query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A catalog row set violates a schema invariant; table-local and recoverable
    #[error("Schema error for {subject}: {message}")]
    Schema { subject: String, message: String },

    /// Internal fault while classifying a table pair
    #[error("Relationship analysis failed: {0}")]
    Relationship(String),

    /// Failure from the source emitter
    #[error("Code generation failed: {0}")]
    CodeGeneration(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Scaffolding cancelled")]
    Cancelled,
}

impl ScaffoldError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        ScaffoldError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Schema error naming the offending table, index or constraint
    pub fn schema(subject: impl Into<String>, message: impl Into<String>) -> Self {
        ScaffoldError::Schema {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI: 0 is reserved for success, everything here is 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for scaffolding operations.
pub type Result<T> = std::result::Result<T, ScaffoldError>;
