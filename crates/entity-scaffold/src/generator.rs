//! Top-level scaffolding workflow coordinator.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::analyzer::RelationshipAnalyzer;
use crate::codegen::Emitter;
use crate::config::GeneratorConfig;
use crate::core::relationship::Relationship;
use crate::core::schema::Table;
use crate::core::traits::SchemaReader;
use crate::drivers::SchemaReaderImpl;
use crate::error::Result;

/// Result of a scaffolding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Tables introspected.
    pub tables: usize,

    /// Relationships identified (Unknown pairs excluded).
    pub relationships: usize,

    /// Source files written.
    pub files_written: usize,

    /// Output directory.
    pub output: PathBuf,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

/// Drives introspection, analysis and emission for one configuration.
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Create a generator from a validated configuration.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Introspect the database and return the schema graph without emitting.
    pub async fn read_schema(&self, cancel: &CancellationToken) -> Result<Vec<Table>> {
        let reader = SchemaReaderImpl::from_config(&self.config)?;
        let result = reader.read_tables(cancel).await;
        reader.close().await;
        result
    }

    /// Run the full pipeline: read tables, classify every ordered pair,
    /// emit entities, configurations and the context file.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<GenerationResult> {
        let started = Instant::now();
        info!(
            "Scaffolding {} via {}",
            self.config.namespace,
            self.config.provider.provider_name()
        );

        let tables = self.read_schema(cancel).await.inspect_err(|e| {
            error!("Schema introspection failed. EXCEPTION: {}", e);
        })?;

        let relationships = self.analyze(&tables);
        info!(
            "Classified {} relationships across {} tables",
            relationships.len(),
            tables.len()
        );

        let emitter = Emitter::new(&self.config);
        let written = emitter.write_all(&tables, &relationships)?;

        let result = GenerationResult {
            tables: tables.len(),
            relationships: relationships.len(),
            files_written: written.len(),
            output: self.config.output.clone(),
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            "Scaffolding finished: {} tables, {} relationships, {} files in {:.2}s",
            result.tables, result.relationships, result.files_written, result.duration_seconds
        );
        Ok(result)
    }

    /// Classify every ordered table pair, dropping Unknown results.
    pub fn analyze(&self, tables: &[Table]) -> Vec<Relationship> {
        RelationshipAnalyzer::new().analyze_all(tables)
    }

    /// The resolved configuration this generator runs with.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}
