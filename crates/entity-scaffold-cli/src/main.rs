//! entity-scaffold CLI - database schema reverse engineering.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use entity_scaffold::{
    AppSettings, DatabaseProvider, Generator, GeneratorConfig, Overrides, ScaffoldError,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod logging;

const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

#[derive(Parser)]
#[command(name = "entity-scaffold")]
#[command(about = "Reverse-engineers a database schema into ORM entity sources")]
#[command(version)]
struct Cli {
    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate entities, configurations and the context file
    Scaffold {
        /// Database connection string
        #[arg(short = 'c', long)]
        connection: Option<String>,

        /// Database provider
        #[arg(short = 'p', long, value_enum)]
        provider: Option<ProviderArg>,

        /// Namespace for emitted code
        #[arg(short = 'n', long)]
        namespace: Option<String>,

        /// Output directory
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Pluralize collection names [default: true]
        #[arg(long)]
        pluralize: Option<bool>,

        /// Emit validation annotations [default: true]
        #[arg(long)]
        data_annotations: Option<bool>,

        /// Path to a JSON config file
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

/// Provider choices exposed on the command line; mapped onto the library's
/// invariant provider names.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    SqlServer,
    MySql,
    PostgreSql,
}

impl From<ProviderArg> for DatabaseProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::SqlServer => DatabaseProvider::SqlServer,
            ProviderArg::MySql => DatabaseProvider::MySql,
            ProviderArg::PostgreSql => DatabaseProvider::PostgreSql,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ScaffoldError> {
    let cli = Cli::parse();

    let _guard = setup_logging(&cli.verbosity)?;

    let cancel = setup_signal_handler();

    match cli.command {
        Commands::Scaffold {
            connection,
            provider,
            namespace,
            output,
            pluralize,
            data_annotations,
            config,
        } => {
            let settings = load_settings(&config)?;
            let overrides = Overrides {
                connection,
                provider: provider.map(DatabaseProvider::from),
                namespace,
                output,
                pluralize,
                data_annotations,
            };
            let config = GeneratorConfig::resolve(&settings.code_generator, overrides)?;

            let generator = Generator::new(config)?;
            let result = generator.run(&cancel).await?;

            println!("\nScaffolding completed!");
            println!("  Tables: {}", result.tables);
            println!("  Relationships: {}", result.relationships);
            println!("  Files: {}", result.files_written);
            println!("  Output: {}", result.output.display());
            println!("  Duration: {:.2}s", result.duration_seconds);
        }
    }

    Ok(())
}

/// Load `appsettings.json`. The default file may be absent; an explicitly
/// named file must exist.
fn load_settings(path: &Path) -> Result<AppSettings, ScaffoldError> {
    if path.exists() {
        let settings = AppSettings::load(path)?;
        info!("Loaded configuration from {}", path.display());
        return Ok(settings);
    }

    if path.as_os_str() != DEFAULT_CONFIG_FILE {
        return Err(ScaffoldError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    Ok(AppSettings::default())
}

fn setup_logging(verbosity: &str) -> Result<WorkerGuard, ScaffoldError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let appender = tracing_appender::rolling::never(".", logging::LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .with(logging::CodeGenLogLayer::new(non_blocking))
        .init();

    Ok(guard)
}

/// Cancel the run on Ctrl-C; a second Ctrl-C kills the process.
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling...");
            trigger.cancel();
        }
    });

    cancel
}
