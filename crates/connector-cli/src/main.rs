// crates/connector-cli/src/main.rs
// ============================================================================
// Module: Connector CLI Entry Point
// Description: Command dispatcher for the dataspace connector.
// Purpose: Run the server, check configuration, and seed the catalog.
// Dependencies: clap, connector-config, connector-server,
//               connector-store-sqlite, thiserror, tokio
// ============================================================================

//! ## Overview
//! The `connector` binary offers three commands:
//! - `serve` builds a [`ConnectorServer`] from configuration and runs it;
//! - `config check` loads and validates a configuration file;
//! - `catalog import <file>` writes catalog entries and distributions from a
//!   JSON document into the configured `SQLite` store.
//!
//! Inputs are untrusted: files are read with a hard size limit and every
//! failure exits non-zero with one line on stderr.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use connector_config::AdminAuthMode;
use connector_config::ConnectorConfig;
use connector_config::StoreType;
use connector_server::ConnectorServer;
use connector_store_sqlite::CatalogImport;
use connector_store_sqlite::SqliteConnectorStore;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a catalog import document.
const MAX_IMPORT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "connector", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the connector HTTP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Catalog utilities.
    Catalog {
        /// Selected catalog subcommand.
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to connector.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Check(ConfigCheckCommand),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path (defaults to connector.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Import entries and distributions from a JSON file.
    Import(CatalogImportCommand),
}

/// Arguments for `catalog import`.
#[derive(Args, Debug)]
struct CatalogImportCommand {
    /// Optional config file path (defaults to connector.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// JSON document with `entries` and `distributions` arrays.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message written to stderr.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Catalog {
            command,
        } => command_catalog(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let server = ConnectorServer::from_config(&config)
        .await
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("connector listening on {}", server.bind_addr()))
        .map_err(|err| output_error("stderr", &err))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(command) => command_config_check(&command),
    }
}

/// Executes `config check`.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    write_stdout_line(&config_summary(&config)).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Summarizes a valid configuration in one line.
fn config_summary(config: &ConnectorConfig) -> String {
    let store = match config.store.store_type {
        StoreType::Memory => "memory",
        StoreType::Sqlite => "sqlite",
    };
    format!(
        "config ok: bind {}, store {store}, admin auth {}",
        config.server.bind,
        admin_mode_label(config)
    )
}

/// Returns the admin auth mode label.
const fn admin_mode_label(config: &ConnectorConfig) -> &'static str {
    match config.server.admin_auth.mode {
        AdminAuthMode::LocalOnly => "local_only",
        AdminAuthMode::BearerToken => "bearer_token",
    }
}

// ============================================================================
// SECTION: Catalog Commands
// ============================================================================

/// Dispatches catalog subcommands.
fn command_catalog(command: CatalogCommand) -> CliResult<ExitCode> {
    match command {
        CatalogCommand::Import(command) => command_catalog_import(&command),
    }
}

/// Executes `catalog import`.
fn command_catalog_import(command: &CatalogImportCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let Some(store_config) = config.store.sqlite() else {
        return Err(CliError::new("catalog import requires a sqlite store"));
    };
    let import = read_import(&command.file)?;
    let store = SqliteConnectorStore::open(&store_config)
        .map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    if let Some(identity) = &config.identity {
        let seeded = store
            .seed_identity_if_absent(&identity.to_identity())
            .map_err(|err| CliError::new(format!("identity seed failed: {err}")))?;
        if seeded {
            write_stdout_line("seeded connector identity")
                .map_err(|err| output_error("stdout", &err))?;
        }
    }
    let summary = store
        .import_catalog(&import)
        .map_err(|err| CliError::new(format!("catalog import failed: {err}")))?;
    write_stdout_line(&format!(
        "imported {} entries and {} distributions",
        summary.entries, summary.distributions
    ))
    .map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Reads and parses a catalog import document.
fn read_import(path: &Path) -> CliResult<CatalogImport> {
    let bytes = read_bytes_with_limit(path, MAX_IMPORT_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is too large ({size} bytes, limit {limit} bytes)",
            path.display()
        )),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid catalog import {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<ConnectorConfig> {
    ConnectorConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Wraps an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
