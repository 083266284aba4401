// crates/connector-config/src/config.rs
// ============================================================================
// Module: Connector Configuration
// Description: Configuration loading and validation for the connector.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: connector-core, connector-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is resolved from an explicit path, then the `CONNECTOR_CONFIG`
//! environment variable, then `connector.toml` in the working directory.
//! Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use connector_core::ConnectorIdentity;
use connector_core::model::DEFAULT_CONNECTOR_VERSION;
use connector_core::model::DEFAULT_MODEL_VERSION;
use connector_core::router::DEFAULT_FALLBACK_CORRELATION_URI;
use connector_core::router::PERMISSIVE_PLACEHOLDER_TOKEN;
use connector_store_sqlite::SqliteStoreConfig;
use connector_store_sqlite::SqliteStoreMode;
use connector_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "connector.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CONNECTOR_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured tokens per list.
pub(crate) const MAX_TOKENS: usize = 64;
/// Maximum length of a configured token.
pub(crate) const MAX_TOKEN_LENGTH: usize = 256;
/// Default bind address.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default static token issued on outbound messages.
pub(crate) const DEFAULT_STATIC_TOKEN: &str = "connector-static-token";
/// Default broker connect timeout in milliseconds.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default broker request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default token endpoint timeout in milliseconds.
pub(crate) const DEFAULT_TOKEN_TIMEOUT_MS: u64 = 5_000;
/// Minimum connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 60_000;
/// Minimum request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default artifact root directory.
pub(crate) const DEFAULT_ARTIFACT_ROOT: &str = "artifacts";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Connector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Seed identity; required for the memory store.
    #[serde(default)]
    pub identity: Option<IdentityConfig>,
    /// Inbound protocol policy.
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Outbound token issuer.
    #[serde(default)]
    pub token_issuer: TokenIssuerConfig,
    /// Broker transport timeouts.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Persistence backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Artifact source.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

impl ConnectorConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(identity) = &self.identity {
            identity.validate()?;
        }
        self.protocol.validate()?;
        self.token_issuer.validate()?;
        self.transport.validate()?;
        self.store.validate()?;
        self.artifacts.validate()?;
        if self.store.store_type == StoreType::Memory && self.identity.is_none() {
            return Err(ConfigError::Invalid(
                "memory store requires an [identity] section".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Admin surface authentication.
    #[serde(default)]
    pub admin_auth: AdminAuthConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            admin_auth: AdminAuthConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.admin_auth.validate()?;
        self.audit.validate()?;
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && self.admin_auth.mode == AdminAuthMode::LocalOnly {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed with local_only admin auth".to_string(),
            ));
        }
        Ok(())
    }
}

/// Admin surface auth modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdminAuthMode {
    /// Loopback clients only.
    #[default]
    LocalOnly,
    /// Bearer token authentication.
    BearerToken,
}

/// Admin surface authentication configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminAuthConfig {
    /// Auth mode.
    #[serde(default)]
    pub mode: AdminAuthMode,
    /// Accepted bearer tokens (required for `bearer_token` mode).
    #[serde(default)]
    pub bearer_tokens: Vec<String>,
}

impl AdminAuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_tokens("server.admin_auth.bearer_tokens", &self.bearer_tokens)?;
        match self.mode {
            AdminAuthMode::BearerToken if self.bearer_tokens.is_empty() => {
                Err(ConfigError::Invalid("bearer_token mode requires bearer_tokens".to_string()))
            }
            AdminAuthMode::LocalOnly if !self.bearer_tokens.is_empty() => Err(
                ConfigError::Invalid("local_only mode does not accept bearer_tokens".to_string()),
            ),
            AdminAuthMode::BearerToken | AdminAuthMode::LocalOnly => Ok(()),
        }
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Seed identity written to an empty store.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Public base URL.
    pub base_url: String,
    /// Maintainer URI.
    pub maintainer_uri: String,
    /// Curator URI.
    pub curator_uri: String,
    /// Country URI.
    pub country_uri: String,
    /// Connector title.
    pub title: String,
    /// Accepted inbound protocol versions.
    #[serde(default = "default_supported_versions")]
    pub supported_protocol_versions: BTreeSet<String>,
    /// Outbound protocol version.
    #[serde(default = "default_model_version")]
    pub outbound_protocol_version: String,
    /// Declared connector version.
    #[serde(default = "default_connector_version")]
    pub declared_version: String,
}

impl IdentityConfig {
    /// Converts the section into an identity record.
    #[must_use]
    pub fn to_identity(&self) -> ConnectorIdentity {
        ConnectorIdentity {
            base_url: self.base_url.clone(),
            maintainer_uri: self.maintainer_uri.clone(),
            curator_uri: self.curator_uri.clone(),
            country_uri: self.country_uri.clone(),
            title: self.title.clone(),
            supported_protocol_versions: self.supported_protocol_versions.clone(),
            outbound_protocol_version: self.outbound_protocol_version.clone(),
            declared_version: self.declared_version.clone(),
        }
    }

    /// Validates the seed identity.
    fn validate(&self) -> Result<(), ConfigError> {
        self.to_identity()
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("identity: {err}")))
    }
}

// ============================================================================
// SECTION: Protocol
// ============================================================================

/// Inbound protocol policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Substitute a placeholder when a message carries no token.
    #[serde(default = "default_permissive")]
    pub permissive: bool,
    /// Placeholder token used in permissive mode.
    #[serde(default = "default_placeholder_token")]
    pub placeholder_token: String,
    /// Correlation URI used when a message has no recoverable header.
    #[serde(default = "default_fallback_correlation_uri")]
    pub fallback_correlation_uri: String,
    /// Accepted inbound tokens; empty accepts any token.
    #[serde(default)]
    pub accepted_tokens: Vec<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            permissive: default_permissive(),
            placeholder_token: default_placeholder_token(),
            fallback_correlation_uri: default_fallback_correlation_uri(),
            accepted_tokens: Vec::new(),
        }
    }
}

impl ProtocolConfig {
    /// Validates protocol policy.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.permissive {
            validate_token("protocol.placeholder_token", &self.placeholder_token)?;
        }
        validate_http_url("protocol.fallback_correlation_uri", &self.fallback_correlation_uri)?;
        validate_tokens("protocol.accepted_tokens", &self.accepted_tokens)
    }
}

// ============================================================================
// SECTION: Token Issuer
// ============================================================================

/// Outbound token issuer selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenIssuerConfig {
    /// Issue one configured token.
    Static {
        /// Token value.
        token: String,
    },
    /// Fetch tokens from an HTTP endpoint.
    Http {
        /// Token endpoint URL.
        url: String,
        /// Request timeout in milliseconds.
        #[serde(default = "default_token_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for TokenIssuerConfig {
    fn default() -> Self {
        Self::Static {
            token: DEFAULT_STATIC_TOKEN.to_string(),
        }
    }
}

impl TokenIssuerConfig {
    /// Validates issuer configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Static {
                token,
            } => validate_token("token_issuer.token", token),
            Self::Http {
                url,
                timeout_ms,
            } => {
                validate_http_url("token_issuer.url", url)?;
                validate_timeout_range(
                    "token_issuer.timeout_ms",
                    *timeout_ms,
                    MIN_REQUEST_TIMEOUT_MS,
                    MAX_REQUEST_TIMEOUT_MS,
                )
            }
        }
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Broker transport timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl TransportConfig {
    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates timeout bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "transport.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "transport.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        if self.connect_timeout_ms > self.request_timeout_ms {
            return Err(ConfigError::Invalid(
                "transport.connect_timeout_ms must not exceed request_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (lost on restart).
    #[default]
    Memory,
    /// `SQLite` store.
    Sqlite,
}

/// Persistence backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` settings for the sqlite backend.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
        }
    }
}

// ============================================================================
// SECTION: Artifacts
// ============================================================================

/// Artifact source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding distribution files.
    #[serde(default = "default_artifact_root")]
    pub root: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifact_root(),
        }
    }
}

impl ArtifactsConfig {
    /// Validates artifact configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("artifacts.root", &self.root.to_string_lossy())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Audit logging is on by default.
const fn default_audit_enabled() -> bool {
    true
}

/// Default supported protocol versions.
fn default_supported_versions() -> BTreeSet<String> {
    BTreeSet::from([DEFAULT_MODEL_VERSION.to_string()])
}

/// Default outbound protocol version.
fn default_model_version() -> String {
    DEFAULT_MODEL_VERSION.to_string()
}

/// Default declared connector version.
fn default_connector_version() -> String {
    DEFAULT_CONNECTOR_VERSION.to_string()
}

/// Permissive token handling is on by default.
const fn default_permissive() -> bool {
    true
}

/// Default placeholder token.
fn default_placeholder_token() -> String {
    PERMISSIVE_PLACEHOLDER_TOKEN.to_string()
}

/// Default fallback correlation URI.
fn default_fallback_correlation_uri() -> String {
    DEFAULT_FALLBACK_CORRELATION_URI.to_string()
}

/// Default token endpoint timeout.
const fn default_token_timeout_ms() -> u64 {
    DEFAULT_TOKEN_TIMEOUT_MS
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default artifact root.
fn default_artifact_root() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_ROOT)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a token list.
fn validate_tokens(field: &str, tokens: &[String]) -> Result<(), ConfigError> {
    if tokens.len() > MAX_TOKENS {
        return Err(ConfigError::Invalid(format!("too many entries in {field}")));
    }
    for token in tokens {
        validate_token(field, token)?;
    }
    Ok(())
}

/// Validates a single token.
fn validate_token(field: &str, token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field}: token must be non-empty")));
    }
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(ConfigError::Invalid(format!("{field}: token too long")));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field}: token must not contain whitespace")));
    }
    Ok(())
}

/// Validates an absolute http(s) URL.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::Invalid(format!("{field} must include http:// or https://")))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must name a host")));
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
