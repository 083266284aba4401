// crates/connector-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for connector-config.
// =============================================================================

//! ## Overview
//! TOML fixtures and assertion helpers shared by the config test suites.

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use connector_config::ConfigError;
use connector_config::ConnectorConfig;

/// Identity section accepted by validation.
pub const IDENTITY_TOML: &str = r#"
[identity]
base_url = "https://connector.example.com"
maintainer_uri = "https://example.com/maintainer"
curator_uri = "https://example.com/curator"
country_uri = "https://example.com/country/DE"
title = "Example Connector"
"#;

/// Test result alias.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `ConnectorConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<ConnectorConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config: defaults plus a seed identity.
pub fn minimal_config() -> Result<ConnectorConfig, toml::de::Error> {
    config_from_toml(IDENTITY_TOML)
}

/// Asserts that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
