// crates/connector-server/src/tokens.rs
// ============================================================================
// Module: Token Issuers and Authenticators
// Description: Reference implementations of the token interfaces.
// Purpose: Issue outbound security tokens and validate inbound ones.
// Dependencies: connector-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`StaticTokenIssuer`] returns one configured token; [`HttpTokenIssuer`]
//! requests a token from an identity provider endpoint on every call. Inbound
//! tokens are checked by [`AcceptAllAuthenticator`] (any non-empty token) or
//! [`AllowListAuthenticator`] (configured tokens only). The cryptographic
//! content of tokens is opaque here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use connector_core::AuthenticationError;
use connector_core::TokenAuthenticator;
use connector_core::TokenError;
use connector_core::TokenIssuer;
use reqwest::Client;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::Deserialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest token response accepted from the issuer endpoint.
const MAX_TOKEN_RESPONSE_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Issuers
// ============================================================================

/// Issues one configured token.
#[derive(Debug, Clone)]
pub struct StaticTokenIssuer {
    /// Token value.
    token: String,
}

impl StaticTokenIssuer {
    /// Creates an issuer for `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue_token(&self) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }
}

/// Token endpoint reply.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Issued token.
    access_token: String,
}

/// Fetches tokens from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    /// Shared HTTP client.
    client: Client,
    /// Token endpoint.
    url: Url,
}

impl HttpTokenIssuer {
    /// Builds an issuer for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the URL or the HTTP client is invalid.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TokenError> {
        let url = Url::parse(url)
            .map_err(|err| TokenError::Unavailable(format!("invalid token url: {err}")))?;
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|err| TokenError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            url,
        })
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue_token(&self) -> Result<String, TokenError> {
        let response = self
            .client
            .post(self.url.clone())
            .send()
            .await
            .map_err(|err| TokenError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Unavailable(format!("token endpoint status {status}")));
        }
        let body = response.bytes().await.map_err(|err| TokenError::Unavailable(err.to_string()))?;
        if body.len() > MAX_TOKEN_RESPONSE_BYTES {
            return Err(TokenError::Unavailable("token response too large".to_string()));
        }
        let reply: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| TokenError::Unavailable(format!("invalid token response: {err}")))?;
        if reply.access_token.trim().is_empty() {
            return Err(TokenError::Unavailable("token endpoint returned empty token".to_string()));
        }
        Ok(reply.access_token)
    }
}

// ============================================================================
// SECTION: Authenticators
// ============================================================================

/// Accepts any non-empty token.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllAuthenticator;

#[async_trait]
impl TokenAuthenticator for AcceptAllAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<(), AuthenticationError> {
        if token.trim().is_empty() {
            return Err(AuthenticationError::Rejected("empty token".to_string()));
        }
        Ok(())
    }
}

/// Accepts configured tokens only.
#[derive(Debug, Clone)]
pub struct AllowListAuthenticator {
    /// Accepted tokens.
    tokens: BTreeSet<String>,
}

impl AllowListAuthenticator {
    /// Creates an authenticator for `tokens`.
    #[must_use]
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }
}

#[async_trait]
impl TokenAuthenticator for AllowListAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<(), AuthenticationError> {
        if self.tokens.contains(token) {
            Ok(())
        } else {
            Err(AuthenticationError::Rejected("token not accepted".to_string()))
        }
    }
}
