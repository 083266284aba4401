// crates/connector-server/src/auth.rs
// ============================================================================
// Module: Admin Authn/Authz
// Description: Authentication for the administrative REST surface.
// Purpose: Provide strict, fail-closed auth for admin requests.
// Dependencies: connector-config, connector-core, sha2
// ============================================================================

//! ## Overview
//! Admin requests are authorized either by loopback origin (`local_only`) or
//! by a configured bearer token (`bearer_token`). Every decision produces an
//! [`AdminAuthAuditEvent`]; bearer tokens are only ever recorded as a sha256
//! fingerprint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::net::IpAddr;

use connector_config::AdminAuthConfig;
use connector_config::AdminAuthMode;
use connector_core::audit::AdminAuthAuditEvent;
use connector_core::audit::AdminAuthAuditEventParams;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest accepted `Authorization` header.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context used for auth decisions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// `Authorization` header value.
    pub auth_header: Option<String>,
}

impl RequestContext {
    /// Returns true when the peer IP is loopback.
    #[must_use]
    pub fn peer_is_loopback(&self) -> bool {
        self.peer_ip.is_some_and(|ip| ip.is_loopback())
    }
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated caller context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Authentication method.
    pub method: AuthMethod,
    /// Token fingerprint for bearer auth (sha256, hex).
    pub token_fingerprint: Option<String>,
}

/// Authentication method used for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Loopback access.
    Local,
    /// Bearer token authentication.
    BearerToken,
}

impl AuthMethod {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::BearerToken => "bearer_token",
        }
    }
}

/// Authentication errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Admin authorization policy derived from server config.
#[derive(Debug, Clone)]
pub struct AdminAuthz {
    /// Auth mode.
    mode: AdminAuthMode,
    /// Accepted bearer tokens.
    bearer_tokens: BTreeSet<String>,
}

impl AdminAuthz {
    /// Builds the policy from admin auth configuration.
    #[must_use]
    pub fn from_config(config: &AdminAuthConfig) -> Self {
        Self {
            mode: config.mode,
            bearer_tokens: config.bearer_tokens.iter().cloned().collect(),
        }
    }

    /// Returns the configured auth mode.
    #[must_use]
    pub const fn mode(&self) -> AdminAuthMode {
        self.mode
    }

    /// Authorizes an admin request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the caller cannot be authenticated.
    pub fn authorize(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        match self.mode {
            AdminAuthMode::LocalOnly => authorize_local_only(ctx),
            AdminAuthMode::BearerToken => authorize_bearer(ctx, &self.bearer_tokens),
        }
    }
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Builds an allow event.
#[must_use]
pub fn allowed_event(
    ctx: &RequestContext,
    action: &str,
    auth: &AuthContext,
) -> AdminAuthAuditEvent {
    AdminAuthAuditEvent::new(AdminAuthAuditEventParams {
        allowed: true,
        action: action.to_string(),
        peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
        auth_method: Some(auth.method.label()),
        token_fingerprint: auth.token_fingerprint.clone(),
        reason: None,
    })
}

/// Builds a deny event.
#[must_use]
pub fn denied_event(ctx: &RequestContext, action: &str, error: &AuthError) -> AdminAuthAuditEvent {
    AdminAuthAuditEvent::new(AdminAuthAuditEventParams {
        allowed: false,
        action: action.to_string(),
        peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
        auth_method: None,
        token_fingerprint: None,
        reason: Some(error.to_string()),
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Allows loopback callers only.
fn authorize_local_only(ctx: &RequestContext) -> Result<AuthContext, AuthError> {
    if !ctx.peer_is_loopback() {
        return Err(AuthError::Unauthenticated(
            "local-only mode requires loopback access".to_string(),
        ));
    }
    Ok(AuthContext {
        method: AuthMethod::Local,
        token_fingerprint: None,
    })
}

/// Allows callers presenting a configured bearer token.
fn authorize_bearer(
    ctx: &RequestContext,
    tokens: &BTreeSet<String>,
) -> Result<AuthContext, AuthError> {
    let token = parse_bearer_token(ctx.auth_header.as_deref())?;
    if !tokens.contains(token) {
        return Err(AuthError::Unauthenticated("invalid bearer token".to_string()));
    }
    Ok(AuthContext {
        method: AuthMethod::BearerToken,
        token_fingerprint: Some(fingerprint(token)),
    })
}

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let (scheme, token) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token)
}

/// Returns the lowercase hex sha256 of `token`.
fn fingerprint(token: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
