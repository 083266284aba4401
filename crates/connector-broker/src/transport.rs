// crates/connector-broker/src/transport.rs
// ============================================================================
// Module: HTTP Registry Transport
// Description: Delivers encoded envelopes to broker endpoints over HTTP.
// Purpose: Reference RegistryTransport with bounded timeouts.
// Dependencies: reqwest, url
// ============================================================================

//! ## Overview
//! [`HttpRegistryTransport`] POSTs a multipart envelope to a broker and reads
//! the reply with the shared envelope codec. A rejection reply fails the
//! delivery with its reason. Replies that cannot be decoded are accepted when
//! the status is a success. Network failures are classified into the stable
//! [`TransportError`] kinds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::iter;
use std::time::Duration;

use async_trait::async_trait;
use connector_core::EncodedEnvelope;
use connector_core::ProtocolMessage;
use connector_core::RegistryTransport;
use connector_core::TransportError;
use connector_core::envelope;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Timeouts applied to every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP-backed registry transport.
#[derive(Debug, Clone)]
pub struct HttpRegistryTransport {
    /// Shared HTTP client.
    client: Client,
}

impl HttpRegistryTransport {
    /// Builds a transport with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the HTTP client cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| TransportError::Io(err.to_string()))?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistryTransport {
    async fn deliver(&self, url: &str, encoded: &EncodedEnvelope) -> Result<(), TransportError> {
        let target = parse_broker_url(url)?;
        let response = self
            .client
            .post(target)
            .header(CONTENT_TYPE, encoded.content_type.as_str())
            .body(encoded.body.clone())
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(classify)?;

        if let Ok(reply) = envelope::decode(content_type.as_deref(), body).await
            && let ProtocolMessage::Rejection {
                rejection_reason,
            } = reply.header.message
        {
            return Err(TransportError::RemoteRejected {
                reason: rejection_reason,
            });
        }
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a broker URL, accepting only `http` and `https`.
fn parse_broker_url(url: &str) -> Result<Url, TransportError> {
    let parsed =
        Url::parse(url).map_err(|err| TransportError::InvalidUrl(format!("{url}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(TransportError::InvalidUrl(format!("{url}: unsupported scheme {scheme}"))),
    }
}

/// Maps a client error onto a stable transport error kind.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() && is_name_resolution_failure(&err) {
        TransportError::HostUnreachable(err.to_string())
    } else if err.is_connect() {
        TransportError::ConnectionFailed(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidUrl(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

/// Returns true when any error in the source chain is a name lookup failure.
fn is_name_resolution_failure(err: &(dyn StdError + 'static)) -> bool {
    iter::successors(Some(err), |&current| current.source()).any(|current| {
        let text = current.to_string();
        text.contains("dns error") || text.contains("failed to lookup address")
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
