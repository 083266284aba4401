// crates/connector-core/src/router.rs
// ============================================================================
// Module: Message Router
// Description: Authenticates and dispatches inbound protocol messages.
// Purpose: Answer every inbound message with exactly one response envelope.
// Dependencies: bytes, tokio
// ============================================================================

//! ## Overview
//! [`MessageRouter::route`] decodes an inbound multipart body, checks the
//! message kind against the receiving endpoint, authenticates the security
//! token, and dispatches on the message variant. It never fails: every error
//! becomes a rejection envelope, correlated to the inbound message id when it
//! can be recovered and to the configured fallback URI otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use url::ParseError;
use url::Url;

use crate::assembler::AssemblyError;
use crate::assembler::ConnectorDocument;
use crate::assembler::HeaderOrigin;
use crate::assembler::SelfDescriptionAssembler;
use crate::audit::ConnectorAuditSink;
use crate::audit::ProtocolAuditEvent;
use crate::audit::ProtocolAuditEventParams;
use crate::audit::ProtocolOutcome;
use crate::envelope;
use crate::envelope::Envelope;
use crate::envelope::Payload;
use crate::interfaces::ArtifactSource;
use crate::interfaces::AuthenticationError;
use crate::interfaces::CatalogStore;
use crate::interfaces::ConfigProvider;
use crate::interfaces::TokenAuthenticator;
use crate::model::ConnectorIdentity;
use crate::model::DistributionId;
use crate::protocol::MessageHeader;
use crate::protocol::MessageKind;
use crate::protocol::ProtocolMessage;
use crate::protocol::RejectionReason;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Token substituted for a missing one in the permissive policy.
pub const PERMISSIVE_PLACEHOLDER_TOKEN: &str = "abc123";
/// Correlation target used when no inbound message id can be recovered.
pub const DEFAULT_FALLBACK_CORRELATION_URI: &str = "http://example.org";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Router policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterPolicy {
    /// Token used when a message carries none; `None` rejects such messages.
    pub placeholder_token: Option<String>,
    /// Correlation target for rejections of unparseable input.
    pub fallback_correlation_uri: String,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            placeholder_token: Some(PERMISSIVE_PLACEHOLDER_TOKEN.to_string()),
            fallback_correlation_uri: DEFAULT_FALLBACK_CORRELATION_URI.to_string(),
        }
    }
}

/// One inbound HTTP body.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// `Content-Type` header value.
    pub content_type: Option<String>,
    /// Raw body bytes.
    pub body: Bytes,
    /// Kind the receiving endpoint accepts; `None` accepts any kind.
    pub expected: Option<MessageKind>,
}

/// Collaborators of the router.
pub struct RouterDependencies {
    /// Identity source.
    pub config: Arc<dyn ConfigProvider>,
    /// Catalog for artifact lookups.
    pub catalog: Arc<dyn CatalogStore>,
    /// Document and header builder.
    pub assembler: SelfDescriptionAssembler,
    /// Artifact bytes.
    pub artifacts: Arc<dyn ArtifactSource>,
    /// Inbound token validation.
    pub authenticator: Arc<dyn TokenAuthenticator>,
    /// Audit sink.
    pub audit: Arc<dyn ConnectorAuditSink>,
}

/// A rejection decided during routing.
#[derive(Debug)]
struct Rejected {
    /// Reason sent to the peer.
    reason: RejectionReason,
    /// Local cause, recorded in the audit log only.
    detail: String,
}

impl Rejected {
    /// Builds a rejection.
    fn new(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Builds an internal recipient error.
    fn internal(detail: impl ToString) -> Self {
        Self::new(RejectionReason::InternalRecipientError, detail.to_string())
    }
}

/// What the audit record needs to know about a routed message.
struct RouteTrace {
    /// Inbound message id, when recovered.
    message_id: Option<String>,
    /// Inbound message kind, when parsed.
    message_kind: Option<MessageKind>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Routes inbound protocol messages to responses.
pub struct MessageRouter {
    /// Identity source.
    config: Arc<dyn ConfigProvider>,
    /// Catalog for artifact lookups.
    catalog: Arc<dyn CatalogStore>,
    /// Document and header builder.
    assembler: SelfDescriptionAssembler,
    /// Artifact bytes.
    artifacts: Arc<dyn ArtifactSource>,
    /// Inbound token validation.
    authenticator: Arc<dyn TokenAuthenticator>,
    /// Audit sink.
    audit: Arc<dyn ConnectorAuditSink>,
    /// Policy knobs.
    policy: RouterPolicy,
}

impl MessageRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(deps: RouterDependencies, policy: RouterPolicy) -> Self {
        Self {
            config: deps.config,
            catalog: deps.catalog,
            assembler: deps.assembler,
            artifacts: deps.artifacts,
            authenticator: deps.authenticator,
            audit: deps.audit,
            policy,
        }
    }

    /// Routes one inbound message. Always returns an envelope.
    pub async fn route(&self, inbound: InboundMessage) -> Envelope {
        let request_bytes = inbound.body.len();
        let expected = inbound.expected;
        let mut trace = RouteTrace {
            message_id: None,
            message_kind: None,
        };
        let outcome = self.dispatch(inbound, &mut trace).await;
        self.conclude(expected, request_bytes, trace, outcome).await
    }

    /// Answers a message whose body could not be read, such as one over the
    /// size limit, with a malformed-message rejection.
    pub async fn reject_unreadable(
        &self,
        expected: Option<MessageKind>,
        detail: impl Into<String>,
    ) -> Envelope {
        let trace = RouteTrace {
            message_id: None,
            message_kind: None,
        };
        let outcome = Err(Rejected::new(RejectionReason::MalformedMessage, detail));
        self.conclude(expected, 0, trace, outcome).await
    }

    /// Turns a dispatch outcome into the reply envelope and audits it.
    async fn conclude(
        &self,
        expected: Option<MessageKind>,
        request_bytes: usize,
        trace: RouteTrace,
        outcome: Result<Envelope, Rejected>,
    ) -> Envelope {
        let (envelope, rejected) = match outcome {
            Ok(envelope) => (envelope, None),
            Err(rejected) => {
                let envelope = self.reject(trace.message_id.as_deref(), rejected.reason).await;
                (envelope, Some(rejected))
            }
        };
        self.audit.record_protocol(&ProtocolAuditEvent::new(ProtocolAuditEventParams {
            expected_kind: expected.map(MessageKind::label),
            message_id: trace.message_id,
            message_kind: trace.message_kind.map(MessageKind::label),
            outcome: if rejected.is_some() {
                ProtocolOutcome::Rejection
            } else {
                ProtocolOutcome::Response
            },
            rejection_reason: rejected.as_ref().map(|rejected| rejected.reason.label()),
            detail: rejected.map(|rejected| rejected.detail),
            request_bytes,
        }));
        envelope
    }

    /// Builds the current self-description document.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when the identity, catalog, or issuer fails.
    pub async fn self_description(&self) -> Result<ConnectorDocument, AssemblyError> {
        let identity =
            self.config.identity().await.map_err(|err| AssemblyError::Identity(err.to_string()))?;
        self.assembler.build_connector(&identity).await
    }

    /// Decodes, checks, authenticates, and dispatches a message.
    async fn dispatch(
        &self,
        inbound: InboundMessage,
        trace: &mut RouteTrace,
    ) -> Result<Envelope, Rejected> {
        let request = match envelope::decode(inbound.content_type.as_deref(), inbound.body).await {
            Ok(request) => request,
            Err(err) => {
                trace.message_id = err.correlation().map(str::to_string);
                return Err(Rejected::new(RejectionReason::MalformedMessage, err.to_string()));
            }
        };
        let header = request.header;
        trace.message_id = Some(header.id.clone());
        trace.message_kind = Some(header.kind());

        if let Some(expected) = inbound.expected
            && expected != header.kind()
        {
            return Err(Rejected::new(
                RejectionReason::MalformedMessage,
                format!("endpoint accepts {} only", expected.label()),
            ));
        }

        self.authenticate(&header).await?;
        self.respond(&header).await
    }

    /// Validates the header token, substituting the placeholder if allowed.
    async fn authenticate(&self, header: &MessageHeader) -> Result<(), Rejected> {
        let token = header.token_value().or(self.policy.placeholder_token.as_deref());
        let Some(token) = token else {
            return Err(Rejected::new(RejectionReason::NotAuthenticated, "missing security token"));
        };
        self.authenticator.authenticate(token).await.map_err(|err| match err {
            AuthenticationError::Rejected(_) => {
                Rejected::new(RejectionReason::NotAuthenticated, err.to_string())
            }
            AuthenticationError::Unavailable(_) => Rejected::internal(err),
        })
    }

    /// Produces the success response for an authenticated message.
    async fn respond(&self, header: &MessageHeader) -> Result<Envelope, Rejected> {
        match &header.message {
            ProtocolMessage::DescriptionRequest => {
                let identity = self.identity().await?;
                self.assembler
                    .build_response(&header.id, &identity)
                    .await
                    .map_err(Rejected::internal)
            }
            ProtocolMessage::ArtifactRequest {
                requested_artifact,
            } => self.artifact(&header.id, requested_artifact).await,
            ProtocolMessage::DescriptionResponse
            | ProtocolMessage::ArtifactResponse
            | ProtocolMessage::ConnectorUpdate
            | ProtocolMessage::ConnectorAvailable
            | ProtocolMessage::ConnectorUnavailable
            | ProtocolMessage::Rejection {
                ..
            } => Err(Rejected::new(
                RejectionReason::MessageTypeNotSupported,
                format!("{} is not handled", header.kind().label()),
            )),
        }
    }

    /// Answers an artifact request.
    async fn artifact(&self, correlation: &str, requested: &str) -> Result<Envelope, Rejected> {
        let Some(id) = artifact_id(requested) else {
            return Err(Rejected::new(
                RejectionReason::NotFound,
                format!("unparseable artifact id in {requested}"),
            ));
        };
        let distribution = self
            .catalog
            .published_distribution(id)
            .await
            .map_err(Rejected::internal)?
            .ok_or_else(|| Rejected::new(RejectionReason::NotFound, format!("artifact {id}")))?;
        let identity = self.identity().await?;
        let (payload, header) = tokio::join!(
            self.artifacts.fetch(&distribution),
            self.assembler.build_artifact_response(correlation, &identity),
        );
        let payload = payload.map_err(Rejected::internal)?;
        let header = header.map_err(Rejected::internal)?;
        Ok(Envelope {
            header,
            payload: Some(Payload::Binary {
                filename: payload.filename,
                content_type: payload.content_type,
                bytes: payload.bytes,
            }),
        })
    }

    /// Reads the identity.
    async fn identity(&self) -> Result<ConnectorIdentity, Rejected> {
        self.config.identity().await.map_err(Rejected::internal)
    }

    /// Builds a rejection envelope.
    async fn reject(&self, correlation: Option<&str>, reason: RejectionReason) -> Envelope {
        let origin = match self.config.identity().await {
            Ok(identity) => HeaderOrigin::from_identity(&identity),
            Err(_) => HeaderOrigin::fallback(&self.policy.fallback_correlation_uri),
        };
        let correlation = correlation.unwrap_or(&self.policy.fallback_correlation_uri);
        self.assembler.build_rejection(&origin, correlation, reason).await
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Base used to resolve relative artifact references.
const RELATIVE_ARTIFACT_BASE: &str = "http://localhost/";

/// Extracts the distribution id from the last path segment of `uri`.
///
/// Query and fragment are ignored.
fn artifact_id(uri: &str) -> Option<DistributionId> {
    let parsed = match Url::parse(uri) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            Url::parse(RELATIVE_ARTIFACT_BASE).ok()?.join(uri).ok()?
        }
        Err(_) => return None,
    };
    let segment = parsed.path_segments()?.rev().find(|segment| !segment.is_empty())?;
    segment.parse::<i64>().ok().map(DistributionId::new)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
