// crates/connector-core/src/envelope.rs
// ============================================================================
// Module: Multipart Envelope
// Description: Two-part (header + payload) message envelope and its codec.
// Purpose: Single encode/decode path shared by the router and the transport.
// Dependencies: bytes, futures-util, multer, rand, serde_json
// ============================================================================

//! ## Overview
//! Protocol messages travel as `multipart/form-data` bodies with a `header`
//! part (the JSON-LD [`MessageHeader`]) and an optional `payload` part, either
//! a JSON document or a binary file. Encoding is deterministic apart from the
//! random boundary. Decoding distinguishes a body with no header part from a
//! header that fails to parse, and recovers the header `@id` when it can so
//! that rejections stay correlated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;

use bytes::Bytes;
use futures_util::stream;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::MessageHeader;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Multipart part name for the message header.
pub const HEADER_PART: &str = "header";
/// Multipart part name for the payload.
pub const PAYLOAD_PART: &str = "payload";
/// Content type of JSON-LD parts.
const JSON_LD_CONTENT_TYPE: &str = "application/ld+json";
/// Default content type of binary payloads.
const OCTET_STREAM: &str = "application/octet-stream";
/// Length of generated multipart boundaries.
const BOUNDARY_LENGTH: usize = 32;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Envelope payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON document (for example the connector self-description).
    Document(Value),
    /// Binary artifact.
    Binary {
        /// File name advertised to the recipient.
        filename: String,
        /// Content type of the bytes.
        content_type: String,
        /// Artifact bytes.
        bytes: Bytes,
    },
}

/// A protocol message with an optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Message header.
    pub header: MessageHeader,
    /// Optional payload; rejections never carry one.
    pub payload: Option<Payload>,
}

/// Wire form of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEnvelope {
    /// `multipart/form-data; boundary=...` content type.
    pub content_type: String,
    /// Encoded body.
    pub body: Bytes,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Envelope encoding failures.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Header or document could not be serialized.
    #[error("envelope serialization failed: {0}")]
    Serialization(String),
}

/// Envelope decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not a readable multipart stream.
    #[error("invalid multipart body: {0}")]
    Multipart(String),
    /// Body has no header part.
    #[error("missing header part")]
    MissingHeader,
    /// Header part is present but is not a known message.
    #[error("malformed header: {detail}")]
    MalformedHeader {
        /// Header `@id` when it could be recovered.
        correlation: Option<String>,
        /// Parse failure detail.
        detail: String,
    },
}

impl DecodeError {
    /// Returns the recovered header `@id`, if any.
    #[must_use]
    pub fn correlation(&self) -> Option<&str> {
        match self {
            Self::MalformedHeader {
                correlation,
                ..
            } => correlation.as_deref(),
            Self::Multipart(_) | Self::MissingHeader => None,
        }
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

impl Envelope {
    /// Creates an envelope without a payload.
    #[must_use]
    pub const fn header_only(header: MessageHeader) -> Self {
        Self {
            header,
            payload: None,
        }
    }

    /// Encodes the envelope as `multipart/form-data`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the header or document cannot be
    /// serialized.
    pub fn encode(&self) -> Result<EncodedEnvelope, EncodeError> {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BOUNDARY_LENGTH)
            .map(char::from)
            .collect();
        self.encode_with_boundary(&boundary)
    }

    /// Encodes the envelope with a caller-chosen boundary.
    fn encode_with_boundary(&self, boundary: &str) -> Result<EncodedEnvelope, EncodeError> {
        let header = serde_json::to_vec(&self.header)
            .map_err(|err| EncodeError::Serialization(err.to_string()))?;
        let mut body = Vec::with_capacity(header.len() + 256);
        write_part(&mut body, boundary, HEADER_PART, None, JSON_LD_CONTENT_TYPE, &header);
        match &self.payload {
            None => {}
            Some(Payload::Document(document)) => {
                let bytes = serde_json::to_vec(document)
                    .map_err(|err| EncodeError::Serialization(err.to_string()))?;
                write_part(&mut body, boundary, PAYLOAD_PART, None, JSON_LD_CONTENT_TYPE, &bytes);
            }
            Some(Payload::Binary {
                filename,
                content_type,
                bytes,
            }) => {
                write_part(
                    &mut body,
                    boundary,
                    PAYLOAD_PART,
                    Some(filename),
                    content_type,
                    bytes,
                );
            }
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok(EncodedEnvelope {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            body: Bytes::from(body),
        })
    }
}

/// Appends one multipart part.
fn write_part(
    body: &mut Vec<u8>,
    boundary: &str,
    name: &str,
    filename: Option<&str>,
    content_type: &str,
    bytes: &[u8],
) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    match filename {
        Some(filename) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\n",
                escape_quoted(filename)
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

/// Escapes characters that would terminate a quoted header parameter.
fn escape_quoted(value: &str) -> String {
    value.replace(['"', '\r', '\n'], "_")
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a multipart body into an [`Envelope`].
///
/// # Errors
///
/// Returns [`DecodeError`] when the body is not multipart, has no header part,
/// or the header is not a known message.
pub async fn decode(content_type: Option<&str>, body: Bytes) -> Result<Envelope, DecodeError> {
    let content_type =
        content_type.ok_or_else(|| DecodeError::Multipart("missing content type".to_string()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|err| DecodeError::Multipart(err.to_string()))?;
    let source = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(source, boundary);

    let mut header_bytes: Option<Bytes> = None;
    let mut payload: Option<Payload> = None;
    while let Some(field) =
        multipart.next_field().await.map_err(|err| DecodeError::Multipart(err.to_string()))?
    {
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let part_type = field.content_type().map(ToString::to_string);
        let bytes = field.bytes().await.map_err(|err| DecodeError::Multipart(err.to_string()))?;
        match name.as_deref() {
            Some(HEADER_PART) => header_bytes = Some(bytes),
            Some(PAYLOAD_PART) => payload = Some(classify_payload(filename, part_type, bytes)),
            _ => {}
        }
    }

    let header_bytes = header_bytes.ok_or(DecodeError::MissingHeader)?;
    let header = parse_header(&header_bytes)?;
    Ok(Envelope {
        header,
        payload,
    })
}

/// Parses a header part, recovering `@id` on failure.
fn parse_header(bytes: &[u8]) -> Result<MessageHeader, DecodeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| {
        DecodeError::MalformedHeader {
            correlation: None,
            detail: err.to_string(),
        }
    })?;
    let correlation = value.get("@id").and_then(Value::as_str).map(str::to_string);
    serde_json::from_value(value).map_err(|err| DecodeError::MalformedHeader {
        correlation,
        detail: err.to_string(),
    })
}

/// Chooses a payload representation for a decoded part.
fn classify_payload(
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
) -> Payload {
    let json_like = content_type.as_deref().is_none_or(|value| value.contains("json"));
    if filename.is_none()
        && json_like
        && let Ok(document) = serde_json::from_slice::<Value>(&bytes)
    {
        return Payload::Document(document);
    }
    Payload::Binary {
        filename: filename.unwrap_or_default(),
        content_type: content_type.unwrap_or_else(|| OCTET_STREAM.to_string()),
        bytes,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
