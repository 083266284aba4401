// crates/connector-core/src/audit.rs
// ============================================================================
// Module: Connector Audit Logging
// Description: Structured audit events for message routing and broker sync.
// Purpose: Emit JSON-line audit records without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every routed protocol message and every broker sync phase outcome produces
//! one audit event. Events are serialized as JSON lines by the configured
//! sink. Consistency faults (failed compensations) are recorded with the
//! dedicated [`SyncSeverity::Inconsistent`] severity so that they can be
//! alerted on separately from ordinary failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of a routed protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolOutcome {
    /// A success response was produced.
    Response,
    /// A rejection was produced.
    Rejection,
}

/// Severity of a broker sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSeverity {
    /// Phase completed.
    Info,
    /// Phase failed; local state is consistent.
    Error,
    /// Compensation failed; local and remote state may disagree.
    Inconsistent,
}

/// Protocol routing audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Message kind the endpoint accepts, when restricted.
    pub expected_kind: Option<&'static str>,
    /// Inbound message identifier when it could be recovered.
    pub message_id: Option<String>,
    /// Inbound message kind when the header parsed.
    pub message_kind: Option<&'static str>,
    /// Routing outcome.
    pub outcome: ProtocolOutcome,
    /// Rejection reason label for rejections.
    pub rejection_reason: Option<&'static str>,
    /// Originating cause for rejections.
    pub detail: Option<String>,
    /// Inbound body size in bytes.
    pub request_bytes: usize,
}

/// Inputs required to construct a protocol audit event.
pub struct ProtocolAuditEventParams {
    /// Message kind the endpoint accepts, when restricted.
    pub expected_kind: Option<&'static str>,
    /// Inbound message identifier when it could be recovered.
    pub message_id: Option<String>,
    /// Inbound message kind when the header parsed.
    pub message_kind: Option<&'static str>,
    /// Routing outcome.
    pub outcome: ProtocolOutcome,
    /// Rejection reason label for rejections.
    pub rejection_reason: Option<&'static str>,
    /// Originating cause for rejections.
    pub detail: Option<String>,
    /// Inbound body size in bytes.
    pub request_bytes: usize,
}

impl ProtocolAuditEvent {
    /// Creates a new protocol audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: ProtocolAuditEventParams) -> Self {
        Self {
            event: "protocol_message",
            timestamp_ms: timestamp_ms(),
            expected_kind: params.expected_kind,
            message_id: params.message_id,
            message_kind: params.message_kind,
            outcome: params.outcome,
            rejection_reason: params.rejection_reason,
            detail: params.detail,
            request_bytes: params.request_bytes,
        }
    }
}

/// Broker sync audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SyncAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label.
    pub operation: &'static str,
    /// Phase label reached when the event was recorded.
    pub phase: &'static str,
    /// Event severity.
    pub severity: SyncSeverity,
    /// Broker row identifier when the operation targets one broker.
    pub broker_id: Option<i64>,
    /// Broker URL when known.
    pub broker_url: Option<String>,
    /// Failure detail or summary.
    pub detail: Option<String>,
}

/// Inputs required to construct a sync audit event.
pub struct SyncAuditEventParams {
    /// Operation label.
    pub operation: &'static str,
    /// Phase label.
    pub phase: &'static str,
    /// Event severity.
    pub severity: SyncSeverity,
    /// Broker row identifier.
    pub broker_id: Option<i64>,
    /// Broker URL.
    pub broker_url: Option<String>,
    /// Failure detail or summary.
    pub detail: Option<String>,
}

impl SyncAuditEvent {
    /// Creates a new sync audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: SyncAuditEventParams) -> Self {
        Self {
            event: "broker_sync",
            timestamp_ms: timestamp_ms(),
            operation: params.operation,
            phase: params.phase,
            severity: params.severity,
            broker_id: params.broker_id,
            broker_url: params.broker_url,
            detail: params.detail,
        }
    }
}

/// Admin surface authorization audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AdminAuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision outcome (`allow` or `deny`).
    pub decision: &'static str,
    /// Admin action label.
    pub action: String,
    /// Caller IP address, if known.
    pub peer_ip: Option<String>,
    /// Auth method label for allowed calls.
    pub auth_method: Option<&'static str>,
    /// Bearer token fingerprint (sha256).
    pub token_fingerprint: Option<String>,
    /// Failure reason for denied calls.
    pub reason: Option<String>,
}

/// Inputs required to construct an admin auth audit event.
pub struct AdminAuthAuditEventParams {
    /// Whether the call was allowed.
    pub allowed: bool,
    /// Admin action label.
    pub action: String,
    /// Caller IP address, if known.
    pub peer_ip: Option<String>,
    /// Auth method label for allowed calls.
    pub auth_method: Option<&'static str>,
    /// Bearer token fingerprint (sha256).
    pub token_fingerprint: Option<String>,
    /// Failure reason for denied calls.
    pub reason: Option<String>,
}

impl AdminAuthAuditEvent {
    /// Creates a new admin auth audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: AdminAuthAuditEventParams) -> Self {
        Self {
            event: "admin_authz",
            timestamp_ms: timestamp_ms(),
            decision: if params.allowed { "allow" } else { "deny" },
            action: params.action,
            peer_ip: params.peer_ip,
            auth_method: params.auth_method,
            token_fingerprint: params.token_fingerprint,
            reason: params.reason,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for connector events.
pub trait ConnectorAuditSink: Send + Sync {
    /// Record a protocol routing event.
    fn record_protocol(&self, _event: &ProtocolAuditEvent) {}

    /// Record a broker sync event.
    fn record_sync(&self, _event: &SyncAuditEvent) {}

    /// Record an admin surface authorization decision.
    fn record_admin_auth(&self, _event: &AdminAuthAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl ConnectorAuditSink for StderrAuditSink {
    fn record_protocol(&self, event: &ProtocolAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_sync(&self, event: &SyncAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_admin_auth(&self, event: &AdminAuthAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl ConnectorAuditSink for FileAuditSink {
    fn record_protocol(&self, event: &ProtocolAuditEvent) {
        self.append(event);
    }

    fn record_sync(&self, event: &SyncAuditEvent) {
        self.append(event);
    }

    fn record_admin_auth(&self, event: &AdminAuthAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl ConnectorAuditSink for NoopAuditSink {}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded protocol events.
    protocol: Mutex<Vec<ProtocolAuditEvent>>,
    /// Recorded sync events.
    sync: Mutex<Vec<SyncAuditEvent>>,
    /// Recorded admin auth events.
    admin: Mutex<Vec<AdminAuthAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns recorded protocol events.
    #[must_use]
    pub fn protocol_events(&self) -> Vec<ProtocolAuditEvent> {
        self.protocol.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded sync events.
    #[must_use]
    pub fn sync_events(&self) -> Vec<SyncAuditEvent> {
        self.sync.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded admin auth events.
    #[must_use]
    pub fn admin_events(&self) -> Vec<AdminAuthAuditEvent> {
        self.admin.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl ConnectorAuditSink for MemoryAuditSink {
    fn record_protocol(&self, event: &ProtocolAuditEvent) {
        if let Ok(mut events) = self.protocol.lock() {
            events.push(event.clone());
        }
    }

    fn record_sync(&self, event: &SyncAuditEvent) {
        if let Ok(mut events) = self.sync.lock() {
            events.push(event.clone());
        }
    }

    fn record_admin_auth(&self, event: &AdminAuthAuditEvent) {
        if let Ok(mut events) = self.admin.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix epoch in milliseconds.
fn timestamp_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
