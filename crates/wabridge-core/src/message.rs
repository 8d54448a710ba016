use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An incoming message from the messaging session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    /// Canonical address of the chat the message came from (e.g. `628xx@c.us`).
    pub sender_address: String,
    /// Push name of the sender, if the transport supplied one.
    pub sender_name: Option<String>,
    /// Message text content.
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        sender_address: impl Into<String>,
        sender_name: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_address: sender_address.into(),
            sender_name,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A message to dispatch through the session, either an auto-reply or a manual send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Canonical target address.
    pub target_address: String,
    pub body: String,
}

/// Why the transport dropped the session.
///
/// The transport's reason taxonomy is an external contract; only `Logout`
/// changes recovery behaviour (persisted session data is wiped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The device was unlinked from the phone; stored credentials are dead.
    Logout,
    /// Socket or stream loss; stored credentials remain valid.
    ConnectionLost,
    /// Any other transport-specific reason.
    Other(String),
}

impl DisconnectReason {
    pub fn is_logout(&self) -> bool {
        matches!(self, Self::Logout)
    }

    /// Reason code as reported in logs and status texts.
    pub fn code(&self) -> &str {
        match self {
            Self::Logout => "LOGOUT",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Lifecycle and message events emitted by a session adapter, in order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A login code is ready to be scanned (raw QR payload).
    Qr(String),
    Authenticated,
    Ready,
    Disconnected(DisconnectReason),
    Message(InboundMessage),
}

/// Severity of a status notification pushed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

/// Push notification for dashboard observers. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ObserverEvent {
    /// QR code as a `data:image/png;base64,...` URL.
    Qr(String),
    Status { severity: Severity, text: String },
    ConnectionChanged(bool),
    Ready,
    LoggedIn,
    Message { from: String, body: String },
}

impl ObserverEvent {
    /// Event name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Status { .. } => "status",
            Self::ConnectionChanged(_) => "connection-changed",
            Self::Ready => "ready",
            Self::LoggedIn => "logged-in",
            Self::Message { .. } => "message",
        }
    }

    pub fn status(severity: Severity, text: impl Into<String>) -> Self {
        Self::Status {
            severity,
            text: text.into(),
        }
    }
}
