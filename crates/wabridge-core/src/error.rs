use thiserror::Error;

/// Top-level error type for bridge infrastructure.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Error from the messaging session transport.
    #[error("session error: {0}")]
    Session(String),

    /// Error talking to the automation webhook.
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structured failure returned to Command Gateway callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The number does not normalise to a valid local mobile number.
    #[error("invalid number {0}: use the 628xxxxxxxxxx format (digits only)")]
    InvalidNumber(String),

    /// The transport reports the number has no account.
    #[error("number {0} is not registered on WhatsApp")]
    NotRegistered(String),

    /// A send was attempted (or refused by the transport) and did not succeed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Webhook URL or token is missing.
    #[error("webhook is not configured")]
    NotConfigured,

    /// Caller supplied unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The webhook record could not be written.
    #[error("failed to persist config: {0}")]
    PersistFailed(String),

    /// Logout or the follow-up re-initialization failed.
    #[error("logout failed: {0}")]
    LogoutFailed(String),
}

impl CommandError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidNumber(_) => "INVALID_NUMBER",
            Self::NotRegistered(_) => "NOT_REGISTERED",
            Self::SendFailed(_) => "SEND_FAILED",
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::PersistFailed(_) => "PERSIST_FAILED",
            Self::LogoutFailed(_) => "LOGOUT_FAILED",
        }
    }
}
