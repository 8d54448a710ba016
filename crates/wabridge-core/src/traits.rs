use crate::{error::BridgeError, message::SessionEvent};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Messaging session capability: the Session Client Adapter.
///
/// Wraps one transport session. Lifecycle completion is signalled through
/// the event sender handed to [`SessionClient::initialize`], never through
/// return values. Events for one session instance are delivered in order.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Human-readable transport name.
    fn name(&self) -> &str;

    /// Start or resume a session. Events flow into `events` until the
    /// session is destroyed.
    async fn initialize(&self, events: mpsc::Sender<SessionEvent>) -> Result<(), BridgeError>;

    /// Release the current session instance. Safe on an already torn down session.
    async fn destroy(&self) -> Result<(), BridgeError>;

    /// Unlink the device from the account. Safe on an already torn down session.
    async fn logout(&self) -> Result<(), BridgeError>;

    /// Remove persisted credentials so the next `initialize` requires a fresh scan.
    async fn clear_session(&self) -> Result<(), BridgeError>;

    /// Send a text message to a canonical address.
    async fn send_message(&self, address: &str, body: &str) -> Result<(), BridgeError>;

    /// Whether the canonical address belongs to a registered account.
    async fn is_registered_user(&self, address: &str) -> Result<bool, BridgeError>;

    /// Whether persisted credentials currently exist.
    fn has_persisted_session(&self) -> bool {
        false
    }
}
