//! WhatsApp session adapter: pure Rust implementation via `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code, like WhatsApp Web.
//! Session is persisted to `{data_dir}/whatsapp_session/whatsapp.db`.

mod address;
mod bot;
mod events;
mod send;
mod session;

#[cfg(test)]
mod tests;

pub use address::{canonical_address, to_jid};

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use wabridge_core::config::WhatsAppConfig;

/// WhatsApp session using the WhatsApp Web protocol.
pub struct WhatsAppSession {
    pub(super) config: WhatsAppConfig,
    pub(super) data_dir: PathBuf,
    /// Client handle for sending: set once the bot reports `Connected`.
    pub(super) client: Arc<Mutex<Option<Arc<whatsapp_rust::client::Client>>>>,
    /// Background task driving the current bot instance.
    pub(super) bot_task: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppSession {
    /// Create a session adapter rooted at `data_dir` (already `~`-expanded).
    pub fn new(config: WhatsAppConfig, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            data_dir: data_dir.into(),
            client: Arc::new(Mutex::new(None)),
            bot_task: Mutex::new(None),
        }
    }

    /// Check if the WhatsApp client is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Directory holding persisted credentials.
    pub fn session_dir(&self) -> PathBuf {
        self.data_dir.join("whatsapp_session")
    }

    pub(super) fn session_db_path(&self) -> PathBuf {
        self.session_dir().join("whatsapp.db")
    }
}
