//! `SessionClient` implementation for WhatsApp.

use super::address::to_jid;
use super::send::{split_message, MAX_MESSAGE_LEN};
use super::WhatsAppSession;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wabridge_core::{error::BridgeError, message::SessionEvent, traits::SessionClient};
use wacore_binary::jid::JidExt;

#[async_trait]
impl SessionClient for WhatsAppSession {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn initialize(&self, events: mpsc::Sender<SessionEvent>) -> Result<(), BridgeError> {
        if self.bot_task.lock().await.is_some() {
            debug!("WhatsApp bot already running, initialize is a no-op");
            return Ok(());
        }
        self.build_and_run_bot(events).await
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        self.teardown().await;
        Ok(())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        // Credentials are removed by `clear_session`; this only drops the link.
        info!("WhatsApp logout requested");
        self.teardown().await;
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), BridgeError> {
        let dir = self.session_dir();
        if dir.exists() {
            info!("deleting WhatsApp session at {}", dir.display());
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), BridgeError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| BridgeError::Session("whatsapp client not connected".into()))?;
        let jid = to_jid(address)?;

        for chunk in split_message(body, MAX_MESSAGE_LEN) {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            client
                .send_message(jid.clone(), msg)
                .await
                .map_err(|e| BridgeError::Session(format!("whatsapp send failed: {e}")))?;
        }

        Ok(())
    }

    async fn is_registered_user(&self, address: &str) -> Result<bool, BridgeError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| BridgeError::Session("whatsapp client not connected".into()))?;
        let jid = to_jid(address)?;
        if jid.is_group() {
            return Ok(true);
        }

        let results = client
            .contacts()
            .is_on_whatsapp(&[jid.user.as_str()])
            .await
            .map_err(|e| BridgeError::Session(format!("whatsapp lookup failed: {e}")))?;

        let registered = results.iter().any(|r| r.is_registered);
        if !registered {
            warn!("{} is not on WhatsApp", jid.user);
        }
        Ok(registered)
    }

    fn has_persisted_session(&self) -> bool {
        self.session_db_path().exists()
    }
}
