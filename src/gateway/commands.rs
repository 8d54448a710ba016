//! Command Gateway: the operator operations (manual send, status,
//! webhook config, logout) exposed over the core.

use super::connection::{MachineHandle, SessionState};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use wabridge_core::{
    config::{WebhookConfig, WebhookStore},
    error::CommandError,
    number,
    traits::SessionClient,
};

/// Snapshot returned by [`CommandGateway::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,
    pub state: SessionState,
}

#[derive(Clone)]
pub struct CommandGateway {
    session: Arc<dyn SessionClient>,
    webhooks: WebhookStore,
    machine: MachineHandle,
    uptime: Instant,
}

impl CommandGateway {
    pub fn new(
        session: Arc<dyn SessionClient>,
        webhooks: WebhookStore,
        machine: MachineHandle,
        uptime: Instant,
    ) -> Self {
        Self {
            session,
            webhooks,
            machine,
            uptime,
        }
    }

    /// Send `body` to a raw phone number. Returns the canonical address on success.
    pub async fn send(&self, raw_number: &str, body: &str) -> Result<String, CommandError> {
        let address = number::canonical_for_send(raw_number)?;
        if body.trim().is_empty() {
            return Err(CommandError::InvalidInput("message must not be empty".into()));
        }

        let status = self.machine.status();
        if status.state != SessionState::Ready || !status.connected {
            return Err(CommandError::SendFailed(format!(
                "session not ready ({})",
                status.state
            )));
        }

        // Fail closed: a lookup error counts as not registered.
        let registered = match self.session.is_registered_user(&address).await {
            Ok(registered) => registered,
            Err(e) => {
                warn!("registration check for {address} failed: {e}");
                false
            }
        };
        if !registered {
            return Err(CommandError::NotRegistered(
                number::local_part(&address).to_string(),
            ));
        }

        self.session
            .send_message(&address, body)
            .await
            .map_err(|e| CommandError::SendFailed(e.to_string()))?;
        info!("manual message sent to {address}");
        Ok(address)
    }

    pub fn status(&self) -> StatusReport {
        let status = self.machine.status();
        StatusReport {
            connected: status.connected,
            uptime_seconds: self.uptime.elapsed().as_secs(),
            state: status.state,
        }
    }

    pub fn get_config(&self) -> Result<WebhookConfig, CommandError> {
        match self.webhooks.load() {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Err(CommandError::NotConfigured),
            Err(e) => {
                warn!("webhook record unreadable: {e}");
                Err(CommandError::NotConfigured)
            }
        }
    }

    pub fn set_config(&self, url: &str, token: &str) -> Result<WebhookConfig, CommandError> {
        let url = url.trim();
        let token = token.trim();
        if url.is_empty() || token.is_empty() {
            return Err(CommandError::InvalidInput(
                "webhook_url and webhook_token are required".into(),
            ));
        }
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(CommandError::InvalidInput(format!(
                    "webhook_url must be an http(s) URL, got {url}"
                )))
            }
        }

        let config = WebhookConfig::new(url, token);
        self.webhooks
            .save(&config)
            .map_err(|e| CommandError::PersistFailed(e.to_string()))?;
        info!("webhook config updated: {url}");
        Ok(config)
    }

    pub async fn logout(&self) -> Result<(), CommandError> {
        self.machine.logout().await
    }
}
