//! Gateway: wires the session adapter, relay, command surface and API
//! together and runs the connection loop until shutdown.

pub mod commands;
pub mod connection;
pub mod observers;
pub mod relay;

#[cfg(test)]
pub(crate) mod testing;

use commands::CommandGateway;
use connection::ConnectionMachine;
use observers::Observers;
use relay::Relay;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use wabridge_core::{
    config::{Config, WebhookStore},
    traits::SessionClient,
};

/// The bridge process: one session, one relay, one HTTP surface.
pub struct Gateway {
    config: Config,
    session: Arc<dyn SessionClient>,
    uptime: Instant,
}

impl Gateway {
    pub fn new(config: Config, session: Arc<dyn SessionClient>) -> Self {
        Self {
            config,
            session,
            uptime: Instant::now(),
        }
    }

    /// Run until `shutdown` resolves, then tear the session down.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let webhooks = WebhookStore::new(self.config.bridge.webhook_path());
        info!(
            "wabridge running | session: {} | webhook record: {} | api: {}",
            self.session.name(),
            webhooks.path().display(),
            if self.config.api.enabled {
                format!("{}:{}", self.config.api.host, self.config.api.port)
            } else {
                "disabled".to_string()
            },
        );

        let observers = Observers::new();
        let relay = Relay::new(
            webhooks.clone(),
            self.session.clone(),
            self.config.relay.timeout(),
        )?;
        let (machine, handle) = ConnectionMachine::new(
            self.session.clone(),
            Arc::new(relay),
            observers.clone(),
            self.config.relay.backoff(),
        );
        let commands = CommandGateway::new(self.session.clone(), webhooks, handle, self.uptime);

        // Spawn HTTP API server.
        let api_handle = if self.config.api.enabled {
            let state = crate::api::ApiState::new(commands, observers, &self.config.api);
            let api_cfg = self.config.api.clone();
            Some(tokio::spawn(async move {
                crate::api::serve(api_cfg, state).await;
            }))
        } else {
            None
        };

        let result = machine.run(shutdown).await;

        if let Some(h) = api_handle {
            h.abort();
        }
        info!("Shutdown complete.");
        result.map_err(|e| anyhow::anyhow!("session failed to start: {e}"))
    }
}
