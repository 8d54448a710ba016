//! Bot lifecycle: building, running, and tearing down the WhatsApp bot.

use super::events::translate_message;
use super::WhatsAppSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wabridge_core::{
    error::BridgeError,
    message::{DisconnectReason, SessionEvent},
};
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

impl WhatsAppSession {
    /// Build a WhatsApp bot wired to `events` and run it in the background.
    pub(super) async fn build_and_run_bot(
        &self,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<(), BridgeError> {
        let session_dir = self.session_dir();
        std::fs::create_dir_all(&session_dir)?;
        let db_path = self.session_db_path();
        let db_path = db_path.to_string_lossy().into_owned();

        info!("WhatsApp bot building (session: {db_path})...");

        let backend = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .map_err(|e| BridgeError::Session(format!("whatsapp store init failed: {e}")))?,
        );

        let client_handle = self.client.clone();
        // Reset per bot instance: a resumed session reports `Connected` without pairing.
        let authenticated = Arc::new(AtomicBool::new(false));

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.config.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, client| {
                let events = events.clone();
                let client_store = client_handle.clone();
                let authenticated = authenticated.clone();
                async move {
                    let forwarded: Vec<SessionEvent> = match event {
                        Event::PairingQrCode { code, .. } => {
                            info!("WhatsApp QR code generated (scan to pair)");
                            vec![SessionEvent::Qr(code)]
                        }
                        Event::PairSuccess(_) => {
                            info!("WhatsApp pairing successful");
                            authenticated.store(true, Ordering::SeqCst);
                            vec![SessionEvent::Authenticated]
                        }
                        Event::Connected(_) => {
                            info!("WhatsApp connected");
                            *client_store.lock().await = Some(client);
                            if authenticated.swap(true, Ordering::SeqCst) {
                                vec![SessionEvent::Ready]
                            } else {
                                vec![SessionEvent::Authenticated, SessionEvent::Ready]
                            }
                        }
                        Event::Disconnected(_) => {
                            warn!("WhatsApp disconnected");
                            *client_store.lock().await = None;
                            vec![SessionEvent::Disconnected(DisconnectReason::ConnectionLost)]
                        }
                        Event::LoggedOut(_) => {
                            warn!("WhatsApp logged out, session invalidated");
                            *client_store.lock().await = None;
                            vec![SessionEvent::Disconnected(DisconnectReason::Logout)]
                        }
                        Event::Message(msg, info) => translate_message(&msg, &info)
                            .map(SessionEvent::Message)
                            .into_iter()
                            .collect(),
                        _ => Vec::new(),
                    };

                    for ev in forwarded {
                        if events.send(ev).await.is_err() {
                            debug!("session event receiver dropped");
                            break;
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| BridgeError::Session(format!("whatsapp bot build failed: {e}")))?;

        let handle = bot
            .run()
            .await
            .map_err(|e| BridgeError::Session(format!("whatsapp bot run failed: {e}")))?;
        *self.bot_task.lock().await = Some(handle);

        info!("WhatsApp bot started");
        Ok(())
    }

    /// Disconnect the client and stop the bot task. No-op when nothing runs.
    pub(super) async fn teardown(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.disconnect().await;
        }
        if let Some(task) = self.bot_task.lock().await.take() {
            task.abort();
            info!("WhatsApp bot stopped");
        }
    }
}
