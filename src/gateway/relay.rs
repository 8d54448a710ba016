//! Relay Engine: forwards inbound messages to the webhook and sends its
//! reply back to the original sender.
//!
//! One best-effort attempt per message: no retry, no queue. Failures are
//! logged and the message is dropped for relay purposes.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use wabridge_core::{
    config::{WebhookConfig, WebhookStore},
    error::BridgeError,
    message::{InboundMessage, OutboundRequest},
    number,
    traits::SessionClient,
};

/// Relay-only failures. Never surfaced to the original sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("webhook unreachable: {0}")]
    Unreachable(String),
    #[error("webhook responded with HTTP {0}")]
    Status(u16),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "WEBHOOK_UNREACHABLE",
            Self::Status(_) => "WEBHOOK_ERROR",
        }
    }
}

/// What happened to the webhook's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Response carried no usable `message` field.
    None,
    Sent,
    Failed,
}

/// Result of one relay attempt, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Blank body, nothing to relay.
    Ignored,
    /// Webhook URL or token missing.
    NotConfigured,
    Failed(RelayError),
    Delivered { reply: ReplyOutcome },
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    name: &'a str,
    message: &'a str,
}

pub struct Relay {
    http: reqwest::Client,
    webhooks: WebhookStore,
    session: Arc<dyn SessionClient>,
}

impl Relay {
    /// Build a relay whose webhook calls give up after `timeout`.
    pub fn new(
        webhooks: WebhookStore,
        session: Arc<dyn SessionClient>,
        timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Webhook(format!("http client init failed: {e}")))?;
        Ok(Self {
            http,
            webhooks,
            session,
        })
    }

    /// Relay one inbound message.
    pub async fn on_inbound(&self, msg: &InboundMessage) -> RelayOutcome {
        if msg.body.trim().is_empty() {
            return RelayOutcome::Ignored;
        }

        // Read-through so config updates apply to the very next message.
        let config = match self.webhooks.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                warn!(
                    "webhook not configured, dropping message from {}",
                    msg.sender_address
                );
                return RelayOutcome::NotConfigured;
            }
            Err(e) => {
                warn!(
                    "webhook record unreadable ({e}), dropping message from {}",
                    msg.sender_address
                );
                return RelayOutcome::NotConfigured;
            }
        };

        let response = match self.post(&config, msg).await {
            Ok(body) => body,
            Err(e) => {
                warn!(code = e.code(), "relay to webhook failed: {e}");
                return RelayOutcome::Failed(e);
            }
        };
        info!("message from {} relayed to webhook", msg.sender_address);

        let Some(reply) = reply_text(&response) else {
            info!("webhook sent no reply for {}", msg.sender_address);
            return RelayOutcome::Delivered {
                reply: ReplyOutcome::None,
            };
        };

        let request = OutboundRequest {
            target_address: msg.sender_address.clone(),
            body: reply,
        };
        let reply = self.dispatch_reply(&request).await;
        RelayOutcome::Delivered { reply }
    }

    async fn post(
        &self,
        config: &WebhookConfig,
        msg: &InboundMessage,
    ) -> Result<String, RelayError> {
        let payload = WebhookPayload {
            from: &msg.sender_address,
            name: msg.sender_name.as_deref().unwrap_or(""),
            message: &msg.body,
        };

        let resp = self
            .http
            .post(&config.url)
            .bearer_auth(&config.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        // An unreadable body still counts as delivered; it just carries no reply.
        Ok(resp.text().await.unwrap_or_default())
    }

    async fn dispatch_reply(&self, request: &OutboundRequest) -> ReplyOutcome {
        if !number::is_canonical_address(&request.target_address) {
            warn!(
                "not replying to non-canonical address {}",
                request.target_address
            );
            return ReplyOutcome::Failed;
        }

        match self
            .session
            .send_message(&request.target_address, &request.body)
            .await
        {
            Ok(()) => {
                info!("webhook reply sent to {}", request.target_address);
                ReplyOutcome::Sent
            }
            Err(e) => {
                warn!("webhook reply to {} failed: {e}", request.target_address);
                ReplyOutcome::Failed
            }
        }
    }
}

/// The `message` string of a webhook response, if present and non-blank.
fn reply_text(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::MockSession;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: WebhookStore,
        session: Arc<MockSession>,
        relay: Relay,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = WebhookStore::new(dir.path().join("data/webhook.toml"));
        let session = MockSession::new();
        let relay = Relay::new(store.clone(), session.clone(), Duration::from_secs(5)).unwrap();
        Fixture {
            _dir: dir,
            store,
            session,
            relay,
        }
    }

    fn configure(fx: &Fixture, server: &MockServer) {
        fx.store
            .save(&WebhookConfig::new(
                format!("{}/webhook/whatsapp-masuk", server.uri()),
                "secret-token",
            ))
            .unwrap();
    }

    fn halo() -> InboundMessage {
        InboundMessage::new("6281111111111@c.us", None, "halo")
    }

    #[test]
    fn test_reply_text() {
        assert_eq!(reply_text(r#"{"message":"hi"}"#).as_deref(), Some("hi"));
        assert_eq!(reply_text(r#"{"ok":true}"#), None);
        assert_eq!(reply_text(r#"{"message":42}"#), None);
        assert_eq!(reply_text(r#"{"message":"  "}"#), None);
        assert_eq!(reply_text("accepted"), None);
        assert_eq!(reply_text(""), None);
    }

    #[test]
    fn test_relay_error_codes() {
        assert_eq!(RelayError::Unreachable("x".into()).code(), "WEBHOOK_UNREACHABLE");
        assert_eq!(RelayError::Status(500).code(), "WEBHOOK_ERROR");
    }

    #[tokio::test]
    async fn test_not_configured_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture();
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert_eq!(outcome, RelayOutcome::NotConfigured);
        assert!(fx.session.sends().is_empty());
    }

    #[tokio::test]
    async fn test_blank_body_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        let msg = InboundMessage::new("6281111111111@c.us", None, "  \n\t");
        assert_eq!(fx.relay.on_inbound(&msg).await, RelayOutcome::Ignored);
        assert!(fx.session.sends().is_empty());
    }

    #[tokio::test]
    async fn test_reply_is_sent_to_sender() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert_eq!(
            outcome,
            RelayOutcome::Delivered {
                reply: ReplyOutcome::Sent
            }
        );
        assert_eq!(fx.session.sends(), vec!["send:6281111111111@c.us:hi"]);
    }

    #[tokio::test]
    async fn test_no_message_field_means_no_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert_eq!(
            outcome,
            RelayOutcome::Delivered {
                reply: ReplyOutcome::None
            }
        );
        assert!(fx.session.sends().is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_payload_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/whatsapp-masuk"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(serde_json::json!({
                "from": "6281111111111@c.us",
                "name": "",
                "message": "halo",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "Hai juga!"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert_eq!(
            outcome,
            RelayOutcome::Delivered {
                reply: ReplyOutcome::Sent
            }
        );
        assert_eq!(fx.session.sends(), vec!["send:6281111111111@c.us:Hai juga!"]);
    }

    #[tokio::test]
    async fn test_sender_name_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "from": "6281111111111@c.us",
                "name": "Budi",
                "message": "pagi",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        let msg = InboundMessage::new("6281111111111@c.us", Some("Budi".into()), "pagi");
        assert_eq!(
            fx.relay.on_inbound(&msg).await,
            RelayOutcome::Delivered {
                reply: ReplyOutcome::None
            }
        );
    }

    #[tokio::test]
    async fn test_webhook_error_status_drops_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"message": "oops"})))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert_eq!(outcome, RelayOutcome::Failed(RelayError::Status(500)));
        assert!(fx.session.sends().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_drops_message() {
        let fx = fixture();
        fx.store
            .save(&WebhookConfig::new("http://127.0.0.1:1/hook", "t"))
            .unwrap();
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert!(matches!(outcome, RelayOutcome::Failed(RelayError::Unreachable(_))));
        assert!(fx.session.sends().is_empty());
    }

    #[tokio::test]
    async fn test_reply_failure_keeps_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "hi"})))
            .mount(&server)
            .await;

        let fx = fixture();
        configure(&fx, &server);
        fx.session.fail_send.store(true, Ordering::SeqCst);
        let outcome = fx.relay.on_inbound(&halo()).await;
        assert_eq!(
            outcome,
            RelayOutcome::Delivered {
                reply: ReplyOutcome::Failed
            }
        );
        assert_eq!(fx.session.sends().len(), 1);
    }

    #[tokio::test]
    async fn test_config_update_applies_to_next_message() {
        let first = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&first)
            .await;
        let second = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&second)
            .await;

        let fx = fixture();
        configure(&fx, &first);
        fx.relay.on_inbound(&halo()).await;
        configure(&fx, &second);
        fx.relay.on_inbound(&halo()).await;
    }
}
