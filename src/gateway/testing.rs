//! Recording `SessionClient` double shared by the gateway and API tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wabridge_core::{error::BridgeError, message::SessionEvent, traits::SessionClient};

/// Records every adapter call and lets tests emit session events.
pub(crate) struct MockSession {
    calls: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    /// Stands in for credentials on disk.
    pub persisted: AtomicBool,
    pub registered: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_lookup: AtomicBool,
    pub fail_initialize: AtomicBool,
    pub fail_clear: AtomicBool,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            persisted: AtomicBool::new(true),
            registered: AtomicBool::new(true),
            fail_send: AtomicBool::new(false),
            fail_lookup: AtomicBool::new(false),
            fail_initialize: AtomicBool::new(false),
            fail_clear: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn sends(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("send:"))
            .collect()
    }

    /// Emit an event on the stream handed to the latest successful `initialize`.
    pub fn emit(&self, event: SessionEvent) {
        let tx = self.events.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(event);
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SessionClient for MockSession {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(&self, events: mpsc::Sender<SessionEvent>) -> Result<(), BridgeError> {
        let persisted = self.persisted.load(Ordering::SeqCst);
        self.record(format!("initialize(persisted={persisted})"));
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(BridgeError::Session("browser failed to launch".into()));
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        self.record("destroy".into());
        Ok(())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.record("logout".into());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), BridgeError> {
        self.record("clear_session".into());
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(BridgeError::Session("session directory is locked".into()));
        }
        self.persisted.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), BridgeError> {
        self.record(format!("send:{address}:{body}"));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BridgeError::Session("session closed".into()));
        }
        Ok(())
    }

    async fn is_registered_user(&self, address: &str) -> Result<bool, BridgeError> {
        self.record(format!("is_registered:{address}"));
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(BridgeError::Session("lookup timed out".into()));
        }
        Ok(self.registered.load(Ordering::SeqCst))
    }

    fn has_persisted_session(&self) -> bool {
        self.persisted.load(Ordering::SeqCst)
    }
}
