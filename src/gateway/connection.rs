//! Connection State Machine: owns the session lifecycle and drives recovery.
//!
//! Every adapter event is handled sequentially on one loop, so the
//! `reinitializing` flag alone keeps recoveries single-flight. Other
//! components only ever see a read-only [`ConnectionStatus`] snapshot.

use super::observers::Observers;
use super::relay::Relay;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use wabridge_core::{
    error::{BridgeError, CommandError},
    message::{DisconnectReason, ObserverEvent, SessionEvent, Severity},
    traits::SessionClient,
};

/// Buffered adapter events per session instance.
const SESSION_EVENT_CAPACITY: usize = 256;

/// Lifecycle state of the single messaging session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    AwaitingScan,
    Authenticated,
    Ready,
    Disconnected,
    Reinitializing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingScan => "awaiting_scan",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Reinitializing => "reinitializing",
        }
    }

    /// State after an adapter event. Recovery and logout transitions are
    /// driven by the machine itself, not by this table.
    pub fn on_event(self, event: &SessionEvent) -> Self {
        match (self, event) {
            // A live session ignores late login chatter.
            (Self::Ready, SessionEvent::Qr(_) | SessionEvent::Authenticated) => Self::Ready,
            (_, SessionEvent::Qr(_)) => Self::AwaitingScan,
            (_, SessionEvent::Authenticated) => Self::Authenticated,
            (_, SessionEvent::Ready) => Self::Ready,
            (Self::Reinitializing, SessionEvent::Disconnected(_)) => Self::Reinitializing,
            (_, SessionEvent::Disconnected(_)) => Self::Disconnected,
            (state, SessionEvent::Message(_)) => state,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot published after every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: SessionState,
    pub connected: bool,
    pub reinitializing: bool,
}

type LogoutReply = oneshot::Sender<Result<(), CommandError>>;

/// Requests into the machine loop from outside the adapter event stream.
pub(crate) enum Control {
    RecoveryFinished { ok: bool },
    Logout(LogoutReply),
}

/// Cloneable handle for status reads and operator commands.
#[derive(Clone)]
pub struct MachineHandle {
    status: watch::Receiver<ConnectionStatus>,
    control: mpsc::UnboundedSender<Control>,
}

impl MachineHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Ask the machine to log out and start a fresh session.
    pub async fn logout(&self) -> Result<(), CommandError> {
        let stopped = || CommandError::LogoutFailed("connection machine is not running".into());
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Logout(tx))
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    /// Handle frozen at `status`, with the control side handed to the test.
    #[cfg(test)]
    pub(crate) fn fixed(status: ConnectionStatus) -> (Self, mpsc::UnboundedReceiver<Control>) {
        let (_, status_rx) = watch::channel(status);
        let (control, control_rx) = mpsc::unbounded_channel();
        (
            Self {
                status: status_rx,
                control,
            },
            control_rx,
        )
    }
}

/// Reports the end of a recovery task when dropped, so the single-flight
/// flag is released on success, failure, and panic alike.
struct RecoveryGuard {
    control: mpsc::UnboundedSender<Control>,
    ok: bool,
}

impl Drop for RecoveryGuard {
    fn drop(&mut self) {
        let _ = self
            .control
            .send(Control::RecoveryFinished { ok: self.ok });
    }
}

pub struct ConnectionMachine {
    session: Arc<dyn SessionClient>,
    relay: Arc<Relay>,
    observers: Observers,
    backoff: Duration,
    status: watch::Sender<ConnectionStatus>,
    session_rx: mpsc::Receiver<SessionEvent>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    /// Disconnect from the new instance that arrived before its recovery
    /// reported back.
    pending_disconnect: Option<DisconnectReason>,
    /// Operator logout waiting for the running recovery.
    pending_logout: Option<LogoutReply>,
}

impl ConnectionMachine {
    pub fn new(
        session: Arc<dyn SessionClient>,
        relay: Arc<Relay>,
        observers: Observers,
        backoff: Duration,
    ) -> (Self, MachineHandle) {
        let (status, status_rx) = watch::channel(ConnectionStatus::default());
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        // Replaced on the first initialize.
        let (_, session_rx) = mpsc::channel(1);
        let handle = MachineHandle {
            status: status_rx,
            control: control_tx.clone(),
        };
        let machine = Self {
            session,
            relay,
            observers,
            backoff,
            status,
            session_rx,
            control_tx,
            control_rx,
            pending_disconnect: None,
            pending_logout: None,
        };
        (machine, handle)
    }

    /// Start the first session and process events until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), BridgeError> {
        self.start().await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                more = self.step() => {
                    if !more {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.session.destroy().await {
            warn!("failed to destroy session on shutdown: {e}");
        }
        Ok(())
    }

    /// Initialize the first session instance.
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        let events = self.fresh_event_stream();
        info!(
            "starting {} session (persisted credentials: {})",
            self.session.name(),
            self.session.has_persisted_session()
        );
        if let Err(e) = self.session.initialize(events).await {
            self.set_state(SessionState::Disconnected);
            self.observers
                .status(Severity::Danger, format!("Failed to start session: {e}"));
            return Err(e);
        }
        Ok(())
    }

    /// Handle one input. Returns `false` once no input can ever arrive.
    pub(crate) async fn step(&mut self) -> bool {
        let control = tokio::select! {
            Some(event) = self.session_rx.recv() => {
                self.handle_session_event(event);
                return true;
            }
            Some(control) = self.control_rx.recv() => control,
            else => return false,
        };

        match control {
            Control::RecoveryFinished { ok } => self.finish_recovery(ok).await,
            Control::Logout(reply) => self.request_logout(reply).await,
        }
        true
    }

    /// Swap in a new event channel. Dropping the old receiver discards
    /// whatever the previous session instance still had queued.
    fn fresh_event_stream(&mut self) -> mpsc::Sender<SessionEvent> {
        let (tx, rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
        self.session_rx = rx;
        tx
    }

    fn set_state(&self, state: SessionState) {
        self.status.send_modify(|s| s.state = state);
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        let before = self.status.borrow().state;
        let after = before.on_event(&event);
        if before != after {
            debug!("session state {before} -> {after}");
            self.set_state(after);
        }

        match event {
            SessionEvent::Qr(payload) => self.on_qr(&payload),
            SessionEvent::Authenticated => {
                info!("session authenticated");
                self.observers
                    .status(Severity::Info, "Authenticated, loading session");
            }
            SessionEvent::Ready => {
                info!("session ready");
                self.status.send_modify(|s| s.connected = true);
                self.observers.publish(ObserverEvent::Ready);
                self.observers.publish(ObserverEvent::LoggedIn);
                self.observers
                    .publish(ObserverEvent::ConnectionChanged(true));
                self.observers
                    .status(Severity::Success, "WhatsApp is connected");
            }
            SessionEvent::Disconnected(reason) => self.on_disconnected(reason),
            SessionEvent::Message(msg) => {
                debug!("inbound message from {}", msg.sender_address);
                self.observers.publish(ObserverEvent::Message {
                    from: msg.sender_address.clone(),
                    body: msg.body.clone(),
                });
                let relay = self.relay.clone();
                tokio::spawn(async move {
                    relay.on_inbound(&msg).await;
                });
            }
        }
    }

    fn on_qr(&self, payload: &str) {
        match wabridge_channels::qr::generate_qr_terminal(payload) {
            Ok(art) => info!("scan this QR code with WhatsApp:\n{art}"),
            Err(e) => warn!("failed to render terminal QR: {e}"),
        }
        match wabridge_channels::qr::qr_data_url(payload) {
            Ok(url) => self.observers.publish(ObserverEvent::Qr(url)),
            Err(e) => warn!("failed to encode QR image: {e}"),
        }
        self.observers.status(
            Severity::Warning,
            "Scan the QR code with WhatsApp to link this device",
        );
    }

    fn on_disconnected(&mut self, reason: DisconnectReason) {
        warn!("session disconnected: {reason}");
        self.status.send_modify(|s| s.connected = false);
        self.observers
            .publish(ObserverEvent::ConnectionChanged(false));
        self.observers
            .status(Severity::Danger, format!("WhatsApp disconnected ({reason})"));

        if self.status.borrow().reinitializing {
            // The old instance's channel is gone, so this came from the new one.
            info!("disconnect while reconnecting, another reconnect will follow");
            self.pending_disconnect = Some(match self.pending_disconnect.take() {
                Some(queued) if queued.is_logout() => queued,
                _ => reason,
            });
            return;
        }
        self.begin_recovery(reason);
    }

    fn begin_recovery(&mut self, reason: DisconnectReason) {
        self.status.send_modify(|s| {
            s.state = SessionState::Reinitializing;
            s.reinitializing = true;
        });
        let wipe = reason.is_logout();
        info!(
            "reconnecting in {}s{}",
            self.backoff.as_secs(),
            if wipe { ", session data will be cleared" } else { "" }
        );

        let events = self.fresh_event_stream();
        let guard = RecoveryGuard {
            control: self.control_tx.clone(),
            ok: false,
        };
        tokio::spawn(recover(
            self.session.clone(),
            wipe,
            self.backoff,
            events,
            guard,
        ));
    }

    async fn finish_recovery(&mut self, ok: bool) {
        let mut failed_while_pending = false;
        self.status.send_modify(|s| {
            s.reinitializing = false;
            if s.state == SessionState::Reinitializing {
                if ok {
                    s.state = SessionState::Uninitialized;
                } else {
                    s.state = SessionState::Disconnected;
                    failed_while_pending = true;
                }
            }
        });

        if ok {
            info!("session reinitialized");
        } else {
            error!("recovery failed, waiting for the next disconnect to retry");
            if failed_while_pending {
                self.observers
                    .status(Severity::Danger, "Reconnect failed");
            }
        }

        if let Some(reply) = self.pending_logout.take() {
            // A logout restarts from scratch; a queued reconnect is moot.
            self.pending_disconnect = None;
            let _ = reply.send(self.logout().await);
            return;
        }
        if let Some(reason) = self.pending_disconnect.take() {
            self.begin_recovery(reason);
        }
    }

    /// Run a logout now, or hold it until the running recovery reports back.
    async fn request_logout(&mut self, reply: LogoutReply) {
        if !self.status.borrow().reinitializing {
            let _ = reply.send(self.logout().await);
            return;
        }
        if self.pending_logout.is_some() {
            let _ = reply.send(Err(CommandError::LogoutFailed(
                "a logout is already pending".into(),
            )));
            return;
        }
        info!("reconnect in progress, logout deferred until it finishes");
        self.pending_logout = Some(reply);
    }

    async fn logout(&mut self) -> Result<(), CommandError> {
        info!("logging out of {} session", self.session.name());
        if let Err(e) = self.session.logout().await {
            warn!("logout failed, continuing with teardown: {e}");
        }
        if let Err(e) = self.session.destroy().await {
            warn!("destroy after logout failed: {e}");
        }

        let events = self.fresh_event_stream();
        self.status.send_modify(|s| {
            s.state = SessionState::Uninitialized;
            s.connected = false;
        });
        self.observers
            .publish(ObserverEvent::ConnectionChanged(false));
        self.observers
            .status(Severity::Warning, "Logged out, waiting for a new QR code");

        let cleared = self.session.clear_session().await;
        if let Err(e) = &cleared {
            error!("failed to clear session data, restarting anyway: {e}");
        }
        if let Err(e) = self.session.initialize(events).await {
            self.set_state(SessionState::Disconnected);
            self.observers
                .status(Severity::Danger, format!("Failed to restart session: {e}"));
            return Err(CommandError::LogoutFailed(format!(
                "failed to restart session: {e}"
            )));
        }
        cleared.map_err(|e| {
            CommandError::LogoutFailed(format!("session restarted but not cleared: {e}"))
        })
    }
}

/// Tear down the old instance, let it settle, then start a new one.
async fn recover(
    session: Arc<dyn SessionClient>,
    wipe: bool,
    backoff: Duration,
    events: mpsc::Sender<SessionEvent>,
    mut guard: RecoveryGuard,
) {
    if let Err(e) = session.destroy().await {
        warn!("destroy during recovery failed: {e}");
    }
    if wipe {
        if let Err(e) = session.clear_session().await {
            warn!("failed to clear session data: {e}");
        }
    }

    tokio::time::sleep(backoff).await;

    match session.initialize(events).await {
        Ok(()) => guard.ok = true,
        Err(e) => error!("reinitialize failed: {e}"),
    }
}
