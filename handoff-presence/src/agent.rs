//! Presence agent state machine
//!
//! ```text
//! Disconnected ──▶ Connecting ──ok──▶ Connected ──close/error──▶ Disconnected
//!      ▲               │                                             │
//!      │               └──fail──▶ Disconnected                       │
//!      └──────────── one reconnect after `reconnect_delay` ◀─────────┘
//! ```
//!
//! On entering `Connected` the agent sends `register` if an identity is
//! known, and sends it again whenever the identity is announced later.
//! Shutting the agent down cancels any pending reconnect.

use handoff_common::{ClientMessage, Identity, Role, ServerMessage};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connector::{Connector, Transport};
use crate::PresenceError;

const EVENT_BUFFER: usize = 64;

/// Connection state of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Disconnected,
    Connecting,
    Connected,
}

/// Agent settings
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Delay before the single reconnect attempt that follows a disconnect
    pub reconnect_delay: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

enum Command {
    Announce(Identity, Role),
}

/// Handle to a running presence agent
///
/// Dropping the handle stops the agent just like [`PresenceAgent::shutdown`],
/// without waiting for the task to finish.
pub struct PresenceAgent {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PresenceState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PresenceAgent {
    /// Start the agent on the current tokio runtime
    ///
    /// Returns the handle and the receiver on which parsed server messages
    /// are delivered.
    pub fn spawn<C: Connector>(
        connector: C,
        config: PresenceConfig,
    ) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PresenceState::Disconnected);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let worker = Worker {
            connector,
            config,
            commands: commands_rx,
            state: state_tx,
            events: events_tx,
            cancel: cancel.clone(),
            announcement: None,
        };
        let task = tokio::spawn(worker.run());

        let agent = Self {
            commands: commands_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        };
        (agent, events_rx)
    }

    /// Set the identity and role to announce
    ///
    /// Sent immediately if connected, and on every later reconnect.
    pub fn announce(&self, identity: Identity, role: Role) {
        let _ = self.commands.send(Command::Announce(identity, role));
    }

    pub fn state(&self) -> PresenceState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn watch_state(&self) -> watch::Receiver<PresenceState> {
        self.state.clone()
    }

    /// Stop the agent (logout / teardown) and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PresenceAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a connected session ended
enum SessionEnd {
    Lost,
    Stopped,
}

struct Worker<C> {
    connector: C,
    config: PresenceConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<PresenceState>,
    events: mpsc::Sender<ServerMessage>,
    cancel: CancellationToken,
    announcement: Option<(Identity, Role)>,
}

impl<C: Connector> Worker<C> {
    async fn run(mut self) {
        loop {
            self.state.send_replace(PresenceState::Connecting);

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match attempt {
                Ok(transport) => {
                    self.state.send_replace(PresenceState::Connected);
                    info!("Presence connected");

                    if let SessionEnd::Stopped = self.connected(transport).await {
                        break;
                    }
                    info!("Presence connection lost");
                }
                Err(e) => warn!("Presence connect failed: {}", e),
            }

            self.state.send_replace(PresenceState::Disconnected);
            if !self.wait_for_reconnect().await {
                break;
            }
        }

        self.state.send_replace(PresenceState::Disconnected);
        debug!("Presence agent stopped");
    }

    /// Sleep out the backoff, still accepting announcements
    ///
    /// Returns `false` if the agent was stopped meanwhile.
    async fn wait_for_reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = &mut delay => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Announce(identity, role)) => {
                        self.announcement = Some((identity, role));
                    }
                    None => return false,
                },
            }
        }
    }

    async fn connected(&mut self, transport: Transport) -> SessionEnd {
        let Transport {
            outbound,
            mut inbound,
        } = transport;

        if let Some((identity, role)) = &self.announcement {
            if send_register(&outbound, identity, *role).await.is_err() {
                return SessionEnd::Lost;
            }
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Stopped,
                command = self.commands.recv() => match command {
                    Some(Command::Announce(identity, role)) => {
                        let sent = send_register(&outbound, &identity, role).await;
                        self.announcement = Some((identity, role));
                        if sent.is_err() {
                            return SessionEnd::Lost;
                        }
                    }
                    None => return SessionEnd::Stopped,
                },
                frame = inbound.recv() => match frame {
                    Some(text) => self.deliver(&text),
                    None => return SessionEnd::Lost,
                },
            }
        }
    }

    fn deliver(&self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => {
                debug!("Presence received {}", message.kind());
                if let Err(e) = self.events.try_send(message) {
                    warn!("Dropping server message: {}", e);
                }
            }
            Err(e) => warn!("Dropping unparseable server frame: {}", e),
        }
    }
}

async fn send_register(
    outbound: &mpsc::Sender<String>,
    identity: &Identity,
    role: Role,
) -> Result<(), PresenceError> {
    let frame = ClientMessage::Register {
        user_id: identity.clone(),
        role,
    };
    let text = serde_json::to_string(&frame).map_err(|_| PresenceError::Closed)?;
    outbound.send(text).await.map_err(|_| PresenceError::Closed)?;
    debug!(%identity, %role, "Presence announced");
    Ok(())
}
