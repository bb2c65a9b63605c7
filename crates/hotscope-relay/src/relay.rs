//! Session pairing and bidirectional forwarding.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use hotscope_protocols::{
    Message, RelayError, SessionKey, BACKEND_ENDPOINT_NAME,
};

const ENDPOINT_QUEUE: usize = 64;

/// Which half of a session an endpoint occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSide {
    Inspector,
    Backend,
}

impl EndpointSide {
    fn label(&self) -> &'static str {
        match self {
            EndpointSide::Inspector => "inspector",
            EndpointSide::Backend => "backend",
        }
    }
}

/// Process-level context of a backend connection, from which the relay
/// derives the session key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderContext {
    pub session: Option<SessionKey>,
}

impl SenderContext {
    pub fn for_session(key: SessionKey) -> Self {
        Self { session: Some(key) }
    }
}

/// Triggers injection of the bridge script into a session's page context.
///
/// Injection failures are logged and skip that session; they never
/// propagate into the connect flow.
#[async_trait]
pub trait BridgeInjector: Send + Sync {
    async fn inject(&self, session: SessionKey) -> Result<(), RelayError>;
}

/// Default injector for deployments that wire the bridge themselves.
pub struct NoopInjector;

#[async_trait]
impl BridgeInjector for NoopInjector {
    async fn inject(&self, session: SessionKey) -> Result<(), RelayError> {
        debug!(%session, "bridge injection elided");
        Ok(())
    }
}

/// One endpoint's connection to the relay. Dropping the handle
/// disconnects the endpoint and tears the whole session down.
pub struct EndpointHandle {
    session: SessionKey,
    side: EndpointSide,
    to_relay: mpsc::Sender<Message>,
    from_relay: mpsc::Receiver<Message>,
}

impl EndpointHandle {
    pub fn session(&self) -> SessionKey {
        self.session
    }

    pub fn side(&self) -> EndpointSide {
        self.side
    }

    /// Send a message toward the paired endpoint.
    pub async fn send(&self, message: Message) -> Result<(), RelayError> {
        self.to_relay
            .send(message)
            .await
            .map_err(|e| RelayError::SendFailed(e.to_string()))
    }

    /// Receive the next message from the paired endpoint. `None` means
    /// the session was torn down.
    pub async fn recv(&mut self) -> Option<Message> {
        self.from_relay.recv().await
    }
}

struct EndpointPorts {
    to_endpoint: mpsc::Sender<Message>,
    from_endpoint: Option<mpsc::Receiver<Message>>,
}

#[derive(Default)]
struct Session {
    inspector: Option<EndpointPorts>,
    backend: Option<EndpointPorts>,
    forwarders: Vec<tokio::task::JoinHandle<()>>,
}

/// The process-wide router pairing inspector and backend endpoints per
/// session key.
pub struct Relay {
    sessions: DashMap<SessionKey, Session>,
    injector: Arc<dyn BridgeInjector>,
    active_session: Mutex<Option<SessionKey>>,
}

impl Relay {
    pub fn new(injector: Arc<dyn BridgeInjector>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            injector,
            active_session: Mutex::new(None),
        })
    }

    /// Record the foreground session used to substitute sentinel keys.
    pub fn set_active_session(&self, key: SessionKey) {
        *self.active_session.lock() = Some(key);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, key: SessionKey) -> bool {
        self.sessions.contains_key(&key)
    }

    /// Connect the inspector-side endpoint. The session key is embedded
    /// in the connection name; a sentinel key is replaced with the
    /// active foreground session. Triggers bridge injection for the
    /// session.
    pub fn connect_inspector(
        self: &Arc<Self>,
        name: &str,
    ) -> Result<EndpointHandle, RelayError> {
        let parsed = SessionKey::from_inspector_name(name)
            .ok_or_else(|| RelayError::UnknownEndpointName(name.to_string()))?;
        let key = if parsed.is_sentinel() {
            let Some(active) = *self.active_session.lock() else {
                warn!(name, "sentinel session key with no active session");
                return Err(RelayError::NoActiveSession);
            };
            debug!(%active, "substituted sentinel session key");
            active
        } else {
            parsed
        };

        let handle = self.register(key, EndpointSide::Inspector)?;

        // Injection completes in the background; a failure skips this
        // session without affecting others.
        let injector = self.injector.clone();
        tokio::spawn(async move {
            if let Err(e) = injector.inject(key).await {
                warn!(%key, error = %e, "bridge injection failed");
            }
        });

        Ok(handle)
    }

    /// Connect the backend-side endpoint under the fixed backend name.
    /// The key comes from the sender context; without one the
    /// connection is rejected.
    pub fn connect_backend(
        self: &Arc<Self>,
        context: SenderContext,
    ) -> Result<EndpointHandle, RelayError> {
        let Some(key) = context.session else {
            warn!(
                name = BACKEND_ENDPOINT_NAME,
                "backend connection without a session key"
            );
            return Err(RelayError::MissingSessionKey);
        };
        self.register(key, EndpointSide::Backend)
    }

    fn register(
        self: &Arc<Self>,
        key: SessionKey,
        side: EndpointSide,
    ) -> Result<EndpointHandle, RelayError> {
        let (to_relay, from_endpoint) = mpsc::channel(ENDPOINT_QUEUE);
        let (to_endpoint, from_relay) = mpsc::channel(ENDPOINT_QUEUE);

        {
            let mut session = self.sessions.entry(key).or_default();
            let slot = match side {
                EndpointSide::Inspector => &mut session.inspector,
                EndpointSide::Backend => &mut session.backend,
            };
            // A live occupant rejects the connection; a stale one (its
            // handle dropped before pairing) is displaced.
            if let Some(ports) = slot {
                if !ports.to_endpoint.is_closed() {
                    warn!(%key, side = side.label(), "endpoint slot already occupied");
                    return Err(RelayError::EndpointOccupied(key.0, side.label()));
                }
                debug!(%key, side = side.label(), "displacing stale endpoint");
            }
            *slot = Some(EndpointPorts {
                to_endpoint,
                from_endpoint: Some(from_endpoint),
            });
            info!(%key, side = side.label(), "endpoint connected");

            if session.inspector.is_some() && session.backend.is_some() {
                let inspector = session
                    .inspector
                    .as_mut()
                    .and_then(|ports| ports.from_endpoint.take());
                let backend = session
                    .backend
                    .as_mut()
                    .and_then(|ports| ports.from_endpoint.take());
                let inspector_tx = session
                    .inspector
                    .as_ref()
                    .map(|ports| ports.to_endpoint.clone());
                let backend_tx = session
                    .backend
                    .as_ref()
                    .map(|ports| ports.to_endpoint.clone());
                if let (Some(ins_rx), Some(back_rx), Some(ins_tx), Some(back_tx)) =
                    (inspector, backend, inspector_tx, backend_tx)
                {
                    info!(%key, "session paired, forwarding active");
                    let relay = Arc::downgrade(self);
                    session.forwarders.push(tokio::spawn(forward(
                        relay.clone(),
                        key,
                        EndpointSide::Inspector,
                        ins_rx,
                        back_tx,
                    )));
                    session.forwarders.push(tokio::spawn(forward(
                        relay,
                        key,
                        EndpointSide::Backend,
                        back_rx,
                        ins_tx,
                    )));
                }
            }
        }

        Ok(EndpointHandle {
            session: key,
            side,
            to_relay,
            from_relay,
        })
    }

    /// Disconnect both endpoints of a session and free the key.
    pub fn teardown(&self, key: SessionKey) {
        if let Some((_, session)) = self.sessions.remove(&key) {
            for task in &session.forwarders {
                task.abort();
            }
            info!(%key, "session torn down");
        }
    }
}

/// Pump one direction of a paired session. Ends when the source
/// endpoint disconnects or the peer's queue closes, then tears down the
/// whole session.
async fn forward(
    relay: Weak<Relay>,
    key: SessionKey,
    from: EndpointSide,
    mut rx: mpsc::Receiver<Message>,
    peer_tx: mpsc::Sender<Message>,
) {
    while let Some(message) = rx.recv().await {
        if message.is_diagnostic() {
            // Reserved log messages are sunk here for diagnostics.
            if let Message::Log { payload } = &message {
                debug!(%key, from = from.label(), %payload, "relay log");
            }
            continue;
        }
        if peer_tx.send(message).await.is_err() {
            break;
        }
    }
    debug!(%key, from = from.label(), "endpoint disconnected");
    if let Some(relay) = relay.upgrade() {
        relay.teardown(key);
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
