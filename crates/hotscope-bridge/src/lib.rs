//! # HotScope Bridge
//!
//! The minimal proxy injected into the inspected page's privileged
//! context. It opens one backend endpoint on the relay, announces itself
//! to the page with an `INIT` broadcast, then forwards traffic both ways:
//! backend-tagged page-bus messages go to the relay verbatim, relay
//! messages come back onto the bus tagged with the bridge marker.
//!
//! The bridge is a three-state machine: **Connecting → Active →
//! Disconnected**, with Disconnected terminal. Losing the relay channel
//! broadcasts `SHUTDOWN` into the page and ends the instance; a fresh
//! spawn is required to reconnect. Spawning a second bridge while one is
//! active fails at the relay (the backend slot is occupied), so
//! re-injection is a no-op by construction rather than by a global flag.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use hotscope_protocols::{BridgeError, Message, PageMessage, PageSource, SessionKey};
use hotscope_relay::{EndpointHandle, Relay, SenderContext};

/// Bridge lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    Active,
    /// Terminal for this instance.
    Disconnected,
}

/// A running bridge instance.
pub struct BridgeHandle {
    session: SessionKey,
    state_rx: watch::Receiver<BridgeState>,
    task: tokio::task::JoinHandle<()>,
}

impl BridgeHandle {
    pub fn session(&self) -> SessionKey {
        self.session
    }

    pub fn state(&self) -> BridgeState {
        *self.state_rx.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == BridgeState::Active
    }

    /// Wait for the instance to reach its terminal state.
    pub async fn wait_disconnected(&mut self) {
        while self.state() != BridgeState::Disconnected {
            if self.state_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The bridge constructor. Both channel handles are injected; the bridge
/// discovers nothing through ambient state.
pub struct Bridge;

impl Bridge {
    /// Connect to the relay under the fixed backend name and start
    /// proxying. The `INIT` handshake is broadcast before this returns,
    /// addressed by the bridge source marker so only same-page listeners
    /// consume it.
    pub fn spawn(
        relay: &Arc<Relay>,
        context: SenderContext,
        bus: broadcast::Sender<PageMessage>,
    ) -> Result<BridgeHandle, BridgeError> {
        let (state_tx, state_rx) = watch::channel(BridgeState::Connecting);

        let endpoint = relay
            .connect_backend(context)
            .map_err(|e| BridgeError::ConnectFailed(e.to_string()))?;
        let session = endpoint.session();

        // Subscribe before announcing so nothing slips between the
        // handshake and the proxy loop.
        let bus_rx = bus.subscribe();
        if bus.send(PageMessage::from_bridge(Message::Init)).is_err() {
            debug!(%session, "init broadcast had no listeners");
        }
        state_tx.send_replace(BridgeState::Active);
        info!(%session, "bridge active");

        let task = tokio::spawn(run(endpoint, bus, bus_rx, state_tx));
        Ok(BridgeHandle {
            session,
            state_rx,
            task,
        })
    }
}

async fn run(
    mut endpoint: EndpointHandle,
    bus: broadcast::Sender<PageMessage>,
    mut bus_rx: broadcast::Receiver<PageMessage>,
    state_tx: watch::Sender<BridgeState>,
) {
    let session = endpoint.session();
    loop {
        tokio::select! {
            from_page = bus_rx.recv() => match from_page {
                Ok(envelope) if envelope.source == PageSource::Backend => {
                    if endpoint.send(envelope.message).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(%session, missed, "page bus lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            from_relay = endpoint.recv() => match from_relay {
                Some(message) => {
                    let _ = bus.send(PageMessage::from_bridge(message));
                }
                None => break,
            },
        }
    }

    // Relay channel (or page) gone: tell the page and end this instance.
    let _ = bus.send(PageMessage::from_bridge(Message::Shutdown));
    state_tx.send_replace(BridgeState::Disconnected);
    info!(%session, "bridge disconnected");
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
