//! The inspected page: shared document plus its signalling channels.
//!
//! A [`PageHandle`] bundles everything a page-resident component is
//! constructed with: the document behind a lock, the in-page broadcast
//! bus, the lifecycle event bus, and a tick counter bumped after every
//! mutation batch. Components receive the handle at initialization
//! instead of discovering state through ambient globals.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use hotscope_dom::{Document, NodeId};
use hotscope_protocols::{Message, PageMessage};

const BUS_CAPACITY: usize = 256;

/// A lifecycle signal from the inspected page.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// A stream element finished rendering and is ready to snapshot.
    BeforeStreamRender { element: NodeId },
    /// Any other framework lifecycle event (`turbo:load`,
    /// `turbo:visit`, ...).
    Lifecycle {
        name: String,
        target: Option<NodeId>,
        detail: serde_json::Value,
    },
}

/// Shared handle on the inspected page.
#[derive(Clone)]
pub struct PageHandle {
    document: Arc<Mutex<Document>>,
    bus: broadcast::Sender<PageMessage>,
    events: broadcast::Sender<PageEvent>,
    ticks: watch::Sender<u64>,
}

impl PageHandle {
    pub fn new(document: Document) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let (events, _) = broadcast::channel(BUS_CAPACITY);
        let (ticks, _) = watch::channel(0);
        Self {
            document: Arc::new(Mutex::new(document)),
            bus,
            events,
            ticks,
        }
    }

    /// Run a closure against the document without signalling a change.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.document.lock())
    }

    /// Mutate the document without bumping the tick counter. For
    /// components that poll their observers themselves right after.
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.document.lock())
    }

    /// Mutate the document, then bump the tick counter so observers get
    /// scheduled. One call is one mutation batch.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(&mut self.document.lock());
        self.ticks.send_modify(|tick| *tick += 1);
        trace!("document mutated");
        result
    }

    /// Direct access for components that manage their own batching.
    pub(crate) fn document(&self) -> &Arc<Mutex<Document>> {
        &self.document
    }

    // === In-page broadcast bus ===

    pub fn bus_sender(&self) -> broadcast::Sender<PageMessage> {
        self.bus.clone()
    }

    pub fn bus_subscribe(&self) -> broadcast::Receiver<PageMessage> {
        self.bus.subscribe()
    }

    /// Broadcast a message. Delivery failures mean no listener is
    /// present, which is not an error on a broadcast bus.
    pub fn broadcast(&self, message: PageMessage) {
        let _ = self.bus.send(message);
    }

    /// Convenience for page-side tests and drivers: inject a message as
    /// the bridge would.
    pub fn broadcast_from_bridge(&self, message: Message) {
        self.broadcast(PageMessage::from_bridge(message));
    }

    // === Lifecycle events ===

    pub fn events_subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    pub fn emit_event(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    // === Mutation ticks ===

    pub fn ticks_subscribe(&self) -> watch::Receiver<u64> {
        self.ticks.subscribe()
    }
}
