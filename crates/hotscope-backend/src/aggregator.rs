//! The backend aggregator: composes the entity observers, owns the
//! page-level event subscriptions, and batches state changes into
//! outbound reports.
//!
//! Two states: **Idle** (nothing running) and **Active** (observers
//! started, lifecycle events consumed). The transition in either
//! direction is driven by the bridge handshake. Entity reports are
//! coalesced in a short debounce window; the config report uses its own
//! longer window; health checks are answered immediately in both states.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use hotscope_dom::{Document, Mutation, NodeId, WatcherId};
use hotscope_protocols::records::StreamEnvelope;
use hotscope_protocols::{encode_url, sanitize_payload, Message, PageMessage, PageSource};
use hotscope_protocols::records::{ElementPath, EventEnvelope};

use crate::config::BackendConfig;
use crate::effects::DomEffects;
use crate::observers::{
    CableObserver, ControllerObserver, FrameObserver, MarkerKind, MarkerObserver,
};
use crate::page::{PageEvent, PageHandle};
use crate::runtime::ControllerRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    Active,
}

/// Which entity reports are pending in the current debounce window.
#[derive(Debug, Default, Clone, Copy)]
struct DirtyKinds {
    frames: bool,
    cables: bool,
    controllers: bool,
    permanent: bool,
    temporary: bool,
}

impl DirtyKinds {
    fn any(&self) -> bool {
        self.frames || self.cables || self.controllers || self.permanent || self.temporary
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct Aggregator {
    config: BackendConfig,
    page: PageHandle,
    runtime: Arc<dyn ControllerRuntime>,
    effects: Arc<dyn DomEffects>,
    state: AggregatorState,
    frames: FrameObserver,
    controllers: ControllerObserver,
    cables: CableObserver,
    markers: MarkerObserver,
    config_watcher: Option<WatcherId>,
    dirty: DirtyKinds,
    report_due: Option<Instant>,
    config_due: Option<Instant>,
    delayed_tx: mpsc::Sender<NodeId>,
    delayed_rx: Option<mpsc::Receiver<NodeId>>,
    // Subscribed at construction so nothing sent before the task first
    // runs is lost.
    bus_rx: Option<tokio::sync::broadcast::Receiver<PageMessage>>,
    events_rx: Option<tokio::sync::broadcast::Receiver<PageEvent>>,
    ticks_rx: Option<tokio::sync::watch::Receiver<u64>>,
}

impl Aggregator {
    pub fn new(
        page: PageHandle,
        config: BackendConfig,
        runtime: Arc<dyn ControllerRuntime>,
        effects: Arc<dyn DomEffects>,
    ) -> Self {
        let (delayed_tx, delayed_rx) = mpsc::channel(64);
        let bus_rx = page.bus_subscribe();
        let events_rx = page.events_subscribe();
        let ticks_rx = page.ticks_subscribe();
        Self {
            config,
            page,
            runtime,
            effects,
            state: AggregatorState::Idle,
            frames: FrameObserver::new(),
            controllers: ControllerObserver::new(),
            cables: CableObserver::new(),
            markers: MarkerObserver::new(),
            config_watcher: None,
            dirty: DirtyKinds::default(),
            report_due: None,
            config_due: None,
            delayed_tx,
            delayed_rx: Some(delayed_rx),
            bus_rx: Some(bus_rx),
            events_rx: Some(events_rx),
            ticks_rx: Some(ticks_rx),
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Event loop. Runs until the hosting task is dropped with the page.
    pub async fn run(mut self) {
        let (Some(mut bus_rx), Some(mut events_rx), Some(mut ticks_rx), Some(mut delayed_rx)) = (
            self.bus_rx.take(),
            self.events_rx.take(),
            self.ticks_rx.take(),
            self.delayed_rx.take(),
        ) else {
            return;
        };

        loop {
            let report_due = self.report_due;
            let config_due = self.config_due;
            tokio::select! {
                biased;

                received = bus_rx.recv() => match received {
                    Ok(envelope) if envelope.source == PageSource::Bridge => {
                        self.handle_message(envelope.message).await;
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "page bus lagged; messages dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },

                changed = ticks_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if self.state == AggregatorState::Active {
                        self.process_document();
                    }
                },

                event = events_rx.recv() => {
                    if let Ok(event) = event {
                        self.handle_page_event(event);
                    }
                },

                Some(element) = delayed_rx.recv() => {
                    self.snapshot_stream(element);
                },

                _ = maybe_deadline(report_due), if report_due.is_some() => {
                    self.report_due = None;
                    self.flush_entity_reports();
                },

                _ = maybe_deadline(config_due), if config_due.is_some() => {
                    self.config_due = None;
                    self.emit_config_report();
                },
            }
        }
    }

    // === Inbound messages ===

    pub async fn handle_message(&mut self, message: Message) {
        // Health checks bypass the state machine entirely.
        if message == Message::HealthCheck {
            self.send(Message::HealthCheckResponse);
            return;
        }

        match message {
            Message::Init => self.activate(),
            Message::Shutdown => self.deactivate(),
            _ if self.state == AggregatorState::Idle => {
                debug!(?message, "request ignored while idle");
            }
            Message::RefreshAllState => self.emit_all_reports(),
            Message::RefreshTurboFrame { id } => self.refresh_frame(&id),
            Message::HighlightElement {
                selector,
                element_path,
            } => {
                let nodes = self.page.with_document(|doc| {
                    resolve_targets(doc, selector.as_deref(), element_path.as_ref())
                });
                self.effects.highlight(nodes).await;
            }
            Message::HideHighlighting => self.effects.hide_highlighting().await,
            Message::ScrollAndHighlight { element_path } => {
                let node = self
                    .page
                    .with_document(|doc| doc.resolve_path(&element_path.0));
                if let Some(node) = node {
                    self.effects.scroll_and_highlight(node).await;
                }
            }
            Message::UpdateDataAttribute {
                element_path,
                name,
                value,
            } => {
                let applied = self.page.with_document_mut(|doc| {
                    doc.resolve_path(&element_path.0)
                        .map(|node| doc.set_attribute(node, &name, &value))
                });
                match applied {
                    Some(Ok(())) => self.process_document(),
                    _ => debug!(%element_path, "attribute update target not found"),
                }
            }
            Message::ShowTurboFrameConnections {
                frame_id,
                trigger_selector,
            } => {
                let resolved = self.page.with_document(|doc| {
                    let frame = self.frames.find_by_frame_id(doc, &frame_id)?;
                    let triggers = match trigger_selector.as_deref() {
                        Some(selector) => resolve_targets(doc, Some(selector), None),
                        None => self.frames.reference_nodes(doc, &frame_id),
                    };
                    Some((frame, triggers))
                });
                if let Some((frame, triggers)) = resolved {
                    self.effects.show_frame_connections(frame, triggers).await;
                } else {
                    debug!(%frame_id, "frame connections requested for unknown frame");
                }
            }
            Message::HideTurboFrameConnections => self.effects.hide_frame_connections().await,
            other => debug!(?other, "unexpected message on the page bus"),
        }
    }

    // === Lifecycle transitions ===

    fn activate(&mut self) {
        if self.state == AggregatorState::Active {
            debug!("init received while already active");
            return;
        }
        {
            let mut doc = self.page.document().lock();
            self.config_watcher = Some(doc.observe());
            self.frames.start(&mut doc);
            self.controllers.start(&mut doc);
            self.cables.start(&mut doc);
            self.markers.start(&mut doc);
        }
        self.state = AggregatorState::Active;
        debug!("aggregator active");
        // The initial scans marked everything dirty; the activation
        // report below covers them.
        self.take_observer_dirt();
        self.dirty.clear();
        self.emit_all_reports();
    }

    fn deactivate(&mut self) {
        if self.state == AggregatorState::Idle {
            return;
        }
        {
            let mut doc = self.page.document().lock();
            self.frames.stop(&mut doc);
            self.controllers.stop(&mut doc);
            self.cables.stop(&mut doc);
            self.markers.stop(&mut doc);
            if let Some(watcher) = self.config_watcher.take() {
                doc.unobserve(watcher);
            }
        }
        self.state = AggregatorState::Idle;
        self.dirty.clear();
        self.report_due = None;
        self.config_due = None;
        debug!("aggregator idle");
    }

    // === Observation ===

    /// Process pending mutation batches: poll every observer, collect
    /// dirty kinds, and open debounce windows as needed.
    pub fn process_document(&mut self) {
        if self.state != AggregatorState::Active {
            return;
        }
        let config_touched = {
            let mut doc = self.page.document().lock();
            self.frames.poll(&mut doc);
            self.controllers.poll(&mut doc);
            self.cables.poll(&mut doc);
            self.markers.poll(&mut doc);
            match self.config_watcher {
                Some(watcher) => {
                    let records = doc.take_records(watcher);
                    touches_meta(&doc, &records)
                }
                None => false,
            }
        };
        self.take_observer_dirt();

        if self.dirty.any() {
            let deadline = Instant::now() + self.config.report_debounce();
            self.report_due.get_or_insert(deadline);
        }
        if config_touched {
            let deadline = Instant::now() + self.config.config_debounce();
            self.config_due.get_or_insert(deadline);
        }
    }

    fn take_observer_dirt(&mut self) {
        self.dirty.frames |= self.frames.take_dirty();
        self.dirty.controllers |= self.controllers.take_dirty();
        self.dirty.cables |= self.cables.take_dirty();
        self.dirty.permanent |= self.markers.take_dirty(MarkerKind::Permanent);
        self.dirty.temporary |= self.markers.take_dirty(MarkerKind::Temporary);
    }

    // === Page events ===

    fn handle_page_event(&mut self, event: PageEvent) {
        if self.state != AggregatorState::Active {
            return;
        }
        match event {
            PageEvent::BeforeStreamRender { element } => {
                // Snapshot after a short delay; see BackendConfig. The
                // delay is not cancellable: a shutdown in the window
                // delivers into an idle aggregator, which drops it.
                let tx = self.delayed_tx.clone();
                let delay = self.config.stream_snapshot_delay();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(element).await;
                });
            }
            PageEvent::Lifecycle {
                name,
                target,
                mut detail,
            } => {
                sanitize_payload(&mut detail);
                let target_element_path = self.page.with_document(|doc| {
                    target
                        .and_then(|node| doc.element_path(node))
                        .map(ElementPath::new)
                });
                self.send(Message::TurboEventReceived {
                    turbo_event: EventEnvelope::new(name, detail, target_element_path),
                });
                // Navigation-family events can change the meta tags.
                let deadline = Instant::now() + self.config.config_debounce();
                self.config_due.get_or_insert(deadline);
            }
        }
    }

    fn snapshot_stream(&mut self, element: NodeId) {
        if self.state != AggregatorState::Active {
            debug!("delayed stream snapshot dropped while idle");
            return;
        }
        let envelope = self.page.with_document(|doc| {
            if !doc.contains(element) {
                return None;
            }
            Some(StreamEnvelope::from_attributes(
                doc.attribute(element, "action"),
                doc.attribute(element, "target"),
                doc.attribute(element, "targets"),
                doc.text(element),
            ))
        });
        match envelope {
            Some(turbo_stream) => self.send(Message::TurboStreamReceived { turbo_stream }),
            None => debug!("stream element vanished before snapshot"),
        }
    }

    // === Reports ===

    fn flush_entity_reports(&mut self) {
        let dirty = self.dirty;
        self.dirty.clear();
        if dirty.frames {
            self.emit_frames_report();
        }
        if dirty.cables {
            self.emit_cables_report();
        }
        if dirty.controllers {
            self.emit_controllers_report();
        }
        if dirty.permanent {
            self.emit_marker_report(MarkerKind::Permanent);
        }
        if dirty.temporary {
            self.emit_marker_report(MarkerKind::Temporary);
        }
    }

    fn emit_all_reports(&mut self) {
        self.emit_frames_report();
        self.emit_cables_report();
        self.emit_controllers_report();
        self.emit_marker_report(MarkerKind::Permanent);
        self.emit_marker_report(MarkerKind::Temporary);
        self.emit_config_report();
    }

    fn emit_frames_report(&self) {
        let (frames, url) = self
            .page
            .with_document(|doc| (self.frames.report(doc), encode_url(doc.url())));
        self.send(Message::SetTurboFrames { frames, url });
    }

    fn emit_cables_report(&self) {
        let (turbo_cables, url) = self
            .page
            .with_document(|doc| (self.cables.report(doc), encode_url(doc.url())));
        self.send(Message::SetTurboCables { turbo_cables, url });
    }

    fn emit_controllers_report(&self) {
        let (stimulus_data, identifiers, url) = self.page.with_document(|doc| {
            (
                self.controllers.report(doc, self.runtime.as_ref()),
                self.runtime.registered_identifiers(doc),
                encode_url(doc.url()),
            )
        });
        self.send(Message::SetStimulusData {
            stimulus_data,
            url: url.clone(),
        });
        self.send(Message::SetRegisteredStimulusIdentifiers { identifiers, url });
    }

    fn emit_marker_report(&self, kind: MarkerKind) {
        let records = self.page.with_document(|doc| self.markers.report(doc, kind));
        let message = match kind {
            MarkerKind::Permanent => Message::SetTurboPermanentElements {
                turbo_permanent_elements: records,
            },
            MarkerKind::Temporary => Message::SetTurboTemporaryElements {
                turbo_temporary_elements: records,
            },
        };
        self.send(message);
    }

    fn emit_config_report(&self) {
        let (turbo_config, url) = self.page.with_document(|doc| {
            let turbo_config = hotscope_protocols::records::TurboConfig {
                drive: doc.meta_content("turbo-drive"),
                prefetch: doc.meta_content("turbo-prefetch"),
                refresh_method: doc.meta_content("turbo-refresh-method"),
                refresh_scroll: doc.meta_content("turbo-refresh-scroll"),
                cache_control: doc.meta_content("turbo-cache-control"),
            };
            (turbo_config, encode_url(doc.url()))
        });
        self.send(Message::SetTurboConfig { turbo_config, url });
    }

    fn refresh_frame(&mut self, id: &str) {
        {
            let mut doc = self.page.document().lock();
            match self.frames.find_by_frame_id(&doc, id) {
                Some(node) => {
                    // Re-assigning src is how a frame reload is triggered.
                    if let Some(src) = doc.attribute(node, "src").map(str::to_string) {
                        let _ = doc.set_attribute(node, "src", src);
                    }
                }
                None => {
                    debug!(id, "refresh requested for unknown frame");
                    return;
                }
            }
        }
        self.process_document();
        // The immediate report below covers the frame change; leave any
        // other dirty kinds for the open window.
        self.dirty.frames = false;
        self.emit_frames_report();
    }

    fn send(&self, message: Message) {
        self.page.broadcast(PageMessage::from_backend(message));
    }
}

/// Resolve a highlight target: an element path wins, then a `#id`
/// selector, then a bare tag name.
fn resolve_targets(
    doc: &Document,
    selector: Option<&str>,
    element_path: Option<&ElementPath>,
) -> Vec<NodeId> {
    if let Some(path) = element_path {
        return doc.resolve_path(&path.0).into_iter().collect();
    }
    let Some(selector) = selector else {
        return Vec::new();
    };
    if let Some(id) = selector.strip_prefix('#') {
        return doc.find_by_id(id).into_iter().collect();
    }
    doc.subtree(doc.root())
        .into_iter()
        .filter(|node| doc.tag(*node) == Some(selector))
        .collect()
}

fn touches_meta(doc: &Document, records: &[Mutation]) -> bool {
    records.iter().any(|record| match record {
        Mutation::Attribute { target, .. } => doc.tag(*target) == Some("meta"),
        Mutation::ChildList { added, removed, .. } => added
            .iter()
            .chain(removed.iter())
            .any(|node| doc.tag(*node) == Some("meta")),
    })
}

async fn maybe_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
