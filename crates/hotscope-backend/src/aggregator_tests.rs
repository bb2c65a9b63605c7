use super::*;

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::timeout;

use hotscope_protocols::records::ElementPath;

use crate::effects::NoopEffects;
use crate::runtime::{DataAttributeRuntime, NullRuntime};

/// Effects collaborator that records every delegated call.
#[derive(Default)]
struct RecordingEffects {
    calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl DomEffects for RecordingEffects {
    async fn highlight(&self, nodes: Vec<NodeId>) {
        self.calls.lock().push(format!("highlight:{}", nodes.len()));
    }

    async fn hide_highlighting(&self) {
        self.calls.lock().push("hide-highlighting".to_string());
    }

    async fn scroll_and_highlight(&self, _node: NodeId) {
        self.calls.lock().push("scroll-and-highlight".to_string());
    }

    async fn show_frame_connections(&self, _frame: NodeId, triggers: Vec<NodeId>) {
        self.calls
            .lock()
            .push(format!("show-connections:{}", triggers.len()));
    }

    async fn hide_frame_connections(&self) {
        self.calls.lock().push("hide-connections".to_string());
    }
}

fn page_with_frame() -> (PageHandle, NodeId, NodeId) {
    let (mut doc, _head, body) = Document::with_skeleton("http://localhost/");
    let frame = doc.create_element("turbo-frame");
    doc.append_child(body, frame).unwrap();
    doc.set_attribute(frame, "id", "x").unwrap();
    (PageHandle::new(doc), body, frame)
}

fn aggregator(page: &PageHandle) -> Aggregator {
    Aggregator::new(
        page.clone(),
        BackendConfig::default(),
        Arc::new(NullRuntime),
        Arc::new(NoopEffects),
    )
}

async fn next_backend(rx: &mut broadcast::Receiver<PageMessage>) -> Message {
    loop {
        let envelope = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a backend message")
            .expect("page bus closed");
        if envelope.source == PageSource::Backend {
            return envelope.message;
        }
    }
}

/// Activation emits one report of every type.
async fn drain_activation(rx: &mut broadcast::Receiver<PageMessage>) -> Vec<Message> {
    let mut reports = Vec::new();
    for _ in 0..7 {
        reports.push(next_backend(rx).await);
    }
    reports
}

#[tokio::test]
async fn init_transitions_to_active_and_emits_every_report() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);
    assert_eq!(agg.state(), AggregatorState::Idle);

    agg.handle_message(Message::Init).await;
    assert_eq!(agg.state(), AggregatorState::Active);

    let reports = drain_activation(&mut rx).await;
    assert!(matches!(
        &reports[0],
        Message::SetTurboFrames { frames, .. } if frames.len() == 1 && frames[0].id == "x"
    ));
    assert!(matches!(&reports[1], Message::SetTurboCables { .. }));
    assert!(matches!(&reports[2], Message::SetStimulusData { .. }));
    assert!(matches!(
        &reports[3],
        Message::SetRegisteredStimulusIdentifiers { .. }
    ));
    assert!(matches!(
        &reports[4],
        Message::SetTurboPermanentElements { .. }
    ));
    assert!(matches!(
        &reports[5],
        Message::SetTurboTemporaryElements { .. }
    ));
    assert!(matches!(&reports[6], Message::SetTurboConfig { .. }));
}

#[tokio::test]
async fn url_field_is_base64_encoded() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);
    agg.handle_message(Message::Init).await;

    match next_backend(&mut rx).await {
        Message::SetTurboFrames { url, .. } => {
            assert_eq!(url, encode_url("http://localhost/"));
        }
        other => panic!("expected frames report, got {other:?}"),
    }
}

#[tokio::test]
async fn health_check_is_answered_in_both_states_with_the_same_shape() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);

    agg.handle_message(Message::HealthCheck).await;
    let idle_reply = next_backend(&mut rx).await;
    assert_eq!(idle_reply, Message::HealthCheckResponse);

    agg.handle_message(Message::Init).await;
    drain_activation(&mut rx).await;

    agg.handle_message(Message::HealthCheck).await;
    let active_reply = next_backend(&mut rx).await;
    assert_eq!(idle_reply, active_reply);
}

#[tokio::test]
async fn shutdown_returns_to_idle_and_stops_reporting() {
    let (page, body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);
    agg.handle_message(Message::Init).await;
    drain_activation(&mut rx).await;

    agg.handle_message(Message::Shutdown).await;
    assert_eq!(agg.state(), AggregatorState::Idle);

    // Mutations while idle produce nothing, and no watcher leaks remain.
    page.mutate(|doc| {
        let frame = doc.create_element("turbo-frame");
        doc.append_child(body, frame).unwrap();
    });
    agg.process_document();
    agg.flush_entity_reports();
    assert!(
        timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
        "idle aggregator must not report"
    );

    // A second shutdown is a no-op.
    agg.handle_message(Message::Shutdown).await;
    assert_eq!(agg.state(), AggregatorState::Idle);
}

#[tokio::test]
async fn reinit_after_shutdown_starts_from_a_clean_scan() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);

    agg.handle_message(Message::Init).await;
    drain_activation(&mut rx).await;
    agg.handle_message(Message::Shutdown).await;
    agg.handle_message(Message::Init).await;

    let reports = drain_activation(&mut rx).await;
    assert!(matches!(
        &reports[0],
        Message::SetTurboFrames { frames, .. } if frames.len() == 1
    ));
}

#[tokio::test(start_paused = true)]
async fn rapid_mutations_coalesce_into_one_report_with_final_state() {
    let (page, body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let agg = aggregator(&page);
    let _task = agg.spawn();

    page.broadcast_from_bridge(Message::Init);
    drain_activation(&mut rx).await;

    // Five mutation batches inside one debounce window.
    for index in 0..5 {
        page.mutate(|doc| {
            let frame = doc.create_element("turbo-frame");
            doc.append_child(body, frame).unwrap();
            doc.set_attribute(frame, "id", format!("frame-{index}")).unwrap();
        });
    }

    match next_backend(&mut rx).await {
        Message::SetTurboFrames { frames, .. } => {
            // One original frame plus all five new roots, final state.
            assert_eq!(frames.len(), 6);
            assert_eq!(frames[5].id, "frame-4");
        }
        other => panic!("expected frames report, got {other:?}"),
    }
    assert!(
        timeout(Duration::from_millis(500), rx.recv()).await.is_err(),
        "exactly one report per debounce window"
    );
}

#[tokio::test(start_paused = true)]
async fn nested_frame_insertion_reports_parent_child_tree() {
    let (page, _body, frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let _task = aggregator(&page).spawn();

    page.broadcast_from_bridge(Message::Init);
    drain_activation(&mut rx).await;

    page.mutate(|doc| {
        let nested = doc.create_element("turbo-frame");
        doc.append_child(frame, nested).unwrap();
        doc.set_attribute(nested, "id", "y").unwrap();
    });

    match next_backend(&mut rx).await {
        Message::SetTurboFrames { frames, .. } => {
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].id, "x");
            assert_eq!(frames[0].children.len(), 1);
            assert_eq!(frames[0].children[0].id, "y");
        }
        other => panic!("expected frames report, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stream_render_snapshots_after_the_configured_delay() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let _task = aggregator(&page).spawn();

    page.broadcast_from_bridge(Message::Init);
    drain_activation(&mut rx).await;

    let stream = page.with_document_mut(|doc| {
        let stream = doc.create_element("turbo-stream");
        doc.set_attribute(stream, "action", "append").unwrap();
        doc.set_attribute(stream, "target", "flash").unwrap();
        doc.set_text(stream, "<div>hi</div>").unwrap();
        stream
    });
    page.emit_event(PageEvent::BeforeStreamRender { element: stream });

    match next_backend(&mut rx).await {
        Message::TurboStreamReceived { turbo_stream } => {
            assert_eq!(turbo_stream.action, "append");
            assert_eq!(turbo_stream.target.as_deref(), Some("flash"));
            assert_eq!(turbo_stream.target_selector.as_deref(), Some("#flash"));
            assert_eq!(turbo_stream.turbo_stream_content, "<div>hi</div>");
        }
        other => panic!("expected stream envelope, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn delayed_snapshot_landing_after_shutdown_is_dropped() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let _task = aggregator(&page).spawn();

    page.broadcast_from_bridge(Message::Init);
    drain_activation(&mut rx).await;

    let stream = page.with_document_mut(|doc| doc.create_element("turbo-stream"));
    page.emit_event(PageEvent::BeforeStreamRender { element: stream });
    page.broadcast_from_bridge(Message::Shutdown);

    assert!(
        timeout(Duration::from_millis(500), async {
            loop {
                if let Ok(envelope) = rx.recv().await {
                    if matches!(envelope.message, Message::TurboStreamReceived { .. }) {
                        return;
                    }
                }
            }
        })
        .await
        .is_err(),
        "snapshot scheduled before shutdown must not be delivered"
    );
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_are_forwarded_with_sanitized_details() {
    let (page, _body, frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let _task = aggregator(&page).spawn();

    page.broadcast_from_bridge(Message::Init);
    drain_activation(&mut rx).await;

    page.emit_event(PageEvent::Lifecycle {
        name: "turbo:load".to_string(),
        target: Some(frame),
        detail: serde_json::json!({"timing": {"visitStart": 3}}),
    });

    match next_backend(&mut rx).await {
        Message::TurboEventReceived { turbo_event } => {
            assert_eq!(turbo_event.event_name, "turbo:load");
            assert_eq!(turbo_event.details["timing"]["visitStart"], 3);
            let path = turbo_event.target_element_path.expect("target path");
            assert_eq!(page.with_document(|doc| doc.resolve_path(&path.0)), Some(frame));
        }
        other => panic!("expected event envelope, got {other:?}"),
    }

    // Navigation events schedule a config re-read on the longer window.
    match next_backend(&mut rx).await {
        Message::SetTurboConfig { .. } => {}
        other => panic!("expected config report, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn meta_tag_changes_refresh_the_config_report() {
    let (mut doc, head, _body) = Document::with_skeleton("http://localhost/");
    let meta = doc.create_element("meta");
    doc.append_child(head, meta).unwrap();
    doc.set_attribute(meta, "name", "turbo-prefetch").unwrap();
    doc.set_attribute(meta, "content", "true").unwrap();
    let page = PageHandle::new(doc);
    let mut rx = page.bus_subscribe();
    let _task = aggregator(&page).spawn();

    page.broadcast_from_bridge(Message::Init);
    let reports = drain_activation(&mut rx).await;
    assert!(matches!(
        &reports[6],
        Message::SetTurboConfig { turbo_config, .. } if turbo_config.prefetch.as_deref() == Some("true")
    ));

    page.mutate(|doc| doc.set_attribute(meta, "content", "false").unwrap());

    match next_backend(&mut rx).await {
        Message::SetTurboConfig { turbo_config, .. } => {
            assert_eq!(turbo_config.prefetch.as_deref(), Some("false"));
        }
        other => panic!("expected config report, got {other:?}"),
    }
}

#[tokio::test]
async fn refresh_all_state_re_emits_every_report_once() {
    let (page, _body, _frame) = page_with_frame();
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);
    agg.handle_message(Message::Init).await;
    drain_activation(&mut rx).await;

    agg.handle_message(Message::RefreshAllState).await;
    let reports = drain_activation(&mut rx).await;
    assert!(matches!(&reports[0], Message::SetTurboFrames { .. }));
    assert!(matches!(&reports[6], Message::SetTurboConfig { .. }));
}

#[tokio::test]
async fn refresh_turbo_frame_re_emits_the_frame_report() {
    let (page, _body, frame) = page_with_frame();
    page.with_document_mut(|doc| doc.set_attribute(frame, "src", "/inbox").unwrap());
    let mut rx = page.bus_subscribe();
    let mut agg = aggregator(&page);
    agg.handle_message(Message::Init).await;
    drain_activation(&mut rx).await;

    agg.handle_message(Message::RefreshTurboFrame {
        id: "x".to_string(),
    })
    .await;
    match next_backend(&mut rx).await {
        Message::SetTurboFrames { frames, .. } => {
            assert_eq!(frames[0].src.as_deref(), Some("/inbox"));
        }
        other => panic!("expected frames report, got {other:?}"),
    }

    // An unknown frame id is ignored.
    agg.handle_message(Message::RefreshTurboFrame {
        id: "missing".to_string(),
    })
    .await;
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}

#[tokio::test]
async fn highlight_requests_are_resolved_and_delegated() {
    let (page, body, _frame) = page_with_frame();
    page.with_document_mut(|doc| {
        let div = doc.create_element("div");
        doc.append_child(body, div).unwrap();
        doc.set_attribute(div, "id", "flash").unwrap();
    });
    let effects = Arc::new(RecordingEffects::default());
    let mut agg = Aggregator::new(
        page.clone(),
        BackendConfig::default(),
        Arc::new(NullRuntime),
        effects.clone(),
    );
    agg.handle_message(Message::Init).await;

    agg.handle_message(Message::HighlightElement {
        selector: Some("#flash".to_string()),
        element_path: None,
    })
    .await;
    agg.handle_message(Message::HideHighlighting).await;
    assert_eq!(
        effects.calls.lock().as_slice(),
        ["highlight:1", "hide-highlighting"]
    );
}

#[tokio::test]
async fn frame_connections_fall_back_to_reference_elements() {
    let (page, body, _frame) = page_with_frame();
    page.with_document_mut(|doc| {
        let link = doc.create_element("a");
        doc.append_child(body, link).unwrap();
        doc.set_attribute(link, "data-turbo-frame", "x").unwrap();
    });
    let effects = Arc::new(RecordingEffects::default());
    let mut agg = Aggregator::new(
        page.clone(),
        BackendConfig::default(),
        Arc::new(NullRuntime),
        effects.clone(),
    );
    agg.handle_message(Message::Init).await;

    agg.handle_message(Message::ShowTurboFrameConnections {
        frame_id: "x".to_string(),
        trigger_selector: None,
    })
    .await;
    agg.handle_message(Message::HideTurboFrameConnections).await;
    assert_eq!(
        effects.calls.lock().as_slice(),
        ["show-connections:1", "hide-connections"]
    );
}

#[tokio::test]
async fn update_data_attribute_resolves_a_path_and_writes() {
    let (page, _body, frame) = page_with_frame();
    let path = page
        .with_document(|doc| doc.element_path(frame))
        .expect("frame is attached");
    let mut agg = aggregator(&page);
    agg.handle_message(Message::Init).await;

    agg.handle_message(Message::UpdateDataAttribute {
        element_path: ElementPath::new(path),
        name: "data-turbo-action".to_string(),
        value: "advance".to_string(),
    })
    .await;

    let value = page.with_document(|doc| {
        doc.attribute(frame, "data-turbo-action").map(str::to_string)
    });
    assert_eq!(value.as_deref(), Some("advance"));
}

#[tokio::test]
async fn controller_scenario_reports_two_leaves_with_one_identity() {
    let (mut doc, _head, body) = Document::with_skeleton("http://localhost/");
    let div = doc.create_element("div");
    doc.append_child(body, div).unwrap();
    doc.set_attribute(div, "data-controller", "a b").unwrap();
    let page = PageHandle::new(doc);
    let mut rx = page.bus_subscribe();
    let mut agg = Aggregator::new(
        page.clone(),
        BackendConfig::default(),
        Arc::new(DataAttributeRuntime),
        Arc::new(NoopEffects),
    );
    agg.handle_message(Message::Init).await;

    let reports = drain_activation(&mut rx).await;
    match &reports[2] {
        Message::SetStimulusData { stimulus_data, .. } => {
            assert_eq!(stimulus_data.len(), 2);
            assert_eq!(stimulus_data[0].identifier, "a");
            assert_eq!(stimulus_data[1].identifier, "b");
            assert_eq!(stimulus_data[0].uid, stimulus_data[1].uid);
        }
        other => panic!("expected stimulus report, got {other:?}"),
    }
    match &reports[3] {
        Message::SetRegisteredStimulusIdentifiers { identifiers, .. } => {
            assert_eq!(identifiers, &vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected identifiers report, got {other:?}"),
    }
}
