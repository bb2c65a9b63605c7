use super::*;

#[test]
fn element_path_display() {
    let path = ElementPath::new(vec![0, 2, 1]);
    assert_eq!(path.to_string(), "0/2/1");
    assert!(!path.is_root());
    assert!(ElementPath::default().is_root());
}

#[test]
fn frame_record_serializes_camel_case() {
    let record = FrameRecord {
        uid: "hs-1".to_string(),
        id: "messages".to_string(),
        reference_elements: vec![ElementPath::new(vec![1, 0])],
        ..Default::default()
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["uid"], "hs-1");
    assert_eq!(json["referenceElements"][0], serde_json::json!([1, 0]));
    assert!(json.get("src").is_none());
}

#[test]
fn frame_record_round_trips_tree() {
    let record = FrameRecord {
        uid: "hs-1".to_string(),
        id: "x".to_string(),
        children: vec![FrameRecord {
            uid: "hs-2".to_string(),
            id: "y".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let json = serde_json::to_string(&record).unwrap();
    let back: FrameRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.children.len(), 1);
    assert_eq!(back.children[0].id, "y");
}

#[test]
fn stream_envelope_prefers_targets_attribute() {
    let envelope =
        StreamEnvelope::from_attributes(Some("append"), Some("flash"), Some(".item"), "");
    assert_eq!(envelope.target_selector.as_deref(), Some(".item"));
}

#[test]
fn stream_envelope_derives_id_selector_from_target() {
    let envelope = StreamEnvelope::from_attributes(Some("replace"), Some("flash"), None, "<div/>");
    assert_eq!(envelope.target_selector.as_deref(), Some("#flash"));
    assert_eq!(envelope.action, "replace");
    assert_eq!(envelope.turbo_stream_content, "<div/>");
}

#[test]
fn stream_envelope_without_target_has_no_selector() {
    let envelope = StreamEnvelope::from_attributes(None, None, None, "");
    assert!(envelope.target_selector.is_none());
    assert!(envelope.action.is_empty());
}

#[test]
fn stream_envelopes_get_unique_uuids() {
    let a = StreamEnvelope::from_attributes(None, None, None, "");
    let b = StreamEnvelope::from_attributes(None, None, None, "");
    assert_ne!(a.uuid, b.uuid);
}

#[test]
fn event_envelope_serializes_camel_case() {
    let envelope = EventEnvelope::new(
        "turbo:load",
        serde_json::json!({"timing": {}}),
        Some(ElementPath::new(vec![0])),
    );
    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["eventName"], "turbo:load");
    assert_eq!(json["targetElementPath"], serde_json::json!([0]));
}

#[test]
fn controller_record_defaults_to_empty_associations() {
    let json = r#"{"uid":"hs-3","identifier":"list","elementPath":[0,1]}"#;
    let record: ControllerRecord = serde_json::from_str(json).unwrap();
    assert!(record.targets.is_empty());
    assert!(record.values.is_empty());
    assert!(record.outlets.is_empty());
    assert!(record.classes.is_empty());
    assert!(record.children.is_empty());
}
