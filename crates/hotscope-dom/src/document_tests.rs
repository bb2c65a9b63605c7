use super::*;

fn doc_with_body() -> (Document, NodeId) {
    let (doc, _head, body) = Document::with_skeleton("http://localhost/");
    (doc, body)
}

#[test]
fn skeleton_has_head_and_body_in_order() {
    let (doc, head, body) = Document::with_skeleton("http://localhost/");
    assert_eq!(doc.children(doc.root()), &[head, body]);
    assert_eq!(doc.tag(head), Some("head"));
    assert_eq!(doc.tag(body), Some("body"));
}

#[test]
fn append_and_remove_record_child_list_mutations() {
    let (mut doc, body) = doc_with_body();
    let watcher = doc.observe();

    let div = doc.create_element("div");
    doc.append_child(body, div).unwrap();
    doc.remove_child(body, div).unwrap();

    let records = doc.take_records(watcher);
    assert_eq!(
        records,
        vec![
            Mutation::ChildList {
                target: body,
                added: vec![div],
                removed: vec![]
            },
            Mutation::ChildList {
                target: body,
                added: vec![],
                removed: vec![div]
            },
        ]
    );
    // Drained queues stay empty until the next mutation.
    assert!(doc.take_records(watcher).is_empty());
}

#[test]
fn removed_subtree_stays_traversable_until_gc() {
    let (mut doc, body) = doc_with_body();
    let outer = doc.create_element("div");
    let inner = doc.create_element("span");
    doc.append_child(body, outer).unwrap();
    doc.append_child(outer, inner).unwrap();

    doc.remove_child(body, outer).unwrap();
    assert!(!doc.is_attached(outer));
    assert_eq!(doc.subtree(outer), vec![outer, inner]);

    doc.gc_detached();
    assert!(!doc.contains(outer));
    assert!(!doc.contains(inner));
    assert!(doc.subtree(outer).is_empty());
}

#[test]
fn append_rejects_cycles_and_root_moves() {
    let (mut doc, body) = doc_with_body();
    let outer = doc.create_element("div");
    let inner = doc.create_element("div");
    doc.append_child(body, outer).unwrap();
    doc.append_child(outer, inner).unwrap();

    assert_eq!(doc.append_child(inner, outer), Err(DomError::WouldCycle));
    assert_eq!(doc.append_child(outer, outer), Err(DomError::WouldCycle));
    let root = doc.root();
    assert_eq!(doc.append_child(outer, root), Err(DomError::RootImmovable));
}

#[test]
fn reparenting_records_removal_then_insertion() {
    let (mut doc, body) = doc_with_body();
    let a = doc.create_element("section");
    let b = doc.create_element("section");
    let child = doc.create_element("div");
    doc.append_child(body, a).unwrap();
    doc.append_child(body, b).unwrap();
    doc.append_child(a, child).unwrap();

    let watcher = doc.observe();
    doc.append_child(b, child).unwrap();

    let records = doc.take_records(watcher);
    assert_eq!(records.len(), 2);
    assert!(matches!(
        &records[0],
        Mutation::ChildList { target, removed, .. } if *target == a && removed == &vec![child]
    ));
    assert!(matches!(
        &records[1],
        Mutation::ChildList { target, added, .. } if *target == b && added == &vec![child]
    ));
}

#[test]
fn attribute_mutations_carry_old_value() {
    let (mut doc, body) = doc_with_body();
    let div = doc.create_element("div");
    doc.append_child(body, div).unwrap();

    let watcher = doc.observe();
    doc.set_attribute(div, "id", "first").unwrap();
    doc.set_attribute(div, "id", "second").unwrap();
    doc.remove_attribute(div, "id").unwrap();
    // Removing an absent attribute records nothing.
    doc.remove_attribute(div, "id").unwrap();

    let records = doc.take_records(watcher);
    assert_eq!(
        records,
        vec![
            Mutation::Attribute {
                target: div,
                name: "id".to_string(),
                old_value: None
            },
            Mutation::Attribute {
                target: div,
                name: "id".to_string(),
                old_value: Some("first".to_string())
            },
            Mutation::Attribute {
                target: div,
                name: "id".to_string(),
                old_value: Some("second".to_string())
            },
        ]
    );
}

#[test]
fn each_watcher_gets_its_own_queue() {
    let (mut doc, body) = doc_with_body();
    let first = doc.observe();
    let second = doc.observe();

    let div = doc.create_element("div");
    doc.append_child(body, div).unwrap();

    assert_eq!(doc.take_records(first).len(), 1);
    assert_eq!(doc.take_records(second).len(), 1);

    doc.unobserve(second);
    doc.set_attribute(div, "class", "x").unwrap();
    assert_eq!(doc.take_records(first).len(), 1);
    assert!(doc.take_records(second).is_empty());
}

#[test]
fn uid_is_stable_and_fresh_per_element() {
    let (mut doc, body) = doc_with_body();
    let div = doc.create_element("div");
    doc.append_child(body, div).unwrap();

    let uid = doc.ensure_uid(div).unwrap();
    assert_eq!(doc.ensure_uid(div).unwrap(), uid);
    assert_eq!(doc.uid(div).as_deref(), Some(uid.as_str()));

    // A structurally identical but distinct element gets a new token.
    doc.remove_child(body, div).unwrap();
    doc.gc_detached();
    let replacement = doc.create_element("div");
    doc.append_child(body, replacement).unwrap();
    let fresh = doc.ensure_uid(replacement).unwrap();
    assert_ne!(fresh, uid);
}

#[test]
fn closest_walks_self_then_ancestors() {
    let (mut doc, body) = doc_with_body();
    let outer = doc.create_element("turbo-frame");
    let inner = doc.create_element("div");
    doc.append_child(body, outer).unwrap();
    doc.append_child(outer, inner).unwrap();

    let is_frame = |d: &Document, n: NodeId| d.tag(n) == Some("turbo-frame");
    assert_eq!(doc.closest(inner, is_frame), Some(outer));
    assert_eq!(doc.closest(outer, is_frame), Some(outer));
    assert_eq!(doc.closest_ancestor(outer, is_frame), None);

    // Detached nodes resolve to None instead of erroring.
    doc.remove_child(body, outer).unwrap();
    assert_eq!(doc.closest_ancestor(inner, is_frame), Some(outer));
    assert_eq!(doc.closest(outer, |d, n| d.tag(n) == Some("body")), None);
}

#[test]
fn element_paths_resolve_round_trip() {
    let (mut doc, body) = doc_with_body();
    let list = doc.create_element("ul");
    let first = doc.create_element("li");
    let second = doc.create_element("li");
    doc.append_child(body, list).unwrap();
    doc.append_child(list, first).unwrap();
    doc.append_child(list, second).unwrap();

    let path = doc.element_path(second).unwrap();
    assert_eq!(path, vec![1, 0, 1]);
    assert_eq!(doc.resolve_path(&path), Some(second));
    assert_eq!(doc.resolve_path(&[]), Some(doc.root()));
    assert_eq!(doc.resolve_path(&[9]), None);

    doc.remove_child(list, second).unwrap();
    assert_eq!(doc.element_path(second), None);
}

#[test]
fn meta_content_and_id_lookup() {
    let (mut doc, head, _body) = Document::with_skeleton("http://localhost/");
    let meta = doc.create_element("meta");
    doc.append_child(head, meta).unwrap();
    doc.set_attribute(meta, "name", "turbo-prefetch").unwrap();
    doc.set_attribute(meta, "content", "false").unwrap();

    assert_eq!(doc.meta_content("turbo-prefetch").as_deref(), Some("false"));
    assert_eq!(doc.meta_content("turbo-refresh-method"), None);

    let (mut doc, body) = doc_with_body();
    let div = doc.create_element("div");
    doc.append_child(body, div).unwrap();
    doc.set_attribute(div, "id", "flash").unwrap();
    assert_eq!(doc.find_by_id("flash"), Some(div));
    assert_eq!(doc.find_by_id("missing"), None);
}

#[test]
fn find_by_attribute_in_document_order() {
    let (mut doc, body) = doc_with_body();
    let a = doc.create_element("a");
    let b = doc.create_element("form");
    doc.append_child(body, a).unwrap();
    doc.append_child(body, b).unwrap();
    doc.set_attribute(a, "data-turbo-frame", "messages").unwrap();
    doc.set_attribute(b, "data-turbo-frame", "messages").unwrap();

    assert_eq!(doc.find_by_attribute("data-turbo-frame", "messages"), vec![a, b]);
    assert!(doc.find_by_attribute("data-turbo-frame", "other").is_empty());
}

#[test]
fn queries_on_unknown_nodes_are_lenient() {
    let (mut doc, body) = doc_with_body();
    let ghost = doc.create_element("div");
    doc.append_child(body, ghost).unwrap();
    doc.remove_child(body, ghost).unwrap();
    doc.gc_detached();

    assert_eq!(doc.tag(ghost), None);
    assert!(doc.children(ghost).is_empty());
    assert_eq!(doc.attribute(ghost, "id"), None);
    assert!(doc.attributes(ghost).is_empty());
    assert_eq!(doc.text(ghost), "");
    assert!(!doc.is_attached(ghost));
    assert_eq!(doc.ensure_uid(ghost), None);
    assert_eq!(doc.set_text(ghost, "x"), Err(DomError::UnknownNode));
}
