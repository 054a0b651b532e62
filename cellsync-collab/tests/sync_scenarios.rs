//! End-to-end scenarios between in-process participants.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use cellsync_collab::{CollabSession, ListenerError, MessageType, SyncEvent, SyncMessage};
use cellsync_core::{Cell, CellId, Geometry, Point, StyleData, Terminal};
use serde_json::json;

use common::{add_vertex, layer, sessions, settle};

fn updates(messages: &[SyncMessage]) -> Vec<&SyncMessage> {
    messages
        .iter()
        .filter(|m| m.msg_type == MessageType::Update)
        .collect()
}

fn mirror(session: &CollabSession, id: &CellId) -> serde_json::Value {
    let cells = session.synchronizer().cells_path();
    session.document().map_get(cells, id.as_str()).unwrap().to_json()
}

#[test]
fn test_vertex_creation_reaches_peer() {
    let mut all = sessions(&["A", "B"]);
    let refreshes = all[1].view().refresh_count();

    let id = add_vertex(&mut all[0], Geometry::new(10.0, 10.0, 40.0, 30.0));
    assert_eq!(id.as_str().len(), 32);
    assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));

    let cells = all[0].synchronizer().cells_path().clone();
    let mirror = all[0].document().map_get(&cells, id.as_str()).unwrap().to_json();
    assert_eq!(mirror["vertex"], json!(true));
    assert_eq!(
        mirror["geometry"],
        json!({"x": 10.0, "y": 10.0, "width": 40.0, "height": 30.0})
    );

    settle(&mut all);
    let b = &all[1];
    let cell = b.model().cell(&id).unwrap();
    assert!(cell.vertex);
    assert_eq!(cell.geometry, Some(Geometry::new(10.0, 10.0, 40.0, 30.0)));
    assert_eq!(cell.parent, Some(layer()));
    assert!(b.synchronizer().is_bound(&id));
    assert_eq!(b.view().refresh_count(), refreshes + 1);
}

#[test]
fn test_style_lazy_init_then_diff() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);

    all[0]
        .edit(|m| m.set_style(&id, Some("rounded;fillColor=#ffffff".into())))
        .unwrap();
    let first = all[0].take_messages();
    assert_eq!(updates(&first).len(), 1);
    assert_eq!(
        mirror(&all[0], &id)["style"],
        json!({"classes": ["rounded"], "styles": {"fillColor": "#ffffff"}})
    );

    all[0]
        .edit(|m| m.set_style(&id, Some("rounded;dashed;fillColor=#000000".into())))
        .unwrap();
    let second = all[0].take_messages();
    assert_eq!(updates(&second).len(), 1, "diff arrives as one batch");
    assert_eq!(
        mirror(&all[0], &id)["style"],
        json!({"classes": ["rounded", "dashed"], "styles": {"fillColor": "#000000"}})
    );

    for msg in first.iter().chain(&second) {
        all[1].receive_message(msg).unwrap();
    }
    let style = all[1].model().cell(&id).unwrap().style.clone().unwrap();
    assert_eq!(
        StyleData::parse(&style),
        StyleData::parse("rounded;dashed;fillColor=#000000")
    );
}

#[test]
fn test_remote_pointer_show_hide() {
    let mut all = sessions(&["A", "B"]);
    all[0].set_view(2.0, Point::new(10.0, 0.0));
    let b_id = all[1].session_id();

    all[1].pointer_moved(Point::new(100.0, 50.0));
    settle(&mut all);
    let marker = all[0].cursors().marker(&b_id).unwrap();
    assert!(marker.visible);
    assert_eq!(marker.graph_position, Some(Point::new(100.0, 50.0)));
    assert_eq!(marker.position, Point::new(220.0, 100.0));

    all[1].pointer_moved(Point::new(-20.0, 50.0));
    settle(&mut all);
    let marker = all[0].cursors().marker(&b_id).unwrap();
    assert!(!marker.visible, "hidden, not destroyed");
}

#[test]
fn test_removal_cascade_over_two_selections() {
    let mut all = sessions(&["A", "B", "C"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);

    all[1].edit(|m| m.select(&[id.clone()]));
    all[2].edit(|m| m.select(&[id.clone()]));
    settle(&mut all);

    let (b_id, c_id) = (all[1].session_id(), all[2].session_id());
    let a_highlights = all[0].selections();
    assert!(a_highlights.highlights(&b_id).unwrap().contains_key(&id));
    assert!(a_highlights.highlights(&c_id).unwrap().contains_key(&id));

    all[0].edit(|m| m.remove_cells(&[id.clone()])).unwrap();
    settle(&mut all);

    for session in &all {
        assert!(!session.model().contains(&id));
        assert!(!session.selections().is_highlighted(&id));
        assert!(!session.selections().handles().contains_key(&id));
    }
    assert!(all[1].model().selection().is_empty());
}

#[test]
fn test_loop_containment() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    all[0].add_listener(Box::new(move |e: &SyncEvent| -> Result<(), ListenerError> {
        sink.borrow_mut().push(e.clone());
        Ok(())
    }));

    all[0]
        .edit(|m| m.set_value(&id, Some(json!("label"))))
        .unwrap();
    let messages = all[0].take_messages();
    assert_eq!(updates(&messages).len(), 1);
    assert_eq!(*seen.borrow(), vec![SyncEvent::CellChanged { cell: id.clone() }]);

    for msg in &messages {
        all[1].receive_message(msg).unwrap();
    }
    assert_eq!(all[1].model().cell(&id).unwrap().value, Some(json!("label")));
    assert!(!all[1].model().has_events());
    assert!(updates(&all[1].take_messages()).is_empty());
    assert!(updates(&all[0].take_messages()).is_empty());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_listener_fault_is_contained() {
    let mut all = sessions(&["A", "B"]);
    let count = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&count);

    all[1].add_listener(Box::new(|_: &SyncEvent| -> Result<(), ListenerError> {
        Err(ListenerError("broken".into()))
    }));
    all[1].add_listener(Box::new(|_: &SyncEvent| -> Result<(), ListenerError> {
        panic!("listener bug")
    }));
    all[1].add_listener(Box::new(move |_: &SyncEvent| -> Result<(), ListenerError> {
        *counter.borrow_mut() += 1;
        Ok(())
    }));

    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);
    all[0].edit(|m| m.set_visible(&id, false)).unwrap();
    settle(&mut all);

    assert_eq!(*count.borrow(), 1);
    assert_eq!(all[1].model().cell(&id).unwrap().visible, Some(false));
}

#[test]
fn test_geometry_notification_is_deferred_but_delivered() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    all[1].add_listener(Box::new(move |e: &SyncEvent| -> Result<(), ListenerError> {
        sink.borrow_mut().push(e.clone());
        Ok(())
    }));

    all[0]
        .edit(|m| m.set_geometry(&id, Some(Geometry::new(30.0, 40.0, 10.0, 10.0))))
        .unwrap();
    settle(&mut all);
    assert_eq!(*seen.borrow(), vec![SyncEvent::CellChanged { cell: id.clone() }]);
    assert_eq!(
        all[1].model().cell(&id).unwrap().geometry,
        Some(Geometry::new(30.0, 40.0, 10.0, 10.0))
    );
}

#[test]
fn test_move_and_reconnect_replicate() {
    let mut all = sessions(&["A", "B"]);
    let group = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 100.0, 100.0));
    let a = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    let b = add_vertex(&mut all[0], Geometry::new(50.0, 0.0, 10.0, 10.0));
    let edge_ref = all[0]
        .edit(|m| m.add_cell(Cell::edge_between(a.clone(), b.clone()), &layer()))
        .unwrap();
    let edge = all[0].model().resolve(&edge_ref).and_then(|c| c.id.clone()).unwrap();
    settle(&mut all);
    assert_eq!(all[1].model().cell(&edge).unwrap().target, Some(b.clone()));

    all[0].edit(|m| m.move_cell(&a, &group)).unwrap();
    all[0]
        .edit(|m| m.set_terminal(&edge, Some(&group), Terminal::Target))
        .unwrap();
    settle(&mut all);

    let remote = all[1].model();
    assert_eq!(remote.cell(&a).unwrap().parent, Some(group.clone()));
    assert!(remote.cell(&group).unwrap().children().contains(&a));
    assert!(!remote.cell(&layer()).unwrap().children().contains(&a));
    assert_eq!(remote.cell(&edge).unwrap().target, Some(group.clone()));
    assert!(remote.cell(&group).unwrap().edges().contains(&edge));
    assert!(!remote.cell(&b).unwrap().edges().contains(&edge));
}

#[test]
fn test_late_joiner_decodes_graph() {
    let mut all = sessions(&["A"]);
    let a = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    let b = add_vertex(&mut all[0], Geometry::new(50.0, 0.0, 10.0, 10.0));
    all[0]
        .edit(|m| m.add_cell(Cell::edge_between(a.clone(), b.clone()), &layer()))
        .unwrap();
    settle(&mut all);

    let late = cellsync_collab::CollabSession::join(
        "late",
        all[0].snapshot(),
        cellsync_collab::SyncConfig::default(),
    )
    .unwrap();
    all.push(late);
    settle(&mut all);

    let model = all[1].model();
    assert_eq!(model.len(), all[0].model().len());
    let edge = model
        .cells()
        .find(|(_, c)| c.edge)
        .map(|(id, _)| id.clone())
        .unwrap();
    assert_eq!(model.cell(&edge).unwrap().source, Some(a));
    assert_eq!(model.cell(&edge).unwrap().target, Some(b));
    assert_eq!(all[0].activity().remote_count(), 1);
    assert_eq!(all[1].activity().remote_count(), 1);
}

#[test]
fn test_leave_destroys_marker_and_highlights() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);
    all[1].pointer_moved(Point::new(5.0, 5.0));
    all[1].edit(|m| m.select(&[id.clone()]));
    settle(&mut all);

    let b_id = all[1].session_id();
    assert!(all[0].cursors().marker(&b_id).is_some());
    assert!(all[0].selections().is_highlighted(&id));

    all[1].leave();
    settle(&mut all);
    assert!(all[0].cursors().marker(&b_id).is_none());
    assert!(all[0].selections().highlights(&b_id).is_none());
    assert_eq!(all[0].activity().remote_count(), 0);
}

#[test]
fn test_concurrent_creations_converge() {
    let mut all = sessions(&["A", "B"]);
    let from_a = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    let from_b = add_vertex(&mut all[1], Geometry::new(20.0, 0.0, 10.0, 10.0));
    settle(&mut all);

    for session in &all {
        assert!(session.model().contains(&from_a));
        assert!(session.model().contains(&from_b));
        assert_eq!(session.synchronizer().bound_count(), 3);
    }
    let ids = |i: usize| -> Vec<CellId> { all[i].model().ids().cloned().collect() };
    let (mut left, mut right) = (ids(0), ids(1));
    left.sort();
    right.sort();
    assert_eq!(left, right);
}

#[test]
fn test_concurrent_value_edits_converge() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    settle(&mut all);

    all[0].edit(|m| m.set_value(&id, Some(json!("from A")))).unwrap();
    all[1].edit(|m| m.set_value(&id, Some(json!("from B")))).unwrap();
    settle(&mut all);

    let (a, b) = (all[0].model().cell(&id).unwrap(), all[1].model().cell(&id).unwrap());
    assert!(a.value == Some(json!("from A")) || a.value == Some(json!("from B")));
    assert_eq!(a.value, b.value);
    assert_eq!(mirror(&all[0], &id), mirror(&all[1], &id));
}

#[test]
fn test_concurrent_class_removals_converge() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    all[0]
        .edit(|m| m.set_style(&id, Some("x;y;fillColor=#fff".into())))
        .unwrap();
    settle(&mut all);

    all[0].edit(|m| m.set_style(&id, Some("y;fillColor=#fff".into()))).unwrap();
    all[1].edit(|m| m.set_style(&id, Some("x;fillColor=#fff".into()))).unwrap();
    settle(&mut all);

    for session in &all {
        let style = session.model().cell(&id).unwrap().style.clone().unwrap();
        assert_eq!(StyleData::parse(&style), StyleData::parse("fillColor=#fff"));
    }
    assert_eq!(mirror(&all[0], &id), mirror(&all[1], &id));
}

#[test]
fn test_reordered_updates_converge() {
    let mut all = sessions(&["A", "B"]);
    let id = add_vertex(&mut all[0], Geometry::new(0.0, 0.0, 10.0, 10.0));
    let first = all[0].take_messages();
    all[0].edit(|m| m.set_value(&id, Some(json!("late")))).unwrap();
    let second = all[0].take_messages();

    for msg in updates(&second) {
        all[1].receive_message(msg).unwrap();
    }
    assert!(!all[1].model().contains(&id), "held back until the cell arrives");

    for msg in updates(&first) {
        all[1].receive_message(msg).unwrap();
    }
    for msg in first.iter().chain(&second) {
        if msg.msg_type != MessageType::Update {
            all[1].receive_message(msg).unwrap();
        }
    }

    let cell = all[1].model().cell(&id).unwrap();
    assert_eq!(cell.value, Some(json!("late")));
    assert_eq!(cell.parent, Some(layer()));
    assert_eq!(mirror(&all[0], &id), mirror(&all[1], &id));
}
