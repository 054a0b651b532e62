//! In-process relay between sessions.

#![allow(dead_code)]

use cellsync_collab::{CollabSession, SyncConfig};
use cellsync_core::{Cell, CellId, Geometry, GraphModel};

/// Delivers every outgoing message to every other session until nothing
/// is left in flight.
pub fn settle(sessions: &mut [CollabSession]) {
    for _ in 0..64 {
        let mut delivered = false;
        for i in 0..sessions.len() {
            let outgoing = sessions[i].take_outgoing();
            delivered |= !outgoing.is_empty();
            for bytes in &outgoing {
                for (j, peer) in sessions.iter_mut().enumerate() {
                    if j != i {
                        peer.receive(bytes).unwrap();
                    }
                }
            }
        }
        if !delivered {
            return;
        }
    }
    panic!("relay did not settle");
}

/// A hosts, every other name joins from A's snapshot.
pub fn sessions(names: &[&str]) -> Vec<CollabSession> {
    let host = CollabSession::host(names[0], GraphModel::with_default_layer(), SyncConfig::default())
        .unwrap();
    let snapshot = host.snapshot();
    let mut all = vec![host];
    for name in &names[1..] {
        all.push(CollabSession::join(name, snapshot.clone(), SyncConfig::default()).unwrap());
    }
    settle(&mut all);
    all
}

pub fn layer() -> CellId {
    CellId::from("1")
}

/// Adds an id-less vertex on `session` and returns the id it was given.
pub fn add_vertex(session: &mut CollabSession, geometry: Geometry) -> CellId {
    let cell_ref = session
        .edit(|m| m.add_cell(Cell::vertex(geometry), &layer()))
        .unwrap();
    session
        .model()
        .resolve(&cell_ref)
        .and_then(|c| c.id.clone())
        .unwrap()
}
