//! Two participants editing one graph in-process.
//!
//! Runs the basic scenarios end to end and logs what each side sees:
//!
//! ```text
//!  Alice (host) ──┐                 ┌── Bob (joined from snapshot)
//!                 └──── Relay ──────┘
//! ```
//!
//! `RUST_LOG=info cargo run -p cellsync-demo [config.json]`

mod relay;

use std::error::Error;

use cellsync_collab::{CollabSession, ListenerError, SyncConfig, SyncEvent};
use cellsync_core::{Cell, CellId, Geometry, GraphModel, Point};
use log::{error, info};

use relay::Relay;

fn load_config() -> Result<SyncConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            info!("Loaded config from {path}");
            Ok(SyncConfig::from_json_str(&json)?)
        }
        None => Ok(SyncConfig::default()),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    let layer = CellId::from("1");

    let mut alice = CollabSession::host("Alice", GraphModel::with_default_layer(), config.clone())?;
    let mut bob = CollabSession::join("Bob", alice.snapshot(), config)?;
    bob.add_listener(Box::new(|event: &SyncEvent| -> Result<(), ListenerError> {
        info!("Bob saw {event:?}");
        Ok(())
    }));
    alice.set_view(2.0, Point::new(10.0, 0.0));
    let mut relay = Relay::new(vec![alice, bob]);
    relay.settle()?;

    // Alice draws a vertex.
    let alice = relay.session_mut(0);
    let added = alice.edit(|m| m.add_cell(Cell::vertex(Geometry::new(10.0, 10.0, 40.0, 30.0)), &layer))?;
    let vertex = alice
        .model()
        .resolve(&added)
        .and_then(|c| c.id.clone())
        .ok_or("vertex was not given an id")?;
    info!("Alice created {vertex}");
    relay.settle()?;
    info!(
        "Bob has {} cells, view refreshed {} times",
        relay.session(1).model().len(),
        relay.session(1).view().refresh_count()
    );

    // Style: first write, then a diff.
    let alice = relay.session_mut(0);
    alice.edit(|m| m.set_style(&vertex, Some("rounded;fillColor=#ffffff".into())))?;
    alice.edit(|m| m.set_style(&vertex, Some("rounded;dashed;fillColor=#000000".into())))?;
    relay.settle()?;
    info!(
        "Bob's style: {:?}",
        relay.session(1).model().cell(&vertex).and_then(|c| c.style.clone())
    );

    // Bob points at the vertex, selects it, then leaves the canvas.
    let bob = relay.session_mut(1);
    bob.pointer_moved(Point::new(100.0, 50.0));
    bob.edit(|m| m.select(std::slice::from_ref(&vertex)));
    relay.settle()?;
    let bob_id = relay.session(1).session_id();
    if let Some(marker) = relay.session(0).cursors().marker(&bob_id) {
        info!(
            "Alice shows {}'s cursor at {:?} (visible: {})",
            marker.name, marker.position, marker.visible
        );
    }
    info!(
        "Alice highlights {} of Bob's cells",
        relay
            .session(0)
            .selections()
            .highlights(&bob_id)
            .map_or(0, |h| h.len())
    );

    relay.session_mut(1).pointer_moved(Point::new(-1.0, -1.0));
    relay.settle()?;
    let hidden = relay
        .session(0)
        .cursors()
        .marker(&bob_id)
        .is_some_and(|m| !m.visible);
    info!("Bob's cursor hidden on Alice's side: {hidden}");

    // Alice deletes the vertex; Bob's selection goes with it.
    relay.session_mut(0).edit(|m| m.remove_cells(std::slice::from_ref(&vertex)))?;
    relay.settle()?;
    info!(
        "After removal: Bob has {} cells, {} highlights remain on Alice's side",
        relay.session(1).model().len(),
        relay.session(0).selections().highlight_count()
    );

    relay.session_mut(1).leave();
    relay.settle()?;
    info!(
        "Bob left; Alice sees {} remote participants after {} deliveries",
        relay.session(0).activity().remote_count(),
        relay.delivered()
    );
    Ok(())
}

fn main() {
    env_logger::init();

    info!("Starting cellsync demo...");
    if let Err(e) = run() {
        error!("Demo failed: {e}");
        std::process::exit(1);
    }
}
