//! # cellsync-collab — graph ↔ shared document synchronization
//!
//! Keeps a local [`GraphModel`](cellsync_core::GraphModel) and a replicated
//! [`SharedDocument`] in step, and draws remote pointers and selections.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ModelEvent   ┌───────────────────┐  map/array ops  ┌────────────────┐
//! │ GraphModel   │ ────────────▶ │ GraphSynchronizer │ ──────────────▶ │ SharedDocument │
//! │ + View       │ ◀──────────── │  └ CellSynchron.. │ ◀────────────── │  (replica)     │
//! └──────────────┘ silent setters└─────────┬─────────┘    DocEvent     └───────┬────────┘
//!                                          │ SyncEvent                         │ DocUpdate
//!                                          ▼                                   ▼
//!                               ┌─────────────────────┐               ┌────────────────┐
//!                               │ overlays, listeners │ ◀──────────── │ SyncMessage    │
//!                               └─────────────────────┘  Activity     │ (bincode)      │
//!                                                                     └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`shared`] — yrs-backed document replica, updates and change events
//! - [`presence`] — participant roster and ephemeral state
//! - [`cell_sync`] — per-cell mirror binding
//! - [`graph_sync`] — cell registry, creation and removal on both sides
//! - [`overlay`] — remote cursors and selection highlights
//! - [`session`] — one participant wired through a dispatch loop
//! - [`protocol`] — wire envelope

pub mod cell_sync;
pub mod colors;
pub mod config;
pub mod error;
pub mod events;
pub mod graph_sync;
pub mod ids;
pub mod overlay;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod shared;
pub mod tasks;

// Re-exports for convenience
pub use cell_sync::{CellSynchronizer, SyncContext};
pub use colors::ColorAssigner;
pub use config::SyncConfig;
pub use error::{ListenerError, PresenceError, SyncError};
pub use events::{ListenerId, SyncEvent, SyncListener};
pub use graph_sync::{decode_document, GraphSynchronizer};
pub use ids::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use overlay::{CursorMarker, CursorOverlay, Highlight, SelectionOverlay};
pub use presence::{
    Activity, ActivityEvent, AwarenessMessage, CursorColor, Participant, StateValue, Vec2,
    POINTER_KEY, SELECTION_KEY,
};
pub use protocol::{MessageType, ProtocolError, SyncMessage};
pub use session::CollabSession;
pub use shared::{
    DocChange, DocError, DocEvent, DocPath, DocSnapshot, DocTxn, DocUpdate, Origin,
    SharedDocument, SharedValue,
};
pub use tasks::TaskQueue;
