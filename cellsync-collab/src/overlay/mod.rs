//! Presence decorations drawn over the graph.
//!
//! Both overlays are plain state: the host reads markers and highlights each
//! frame and draws them however it likes.
//!
//! ```text
//!  pointer / selection input ──▶ overlay ──▶ Activity::set_state
//!  ActivityEvent (remote)    ──▶ overlay ──▶ markers / highlights
//!  SyncEvent                 ──▶ SelectionOverlay ──▶ re-render / tear down
//! ```

pub mod cursor;
pub mod selection;

pub use cursor::{CursorMarker, CursorOverlay};
pub use selection::{Highlight, SelectionOverlay};
