//! Graph model and wire codec shared by every cellsync participant.
//!
//! ```text
//!  ┌─────────────┐  edits / ModelEvent   ┌──────────────────┐
//!  │ GraphModel  │ ────────────────────▶ │ cellsync-collab  │
//!  │  + View     │ ◀──────────────────── │  synchronizers   │
//!  └─────────────┘   silent setters      └──────────────────┘
//!         │                                      │
//!         └──────── codec (CellRecord) ──────────┘
//! ```

pub mod cell;
pub mod codec;
pub mod error;
pub mod geometry;
pub mod model;
pub mod style;
pub mod view;

pub use cell::{Cell, CellId, Terminal};
pub use codec::{CellRecord, GraphRecord, Relation};
pub use error::CoreError;
pub use geometry::{Geometry, Point, Rect};
pub use model::{CellRef, GraphModel, ModelChange, ModelEvent, PendingKey};
pub use style::{StyleData, StyleDiff};
pub use view::View;
