use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::geometry::Geometry;

/// Opaque cell identifier, unique within a graph.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CellId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which end of an edge a terminal is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Terminal {
    Source,
    Target,
}

impl Terminal {
    /// Key of this terminal in a cell record.
    pub fn key(self) -> &'static str {
        match self {
            Terminal::Source => "source",
            Terminal::Target => "target",
        }
    }
}

/// A node or an edge of the graph.
///
/// `visible`, `collapsed` and `connectable` are `None` until set, which
/// means the engine default (visible, expanded, connectable). Relations are
/// held by id; `children` and `edges` are maintained by the model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    pub id: Option<CellId>,
    pub value: Option<Value>,
    pub geometry: Option<Geometry>,
    pub style: Option<String>,
    pub vertex: bool,
    pub edge: bool,
    pub visible: Option<bool>,
    pub collapsed: Option<bool>,
    pub connectable: Option<bool>,
    pub parent: Option<CellId>,
    pub source: Option<CellId>,
    pub target: Option<CellId>,
    pub(crate) children: Vec<CellId>,
    pub(crate) edges: Vec<CellId>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<CellId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// An id-less vertex, as a local tool would create it.
    pub fn vertex(geometry: Geometry) -> Self {
        Self {
            vertex: true,
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// An id-less edge between two existing cells.
    pub fn edge_between(source: CellId, target: CellId) -> Self {
        Self {
            edge: true,
            source: Some(source),
            target: Some(target),
            geometry: Some(Geometry {
                relative: true,
                ..Geometry::default()
            }),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.unwrap_or(false)
    }

    pub fn is_connectable(&self) -> bool {
        self.connectable.unwrap_or(true)
    }

    pub fn terminal(&self, end: Terminal) -> Option<&CellId> {
        match end {
            Terminal::Source => self.source.as_ref(),
            Terminal::Target => self.target.as_ref(),
        }
    }

    pub fn set_terminal(&mut self, end: Terminal, terminal: Option<CellId>) {
        match end {
            Terminal::Source => self.source = terminal,
            Terminal::Target => self.target = terminal,
        }
    }

    /// Child ids in insertion order.
    pub fn children(&self) -> &[CellId] {
        &self.children
    }

    /// Ids of edges connected to this cell.
    pub fn edges(&self) -> &[CellId] {
        &self.edges
    }

    /// Id as a string for logging, `<pending>` while unassigned.
    pub fn display_id(&self) -> String {
        self.id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<pending>".to_string())
    }
}
