//! Wire codec between [`Cell`]s and their replicated records.
//!
//! ```text
//! Graph := { root: CellId, cells: { [CellId]: Cell } }
//! Cell  := { style?, value?, geometry?, connectable?, visible?, collapsed?,
//!            edge?: true, vertex?: true, parent?, source?, target? }
//! ```
//!
//! Records are sparse: unset attributes are omitted on encode and left at
//! their defaults on decode. Relations travel as ids and are resolved in a
//! second pass once every referenced cell exists.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::cell::{Cell, CellId, Terminal};
use crate::error::CoreError;
use crate::geometry::Geometry;
use crate::model::GraphModel;
use crate::style::StyleData;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Replicated form of a single cell.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct CellRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub edge: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub vertex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<CellId>,
}

impl CellRecord {
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn terminal(&self, end: Terminal) -> Option<&CellId> {
        match end {
            Terminal::Source => self.source.as_ref(),
            Terminal::Target => self.target.as_ref(),
        }
    }
}

/// Replicated form of a whole graph. The root's own entry is not part of
/// `cells`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GraphRecord {
    pub root: CellId,
    #[serde(default)]
    pub cells: BTreeMap<CellId, CellRecord>,
}

impl GraphRecord {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A relation of a record that names a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Parent,
    Terminal(Terminal),
}

// ─── Cells ───────────────────────────────────────────────────────────

pub fn encode_cell(cell: &Cell) -> CellRecord {
    CellRecord {
        style: encode_style(cell.style.as_deref()),
        value: cell.value.clone(),
        geometry: cell.geometry.clone(),
        connectable: cell.connectable,
        visible: cell.visible,
        collapsed: cell.collapsed,
        edge: cell.edge,
        vertex: cell.vertex,
        parent: cell.parent.clone(),
        source: cell.source.clone(),
        target: cell.target.clone(),
    }
}

/// Builds a cell from its record. Relations are copied as ids and still
/// need [`resolve_relations`] once the cell is in a model.
pub fn decode_cell(id: &CellId, record: &CellRecord) -> Cell {
    Cell {
        id: Some(id.clone()),
        value: record.value.clone(),
        geometry: record.geometry.clone(),
        style: record.style.as_ref().map(decode_style),
        vertex: record.vertex,
        edge: record.edge,
        visible: record.visible,
        collapsed: record.collapsed,
        connectable: record.connectable,
        parent: record.parent.clone(),
        source: record.source.clone(),
        target: record.target.clone(),
        ..Cell::default()
    }
}

pub fn encode_style(style: Option<&str>) -> Option<StyleData> {
    style.map(StyleData::parse)
}

pub fn decode_style(data: &StyleData) -> String {
    data.to_string()
}

pub fn encode_geometry(geometry: &Geometry) -> Result<Value, CoreError> {
    Ok(serde_json::to_value(geometry)?)
}

pub fn decode_geometry(value: &Value) -> Result<Geometry, CoreError> {
    Ok(Geometry::deserialize(value)?)
}

/// Attaches the parent and terminals named by `record` to the cell `id`,
/// which must already be in `model`. References to cells that are not in
/// the model are skipped and returned.
pub fn resolve_relations(
    model: &mut GraphModel,
    id: &CellId,
    record: &CellRecord,
) -> Result<Vec<(Relation, CellId)>, CoreError> {
    let mut unresolved = Vec::new();

    if let Some(parent) = &record.parent {
        if model.contains(parent) {
            model.apply_parent(id, Some(parent))?;
        } else {
            unresolved.push((Relation::Parent, parent.clone()));
        }
    }
    for end in [Terminal::Source, Terminal::Target] {
        if let Some(terminal) = record.terminal(end) {
            if model.contains(terminal) {
                model.apply_terminal(id, Some(terminal), end)?;
            } else {
                unresolved.push((Relation::Terminal(end), terminal.clone()));
            }
        }
    }
    Ok(unresolved)
}

// ─── Graphs ──────────────────────────────────────────────────────────

pub fn encode_graph(model: &GraphModel) -> Result<GraphRecord, CoreError> {
    let root = model.root().cloned().ok_or(CoreError::MissingRoot)?;
    let cells = model
        .cells()
        .filter(|(id, _)| **id != root)
        .map(|(id, cell)| (id.clone(), encode_cell(cell)))
        .collect();
    Ok(GraphRecord { root, cells })
}

/// Two-pass decode: the root, then every other cell, then relations.
/// Dangling references are logged and dropped.
pub fn decode_graph(record: &GraphRecord) -> Result<GraphModel, CoreError> {
    let root = match record.cells.get(&record.root) {
        Some(entry) => decode_cell(&record.root, entry),
        None => Cell::with_id(record.root.clone()),
    };
    let mut model = GraphModel::new(root)?;

    for (id, entry) in record.cells.iter().filter(|(id, _)| **id != record.root) {
        model.insert_detached(decode_cell(id, entry))?;
    }

    for (id, entry) in record.cells.iter().filter(|(id, _)| **id != record.root) {
        for (relation, missing) in resolve_relations(&mut model, id, entry)? {
            log::warn!("Cell {id} references unknown cell {missing} as {relation:?}");
        }
    }

    Ok(model)
}
