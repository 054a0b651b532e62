//! Mutable graph model.
//!
//! Two mutation surfaces:
//!
//! - **Edits** (`add_cell`, `set_style`, `remove_cells`, …) are what a local
//!   user or tool performs. Each edit is recorded as a [`ModelChange`] and
//!   reported through [`ModelEvent`]s, which the synchronizer consumes.
//! - **Silent setters** (`insert_detached`, `apply_parent`, `detach`,
//!   [`GraphModel::cell_mut`], …) mutate state without recording anything.
//!   Remote changes are applied through them so they are never re-emitted
//!   as local edits.

use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

use crate::cell::{Cell, CellId, Terminal};
use crate::error::CoreError;
use crate::geometry::Geometry;

/// Handle of a cell that was added without an id and has not been assigned
/// one yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingKey(u64);

/// Reference to a cell in a change record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellRef {
    Id(CellId),
    Pending(PendingKey),
}

/// One atomic edit record.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelChange {
    Geometry {
        cell: CellId,
        geometry: Option<Geometry>,
        previous: Option<Geometry>,
    },
    Value {
        cell: CellId,
        value: Option<Value>,
        previous: Option<Value>,
    },
    Style {
        cell: CellId,
        style: Option<String>,
        previous: Option<String>,
    },
    Visible {
        cell: CellId,
        visible: bool,
    },
    Collapsed {
        cell: CellId,
        collapsed: bool,
    },
    Terminal {
        cell: CellId,
        end: Terminal,
        terminal: Option<CellId>,
        previous: Option<CellId>,
    },
    /// Insertion (`previous == None`), move, or removal (`parent == None`).
    Child {
        child: CellRef,
        parent: Option<CellId>,
        previous: Option<CellId>,
    },
    /// The whole graph was replaced by a new root.
    Root {
        root: CellId,
        previous: Option<CellId>,
    },
}

impl ModelChange {
    /// The identified cell this record is about, if any.
    pub fn cell(&self) -> Option<&CellId> {
        match self {
            ModelChange::Geometry { cell, .. }
            | ModelChange::Value { cell, .. }
            | ModelChange::Style { cell, .. }
            | ModelChange::Visible { cell, .. }
            | ModelChange::Collapsed { cell, .. }
            | ModelChange::Terminal { cell, .. } => Some(cell),
            ModelChange::Child {
                child: CellRef::Id(id),
                ..
            } => Some(id),
            ModelChange::Child { .. } => None,
            ModelChange::Root { root, .. } => Some(root),
        }
    }
}

/// Notifications emitted by local edits.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    CellsAdded(Vec<CellRef>),
    /// Removed cells, as they were just before removal.
    CellsRemoved(Vec<Cell>),
    Change(Vec<ModelChange>),
    SelectionChanged {
        added: Vec<CellId>,
        removed: Vec<CellId>,
    },
}

/// The graph: a root cell plus an id-keyed index of every attached cell.
#[derive(Debug, Default)]
pub struct GraphModel {
    root: Option<CellId>,
    cells: BTreeMap<CellId, Cell>,
    pending: BTreeMap<PendingKey, Cell>,
    assigned: BTreeMap<PendingKey, CellId>,
    next_pending: u64,
    update_level: usize,
    current_edit: Vec<ModelChange>,
    events: VecDeque<ModelEvent>,
    selection: Vec<CellId>,
}

impl GraphModel {
    /// Creates a model holding only `root`.
    pub fn new(mut root: Cell) -> Result<Self, CoreError> {
        let id = root
            .id
            .clone()
            .ok_or_else(|| CoreError::Unidentified("root".to_string()))?;
        root.parent = None;
        root.source = None;
        root.target = None;
        root.children.clear();
        root.edges.clear();

        let mut model = Self::default();
        model.cells.insert(id.clone(), root);
        model.root = Some(id);
        Ok(model)
    }

    /// Root `"0"` with a single default layer `"1"`.
    pub fn with_default_layer() -> Self {
        let mut root = Cell::with_id("0");
        root.children.push(CellId::from("1"));
        let mut layer = Cell::with_id("1");
        layer.parent = Some(CellId::from("0"));

        let mut model = Self::default();
        model.cells.insert(CellId::from("0"), root);
        model.cells.insert(CellId::from("1"), layer);
        model.root = Some(CellId::from("0"));
        model
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn root(&self) -> Option<&CellId> {
        self.root.as_ref()
    }

    pub fn is_root(&self, id: &CellId) -> bool {
        self.root.as_ref() == Some(id)
    }

    pub fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// Mutable access for silent updates. Relations must go through
    /// [`GraphModel::apply_parent`] and [`GraphModel::apply_terminal`].
    pub fn cell_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.cells.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &CellId> {
        self.cells.keys()
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellId, &Cell)> {
        self.cells.iter()
    }

    pub fn pending_cell(&self, key: PendingKey) -> Option<&Cell> {
        self.pending.get(&key)
    }

    /// Resolves a change-record reference. A pending reference resolves to
    /// the identified cell once an id has been assigned.
    pub fn resolve(&self, cell: &CellRef) -> Option<&Cell> {
        match cell {
            CellRef::Id(id) => self.cells.get(id),
            CellRef::Pending(key) => match self.assigned.get(key) {
                Some(id) => self.cells.get(id),
                None => self.pending.get(key),
            },
        }
    }

    // ─── Edits ───────────────────────────────────────────────────────

    /// Opens an update scope; records are grouped until the matching
    /// [`GraphModel::end_update`].
    pub fn begin_update(&mut self) {
        self.update_level += 1;
    }

    pub fn end_update(&mut self) {
        self.update_level = self.update_level.saturating_sub(1);
        if self.update_level == 0 && !self.current_edit.is_empty() {
            let changes = std::mem::take(&mut self.current_edit);
            self.events.push_back(ModelEvent::Change(changes));
        }
    }

    fn record(&mut self, change: ModelChange) {
        self.current_edit.push(change);
        if self.update_level == 0 {
            let changes = std::mem::take(&mut self.current_edit);
            self.events.push_back(ModelEvent::Change(changes));
        }
    }

    /// Adds `cell` under `parent`. A cell without an id is held as pending
    /// until [`GraphModel::assign_id`] registers it.
    pub fn add_cell(&mut self, mut cell: Cell, parent: &CellId) -> Result<CellRef, CoreError> {
        if !self.cells.contains_key(parent) {
            return Err(CoreError::UnknownCell(parent.clone()));
        }
        for terminal in [cell.source.as_ref(), cell.target.as_ref()].into_iter().flatten() {
            if !self.cells.contains_key(terminal) {
                return Err(CoreError::UnknownCell(terminal.clone()));
            }
        }
        cell.parent = Some(parent.clone());
        cell.children.clear();
        cell.edges.clear();

        let cell_ref = match cell.id.clone() {
            Some(id) => {
                if self.cells.contains_key(&id) {
                    return Err(CoreError::DuplicateId(id));
                }
                self.cells.insert(id.clone(), cell);
                self.link(&id);
                CellRef::Id(id)
            }
            None => {
                let key = PendingKey(self.next_pending);
                self.next_pending += 1;
                self.pending.insert(key, cell);
                CellRef::Pending(key)
            }
        };

        self.begin_update();
        self.record(ModelChange::Child {
            child: cell_ref.clone(),
            parent: Some(parent.clone()),
            previous: None,
        });
        self.events
            .push_back(ModelEvent::CellsAdded(vec![cell_ref.clone()]));
        self.end_update();
        Ok(cell_ref)
    }

    pub fn set_geometry(&mut self, id: &CellId, geometry: Option<Geometry>) -> Result<(), CoreError> {
        let cell = self.existing_mut(id)?;
        let previous = std::mem::replace(&mut cell.geometry, geometry.clone());
        self.record(ModelChange::Geometry {
            cell: id.clone(),
            geometry,
            previous,
        });
        Ok(())
    }

    pub fn set_value(&mut self, id: &CellId, value: Option<Value>) -> Result<(), CoreError> {
        let cell = self.existing_mut(id)?;
        let previous = std::mem::replace(&mut cell.value, value.clone());
        self.record(ModelChange::Value {
            cell: id.clone(),
            value,
            previous,
        });
        Ok(())
    }

    pub fn set_style(&mut self, id: &CellId, style: Option<String>) -> Result<(), CoreError> {
        let cell = self.existing_mut(id)?;
        let previous = std::mem::replace(&mut cell.style, style.clone());
        self.record(ModelChange::Style {
            cell: id.clone(),
            style,
            previous,
        });
        Ok(())
    }

    pub fn set_visible(&mut self, id: &CellId, visible: bool) -> Result<(), CoreError> {
        self.existing_mut(id)?.visible = Some(visible);
        self.record(ModelChange::Visible {
            cell: id.clone(),
            visible,
        });
        Ok(())
    }

    pub fn set_collapsed(&mut self, id: &CellId, collapsed: bool) -> Result<(), CoreError> {
        self.existing_mut(id)?.collapsed = Some(collapsed);
        self.record(ModelChange::Collapsed {
            cell: id.clone(),
            collapsed,
        });
        Ok(())
    }

    /// Connects (or disconnects, with `None`) one end of `edge`.
    pub fn set_terminal(
        &mut self,
        edge: &CellId,
        terminal: Option<&CellId>,
        end: Terminal,
    ) -> Result<(), CoreError> {
        let previous = self.existing(edge)?.terminal(end).cloned();
        self.apply_terminal(edge, terminal, end)?;
        self.record(ModelChange::Terminal {
            cell: edge.clone(),
            end,
            terminal: terminal.cloned(),
            previous,
        });
        Ok(())
    }

    /// Re-parents an attached cell.
    pub fn move_cell(&mut self, id: &CellId, parent: &CellId) -> Result<(), CoreError> {
        let previous = self.existing(id)?.parent.clone();
        self.apply_parent(id, Some(parent))?;
        self.record(ModelChange::Child {
            child: CellRef::Id(id.clone()),
            parent: Some(parent.clone()),
            previous,
        });
        Ok(())
    }

    /// Removes cells together with their descendants and connected edges.
    /// Returns every removed cell.
    pub fn remove_cells(&mut self, ids: &[CellId]) -> Result<Vec<Cell>, CoreError> {
        for id in ids {
            self.existing(id)?;
        }

        let mut doomed = Vec::new();
        for id in ids {
            self.collect_subtree(id, &mut doomed);
        }
        let mut i = 0;
        while i < doomed.len() {
            let edges = self
                .cells
                .get(&doomed[i])
                .map(|c| c.edges.clone())
                .unwrap_or_default();
            for edge in edges {
                self.collect_subtree(&edge, &mut doomed);
            }
            i += 1;
        }

        self.begin_update();
        for id in &doomed {
            let previous = self.cells.get(id).and_then(|c| c.parent.clone());
            let parent_doomed = previous.as_ref().is_some_and(|p| doomed.contains(p));
            if !parent_doomed {
                self.record(ModelChange::Child {
                    child: CellRef::Id(id.clone()),
                    parent: None,
                    previous,
                });
            }
        }
        let removed = self.take_cells(&doomed);
        self.events
            .push_back(ModelEvent::CellsRemoved(removed.clone()));
        self.end_update();
        self.deselect_removed(&doomed);
        Ok(removed)
    }

    /// Replaces the whole graph with `root`.
    pub fn set_root(&mut self, root: Cell) -> Result<(), CoreError> {
        let replacement = GraphModel::new(root)?;
        let previous = self.root.take();
        self.cells = replacement.cells;
        self.root = replacement.root.clone();
        self.pending.clear();
        self.assigned.clear();
        let removed = std::mem::take(&mut self.selection);
        if let Some(root) = replacement.root {
            self.record(ModelChange::Root { root, previous });
        }
        if !removed.is_empty() {
            self.events.push_back(ModelEvent::SelectionChanged {
                added: Vec::new(),
                removed,
            });
        }
        Ok(())
    }

    // ─── Silent setters ──────────────────────────────────────────────

    /// Registers a pending cell under `id`.
    pub fn assign_id(&mut self, key: PendingKey, id: CellId) -> Result<(), CoreError> {
        if self.cells.contains_key(&id) {
            return Err(CoreError::DuplicateId(id));
        }
        let mut cell = self
            .pending
            .remove(&key)
            .ok_or_else(|| CoreError::Unidentified(format!("{key:?}")))?;
        cell.id = Some(id.clone());
        for relation in [&mut cell.parent, &mut cell.source, &mut cell.target] {
            if relation.as_ref().is_some_and(|r| !self.cells.contains_key(r)) {
                log::warn!("Dropping dangling relation of new cell {id}");
                *relation = None;
            }
        }
        self.cells.insert(id.clone(), cell);
        self.assigned.insert(key, id.clone());
        self.link(&id);
        Ok(())
    }

    /// Inserts an identified cell with its relations cleared; they are
    /// restored afterwards with [`GraphModel::apply_parent`] and
    /// [`GraphModel::apply_terminal`].
    pub fn insert_detached(&mut self, mut cell: Cell) -> Result<CellId, CoreError> {
        let id = cell
            .id
            .clone()
            .ok_or_else(|| CoreError::Unidentified("decoded cell".to_string()))?;
        if self.cells.contains_key(&id) {
            return Err(CoreError::DuplicateId(id));
        }
        cell.parent = None;
        cell.source = None;
        cell.target = None;
        cell.children.clear();
        cell.edges.clear();
        self.cells.insert(id.clone(), cell);
        Ok(id)
    }

    pub fn apply_parent(&mut self, child: &CellId, parent: Option<&CellId>) -> Result<(), CoreError> {
        self.existing(child)?;
        if let Some(parent) = parent {
            self.existing(parent)?;
            if self.is_ancestor(child, parent) {
                return Err(CoreError::Cycle {
                    cell: child.clone(),
                    parent: parent.clone(),
                });
            }
        }
        self.unlink_parent(child);
        if let Some(cell) = self.cells.get_mut(child) {
            cell.parent = parent.cloned();
        }
        if let Some(parent) = parent.and_then(|p| self.cells.get_mut(p)) {
            if !parent.children.contains(child) {
                parent.children.push(child.clone());
            }
        }
        Ok(())
    }

    pub fn apply_terminal(
        &mut self,
        edge: &CellId,
        terminal: Option<&CellId>,
        end: Terminal,
    ) -> Result<(), CoreError> {
        self.existing(edge)?;
        if let Some(terminal) = terminal {
            self.existing(terminal)?;
        }
        let previous = self.cells.get(edge).and_then(|c| c.terminal(end).cloned());
        if let Some(cell) = self.cells.get_mut(edge) {
            cell.set_terminal(end, terminal.cloned());
        }
        if let Some(previous) = previous {
            self.unlink_edge(edge, &previous);
        }
        if let Some(cell) = terminal.and_then(|t| self.cells.get_mut(t)) {
            if !cell.edges.contains(edge) {
                cell.edges.push(edge.clone());
            }
        }
        Ok(())
    }

    /// Removes `id` and its descendants without recording an edit. Edges
    /// that stay behind lose their reference to any removed terminal.
    pub fn detach(&mut self, id: &CellId) -> Vec<Cell> {
        if !self.cells.contains_key(id) {
            return Vec::new();
        }
        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);

        let survivors: Vec<CellId> = doomed
            .iter()
            .filter_map(|d| self.cells.get(d))
            .flat_map(|c| c.edges.iter().cloned())
            .filter(|e| !doomed.contains(e))
            .collect();
        for edge in survivors {
            if let Some(cell) = self.cells.get_mut(&edge) {
                for end in [Terminal::Source, Terminal::Target] {
                    if cell.terminal(end).is_some_and(|t| doomed.contains(t)) {
                        cell.set_terminal(end, None);
                    }
                }
            }
        }

        let removed = self.take_cells(&doomed);
        self.deselect_removed(&doomed);
        removed
    }

    // ─── Selection ───────────────────────────────────────────────────

    pub fn selection(&self) -> &[CellId] {
        &self.selection
    }

    pub fn is_selected(&self, id: &CellId) -> bool {
        self.selection.contains(id)
    }

    /// Replaces the selection.
    pub fn select(&mut self, ids: &[CellId]) {
        let next: Vec<CellId> = ids
            .iter()
            .filter(|id| self.cells.contains_key(*id))
            .cloned()
            .collect();
        let added: Vec<CellId> = next
            .iter()
            .filter(|id| !self.selection.contains(*id))
            .cloned()
            .collect();
        let removed: Vec<CellId> = self
            .selection
            .iter()
            .filter(|id| !next.contains(*id))
            .cloned()
            .collect();
        self.selection = next;
        if !added.is_empty() || !removed.is_empty() {
            self.events
                .push_back(ModelEvent::SelectionChanged { added, removed });
        }
    }

    pub fn add_to_selection(&mut self, id: &CellId) {
        if self.cells.contains_key(id) && !self.selection.contains(id) {
            self.selection.push(id.clone());
            self.events.push_back(ModelEvent::SelectionChanged {
                added: vec![id.clone()],
                removed: Vec::new(),
            });
        }
    }

    pub fn remove_from_selection(&mut self, id: &CellId) {
        if self.selection.contains(id) {
            self.selection.retain(|s| s != id);
            self.events.push_back(ModelEvent::SelectionChanged {
                added: Vec::new(),
                removed: vec![id.clone()],
            });
        }
    }

    pub fn clear_selection(&mut self) {
        self.select(&[]);
    }

    // ─── Events ──────────────────────────────────────────────────────

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<ModelEvent> {
        self.events.drain(..).collect()
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn existing(&self, id: &CellId) -> Result<&Cell, CoreError> {
        self.cells
            .get(id)
            .ok_or_else(|| CoreError::UnknownCell(id.clone()))
    }

    fn existing_mut(&mut self, id: &CellId) -> Result<&mut Cell, CoreError> {
        self.cells
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownCell(id.clone()))
    }

    /// Whether `ancestor` is `cell` or one of the ancestors of `cell`.
    fn is_ancestor(&self, ancestor: &CellId, cell: &CellId) -> bool {
        let mut current = Some(cell.clone());
        while let Some(id) = current {
            if &id == ancestor {
                return true;
            }
            current = self.cells.get(&id).and_then(|c| c.parent.clone());
        }
        false
    }

    fn collect_subtree(&self, id: &CellId, out: &mut Vec<CellId>) {
        if out.contains(id) {
            return;
        }
        out.push(id.clone());
        if let Some(cell) = self.cells.get(id) {
            for child in &cell.children {
                self.collect_subtree(child, out);
            }
        }
    }

    fn link(&mut self, id: &CellId) {
        let Some(cell) = self.cells.get(id) else {
            return;
        };
        let parent = cell.parent.clone();
        let terminals: Vec<CellId> = [cell.source.clone(), cell.target.clone()]
            .into_iter()
            .flatten()
            .collect();
        if let Some(parent) = parent.and_then(|p| self.cells.get_mut(&p)) {
            if !parent.children.contains(id) {
                parent.children.push(id.clone());
            }
        }
        for terminal in terminals {
            if let Some(terminal) = self.cells.get_mut(&terminal) {
                if !terminal.edges.contains(id) {
                    terminal.edges.push(id.clone());
                }
            }
        }
    }

    fn unlink_parent(&mut self, id: &CellId) {
        let parent = self.cells.get(id).and_then(|c| c.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.cells.get_mut(&p)) {
            parent.children.retain(|c| c != id);
        }
    }

    fn unlink_edge(&mut self, edge: &CellId, terminal: &CellId) {
        let still_attached = self.cells.get(edge).is_some_and(|e| {
            e.source.as_ref() == Some(terminal) || e.target.as_ref() == Some(terminal)
        });
        if still_attached {
            return;
        }
        if let Some(cell) = self.cells.get_mut(terminal) {
            cell.edges.retain(|e| e != edge);
        }
    }

    fn take_cells(&mut self, ids: &[CellId]) -> Vec<Cell> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            self.unlink_parent(id);
            let terminals: Vec<CellId> = self
                .cells
                .get(id)
                .map(|c| [c.source.clone(), c.target.clone()].into_iter().flatten().collect())
                .unwrap_or_default();
            if let Some(cell) = self.cells.remove(id) {
                for terminal in terminals {
                    if let Some(t) = self.cells.get_mut(&terminal) {
                        t.edges.retain(|e| e != id);
                    }
                }
                removed.push(cell);
            }
        }
        removed
    }

    fn deselect_removed(&mut self, removed: &[CellId]) {
        let gone: Vec<CellId> = self
            .selection
            .iter()
            .filter(|id| removed.contains(*id))
            .cloned()
            .collect();
        if !gone.is_empty() {
            self.selection.retain(|id| !removed.contains(id));
            self.events.push_back(ModelEvent::SelectionChanged {
                added: Vec::new(),
                removed: gone,
            });
        }
    }
}
