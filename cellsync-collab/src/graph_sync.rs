//! Registry of per-cell synchronizers plus graph-level structure.
//!
//! ```text
//!   cells map (observed)                       one CellSynchronizer per id
//!   ┌──────────────────────┐   MapSet  ──▶ remote_create ──▶ bind
//!   │ cells/<id> → mirror  │   MapRemove ─▶ remote_remove ──▶ unbind
//!   └──────────────────────┘
//!   cells/<id>[/style/..]  ──────────────▶ registry[id].process_remote_event
//! ```
//!
//! Remote cells may arrive before their parent or terminals. A cell whose
//! parent is missing waits in `awaiting_parent`; an edge whose terminal is
//! missing is attached as soon as the terminal arrives.

use std::collections::BTreeMap;

use cellsync_core::codec::{decode_cell, decode_graph, encode_cell, resolve_relations};
use cellsync_core::{
    Cell, CellId, CellRecord, CellRef, CoreError, GraphModel, GraphRecord, ModelChange,
    ModelEvent, Relation, Terminal,
};

use crate::cell_sync::{mirror_value, CellSynchronizer, SyncContext};
use crate::error::SyncError;
use crate::events::{ListenerId, Listeners, SyncEvent, SyncListener};
use crate::ids::IdGenerator;
use crate::shared::{DocChange, DocEvent, DocPath, SharedDocument, SharedValue};

/// Root-level map holding graph-wide keys.
pub const GRAPH_KEY: &str = "graph";
pub const ROOT_KEY: &str = "root";
/// Root-level map holding one mirror per cell.
pub const CELLS_KEY: &str = "cells";

/// Edge end still waiting for its terminal cell.
#[derive(Debug)]
struct PendingTerminal {
    edge: CellId,
    end: Terminal,
    terminal: CellId,
}

pub struct GraphSynchronizer {
    cells_path: DocPath,
    registry: BTreeMap<CellId, CellSynchronizer>,
    ids: Box<dyn IdGenerator>,
    listeners: Listeners,
    awaiting_parent: BTreeMap<CellId, Vec<(CellId, CellRecord)>>,
    pending_terminals: Vec<PendingTerminal>,
}

impl GraphSynchronizer {
    pub fn new(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            cells_path: DocPath::top(CELLS_KEY),
            registry: BTreeMap::new(),
            ids,
            listeners: Listeners::new(),
            awaiting_parent: BTreeMap::new(),
            pending_terminals: Vec::new(),
        }
    }

    /// Replaces the generator used for new local cells.
    pub fn set_id_generator(&mut self, ids: Box<dyn IdGenerator>) {
        self.ids = ids;
    }

    pub fn cells_path(&self) -> &DocPath {
        &self.cells_path
    }

    pub fn is_bound(&self, id: &CellId) -> bool {
        self.registry.contains_key(id)
    }

    pub fn bound_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of remote cells held back by a missing parent or terminal.
    pub fn deferred_count(&self) -> usize {
        self.awaiting_parent.values().map(Vec::len).sum::<usize>() + self.pending_terminals.len()
    }

    // ─── Initialization ──────────────────────────────────────────────

    /// Ensures the document holds the root id, writes a mirror for every
    /// local cell the document lacks and binds all of them.
    pub fn initialize(&mut self, ctx: &mut SyncContext<'_>) -> Result<(), SyncError> {
        let root = ctx.model.root().cloned().ok_or(CoreError::MissingRoot)?;
        let graph = DocPath::top(GRAPH_KEY);
        if !ctx.doc.has_key(&graph, ROOT_KEY) {
            ctx.doc
                .map_set(&graph, ROOT_KEY, serde_json::Value::String(root.to_string()))?;
        }
        ctx.doc.observe(self.cells_path.clone());

        let ids: Vec<CellId> = ctx.model.ids().filter(|id| **id != root).cloned().collect();
        let mut written = 0;
        for id in &ids {
            if !ctx.doc.has_key(&self.cells_path, id.as_str()) {
                self.write_mirror(ctx, id)?;
                written += 1;
            }
            self.bind(ctx.doc, id);
        }
        log::info!(
            "Graph synchronizer bound {} cells ({written} written)",
            ids.len()
        );
        Ok(())
    }

    fn bind(&mut self, doc: &mut SharedDocument, id: &CellId) {
        let sync = CellSynchronizer::bind(id.clone(), &self.cells_path, doc);
        self.registry.insert(id.clone(), sync);
    }

    fn write_mirror(&self, ctx: &mut SyncContext<'_>, id: &CellId) -> Result<(), SyncError> {
        let cell = ctx
            .model
            .cell(id)
            .ok_or_else(|| CoreError::UnknownCell(id.clone()))?;
        let mirror = mirror_value(&encode_cell(cell))?;
        ctx.doc.map_set(&self.cells_path, id.as_str(), mirror)?;
        Ok(())
    }

    // ─── Local → remote ──────────────────────────────────────────────

    /// Routes one model notification. Failures are logged per cell or per
    /// change so the rest of the notification still goes through.
    pub fn handle_model_event(&mut self, ctx: &mut SyncContext<'_>, event: &ModelEvent) {
        match event {
            ModelEvent::CellsAdded(cells) => {
                for cell in cells {
                    if let Err(e) = self.local_create(ctx, cell) {
                        log::warn!("Could not share new cell: {e}");
                    }
                }
            }
            ModelEvent::CellsRemoved(cells) => self.local_remove(ctx, cells),
            ModelEvent::Change(changes) => {
                for change in changes {
                    if let Err(e) = self.process_change(ctx, change) {
                        log::warn!("Skipping local change: {e}");
                    }
                }
            }
            ModelEvent::SelectionChanged { .. } => {}
        }
    }

    fn local_create(&mut self, ctx: &mut SyncContext<'_>, cell: &CellRef) -> Result<(), SyncError> {
        let assigned = ctx.model.resolve(cell).and_then(|c| c.id.clone());
        let id = match (cell, assigned) {
            (_, Some(id)) => id,
            (CellRef::Pending(key), None) => {
                let id = self.ids.generate();
                ctx.model.assign_id(*key, id.clone())?;
                log::debug!("Assigned id {id} to new cell");
                id
            }
            (CellRef::Id(id), None) => return Err(CoreError::UnknownCell(id.clone()).into()),
        };
        if self.registry.contains_key(&id) || ctx.model.is_root(&id) {
            return Ok(());
        }
        self.write_mirror(ctx, &id)?;
        self.bind(ctx.doc, &id);
        Ok(())
    }

    fn local_remove(&mut self, ctx: &mut SyncContext<'_>, cells: &[Cell]) {
        let mut removed = Vec::new();
        for id in cells.iter().filter_map(|c| c.id.as_ref()) {
            let Some(mut sync) = self.registry.remove(id) else {
                continue;
            };
            sync.unbind(ctx.doc);
            if let Err(e) = ctx.doc.map_remove(&self.cells_path, id.as_str()) {
                log::warn!("Could not remove mirror of {id}: {e}");
            }
            removed.push(id.clone());
        }
        if !removed.is_empty() {
            ctx.notices.push(SyncEvent::CellsRemoved { cells: removed });
        }
    }

    fn process_change(&mut self, ctx: &mut SyncContext<'_>, change: &ModelChange) -> Result<(), SyncError> {
        match change {
            ModelChange::Root { .. } => Err(SyncError::UnsupportedRootChange),
            ModelChange::Child {
                child,
                parent,
                previous,
            } => {
                let id = ctx.model.resolve(child).and_then(|c| c.id.clone());
                match id {
                    Some(id) if self.registry.contains_key(&id) => {
                        // Additions and removals are handled as structure.
                        if parent.is_none() || previous.is_none() {
                            return Ok(());
                        }
                        self.forward(ctx, &id, change)
                    }
                    _ if parent.is_none() => Ok(()),
                    _ => self.local_create(ctx, child),
                }
            }
            other => match other.cell() {
                Some(id) if self.registry.contains_key(id) => {
                    let id = id.clone();
                    self.forward(ctx, &id, other)
                }
                Some(id) => {
                    log::debug!("Change for unbound cell {id} ignored");
                    Ok(())
                }
                None => Ok(()),
            },
        }
    }

    fn forward(&mut self, ctx: &mut SyncContext<'_>, id: &CellId, change: &ModelChange) -> Result<(), SyncError> {
        let sync = self
            .registry
            .get_mut(id)
            .ok_or_else(|| SyncError::Unbound(id.clone()))?;
        sync.process_local_change(ctx, change)
    }

    // ─── Remote → local ──────────────────────────────────────────────

    /// Routes one document event to the structure handlers or to the bound
    /// cell. Failures are logged and the event is dropped.
    pub fn handle_doc_event(&mut self, ctx: &mut SyncContext<'_>, event: &DocEvent) {
        if let Err(e) = self.route_doc_event(ctx, event) {
            log::warn!("Skipping document event at {}: {e}", event.path);
        }
    }

    fn route_doc_event(&mut self, ctx: &mut SyncContext<'_>, event: &DocEvent) -> Result<(), SyncError> {
        if event.path == self.cells_path {
            // Structural echoes of local edits are already reflected.
            if event.origin.is_local() {
                return Ok(());
            }
            return match &event.change {
                DocChange::MapSet { key, value, .. } => self.remote_create(ctx, CellId::from(key.as_str()), value),
                DocChange::MapRemove { key, .. } => {
                    self.remote_remove(ctx, &CellId::from(key.as_str()));
                    Ok(())
                }
                _ => Err(SyncError::UnexpectedEvent(event.path.clone())),
            };
        }

        let id = match event.path.segments() {
            [cells, id, ..] if *cells == CELLS_KEY => CellId::from(id.as_str()),
            _ => return Err(SyncError::UnexpectedEvent(event.path.clone())),
        };
        let sync = self
            .registry
            .get_mut(&id)
            .ok_or_else(|| SyncError::Unbound(id.clone()))?;
        sync.process_remote_event(ctx, event)
    }

    fn remote_create(&mut self, ctx: &mut SyncContext<'_>, id: CellId, value: &SharedValue) -> Result<(), SyncError> {
        if self.registry.contains_key(&id) || ctx.model.contains(&id) {
            log::debug!("Cell {id} already present");
            return Ok(());
        }
        let record = CellRecord::from_value(value.to_json()).map_err(|e| SyncError::MalformedRecord {
            cell: id.clone(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = record.parent.clone().filter(|p| !ctx.model.contains(p)) {
            log::debug!("Deferring {id} until parent {parent} arrives");
            self.awaiting_parent
                .entry(parent)
                .or_default()
                .push((id, record));
            return Ok(());
        }

        self.attach_remote(ctx, id, &record)?;
        ctx.view.refresh();
        Ok(())
    }

    /// Inserts a decoded remote cell, restores its relations and binds it,
    /// then settles anything that was waiting for it.
    fn attach_remote(&mut self, ctx: &mut SyncContext<'_>, id: CellId, record: &CellRecord) -> Result<(), SyncError> {
        ctx.model.insert_detached(decode_cell(&id, record))?;
        for (relation, missing) in resolve_relations(ctx.model, &id, record)? {
            match relation {
                Relation::Terminal(end) => {
                    log::debug!("Edge {id} waits for {} {missing}", end.key());
                    self.pending_terminals.push(PendingTerminal {
                        edge: id.clone(),
                        end,
                        terminal: missing,
                    });
                }
                Relation::Parent => log::warn!("Cell {id} lost its parent {missing}"),
            }
        }
        self.bind(ctx.doc, &id);

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_terminals)
            .into_iter()
            .partition(|p| p.terminal == id);
        self.pending_terminals = waiting;
        for pending in ready {
            // The mirror may have moved on while the terminal was missing.
            let edge_path = self.cells_path.child(pending.edge.as_str());
            let still_wanted = ctx
                .doc
                .get(&edge_path)
                .map(|mirror| mirror.to_json())
                .and_then(|mirror| mirror.get(pending.end.key()).cloned())
                .is_some_and(|t| t.as_str() == Some(id.as_str()));
            if still_wanted && ctx.model.contains(&pending.edge) {
                ctx.model.apply_terminal(&pending.edge, Some(&id), pending.end)?;
            }
        }

        for (child, child_record) in self.awaiting_parent.remove(&id).unwrap_or_default() {
            if let Err(e) = self.attach_remote(ctx, child.clone(), &child_record) {
                log::warn!("Could not attach deferred cell {child}: {e}");
            }
        }
        Ok(())
    }

    fn remote_remove(&mut self, ctx: &mut SyncContext<'_>, id: &CellId) {
        for children in self.awaiting_parent.values_mut() {
            children.retain(|(child, _)| child != id);
        }
        if let Some(orphans) = self.awaiting_parent.remove(id) {
            log::warn!("Dropping {} cells waiting for removed {id}", orphans.len());
        }
        self.pending_terminals.retain(|p| &p.edge != id);

        if !ctx.model.contains(id) {
            if let Some(mut sync) = self.registry.remove(id) {
                sync.unbind(ctx.doc);
            }
            return;
        }

        let removed: Vec<CellId> = ctx
            .model
            .detach(id)
            .into_iter()
            .filter_map(|c| c.id)
            .collect();
        for cell in &removed {
            if let Some(mut sync) = self.registry.remove(cell) {
                sync.unbind(ctx.doc);
            }
        }
        ctx.view.refresh();
        log::debug!("Removed {} cells for remote removal of {id}", removed.len());
        ctx.notices.push(SyncEvent::CellsRemoved { cells: removed });
    }

    // ─── Listeners ───────────────────────────────────────────────────

    pub fn add_listener(&mut self, listener: Box<dyn SyncListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn fire(&mut self, event: &SyncEvent) {
        self.listeners.fire(event);
    }
}

/// Rebuilds a model from a replicated document. Cell records that do not
/// decode are logged and left out.
pub fn decode_document(doc: &SharedDocument) -> Result<GraphModel, SyncError> {
    let root = doc
        .map_get(&DocPath::top(GRAPH_KEY), ROOT_KEY)
        .as_ref()
        .and_then(SharedValue::as_value)
        .and_then(serde_json::Value::as_str)
        .map(CellId::from)
        .ok_or(CoreError::MissingRoot)?;

    let mut cells = BTreeMap::new();
    if let Some(SharedValue::Map(entries)) = doc.get(&DocPath::top(CELLS_KEY)) {
        for (key, value) in entries {
            match CellRecord::from_value(value.to_json()) {
                Ok(record) => {
                    cells.insert(CellId::from(key.as_str()), record);
                }
                Err(e) => log::warn!("Skipping malformed cell {key}: {e}"),
            }
        }
    }

    Ok(decode_graph(&GraphRecord { root, cells })?)
}
