//! Remote selection highlights and local selection handles.

use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use cellsync_core::{CellId, GraphModel, Rect, View};

use crate::colors::ColorAssigner;
use crate::events::SyncEvent;
use crate::presence::{Activity, ActivityEvent, CursorColor, StateValue, SELECTION_KEY};

/// Outline drawn around a cell another participant has selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub color: CursorColor,
    /// Screen bounds of the cell when last rendered.
    pub bounds: Rect,
    pub stroke_width: f64,
}

pub struct SelectionOverlay {
    remote: HashMap<Uuid, BTreeMap<CellId, Highlight>>,
    handles: BTreeMap<CellId, Rect>,
    stroke_width: f64,
}

impl SelectionOverlay {
    /// Builds highlights for every participant already in the roster.
    pub fn new(
        activity: &Activity,
        model: &GraphModel,
        view: &View,
        colors: &mut ColorAssigner,
        stroke_width: f64,
    ) -> Self {
        let mut overlay = Self {
            remote: HashMap::new(),
            handles: BTreeMap::new(),
            stroke_width,
        };
        for participant in activity.remote_participants() {
            if let Some(ids) = participant.state(SELECTION_KEY).and_then(StateValue::as_ids) {
                let color = colors.assign(participant.session_id);
                overlay.rebuild(participant.session_id, ids, color, model, view);
            }
        }
        overlay
    }

    /// Publishes the whole local selection and redraws the local handles.
    pub fn local_selection_changed(&mut self, model: &GraphModel, view: &View, activity: &mut Activity) {
        let ids: Vec<String> = model.selection().iter().map(|id| id.to_string()).collect();
        activity.set_state(SELECTION_KEY, StateValue::Ids(ids));

        self.handles = model
            .selection()
            .iter()
            .filter_map(|id| Some((id.clone(), view.cell_bounds(model, id)?)))
            .collect();
    }

    pub fn handle_activity_event(
        &mut self,
        event: &ActivityEvent,
        model: &GraphModel,
        view: &View,
        colors: &mut ColorAssigner,
    ) {
        if event.is_local() {
            return;
        }
        match event {
            ActivityEvent::StateSet {
                session_id,
                key,
                value,
                ..
            } if key == SELECTION_KEY => {
                let Some(ids) = value.as_ids() else {
                    log::warn!("Ignoring malformed selection from {session_id}");
                    return;
                };
                let color = colors.assign(*session_id);
                self.rebuild(*session_id, ids, color, model, view);
            }
            ActivityEvent::StateRemoved { session_id, key, .. } if key == SELECTION_KEY => {
                self.remote.remove(session_id);
            }
            ActivityEvent::SessionLeft { session_id } => {
                if let Some(highlights) = self.remote.remove(session_id) {
                    log::debug!("Cleared {} highlights of {session_id}", highlights.len());
                }
            }
            _ => {}
        }
    }

    /// Replaces a participant's highlights. Ids not in the model are
    /// skipped; they may have been removed concurrently.
    fn rebuild(&mut self, session_id: Uuid, ids: &[String], color: CursorColor, model: &GraphModel, view: &View) {
        let mut highlights = BTreeMap::new();
        for id in ids.iter().map(|id| CellId::from(id.as_str())) {
            if !model.contains(&id) {
                log::trace!("Selection of {session_id} names unknown cell {id}");
                continue;
            }
            let bounds = view.cell_bounds(model, &id).unwrap_or_default();
            highlights.insert(
                id,
                Highlight {
                    color,
                    bounds,
                    stroke_width: self.stroke_width,
                },
            );
        }
        self.remote.insert(session_id, highlights);
    }

    pub fn handle_sync_event(&mut self, event: &SyncEvent, model: &GraphModel, view: &View) {
        match event {
            SyncEvent::CellChanged { cell } => {
                let bounds = view.cell_bounds(model, cell);
                for highlights in self.remote.values_mut() {
                    if let Some(highlight) = highlights.get_mut(cell) {
                        highlight.bounds = bounds.unwrap_or_default();
                    }
                }
                if let Some(handle) = self.handles.get_mut(cell) {
                    *handle = bounds.unwrap_or_default();
                }
            }
            SyncEvent::CellsRemoved { cells } => {
                for highlights in self.remote.values_mut() {
                    highlights.retain(|id, _| !cells.contains(id));
                }
                self.handles.retain(|id, _| !cells.contains(id));
            }
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn highlights(&self, session_id: &Uuid) -> Option<&BTreeMap<CellId, Highlight>> {
        self.remote.get(session_id)
    }

    /// Whether any remote highlight references `cell`.
    pub fn is_highlighted(&self, cell: &CellId) -> bool {
        self.remote.values().any(|h| h.contains_key(cell))
    }

    pub fn highlight_count(&self) -> usize {
        self.remote.values().map(BTreeMap::len).sum()
    }

    /// Local selection handles, screen bounds per selected cell.
    pub fn handles(&self) -> &BTreeMap<CellId, Rect> {
        &self.handles
    }
}

// ===================================================================
// Tests
// ===================================================================
