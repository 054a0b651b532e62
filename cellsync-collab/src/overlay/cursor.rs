//! Remote pointer markers and local pointer publication.

use std::collections::HashMap;
use uuid::Uuid;

use cellsync_core::{Point, View};

use crate::colors::ColorAssigner;
use crate::presence::{Activity, ActivityEvent, CursorColor, StateValue, POINTER_KEY};

/// Marker for one remote participant's pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorMarker {
    pub session_id: Uuid,
    pub name: String,
    pub color: CursorColor,
    /// Last published position, graph coordinates.
    pub graph_position: Option<Point>,
    /// Screen position under the current view.
    pub position: Point,
    pub visible: bool,
}

/// Tracks one marker per remote participant.
///
/// A marker is hidden, not destroyed, when its pointer is retracted; it is
/// destroyed when the participant leaves.
pub struct CursorOverlay {
    markers: HashMap<Uuid, CursorMarker>,
    publish: bool,
    /// Pointer publication is suspended between a leave and the next enter.
    inside: bool,
    dirty: bool,
}

impl CursorOverlay {
    /// Creates markers for everyone already in the roster.
    pub fn new(activity: &Activity, view: &View, colors: &mut ColorAssigner, publish: bool) -> Self {
        let mut overlay = Self {
            markers: HashMap::new(),
            publish,
            inside: true,
            dirty: false,
        };
        for participant in activity.remote_participants() {
            let marker = overlay.ensure_marker(participant.session_id, activity, colors);
            if let Some(p) = participant.state(POINTER_KEY).and_then(StateValue::as_point) {
                marker.graph_position = Some(p.into());
                marker.position = view.to_screen(p.into());
                marker.visible = true;
            }
        }
        overlay
    }

    // ─── Local pointer ───────────────────────────────────────────────

    /// Host pointer motion, in screen coordinates. Motion off the canvas
    /// retracts the published pointer.
    pub fn pointer_moved(&mut self, screen: Point, view: &View, activity: &mut Activity) {
        if !view.on_canvas(screen) {
            activity.remove_state(POINTER_KEY);
            return;
        }
        if !self.publish || !self.inside {
            return;
        }
        let graph = view.to_graph(screen);
        let current = activity.state(POINTER_KEY).and_then(StateValue::as_point);
        if current == Some(graph.into()) {
            return;
        }
        activity.set_state(POINTER_KEY, StateValue::Point(graph.into()));
    }

    /// The pointer left the canvas.
    pub fn pointer_left(&mut self, activity: &mut Activity) {
        self.inside = false;
        activity.remove_state(POINTER_KEY);
    }

    pub fn pointer_entered(&mut self) {
        self.inside = true;
    }

    // ─── Remote participants ─────────────────────────────────────────

    pub fn handle_activity_event(
        &mut self,
        event: &ActivityEvent,
        activity: &Activity,
        view: &View,
        colors: &mut ColorAssigner,
    ) {
        if event.is_local() {
            return;
        }
        match event {
            ActivityEvent::SessionJoined { session_id } => {
                if *session_id != activity.session_id() {
                    self.ensure_marker(*session_id, activity, colors);
                    self.dirty = true;
                }
            }
            ActivityEvent::StateSet {
                session_id,
                key,
                value,
                ..
            } if key == POINTER_KEY => {
                let Some(p) = value.as_point() else {
                    log::warn!("Ignoring non-point pointer state from {session_id}");
                    return;
                };
                let marker = self.ensure_marker(*session_id, activity, colors);
                marker.graph_position = Some(p.into());
                marker.position = view.to_screen(p.into());
                marker.visible = true;
                self.dirty = true;
            }
            ActivityEvent::StateRemoved { session_id, key, .. } if key == POINTER_KEY => {
                if let Some(marker) = self.markers.get_mut(session_id) {
                    marker.visible = false;
                    self.dirty = true;
                }
            }
            ActivityEvent::SessionLeft { session_id } => {
                if self.markers.remove(session_id).is_some() {
                    log::debug!("Removed cursor of {session_id}");
                    self.dirty = true;
                }
            }
            _ => {}
        }
    }

    fn ensure_marker(
        &mut self,
        session_id: Uuid,
        activity: &Activity,
        colors: &mut ColorAssigner,
    ) -> &mut CursorMarker {
        self.markers.entry(session_id).or_insert_with(|| CursorMarker {
            session_id,
            name: activity
                .participant(&session_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            color: colors.assign(session_id),
            graph_position: None,
            position: Point::ORIGIN,
            visible: false,
        })
    }

    /// Recomputes screen positions after the view moved.
    pub fn reposition(&mut self, view: &View) {
        for marker in self.markers.values_mut() {
            if let Some(p) = marker.graph_position {
                marker.position = view.to_screen(p);
            }
        }
        self.dirty = true;
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn marker(&self, session_id: &Uuid) -> Option<&CursorMarker> {
        self.markers.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Visible markers ordered by session id, for drawing.
    pub fn visible_markers(&self) -> Vec<&CursorMarker> {
        let mut visible: Vec<&CursorMarker> = self.markers.values().filter(|m| m.visible).collect();
        visible.sort_by_key(|m| m.session_id);
        visible
    }

    /// Whether markers changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

// ===================================================================
// Tests
// ===================================================================
