//! Viewport over a [`GraphModel`].
//!
//! ```text
//!  graph space ──(+translate)──(*scale)──▶ screen space
//!  screen space ──(-translate*scale)──(/scale)──▶ graph space
//! ```
//!
//! Both directions round to whole units, matching how pointer positions
//! are exchanged between participants.

use crate::cell::{CellId, Terminal};
use crate::geometry::{Point, Rect};
use crate::model::GraphModel;

/// Scale and translation of the drawing surface plus a refresh counter.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    pub scale: f64,
    pub translate: Point,
    /// Visible canvas in screen coordinates.
    pub canvas: Rect,
    refreshes: u64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Point::ORIGIN,
            canvas: Rect::new(0.0, 0.0, 1024.0, 768.0),
            refreshes: 0,
        }
    }
}

impl View {
    pub fn new(scale: f64, translate: Point) -> Self {
        Self {
            scale,
            translate,
            ..Self::default()
        }
    }

    /// Re-renders the graph. Only counted; drawing is up to the host.
    pub fn refresh(&mut self) {
        self.refreshes += 1;
        log::trace!("View refresh #{}", self.refreshes);
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(
            ((p.x + self.translate.x) * self.scale).round(),
            ((p.y + self.translate.y) * self.scale).round(),
        )
    }

    pub fn to_graph(&self, p: Point) -> Point {
        Point::new(
            ((p.x - self.translate.x * self.scale) / self.scale).round(),
            ((p.y - self.translate.y * self.scale) / self.scale).round(),
        )
    }

    /// Whether a screen point lies on the canvas.
    pub fn on_canvas(&self, screen: Point) -> bool {
        self.canvas.contains(screen)
    }

    /// Screen bounds of a cell, or `None` when it has nothing to draw.
    pub fn cell_bounds(&self, model: &GraphModel, id: &CellId) -> Option<Rect> {
        let bounds = absolute_bounds(model, id, 0)?;
        let origin = self.to_screen(Point::new(bounds.x, bounds.y));
        Some(Rect::new(
            origin.x,
            origin.y,
            bounds.width * self.scale,
            bounds.height * self.scale,
        ))
    }
}

/// Graph-space bounds. Vertex geometry is relative to a vertex parent; an
/// edge without absolute geometry spans its terminals.
fn absolute_bounds(model: &GraphModel, id: &CellId, depth: usize) -> Option<Rect> {
    // Terminal chains deeper than this are treated as unresolvable.
    if depth > 8 {
        return None;
    }
    let cell = model.cell(id)?;

    if cell.edge && cell.geometry.as_ref().map_or(true, |g| g.relative) {
        let ends: Vec<Rect> = [Terminal::Source, Terminal::Target]
            .into_iter()
            .filter_map(|end| cell.terminal(end))
            .filter_map(|t| absolute_bounds(model, t, depth + 1))
            .collect();
        return ends.into_iter().reduce(union);
    }

    let mut bounds = cell.geometry.as_ref()?.bounds();
    let mut parent = cell.parent.as_ref();
    while let Some(parent_cell) = parent.and_then(|p| model.cell(p)) {
        match &parent_cell.geometry {
            Some(geo) if parent_cell.vertex => {
                bounds.x += geo.x;
                bounds.y += geo.y;
            }
            _ => break,
        }
        parent = parent_cell.parent.as_ref();
    }
    Some(bounds)
}

fn union(a: Rect, b: Rect) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    let right = (a.x + a.width).max(b.x + b.width);
    let bottom = (a.y + a.height).max(b.y + b.height);
    Rect::new(x, y, right - x, bottom - y)
}
