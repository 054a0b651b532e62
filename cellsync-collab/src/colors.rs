use std::collections::HashMap;
use uuid::Uuid;

use crate::presence::CursorColor;

/// Hands out participant colors from a palette.
///
/// A color is held from join until release; when every palette entry is
/// taken the color is derived from the session id instead.
#[derive(Debug, Clone)]
pub struct ColorAssigner {
    palette: Vec<CursorColor>,
    assigned: HashMap<Uuid, CursorColor>,
}

impl ColorAssigner {
    pub fn new(palette: Vec<CursorColor>) -> Self {
        Self {
            palette,
            assigned: HashMap::new(),
        }
    }

    /// Builds a palette from `#rrggbb` strings, skipping invalid entries.
    pub fn from_hex(palette: &[String]) -> Self {
        let colors = palette
            .iter()
            .filter_map(|hex| {
                let color = CursorColor::from_hex(hex);
                if color.is_none() {
                    log::warn!("Ignoring invalid palette color {hex:?}");
                }
                color
            })
            .collect();
        Self::new(colors)
    }

    /// Color of `session_id`, assigning one on first use.
    pub fn assign(&mut self, session_id: Uuid) -> CursorColor {
        if let Some(color) = self.assigned.get(&session_id) {
            return *color;
        }
        let color = self
            .palette
            .iter()
            .find(|c| !self.assigned.values().any(|used| used == *c))
            .copied()
            .unwrap_or_else(|| CursorColor::from_uuid(session_id));
        self.assigned.insert(session_id, color);
        color
    }

    pub fn get(&self, session_id: &Uuid) -> Option<CursorColor> {
        self.assigned.get(session_id).copied()
    }

    pub fn release(&mut self, session_id: &Uuid) {
        self.assigned.remove(session_id);
    }
}
