use serde::Deserialize;

use crate::ids::RandomIdGenerator;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Length of generated cell ids.
    pub id_length: usize,
    /// Stroke width of remote selection highlights.
    pub highlight_stroke_width: f64,
    /// Participant colors, `#rrggbb`, handed out in order.
    pub palette: Vec<String>,
    /// Whether local pointer motion is published.
    pub publish_pointer: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            id_length: RandomIdGenerator::DEFAULT_LENGTH,
            highlight_stroke_width: 3.0,
            palette: [
                "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6",
                "#bfef45",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            publish_pointer: true,
        }
    }
}

impl SyncConfig {
    /// Parses a JSON config; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
