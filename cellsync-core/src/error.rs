use thiserror::Error;

use crate::cell::CellId;

/// Errors raised by the graph model and the serialization codec.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown cell: {0}")]
    UnknownCell(CellId),

    #[error("Cell id already in use: {0}")]
    DuplicateId(CellId),

    #[error("Graph has no root cell")]
    MissingRoot,

    #[error("Cell {0} has no identifier")]
    Unidentified(String),

    #[error("Cell {cell} would become its own ancestor under {parent}")]
    Cycle { cell: CellId, parent: CellId },

    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}
