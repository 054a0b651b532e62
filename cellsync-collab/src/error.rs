use cellsync_core::{CellId, CoreError};
use thiserror::Error;

use crate::shared::{DocError, DocPath};

/// Errors raised while translating between the graph and its mirror.
///
/// None of these reach the host: the session logs and skips the edit that
/// caused them.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Replacing the graph root is not supported")]
    UnsupportedRootChange,

    #[error("Malformed mirror record for {cell}: {reason}")]
    MalformedRecord { cell: CellId, reason: String },

    #[error("Cell {0} is not bound to a mirror entry")]
    Unbound(CellId),

    #[error("Unexpected document event at {0}")]
    UnexpectedEvent(DocPath),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Doc(#[from] DocError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Protocol(#[from] crate::protocol::ProtocolError),
}

/// Errors of the presence channel.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("Awareness encode error: {0}")]
    Encode(String),

    #[error("Awareness decode error: {0}")]
    Decode(String),
}

/// Error a [`crate::events::SyncListener`] may return. Logged, never
/// propagated.
#[derive(Debug, Error)]
#[error("Listener failed: {0}")]
pub struct ListenerError(pub String);
