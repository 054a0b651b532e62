//! Envelope carrying document updates and awareness messages between
//! sessions.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌──────────┬───────────┬──────────┐
//! │ msg_type │ peer_id   │ payload  │
//! │ 1 byte   │ 16 bytes  │ variable │
//! └──────────┴───────────┴──────────┘
//! ```
//!
//! `Update` payloads are raw v1 yrs updates ([`DocUpdate`]), `Awareness`
//! payloads are bincode-encoded [`AwarenessMessage`]s.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::presence::AwarenessMessage;
use crate::shared::DocUpdate;

/// Message types for the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Replicated document update
    Update = 1,
    /// Roster / presence state change
    Awareness = 2,
}

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub msg_type: MessageType,
    pub peer_id: Uuid,
    pub payload: Vec<u8>,
}

impl SyncMessage {
    pub fn update(peer_id: Uuid, update: &DocUpdate) -> Self {
        Self {
            msg_type: MessageType::Update,
            peer_id,
            payload: update.encode(),
        }
    }

    pub fn awareness(peer_id: Uuid, msg: &AwarenessMessage) -> Result<Self, ProtocolError> {
        let payload = msg
            .encode()
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Ok(Self {
            msg_type: MessageType::Awareness,
            peer_id,
            payload,
        })
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(msg)
    }

    /// Parse an update payload. Bytes that are not a valid update are
    /// rejected here, before they reach a document.
    pub fn doc_update(&self) -> Result<DocUpdate, ProtocolError> {
        if self.msg_type != MessageType::Update {
            return Err(ProtocolError::InvalidMessageType);
        }
        DocUpdate::decode(&self.payload).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Parse an awareness payload.
    pub fn awareness_message(&self) -> Result<AwarenessMessage, ProtocolError> {
        if self.msg_type != MessageType::Awareness {
            return Err(ProtocolError::InvalidMessageType);
        }
        AwarenessMessage::decode(&self.payload)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Invalid message type")]
    InvalidMessageType,
}
