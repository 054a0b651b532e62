use yrs::updates::decoder::Decode;
use yrs::Update;

use super::DocError;

/// Unit of replication: one local transaction, encoded as a v1 yrs update.
///
/// Updates commute. A replica may receive them in any order and more than
/// once; an update whose dependencies are missing waits inside the
/// document until they arrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocUpdate(Vec<u8>);

impl DocUpdate {
    pub(crate) fn new(payload: Vec<u8>) -> Self {
        Self(payload)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        self.0.clone()
    }

    /// Wraps bytes received from a peer after checking that they decode.
    pub fn decode(bytes: &[u8]) -> Result<Self, DocError> {
        Update::decode_v1(bytes).map_err(|e| DocError::Decode(e.to_string()))?;
        Ok(Self(bytes.to_vec()))
    }

    pub(crate) fn to_update(&self) -> Result<Update, DocError> {
        Update::decode_v1(&self.0).map_err(|e| DocError::Decode(e.to_string()))
    }
}

/// Full replica state for bootstrapping a new participant: the whole
/// document encoded as one update against an empty state vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocSnapshot(Vec<u8>);

impl DocSnapshot {
    pub(crate) fn new(payload: Vec<u8>) -> Self {
        Self(payload)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn encode(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DocError> {
        Update::decode_v1(bytes).map_err(|e| DocError::Decode(e.to_string()))?;
        Ok(Self(bytes.to_vec()))
    }

    pub(crate) fn to_update(&self) -> Result<Update, DocError> {
        Update::decode_v1(&self.0).map_err(|e| DocError::Decode(e.to_string()))
    }
}
