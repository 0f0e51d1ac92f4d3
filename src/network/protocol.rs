use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::{Error, StreamId};

/// Full-snapshot presence message carried by the side channel.
///
/// Last write wins: there are no sequence numbers and no acks, so a lost
/// or reordered message is simply superseded by the next snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub id: StreamId,
    pub position: Vec3,
}

impl PresenceUpdate {
    pub fn new(id: StreamId, position: Vec3) -> Self {
        Self { id, position }
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
    }
}
