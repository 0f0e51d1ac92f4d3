//! Per-peer audio node lifecycle and panning updates.

use std::collections::HashMap;

use log::{debug, trace};

use super::{AudioOutput, PannerId};
use crate::math::Vec3;
use crate::network::events::MediaStream;
use crate::{Error, StreamId};

/// Attenuation falloff reference, in world units. Matches the falloff the
/// panner nodes are tuned for; not recomputed per update.
pub const REFERENCE_DISTANCE: f32 = 5.0;

/// Owns the mapping from a ready remote peer to its audio node and keeps
/// the node's panning offsets current. Panning is relative to the local
/// listener, so updates arrive from two call sites: position messages for
/// the remote peer, and every local movement tick.
pub struct SpatialAudioGraph {
    output: Box<dyn AudioOutput>,
    nodes: HashMap<StreamId, PannerId>,
}

impl SpatialAudioGraph {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            nodes: HashMap::new(),
        }
    }

    /// Build a panner node for the peer's stream and connect it to the
    /// output. At most one node per id between an attach and its matching
    /// detach.
    pub fn attach(&mut self, id: StreamId, stream: &MediaStream) -> Result<PannerId, Error> {
        if self.nodes.contains_key(&id) {
            return Err(Error::InvalidState(format!(
                "panner already attached for stream {}",
                id
            )));
        }

        let panner = self.output.create_panner()?;
        debug!("panner attached for stream {} (track {})", id, stream.track_id);
        self.nodes.insert(id, panner);
        Ok(panner)
    }

    /// Disconnect and release the node. Safe during teardown triggered by
    /// transport removal, and on handles already detached.
    pub fn detach(&mut self, panner: PannerId) {
        self.nodes.retain(|_, attached| *attached != panner);
        self.output.destroy_panner(panner);
    }

    /// Point the panner at `remote - listener` on the ground-plane axes.
    pub fn update_panning(&mut self, panner: PannerId, remote: Vec3, listener: Vec3) {
        let offset = remote - listener;
        trace!("panner {:?} offsets ({}, {})", panner, offset.x, offset.z);
        self.output.set_panner_offsets(panner, offset.x, offset.z);
    }

    /// Feed decoded samples to the node attached for `id`. Samples for
    /// streams with no node yet are dropped; a peer with audio but no
    /// known position stays silent.
    pub fn route(&mut self, id: &StreamId, samples: &[f32]) {
        if let Some(&panner) = self.nodes.get(id) {
            self.output.push_samples(panner, samples);
        }
    }

    pub fn is_attached(&self, id: &StreamId) -> bool {
        self.nodes.contains_key(id)
    }
}
