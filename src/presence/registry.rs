//! Reconciliation of the two per-peer event streams.
//!
//! Media attach/detach events and side-channel position updates arrive
//! independently and in either order. The registry merges both into one
//! record per stream id and derives the avatar and audio node lifecycle
//! from the merged state: a peer becomes visible and audible exactly when
//! both its stream and its position are known, and disappears when the
//! transport removes the stream. Removal is authoritative: late position
//! updates for a removed id never resurrect it.

use std::collections::HashMap;

use log::{debug, warn};

use crate::audio::{PannerId, SpatialAudioGraph};
use crate::math::Vec3;
use crate::network::events::MediaStream;
use crate::scene::{AvatarId, SceneRenderer};
use crate::{Error, StreamId};

/// State accumulated for one remote peer from both event sources.
///
/// `avatar` and `panner` are `Some` iff `stream` and `position` are both
/// `Some`; every mutation below preserves that.
#[derive(Debug)]
pub struct PeerRecord {
    id: StreamId,
    stream: Option<MediaStream>,
    position: Option<Vec3>,
    avatar: Option<AvatarId>,
    panner: Option<PannerId>,
}

impl PeerRecord {
    fn empty(id: StreamId) -> Self {
        Self {
            id,
            stream: None,
            position: None,
            avatar: None,
            panner: None,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Both halves observed; the peer can be materialized.
    pub fn is_ready(&self) -> bool {
        self.stream.is_some() && self.position.is_some()
    }

    /// Avatar and audio node currently exist.
    pub fn is_materialized(&self) -> bool {
        self.avatar.is_some()
    }

    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    pub fn avatar(&self) -> Option<AvatarId> {
        self.avatar
    }

    pub fn panner(&self) -> Option<PannerId> {
        self.panner
    }
}

/// Owns every known remote peer and drives avatar/audio lifecycle from
/// the merged event streams.
pub struct PeerRegistry {
    peers: HashMap<StreamId, PeerRecord>,
    scene: Box<dyn SceneRenderer>,
    audio: SpatialAudioGraph,
}

impl PeerRegistry {
    pub fn new(scene: Box<dyn SceneRenderer>, audio: SpatialAudioGraph) -> Self {
        Self {
            peers: HashMap::new(),
            scene,
            audio,
        }
    }

    /// A track for `id` was attached by the transport. Tolerates duplicate
    /// delivery: a second event for an attached id replaces the handle
    /// without creating a second avatar or audio node.
    pub fn on_track_added(
        &mut self,
        id: StreamId,
        stream: MediaStream,
        listener: Vec3,
    ) -> Result<(), Error> {
        let materialized = {
            let record = self
                .peers
                .entry(id.clone())
                .or_insert_with(|| PeerRecord::empty(id.clone()));
            if record.stream.is_some() {
                debug!("duplicate track event for stream {}, replacing handle", id);
            }
            record.stream = Some(stream);
            record.is_materialized()
        };

        if materialized {
            return Ok(());
        }
        self.try_materialize(&id, listener)
    }

    /// The transport removed the stream for `id`. Tears down whatever
    /// exists and forgets the record; unknown ids and repeated calls are
    /// no-ops.
    pub fn on_track_removed(&mut self, id: &StreamId) {
        let Some(mut record) = self.peers.remove(id) else {
            debug!("track removed for unknown stream {}", id);
            return;
        };

        if let Some(panner) = record.panner.take() {
            self.audio.detach(panner);
        }
        if let Some(avatar) = record.avatar.take() {
            self.scene.destroy_avatar(avatar);
        }
        debug!("peer {} removed", id);
    }

    /// A position snapshot for `id` arrived on the side channel. Creates
    /// an empty record for unseen ids, so position-before-media ordering
    /// works; for an already-materialized peer it moves the avatar and
    /// refreshes panning instead of re-creating anything.
    pub fn on_position(
        &mut self,
        id: StreamId,
        position: Vec3,
        listener: Vec3,
    ) -> Result<(), Error> {
        let (avatar, panner) = {
            let record = self
                .peers
                .entry(id.clone())
                .or_insert_with(|| PeerRecord::empty(id.clone()));
            record.position = Some(position);
            (record.avatar, record.panner)
        };

        if let (Some(avatar), Some(panner)) = (avatar, panner) {
            self.scene.move_avatar(avatar, position);
            self.audio.update_panning(panner, position, listener);
            return Ok(());
        }
        self.try_materialize(&id, listener)
    }

    /// Recompute every materialized peer's panning against the listener.
    /// Called once per tick, because panning is relative: the listener
    /// moving changes every offset even when no peer has.
    pub fn refresh_panning(&mut self, listener: Vec3) {
        for record in self.peers.values() {
            if let (Some(panner), Some(position)) = (record.panner, record.position) {
                self.audio.update_panning(panner, position, listener);
            }
        }
    }

    /// Forward decoded audio to the peer's node, if it has one yet.
    pub fn route_audio(&mut self, id: &StreamId, samples: &[f32]) {
        self.audio.route(id, samples);
    }

    /// Snapshot of all records; ordering is irrelevant.
    pub fn peers(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    pub fn get(&self, id: &StreamId) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Renderer access for the local avatar, which lives outside the
    /// remote lifecycle.
    pub fn scene_mut(&mut self) -> &mut dyn SceneRenderer {
        self.scene.as_mut()
    }

    /// Create avatar and audio node once a record has both halves. On a
    /// partial failure the created half is torn down again, so a record
    /// never holds an avatar without a node or vice versa; the peer stays
    /// unmaterialized and the next event for it retries.
    fn try_materialize(&mut self, id: &StreamId, listener: Vec3) -> Result<(), Error> {
        let (stream, position) = match self.peers.get(id) {
            Some(record) if !record.is_materialized() => {
                match (&record.stream, record.position) {
                    (Some(stream), Some(position)) => (stream.clone(), position),
                    _ => return Ok(()),
                }
            }
            _ => return Ok(()),
        };

        let avatar = self.scene.create_avatar(position)?;
        let panner = match self.audio.attach(id.clone(), &stream) {
            Ok(panner) => panner,
            Err(e) => {
                warn!("audio attach for peer {} failed, rolling back avatar", id);
                self.scene.destroy_avatar(avatar);
                return Err(e);
            }
        };
        self.audio.update_panning(panner, position, listener);

        if let Some(record) = self.peers.get_mut(id) {
            record.avatar = Some(avatar);
            record.panner = Some(panner);
        }
        debug!("peer {} is now visible and audible", id);
        Ok(())
    }
}
