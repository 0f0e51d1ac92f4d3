//! The local participant: listener position and outbound presence.

use log::warn;

use crate::math::Vec3;
use crate::network::protocol::PresenceUpdate;
use crate::{Error, StreamId};

/// One tick's worth of movement input on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementIntent {
    pub x: f32,
    pub z: f32,
}

impl MovementIntent {
    pub fn from_keys(forward: bool, back: bool, left: bool, right: bool) -> Self {
        let mut x = 0.0;
        let mut z = 0.0;
        if forward {
            z -= 1.0;
        }
        if back {
            z += 1.0;
        }
        if left {
            x -= 1.0;
        }
        if right {
            x += 1.0;
        }
        Self { x, z }
    }

    pub fn is_idle(&self) -> bool {
        self.x == 0.0 && self.z == 0.0
    }

    /// Unit direction for this intent, or zero when idle. Diagonals are
    /// normalized so they are no faster than straight movement.
    pub fn direction(&self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z).normalized_or_zero()
    }
}

/// Listener-side presence: integrates movement and serializes the
/// outbound snapshot. Lives for the whole session.
pub struct LocalPresence {
    position: Vec3,
    stream_id: Option<StreamId>,
    move_speed: f32,
}

impl LocalPresence {
    pub fn new(move_speed: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            stream_id: None,
            move_speed,
        }
    }

    /// Record the id assigned to the published local stream. Assigned
    /// once; a second call replaces the id and logs, since the transport
    /// should never publish twice.
    pub fn mark_published(&mut self, id: StreamId) {
        if let Some(existing) = &self.stream_id {
            warn!("local stream re-published: {} replaces {}", id, existing);
        }
        self.stream_id = Some(id);
    }

    pub fn stream_id(&self) -> Option<&StreamId> {
        self.stream_id.as_ref()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Integrate one tick of movement into the listener position.
    pub fn apply_movement(&mut self, intent: &MovementIntent) -> Vec3 {
        self.position = self.position + intent.direction().scaled(self.move_speed);
        self.position
    }

    /// Outbound wire snapshot. Requires the local stream to be published,
    /// since remote ends key everything off the stream id.
    pub fn snapshot(&self) -> Result<PresenceUpdate, Error> {
        let id = self
            .stream_id
            .clone()
            .ok_or_else(|| Error::InvalidState("local stream not yet published".to_string()))?;
        Ok(PresenceUpdate::new(id, self.position))
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.snapshot()?.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_intent_does_not_move() {
        let mut presence = LocalPresence::new(0.25);
        let intent = MovementIntent::from_keys(false, false, false, false);
        assert!(intent.is_idle());

        let position = presence.apply_movement(&intent);
        assert_eq!(position, Vec3::ZERO);
        assert!(!position.x.is_nan() && !position.z.is_nan());
    }

    #[test]
    fn single_axis_movement_uses_full_speed() {
        let mut presence = LocalPresence::new(0.25);
        let intent = MovementIntent::from_keys(false, false, false, true);

        presence.apply_movement(&intent);
        assert_eq!(presence.position(), Vec3::new(0.25, 0.0, 0.0));
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let mut presence = LocalPresence::new(1.0);
        let intent = MovementIntent::from_keys(true, false, true, false);

        let position = presence.apply_movement(&intent);
        assert!((position.length() - 1.0).abs() < 1e-6);
        assert!(position.x < 0.0 && position.z < 0.0);
    }

    #[test]
    fn opposed_keys_cancel_out() {
        let mut presence = LocalPresence::new(0.25);
        let intent = MovementIntent::from_keys(true, true, false, false);
        assert!(intent.is_idle());

        presence.apply_movement(&intent);
        assert_eq!(presence.position(), Vec3::ZERO);
    }

    #[test]
    fn snapshot_requires_publication() {
        let mut presence = LocalPresence::new(0.25);
        assert!(matches!(
            presence.snapshot(),
            Err(Error::InvalidState(_))
        ));

        presence.mark_published(StreamId::new("local"));
        let snapshot = presence.snapshot().unwrap();
        assert_eq!(snapshot.id, StreamId::new("local"));
        assert_eq!(snapshot.position, Vec3::ZERO);
    }

    #[test]
    fn encoded_snapshot_round_trips() {
        let mut presence = LocalPresence::new(0.5);
        presence.mark_published(StreamId::new("local"));
        presence.apply_movement(&MovementIntent::from_keys(false, true, false, false));

        let bytes = presence.encode().unwrap();
        let decoded = PresenceUpdate::decode(&bytes).unwrap();
        assert_eq!(decoded.position, Vec3::new(0.0, 0.0, 0.5));
    }
}
