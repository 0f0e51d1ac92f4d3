//! Renderer seam and the terminal scene that implements it.
//!
//! The registry only ever talks to [`SceneRenderer`]; the terminal
//! implementation keeps a shared model that the UI thread draws from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::trace;

use crate::math::Vec3;
use crate::Error;

/// Half-extent of the walkable ground plane.
pub const GROUND_EXTENT: f32 = 25.0;

/// Opaque handle to one rendered avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvatarId(u64);

impl AvatarId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Renderer seam: create, move and destroy avatars in the shared space.
pub trait SceneRenderer: Send {
    fn create_avatar(&mut self, position: Vec3) -> Result<AvatarId, Error>;
    fn move_avatar(&mut self, avatar: AvatarId, position: Vec3);
    fn destroy_avatar(&mut self, avatar: AvatarId);

    /// Tag an avatar as the local participant so the view can highlight
    /// it. Renderers with no notion of a highlight can ignore this.
    fn mark_local(&mut self, _avatar: AvatarId) {}
}

/// One drawable entry, snapshotted for the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarSprite {
    pub position: Vec3,
    pub local: bool,
}

/// Everything currently visible in the space.
#[derive(Debug, Default)]
pub struct SceneModel {
    avatars: HashMap<AvatarId, Vec3>,
    local: Option<AvatarId>,
    next_id: u64,
}

impl SceneModel {
    /// Snapshot for drawing; ordering is irrelevant.
    pub fn sprites(&self) -> Vec<AvatarSprite> {
        self.avatars
            .iter()
            .map(|(id, position)| AvatarSprite {
                position: *position,
                local: self.local == Some(*id),
            })
            .collect()
    }

    /// Number of remote avatars currently visible.
    pub fn remote_count(&self) -> usize {
        let local = usize::from(self.local.map_or(false, |id| self.avatars.contains_key(&id)));
        self.avatars.len() - local
    }

    pub fn local_position(&self) -> Option<Vec3> {
        self.local.and_then(|id| self.avatars.get(&id).copied())
    }
}

/// Terminal-backed scene. Cloning yields another handle to the same model,
/// so the engine-side renderer and the drawing loop stay in sync.
#[derive(Clone, Default)]
pub struct TerminalScene {
    model: Arc<Mutex<SceneModel>>,
}

impl TerminalScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> Arc<Mutex<SceneModel>> {
        Arc::clone(&self.model)
    }
}

impl SceneRenderer for TerminalScene {
    fn create_avatar(&mut self, position: Vec3) -> Result<AvatarId, Error> {
        let mut model = self.model.lock().unwrap();
        let avatar = AvatarId(model.next_id);
        model.next_id += 1;
        model.avatars.insert(avatar, position);
        trace!("avatar {:?} created at {:?}", avatar, position);
        Ok(avatar)
    }

    fn move_avatar(&mut self, avatar: AvatarId, position: Vec3) {
        let mut model = self.model.lock().unwrap();
        if let Some(entry) = model.avatars.get_mut(&avatar) {
            *entry = position;
        }
    }

    fn destroy_avatar(&mut self, avatar: AvatarId) {
        let mut model = self.model.lock().unwrap();
        model.avatars.remove(&avatar);
        if model.local == Some(avatar) {
            model.local = None;
        }
    }

    fn mark_local(&mut self, avatar: AvatarId) {
        let mut model = self.model.lock().unwrap();
        model.local = Some(avatar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_move_destroy() {
        let mut scene = TerminalScene::new();
        let avatar = scene.create_avatar(Vec3::new(1.0, 0.0, 2.0)).unwrap();

        scene.move_avatar(avatar, Vec3::new(3.0, 0.0, 4.0));
        let sprites = scene.model().lock().unwrap().sprites();
        assert_eq!(sprites.len(), 1);
        assert_eq!(sprites[0].position, Vec3::new(3.0, 0.0, 4.0));

        scene.destroy_avatar(avatar);
        assert!(scene.model().lock().unwrap().sprites().is_empty());
    }

    #[test]
    fn local_marker_and_remote_count() {
        let mut scene = TerminalScene::new();
        let me = scene.create_avatar(Vec3::ZERO).unwrap();
        let other = scene.create_avatar(Vec3::new(2.0, 0.0, 5.0)).unwrap();
        scene.mark_local(me);

        let model = scene.model();
        assert_eq!(model.lock().unwrap().remote_count(), 1);
        assert_eq!(model.lock().unwrap().local_position(), Some(Vec3::ZERO));

        scene.destroy_avatar(other);
        assert_eq!(model.lock().unwrap().remote_count(), 0);
    }

    #[test]
    fn moving_unknown_avatar_is_a_noop() {
        let mut scene = TerminalScene::new();
        scene.move_avatar(AvatarId::new(42), Vec3::new(1.0, 0.0, 1.0));
        assert!(scene.model().lock().unwrap().sprites().is_empty());
    }
}
