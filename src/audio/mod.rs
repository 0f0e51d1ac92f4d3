//! Spatial audio: per-peer panner nodes driven by listener-relative offsets.

pub mod output;
pub mod spatial;

pub use output::CpalOutput;
pub use spatial::{SpatialAudioGraph, REFERENCE_DISTANCE};

use crate::Error;

/// Opaque handle to one spatial audio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PannerId(u64);

impl PannerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Device seam: spatial nodes connected to the output destination.
///
/// Offsets are the remote position relative to the listener on the X/Z
/// ground plane; the implementation derives gain and attenuation from
/// them however it likes.
pub trait AudioOutput: Send {
    fn create_panner(&mut self) -> Result<PannerId, Error>;
    fn set_panner_offsets(&mut self, panner: PannerId, dx: f32, dz: f32);
    fn push_samples(&mut self, panner: PannerId, samples: &[f32]);
    fn destroy_panner(&mut self, panner: PannerId);
}
