// Atrium: shared virtual space with proximity voice
// Expose public modules for use in integration tests

pub mod app;
pub mod audio;
pub mod error;
pub mod math;
pub mod network;
pub mod presence;
pub mod scene;
pub mod ui;

use serde::{Deserialize, Serialize};

// Re-export commonly used types for convenience
pub use app::engine::{Engine, EngineCommand, EnginePhase};
pub use error::Error;
pub use math::Vec3;
pub use presence::{LocalPresence, MovementIntent, PeerRegistry};

// Basic audio format definitions
pub const SAMPLE_RATE: u32 = 48000;
pub const CHANNELS: u16 = 1;

/// Identifier correlating a remote peer across both event sources.
/// The media transport reports it for each track, and side-channel
/// presence messages carry the same value, so the two streams can be
/// merged into one peer record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for the locally published stream.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only the first 8 characters for brevity
        write!(f, "{}", &self.0[..self.0.len().min(8)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_display_is_truncated() {
        let id = StreamId::random();
        assert_eq!(format!("{}", id).len(), 8);

        let short = StreamId::new("ab");
        assert_eq!(format!("{}", short), "ab");
    }

    #[test]
    fn stream_id_equality() {
        let id1 = StreamId::new("stream-a");
        let id2 = StreamId::new("stream-a");
        let id3 = StreamId::new("stream-b");
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }
}
