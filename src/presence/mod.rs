//! Presence state: the local listener and the remote peer registry.

pub mod local;
pub mod registry;

pub use local::{LocalPresence, MovementIntent};
pub use registry::{PeerRecord, PeerRegistry};
