//! Network layer: transport seam, wire protocol and the WebRTC adapter.

pub mod events;
pub mod protocol;
pub mod signaling;
pub mod transport;
pub mod webrtc;

pub use events::{MediaStream, TransportEvent};
pub use protocol::PresenceUpdate;
pub use signaling::SignalMessage;
pub use transport::MediaTransport;
pub use webrtc::WebRtcTransport;
