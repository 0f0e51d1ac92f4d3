use async_trait::async_trait;

use crate::{Error, StreamId};

/// Seam over the media transport.
///
/// Implementations publish the local audio stream, send side-channel
/// payloads, and deliver track/channel events through the
/// [`TransportEvent`](super::TransportEvent) stream handed out at
/// construction. Event delivery is the transport's only way to call back
/// into the core, which keeps all registry mutations on the engine loop.
#[async_trait]
pub trait MediaTransport: Send {
    /// Negotiate the session and start delivering events.
    async fn connect(&mut self) -> Result<(), Error>;

    /// Publish the local audio stream and return its id. Called once per
    /// session.
    async fn publish(&mut self) -> Result<StreamId, Error>;

    /// Send one side-channel payload. Best effort; a failure here only
    /// costs the current snapshot.
    async fn send(&self, data: &[u8]) -> Result<(), Error>;

    /// Whether the side channel is currently open.
    fn is_channel_open(&self) -> bool;

    /// Tear down the session.
    async fn close(&mut self) -> Result<(), Error>;
}
