use crate::StreamId;

/// Cheap, cloneable handle to a remote media stream announced by the
/// transport. Decoded audio for the stream arrives separately as
/// [`TransportEvent::AudioReceived`], keyed by the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// Stream id, shared with side-channel presence messages.
    pub id: StreamId,
    /// Track id within the stream, for diagnostics.
    pub track_id: String,
}

/// Events emitted by the media transport to the engine.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The local stream has been published; the session may go active.
    LocalStreamPublished {
        /// Id assigned to the local stream
        id: StreamId,
    },

    /// A remote audio track appeared.
    TrackAdded {
        /// Id of the remote stream
        id: StreamId,
        /// Handle to the stream
        stream: MediaStream,
    },

    /// A remote stream went away. Authoritative and final for that id
    /// until the transport reports it again.
    TrackRemoved {
        /// Id of the removed stream
        id: StreamId,
    },

    /// The side channel is open for presence snapshots.
    ChannelOpen,

    /// A raw side-channel payload arrived.
    ChannelMessage {
        /// Undecoded message bytes
        data: Vec<u8>,
    },

    /// Decoded audio for a remote stream.
    AudioReceived {
        /// Id of the originating stream
        id: StreamId,
        /// Mono samples
        samples: Vec<f32>,
    },

    /// The transport shut down.
    Closed,
}
