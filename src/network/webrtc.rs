//! WebRTC adapter for the media transport seam.
//!
//! One peer connection to the relay carries the published local audio
//! track, every remote audio track, and the "data" channel used as the
//! presence side channel. All callbacks forward into the engine through
//! the transport event stream; nothing here touches core state directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::events::{MediaStream, TransportEvent};
use super::signaling::SignalMessage;
use super::transport::MediaTransport;
use crate::{Error, StreamId};

/// Media transport over a single WebRTC peer connection.
pub struct WebRtcTransport {
    /// WebRTC API instance
    api: API,
    /// Configuration used for the peer connection
    rtc_config: RTCConfiguration,
    /// The connection to the relay, once established
    pc: Option<Arc<RTCPeerConnection>>,
    /// The presence side channel
    channel: Option<Arc<RTCDataChannel>>,
    /// Whether the side channel is currently open
    channel_open: Arc<AtomicBool>,
    /// Label for the side channel
    channel_label: String,
    /// Id of the published local stream
    local_stream: Option<StreamId>,
    /// Channel for delivering transport events to the engine
    event_tx: mpsc::Sender<TransportEvent>,
    /// Channel for outbound signaling to the relay
    signal_tx: mpsc::Sender<SignalMessage>,
    /// Inbound signaling from the relay, consumed on connect
    signal_rx: Option<mpsc::Receiver<SignalMessage>>,
}

impl WebRtcTransport {
    pub fn new(
        event_tx: mpsc::Sender<TransportEvent>,
        signal_tx: mpsc::Sender<SignalMessage>,
        signal_rx: mpsc::Receiver<SignalMessage>,
        stun_servers: Vec<String>,
        channel_label: String,
    ) -> Result<Self, Error> {
        let mut ice_servers = vec![];
        for stun_server in stun_servers {
            ice_servers.push(RTCIceServer {
                urls: vec![stun_server],
                ..Default::default()
            });
        }

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| Error::Network(format!("failed to register codecs: {}", e)))?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)
            .map_err(|e| Error::Network(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            rtc_config,
            pc: None,
            channel: None,
            channel_open: Arc::new(AtomicBool::new(false)),
            channel_label,
            local_stream: None,
            event_tx,
            signal_tx,
            signal_rx: Some(signal_rx),
        })
    }

    fn peer_connection(&self) -> Result<&Arc<RTCPeerConnection>, Error> {
        self.pc
            .as_ref()
            .ok_or_else(|| Error::InvalidState("transport is not connected".to_string()))
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn connect(&mut self) -> Result<(), Error> {
        if self.pc.is_some() {
            return Err(Error::InvalidState("transport already connected".to_string()));
        }

        let pc = self
            .api
            .new_peer_connection(self.rtc_config.clone())
            .await
            .map_err(|e| Error::Network(format!("failed to create peer connection: {}", e)))?;
        let pc = Arc::new(pc);

        // Connection state changes
        let event_tx = self.event_tx.clone();
        let channel_open = Arc::clone(&self.channel_open);
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let event_tx = event_tx.clone();
            let channel_open = Arc::clone(&channel_open);
            Box::pin(async move {
                debug!("peer connection state changed: {:?}", state);
                if matches!(
                    state,
                    RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Closed
                ) {
                    channel_open.store(false, Ordering::Relaxed);
                }
                if matches!(
                    state,
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
                ) {
                    let _ = event_tx.send(TransportEvent::Closed).await;
                }
            })
        }));

        // Outbound ICE candidates go to the relay
        let signal_tx = self.signal_tx.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signal_tx = signal_tx.clone();
            Box::pin(async move {
                if let Some(candidate) = candidate {
                    let candidate_json =
                        format!("{{\"candidate\":\"{}\"}}", candidate.to_string());
                    let _ = signal_tx
                        .send(SignalMessage::IceCandidate {
                            candidate: candidate_json,
                        })
                        .await;
                }
            })
        }));

        // Remote audio tracks
        setup_track_handler(&pc, self.event_tx.clone());

        // The relay may open the side channel from its end
        let event_tx = self.event_tx.clone();
        let channel_open = Arc::clone(&self.channel_open);
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let event_tx = event_tx.clone();
            let channel_open = Arc::clone(&channel_open);
            Box::pin(async move {
                debug!("data channel announced by remote: {}", dc.label());
                wire_data_channel(&dc, event_tx, channel_open);
            })
        }));

        // Our side channel
        let dc = pc
            .create_data_channel(&self.channel_label, None)
            .await
            .map_err(|e| Error::Network(format!("failed to create data channel: {}", e)))?;
        wire_data_channel(&dc, self.event_tx.clone(), Arc::clone(&self.channel_open));

        // Apply relay answers and candidates as they arrive
        if let Some(signal_rx) = self.signal_rx.take() {
            spawn_signal_task(Arc::clone(&pc), signal_rx, self.signal_tx.clone());
        }

        // Kick off negotiation
        let offer = pc
            .create_offer(None)
            .await
            .map_err(|e| Error::Network(format!("failed to create offer: {}", e)))?;
        pc.set_local_description(offer.clone())
            .await
            .map_err(|e| Error::Network(format!("failed to set local description: {}", e)))?;
        self.signal_tx
            .send(SignalMessage::Offer { sdp: offer.sdp })
            .await
            .map_err(|e| Error::Network(format!("failed to send offer: {}", e)))?;

        self.pc = Some(pc);
        self.channel = Some(dc);
        info!("transport connected, awaiting relay answer");
        Ok(())
    }

    async fn publish(&mut self) -> Result<StreamId, Error> {
        if self.local_stream.is_some() {
            return Err(Error::InvalidState(
                "local stream already published".to_string(),
            ));
        }
        let pc = self.peer_connection()?.clone();

        let id = StreamId::random();
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            id.as_str().to_owned(),
        ));

        let _sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::Network(format!("failed to add local track: {}", e)))?;

        info!("published local stream {}", id);
        self.local_stream = Some(id.clone());
        let _ = self
            .event_tx
            .send(TransportEvent::LocalStreamPublished { id: id.clone() })
            .await;
        Ok(id)
    }

    async fn send(&self, data: &[u8]) -> Result<(), Error> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| Error::Network("side channel not created".to_string()))?;
        if !self.is_channel_open() {
            return Err(Error::Network("side channel not open".to_string()));
        }
        channel
            .send(&data.to_vec().into())
            .await
            .map_err(|e| Error::Network(format!("failed to send on side channel: {}", e)))?;
        Ok(())
    }

    fn is_channel_open(&self) -> bool {
        self.channel.is_some() && self.channel_open.load(Ordering::Relaxed)
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.channel_open.store(false, Ordering::Relaxed);
        self.channel = None;
        if let Some(pc) = self.pc.take() {
            pc.close()
                .await
                .map_err(|e| Error::Network(format!("failed to close peer connection: {}", e)))?;
        }
        let _ = self.event_tx.send(TransportEvent::Closed).await;
        Ok(())
    }
}

/// Wire side-channel handlers onto a data channel.
fn wire_data_channel(
    dc: &Arc<RTCDataChannel>,
    event_tx: mpsc::Sender<TransportEvent>,
    channel_open: Arc<AtomicBool>,
) {
    let label = dc.label().to_string();

    let event_tx_open = event_tx.clone();
    let channel_open_on_open = Arc::clone(&channel_open);
    let label_open = label.clone();
    dc.on_open(Box::new(move || {
        let event_tx = event_tx_open.clone();
        let channel_open = Arc::clone(&channel_open_on_open);
        let label = label_open.clone();
        Box::pin(async move {
            debug!("side channel '{}' open", label);
            channel_open.store(true, Ordering::Relaxed);
            let _ = event_tx.send(TransportEvent::ChannelOpen).await;
        })
    }));

    let event_tx_message = event_tx.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let event_tx = event_tx_message.clone();
        Box::pin(async move {
            let _ = event_tx
                .send(TransportEvent::ChannelMessage {
                    data: msg.data.to_vec(),
                })
                .await;
        })
    }));

    let channel_open_on_close = Arc::clone(&channel_open);
    let label_close = label;
    dc.on_close(Box::new(move || {
        let channel_open = Arc::clone(&channel_open_on_close);
        let label = label_close.clone();
        Box::pin(async move {
            debug!("side channel '{}' closed", label);
            channel_open.store(false, Ordering::Relaxed);
        })
    }));
}

/// Set up the remote-track handler on a peer connection.
fn setup_track_handler(pc: &RTCPeerConnection, event_tx: mpsc::Sender<TransportEvent>) {
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let event_tx = event_tx.clone();
        Box::pin(async move {
            let kind = track.kind();
            if !kind.to_string().to_lowercase().contains("audio") {
                debug!("ignoring non-audio track {}", track.id());
                return;
            }

            let id = StreamId::new(track.stream_id());
            let stream = MediaStream {
                id: id.clone(),
                track_id: track.id(),
            };
            info!("remote audio track for stream {} (track {})", id, stream.track_id);
            let _ = event_tx
                .send(TransportEvent::TrackAdded {
                    id: id.clone(),
                    stream,
                })
                .await;

            spawn_track_reader(track, id, event_tx);
        })
    }));
}

/// Read RTP from a remote track until it ends, forwarding decoded audio.
fn spawn_track_reader(
    track: Arc<TrackRemote>,
    id: StreamId,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    tokio::spawn(async move {
        loop {
            match track.read_rtp().await {
                Ok((rtp_packet, _attributes)) => {
                    let samples = samples_from_payload(&rtp_packet.payload);
                    let _ = event_tx
                        .send(TransportEvent::AudioReceived {
                            id: id.clone(),
                            samples,
                        })
                        .await;
                }
                Err(err) => {
                    if err.to_string().contains("EOF") {
                        info!("audio track for stream {} ended", id);
                        let _ = event_tx
                            .send(TransportEvent::TrackRemoved { id: id.clone() })
                            .await;
                        break;
                    }
                    error!("error reading from audio track: {}", err);
                    // Avoid a tight loop on a transient read error
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }
    });
}

/// Placeholder decode: normalize payload bytes to centered samples.
/// A real Opus pipeline would replace this without touching callers.
fn samples_from_payload(payload: &[u8]) -> Vec<f32> {
    payload
        .iter()
        .map(|&b| (b as f32 / 127.5 - 1.0) * 0.5)
        .collect()
}

/// Handle signaling from the relay until the channel closes.
fn spawn_signal_task(
    pc: Arc<RTCPeerConnection>,
    mut signal_rx: mpsc::Receiver<SignalMessage>,
    signal_tx: mpsc::Sender<SignalMessage>,
) {
    tokio::spawn(async move {
        while let Some(message) = signal_rx.recv().await {
            if let Err(e) = handle_signal(&pc, &signal_tx, message).await {
                error!("signaling error: {}", e);
            }
        }
        debug!("signaling channel closed");
    });
}

async fn handle_signal(
    pc: &Arc<RTCPeerConnection>,
    signal_tx: &mpsc::Sender<SignalMessage>,
    message: SignalMessage,
) -> Result<(), Error> {
    match message {
        SignalMessage::Answer { sdp } => {
            let answer = RTCSessionDescription::answer(sdp)
                .map_err(|e| Error::Network(format!("failed to parse answer: {}", e)))?;
            pc.set_remote_description(answer)
                .await
                .map_err(|e| Error::Network(format!("failed to set remote description: {}", e)))?;
        }

        SignalMessage::Offer { sdp } => {
            // Renegotiation initiated from the relay side
            let offer = RTCSessionDescription::offer(sdp)
                .map_err(|e| Error::Network(format!("failed to parse offer: {}", e)))?;
            pc.set_remote_description(offer)
                .await
                .map_err(|e| Error::Network(format!("failed to set remote description: {}", e)))?;
            let answer = pc
                .create_answer(None)
                .await
                .map_err(|e| Error::Network(format!("failed to create answer: {}", e)))?;
            pc.set_local_description(answer.clone())
                .await
                .map_err(|e| Error::Network(format!("failed to set local description: {}", e)))?;
            let _ = signal_tx
                .send(SignalMessage::Answer { sdp: answer.sdp })
                .await;
        }

        SignalMessage::IceCandidate { candidate } => {
            let candidate_init: RTCIceCandidateInit = serde_json::from_str(&candidate)
                .map_err(|e| Error::Network(format!("failed to parse ICE candidate: {}", e)))?;
            pc.add_ice_candidate(candidate_init)
                .await
                .map_err(|e| Error::Network(format!("failed to add ICE candidate: {}", e)))?;
        }

        SignalMessage::Bye => {
            warn!("relay ended the session");
            let _ = pc.close().await;
        }
    }
    Ok(())
}
