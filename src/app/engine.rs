//! The per-frame sync loop.
//!
//! One `select!` loop owns all mutable state: transport events mutate the
//! registry, commands drive shutdown, and the tick advances the local
//! listener and everything derived from it. Callbacks never touch state
//! directly, so a tick can never observe a half-applied event.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::network::events::TransportEvent;
use crate::network::protocol::PresenceUpdate;
use crate::network::transport::MediaTransport;
use crate::presence::{LocalPresence, PeerRegistry};
use crate::scene::AvatarId;
use crate::ui::input::InputSource;
use crate::{Error, StreamId};

/// Commands that can be sent to the engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Stop the loop and tear the session down
    Shutdown,
}

/// Session lifecycle for the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Waiting for the local stream to be published
    Idle,
    /// Publishing presence and rendering peers
    Active,
    /// Session ended
    Stopped,
}

/// Drives the session: merges transport events into the registry and
/// advances the local listener once per tick.
pub struct Engine {
    phase: EnginePhase,
    registry: PeerRegistry,
    presence: LocalPresence,
    transport: Box<dyn MediaTransport>,
    input: Box<dyn InputSource>,
    local_avatar: Option<AvatarId>,
    events_rx: mpsc::Receiver<TransportEvent>,
    command_rx: mpsc::Receiver<EngineCommand>,
    tick: Duration,
}

impl Engine {
    pub fn new(
        registry: PeerRegistry,
        presence: LocalPresence,
        transport: Box<dyn MediaTransport>,
        input: Box<dyn InputSource>,
        events_rx: mpsc::Receiver<TransportEvent>,
        command_rx: mpsc::Receiver<EngineCommand>,
        tick: Duration,
    ) -> Self {
        Self {
            phase: EnginePhase::Idle,
            registry,
            presence,
            transport,
            input,
            local_avatar: None,
            events_rx,
            command_rx,
            tick,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Run until shutdown, processing commands, transport events and
    /// ticks. Event and tick errors are logged, never fatal.
    pub async fn run(&mut self) -> Result<(), Error> {
        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("engine running, waiting for local stream");

        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    match command {
                        EngineCommand::Shutdown => {
                            info!("received shutdown command, stopping engine");
                            self.stop().await;
                            break;
                        }
                    }
                }

                Some(event) = self.events_rx.recv() => {
                    if let Err(e) = self.handle_transport_event(event) {
                        error!("error handling transport event: {}", e);
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.on_tick().await {
                        error!("tick failed: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn stop(&mut self) {
        self.phase = EnginePhase::Stopped;
        if let Err(e) = self.transport.close().await {
            warn!("transport close failed: {}", e);
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), Error> {
        match event {
            TransportEvent::LocalStreamPublished { id } => self.activate(id),

            TransportEvent::TrackAdded { id, stream } => {
                info!("remote stream {} attached", id);
                self.registry
                    .on_track_added(id, stream, self.presence.position())
            }

            TransportEvent::TrackRemoved { id } => {
                info!("remote stream {} removed", id);
                self.registry.on_track_removed(&id);
                Ok(())
            }

            TransportEvent::ChannelOpen => {
                debug!("side channel open");
                Ok(())
            }

            TransportEvent::ChannelMessage { data } => match PresenceUpdate::decode(&data) {
                Ok(update) => self.registry.on_position(
                    update.id,
                    update.position,
                    self.presence.position(),
                ),
                Err(e) => {
                    warn!("dropping malformed presence message: {}", e);
                    Ok(())
                }
            },

            TransportEvent::AudioReceived { id, samples } => {
                self.registry.route_audio(&id, &samples);
                Ok(())
            }

            TransportEvent::Closed => {
                info!("transport closed");
                self.phase = EnginePhase::Stopped;
                Ok(())
            }
        }
    }

    /// Local media and channel setup completed: enter the space.
    fn activate(&mut self, id: StreamId) -> Result<(), Error> {
        if self.phase != EnginePhase::Idle {
            warn!("ignoring local stream event in phase {:?}", self.phase);
            return Ok(());
        }

        self.presence.mark_published(id.clone());
        let avatar = self
            .registry
            .scene_mut()
            .create_avatar(self.presence.position())?;
        self.registry.scene_mut().mark_local(avatar);
        self.local_avatar = Some(avatar);
        self.phase = EnginePhase::Active;
        info!("local stream {} published, session active", id);
        Ok(())
    }

    /// One simulation tick: sample input, advance the listener, move the
    /// local avatar, refresh all panning, broadcast the snapshot.
    async fn on_tick(&mut self) -> Result<(), Error> {
        if self.phase != EnginePhase::Active {
            return Ok(());
        }

        let intent = self.input.sample();
        let position = self.presence.apply_movement(&intent);

        if let Some(avatar) = self.local_avatar {
            self.registry.scene_mut().move_avatar(avatar, position);
        }

        // Panning is listener-relative, so every offset is stale the
        // moment we move, not only when a peer does.
        self.registry.refresh_panning(position);

        if self.transport.is_channel_open() {
            let payload = self.presence.encode()?;
            if let Err(e) = self.transport.send(&payload).await {
                // Next tick carries a full snapshot anyway
                debug!("presence broadcast skipped: {}", e);
            }
        }

        Ok(())
    }
}
