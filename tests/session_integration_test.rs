//! End-to-end session tests: a spawned engine fed transport events,
//! rendering into the real terminal scene model.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;

use atrium::audio::{AudioOutput, PannerId, SpatialAudioGraph};
use atrium::network::events::{MediaStream, TransportEvent};
use atrium::network::protocol::PresenceUpdate;
use atrium::network::transport::MediaTransport;
use atrium::presence::MovementIntent;
use atrium::scene::TerminalScene;
use atrium::ui::input::InputSource;
use atrium::{Engine, EngineCommand, LocalPresence, PeerRegistry, StreamId, Vec3};

#[derive(Default)]
struct OutputLog {
    next_id: u64,
    offsets: HashMap<PannerId, (f32, f32)>,
    destroyed: usize,
}

#[derive(Clone, Default)]
struct FakeOutput {
    log: Arc<Mutex<OutputLog>>,
}

impl AudioOutput for FakeOutput {
    fn create_panner(&mut self) -> Result<PannerId, atrium::Error> {
        let mut log = self.log.lock().unwrap();
        let panner = PannerId::new(log.next_id);
        log.next_id += 1;
        log.offsets.insert(panner, (0.0, 0.0));
        Ok(panner)
    }

    fn set_panner_offsets(&mut self, panner: PannerId, dx: f32, dz: f32) {
        self.log.lock().unwrap().offsets.insert(panner, (dx, dz));
    }

    fn push_samples(&mut self, _panner: PannerId, _samples: &[f32]) {}

    fn destroy_panner(&mut self, panner: PannerId) {
        let mut log = self.log.lock().unwrap();
        log.offsets.remove(&panner);
        log.destroyed += 1;
    }
}

#[derive(Clone, Default)]
struct FakeTransport {
    open: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn connect(&mut self) -> Result<(), atrium::Error> {
        Ok(())
    }

    async fn publish(&mut self) -> Result<StreamId, atrium::Error> {
        Ok(StreamId::new("local"))
    }

    async fn send(&self, data: &[u8]) -> Result<(), atrium::Error> {
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn is_channel_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn close(&mut self) -> Result<(), atrium::Error> {
        self.open.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct ScriptedInput {
    queue: Arc<Mutex<VecDeque<MovementIntent>>>,
}

impl ScriptedInput {
    fn push(&self, intent: MovementIntent) {
        self.queue.lock().unwrap().push_back(intent);
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self) -> MovementIntent {
        self.queue.lock().unwrap().pop_front().unwrap_or_default()
    }
}

struct Session {
    event_tx: mpsc::Sender<TransportEvent>,
    command_tx: mpsc::Sender<EngineCommand>,
    model: Arc<Mutex<atrium::scene::SceneModel>>,
    output: Arc<Mutex<OutputLog>>,
    transport: FakeTransport,
    input: ScriptedInput,
    task: tokio::task::JoinHandle<()>,
}

fn start_session(move_speed: f32) -> Session {
    let scene = TerminalScene::new();
    let model = scene.model();
    let output = FakeOutput::default();
    let output_log = output.log.clone();
    let transport = FakeTransport::default();
    let input = ScriptedInput::default();

    let registry = PeerRegistry::new(Box::new(scene), SpatialAudioGraph::new(Box::new(output)));
    let (event_tx, events_rx) = mpsc::channel(64);
    let (command_tx, command_rx) = mpsc::channel(8);

    let mut engine = Engine::new(
        registry,
        LocalPresence::new(move_speed),
        Box::new(transport.clone()),
        Box::new(input.clone()),
        events_rx,
        command_rx,
        Duration::from_millis(10),
    );
    let task = tokio::spawn(async move {
        engine.run().await.unwrap();
    });

    Session {
        event_tx,
        command_tx,
        model,
        output: output_log,
        transport,
        input,
        task,
    }
}

fn media_stream(id: &str) -> MediaStream {
    MediaStream {
        id: StreamId::new(id),
        track_id: "t0".to_string(),
    }
}

async fn settle() {
    sleep(Duration::from_millis(80)).await;
}

#[tokio::test]
async fn peers_join_in_either_order_and_leave_cleanly() {
    let session = start_session(0.25);

    session
        .event_tx
        .send(TransportEvent::LocalStreamPublished {
            id: StreamId::new("local"),
        })
        .await
        .unwrap();

    // Peer A: media before position. Peer B: position before media.
    session
        .event_tx
        .send(TransportEvent::TrackAdded {
            id: StreamId::new("A"),
            stream: media_stream("A"),
        })
        .await
        .unwrap();
    session
        .event_tx
        .send(TransportEvent::ChannelMessage {
            data: br#"{"id":"B","position":{"x":-3.0,"y":0.0,"z":1.0}}"#.to_vec(),
        })
        .await
        .unwrap();
    settle().await;

    // Neither peer has both halves yet
    assert_eq!(session.model.lock().unwrap().remote_count(), 0);

    session
        .event_tx
        .send(TransportEvent::ChannelMessage {
            data: br#"{"id":"A","position":{"x":2.0,"y":0.0,"z":5.0}}"#.to_vec(),
        })
        .await
        .unwrap();
    session
        .event_tx
        .send(TransportEvent::TrackAdded {
            id: StreamId::new("B"),
            stream: media_stream("B"),
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(session.model.lock().unwrap().remote_count(), 2);
    {
        let offsets: Vec<(f32, f32)> = session
            .output
            .lock()
            .unwrap()
            .offsets
            .values()
            .copied()
            .collect();
        assert!(offsets.contains(&(2.0, 5.0)));
        assert!(offsets.contains(&(-3.0, 1.0)));
    }

    // A leaves; a stale position update for A changes nothing
    session
        .event_tx
        .send(TransportEvent::TrackRemoved {
            id: StreamId::new("A"),
        })
        .await
        .unwrap();
    session
        .event_tx
        .send(TransportEvent::ChannelMessage {
            data: br#"{"id":"A","position":{"x":9.0,"y":0.0,"z":9.0}}"#.to_vec(),
        })
        .await
        .unwrap();
    settle().await;

    assert_eq!(session.model.lock().unwrap().remote_count(), 1);
    assert_eq!(session.output.lock().unwrap().destroyed, 1);

    session
        .command_tx
        .send(EngineCommand::Shutdown)
        .await
        .unwrap();
    session.task.await.unwrap();
}

#[tokio::test]
async fn movement_is_broadcast_and_shifts_panning() {
    let session = start_session(3.0);

    session
        .event_tx
        .send(TransportEvent::LocalStreamPublished {
            id: StreamId::new("local"),
        })
        .await
        .unwrap();
    session
        .event_tx
        .send(TransportEvent::TrackAdded {
            id: StreamId::new("A"),
            stream: media_stream("A"),
        })
        .await
        .unwrap();
    session
        .event_tx
        .send(TransportEvent::ChannelMessage {
            data: br#"{"id":"A","position":{"x":10.0,"y":0.0,"z":0.0}}"#.to_vec(),
        })
        .await
        .unwrap();
    settle().await;

    // One step to the right at speed 3.0, with the channel open
    session.transport.open.store(true, Ordering::Relaxed);
    session.input.push(MovementIntent { x: 1.0, z: 0.0 });
    settle().await;

    // The broadcast snapshots carry the listener's new position
    let sent = session.transport.sent.lock().unwrap();
    assert!(!sent.is_empty());
    let last = PresenceUpdate::decode(sent.last().unwrap()).unwrap();
    assert_eq!(last.id, StreamId::new("local"));
    assert_eq!(last.position, Vec3::new(3.0, 0.0, 0.0));
    drop(sent);

    // Peer A's panning followed the listener without any message from A
    let offsets: Vec<(f32, f32)> = session
        .output
        .lock()
        .unwrap()
        .offsets
        .values()
        .copied()
        .collect();
    assert_eq!(offsets, vec![(7.0, 0.0)]);

    // Local avatar tracked the movement too
    assert_eq!(
        session.model.lock().unwrap().local_position(),
        Some(Vec3::new(3.0, 0.0, 0.0))
    );

    session
        .command_tx
        .send(EngineCommand::Shutdown)
        .await
        .unwrap();
    session.task.await.unwrap();
}
