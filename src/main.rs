use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use atrium::app::config::Config;
use atrium::app::engine::Engine;
use atrium::audio::{CpalOutput, SpatialAudioGraph};
use atrium::network::signaling;
use atrium::network::transport::MediaTransport;
use atrium::network::webrtc::WebRtcTransport;
use atrium::presence::{LocalPresence, PeerRegistry};
use atrium::scene::TerminalScene;
use atrium::ui::input::KeyboardInput;
use atrium::ui::terminal;
use clap::Parser;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

/// atrium - shared virtual space with proximity voice
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Relay address for session signaling, e.g. 127.0.0.1:7000
    #[clap(short, long)]
    relay: Option<String>,

    /// STUN server for connectivity
    #[clap(long, default_value = "stun:stun.l.google.com:19302")]
    stun: String,

    /// Path to a key=value config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
        debug!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Config::from_str(&raw).map_err(|e| anyhow::anyhow!("{}", e))?
        }
        None => Config::default(),
    };
    info!("starting atrium as {}", config.username);

    // Engine plumbing
    let (event_tx, events_rx) = mpsc::channel(64);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (signal_out_tx, signal_out_rx) = mpsc::channel(32);
    let (signal_in_tx, signal_in_rx) = mpsc::channel(32);

    // Relay glue: forward signaling if a relay was given, otherwise run
    // the space solo (movement still works, nobody else shows up).
    match args.relay.clone() {
        Some(addr) => {
            tokio::spawn(async move {
                if let Err(e) = signaling::run_relay_link(&addr, signal_out_rx, signal_in_tx).await
                {
                    error!("relay link failed: {}", e);
                }
            });
        }
        None => {
            warn!("no relay configured, entering the space alone");
            tokio::spawn(async move {
                let mut signal_out_rx = signal_out_rx;
                while signal_out_rx.recv().await.is_some() {}
                drop(signal_in_tx);
            });
        }
    }

    // Collaborators
    let scene = TerminalScene::new();
    let model = scene.model();
    let output = CpalOutput::new(config.reference_distance)?;
    let registry = PeerRegistry::new(Box::new(scene), SpatialAudioGraph::new(Box::new(output)));
    let presence = LocalPresence::new(config.move_speed);
    let input = KeyboardInput::new();

    // Media transport
    let mut transport = WebRtcTransport::new(
        event_tx,
        signal_out_tx,
        signal_in_rx,
        vec![args.stun.clone()],
        config.channel_label.clone(),
    )?;
    transport.connect().await?;
    transport.publish().await?;

    let mut engine = Engine::new(
        registry,
        presence,
        Box::new(transport),
        Box::new(input.clone()),
        events_rx,
        command_rx,
        Duration::from_millis(config.tick_ms),
    );
    let engine_task = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            error!("engine exited with error: {}", e);
        }
    });

    // The terminal loop owns the foreground until the user quits
    terminal::run(model, input, command_tx).await?;
    engine_task.await?;

    info!("atrium closed");
    Ok(())
}
