//! Relay link for WebRTC session establishment.
//!
//! The relay is an opaque forwarder: it takes newline-delimited JSON
//! signal messages and hands them to the other side. Nothing here is
//! aware of session semantics beyond framing.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::Error;

/// Signal message types for WebRTC signaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignalMessage {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: String },
    Bye,
}

/// Bridge one relay connection to a channel pair: outbound messages are
/// written as JSON lines, inbound lines are decoded and forwarded.
/// Returns when either end closes.
pub async fn run_relay_link(
    addr: &str,
    mut outbound: mpsc::Receiver<SignalMessage>,
    inbound: mpsc::Sender<SignalMessage>,
) -> Result<(), Error> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| Error::Network(format!("failed to reach relay {}: {}", addr, e)))?;
    info!("connected to relay {}", addr);

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                let Some(message) = outgoing else { break };
                let mut line = serde_json::to_string(&message)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                line.push('\n');
                writer
                    .write_all(line.as_bytes())
                    .await
                    .map_err(|e| Error::Network(format!("relay write failed: {}", e)))?;
            }

            incoming = lines.next_line() => {
                match incoming {
                    Ok(Some(line)) => match serde_json::from_str::<SignalMessage>(&line) {
                        Ok(message) => {
                            if inbound.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("dropping malformed signal: {}", e),
                    },
                    Ok(None) => {
                        info!("relay closed the connection");
                        break;
                    }
                    Err(e) => {
                        return Err(Error::Network(format!("relay read failed: {}", e)));
                    }
                }
            }
        }
    }

    Ok(())
}
