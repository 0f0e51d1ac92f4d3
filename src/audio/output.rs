//! cpal-backed implementation of the audio device seam.
//!
//! Each panner node owns a ring buffer of mono samples; the output stream
//! callback drains every node, applies its current stereo gains and mixes
//! the result into the device buffer. Gains are recomputed only when the
//! engine pushes new offsets, never per sample.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use log::{error, trace, warn};
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

use super::{AudioOutput, PannerId};
use crate::{Error, SAMPLE_RATE};

/// One second of buffered audio per peer.
const NODE_BUFFER_SAMPLES: usize = SAMPLE_RATE as usize;

struct PannerNode {
    producer: HeapProducer<f32>,
    consumer: HeapConsumer<f32>,
    left_gain: f32,
    right_gain: f32,
}

/// Spatial output device over the default cpal host.
pub struct CpalOutput {
    nodes: Arc<Mutex<HashMap<PannerId, PannerNode>>>,
    next_id: u64,
    reference_distance: f32,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device and start the mixing stream. The
    /// stream lives on its own thread because cpal streams cannot move
    /// across threads.
    pub fn new(reference_distance: f32) -> Result<Self, Error> {
        let nodes: Arc<Mutex<HashMap<PannerId, PannerNode>>> = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));

        let nodes_for_stream = Arc::clone(&nodes);
        let running_for_stream = Arc::clone(&running);
        let (startup_tx, startup_rx) = mpsc::channel::<Result<(), String>>();

        thread::spawn(move || {
            let stream = match build_stream(nodes_for_stream) {
                Ok(stream) => {
                    let _ = startup_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = startup_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!("failed to start output stream: {}", e);
                return;
            }

            while running_for_stream.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(100));
            }
        });

        startup_rx
            .recv()
            .map_err(|_| Error::Audio("output thread exited during startup".to_string()))?
            .map_err(Error::Audio)?;

        Ok(Self {
            nodes,
            next_id: 0,
            reference_distance,
            running,
        })
    }
}

fn build_stream(
    nodes: Arc<Mutex<HashMap<PannerId, PannerNode>>>,
) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "no output device available".to_string())?;
    let config = device
        .default_output_config()
        .map_err(|e| format!("no default output config: {}", e))?;

    if config.sample_format() != SampleFormat::F32 {
        return Err(format!(
            "unsupported output sample format {:?}",
            config.sample_format()
        ));
    }

    let channels = config.channels() as usize;
    let stream_config: cpal::StreamConfig = config.into();

    device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| {
                data.fill(0.0);
                let mut nodes = nodes.lock().unwrap();
                for node in nodes.values_mut() {
                    for frame in data.chunks_mut(channels) {
                        let Some(sample) = node.consumer.pop() else {
                            break;
                        };
                        if channels >= 2 {
                            frame[0] += sample * node.left_gain;
                            frame[1] += sample * node.right_gain;
                        } else {
                            frame[0] += sample * (node.left_gain + node.right_gain) * 0.5;
                        }
                    }
                }
            },
            |e| error!("output stream error: {}", e),
            None,
        )
        .map_err(|e| format!("failed to build output stream: {}", e))
}

/// Equal-power stereo gains plus inverse-distance attenuation for an
/// offset on the ground plane.
fn panner_gains(dx: f32, dz: f32, reference_distance: f32) -> (f32, f32) {
    let distance = (dx * dx + dz * dz).sqrt();
    let attenuation = reference_distance / (reference_distance + distance);

    // Convert the X offset to a pan value between -1.0 (full left)
    // and 1.0 (full right), then spread it over a quarter circle.
    let pan = dx.clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * std::f32::consts::PI / 4.0;
    (angle.cos() * attenuation, angle.sin() * attenuation)
}

impl AudioOutput for CpalOutput {
    fn create_panner(&mut self) -> Result<PannerId, Error> {
        let (producer, consumer) = HeapRb::<f32>::new(NODE_BUFFER_SAMPLES).split();
        let (left_gain, right_gain) = panner_gains(0.0, 0.0, self.reference_distance);

        let panner = PannerId::new(self.next_id);
        self.next_id += 1;
        self.nodes.lock().unwrap().insert(
            panner,
            PannerNode {
                producer,
                consumer,
                left_gain,
                right_gain,
            },
        );
        Ok(panner)
    }

    fn set_panner_offsets(&mut self, panner: PannerId, dx: f32, dz: f32) {
        let (left_gain, right_gain) = panner_gains(dx, dz, self.reference_distance);
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.get_mut(&panner) {
            node.left_gain = left_gain;
            node.right_gain = right_gain;
        }
    }

    fn push_samples(&mut self, panner: PannerId, samples: &[f32]) {
        let mut nodes = self.nodes.lock().unwrap();
        let Some(node) = nodes.get_mut(&panner) else {
            warn!("samples for unknown panner {:?} dropped", panner);
            return;
        };
        let pushed = node.producer.push_slice(samples);
        if pushed < samples.len() {
            trace!(
                "panner {:?} buffer full, dropped {} samples",
                panner,
                samples.len() - pushed
            );
        }
    }

    fn destroy_panner(&mut self, panner: PannerId) {
        self.nodes.lock().unwrap().remove(&panner);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
