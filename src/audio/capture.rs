//! Microphone capture pipeline.
//!
//! Opens the default input device at 16 kHz mono, accumulates samples into
//! fixed 4096-sample frames, and hands each frame to the session over a
//! bounded channel. The cpal stream is not `Send`, so it lives on a
//! dedicated thread for its whole life; the returned handle stops it.

use std::sync::mpsc as std_mpsc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioFrame, CAPTURE_FRAME_SAMPLES, CAPTURE_SAMPLE_RATE};
use crate::errors::SetupError;

/// Buffered capture frames before backpressure drops kick in.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Source of microphone frames.
///
/// Acquiring the device must fail fast: a session that cannot hear the
/// user should never get as far as opening a connection.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn start(
        &self,
    ) -> Result<(tokio::sync::mpsc::Receiver<AudioFrame>, CaptureHandle), SetupError>;
}

/// Keeps the capture stream alive; drop to release the microphone.
pub struct CaptureHandle {
    stop_tx: Option<std_mpsc::Sender<()>>,
}

impl CaptureHandle {
    /// Handle with nothing behind it, for sources that have no device.
    pub fn noop() -> Self {
        Self { stop_tx: None }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Production capture source backed by the default cpal input device.
pub struct CpalCapture;

#[async_trait]
impl CaptureSource for CpalCapture {
    async fn start(
        &self,
    ) -> Result<(tokio::sync::mpsc::Receiver<AudioFrame>, CaptureHandle), SetupError> {
        let (frame_tx, frame_rx) = tokio::sync::mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), String>>();

        std::thread::spawn(move || {
            run_capture_thread(frame_tx, stop_rx, ready_tx);
        });

        // The device open happens on the stream thread; wait for its verdict.
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| SetupError::InputDeviceUnavailable(e.to_string()))?;
        match ready {
            Ok(Ok(())) => Ok((
                frame_rx,
                CaptureHandle {
                    stop_tx: Some(stop_tx),
                },
            )),
            Ok(Err(e)) => Err(SetupError::InputDeviceUnavailable(e)),
            Err(_) => Err(SetupError::InputDeviceUnavailable(
                "capture thread failed to start".to_string(),
            )),
        }
    }
}

fn run_capture_thread(
    frame_tx: tokio::sync::mpsc::Sender<AudioFrame>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: std_mpsc::Sender<Result<(), String>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err("no input device".to_string()));
            return;
        }
    };
    let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());

    let supported = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("{}: {}", name, e)));
            return;
        }
    };
    let channels = supported.channels();
    let sample_format = supported.sample_format();
    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(CAPTURE_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut framer = Framer::new(channels as usize, frame_tx);
    let err_fn = |err| error!("audio input stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                framer.push(data.iter().copied());
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                framer.push(data.iter().map(|&s| s as f32 / 32768.0));
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                framer.push(data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0));
            },
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            &config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                framer.push(data.iter().map(|&s| s as f32 / i32::MAX as f32));
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(format!("{}: unsupported sample format {:?}", name, other)));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("{}: {}", name, e)));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("{}: {}", name, e)));
        return;
    }
    info!(device = %name, channels, "capture started");
    let _ = ready_tx.send(Ok(()));

    let _ = stop_rx.recv();
    debug!(device = %name, "capture stopped");
}

/// Accumulates interleaved device samples into fixed mono frames.
///
/// Multi-channel devices contribute channel 0 only. When the session falls
/// behind, whole frames are dropped rather than blocking the audio thread.
struct Framer {
    channels: usize,
    phase: usize,
    pending: Vec<f32>,
    frame_tx: tokio::sync::mpsc::Sender<AudioFrame>,
    dropped: u64,
}

impl Framer {
    fn new(channels: usize, frame_tx: tokio::sync::mpsc::Sender<AudioFrame>) -> Self {
        Self {
            channels,
            phase: 0,
            pending: Vec::with_capacity(CAPTURE_FRAME_SAMPLES),
            frame_tx,
            dropped: 0,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = f32>) {
        for s in samples {
            if self.phase == 0 {
                self.pending.push(s);
            }
            self.phase = (self.phase + 1) % self.channels;

            if self.pending.len() == CAPTURE_FRAME_SAMPLES {
                let frame = AudioFrame::new(
                    std::mem::replace(
                        &mut self.pending,
                        Vec::with_capacity(CAPTURE_FRAME_SAMPLES),
                    ),
                    CAPTURE_SAMPLE_RATE,
                );
                if self.frame_tx.try_send(frame).is_err() {
                    self.dropped += 1;
                    if self.dropped.is_power_of_two() {
                        warn!(total = self.dropped, "capture frame dropped, session not keeping up");
                    }
                }
            }
        }
    }
}
