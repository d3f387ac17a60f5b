//! Gapless playback scheduling for model-generated speech.
//!
//! Frames arrive asynchronously and at irregular intervals; the scheduler
//! guarantees strictly sequential output by starting each decoded buffer at
//! `max(next_start, clock.now())` and advancing `next_start` by the buffer
//! duration. A barge-in stops everything in flight at once.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::audio::pcm;
use crate::errors::{DecodeError, SetupError};

/// Monotonic output clock, in seconds.
pub trait OutputClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Completion callback invoked when a buffer finishes playing naturally.
/// May fire on the sink's own thread, off the session event loop.
pub type CompletionFn = Box<dyn FnOnce() + Send>;

/// Audio output seam.
///
/// `play` enqueues a buffer that the scheduler has already sequenced;
/// `stop_all` discards everything in flight without firing completions.
pub trait AudioSink: Send + Sync {
    fn play(&self, id: u64, samples: Vec<f32>, start_at: f64, on_done: CompletionFn);
    fn stop_all(&self);
}

/// One scheduled output buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackHandle {
    pub id: u64,
    pub start: f64,
    pub duration: f64,
}

/// Schedules decoded speech frames for back-to-back output.
///
/// Owned by the session controller task; only the active set is shared
/// with the sink's completion callbacks, guarded by a mutex so an
/// interruption-triggered clear cannot race a natural-completion removal.
pub struct PlaybackScheduler {
    clock: Arc<dyn OutputClock>,
    sink: Arc<dyn AudioSink>,
    sample_rate: u32,
    next_start: f64,
    next_id: u64,
    active: Arc<Mutex<HashMap<u64, PlaybackHandle>>>,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn OutputClock>, sink: Arc<dyn AudioSink>, sample_rate: u32) -> Self {
        Self {
            clock,
            sink,
            sample_rate,
            next_start: 0.0,
            next_id: 0,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Decode a 16-bit PCM frame and schedule it for gapless output.
    ///
    /// A malformed frame is dropped without touching scheduler state.
    pub fn schedule(&mut self, frame: &[u8]) -> Result<PlaybackHandle, DecodeError> {
        let samples = pcm::decode_i16le_to_f32(frame)?;
        let start = self.next_start.max(self.clock.now());
        let duration = samples.len() as f64 / self.sample_rate as f64;
        let id = self.next_id;
        self.next_id += 1;

        let handle = PlaybackHandle {
            id,
            start,
            duration,
        };
        self.active.lock().insert(id, handle);

        let active = Arc::clone(&self.active);
        self.sink.play(
            id,
            samples,
            start,
            Box::new(move || {
                active.lock().remove(&id);
            }),
        );

        self.next_start = start + duration;
        debug!(id, start, duration, "scheduled playback buffer");
        Ok(handle)
    }

    /// Barge-in: stop every in-flight buffer, clear the active set, and
    /// reset the output cursor so the next frame starts at the clock's
    /// current position.
    pub fn interrupt(&mut self) {
        self.sink.stop_all();
        let dropped = {
            let mut active = self.active.lock();
            let n = active.len();
            active.clear();
            n
        };
        self.next_start = 0.0;
        if dropped > 0 {
            info!(dropped, "playback interrupted");
        }
    }

    /// Number of buffers scheduled or playing.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

// ---------------------------------------------------------------------------
// cpal sink
// ---------------------------------------------------------------------------

struct QueuedBuffer {
    samples: Vec<f32>,
    pos: usize,
    on_done: Option<CompletionFn>,
}

struct SinkShared {
    queue: VecDeque<QueuedBuffer>,
    consumed: u64,
}

/// Production sink: drains scheduled buffers into a mono cpal output
/// stream and derives the output clock from samples consumed.
///
/// The stream lives on a dedicated thread because `cpal::Stream` is not
/// `Send`; dropping the handle returned by [`CpalSink::start`] stops it.
pub struct CpalSink {
    shared: Arc<Mutex<SinkShared>>,
    sample_rate: u32,
}

/// Keeps the output stream thread alive; drop to release the device.
pub struct SinkHandle {
    stop_tx: std_mpsc::Sender<()>,
}

impl Drop for SinkHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

impl CpalSink {
    /// Open the default output device at the given rate (mono).
    pub fn start(sample_rate: u32) -> Result<(Arc<Self>, SinkHandle), SetupError> {
        let shared = Arc::new(Mutex::new(SinkShared {
            queue: VecDeque::new(),
            consumed: 0,
        }));
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), String>>();

        let thread_shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err("no output device".to_string()));
                    return;
                }
            };
            let config = StreamConfig {
                channels: 1,
                sample_rate: SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let cb_shared = Arc::clone(&thread_shared);
            let stream = device.build_output_stream(
                &config,
                move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut finished: Vec<CompletionFn> = Vec::new();
                    {
                        let mut shared = cb_shared.lock();
                        for slot in output.iter_mut() {
                            *slot = loop {
                                match shared.queue.front_mut() {
                                    Some(buf) if buf.pos < buf.samples.len() => {
                                        let s = buf.samples[buf.pos];
                                        buf.pos += 1;
                                        break s;
                                    }
                                    Some(_) => {
                                        let mut done = shared.queue.pop_front();
                                        if let Some(cb) =
                                            done.as_mut().and_then(|b| b.on_done.take())
                                        {
                                            finished.push(cb);
                                        }
                                    }
                                    None => break 0.0,
                                }
                            };
                        }
                        shared.consumed += output.len() as u64;
                    }
                    for cb in finished {
                        cb();
                    }
                },
                |err| error!("audio output stream error: {}", err),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Hold the stream until the handle is dropped.
            let _ = stop_rx.recv();
            debug!("output stream thread exiting");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SetupError::OutputDeviceUnavailable(e)),
            Err(_) => {
                return Err(SetupError::OutputDeviceUnavailable(
                    "output thread failed to start".to_string(),
                ))
            }
        }

        Ok((
            Arc::new(Self {
                shared,
                sample_rate,
            }),
            SinkHandle { stop_tx },
        ))
    }
}

impl OutputClock for CpalSink {
    fn now(&self) -> f64 {
        self.shared.lock().consumed as f64 / self.sample_rate as f64
    }
}

impl AudioSink for CpalSink {
    fn play(&self, _id: u64, samples: Vec<f32>, _start_at: f64, on_done: CompletionFn) {
        // The scheduler already sequences buffers; FIFO order realizes the
        // start times it computed.
        self.shared.lock().queue.push_back(QueuedBuffer {
            samples,
            pos: 0,
            on_done: Some(on_done),
        });
    }

    fn stop_all(&self) {
        let mut shared = self.shared.lock();
        let n = shared.queue.len();
        shared.queue.clear();
        if n > 0 {
            warn!(buffers = n, "discarded queued output");
        }
    }
}
