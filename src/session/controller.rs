//! Session controller: owns the lifecycle of one voice session.
//!
//! All session state is mutated by a single event-loop task that
//! multiplexes capture frames, server events, and the stop signal with
//! `tokio::select!`. Capture keeps running while the assistant speaks;
//! there is no mutual exclusion between input and output.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::capture::{CaptureHandle, CaptureSource};
use crate::audio::playback::{AudioSink, OutputClock, PlaybackScheduler};
use crate::audio::{pcm, AudioFrame, CAPTURE_MIME_TYPE, PLAYBACK_SAMPLE_RATE};
use crate::config::schema::SessionConfig;
use crate::errors::SetupError;
use crate::session::{SessionEvent, SessionState, TranscriptAggregator};
use crate::tools::ToolDispatcher;
use crate::transport::{ClientMessage, ServerEvent, Transport};

const SESSION_EVENT_CAPACITY: usize = 64;

pub struct SessionController {
    transport: Arc<dyn Transport>,
    capture: Arc<dyn CaptureSource>,
    clock: Arc<dyn OutputClock>,
    sink: Arc<dyn AudioSink>,
    dispatcher: Arc<ToolDispatcher>,
    config: SessionConfig,
    state_tx: Arc<watch::Sender<SessionState>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn Transport>,
        capture: Arc<dyn CaptureSource>,
        clock: Arc<dyn OutputClock>,
        sink: Arc<dyn AudioSink>,
        dispatcher: Arc<ToolDispatcher>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            transport,
            capture,
            clock,
            sink,
            dispatcher,
            config,
            state_tx: Arc::new(state_tx),
            cancel: Mutex::new(None),
        }
    }

    /// Observe state transitions without consuming the event stream.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Start a session: microphone first, then the connection, then the
    /// event loop. Either acquisition failing leaves the state `Idle`
    /// with nothing held; in particular a dead microphone never opens a
    /// connection.
    ///
    /// The cancellation token is claimed before the first await, so a
    /// concurrent second `start` is rejected immediately and a `stop`
    /// racing the acquisitions aborts the start instead of being lost.
    pub async fn start(&self) -> Result<mpsc::Receiver<SessionEvent>, SetupError> {
        let cancel = CancellationToken::new();
        {
            let mut slot = self.cancel.lock();
            // A live token means a session is running or mid-start.
            if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
                return Err(SetupError::AlreadyActive);
            }
            *slot = Some(cancel.clone());
        }

        match self.try_start(&cancel).await {
            Ok(event_rx) => Ok(event_rx),
            Err(e) => {
                *self.cancel.lock() = None;
                Err(e)
            }
        }
    }

    async fn try_start(
        &self,
        cancel: &CancellationToken,
    ) -> Result<mpsc::Receiver<SessionEvent>, SetupError> {
        let session_id = Uuid::new_v4();
        info!(%session_id, "starting voice session");

        let (frames, capture_handle) = self.capture.start().await?;
        if cancel.is_cancelled() {
            info!(%session_id, "start cancelled during capture setup");
            return Err(SetupError::Cancelled);
        }

        let connection = self
            .transport
            .connect(&self.config)
            .await
            .map_err(SetupError::Connect)?;
        if cancel.is_cancelled() {
            info!(%session_id, "start cancelled during connect");
            return Err(SetupError::Cancelled);
        }

        let (event_tx, event_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
        let active = ActiveSession {
            session_id,
            scheduler: PlaybackScheduler::new(
                Arc::clone(&self.clock),
                Arc::clone(&self.sink),
                PLAYBACK_SAMPLE_RATE,
            ),
            transcripts: TranscriptAggregator::new(),
            dispatcher: Arc::clone(&self.dispatcher),
            outbound: connection.outbound,
            event_tx,
            state_tx: Arc::clone(&self.state_tx),
        };

        self.state_tx.send_replace(SessionState::Listening);
        tokio::spawn(active.run(connection.events, frames, capture_handle, cancel.clone()));

        Ok(event_rx)
    }

    /// Request teardown. Idempotent, and safe to call while `start` is
    /// still acquiring the microphone or connecting: the start aborts,
    /// drops everything acquired so far, and returns `Cancelled`.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().as_ref() {
            token.cancel();
        }
    }
}

struct ActiveSession {
    session_id: Uuid,
    scheduler: PlaybackScheduler,
    transcripts: TranscriptAggregator,
    dispatcher: Arc<ToolDispatcher>,
    outbound: mpsc::Sender<ClientMessage>,
    event_tx: mpsc::Sender<SessionEvent>,
    state_tx: Arc<watch::Sender<SessionState>>,
}

enum LoopOutcome {
    Continue,
    Fatal(String),
}

impl ActiveSession {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<ServerEvent>,
        mut frames: mpsc::Receiver<AudioFrame>,
        capture_handle: CaptureHandle,
        cancel: CancellationToken,
    ) {
        let session_id = self.session_id;
        debug!(%session_id, "session loop running");

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(%session_id, "stop requested");
                    break;
                }
                frame = frames.recv() => match frame {
                    Some(frame) => self.forward_frame(frame).await,
                    None => LoopOutcome::Fatal("microphone stopped".to_string()),
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_server_event(event).await,
                    None => LoopOutcome::Fatal("connection lost".to_string()),
                },
            };

            if let LoopOutcome::Fatal(reason) = outcome {
                error!(%session_id, "session failed: {}", reason);
                let _ = self.event_tx.send(SessionEvent::Fatal(reason)).await;
                break;
            }
        }

        // Teardown: silence the output, release the microphone, publish Idle.
        // Cancelling the token also marks the controller free for a restart.
        cancel.cancel();
        self.scheduler.interrupt();
        drop(capture_handle);
        self.state_tx.send_replace(SessionState::Idle);
        let _ = self.event_tx.send(SessionEvent::State(SessionState::Idle)).await;
        info!(%session_id, "session ended");
    }

    async fn forward_frame(&mut self, frame: AudioFrame) -> LoopOutcome {
        let bytes = pcm::encode_f32_to_i16le(&frame.samples);
        let message = ClientMessage::AudioFrame {
            mime_type: CAPTURE_MIME_TYPE.to_string(),
            data: pcm::to_base64(&bytes),
        };
        if self.outbound.send(message).await.is_err() {
            // Write side is gone; the event stream will carry the reason.
            debug!("outbound channel closed while sending audio");
        }
        LoopOutcome::Continue
    }

    async fn handle_server_event(&mut self, event: ServerEvent) -> LoopOutcome {
        match event {
            ServerEvent::Opened => {
                debug!("session established");
            }
            ServerEvent::InputTranscript(fragment) => {
                let full = self.transcripts.push_input(&fragment).to_string();
                self.emit(SessionEvent::UserTranscript(full));
            }
            ServerEvent::OutputTranscript(fragment) => {
                let full = self.transcripts.push_output(&fragment).to_string();
                self.emit(SessionEvent::AssistantTranscript(full));
            }
            ServerEvent::Audio(bytes) => {
                self.set_state(SessionState::Speaking);
                if let Err(e) = self.scheduler.schedule(&bytes) {
                    warn!("dropping malformed audio frame: {}", e);
                }
            }
            ServerEvent::TurnComplete => {
                let (user, assistant) = self.transcripts.finish_turn();
                self.emit(SessionEvent::TurnComplete { user, assistant });
                self.set_state(SessionState::Listening);
            }
            ServerEvent::Interrupted => {
                self.scheduler.interrupt();
                self.transcripts.interrupt();
                self.emit(SessionEvent::AssistantTranscript(String::new()));
                self.set_state(SessionState::Listening);
            }
            ServerEvent::ToolCalls(calls) => {
                let responses = self.dispatcher.dispatch(calls).await;
                if self
                    .outbound
                    .send(ClientMessage::ToolResults(responses))
                    .await
                    .is_err()
                {
                    debug!("outbound channel closed while sending tool results");
                }
            }
            ServerEvent::Closed => {
                return LoopOutcome::Fatal("connection closed".to_string());
            }
            ServerEvent::Error(msg) => {
                return LoopOutcome::Fatal(msg);
            }
        }
        LoopOutcome::Continue
    }

    fn set_state(&mut self, state: SessionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
        if changed {
            self.emit(SessionEvent::State(state));
        }
    }

    // A slow or departed UI must not wedge the session.
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.try_send(event);
    }
}
