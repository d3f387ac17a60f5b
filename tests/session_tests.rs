//! End-to-end session controller scenarios over mock collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use murmur::audio::capture::{CaptureHandle, CaptureSource};
use murmur::audio::playback::{AudioSink, CompletionFn, OutputClock};
use murmur::audio::{pcm, AudioFrame, CAPTURE_FRAME_SAMPLES, CAPTURE_MIME_TYPE};
use murmur::config::schema::SessionConfig;
use murmur::errors::{SetupError, TransportError};
use murmur::session::{SessionController, SessionEvent, SessionState};
use murmur::tools::{ActionOutcome, HostActions, ToolDispatcher};
use murmur::transport::{
    ClientMessage, Connection, FunctionCall, ServerEvent, Transport,
};

struct MockCapture {
    fail: bool,
    frames: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
}

#[async_trait]
impl CaptureSource for MockCapture {
    async fn start(
        &self,
    ) -> Result<(mpsc::Receiver<AudioFrame>, CaptureHandle), SetupError> {
        if self.fail {
            return Err(SetupError::InputDeviceUnavailable(
                "no input device".to_string(),
            ));
        }
        let rx = self
            .frames
            .lock()
            .take()
            .ok_or_else(|| SetupError::InputDeviceUnavailable("already taken".to_string()))?;
        Ok((rx, CaptureHandle::noop()))
    }
}

struct MockTransport {
    fail: bool,
    connects: Arc<AtomicUsize>,
    /// When set, `connect` parks here until notified, so tests can race
    /// other calls against an in-flight connect.
    gate: Option<Arc<tokio::sync::Notify>>,
    connection: Mutex<Option<Connection>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _config: &SessionConfig) -> Result<Connection, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(TransportError::WebSocket("refused".to_string()));
        }
        self.connection
            .lock()
            .take()
            .ok_or(TransportError::Closed)
    }
}

struct ZeroClock;

impl OutputClock for ZeroClock {
    fn now(&self) -> f64 {
        0.0
    }
}

#[derive(Default)]
struct RecordingSink {
    played: Mutex<Vec<usize>>,
    stops: AtomicUsize,
}

impl AudioSink for RecordingSink {
    fn play(&self, _id: u64, samples: Vec<f32>, _start_at: f64, _on_done: CompletionFn) {
        self.played.lock().push(samples.len());
    }

    fn stop_all(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct QuietHost;

#[async_trait]
impl HostActions for QuietHost {
    async fn open_application(&self, name: &str) -> Result<ActionOutcome, String> {
        Ok(ActionOutcome::opened(if name == "Terminal" {
            Some("terminal")
        } else {
            None
        }))
    }

    async fn open_url(&self, _url: &str) -> Result<ActionOutcome, String> {
        Ok(ActionOutcome::url_opened(true))
    }

    async fn print_content(&self, _text: &str, _format: &str) -> Result<ActionOutcome, String> {
        Ok(ActionOutcome::printed())
    }
}

struct Harness {
    controller: SessionController,
    server_tx: mpsc::Sender<ServerEvent>,
    out_rx: mpsc::Receiver<ClientMessage>,
    frame_tx: mpsc::Sender<AudioFrame>,
    sink: Arc<RecordingSink>,
    connects: Arc<AtomicUsize>,
}

fn harness(capture_fails: bool, connect_fails: bool) -> Harness {
    harness_with_gate(capture_fails, connect_fails, None)
}

fn harness_with_gate(
    capture_fails: bool,
    connect_fails: bool,
    gate: Option<Arc<tokio::sync::Notify>>,
) -> Harness {
    let (server_tx, server_rx) = mpsc::channel(32);
    let (out_tx, out_rx) = mpsc::channel(32);
    let (frame_tx, frame_rx) = mpsc::channel(32);

    let connects = Arc::new(AtomicUsize::new(0));
    let transport = MockTransport {
        fail: connect_fails,
        connects: Arc::clone(&connects),
        gate,
        connection: Mutex::new(Some(Connection {
            events: server_rx,
            outbound: out_tx,
        })),
    };
    let capture = MockCapture {
        fail: capture_fails,
        frames: Mutex::new(Some(frame_rx)),
    };
    let sink = Arc::new(RecordingSink::default());

    let controller = SessionController::new(
        Arc::new(transport),
        Arc::new(capture),
        Arc::new(ZeroClock),
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        Arc::new(ToolDispatcher::new(Arc::new(QuietHost))),
        SessionConfig::default(),
    );

    Harness {
        controller,
        server_tx,
        out_rx,
        frame_tx,
        sink,
        connects,
    }
}

async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event stream ended unexpectedly")
}

async fn next_outbound(rx: &mut mpsc::Receiver<ClientMessage>) -> ClientMessage {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("outbound stream ended unexpectedly")
}

fn audio_bytes(samples: usize) -> Vec<u8> {
    pcm::encode_f32_to_i16le(&vec![0.1; samples])
}

#[tokio::test]
async fn capture_failure_leaves_idle_and_never_connects() {
    let h = harness(true, false);

    let err = h.controller.start().await.unwrap_err();
    assert!(matches!(err, SetupError::InputDeviceUnavailable(_)));
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);
    assert_eq!(h.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connect_failure_leaves_idle() {
    let h = harness(false, true);

    let err = h.controller.start().await.unwrap_err();
    assert!(matches!(err, SetupError::Connect(_)));
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);
    assert_eq!(h.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_turn_cycle() {
    let mut h = harness(false, false);
    let mut events = h.controller.start().await.unwrap();
    assert_eq!(*h.controller.state().borrow(), SessionState::Listening);

    h.server_tx
        .send(ServerEvent::InputTranscript("open the ".to_string()))
        .await
        .unwrap();
    h.server_tx
        .send(ServerEvent::InputTranscript("terminal".to_string()))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::UserTranscript("open the ".to_string())
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::UserTranscript("open the terminal".to_string())
    );

    h.server_tx
        .send(ServerEvent::Audio(audio_bytes(2400)))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::State(SessionState::Speaking)
    );

    h.server_tx
        .send(ServerEvent::OutputTranscript("Opening it now.".to_string()))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::AssistantTranscript("Opening it now.".to_string())
    );

    h.server_tx.send(ServerEvent::TurnComplete).await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::TurnComplete {
            user: "open the terminal".to_string(),
            assistant: "Opening it now.".to_string(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::State(SessionState::Listening)
    );

    assert_eq!(h.sink.played.lock().as_slice(), &[2400]);

    h.controller.stop();
    loop {
        if next_event(&mut events).await == SessionEvent::State(SessionState::Idle) {
            break;
        }
    }
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);
}

#[tokio::test]
async fn captured_frames_are_forwarded_encoded() {
    let mut h = harness(false, false);
    let _events = h.controller.start().await.unwrap();

    let samples = vec![0.25_f32; CAPTURE_FRAME_SAMPLES];
    h.frame_tx
        .send(AudioFrame::new(samples.clone(), 16_000))
        .await
        .unwrap();

    match next_outbound(&mut h.out_rx).await {
        ClientMessage::AudioFrame { mime_type, data } => {
            assert_eq!(mime_type, CAPTURE_MIME_TYPE);
            let bytes = pcm::from_base64(&data).unwrap();
            assert_eq!(bytes, pcm::encode_f32_to_i16le(&samples));
        }
        other => panic!("unexpected outbound message: {:?}", other),
    }
}

#[tokio::test]
async fn tool_calls_get_one_result_each() {
    let mut h = harness(false, false);
    let _events = h.controller.start().await.unwrap();

    h.server_tx
        .send(ServerEvent::ToolCalls(vec![
            FunctionCall {
                id: "a".to_string(),
                name: "openUrl".to_string(),
                args: serde_json::json!({"url": "https://example.com"}),
            },
            FunctionCall {
                id: "b".to_string(),
                name: "bogus".to_string(),
                args: serde_json::json!({}),
            },
        ]))
        .await
        .unwrap();

    match next_outbound(&mut h.out_rx).await {
        ClientMessage::ToolResults(responses) => {
            assert_eq!(responses.len(), 2);
            assert_eq!(responses[0].id, "a");
            assert_eq!(responses[0].response["opened"], true);
            assert_eq!(responses[1].id, "b");
            assert_eq!(responses[1].response["error"], "unknown tool: bogus");
        }
        other => panic!("unexpected outbound message: {:?}", other),
    }
}

#[tokio::test]
async fn interruption_stops_playback_and_returns_to_listening() {
    let mut h = harness(false, false);
    let mut events = h.controller.start().await.unwrap();

    h.server_tx
        .send(ServerEvent::Audio(audio_bytes(2400)))
        .await
        .unwrap();
    h.server_tx
        .send(ServerEvent::OutputTranscript("As I was say".to_string()))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::State(SessionState::Speaking)
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::AssistantTranscript("As I was say".to_string())
    );

    h.server_tx.send(ServerEvent::Interrupted).await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::AssistantTranscript(String::new())
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::State(SessionState::Listening)
    );
    assert!(h.sink.stops.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn fatal_transport_error_tears_down_to_idle() {
    let mut h = harness(false, false);
    let mut events = h.controller.start().await.unwrap();

    h.server_tx
        .send(ServerEvent::Error("connection reset".to_string()))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Fatal("connection reset".to_string())
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::State(SessionState::Idle)
    );
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let mut h = harness(false, false);
    let mut events = h.controller.start().await.unwrap();

    h.controller.stop();
    h.controller.stop();

    loop {
        match next_event(&mut events).await {
            SessionEvent::State(SessionState::Idle) => break,
            _ => continue,
        }
    }
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);

    // Stopping after the session ended is still a no-op.
    h.controller.stop();
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);
}

#[tokio::test]
async fn stop_before_any_start_is_a_no_op() {
    let h = harness(false, false);
    h.controller.stop();
    assert_eq!(*h.controller.state().borrow(), SessionState::Idle);
}

async fn wait_for_connect(connects: &Arc<AtomicUsize>) {
    timeout(Duration::from_secs(2), async {
        while connects.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connect was never attempted");
}

#[tokio::test]
async fn stop_during_connect_aborts_the_start() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let h = harness_with_gate(false, false, Some(Arc::clone(&gate)));
    let controller = Arc::new(h.controller);

    let starting = Arc::clone(&controller);
    let start_task = tokio::spawn(async move { starting.start().await });

    // The start is now parked inside connect; stop it, then let connect
    // finish. The completed connection must be thrown away, not adopted.
    wait_for_connect(&h.connects).await;
    controller.stop();
    gate.notify_one();

    let result = start_task.await.unwrap();
    assert!(matches!(result, Err(SetupError::Cancelled)));
    assert_eq!(*controller.state().borrow(), SessionState::Idle);
}

#[tokio::test]
async fn second_start_during_connect_is_rejected() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let h = harness_with_gate(false, false, Some(Arc::clone(&gate)));
    let controller = Arc::new(h.controller);

    let starting = Arc::clone(&controller);
    let start_task = tokio::spawn(async move { starting.start().await });
    wait_for_connect(&h.connects).await;

    // Only one session may be live or mid-start at a time.
    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, SetupError::AlreadyActive));

    gate.notify_one();
    let mut events = start_task.await.unwrap().unwrap();
    assert_eq!(*controller.state().borrow(), SessionState::Listening);
    assert_eq!(h.connects.load(Ordering::SeqCst), 1);

    controller.stop();
    loop {
        if next_event(&mut events).await == SessionEvent::State(SessionState::Idle) {
            break;
        }
    }
}

#[tokio::test]
async fn controller_can_restart_after_a_cancelled_start() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let h = harness_with_gate(false, false, Some(Arc::clone(&gate)));
    let controller = Arc::new(h.controller);

    let starting = Arc::clone(&controller);
    let start_task = tokio::spawn(async move { starting.start().await });
    wait_for_connect(&h.connects).await;
    controller.stop();
    gate.notify_one();
    assert!(matches!(
        start_task.await.unwrap(),
        Err(SetupError::Cancelled)
    ));

    // A fresh start is allowed again. The mock capture was consumed by the
    // cancelled attempt, so this fails at device acquisition; the point is
    // that it is not rejected as `AlreadyActive`.
    let err = timeout(Duration::from_secs(2), controller.start())
        .await
        .expect("restart hung")
        .unwrap_err();
    assert!(matches!(err, SetupError::InputDeviceUnavailable(_)));
    assert_eq!(*controller.state().borrow(), SessionState::Idle);
}
