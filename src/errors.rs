//! Domain error types for murmur.
//!
//! The taxonomy splits fatal from recoverable failures: setup and transport
//! errors tear the session down, decode and dispatch errors are contained in
//! their component and logged. Typed errors at module boundaries enable
//! structured handling via pattern matching; outer layers (the CLI) wrap
//! them in `anyhow::Error`.

use thiserror::Error;

/// Errors that prevent a session from starting.
///
/// Fatal to session start: no partial session is left running, the state
/// stays `Idle`, and the message is surfaced to the user.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("audio input device unavailable: {0}")]
    InputDeviceUnavailable(String),

    #[error("audio output device unavailable: {0}")]
    OutputDeviceUnavailable(String),

    #[error("a session is already active")]
    AlreadyActive,

    #[error("session start was cancelled")]
    Cancelled,

    #[error(transparent)]
    Connect(#[from] TransportError),
}

/// Errors from the session transport.
///
/// Fatal to the current session: the controller tears down all resources
/// and returns to `Idle`; the user must explicitly restart.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("connection closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("missing API key (set apiKey in config or the GEMINI_API_KEY env var)")]
    MissingApiKey,
}

/// Errors decoding an inbound audio frame.
///
/// Recoverable: the frame is dropped, the failure is logged, and playback
/// continues with the next frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("pcm frame length {0} is not a multiple of 2")]
    TruncatedFrame(usize),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}
