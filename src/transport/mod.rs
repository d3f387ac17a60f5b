//! Session transport: the seam between the controller and the live endpoint.
//!
//! Push-style server callbacks are inverted into a channel pair so that all
//! state mutation happens on the controller's single event loop.

pub mod live;
pub mod wire;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::schema::SessionConfig;
use crate::errors::TransportError;
pub use wire::{FunctionCall, FunctionDeclaration, FunctionResponse};

/// Events delivered by the remote endpoint, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The session is established and ready for audio.
    Opened,
    /// Incremental transcription of the user's speech.
    InputTranscript(String),
    /// Incremental transcription of the assistant's speech.
    OutputTranscript(String),
    /// One frame of assistant speech, raw 16-bit PCM at 24 kHz.
    Audio(Vec<u8>),
    /// The assistant finished its turn.
    TurnComplete,
    /// The user barged in; playback must stop.
    Interrupted,
    /// Tool invocations requested by the model.
    ToolCalls(Vec<FunctionCall>),
    /// The connection closed normally.
    Closed,
    /// The connection failed.
    Error(String),
}

/// Messages the session sends upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// One captured audio frame, base64-encoded PCM.
    AudioFrame { mime_type: String, data: String },
    /// Results for previously received tool calls.
    ToolResults(Vec<FunctionResponse>),
}

/// An established session connection.
///
/// Dropping `outbound` closes the write side; `events` yields `Closed` or
/// `Error` as its final item before the stream ends.
pub struct Connection {
    pub events: mpsc::Receiver<ServerEvent>,
    pub outbound: mpsc::Sender<ClientMessage>,
}

/// Dials the live endpoint. Mocked in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, TransportError>;
}
