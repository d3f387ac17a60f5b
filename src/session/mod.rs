//! Session lifecycle: state machine, transcripts, and the controller task.

pub mod controller;
pub mod transcript;

use serde::{Deserialize, Serialize};

pub use controller::SessionController;
pub use transcript::TranscriptAggregator;

/// Lifecycle state of a voice session.
///
/// There is no separate "processing" state: the session listens while the
/// model thinks, and only audible output flips it to `Speaking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Listening,
    Speaking,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Listening => "listening",
            SessionState::Speaking => "speaking",
        };
        write!(f, "{}", s)
    }
}

/// Events surfaced to the UI layer (the CLI, or anything embedding the lib).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    State(SessionState),
    /// Incremental user transcript, full text so far this turn.
    UserTranscript(String),
    /// Incremental assistant transcript, full text so far this turn.
    AssistantTranscript(String),
    /// A turn finished; both transcripts are final and have been cleared.
    TurnComplete { user: String, assistant: String },
    /// The session died; a short status string replaces the transcript.
    Fatal(String),
}
