//! Accumulates streamed transcription fragments into per-turn utterances.
//!
//! Owned by the controller task; single-writer, so no locking.

#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    user: String,
    assistant: String,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment of the user's speech; returns the text so far.
    pub fn push_input(&mut self, fragment: &str) -> &str {
        self.user.push_str(fragment);
        &self.user
    }

    /// Append a fragment of the assistant's speech; returns the text so far.
    pub fn push_output(&mut self, fragment: &str) -> &str {
        self.assistant.push_str(fragment);
        &self.assistant
    }

    /// Close out the turn: both utterances are returned and cleared.
    pub fn finish_turn(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.user),
            std::mem::take(&mut self.assistant),
        )
    }

    /// Barge-in: the assistant's partial utterance is discarded, the
    /// user's in-progress utterance survives.
    pub fn interrupt(&mut self) {
        self.assistant.clear();
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn assistant(&self) -> &str {
        &self.assistant
    }
}
