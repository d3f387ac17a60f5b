//! Serde types for the live-session wire protocol.
//!
//! One inbound JSON message can carry several independent signals
//! (transcription text, audio parts, turn flags, tool calls), so parsing
//! yields a list of [`ServerEvent`]s rather than a single variant.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::audio::pcm;
use crate::config::schema::SessionConfig;
use crate::transport::ServerEvent;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The host's answer to one [`FunctionCall`], keyed by the same id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// Advertised tool surface, sent once in the setup message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    server_content: Option<ServerContent>,
    tool_call: Option<ToolCall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

/// Parse one inbound text frame into zero or more events.
///
/// Unknown fields are ignored; an unparseable frame is a protocol error.
/// A part whose base64 payload is malformed is dropped with a warning,
/// the rest of the message still applies.
pub fn parse_server_message(raw: &str) -> Result<Vec<ServerEvent>, serde_json::Error> {
    let msg: ServerMessage = serde_json::from_str(raw)?;
    let mut events = Vec::new();

    if let Some(content) = msg.server_content {
        if let Some(t) = content.input_transcription {
            events.push(ServerEvent::InputTranscript(t.text));
        }
        if let Some(t) = content.output_transcription {
            events.push(ServerEvent::OutputTranscript(t.text));
        }
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(inline) = part.inline_data {
                    match pcm::from_base64(&inline.data) {
                        Ok(bytes) => events.push(ServerEvent::Audio(bytes)),
                        Err(e) => warn!("dropping undecodable audio part: {}", e),
                    }
                }
            }
        }
        if content.interrupted {
            events.push(ServerEvent::Interrupted);
        }
        if content.turn_complete {
            events.push(ServerEvent::TurnComplete);
        }
    }

    if let Some(call) = msg.tool_call {
        if !call.function_calls.is_empty() {
            events.push(ServerEvent::ToolCalls(call.function_calls));
        }
    }

    Ok(events)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCall {
    #[serde(default)]
    function_calls: Vec<FunctionCall>,
}

/// One outbound audio frame: `{"media": {"mimeType", "data"}}`.
pub fn audio_frame_json(mime_type: &str, base64_data: &str) -> Value {
    json!({
        "media": {
            "mimeType": mime_type,
            "data": base64_data,
        }
    })
}

/// Outbound tool results: `{"functionResponses": [...]}`.
pub fn tool_results_json(responses: &[FunctionResponse]) -> Value {
    json!({ "functionResponses": responses })
}

/// The one-time setup message establishing session parameters.
pub fn setup_json(config: &SessionConfig, declarations: &[FunctionDeclaration]) -> Value {
    json!({
        "setup": {
            "model": format!("models/{}", config.model),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": config.voice }
                    }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": config.system_instruction }]
            },
            "tools": [{ "functionDeclarations": declarations }],
            "inputAudioTranscription": {},
            "outputAudioTranscription": {},
        }
    })
}
