//! WebSocket transport for the live conversational endpoint.
//!
//! Dials the endpoint, sends the one-time setup message, then bridges the
//! socket to the [`Connection`] channel pair with a read task and a write
//! task. Either task ending tears the socket down; the read side always
//! emits a final `Closed` or `Error` event.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::schema::SessionConfig;
use crate::errors::TransportError;
use crate::transport::{
    wire, ClientMessage, Connection, FunctionDeclaration, ServerEvent, Transport,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Production transport over tokio-tungstenite.
pub struct LiveTransport {
    declarations: Vec<FunctionDeclaration>,
}

impl LiveTransport {
    /// `declarations` is the tool surface advertised in the setup message.
    pub fn new(declarations: Vec<FunctionDeclaration>) -> Self {
        Self { declarations }
    }
}

fn resolve_api_key(
    config: &SessionConfig,
    env_key: Option<String>,
) -> Result<String, TransportError> {
    if let Some(key) = &config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }
    env_key
        .filter(|k| !k.is_empty())
        .ok_or(TransportError::MissingApiKey)
}

#[async_trait]
impl Transport for LiveTransport {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, TransportError> {
        let key = resolve_api_key(config, std::env::var("GEMINI_API_KEY").ok())?;
        let url = format!("{}?key={}", config.endpoint, key);

        info!(endpoint = %config.endpoint, model = %config.model, "connecting");
        let (ws, _resp) = connect_async(url)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        let setup = wire::setup_json(config, &self.declarations);
        write
            .send(Message::Text(setup.to_string()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        debug!("setup message sent");

        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound, mut outbound_rx) = mpsc::channel::<ClientMessage>(OUTBOUND_CHANNEL_CAPACITY);

        let _ = event_tx.try_send(ServerEvent::Opened);

        tokio::spawn(async move {
            loop {
                let text = match read.next().await {
                    Some(Ok(Message::Text(txt))) => txt,
                    // The endpoint delivers JSON in binary frames as well.
                    Some(Ok(Message::Binary(bin))) => match String::from_utf8(bin) {
                        Ok(txt) => txt,
                        Err(_) => {
                            let _ = event_tx
                                .send(ServerEvent::Error(
                                    "non-utf8 binary frame".to_string(),
                                ))
                                .await;
                            break;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server closed the connection");
                        let _ = event_tx.send(ServerEvent::Closed).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = event_tx.send(ServerEvent::Error(e.to_string())).await;
                        break;
                    }
                    None => {
                        let _ = event_tx.send(ServerEvent::Closed).await;
                        break;
                    }
                };

                match wire::parse_server_message(&text) {
                    Ok(parsed) => {
                        for event in parsed {
                            if event_tx.send(event).await.is_err() {
                                // Session gone; stop reading.
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("unparseable server message: {}", e);
                        let _ = event_tx
                            .send(ServerEvent::Error(format!("protocol error: {}", e)))
                            .await;
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let payload = match msg {
                    ClientMessage::AudioFrame { mime_type, data } => {
                        wire::audio_frame_json(&mime_type, &data)
                    }
                    ClientMessage::ToolResults(responses) => wire::tool_results_json(&responses),
                };
                if write.send(Message::Text(payload.to_string())).await.is_err() {
                    // Read side reports the failure; nothing more to do here.
                    break;
                }
            }
            let _ = write.close().await;
            debug!("write task finished");
        });

        Ok(Connection { events, outbound })
    }
}
