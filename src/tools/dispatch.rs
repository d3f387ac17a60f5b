//! Tool-call dispatcher.
//!
//! Maps the model's function calls onto the [`HostActions`] surface. The
//! contract is strict: every request gets exactly one response with the
//! same id, whatever goes wrong. Unknown names and malformed arguments
//! become error payloads, never session failures.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::tools::base::HostActions;
use crate::transport::{FunctionCall, FunctionDeclaration, FunctionResponse};

pub const TOOL_OPEN_APP: &str = "openApp";
pub const TOOL_OPEN_URL: &str = "openUrl";
pub const TOOL_PRINT_CONTENT: &str = "printContent";

pub struct ToolDispatcher {
    host: Arc<dyn HostActions>,
}

impl ToolDispatcher {
    pub fn new(host: Arc<dyn HostActions>) -> Self {
        Self { host }
    }

    /// Dispatch a batch of calls sequentially, one response per call.
    pub async fn dispatch(&self, calls: Vec<FunctionCall>) -> Vec<FunctionResponse> {
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            info!(id = %call.id, name = %call.name, "dispatching tool call");
            let response = self.dispatch_one(&call).await;
            responses.push(FunctionResponse {
                id: call.id,
                name: call.name,
                response,
            });
        }
        responses
    }

    async fn dispatch_one(&self, call: &FunctionCall) -> Value {
        let result = match call.name.as_str() {
            TOOL_OPEN_APP => match str_arg(&call.args, "appName") {
                Some(name) => self.host.open_application(name).await,
                None => Err("missing argument: appName".to_string()),
            },
            TOOL_OPEN_URL => match str_arg(&call.args, "url") {
                Some(url) => self.host.open_url(url).await,
                None => Err("missing argument: url".to_string()),
            },
            TOOL_PRINT_CONTENT => match str_arg(&call.args, "content") {
                Some(content) => {
                    let format = str_arg(&call.args, "format").unwrap_or("TXT");
                    self.host.print_content(content, format).await
                }
                None => Err("missing argument: content".to_string()),
            },
            other => Err(format!("unknown tool: {}", other)),
        };

        match result {
            Ok(outcome) => outcome.payload,
            Err(msg) => {
                warn!(name = %call.name, "tool call failed: {}", msg);
                json!({ "error": msg })
            }
        }
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// The tool surface advertised in the session setup message.
pub fn declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: TOOL_OPEN_APP.to_string(),
            description:
                "Opens an application on the host. Use the exact application name as configured."
                    .to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "appName": {
                        "type": "STRING",
                        "description": "The exact name of the application to open, e.g. \"Terminal\", \"Files\"."
                    }
                },
                "required": ["appName"]
            }),
        },
        FunctionDeclaration {
            name: TOOL_PRINT_CONTENT.to_string(),
            description: "Prints text content to a document with a specified format.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "content": {
                        "type": "STRING",
                        "description": "The text content to be printed."
                    },
                    "format": {
                        "type": "STRING",
                        "description": "The desired output format, e.g. \"PDF\", \"TXT\"."
                    }
                },
                "required": ["content", "format"]
            }),
        },
        FunctionDeclaration {
            name: TOOL_OPEN_URL.to_string(),
            description: "Opens a specific URL in the web browser.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "url": {
                        "type": "STRING",
                        "description": "The full URL to open, starting with \"http://\" or \"https://\"."
                    }
                },
                "required": ["url"]
            }),
        },
    ]
}
