//! Host action surface consumed by the tool dispatcher.

use async_trait::async_trait;
use serde_json::{json, Value};

/// Outcome of a host action.
///
/// "Could not do it" answers (app not found, opener missing) are still
/// successful dispatches; only a thrown host failure becomes an error
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub payload: Value,
}

impl ActionOutcome {
    pub fn opened(app_id: Option<&str>) -> Self {
        let mut payload = json!({ "opened": app_id.is_some() });
        if let Some(id) = app_id {
            payload["appId"] = json!(id);
        }
        Self { payload }
    }

    pub fn url_opened(ok: bool) -> Self {
        Self {
            payload: json!({ "opened": ok }),
        }
    }

    pub fn printed() -> Self {
        Self {
            payload: json!({ "printed": true }),
        }
    }
}

/// Actions the assistant can take on the local host.
///
/// Implementations must not panic; failures come back as `Err(String)` and
/// the dispatcher converts them to error-shaped tool results.
#[async_trait]
pub trait HostActions: Send + Sync {
    /// Open an application by its spoken name.
    async fn open_application(&self, name: &str) -> Result<ActionOutcome, String>;

    /// Open a URL in the default browser.
    async fn open_url(&self, url: &str) -> Result<ActionOutcome, String>;

    /// Print text content in the given format.
    async fn print_content(&self, text: &str, format: &str) -> Result<ActionOutcome, String>;
}
