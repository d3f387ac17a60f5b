//! Configuration schema for murmur.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` so that the JSON
//! config file can use camelCase keys while Rust code uses snake_case fields.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub apps: AppsConfig,
}

/// Session parameters, fixed once per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_endpoint() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-native-audio-preview-12-2025".to_string()
}

fn default_voice() -> String {
    "Zephyr".to_string()
}

fn default_system_instruction() -> String {
    "You are a helpful and friendly voice assistant.".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            voice: default_voice(),
            system_instruction: default_system_instruction(),
            api_key: None,
        }
    }
}

/// Applications the `openApp` tool may launch, looked up by spoken name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsConfig {
    #[serde(default = "default_apps")]
    pub entries: Vec<AppEntry>,
}

/// One launchable application: the name the model uses and the command run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEntry {
    pub name: String,
    pub id: String,
    pub command: String,
}

fn default_apps() -> Vec<AppEntry> {
    vec![
        AppEntry {
            name: "Terminal".to_string(),
            id: "terminal".to_string(),
            command: "x-terminal-emulator".to_string(),
        },
        AppEntry {
            name: "Files".to_string(),
            id: "files".to_string(),
            command: "xdg-open .".to_string(),
        },
    ]
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            entries: default_apps(),
        }
    }
}
