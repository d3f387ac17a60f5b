//! Default host implementation of [`HostActions`].
//!
//! Applications come from the configured app table; URLs go through the
//! platform opener; printing writes a spool file under the data directory.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::schema::AppEntry;
use crate::tools::base::{ActionOutcome, HostActions};

pub struct DesktopActions {
    apps: Vec<AppEntry>,
    spool_dir: PathBuf,
}

impl DesktopActions {
    pub fn new(apps: Vec<AppEntry>, spool_dir: PathBuf) -> Self {
        Self { apps, spool_dir }
    }

    fn lookup_app(&self, name: &str) -> Option<&AppEntry> {
        self.apps
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

fn spawn_detached(command_line: &str) -> Result<(), String> {
    let mut parts = command_line.split_whitespace();
    let program = parts.next().ok_or_else(|| "empty command".to_string())?;
    Command::new(program)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| format!("failed to launch {}: {}", program, e))
}

#[cfg(target_os = "linux")]
const URL_OPENER: &str = "xdg-open";
#[cfg(target_os = "macos")]
const URL_OPENER: &str = "open";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const URL_OPENER: &str = "explorer";

#[async_trait]
impl HostActions for DesktopActions {
    async fn open_application(&self, name: &str) -> Result<ActionOutcome, String> {
        match self.lookup_app(name) {
            Some(app) => {
                info!(app = %app.id, "opening application");
                spawn_detached(&app.command)?;
                Ok(ActionOutcome::opened(Some(&app.id)))
            }
            None => {
                debug!(name, "no configured application matches");
                Ok(ActionOutcome::opened(None))
            }
        }
    }

    async fn open_url(&self, url: &str) -> Result<ActionOutcome, String> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("refusing to open non-http url: {}", url));
        }
        info!(url, "opening url");
        Command::new(URL_OPENER)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to launch {}: {}", URL_OPENER, e))?;
        Ok(ActionOutcome::url_opened(true))
    }

    async fn print_content(&self, text: &str, format: &str) -> Result<ActionOutcome, String> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let ext = match format.to_ascii_lowercase().as_str() {
            "pdf" => "pdf",
            _ => "txt",
        };
        let path = self.spool_dir.join(format!("print-{}.{}", stamp, ext));

        let spool_dir = self.spool_dir.clone();
        let text = text.to_string();
        let written = path.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&spool_dir).map_err(|e| e.to_string())?;
            std::fs::write(&written, text).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())??;

        info!(path = %path.display(), "content spooled for printing");
        Ok(ActionOutcome::printed())
    }
}
