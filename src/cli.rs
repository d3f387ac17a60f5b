//! CLI subcommand handlers for murmur.
//!
//! Functions live here to keep main.rs focused on argument parsing and
//! routing.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};

use murmur::audio::capture::CpalCapture;
use murmur::audio::playback::CpalSink;
use murmur::audio::PLAYBACK_SAMPLE_RATE;
use murmur::config::loader::{get_config_path, get_data_dir, load_config, save_config};
use murmur::config::Config;
use murmur::session::{SessionController, SessionEvent, SessionState};
use murmur::tools::{declarations, DesktopActions, ToolDispatcher};
use murmur::transport::live::LiveTransport;

/// Run an interactive voice session until Ctrl-C or a fatal error.
pub(crate) fn cmd_talk() -> anyhow::Result<()> {
    let config = load_config(None);
    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;

    runtime.block_on(async move {
        let (sink, _sink_handle) =
            CpalSink::start(PLAYBACK_SAMPLE_RATE).context("audio output setup failed")?;

        let host = DesktopActions::new(
            config.apps.entries.clone(),
            get_data_dir().join("prints"),
        );
        let controller = SessionController::new(
            Arc::new(LiveTransport::new(declarations())),
            Arc::new(CpalCapture),
            sink.clone(),
            sink,
            Arc::new(ToolDispatcher::new(Arc::new(host))),
            config.session.clone(),
        );

        let mut events = controller
            .start()
            .await
            .context("could not start the session")?;
        println!("Listening. Press Ctrl-C to stop.");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    controller.stop();
                }
                event = events.recv() => match event {
                    Some(SessionEvent::State(state)) => {
                        println!("[{}]", state);
                        if state == SessionState::Idle {
                            break;
                        }
                    }
                    Some(SessionEvent::TurnComplete { user, assistant }) => {
                        if !user.is_empty() {
                            println!("you: {}", user);
                        }
                        if !assistant.is_empty() {
                            println!("assistant: {}", assistant);
                        }
                    }
                    Some(SessionEvent::Fatal(reason)) => {
                        eprintln!("session error: {}", reason);
                    }
                    Some(_) => {
                        // Incremental transcripts are only printed once final.
                    }
                    None => break,
                },
            }
        }
        Ok(())
    })
}

/// List audio devices visible to the session engine.
pub(crate) fn cmd_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();

    let default_input = host
        .default_input_device()
        .and_then(|d| d.name().ok());
    println!("Input devices:");
    for device in host.input_devices().context("could not enumerate input devices")? {
        let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let marker = if Some(&name) == default_input.as_ref() {
            " (default)"
        } else {
            ""
        };
        println!("  {}{}", name, marker);
    }

    let default_output = host
        .default_output_device()
        .and_then(|d| d.name().ok());
    println!("Output devices:");
    for device in host
        .output_devices()
        .context("could not enumerate output devices")?
    {
        let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let marker = if Some(&name) == default_output.as_ref() {
            " (default)"
        } else {
            ""
        };
        println!("  {}{}", name, marker);
    }
    Ok(())
}

/// Show configuration and device readiness.
pub(crate) fn cmd_status() -> anyhow::Result<()> {
    let config_path = get_config_path();
    let config = load_config(None);

    println!("murmur status\n");
    println!(
        "Config: {} [{}]",
        config_path.display(),
        if config_path.exists() { "ok" } else { "missing" }
    );
    println!("Model: {}", config.session.model);
    println!("Voice: {}", config.session.voice);
    println!("Endpoint: {}", config.session.endpoint);

    let key_configured = config
        .session
        .api_key
        .as_deref()
        .map(|k| !k.is_empty())
        .unwrap_or(false)
        || std::env::var("GEMINI_API_KEY").map(|k| !k.is_empty()).unwrap_or(false);
    println!(
        "API key: {}",
        if key_configured { "configured" } else { "not set" }
    );

    let host = cpal::default_host();
    println!(
        "Microphone: {}",
        host.default_input_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "Speaker: {}",
        host.default_output_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("Apps: {} configured", config.apps.entries.len());
    Ok(())
}

/// Write a default configuration file.
pub(crate) fn cmd_onboard() -> anyhow::Result<()> {
    let config_path = get_config_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        print!("Overwrite? [y/N] ");
        io::stdout().flush().ok();
        let mut input = String::new();
        io::stdin().read_line(&mut input).ok();
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    let config = Config::default();
    save_config(&config, None);
    println!("  Created config at {}", config_path.display());

    println!("\nmurmur is ready!");
    println!("\nNext steps:");
    println!("  1. Add your API key to {} (apiKey)", config_path.display());
    println!("     or export GEMINI_API_KEY.");
    println!("  2. Talk: murmur talk");
    Ok(())
}
