//! roomcall: headless console participant for multi-party video rooms.
//!
//! Joins a room through the signaling server with synthetic media, prints
//! room activity, and maps stdin lines to chat messages and call commands.

mod cli;
mod console;
mod headless;
mod settings;

use std::path::Path;
use std::sync::Arc;

use roomcall_common::{ConfigError, RoomcallError};
use roomcall_config::RoomcallConfig;
use roomcall_core::{CallEvent, Collaborators, RoomState, SessionOrchestrator, WsConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::console::Input;
use crate::headless::{SignalOnlyTransport, SyntheticDevices};

fn load_config(args: &cli::Args) -> Result<RoomcallConfig, ConfigError> {
    match &args.config {
        Some(path) => roomcall_config::load_config_from(Path::new(path)),
        None => roomcall_config::load_config(),
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();
    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("roomcall: {e}");
            std::process::exit(1);
        }
    }
}

/// Run one call session to completion and return the process exit code.
async fn run(args: cli::Args) -> roomcall_common::Result<i32> {
    let mut config = load_config(&args)?;

    let log_directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&log_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    settings::apply_overrides(&mut config, &args);
    let settings = settings::resolve(&config);
    if settings.display_name.is_empty() {
        return Err(RoomcallError::Other(
            "a display name is required: pass --name or set call.display_name".into(),
        ));
    }

    let (transport, transport_events) = SignalOnlyTransport::new();
    let parts = Collaborators {
        devices: Arc::new(SyntheticDevices),
        transport: Arc::new(transport),
        transport_events,
        signaling: Arc::new(WsConnector::new(settings.signaling.clone())),
    };
    tracing::info!(
        server = %settings.signaling.server_url,
        room = %settings.session.room_id,
        name = %settings.display_name,
        "Starting roomcall"
    );

    let (orchestrator, mut events) = SessionOrchestrator::new(settings.session, parts);
    let (handle, task) = orchestrator.spawn(64);

    handle.prepare_media().await?;
    handle.join(&settings.display_name).await?;
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut joined = false;
    let mut exit_code = 0;
    let mut stdin_error = None;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match console::parse(&line) {
                    Input::Command(command) => {
                        if handle.send(command).await.is_err() {
                            break;
                        }
                    }
                    Input::Leave => break,
                    Input::Invalid(message) => println!("{message}"),
                    Input::Empty => {}
                },
                Ok(None) => break,
                Err(e) => {
                    stdin_error = Some(e);
                    break;
                }
            },
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = console::render(&event) {
                    println!("{line}");
                }
                match event {
                    CallEvent::Joined { .. } => joined = true,
                    CallEvent::SessionFailed(_) => {
                        exit_code = 1;
                        break;
                    }
                    CallEvent::RoomStateChanged(RoomState::Idle) if joined => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = handle.leave().await;
    drop(handle);
    task.await
        .map_err(|e| RoomcallError::Other(format!("call session task failed: {e}")))?;
    if let Some(e) = stdin_error {
        return Err(e.into());
    }
    tracing::info!("roomcall exited");
    Ok(exit_code)
}
