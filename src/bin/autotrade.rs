//! Submit one trade request to a running pankow server and follow it.
//!
//! Usage: `pankow-autotrade <payload-json | @payload-file>`
//!
//! The session endpoint is read from `PANKOW_URL`
//! (default `ws://127.0.0.1:9999/ws`).

use std::process::ExitCode;

use futures_util::{SinkExt, StreamExt};
use pankow::domain::entities::action_log::ProgressMessage;
use pankow::domain::entities::trade_plan::TaskState;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_URL: &str = "ws://127.0.0.1:9999/ws";

fn read_payload(argument: &str) -> std::io::Result<String> {
    match argument.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(argument.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pankow_autotrade=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(argument) = std::env::args().nth(1) else {
        eprintln!("usage: pankow-autotrade <payload-json | @payload-file>");
        return ExitCode::from(2);
    };

    let payload = match read_payload(&argument) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to read payload {}: {}", argument, e);
            return ExitCode::from(2);
        }
    };

    let url = std::env::var("PANKOW_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    match run(&url, payload).await {
        Ok(TaskState::Completed) => ExitCode::SUCCESS,
        Ok(status) => {
            warn!("Trade plan resolved as {}", status);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Send the payload and print every message until the plan resolves.
async fn run(url: &str, payload: String) -> Result<TaskState, Box<dyn std::error::Error>> {
    info!("Connecting to {}", url);
    let (stream, _) = connect_async(url).await?;
    let (mut write, mut read) = stream.split();

    write.send(Message::Text(payload)).await?;

    while let Some(frame) = read.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        println!("{}", text);

        match serde_json::from_str::<ProgressMessage>(&text) {
            Ok(message) if message.is_terminal() => {
                // Best effort, the server may already be gone
                let _ = write.send(Message::Close(None)).await;
                return Ok(message.status);
            }
            Ok(_) => {}
            Err(e) => warn!("Unrecognised message from server: {}", e),
        }
    }

    Err("Connection closed before the trade plan resolved".into())
}
