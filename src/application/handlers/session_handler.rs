use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::application::services::trade_session::TradeSession;
use crate::domain::entities::action_log::ProgressMessage;

/// Trade session endpoint. Each text frame is one trade request.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.session))
}

async fn handle_socket(socket: WebSocket, session: TradeSession) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut messages) = mpsc::unbounded_channel::<ProgressMessage>();

    // Forward progress messages to this WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize progress message: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                debug!("Session socket closed while sending");
                break;
            }
        }
    });

    info!("Trade session opened");

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(payload)) => {
                let outcome = session.handle_request(&payload, &outbound).await;
                info!(
                    "Trade request resolved: plan {:?}, status {}",
                    outcome.trade_plan_id, outcome.status
                );
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame on trade session");
            }
            Ok(Message::Close(_)) => break,
            // Axum answers pings itself
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                warn!("Trade session receive error: {}", e);
                break;
            }
        }
    }

    // Flush what is still queued, then stop the writer
    drop(outbound);
    if let Err(e) = send_task.await {
        error!("Session writer task failed: {}", e);
    }

    info!("Trade session closed");
}
