use crate::controller::PageCommand;
use crate::session::PageHandle;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

const REPLY_CHANNEL_CAPACITY: usize = 16;

/// Handle a WebSocket connection to one page
pub async fn handle_connection(socket: WebSocket, handle: PageHandle, client_id: String) {
    info!(page = handle.page().as_str(), "WebSocket client connected: {}", client_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before taking the snapshot so nothing falls between the two
    let mut rx = handle.subscribe();
    let page = handle.page();

    // Replies to this client only (pong, toggle results, errors)
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(REPLY_CHANNEL_CAPACITY);

    let send_client_id = client_id.clone();
    let recv_client_id = client_id.clone();
    let snapshot_handle = handle.clone();

    let mut send_task = tokio::spawn(async move {
        let snapshot = ServerMessage::snapshot(page, snapshot_handle.snapshot());
        if send_json(&mut ws_sender, &snapshot).await.is_err() {
            return;
        }

        loop {
            let message = tokio::select! {
                update = rx.recv() => match update {
                    Ok(updates) => ServerMessage::updates(page, updates),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged by {} updates, resending snapshot", send_client_id, skipped);
                        ServerMessage::snapshot(page, snapshot_handle.snapshot())
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = reply_rx.recv() => reply,
            };

            if send_json(&mut ws_sender, &message).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            };

            let reply = match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Toggle { outlet }) => {
                        info!("Client {} toggling outlet {}", recv_client_id, outlet);
                        match handle.command(PageCommand::ToggleOutlet { outlet }).await {
                            Ok(reply) => reply.into(),
                            Err(e) => ServerMessage::error(e.to_string(), e.code()),
                        }
                    }
                    Ok(ClientMessage::Ping) => {
                        debug!("Received ping from client {}", recv_client_id);
                        ServerMessage::pong()
                    }
                    Err(e) => {
                        warn!("Failed to parse client message: {}", e);
                        ServerMessage::error(format!("Invalid message: {}", e), "INVALID_MESSAGE")
                    }
                },
                Message::Close(_) => {
                    info!("Client {} closed connection", recv_client_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                    continue;
                }
                Message::Binary(_) => {
                    warn!("Received unexpected binary message from client {}", recv_client_id);
                    continue;
                }
            };

            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => {
            debug!("Send task completed for client {}", client_id);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected: {}", client_id);
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            // Skip the message, keep the connection
            error!("Failed to serialize message: {}", e);
            return Ok(());
        }
    };

    sender.send(Message::Text(json.into())).await.map_err(|e| {
        error!("Failed to send message to WebSocket: {}", e);
    })
}
