//! Websocket endpoint: handshake, then the frame loop.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::auth::token::TokenCodec;
use crate::auth::SessionManager;

use super::frame::{Command, Frame};
use super::gatekeeper::{self, ConnectionIdentity};
use super::hub::ChatHub;

const OUTBOUND_BUFFER: usize = 64;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(manager): Extension<Arc<SessionManager>>,
    Extension(hub): Extension<Arc<ChatHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, manager, hub))
}

async fn handle_socket(mut socket: WebSocket, manager: Arc<SessionManager>, hub: Arc<ChatHub>) {
    // Authentication happens exactly once, on the CONNECT frame. A rejected
    // handshake never reaches the frame loop.
    let Some(identity) = handshake(&mut socket, manager.codec()).await else {
        return;
    };

    debug!(
        "websocket session established for principal {}",
        identity.principal_id
    );

    let (mut sink, mut stream) = socket.split();

    // Single writer task; subscription forwarders and the frame loop feed it.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::Text(frame.encode())).await.is_err() {
                break;
            }
        }
    });

    let mut forwarders = Vec::new();

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let frame = match Frame::parse(&text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(
                    "dropping unparsable frame from principal {}: {err}",
                    identity.principal_id
                );
                let _ = outbound_tx
                    .send(error_frame(&format!("unparsable frame: {err}")))
                    .await;
                continue;
            }
        };

        match frame.command {
            Command::Subscribe => {
                let Some(destination) = frame.header("destination") else {
                    let _ = outbound_tx
                        .send(error_frame("SUBSCRIBE requires a destination header"))
                        .await;
                    continue;
                };
                let receiver = hub.subscribe(destination).await;
                forwarders.push(spawn_forwarder(receiver, outbound_tx.clone()));
            }
            Command::Send => {
                let Some(destination) = frame.header("destination") else {
                    let _ = outbound_tx
                        .send(error_frame("SEND requires a destination header"))
                        .await;
                    continue;
                };
                hub.publish(destination, identity.principal_id, &frame.body)
                    .await;
            }
            Command::Disconnect => break,
            other => {
                debug!(
                    "ignoring {} frame from principal {}",
                    other.as_str(),
                    identity.principal_id
                );
            }
        }
    }

    for forwarder in &forwarders {
        forwarder.abort();
    }
    writer.abort();

    debug!(
        "websocket session closed for principal {}",
        identity.principal_id
    );
}

/// Drive the handshake: the first text frame must be an authenticated
/// CONNECT. On success the client sees CONNECTED; on failure an ERROR frame
/// and the close of the socket, and the session never starts.
async fn handshake(socket: &mut WebSocket, codec: &TokenCodec) -> Option<ConnectionIdentity> {
    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return None,
            // Control frames may arrive before CONNECT.
            _ => continue,
        };

        let verdict = Frame::parse(&text)
            .map_err(|err| err.to_string())
            .and_then(|frame| {
                gatekeeper::admit(&frame, codec, crate::auth::unix_now())
                    .map_err(|err| err.to_string())
            });

        return match verdict {
            Ok(identity) => {
                let connected = Frame::new(Command::Connected)
                    .with_header("version", "1.2")
                    .with_header("user-id", &identity.principal_id.to_string());
                if socket
                    .send(Message::Text(connected.encode()))
                    .await
                    .is_err()
                {
                    return None;
                }
                Some(identity)
            }
            Err(reason) => {
                warn!("websocket handshake rejected: {reason}");
                let _ = socket
                    .send(Message::Text(error_frame(&reason).encode()))
                    .await;
                let _ = socket.send(Message::Close(None)).await;
                None
            }
        };
    }

    None
}

fn spawn_forwarder(
    mut receiver: broadcast::Receiver<super::hub::ChatMessage>,
    outbound_tx: mpsc::Sender<Frame>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    let frame = Frame::new(Command::Message)
                        .with_header("destination", &message.destination)
                        .with_header("user-id", &message.sender.to_string())
                        .with_body(&message.body);
                    if outbound_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("subscriber lagged, skipped {skipped} messages");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn error_frame(reason: &str) -> Frame {
    Frame::new(Command::Error).with_header("message", reason)
}
