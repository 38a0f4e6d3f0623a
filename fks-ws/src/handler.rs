//! The axum WebSocket endpoint: per-connection
//! task that registers/deregisters with the subscription registry,
//! applies client subscribe/unsubscribe/ping messages, and forwards
//! broadcast events whose symbol matches the connection's subscription.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

use crate::fanout::FanoutController;
use crate::protocol::ClientMessage;

/// Upgrade an HTTP request to a WebSocket and hand it off to
/// [`handle_socket`].
pub async fn ws_handler(ws: WebSocketUpgrade, State(controller): State<Arc<FanoutController>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, controller))
}

async fn handle_socket(mut socket: WebSocket, controller: Arc<FanoutController>) {
    let registry = controller.registry();
    let id = registry.register().await;
    let mut events = controller.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else {
                    // Lagged or the broadcaster shut down; either way this
                    // connection has nothing more to receive.
                    break;
                };
                if !registry.matches(id, &event.symbol).await {
                    continue;
                }
                let msg = serde_json::to_string(&event.to_server_message())
                    .unwrap_or_else(|_| r#"{"type":"error","message":"serialize failure"}"#.to_string());
                if socket.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(text) => {
                        if !handle_client_message(&mut socket, &controller, id, &text).await {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    registry.remove(id).await;
    controller.notify_changed();
}

/// Apply one client text frame. Returns `false` if the connection should
/// be closed (a send failure while replying).
async fn handle_client_message(
    socket: &mut WebSocket,
    controller: &FanoutController,
    id: crate::registry::ConnectionId,
    text: &str,
) -> bool {
    let registry = controller.registry();
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    let Ok(parsed) = parsed else {
        let msg = serde_json::json!({"type": "error", "message": "malformed message"}).to_string();
        return socket.send(Message::Text(msg)).await.is_ok();
    };

    match parsed {
        ClientMessage::Subscribe {
            symbols,
            timeframes,
            provider,
        } => {
            let sub = registry.subscribe(id, &symbols, &timeframes, provider).await;
            controller.notify_changed();
            let msg = serde_json::json!({
                "type": "status",
                "message": "subscribed",
                "symbols": sub.symbols,
                "timeframes": sub.timeframes,
            })
            .to_string();
            socket.send(Message::Text(msg)).await.is_ok()
        }
        ClientMessage::Unsubscribe { symbols, timeframes } => {
            let sub = registry.unsubscribe(id, &symbols, &timeframes).await;
            controller.notify_changed();
            let msg = serde_json::json!({
                "type": "status",
                "message": "unsubscribed",
                "symbols": sub.symbols,
                "timeframes": sub.timeframes,
            })
            .to_string();
            socket.send(Message::Text(msg)).await.is_ok()
        }
        ClientMessage::Ping => {
            let msg = serde_json::json!({"type": "pong"}).to_string();
            socket.send(Message::Text(msg)).await.is_ok()
        }
    }
}
