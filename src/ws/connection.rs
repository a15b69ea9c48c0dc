//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection:
//! dispatches client events to the [`ChatService`], forwards the
//! connection's outbox and visible presence changes to the client, and
//! runs the disconnect handler when the socket goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::{ClientEvent, SendMessagePayload, parse_client_frame};
use crate::domain::{ConnectionId, ServerEvent, Session};
use crate::service::{ChatService, TypingSignal};

type WsSink = SplitSink<WebSocket, Message>;
type SendQueue = mpsc::UnboundedSender<SendMessagePayload>;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - `message:send` events are handed to a per-connection send worker so
///   that a slow store never stalls the read loop; sends from one
///   connection are still persisted in the order they arrived.
/// - `user:join` and typing events are handled inline.
/// - Events from the connection's outbox and presence changes from other
///   connections are written to the client.
pub async fn run_connection(socket: WebSocket, service: Arc<ChatService>) {
    let Session {
        connection_id,
        mut outbox,
        mut presence,
    } = service.connect().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (send_tx, send_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_send_worker(
        Arc::clone(&service),
        connection_id,
        send_rx,
    ));

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match parse_client_frame(text.as_str()) {
                        Ok(event) => {
                            if !handle_event(&service, connection_id, &send_tx, event).await {
                                break;
                            }
                        }
                        Err(error_frame) => {
                            tracing::debug!(%connection_id, "rejected client frame");
                            if write_event(&mut ws_tx, &error_frame).await.is_err() {
                                break;
                            }
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%connection_id, error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Event addressed to this connection
            Some(event) = outbox.recv() => {
                if write_event(&mut ws_tx, &event).await.is_err() {
                    break;
                }
            }
            // Presence change made by another connection
            Some(event) = presence.recv() => {
                if write_event(&mut ws_tx, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Queued sends still get persisted; their acks are dropped.
    drop(send_tx);
    service.disconnect(connection_id).await;
    tracing::debug!(%connection_id, "ws connection closed");
}

/// Dispatches one client event. Returns `false` once the send worker is
/// gone and the connection should stop.
async fn handle_event(
    service: &ChatService,
    connection_id: ConnectionId,
    sends: &SendQueue,
    event: ClientEvent,
) -> bool {
    match event {
        ClientEvent::Join(user_id) => {
            if let Err(err) = service.join(connection_id, user_id).await {
                tracing::warn!(%connection_id, %user_id, error = %err, "join rejected");
            }
        }
        ClientEvent::SendMessage(payload) => return sends.send(payload).is_ok(),
        ClientEvent::TypingStart(payload) => {
            service
                .relay_typing(
                    connection_id,
                    TypingSignal::Start,
                    payload.sender_id,
                    payload.receiver_id,
                )
                .await;
        }
        ClientEvent::TypingStop(payload) => {
            service
                .relay_typing(
                    connection_id,
                    TypingSignal::Stop,
                    payload.sender_id,
                    payload.receiver_id,
                )
                .await;
        }
    }
    true
}

/// Persists and routes this connection's sends one at a time.
async fn run_send_worker(
    service: Arc<ChatService>,
    connection_id: ConnectionId,
    mut queue: mpsc::UnboundedReceiver<SendMessagePayload>,
) {
    while let Some(payload) = queue.recv().await {
        // Failures were already reported to the client as `message:error`.
        let _ = service
            .send_message(
                connection_id,
                payload.sender_id,
                payload.receiver_id,
                payload.content,
            )
            .await;
    }
}

/// Serializes `event` and writes it as a text frame.
async fn write_event(ws_tx: &mut WsSink, event: &ServerEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => ws_tx.send(Message::text(json)).await,
        Err(err) => {
            tracing::error!(event = event.event_name(), error = %err, "failed to encode event");
            Ok(())
        }
    }
}
