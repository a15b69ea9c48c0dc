//! Client → server WebSocket frames.
//!
//! Frames are JSON objects of the shape `{"event": "<name>", "data": ...}`,
//! mirroring [`crate::domain::ServerEvent`] in the other direction.

use serde::Deserialize;

use crate::domain::{ServerEvent, UserId};

/// Payload of `message:send`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Author of the message.
    pub sender_id: UserId,
    /// Intended recipient.
    pub receiver_id: UserId,
    /// Message body.
    pub content: String,
}

/// Payload of `typing:start` / `typing:stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    /// The user who is typing.
    pub sender_id: UserId,
    /// The user being typed to.
    pub receiver_id: UserId,
}

/// Events a client can emit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Attach a user identity to this connection.
    #[serde(rename = "user:join")]
    Join(UserId),
    /// Send a direct message.
    #[serde(rename = "message:send")]
    SendMessage(SendMessagePayload),
    /// Started typing to someone.
    #[serde(rename = "typing:start")]
    TypingStart(TypingPayload),
    /// Stopped typing to someone.
    #[serde(rename = "typing:stop")]
    TypingStop(TypingPayload),
}

const KNOWN_EVENTS: [&str; 4] = ["user:join", "message:send", "typing:start", "typing:stop"];

/// Just enough structure to tell a malformed frame from an unknown event.
#[derive(Debug, Deserialize)]
struct FrameHeader {
    event: String,
}

/// Parses a text frame, or returns the `error` frame to send back.
///
/// Invalid JSON, a missing `event`, or a payload with missing or
/// non-UUID ids yields code 400; an unrecognized event name yields 404.
///
/// # Errors
///
/// Returns the [`ServerEvent::Error`] describing why the frame was
/// rejected.
pub fn parse_client_frame(text: &str) -> Result<ClientEvent, ServerEvent> {
    let header: FrameHeader = serde_json::from_str(text)
        .map_err(|_| ServerEvent::protocol_error(400, "malformed frame"))?;

    if !KNOWN_EVENTS.contains(&header.event.as_str()) {
        return Err(ServerEvent::protocol_error(
            404,
            format!("unknown event: {}", header.event),
        ));
    }

    serde_json::from_str(text).map_err(|e| {
        ServerEvent::protocol_error(400, format!("invalid {} payload: {e}", header.event))
    })
}
