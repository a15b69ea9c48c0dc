//! WebSocket layer: connection handling and client frame parsing.
//!
//! The WebSocket endpoint at `/ws` carries the realtime chat protocol:
//! joins, direct messages, typing signals, and presence updates.

pub mod connection;
pub mod handler;
pub mod messages;
