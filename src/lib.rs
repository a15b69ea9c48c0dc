//! # devconnect-realtime
//!
//! Realtime presence and direct-messaging gateway for the DevConnect
//! developer network.
//!
//! Clients open a WebSocket, attach a user identity with `user:join`, and
//! then exchange direct messages and typing indicators. Presence changes
//! are broadcast to every other connection. Messages are persisted before
//! they are delivered, so history survives restarts and is served over
//! REST.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ChatService (service/)
//!     │
//!     ├── ChatHub (domain/)
//!     │     ├── ConnectionRegistry
//!     │     ├── per-connection outboxes
//!     │     └── PresenceBus
//!     │
//!     └── UserDirectory / MessageStore (persistence/)
//!           ├── PostgreSQL
//!           └── in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod server;
pub mod service;
pub mod ws;
