//! Service layer: business logic orchestration.
//!
//! [`ChatService`] coordinates joins, message routing, typing relay, and
//! disconnects on top of the [`crate::domain::ChatHub`] and the
//! [`crate::persistence::MessageStore`].

pub mod chat_service;

pub use chat_service::{ChatService, SendReceipt, TypingSignal};
