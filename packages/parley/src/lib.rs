//! Parley - terminal chat client backed by a message-exchange server
//!
//! The core is the connection/reconciliation state machine: a
//! [`connection::ConnectionManager`] that keeps one WebSocket alive with
//! bounded backoff recovery, and a [`controller::ChatController`] that
//! bridges user intent to the message cache and emits view frames for an
//! external renderer. Message state itself lives in the `chat_store` crate.

pub mod config;
pub mod connection;
pub mod controller;
pub mod protocol;
pub mod view;
