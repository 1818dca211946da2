//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The endpoint at `/ws` streams [`crate::domain::MatchEvent`]s to clients
//! that subscribe to one or more user ids (or `"*"`).

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
