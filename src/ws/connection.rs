//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching subscription commands and forwarding filtered match events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{MatchEvent, UserId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards events whose parties match the subscription filter.
pub async fn run_connection(socket: WebSocket, mut event_rx: broadcast::Receiver<MatchEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(match_event) => {
                        if !subs.matches(&match_event.parties()) {
                            continue;
                        }
                        let Ok(payload) = serde_json::to_value(&match_event) else {
                            continue;
                        };
                        let msg = WsMessage::new(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            payload,
                        );
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Splits raw ids into parsed users and the wildcard flag. Unparseable
/// entries are dropped.
fn parse_user_ids(raw: &[String]) -> (Vec<UserId>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for s in raw {
        if s == "*" {
            wildcard = true;
        } else if let Ok(uuid) = s.parse::<uuid::Uuid>() {
            ids.push(UserId::from_uuid(uuid));
        }
    }
    (ids, wildcard)
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    if msg.msg_type != WsMessageType::Command {
        return serde_json::to_string(&WsMessage::error(msg.id, 400, "expected a command")).ok();
    }

    let response = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::Subscribe { user_ids }) => {
            let (ids, wildcard) = parse_user_ids(&user_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Ok(WsCommand::Unsubscribe { user_ids }) => {
            let (ids, wildcard) = parse_user_ids(&user_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&response).ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn reply(text: &str, subs: &mut SubscriptionManager) -> serde_json::Value {
        let Some(raw) = handle_text_message(text, subs) else {
            panic!("expected a reply");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            panic!("reply is JSON");
        };
        value
    }

    fn at<'a>(value: &'a serde_json::Value, pointer: &str) -> &'a serde_json::Value {
        value.pointer(pointer).unwrap_or(&serde_json::Value::Null)
    }

    #[test]
    fn subscribe_command_updates_filter() {
        let mut subs = SubscriptionManager::new();
        let user = UserId::new();
        let text = serde_json::json!({
            "id": "c1",
            "type": "command",
            "timestamp": chrono::Utc::now(),
            "payload": { "command": "subscribe", "user_ids": [user.to_string(), "nope"] }
        })
        .to_string();
        let value = reply(&text, &mut subs);
        assert_eq!(*at(&value, "/type"), "response");
        assert_eq!(*at(&value, "/id"), "c1");
        assert_eq!(*at(&value, "/payload/count"), 1);
        assert_eq!(subs.count(), 1);
    }

    #[test]
    fn malformed_json_yields_error() {
        let mut subs = SubscriptionManager::new();
        let value = reply("{not json", &mut subs);
        assert_eq!(*at(&value, "/type"), "error");
        assert_eq!(*at(&value, "/payload/code"), 400);
    }

    #[test]
    fn unknown_command_yields_error() {
        let mut subs = SubscriptionManager::new();
        let text = serde_json::json!({
            "id": "c2",
            "type": "command",
            "timestamp": chrono::Utc::now(),
            "payload": { "command": "swap" }
        })
        .to_string();
        let value = reply(&text, &mut subs);
        assert_eq!(*at(&value, "/payload/code"), 404);
    }
}
