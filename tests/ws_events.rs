//! WebSocket subscriptions receive match events caused by REST calls.

#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use common::{TestApp, at, spawn_app, str_at};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use shiftflex::domain::UserId;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn subscribe(app: &TestApp, user_ids: &[String]) -> Ws {
    let Ok((mut ws, _)) = connect_async(format!("ws://{}/ws", app.addr)).await else {
        panic!("ws connect");
    };
    let cmd = json!({
        "id": "sub-1",
        "type": "command",
        "timestamp": chrono::Utc::now(),
        "payload": { "command": "subscribe", "user_ids": user_ids },
    });
    let Ok(()) = ws.send(Message::text(cmd.to_string())).await else {
        panic!("ws send");
    };
    let reply = next_json(&mut ws).await;
    assert_eq!(*at(&reply, "/type"), "response");
    assert_eq!(*at(&reply, "/id"), "sub-1");
    ws
}

async fn next_json(ws: &mut Ws) -> Value {
    let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(5), ws.next()).await else {
        panic!("no ws message within 5s");
    };
    let Ok(text) = msg.to_text() else {
        panic!("expected a text frame");
    };
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        panic!("ws frame is not JSON: {text}");
    };
    value
}

async fn pair(app: &TestApp, x: UserId, y: UserId) -> (String, String) {
    let s1 = app.shift(x, "2025-06-01", "08:00:00", "16:00:00").await;
    let s2 = app.shift(y, "2025-06-10", "08:00:00", "16:00:00").await;
    (
        app.offer(x, &s1, "2025-06-10").await,
        app.offer(y, &s2, "2025-06-01").await,
    )
}

#[tokio::test]
async fn party_subscriber_sees_the_lifecycle() {
    let app = spawn_app().await;
    let (x, y) = (UserId::new(), UserId::new());
    let mut ws = subscribe(&app, &[y.to_string()]).await;

    let (req_x, req_y) = pair(&app, x, y).await;
    let (status, created) = app
        .post(
            Some(x),
            "/api/v1/matches",
            &json!({ "requester_request_id": req_x, "acceptor_request_id": req_y }),
        )
        .await;
    assert_eq!(status, 201);
    let match_id = str_at(&created, "/match/id");

    let event = next_json(&mut ws).await;
    assert_eq!(*at(&event, "/type"), "event");
    assert_eq!(*at(&event, "/payload/event_type"), "match_created");

    let (status, _) = app
        .post(Some(y), &format!("/api/v1/matches/{match_id}/accept"), &json!({}))
        .await;
    assert_eq!(status, 200);
    let event = next_json(&mut ws).await;
    assert_eq!(*at(&event, "/payload/event_type"), "match_accepted");
}

#[tokio::test]
async fn wildcard_and_unrelated_subscribers() {
    let app = spawn_app().await;
    let (x, y) = (UserId::new(), UserId::new());
    let mut all = subscribe(&app, &["*".to_string()]).await;
    let mut other = subscribe(&app, &[UserId::new().to_string()]).await;

    let (req_x, req_y) = pair(&app, x, y).await;
    let (status, _) = app
        .post(
            Some(x),
            "/api/v1/matches",
            &json!({ "requester_request_id": req_x, "acceptor_request_id": req_y }),
        )
        .await;
    assert_eq!(status, 201);

    let event = next_json(&mut all).await;
    assert_eq!(*at(&event, "/payload/event_type"), "match_created");

    let nothing = tokio::time::timeout(Duration::from_millis(200), other.next()).await;
    assert!(nothing.is_err(), "unrelated subscriber got {nothing:?}");
}

#[tokio::test]
async fn malformed_command_gets_an_error_frame() {
    let app = spawn_app().await;
    let Ok((mut ws, _)) = connect_async(format!("ws://{}/ws", app.addr)).await else {
        panic!("ws connect");
    };
    let Ok(()) = ws.send(Message::text("not json")).await else {
        panic!("ws send");
    };
    let reply = next_json(&mut ws).await;
    assert_eq!(*at(&reply, "/type"), "error");
    assert_eq!(*at(&reply, "/payload/code"), 400);
}
