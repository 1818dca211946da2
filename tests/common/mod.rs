//! Shared harness: a real server on an ephemeral port over the in-memory
//! store, with a notifier that records outgoing mail.

#![allow(dead_code, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shiftflex::api::build_app;
use shiftflex::app_state::AppState;
use shiftflex::domain::{EventBus, UserId};
use shiftflex::notify::{EmailError, EmailMessage, EmailSender, Notifier};
use shiftflex::persistence::{MemoryStore, SwapStore};
use shiftflex::service::{MatchService, ServiceSettings};

/// Token the harness server accepts on admin routes.
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Keeps every message instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

/// A running test server.
pub struct TestApp {
    /// `http://127.0.0.1:<port>`
    pub base: String,
    /// `127.0.0.1:<port>`
    pub addr: String,
    /// Backing store, for direct assertions.
    pub store: Arc<MemoryStore>,
    /// Mail handed to the notifier's sender.
    pub mail: Arc<RecordingSender>,
    /// HTTP client.
    pub client: reqwest::Client,
}

pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(MatchService::new(
        Arc::clone(&store) as Arc<dyn SwapStore>,
        EventBus::new(64),
        ServiceSettings::default(),
    ));

    let mail = Arc::new(RecordingSender::default());
    let _notifier = Notifier::new(
        Arc::clone(&store) as Arc<dyn SwapStore>,
        Arc::clone(&mail) as Arc<dyn EmailSender>,
        Duration::from_secs(1),
    )
    .spawn(service.event_bus().subscribe());

    let app = build_app(AppState::new(service).with_admin_token(Some(ADMIN_TOKEN.to_string())));

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(local) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestApp {
        base: format!("http://{local}"),
        addr: local.to_string(),
        store,
        mail,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn post(&self, user: Option<UserId>, path: &str, body: &Value) -> (u16, Value) {
        let mut req = self.client.post(format!("{}{path}", self.base)).json(body);
        if let Some(user) = user {
            req = req.header("x-user-id", user.to_string());
        }
        send(req).await
    }

    /// `POST` as `user`, also presenting `email` in `x-user-email`.
    pub async fn post_with_email(
        &self,
        user: UserId,
        email: &str,
        path: &str,
        body: &Value,
    ) -> (u16, Value) {
        let req = self
            .client
            .post(format!("{}{path}", self.base))
            .header("x-user-id", user.to_string())
            .header("x-user-email", email)
            .json(body);
        send(req).await
    }

    /// `POST /api/v1/admin/sweep`, with `token` in `x-admin-token` if given.
    pub async fn sweep(&self, token: Option<&str>) -> (u16, Value) {
        let mut req = self.client.post(format!("{}/api/v1/admin/sweep", self.base));
        if let Some(token) = token {
            req = req.header("x-admin-token", token);
        }
        send(req).await
    }

    /// Waits until at least `count` messages were recorded, then returns
    /// them.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<EmailMessage> {
        for _ in 0..100 {
            let sent = self.mail.messages();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} emails, got {:?}", self.mail.messages());
    }

    pub async fn get(&self, user: Option<UserId>, path: &str) -> (u16, Value) {
        let mut req = self.client.get(format!("{}{path}", self.base));
        if let Some(user) = user {
            req = req.header("x-user-id", user.to_string());
        }
        send(req).await
    }

    pub async fn delete(&self, user: UserId, path: &str) -> (u16, Value) {
        let req = self
            .client
            .delete(format!("{}{path}", self.base))
            .header("x-user-id", user.to_string());
        send(req).await
    }

    /// Creates a shift and returns its id.
    pub async fn shift(&self, user: UserId, date: &str, start: &str, end: &str) -> String {
        let (status, body) = self
            .post(
                Some(user),
                "/api/v1/shifts",
                &serde_json::json!({ "date": date, "start_time": start, "end_time": end }),
            )
            .await;
        assert_eq!(status, 201, "create shift: {body}");
        str_at(&body, "/id")
    }

    /// Offers `shift_id` wanting `wanted` and returns the request id.
    pub async fn offer(&self, user: UserId, shift_id: &str, wanted: &str) -> String {
        let (status, body) = self
            .post(
                Some(user),
                "/api/v1/swap-requests",
                &serde_json::json!({
                    "shift_id": shift_id,
                    "preferred_dates": [{ "date": wanted }],
                }),
            )
            .await;
        assert_eq!(status, 201, "submit request: {body}");
        str_at(&body, "/id")
    }
}

async fn send(req: reqwest::RequestBuilder) -> (u16, Value) {
    let Ok(resp) = req.send().await else {
        panic!("request failed");
    };
    let status = resp.status().as_u16();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

pub fn at<'a>(value: &'a Value, pointer: &str) -> &'a Value {
    value.pointer(pointer).unwrap_or(&Value::Null)
}

pub fn str_at(value: &Value, pointer: &str) -> String {
    let Some(s) = at(value, pointer).as_str() else {
        panic!("expected string at {pointer} in {value}");
    };
    s.to_string()
}
