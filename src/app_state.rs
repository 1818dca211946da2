//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::MatchService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Match service for all business logic.
    pub match_service: Arc<MatchService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Secret expected in `X-Admin-Token`; admin routes are closed when
    /// `None`.
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Builds the state around a service, sharing its event bus.
    #[must_use]
    pub fn new(match_service: Arc<MatchService>) -> Self {
        Self {
            event_bus: match_service.event_bus().clone(),
            match_service,
            admin_token: None,
        }
    }

    /// Opens the admin routes to callers presenting `token`.
    #[must_use]
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }
}
