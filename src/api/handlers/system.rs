//! System endpoints: health check, shift type catalog.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::ShiftType;
use crate::domain::shift::{DAY_SHIFT_LAST_HOUR, NIGHT_SHIFT_FIRST_HOUR};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Shift type with the start hours it covers.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShiftTypeInfo {
    shift_type: ShiftType,
    first_start_hour: u32,
    last_start_hour: u32,
}

fn shift_type_catalog() -> Vec<ShiftTypeInfo> {
    ShiftType::ALL
        .into_iter()
        .map(|shift_type| {
            let (first_start_hour, last_start_hour) = match shift_type {
                ShiftType::Day => (0, DAY_SHIFT_LAST_HOUR),
                ShiftType::Afternoon => (DAY_SHIFT_LAST_HOUR + 1, NIGHT_SHIFT_FIRST_HOUR - 1),
                ShiftType::Night => (NIGHT_SHIFT_FIRST_HOUR, 23),
            };
            ShiftTypeInfo {
                shift_type,
                first_start_hour,
                last_start_hour,
            }
        })
        .collect()
}

/// `GET /config/shift-types`: How start hours map to shift types.
#[utoipa::path(
    get,
    path = "/config/shift-types",
    tag = "System",
    summary = "List shift types",
    description = "Returns the start-hour ranges used to derive a shift's type.",
    responses(
        (status = 200, description = "Shift type catalog", body = Vec<ShiftTypeInfo>),
    )
)]
pub async fn shift_types_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(shift_type_catalog()))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/shift-types", get(shift_types_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_hour_once() {
        let catalog = shift_type_catalog();
        for hour in 0..24 {
            let covering: Vec<&ShiftTypeInfo> = catalog
                .iter()
                .filter(|t| (t.first_start_hour..=t.last_start_hour).contains(&hour))
                .collect();
            assert_eq!(covering.len(), 1, "hour {hour}");
        }
    }
}
