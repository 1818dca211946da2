//! Shift handlers: create, repeat, list.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CreateShiftRequest, ListResponse, RepeatShiftRequest, ShiftDto};
use crate::api::extract::ActingUser;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ShiftFlexError};
use crate::service::ShiftTemplate;

/// `POST /shifts`: Create a shift owned by the caller.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] on store failures.
#[utoipa::path(
    post,
    path = "/api/v1/shifts",
    tag = "Shifts",
    summary = "Create a shift",
    request_body = CreateShiftRequest,
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Shift created", body = ShiftDto),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn create_shift(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<CreateShiftRequest>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let template = ShiftTemplate::from(req);
    let shift = state
        .match_service
        .create_shift(user.actor(), &template)
        .await?;
    Ok((StatusCode::CREATED, Json(ShiftDto::from(shift))))
}

/// `POST /shifts/repeat`: Create a 4-on/4-off rotation.
///
/// # Errors
///
/// Returns [`ShiftFlexError::InvalidRequest`] for an empty or too long
/// range.
#[utoipa::path(
    post,
    path = "/api/v1/shifts/repeat",
    tag = "Shifts",
    summary = "Create repeating shifts",
    description = "Generates shifts on a 4 days on, 4 days off cycle from `start_date` through `until`.",
    request_body = RepeatShiftRequest,
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Shifts created", body = ListResponse<ShiftDto>),
        (status = 400, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn create_repeating_shifts(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<RepeatShiftRequest>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let (template, until) = req.into_parts();
    let shifts = state
        .match_service
        .create_repeating_shifts(user.actor(), &template, until)
        .await?;
    let data: Vec<ShiftDto> = shifts.into_iter().map(ShiftDto::from).collect();
    Ok((StatusCode::CREATED, Json(ListResponse::new(data))))
}

/// `GET /shifts`: Shifts the caller currently owns.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/shifts",
    tag = "Shifts",
    summary = "List my shifts",
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 200, description = "Owned shifts", body = ListResponse<ShiftDto>),
    )
)]
pub async fn list_shifts(
    State(state): State<AppState>,
    user: ActingUser,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let shifts = state.match_service.list_shifts(user.actor()).await?;
    let data: Vec<ShiftDto> = shifts.into_iter().map(ShiftDto::from).collect();
    Ok(Json(ListResponse::new(data)))
}

/// Shift routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shifts", post(create_shift).get(list_shifts))
        .route("/shifts/repeat", post(create_repeating_shifts))
}
