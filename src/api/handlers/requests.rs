//! Swap request handlers: submit, list, withdraw, remove a preferred date.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, post};
use axum::{Json, Router};

use crate::api::dto::{
    ListResponse, PreferredDateRemovalResponse, RequestListParams, SubmitSwapRequest,
    SwapRequestDto,
};
use crate::api::extract::ActingUser;
use crate::app_state::AppState;
use crate::domain::{PreferredDateId, RequestId};
use crate::error::{ErrorResponse, ShiftFlexError};
use crate::service::{PreferredDateInput, SwapRequestDetail};

/// `POST /swap-requests`: Offer a shift for swapping.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] if the shift is unknown, not the caller's,
/// already offered, or the dates are invalid.
#[utoipa::path(
    post,
    path = "/api/v1/swap-requests",
    tag = "Swap requests",
    summary = "Submit a swap request",
    request_body = SubmitSwapRequest,
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Request submitted", body = SwapRequestDto),
        (status = 400, description = "Invalid dates", body = ErrorResponse),
        (status = 403, description = "Shift not owned by caller", body = ErrorResponse),
        (status = 404, description = "Shift not found", body = ErrorResponse),
        (status = 409, description = "Shift already offered", body = ErrorResponse),
    )
)]
pub async fn submit_swap_request(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<SubmitSwapRequest>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let dates: Vec<PreferredDateInput> = req
        .preferred_dates
        .into_iter()
        .map(PreferredDateInput::from)
        .collect();
    let detail = state
        .match_service
        .submit_swap_request(user.actor(), req.shift_id, &dates)
        .await?;
    Ok((StatusCode::CREATED, Json(SwapRequestDto::from(detail))))
}

/// `GET /swap-requests`: The caller's requests.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/swap-requests",
    tag = "Swap requests",
    summary = "List my swap requests",
    params(
        RequestListParams,
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Requests with preferred dates", body = ListResponse<SwapRequestDto>),
    )
)]
pub async fn list_swap_requests(
    State(state): State<AppState>,
    user: ActingUser,
    Query(params): Query<RequestListParams>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let requests = state
        .match_service
        .list_requests(user.actor(), params.status)
        .await?;
    let data: Vec<SwapRequestDto> = requests.into_iter().map(SwapRequestDto::from).collect();
    Ok(Json(ListResponse::new(data)))
}

/// `DELETE /swap-requests/{id}`: Withdraw a pending request.
///
/// # Errors
///
/// Returns [`ShiftFlexError::InvalidState`] if it is no longer pending and
/// [`ShiftFlexError::Conflict`] if an active match holds it.
#[utoipa::path(
    delete,
    path = "/api/v1/swap-requests/{id}",
    tag = "Swap requests",
    summary = "Withdraw a swap request",
    params(
        ("id" = uuid::Uuid, Path, description = "Swap request UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Request cancelled", body = SwapRequestDto),
        (status = 404, description = "Request not found", body = ErrorResponse),
        (status = 409, description = "Request not pending or in an active match", body = ErrorResponse),
    )
)]
pub async fn withdraw_swap_request(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let request = state
        .match_service
        .withdraw_swap_request(user.actor(), RequestId::from_uuid(id))
        .await?;
    let detail = SwapRequestDetail {
        request,
        preferred_dates: Vec::new(),
    };
    Ok(Json(SwapRequestDto::from(detail)))
}

/// `DELETE /swap-requests/{id}/preferred-dates/{date_id}`: Remove one
/// preferred date; removing the last one deletes the request.
///
/// # Errors
///
/// Returns [`ShiftFlexError::NotFound`] for an unknown request or date.
#[utoipa::path(
    delete,
    path = "/api/v1/swap-requests/{id}/preferred-dates/{date_id}",
    tag = "Swap requests",
    summary = "Remove a preferred date",
    params(
        ("id" = uuid::Uuid, Path, description = "Swap request UUID"),
        ("date_id" = uuid::Uuid, Path, description = "Preferred date UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Date removed", body = PreferredDateRemovalResponse),
        (status = 404, description = "Request or date not found", body = ErrorResponse),
        (status = 409, description = "Request not pending or in an active match", body = ErrorResponse),
    )
)]
pub async fn remove_preferred_date(
    State(state): State<AppState>,
    user: ActingUser,
    Path((id, date_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let removal = state
        .match_service
        .remove_preferred_date(
            user.actor(),
            RequestId::from_uuid(id),
            PreferredDateId::from_uuid(date_id),
        )
        .await?;
    Ok(Json(PreferredDateRemovalResponse::from(removal)))
}

/// Swap request routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/swap-requests",
            post(submit_swap_request).get(list_swap_requests),
        )
        .route("/swap-requests/{id}", delete(withdraw_swap_request))
        .route(
            "/swap-requests/{id}/preferred-dates/{date_id}",
            delete(remove_preferred_date),
        )
}
