//! Match handlers: discovery, creation, lifecycle transitions, sweep.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateMatchRequest, CreateMatchResponse, ListResponse, RestCheckResponse, SweepResponse,
};
use crate::api::extract::{ActingUser, AdminAccess};
use crate::app_state::AppState;
use crate::domain::{MatchCandidate, MatchId, PotentialMatch};
use crate::error::{ErrorResponse, ShiftFlexError};

/// `GET /matches/candidates`: Compatible pairs for the caller's pending
/// requests. Nothing is stored.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/matches/candidates",
    tag = "Matches",
    summary = "Find match candidates",
    description = "Pairs each pending request of the caller with every other user's pending request whose shift date it wants and which wants the caller's shift date. A request may appear in several candidates.",
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 200, description = "Candidate pairs", body = ListResponse<MatchCandidate>),
    )
)]
pub async fn list_candidates(
    State(state): State<AppState>,
    user: ActingUser,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let candidates = state
        .match_service
        .find_matches_for_user(user.actor())
        .await?;
    Ok(Json(ListResponse::new(candidates)))
}

/// `POST /matches`: Record a match between two pending requests.
///
/// # Errors
///
/// Returns [`ShiftFlexError::Conflict`] if either request is already in an
/// active match with a different partner.
#[utoipa::path(
    post,
    path = "/api/v1/matches",
    tag = "Matches",
    summary = "Create a match",
    description = "Idempotent for the same pair: an existing active match is returned with `created: false`.",
    request_body = CreateMatchRequest,
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Match created", body = CreateMatchResponse),
        (status = 200, description = "Existing match returned", body = CreateMatchResponse),
        (status = 400, description = "Requests are not compatible", body = ErrorResponse),
        (status = 409, description = "Request busy or not pending", body = ErrorResponse),
    )
)]
pub async fn create_match(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<CreateMatchRequest>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let creation = state
        .match_service
        .create_match(user.actor(), req.requester_request_id, req.acceptor_request_id)
        .await?;
    let status = if creation.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateMatchResponse::from(creation))))
}

/// `GET /matches`: Matches involving the caller, newest first.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/matches",
    tag = "Matches",
    summary = "List my matches",
    params(("x-user-id" = uuid::Uuid, Header, description = "Acting user")),
    responses(
        (status = 200, description = "Matches", body = ListResponse<PotentialMatch>),
    )
)]
pub async fn list_matches(
    State(state): State<AppState>,
    user: ActingUser,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let matches = state
        .match_service
        .list_matches_for_user(user.actor())
        .await?;
    Ok(Json(ListResponse::new(matches)))
}

/// `GET /matches/{id}`: One match.
///
/// # Errors
///
/// Returns [`ShiftFlexError::NotFound`] or [`ShiftFlexError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/matches/{id}",
    tag = "Matches",
    summary = "Get a match",
    params(
        ("id" = uuid::Uuid, Path, description = "Match UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Match", body = PotentialMatch),
        (status = 403, description = "Caller is not a party", body = ErrorResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
    )
)]
pub async fn get_match(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let m = state
        .match_service
        .get_match(user.actor(), MatchId::from_uuid(id))
        .await?;
    Ok(Json(m))
}

/// `POST /matches/{id}/accept`: `pending -> accepted`. Repeating the call
/// on an accepted match succeeds.
///
/// # Errors
///
/// Returns [`ShiftFlexError::InvalidState`] from `completed` or
/// `cancelled`.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/accept",
    tag = "Matches",
    summary = "Accept a match",
    params(
        ("id" = uuid::Uuid, Path, description = "Match UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Match accepted", body = PotentialMatch),
        (status = 409, description = "Match is completed or cancelled", body = ErrorResponse),
    )
)]
pub async fn accept_match(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let m = state
        .match_service
        .accept_match(user.actor(), MatchId::from_uuid(id))
        .await?;
    Ok(Json(m))
}

/// `POST /matches/{id}/finalize`: Swap shift ownership and complete.
///
/// # Errors
///
/// Returns [`ShiftFlexError::InvalidState`] unless the match is accepted,
/// and [`ShiftFlexError::Conflict`] if a shift changed owner meanwhile.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/finalize",
    tag = "Matches",
    summary = "Finalize a match",
    description = "Atomically swaps the owners of the two shifts and marks the match completed.",
    params(
        ("id" = uuid::Uuid, Path, description = "Match UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Match completed", body = PotentialMatch),
        (status = 409, description = "Match not accepted or ownership changed", body = ErrorResponse),
    )
)]
pub async fn finalize_match(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let m = state
        .match_service
        .finalize_match(user.actor(), MatchId::from_uuid(id))
        .await?;
    Ok(Json(m))
}

/// `POST /matches/{id}/cancel`: Cancel a pending or accepted match.
///
/// # Errors
///
/// Returns [`ShiftFlexError::InvalidState`] from `completed` or
/// `cancelled`.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/cancel",
    tag = "Matches",
    summary = "Cancel a match",
    params(
        ("id" = uuid::Uuid, Path, description = "Match UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Match cancelled", body = PotentialMatch),
        (status = 409, description = "Match already terminal", body = ErrorResponse),
    )
)]
pub async fn cancel_match(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let m = state
        .match_service
        .cancel_match(user.actor(), MatchId::from_uuid(id))
        .await?;
    Ok(Json(m))
}

/// `GET /matches/{id}/rest-check`: Advisory 10-hour rest check for both
/// parties.
///
/// # Errors
///
/// Returns [`ShiftFlexError::NotFound`] or [`ShiftFlexError::Forbidden`].
#[utoipa::path(
    get,
    path = "/api/v1/matches/{id}/rest-check",
    tag = "Matches",
    summary = "Check rest periods",
    params(
        ("id" = uuid::Uuid, Path, description = "Match UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Acting user"),
    ),
    responses(
        (status = 200, description = "Rest report", body = RestCheckResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
    )
)]
pub async fn rest_check(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let report = state
        .match_service
        .rest_check(user.actor(), MatchId::from_uuid(id))
        .await?;
    Ok(Json(RestCheckResponse::from(report)))
}

/// `POST /admin/sweep`: Run the matcher over all pending requests and
/// record every compatible pair. Requires `X-Admin-Token`.
///
/// # Errors
///
/// Returns [`ShiftFlexError`] on a missing or wrong admin token and on
/// store failures.
#[utoipa::path(
    post,
    path = "/api/v1/admin/sweep",
    tag = "Admin",
    summary = "Run a match sweep",
    description = "Closed unless the server was started with ADMIN_TOKEN.",
    params(("x-admin-token" = String, Header, description = "Shared admin secret")),
    responses(
        (status = 200, description = "Sweep report", body = SweepResponse),
        (status = 403, description = "Admin routes disabled or token wrong", body = ErrorResponse),
        (status = 503, description = "Store timed out", body = ErrorResponse),
    )
)]
pub async fn run_sweep(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ShiftFlexError> {
    let report = state.match_service.run_sweep().await?;
    Ok(Json(SweepResponse::from(report)))
}

/// Match routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches", post(create_match).get(list_matches))
        .route("/matches/candidates", get(list_candidates))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/accept", post(accept_match))
        .route("/matches/{id}/finalize", post(finalize_match))
        .route("/matches/{id}/cancel", post(cancel_match))
        .route("/matches/{id}/rest-check", get(rest_check))
        .route("/admin/sweep", post(run_sweep))
}
