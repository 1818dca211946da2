//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1` and read the acting
//! user from the `X-User-Id` header. `/health` and `/config/*` sit at the
//! root.

pub mod dto;
pub mod extract;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "ShiftFlex gateway",
        description = "Shift swap requests, match discovery and the match lifecycle."
    ),
    paths(
        handlers::shifts::create_shift,
        handlers::shifts::create_repeating_shifts,
        handlers::shifts::list_shifts,
        handlers::requests::submit_swap_request,
        handlers::requests::list_swap_requests,
        handlers::requests::withdraw_swap_request,
        handlers::requests::remove_preferred_date,
        handlers::matches::list_candidates,
        handlers::matches::create_match,
        handlers::matches::list_matches,
        handlers::matches::get_match,
        handlers::matches::accept_match,
        handlers::matches::finalize_match,
        handlers::matches::cancel_match,
        handlers::matches::rest_check,
        handlers::matches::run_sweep,
        handlers::system::health_handler,
        handlers::system::shift_types_handler,
    ),
    components(schemas(crate::error::ErrorResponse, crate::error::ErrorBody)),
    tags(
        (name = "Shifts", description = "Shift records"),
        (name = "Swap requests", description = "Offered shifts and wanted dates"),
        (name = "Matches", description = "Match discovery and lifecycle"),
        (name = "Admin", description = "Operational endpoints"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the full application: REST routes, `/ws`, tracing and CORS
/// layers, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
