//! HTTP layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health, replay and the
//! WebSocket upgrade live at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the HTTP surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "feed-relay", description = "Pub/sub feed relay with offline replay"),
    paths(
        handlers::system::health_handler,
        handlers::publish::publish,
        handlers::replay::offline_messages,
    ),
    components(schemas(
        dto::HealthResponse,
        dto::PublishRequest,
        dto::PublishResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::relay::RelayState,
        crate::relay::RelayStats,
    )),
    tags(
        (name = "System", description = "Health and status"),
        (name = "Feed", description = "Publishing and offline replay"),
    )
)]
pub struct ApiDoc;

/// Builds the REST router (no WebSocket, no layers).
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .merge(handlers::replay::routes())
}

/// Builds the complete application: REST routes, `/ws`, tracing and CORS
/// layers, and the Swagger UI when the `swagger-ui` feature is enabled.
pub fn build_app(state: AppState) -> Router {
    let router = build_router().route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
