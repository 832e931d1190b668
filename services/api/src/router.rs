//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{CategorySummary, ErrorResponse, ToneSummary, WordEntry},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_categories,
        handlers::list_category_words,
        handlers::list_tones,
    ),
    components(
        schemas(CategorySummary, WordEntry, ToneSummary, ErrorResponse)
    ),
    tags(
        (name = "Imagitale API", description = "Vocabulary and story catalogue for voice learning sessions")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/categories", get(handlers::list_categories))
        .route("/categories/{id}/words", get(handlers::list_category_words))
        .route("/tones", get(handlers::list_tones))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
