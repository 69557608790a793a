//! API route configuration.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use super::state::AppState;
use super::system::{self, ErrorResponse, HealthResponse};
use super::v1::{
    self, EnginesResponse, GenerateSlidesRequest, GenerateSlidesResponse, SynthesizeRequest,
    SynthesizeResponse,
};
use super::{mcp_proxy, websocket};
use crate::generation::PresentationSnapshot;
use crate::providers::speech::EngineHealth;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Presenter API",
        version = "0.1.0",
        description = "Narrated slide generation from Backlog project data"
    ),
    paths(
        system::health,
        v1::generate_slides,
        v1::get_slide_status,
        v1::cancel_slides,
        v1::list_projects,
        v1::get_project_overview,
        v1::get_project_progress,
        v1::get_project_issues,
        v1::get_project_team,
        v1::get_project_risks,
        v1::synthesize,
        v1::list_engines,
        mcp_proxy::proxy_request,
        mcp_proxy::close_session,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            GenerateSlidesRequest,
            GenerateSlidesResponse,
            PresentationSnapshot,
            SynthesizeRequest,
            SynthesizeResponse,
            EnginesResponse,
            EngineHealth,
        )
    ),
    tags(
        (name = "system", description = "Health endpoints"),
        (name = "slides", description = "Presentation generation"),
        (name = "projects", description = "Backlog project data"),
        (name = "speech", description = "Speech synthesis"),
        (name = "mcp", description = "Session proxy onto the tool server")
    )
)]
pub struct ApiDoc;

/// Create the API router with OpenAPI documentation.
///
/// `/mcp` is mounted only when the state carries an upstream tool server.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/slides/generate", post(v1::generate_slides))
        .route("/slides/{id}/status", get(v1::get_slide_status))
        .route("/slides/{id}", delete(v1::cancel_slides))
        .route("/projects", get(v1::list_projects))
        .route("/projects/{id}/overview", get(v1::get_project_overview))
        .route("/projects/{id}/progress", get(v1::get_project_progress))
        .route("/projects/{id}/issues", get(v1::get_project_issues))
        .route("/projects/{id}/team", get(v1::get_project_team))
        .route("/projects/{id}/risks", get(v1::get_project_risks))
        .route("/speech/synthesize", post(v1::synthesize))
        .route("/speech/engines", get(v1::list_engines));

    let mut router = Router::new()
        .route("/health", get(system::health))
        .nest("/api/v1", api_routes)
        .route("/ws/slides/{id}", get(websocket::ws_handler));

    if state.upstream().is_some() {
        router = router.route(
            "/mcp",
            post(mcp_proxy::proxy_request).delete(mcp_proxy::close_session),
        );
    }

    router
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
