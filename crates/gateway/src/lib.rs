//! HTTP recommendation gateway for StudyClaw.
//!
//! Exposes the search/score path as a small REST surface so other clients
//! can ask for ranked hands-on resources without running the full agent:
//!
//! - `GET /health` — liveness probe
//! - `GET /recommendation?topic=…&max_results=…` — scored top-K for a topic
//!
//! Built on Axum; a thin wrapper over [`SearchTool::recommend`].

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studyclaw_core::error::ToolError;
use studyclaw_core::plan::ScoredResource;
use studyclaw_tools::SearchTool;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub search: SearchTool,
}

type SharedState = Arc<GatewayState>;

/// `max_results` is clamped to this range.
const MAX_RESULTS_CAP: usize = 10;
const DEFAULT_MAX_RESULTS: usize = 3;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/recommendation", get(recommendation_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway until the process is stopped.
pub async fn serve(state: SharedState, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Recommendation gateway listening");
    axum::serve(listener, build_router(state)).await
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    /// The learning topic (e.g., a calendar event title).
    topic: String,
    /// Maximum number of repositories to return (1-10, default 3).
    max_results: Option<usize>,
}

/// One recommended repository, ranked by the hands-on score.
#[derive(Debug, Serialize)]
struct RecommendationItem {
    name: String,
    url: String,
    description: Option<String>,
    stars: u64,
    score: f64,
    language: Option<String>,
}

impl From<ScoredResource> for RecommendationItem {
    fn from(scored: ScoredResource) -> Self {
        Self {
            name: scored.resource.id,
            url: scored.resource.url,
            description: scored.resource.description,
            stars: scored.resource.stars,
            score: scored.score,
            language: scored.resource.language,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn recommendation_handler(
    State(state): State<SharedState>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<Vec<RecommendationItem>>, (StatusCode, Json<ErrorBody>)> {
    let topic = query.topic.trim();
    if topic.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "topic must not be empty",
        ));
    }

    let max_results = query
        .max_results
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(1, MAX_RESULTS_CAP);

    match state.search.recommend(topic, max_results).await {
        Ok(resources) => Ok(Json(
            resources.into_iter().map(RecommendationItem::from).collect(),
        )),
        Err(e) => {
            warn!(%topic, error = %e, "Recommendation lookup failed");
            Err(map_tool_error(e))
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn map_tool_error(e: ToolError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        ToolError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
        ToolError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ToolError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e.to_string())
}
