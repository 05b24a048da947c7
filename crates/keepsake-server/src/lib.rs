//! # keepsake-server
//!
//! HTTP API server for the Keepsake memory service. Provides:
//!
//! - REST API for storing and listing session fragments
//! - REST API for long-term embeddings and similarity search
//! - Maintenance endpoints driven by an external scheduler
//! - Prometheus-compatible `/metrics`

pub mod metrics;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use keepsake_config::schema::ServerConfig;
use keepsake_core::{ChildId, SessionId};
use keepsake_memory::{CreateOutcome, MemoryEmbedding, MemoryFragment, MemoryService, NewEmbedding};

/// Shared server state.
pub struct AppState {
    pub memory: MemoryService,
    /// Prometheus-compatible metrics.
    pub metrics: metrics::Metrics,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

/// Fragment creation body.
#[derive(Deserialize)]
struct CreateFragmentRequest {
    session_id: SessionId,
    child_id: ChildId,
    content: String,
    importance_score: Option<f64>,
}

/// Embedding creation response. `deduplicated` is true when the content
/// hash resolved to an existing row instead of inserting a new one.
#[derive(Serialize)]
struct CreateEmbeddingResponse {
    embedding: MemoryEmbedding,
    deduplicated: bool,
}

/// Similarity search body.
#[derive(Deserialize)]
struct SimilarSearchRequest {
    child_id: ChildId,
    query_vector: Vec<f32>,
    limit: Option<usize>,
}

/// Relevance update body.
#[derive(Deserialize)]
struct UpdateRelevanceRequest {
    relevance_score: f64,
}

/// Dedupe-key lookup response.
#[derive(Serialize)]
struct CheckExistsResponse {
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<MemoryEmbedding>,
}

/// Sweep response for a single tier.
#[derive(Serialize)]
struct SweepResponse {
    removed: usize,
}

/// Query params for listing endpoints.
#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Map a domain error onto an HTTP status and JSON body. Validation
/// failures carry their message; backing failures stay generic.
fn map_error(state: &AppState, e: keepsake_core::KeepsakeError) -> ApiError {
    state.metrics.inc_http_errors();
    match &e {
        keepsake_core::KeepsakeError::Validation { .. } => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
        keepsake_core::KeepsakeError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
        other => {
            warn!(error = %other, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
        }
    }
}

/// Build the Axum router.
pub fn build_router(config: &ServerConfig, memory: MemoryService) -> Router {
    let state = Arc::new(AppState {
        memory,
        metrics: metrics::Metrics::new(),
    });

    let api_routes = Router::new()
        .route("/api/v1/memory/fragments", post(create_fragment_handler))
        .route(
            "/api/v1/memory/fragments/session/{session_id}",
            get(fragments_by_session_handler),
        )
        .route(
            "/api/v1/memory/fragments/child/{child_id}",
            get(fragments_by_child_handler),
        )
        .route("/api/v1/memory/embeddings", post(create_embedding_handler))
        .route(
            "/api/v1/memory/embeddings/search",
            post(similar_search_handler),
        )
        .route(
            "/api/v1/memory/embeddings/{embedding_id}",
            get(embedding_handler),
        )
        .route(
            "/api/v1/memory/embeddings/{embedding_id}/relevance",
            put(update_relevance_handler),
        )
        .route(
            "/api/v1/memory/embeddings/{embedding_id}/access",
            post(record_access_handler),
        )
        .route(
            "/api/v1/memory/embeddings/child/{child_id}",
            get(embeddings_by_child_handler),
        )
        .route(
            "/api/v1/memory/embeddings/check/{child_id}/{content_hash}",
            get(check_embedding_handler),
        )
        .route(
            "/api/v1/maintenance/sweep/fragments",
            post(sweep_fragments_handler),
        )
        .route(
            "/api/v1/maintenance/sweep/embeddings",
            post(sweep_embeddings_handler),
        );

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api_routes)
        .with_state(state);

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    state.metrics.inc_http_requests();
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.metrics.uptime_secs(),
    })
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    let body = state.metrics.render_prometheus();
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ── Fragment endpoints ─────────────────────────────────────────────────────

async fn create_fragment_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFragmentRequest>,
) -> Result<(StatusCode, Json<MemoryFragment>), ApiError> {
    state.metrics.inc_http_requests();
    let fragment = state
        .memory
        .create_fragment(
            req.session_id,
            req.child_id,
            &req.content,
            req.importance_score,
        )
        .map_err(|e| map_error(&state, e))?;
    state.metrics.inc_fragments_created();
    Ok((StatusCode::CREATED, Json(fragment)))
}

async fn fragments_by_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<MemoryFragment>>, ApiError> {
    state.metrics.inc_http_requests();
    let fragments = state
        .memory
        .fragments_by_session(session_id, params.limit)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(fragments))
}

async fn fragments_by_child_handler(
    State(state): State<Arc<AppState>>,
    Path(child_id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<MemoryFragment>>, ApiError> {
    state.metrics.inc_http_requests();
    let fragments = state
        .memory
        .fragments_by_child(child_id, params.limit)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(fragments))
}

// ── Embedding endpoints ────────────────────────────────────────────────────

async fn create_embedding_handler(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewEmbedding>,
) -> Result<(StatusCode, Json<CreateEmbeddingResponse>), ApiError> {
    state.metrics.inc_http_requests();
    let (embedding, outcome) = state
        .memory
        .create_embedding(new)
        .map_err(|e| map_error(&state, e))?;

    match outcome {
        CreateOutcome::Inserted => state.metrics.inc_embeddings_created(),
        CreateOutcome::Deduplicated => state.metrics.inc_embeddings_deduplicated(),
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateEmbeddingResponse {
            embedding,
            deduplicated: outcome == CreateOutcome::Deduplicated,
        }),
    ))
}

async fn embedding_handler(
    State(state): State<Arc<AppState>>,
    Path(embedding_id): Path<Uuid>,
) -> Result<Json<MemoryEmbedding>, ApiError> {
    state.metrics.inc_http_requests();
    let embedding = state
        .memory
        .embedding(embedding_id)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(embedding))
}

async fn embeddings_by_child_handler(
    State(state): State<Arc<AppState>>,
    Path(child_id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<MemoryEmbedding>>, ApiError> {
    state.metrics.inc_http_requests();
    let embeddings = state
        .memory
        .embeddings_by_child(child_id, params.limit)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(embeddings))
}

async fn similar_search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SimilarSearchRequest>,
) -> Result<Json<Vec<MemoryEmbedding>>, ApiError> {
    state.metrics.inc_http_requests();
    let results = state
        .memory
        .find_similar(req.child_id, &req.query_vector, req.limit)
        .map_err(|e| map_error(&state, e))?;
    state.metrics.inc_similarity_searches();
    Ok(Json(results))
}

async fn update_relevance_handler(
    State(state): State<Arc<AppState>>,
    Path(embedding_id): Path<Uuid>,
    Json(req): Json<UpdateRelevanceRequest>,
) -> Result<Json<MemoryEmbedding>, ApiError> {
    state.metrics.inc_http_requests();
    let embedding = state
        .memory
        .update_relevance(embedding_id, req.relevance_score)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(embedding))
}

async fn record_access_handler(
    State(state): State<Arc<AppState>>,
    Path(embedding_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.metrics.inc_http_requests();
    state
        .memory
        .record_access(embedding_id)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn check_embedding_handler(
    State(state): State<Arc<AppState>>,
    Path((child_id, content_hash)): Path<(Uuid, String)>,
) -> Result<Json<CheckExistsResponse>, ApiError> {
    state.metrics.inc_http_requests();
    let embedding = state
        .memory
        .embedding_by_content_hash(child_id, &content_hash)
        .map_err(|e| map_error(&state, e))?;
    Ok(Json(CheckExistsResponse {
        exists: embedding.is_some(),
        embedding,
    }))
}

// ── Maintenance endpoints ──────────────────────────────────────────────────

async fn sweep_fragments_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepResponse>, ApiError> {
    state.metrics.inc_http_requests();
    let removed = state
        .memory
        .sweep_expired_fragments()
        .map_err(|e| map_error(&state, e))?;
    state.metrics.add_swept_fragments(removed as u64);
    Ok(Json(SweepResponse { removed }))
}

async fn sweep_embeddings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepResponse>, ApiError> {
    state.metrics.inc_http_requests();
    let removed = state
        .memory
        .sweep_expired_embeddings()
        .map_err(|e| map_error(&state, e))?;
    state.metrics.add_swept_embeddings(removed as u64);
    Ok(Json(SweepResponse { removed }))
}

/// Start the HTTP server.
pub async fn start_server(config: ServerConfig, memory: MemoryService) -> keepsake_core::Result<()> {
    let listen = config.listen.clone();
    let router = build_router(&config, memory);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen).await.map_err(|e| {
        keepsake_core::KeepsakeError::Backing(format!("failed to bind {listen}: {e}"))
    })?;

    axum::serve(listener, router)
        .await
        .map_err(|e| keepsake_core::KeepsakeError::Backing(format!("server error: {e}")))?;

    Ok(())
}
