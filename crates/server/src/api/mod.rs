//! # Engine API
//!
//! JSON endpoints over the engine: run a request (pipeline or swarm),
//! manage the retrieval store, and health. Engine errors map to structured
//! JSON carrying the stable error kind so clients can branch without
//! parsing messages.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use conductor_core::context::{MemoryRetriever, Retriever};
use conductor_core::models::Specialty;
use conductor_core::orchestrator::{Orchestrator, PipelineResult};
use conductor_core::swarm::SwarmManager;
use conductor_core::{tools, EngineError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Shared server state
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub retriever: Arc<MemoryRetriever>,
}

pub type SharedState = Arc<AppState>;

/// Execution mode for one run
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Pipeline,
    Swarm,
}

#[derive(Deserialize)]
pub struct RunRequest {
    pub request: String,
    #[serde(default)]
    pub mode: RunMode,
    /// Optional project-structure summary for Q&A requests
    #[serde(default)]
    pub structure: Option<String>,
    /// Project root to scan for structure context when `structure` is
    /// absent
    #[serde(default)]
    pub project: Option<String>,
}

impl RunRequest {
    /// Resolve structure context: an explicit summary wins, then a scanned
    /// project root. A scan failure degrades to no context.
    fn structure_context(&self) -> Option<String> {
        if self.structure.is_some() {
            return self.structure.clone();
        }
        let root = self.project.as_deref()?;
        match tools::summarize(Path::new(root)) {
            Ok(summary) => Some(summary.render()),
            Err(e) => {
                tracing::warn!("project scan of '{}' failed: {}", root, e);
                None
            }
        }
    }
}

#[derive(Serialize)]
pub struct RunResponse {
    pub mode: &'static str,
    pub outcome: serde_json::Value,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub request: String,
    pub specialty: Specialty,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub source: String,
    pub text: String,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

/// Engine error as an HTTP response
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::EmptyRequest | EngineError::Validation { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::ModelCall(_) => StatusCode::BAD_GATEWAY,
            EngineError::Decomposition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Deadlock { .. } | EngineError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    let rag_routes = Router::new()
        .route("/ingest", post(ingest))
        .route("/query", post(query));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/run", post(run))
        .route("/api/review", post(review))
        .nest("/api/rag", rag_routes)
        .with_state(state)
}

async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "offline": state.orchestrator.config().offline,
        "documents": state.retriever.len().await,
    }))
}

async fn run(
    State(state): State<SharedState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let retriever: Arc<dyn Retriever> = state.retriever.clone();

    match req.mode {
        RunMode::Pipeline => {
            let structure = req.structure_context();
            let result = state
                .orchestrator
                .run_pipeline(&req.request, Some(retriever.as_ref()), structure.as_deref())
                .await?;
            let outcome = match result {
                PipelineResult::Answer { answer, .. } => json!({
                    "kind": "answer",
                    "answer": answer,
                }),
                PipelineResult::Completed { plan } => json!({
                    "kind": "plan",
                    "phases": plan
                        .phases()
                        .iter()
                        .map(|(phase, artifact)| json!({
                            "phase": phase.as_str(),
                            "artifact": artifact,
                        }))
                        .collect::<Vec<_>>(),
                }),
            };
            Ok(Json(RunResponse {
                mode: "pipeline",
                outcome,
            }))
        }
        RunMode::Swarm => {
            let manager = SwarmManager::new(state.orchestrator.clone());
            let result = manager.run(&req.request, Some(retriever)).await?;
            let outcome = json!({
                "kind": "swarm",
                "synthesis": result.synthesis,
                "completed": result.completed_count(),
                "failed": result.failed_count(),
                "skipped": result.skipped_count(),
                "tasks": result.tasks,
            });
            Ok(Json(RunResponse {
                mode: "swarm",
                outcome,
            }))
        }
    }
}

/// One specialist's review of a request, outside the phase pipeline
async fn review(
    State(state): State<SharedState>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = state
        .orchestrator
        .run_specialist(req.specialty, &req.request, &[])
        .await?;
    Ok(Json(json!({
        "specialty": req.specialty.as_str(),
        "valid": report.validation.valid,
        "errors": report.validation.errors,
        "review": report.payload,
    })))
}

async fn ingest(
    State(state): State<SharedState>,
    Json(req): Json<IngestRequest>,
) -> Json<serde_json::Value> {
    state.retriever.ingest(&req.source, &req.text).await;
    Json(json!({
        "success": true,
        "documents": state.retriever.len().await,
    }))
}

async fn query(
    State(state): State<SharedState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chunks = state
        .retriever
        .query(&req.query, req.top_k)
        .await
        .map_err(EngineError::from)?;
    Ok(Json(json!({ "chunks": chunks })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use conductor_core::EngineConfig;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let orchestrator = Arc::new(Orchestrator::new(EngineConfig::offline()).unwrap());
        let state = Arc::new(AppState {
            orchestrator,
            retriever: Arc::new(MemoryRetriever::new()),
        });
        router(state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_offline_flag() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["offline"], true);
    }

    #[tokio::test]
    async fn test_run_pipeline_returns_four_phase_plan() {
        let response = test_app()
            .oneshot(post_json(
                "/api/run",
                serde_json::json!({"request": "build a stock tracker"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mode"], "pipeline");
        assert_eq!(body["outcome"]["kind"], "plan");
        assert_eq!(body["outcome"]["phases"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_run_swarm_synthesizes() {
        let response = test_app()
            .oneshot(post_json(
                "/api/run",
                serde_json::json!({"request": "build a todo app", "mode": "swarm"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mode"], "swarm");
        assert_eq!(body["outcome"]["completed"], 4);
    }

    #[tokio::test]
    async fn test_project_path_feeds_question_answering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("src/api.rs"), "pub fn b() {}\n").unwrap();

        let response = test_app()
            .oneshot(post_json(
                "/api/run",
                serde_json::json!({
                    "request": "How many source files do we have?",
                    "project": dir.path().to_string_lossy(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // Scanned structure triggers the direct-answer path
        assert_eq!(body["outcome"]["kind"], "answer");
        assert!(body["outcome"]["answer"]
            .as_str()
            .unwrap()
            .contains("file"));
    }

    #[tokio::test]
    async fn test_review_runs_one_specialist() {
        let response = test_app()
            .oneshot(post_json(
                "/api/review",
                serde_json::json!({
                    "request": "review the tracker's API design",
                    "specialty": "backend",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["specialty"], "backend");
        assert_eq!(body["valid"], true);
        assert!(body["review"]["summary"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_empty_request_maps_to_422_with_kind() {
        let response = test_app()
            .oneshot(post_json("/api/run", serde_json::json!({"request": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "empty_request");
    }

    #[tokio::test]
    async fn test_rag_ingest_then_query_round_trip() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/rag/ingest",
                serde_json::json!({"source": "notes.md", "text": "payments flow through stripe"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/api/rag/query",
                serde_json::json!({"query": "how do payments work"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let chunks = body["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0]["source"], "notes.md");
    }
}
