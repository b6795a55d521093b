//! HTTP surface (axum).
//!
//! Thin handlers: decode, hand off to the pipeline (on the blocking pool,
//! under the per-request deadline), translate the outcome. Replay detail
//! never leaves the server; clients get a short machine-readable `error`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::orchestrator::{PipelineError, ScoreRequest, SubmitOutcome};
use crate::state::Services;

pub fn router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/api/game/start", post(start_game))
        .route("/api/score", post(submit_score))
        .route("/api/halloffame", get(hall_of_fame))
        .route("/api/hallofshame", get(hall_of_shame))
        .route("/api/ml/status", get(ml_status))
        .route("/api/ml/versions", get(ml_versions))
        .route("/api/ml/training-logs", get(ml_training_logs))
        .route("/api/ml/edge-cases", get(ml_edge_cases))
        .route("/api/ml/train", post(ml_train))
        .with_state(services)
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

fn pipeline_error_response(e: PipelineError) -> Response {
    match e {
        PipelineError::RateLimited => error_response(StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        PipelineError::Validation(msg) => {
            tracing::debug!(%msg, "rejected malformed submission");
            error_response(StatusCode::BAD_REQUEST, "invalid_submission")
        }
        PipelineError::Auth(_) => error_response(StatusCode::UNAUTHORIZED, "auth_failed"),
        PipelineError::Internal(msg) => {
            tracing::error!(%msg, "internal pipeline failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    fingerprint: String,
}

async fn start_game(
    State(services): State<Arc<Services>>,
    Json(req): Json<StartRequest>,
) -> Response {
    match services.pipeline.start_game(&req.fingerprint) {
        Ok(seed) => Json(json!({ "success": true, "seed": seed })).into_response(),
        Err(e) => pipeline_error_response(e),
    }
}

async fn submit_score(
    State(services): State<Arc<Services>>,
    Json(req): Json<ScoreRequest>,
) -> Response {
    let deadline = Duration::from_secs(services.config.server.request_deadline_s.max(1));
    let pipeline = Arc::clone(&services.pipeline);
    let work = tokio::task::spawn_blocking(move || pipeline.submit(req));

    let joined = match tokio::time::timeout(deadline, work).await {
        Ok(j) => j,
        Err(_) => {
            tracing::warn!("submission exceeded the request deadline");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "deadline_exceeded");
        }
    };
    let result = match joined {
        Ok(r) => r,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    match result {
        Ok(SubmitOutcome::Accepted(ack)) => Json(json!({
            "success": true,
            "bestScore": ack.best_score,
            "rank": ack.rank,
            "isNewBest": ack.is_new_best,
        }))
        .into_response(),
        Ok(SubmitOutcome::CheatDetected { kind, .. }) => {
            error_response(StatusCode::FORBIDDEN, kind.as_str())
        }
        Err(e) => pipeline_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn hall_of_fame(
    State(services): State<Arc<Services>>,
    Query(q): Query<LimitQuery>,
) -> Response {
    match services.store.hall_of_fame(q.limit.unwrap_or(10)) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "hall_of_fame read failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

async fn hall_of_shame(
    State(services): State<Arc<Services>>,
    Query(q): Query<LimitQuery>,
) -> Response {
    match services.store.hall_of_shame(q.limit.unwrap_or(50)) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "hall_of_shame read failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

#[derive(Debug, Serialize)]
struct MlStatus {
    model: Option<sg_ml::ModelVersionMeta>,
    training_in_progress: bool,
    last_training_completion_ms: u64,
    runs_completed: u64,
    edge_cases: u64,
    live_sessions: usize,
}

async fn ml_status(State(services): State<Arc<Services>>) -> Json<MlStatus> {
    Json(MlStatus {
        model: services.active.current_meta(),
        training_in_progress: services.worker.in_progress(),
        last_training_completion_ms: services.worker.last_completion_ms(),
        runs_completed: services.worker.runs_completed(),
        edge_cases: services.edge_log.count(),
        live_sessions: services.registry.len(),
    })
}

async fn ml_versions(State(services): State<Arc<Services>>) -> Response {
    match services.model_store.list_versions() {
        Ok(versions) => Json(versions).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "version listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

async fn ml_training_logs(
    State(services): State<Arc<Services>>,
    Query(q): Query<LimitQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(50);
    match sg_logging::read_ndjson_tail::<serde_json::Value>(&services.training_events_path, limit)
    {
        Ok(events) => Json(events).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "training log read failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

async fn ml_edge_cases(
    State(services): State<Arc<Services>>,
    Query(q): Query<LimitQuery>,
) -> Response {
    match services.edge_log.recent(q.limit.unwrap_or(50)) {
        Ok(cases) => Json(cases).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "edge case read failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

async fn ml_train(State(services): State<Arc<Services>>) -> Response {
    let outcome = services.worker.request("manual");
    Json(json!({
        "success": true,
        "outcome": format!("{outcome:?}"),
    }))
    .into_response()
}
