//! Query endpoint: run the full pipeline for one request.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use np_agent::pipeline::normalize_query;
use np_protocol::PipelineState;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for running a query.
#[derive(Debug, Deserialize)]
pub struct RunQueryRequest {
    /// Natural-language request.
    pub query: String,
}

/// POST /api/v1/queries: plan and execute a query against the device.
///
/// A failed pipeline is still a 200: the state carries the error.
pub async fn run_query(
    State(state): State<AppState>,
    payload: Result<Json<RunQueryRequest>, JsonRejection>,
) -> ApiResult<Json<PipelineState>> {
    let Json(req) = payload?;
    let query = normalize_query(&req.query)?.to_string();

    // Detached so a dropped client cannot cut a configuration batch short.
    let pipeline = state.pipeline.clone();
    let run_lock = state.run_lock.clone();
    let task = tokio::spawn(async move {
        let _guard = run_lock.lock().await;
        pipeline.run(&query).await
    });

    let result = task.await?;

    tracing::info!(
        run_id = %result.id,
        status = ?result.status,
        records = result.execution_results.len(),
        "query processed"
    );

    Ok(Json(result))
}
