use crate::queue::{JobPayload, JobResult};
use crate::server::error::AppError;
use crate::server::AppContext;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use convertd_common::{Error, JobId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/queue/status", get(queue_status_query))
        .route("/queue/status/{job_id}", get(queue_status))
        .route("/queue/stats", get(queue_stats))
        .route("/jobs", post(submit_job))
        .route("/jobs/{job_id}/result", get(take_result))
        .route("/tools", get(list_tools))
}

/// Unknown and malformed ids are indistinguishable to the client.
fn parse_job_id(raw: &str) -> Result<JobId, AppError> {
    raw.parse()
        .map_err(|_| AppError::from(Error::not_found(raw)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery {
    job_id: Option<String>,
}

async fn queue_status_query(
    State(ctx): State<AppContext>,
    Query(params): Query<StatusQuery>,
) -> Result<impl IntoResponse, AppError> {
    let raw = params
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("jobId is required"))?;
    let job_id = parse_job_id(&raw)?;
    Ok(Json(ctx.queue.status(job_id)?))
}

async fn queue_status(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let job_id = parse_job_id(&job_id)?;
    Ok(Json(ctx.queue.status(job_id)?))
}

async fn queue_stats(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.queue.stats())
}

#[derive(Deserialize)]
struct SubmitJobRequest {
    tool: String,
    input: PathBuf,
    #[serde(default)]
    options: BTreeMap<String, String>,
}

async fn submit_job(
    State(ctx): State<AppContext>,
    Json(req): Json<SubmitJobRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = JobPayload {
        input: req.input,
        options: req.options,
    };
    let job_id = ctx.queue.submit(&req.tool, payload)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "jobId": job_id,
            "status": "queued",
        })),
    ))
}

async fn take_result(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let job_id = parse_job_id(&job_id)?;

    match ctx.queue.take_result(job_id)? {
        JobResult::Ready(output) => Ok(Json(output)),
        JobResult::Pending(status) => Err(AppError::conflict(format!(
            "job {job_id} is still {status}"
        ))),
        JobResult::Failed(error) => Err(AppError::unprocessable(error)),
    }
}

async fn list_tools(State(ctx): State<AppContext>) -> impl IntoResponse {
    let tools: Vec<_> = ctx
        .config
        .tools
        .iter()
        .map(|tool| {
            serde_json::json!({
                "name": tool.name,
                "outputExtension": tool.output_extension,
                "averageSeconds": ctx.queue.average_duration(&tool.name).as_secs_f64(),
            })
        })
        .collect();
    Json(tools)
}
