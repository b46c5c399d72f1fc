//! Administrative call maintenance: reconciliation, re-analysis and diagnostics.
//!
//! Every handler here answers with counts of the rows it touched; an empty result is a success.
//! Handlers that rewrite call status leave one webhook_logs row carrying their event trail.

use crate::controller::ApiResponse;
use crate::{AppState, Error};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::audit::request_handled;
use domain::error::Error as DomainError;
use domain::Id;
use events::EventTrail;
use log::*;
use serde::Serialize;
use serde_json::{json, Value};

/// Audits a maintenance request with its trail, then renders its result.
async fn audited<T: Serialize>(
    app_state: &AppState,
    endpoint: &str,
    payload: Value,
    trail: &EventTrail,
    result: Result<T, DomainError>,
) -> Result<Json<ApiResponse<T>>, Error> {
    let result = result.map_err(Error::from);
    let (status, error_message) = match &result {
        Ok(_) => (StatusCode::OK, None),
        Err(err) => (err.status_code(), Some(err.message())),
    };

    app_state
        .pipeline
        .publisher
        .publish(request_handled(
            endpoint,
            "POST",
            payload,
            status.as_u16(),
            error_message,
            trail,
        ))
        .await;

    result.map(|payload| Json(ApiResponse::success(payload)))
}

/// POST /calls/reconcile-stuck
#[utoipa::path(
    post,
    path = "/calls/reconcile-stuck",
    responses(
        (status = 200, description = "Counts of stuck calls completed or reset to pending"),
        (status = 401, description = "Missing or wrong admin token"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reconcile_stuck(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let mut trail = EventTrail::start();
    let summary = app_state.pipeline.reconciler.reconcile_stuck(&mut trail).await;
    if let Ok(summary) = &summary {
        info!(
            "Reconciled stuck calls: {} completed, {} reset to pending",
            summary.fixed, summary.reset_to_pending
        );
    }

    audited(&app_state, "/calls/reconcile-stuck", Value::Null, &trail, summary).await
}

/// POST /calls/force-reset-all
#[utoipa::path(
    post,
    path = "/calls/force-reset-all",
    responses(
        (status = 200, description = "Every analyzing call moved to pending"),
        (status = 401, description = "Missing or wrong admin token"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn force_reset_all(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let mut trail = EventTrail::start();
    let reset = app_state.pipeline.reconciler.force_reset_all(&mut trail).await;

    audited(&app_state, "/calls/force-reset-all", Value::Null, &trail, reset).await
}

/// POST /calls/complete-reset
#[utoipa::path(
    post,
    path = "/calls/complete-reset",
    responses(
        (status = 200, description = "Every call's status re-derived from its analyses"),
        (status = 401, description = "Missing or wrong admin token"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn complete_reset(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let mut trail = EventTrail::start();
    let summary = app_state.pipeline.reconciler.complete_reset(&mut trail).await;

    audited(&app_state, "/calls/complete-reset", Value::Null, &trail, summary).await
}

/// POST /calls/dedupe-analyses
#[utoipa::path(
    post,
    path = "/calls/dedupe-analyses",
    responses(
        (status = 200, description = "Duplicate analyses removed, newest kept"),
        (status = 401, description = "Missing or wrong admin token"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn dedupe_analyses(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let mut trail = EventTrail::start();
    let dedupe = app_state.pipeline.reconciler.dedupe_analyses(&mut trail).await;

    audited(&app_state, "/calls/dedupe-analyses", Value::Null, &trail, dedupe).await
}

/// POST /calls/analyze-pending
#[utoipa::path(
    post,
    path = "/calls/analyze-pending",
    responses(
        (status = 200, description = "Counts per outcome for one batch of pending calls"),
        (status = 401, description = "Missing or wrong admin token"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn analyze_pending(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let pipeline = &app_state.pipeline;
    let limit = pipeline.pending_batch_size();
    let mut trail = EventTrail::start();
    let summary = pipeline.orchestrator.process_pending(limit, &mut trail).await;

    audited(
        &app_state,
        "/calls/analyze-pending",
        json!({ "limit": limit }),
        &trail,
        summary,
    )
    .await
}

/// POST /calls/{id}/analyze
#[utoipa::path(
    post,
    path = "/calls/{id}/analyze",
    params(
        ("id" = String, Path, format = Uuid, description = "Call id to analyze"),
    ),
    responses(
        (status = 200, description = "Outcome of the analysis attempt"),
        (status = 401, description = "Missing or wrong admin token"),
        (status = 404, description = "Call not found"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn analyze(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("Analyzing call {id} on request");
    let mut trail = EventTrail::start();
    let report = app_state
        .pipeline
        .orchestrator
        .analyze_call(id, &mut trail)
        .await
        .map(|report| json!({ "result": report, "events": trail.to_json() }));

    audited(
        &app_state,
        &format!("/calls/{id}/analyze"),
        json!({ "id": id }),
        &trail,
        report,
    )
    .await
}

/// GET /calls/diagnostics
#[utoipa::path(
    get,
    path = "/calls/diagnostics",
    responses(
        (status = 200, description = "Unhealthy calls grouped by suspected cause"),
        (status = 401, description = "Missing or wrong admin token"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn diagnostics(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let report = app_state.pipeline.diagnostics.snapshot().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "diagnostics": report })),
    ))
}
