//! Mass-messaging REST endpoints: recipient preview, rendering and
//! dispatch jobs.

use crate::jobs::{DispatchJobView, JobSpec};
use crate::rest::{api_error, ApiResult, AppState, ErrorResponse};
use academy_core::error::{AcademyError, AcademyResult};
use academy_core::types::Recipient;
use academy_messaging::{RecipientSelection, TemplateSource, TemplateValues, Token};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecipientPreviewRequest {
    /// `{"mode": "all" | "by_course" | "by_status" | "explicit_ids", ...}`
    #[schema(value_type = Object)]
    pub selection: RecipientSelection,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecipientPreviewResponse {
    pub total: usize,
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenderRequest {
    /// Stored template to render; mutually exclusive with `body`.
    pub template_id: Option<Uuid>,
    pub body: Option<String>,
    /// Student whose name, phone and course fill the per-recipient tokens.
    pub recipient_id: Option<Uuid>,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenderResponse {
    pub text: String,
    /// Declared placeholders found in the body.
    pub placeholders: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DispatchRequest {
    pub template_id: Option<Uuid>,
    pub body: Option<String>,
    #[schema(value_type = Object)]
    pub selection: RecipientSelection,
    /// Global placeholder values, e.g. `{"time": "18:00"}`.
    #[serde(default)]
    pub values: HashMap<String, String>,
}

fn resolve_body(
    state: &AppState,
    template_id: Option<Uuid>,
    body: Option<String>,
) -> AcademyResult<String> {
    match (template_id, body) {
        (Some(_), Some(_)) => Err(AcademyError::Validation(
            "provide either template_id or body, not both".to_string(),
        )),
        (None, None) => Err(AcademyError::Validation(
            "one of template_id or body is required".to_string(),
        )),
        (Some(id), None) => state
            .store
            .template(&id)
            .map(|t| t.body)
            .ok_or_else(|| AcademyError::NotFound(format!("template {id}"))),
        (None, Some(body)) => Ok(body),
    }
}

fn global_values(state: &AppState, values: &HashMap<String, String>) -> AcademyResult<TemplateValues> {
    let mut globals = TemplateValues::from_map(values)?;
    if globals.get(Token::SchoolName).is_none() {
        globals.set(Token::SchoolName, state.school_name.clone());
    }
    Ok(globals)
}

/// POST /v1/messaging/recipients: Preview the students a selection targets.
#[utoipa::path(
    post,
    path = "/v1/messaging/recipients",
    tag = "Messaging",
    request_body = RecipientPreviewRequest,
    responses((status = 200, description = "Matching students", body = RecipientPreviewResponse))
)]
pub async fn preview_recipients(
    State(state): State<AppState>,
    Json(req): Json<RecipientPreviewRequest>,
) -> Json<RecipientPreviewResponse> {
    let recipients = req.selection.select(state.store.as_ref());
    Json(RecipientPreviewResponse {
        total: recipients.len(),
        recipients,
    })
}

/// POST /v1/messaging/render: Render a template for one student.
#[utoipa::path(
    post,
    path = "/v1/messaging/render",
    tag = "Messaging",
    request_body = RenderRequest,
    responses(
        (status = 200, description = "Rendered text", body = RenderResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Template or student not found", body = ErrorResponse),
    )
)]
pub async fn render_message(
    State(state): State<AppState>,
    Json(req): Json<RenderRequest>,
) -> ApiResult<Json<RenderResponse>> {
    let body = resolve_body(&state, req.template_id, req.body).map_err(api_error)?;
    let mut values = global_values(&state, &req.values).map_err(api_error)?;

    if let Some(id) = req.recipient_id {
        let student = state
            .store
            .get_student(id)
            .ok_or_else(|| api_error(AcademyError::NotFound(format!("student {id}"))))?;
        values = values.for_recipient(&student);
    }

    let renderer = state.jobs.dispatcher().renderer();
    let placeholders = renderer
        .placeholders_in(&body)
        .into_iter()
        .map(|t| t.key().to_string())
        .collect();
    Ok(Json(RenderResponse {
        text: renderer.render(&body, &values),
        placeholders,
    }))
}

/// POST /v1/messaging/dispatches: Start a mass send in the background.
#[utoipa::path(
    post,
    path = "/v1/messaging/dispatches",
    tag = "Messaging",
    request_body = DispatchRequest,
    responses(
        (status = 202, description = "Dispatch job started", body = DispatchJobView),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
    )
)]
pub async fn start_dispatch(
    State(state): State<AppState>,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<(StatusCode, Json<DispatchJobView>)> {
    let body = resolve_body(&state, req.template_id, req.body).map_err(api_error)?;
    let globals = global_values(&state, &req.values).map_err(api_error)?;
    let recipients = req.selection.select(state.store.as_ref());

    info!(
        selection = req.selection.label(),
        recipients = recipients.len(),
        template_id = ?req.template_id,
        "Dispatch requested"
    );
    metrics::counter!(
        "api.dispatches.requested",
        "selection" => req.selection.label()
    )
    .increment(1);

    let view = state.jobs.start(JobSpec {
        template_id: req.template_id,
        selection: req.selection.label().to_string(),
        recipients,
        body,
        globals,
    });
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// GET /v1/messaging/dispatches: All dispatch jobs, newest first.
#[utoipa::path(
    get,
    path = "/v1/messaging/dispatches",
    tag = "Messaging",
    responses((status = 200, description = "Dispatch jobs", body = Vec<DispatchJobView>))
)]
pub async fn list_dispatches(State(state): State<AppState>) -> Json<Vec<DispatchJobView>> {
    Json(state.jobs.list())
}

/// GET /v1/messaging/dispatches/{id}: Poll a job's progress.
#[utoipa::path(
    get,
    path = "/v1/messaging/dispatches/{id}",
    tag = "Messaging",
    params(("id" = Uuid, Path, description = "Dispatch job identifier")),
    responses(
        (status = 200, description = "Job progress", body = DispatchJobView),
        (status = 404, description = "Job not found"),
    )
)]
pub async fn get_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DispatchJobView>, StatusCode> {
    state.jobs.get(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// POST /v1/messaging/dispatches/{id}/cancel: Stop a job before its next recipient.
#[utoipa::path(
    post,
    path = "/v1/messaging/dispatches/{id}/cancel",
    tag = "Messaging",
    params(("id" = Uuid, Path, description = "Dispatch job identifier")),
    responses(
        (status = 200, description = "Cancellation requested", body = DispatchJobView),
        (status = 404, description = "Job not found"),
    )
)]
pub async fn cancel_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DispatchJobView>, StatusCode> {
    state.jobs.cancel(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}
