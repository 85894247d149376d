//! Student and template endpoints.

use crate::rest::{api_error, ApiResult, AppState, ErrorResponse};
use academy_core::error::AcademyError;
use academy_core::types::{MessageTemplate, Recipient, StudentStatus};
use academy_messaging::RecipientSelection;
use academy_store::CreateTemplateRequest;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    /// Exact course name.
    pub course: Option<String>,
    pub status: Option<StudentStatus>,
}

/// GET /v1/students: List students, optionally filtered by course and status.
#[utoipa::path(
    get,
    path = "/v1/students",
    tag = "Directory",
    params(StudentQuery),
    responses((status = 200, description = "Students in directory order", body = Vec<Recipient>))
)]
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentQuery>,
) -> Json<Vec<Recipient>> {
    let mut students = state.store.list_students();
    if let Some(course) = query.course {
        students = RecipientSelection::ByCourse { course }.apply(&students);
    }
    if let Some(status) = query.status {
        students = RecipientSelection::ByStatus { status }.apply(&students);
    }
    Json(students)
}

/// GET /v1/students/{id}
#[utoipa::path(
    get,
    path = "/v1/students/{id}",
    tag = "Directory",
    params(("id" = Uuid, Path, description = "Student identifier")),
    responses(
        (status = 200, description = "Student", body = Recipient),
        (status = 404, description = "Student not found"),
    )
)]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recipient>, StatusCode> {
    state.store.get_student(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /v1/templates
#[utoipa::path(
    get,
    path = "/v1/templates",
    tag = "Directory",
    responses((status = 200, description = "Message templates", body = Vec<MessageTemplate>))
)]
pub async fn list_templates(State(state): State<AppState>) -> Json<Vec<MessageTemplate>> {
    Json(state.store.list_templates())
}

/// GET /v1/templates/{id}
#[utoipa::path(
    get,
    path = "/v1/templates/{id}",
    tag = "Directory",
    params(("id" = Uuid, Path, description = "Template identifier")),
    responses(
        (status = 200, description = "Template", body = MessageTemplate),
        (status = 404, description = "Template not found"),
    )
)]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageTemplate>, StatusCode> {
    state.store.get_template(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// POST /v1/templates
#[utoipa::path(
    post,
    path = "/v1/templates",
    tag = "Directory",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = MessageTemplate),
        (status = 400, description = "Invalid template", body = ErrorResponse),
    )
)]
pub async fn create_template(
    State(state): State<AppState>,
    Json(req): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<MessageTemplate>)> {
    let template = state.store.create_template(req).map_err(api_error)?;
    metrics::counter!("api.templates.created").increment(1);
    Ok((StatusCode::CREATED, Json(template)))
}

/// DELETE /v1/templates/{id}
#[utoipa::path(
    delete,
    path = "/v1/templates/{id}",
    tag = "Directory",
    params(("id" = Uuid, Path, description = "Template identifier")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found", body = ErrorResponse),
    )
)]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.store.delete_template(id) {
        metrics::counter!("api.templates.deleted").increment(1);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(AcademyError::NotFound(format!("template {id}"))))
    }
}
