use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationStatus, ApplicationType, StudentId};
use super::export::SummaryRenderer;
use super::lifecycle::{Actor, ReviewDecision};
use super::reference::ApplicationReference;
use super::repository::{ApplicationFilter, EntityStore, RepositoryError};
use super::service::{AdmissionsError, ApplicationService};
use super::wizard::{EntrySelectors, SessionStore, WizardController, WizardOutcome, WizardRequest};

/// Header carrying the authenticated student's id.
pub const STUDENT_HEADER: &str = "x-portal-student";
/// Header carrying the authenticated staff member's username.
pub const STAFF_HEADER: &str = "x-portal-staff";

pub struct PortalState<S, W> {
    pub service: Arc<ApplicationService<S>>,
    pub wizard: Arc<WizardController<S, W>>,
    pub renderer: Arc<dyn SummaryRenderer>,
}

impl<S, W> Clone for PortalState<S, W> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            wizard: Arc::clone(&self.wizard),
            renderer: Arc::clone(&self.renderer),
        }
    }
}

/// Router builder exposing the wizard, review and export endpoints.
pub fn admissions_router<S, W>(state: PortalState<S, W>) -> Router
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/wizard",
            get(wizard_view_handler::<S, W>).post(wizard_submit_handler::<S, W>),
        )
        .route("/api/v1/applications", get(list_handler::<S, W>))
        .route(
            "/api/v1/applications/export.csv",
            get(export_csv_handler::<S, W>),
        )
        .route(
            "/api/v1/applications/:reference",
            get(detail_handler::<S, W>).delete(cancel_handler::<S, W>),
        )
        .route(
            "/api/v1/applications/:reference/status",
            post(transition_handler::<S, W>),
        )
        .route(
            "/api/v1/applications/:reference/lead-quality/reset",
            post(reset_lead_quality_handler::<S, W>),
        )
        .route(
            "/api/v1/applications/:reference/summary",
            get(summary_handler::<S, W>),
        )
        .route(
            "/api/v1/maintenance/expired-scores",
            post(purge_scores_handler::<S, W>),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    status: Option<ApplicationStatus>,
    #[serde(default)]
    application_type: Option<ApplicationType>,
}

impl From<ListQuery> for ApplicationFilter {
    fn from(query: ListQuery) -> Self {
        ApplicationFilter {
            student: None,
            status: query.status,
            application_type: query.application_type,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PurgeQuery {
    #[serde(default)]
    dry_run: bool,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Identity set by the upstream auth layer. Staff wins if both headers are present.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    if let Some(username) = value(STAFF_HEADER) {
        return Ok(Actor::staff(username));
    }
    match value(STUDENT_HEADER).map(StudentId::parse) {
        Some(Some(id)) => Ok(Actor::student(id)),
        Some(None) => Err(error_body(
            StatusCode::UNAUTHORIZED,
            "malformed student identity",
        )),
        None => Err(error_body(StatusCode::UNAUTHORIZED, "missing portal identity")),
    }
}

fn student_from_headers(headers: &HeaderMap) -> Result<StudentId, Response> {
    match actor_from_headers(headers)? {
        Actor::Student { id } => Ok(id),
        Actor::Staff { .. } => Err(error_body(
            StatusCode::FORBIDDEN,
            "the application wizard is only available to students",
        )),
    }
}

fn parse_reference(raw: &str) -> Result<ApplicationReference, Response> {
    ApplicationReference::parse(raw)
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "application not found"))
}

pub(crate) fn failure_response(err: AdmissionsError) -> Response {
    match err {
        AdmissionsError::Validation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": fields.to_string(),
                "fields": fields,
            })),
        )
            .into_response(),
        AdmissionsError::Forbidden(_) => error_body(StatusCode::FORBIDDEN, err.to_string()),
        AdmissionsError::NotFound(_) | AdmissionsError::Repository(RepositoryError::NotFound) => {
            error_body(StatusCode::NOT_FOUND, err.to_string())
        }
        AdmissionsError::Precondition(_)
        | AdmissionsError::Transition(_)
        | AdmissionsError::Repository(RepositoryError::Conflict) => {
            error_body(StatusCode::CONFLICT, err.to_string())
        }
        other => error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub(crate) async fn wizard_view_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Query(selectors): Query<EntrySelectors>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let student = match student_from_headers(&headers) {
        Ok(student) => student,
        Err(response) => return response,
    };
    match state
        .wizard
        .view(student, &selectors, Utc::now().date_naive())
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn wizard_submit_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Json(request): Json<WizardRequest>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let student = match student_from_headers(&headers) {
        Ok(student) => student,
        Err(response) => return response,
    };
    match state
        .wizard
        .submit(student, request, Utc::now().date_naive())
    {
        Ok(WizardOutcome::Step(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(WizardOutcome::Rejected(view)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": view.errors.to_string(),
                "fields": &view.errors,
                "view": &view,
            })),
        )
            .into_response(),
        Ok(WizardOutcome::Submitted(application)) => {
            (StatusCode::CREATED, Json(application)).into_response()
        }
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn list_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state.service.list(&actor, query.into()) {
        Ok(applications) => (StatusCode::OK, Json(applications)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn export_csv_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state.service.export_csv(&actor, query.into()) {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"applications.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn detail_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let (actor, reference) = match (actor_from_headers(&headers), parse_reference(&reference)) {
        (Ok(actor), Ok(reference)) => (actor, reference),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state.service.detail(&actor, &reference) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn cancel_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let (actor, reference) = match (actor_from_headers(&headers), parse_reference(&reference)) {
        (Ok(actor), Ok(reference)) => (actor, reference),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state.service.cancel(&actor, &reference) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn transition_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let (actor, reference) = match (actor_from_headers(&headers), parse_reference(&reference)) {
        (Ok(actor), Ok(reference)) => (actor, reference),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state.service.transition(&actor, &reference, decision) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn reset_lead_quality_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let (actor, reference) = match (actor_from_headers(&headers), parse_reference(&reference)) {
        (Ok(actor), Ok(reference)) => (actor, reference),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state.service.reset_lead_quality(&actor, &reference) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn summary_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let (actor, reference) = match (actor_from_headers(&headers), parse_reference(&reference)) {
        (Ok(actor), Ok(reference)) => (actor, reference),
        (Err(response), _) | (_, Err(response)) => return response,
    };
    match state.service.export(&actor, &reference) {
        Ok(export) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.renderer.content_type())],
            state.renderer.render(&export),
        )
            .into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn purge_scores_handler<S, W>(
    State(state): State<PortalState<S, W>>,
    headers: HeaderMap,
    Query(query): Query<PurgeQuery>,
) -> Response
where
    S: EntityStore + 'static,
    W: SessionStore + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match state
        .service
        .purge_expired_scores(&actor, Utc::now().date_naive(), query.dry_run)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => failure_response(err),
    }
}
