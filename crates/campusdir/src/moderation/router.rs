use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::analytics::{ModerationAnalytics, ReportingPeriod};
use super::domain::{CorrectionSubmission, DecisionOutcome, JobId, ReviewerId, SubmissionId, SubmitterId};
use super::repository::{
    AuditTrail, CascadeQueue, PolicyStore, RepositoryError, SubmissionRepository, TrustStore,
};
use super::service::{ModerationError, ModerationService};
use crate::directory::{DirectoryStore, InstitutionId};

const DEFAULT_QUEUE_LIMIT: usize = 20;
const DEFAULT_REPORT_DAYS: i64 = 30;

/// Handler state shared across moderation and directory endpoints.
pub struct ModerationState<S, P, T, Q, A, D> {
    pub service: Arc<ModerationService<S, P, T, Q, A>>,
    pub analytics: Arc<ModerationAnalytics<S, Q>>,
    pub directory: Arc<D>,
}

impl<S, P, T, Q, A, D> Clone for ModerationState<S, P, T, Q, A, D> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            analytics: Arc::clone(&self.analytics),
            directory: Arc::clone(&self.directory),
        }
    }
}

/// Router builder exposing the correction intake, moderation, and read
/// surfaces.
pub fn moderation_router<S, P, T, Q, A, D>(state: ModerationState<S, P, T, Q, A, D>) -> Router
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/directory/corrections",
            post(submit_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/directory/corrections/:submission_id",
            get(status_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/directory/corrections/:submission_id/decision",
            post(decide_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/directory/institutions/:institution_id",
            get(institution_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/moderation/queue",
            get(queue_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/moderation/attention",
            get(attention_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/moderation/jobs/:job_id/cancel",
            post(cancel_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/moderation/contributors/:submitter_id",
            get(contributor_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/moderation/analytics",
            get(analytics_handler::<S, P, T, Q, A, D>),
        )
        .route(
            "/api/v1/moderation/audit",
            get(audit_handler::<S, P, T, Q, A, D>),
        )
        .with_state(state)
}

pub(crate) async fn submit_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    axum::Json(submission): axum::Json<CorrectionSubmission>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    match state.service.submit_correction(submission, Utc::now()) {
        Ok(record) => {
            (StatusCode::ACCEPTED, axum::Json(record.status_view())).into_response()
        }
        Err(ModerationError::Validation(error)) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn status_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Path(submission_id): Path<String>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    let id = SubmissionId(submission_id);
    match state.service.submission(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(ModerationError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({ "error": format!("correction {} not found", id.0) });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    pub outcome: DecisionOutcome,
    pub reviewer_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

pub(crate) async fn decide_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Path(submission_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    if request.reviewer_id.trim().is_empty() {
        let payload = json!({ "error": "reviewer_id must not be blank" });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    let id = SubmissionId(submission_id);
    let reviewer = ReviewerId(request.reviewer_id);
    match state
        .service
        .decide(&id, request.outcome, reviewer, request.note, Utc::now())
    {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(ModerationError::AlreadyDecided { id, status }) => {
            let payload = json!({
                "error": format!("correction {} was already decided", id.0),
                "status": status,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(ModerationError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({ "error": format!("correction {} not found", id.0) });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueueParams {
    pub limit: Option<usize>,
}

pub(crate) async fn queue_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Query(params): Query<QueueParams>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    let limit = params.limit.unwrap_or(DEFAULT_QUEUE_LIMIT);
    match state.service.review_queue(limit) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn attention_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    match state.service.attention_jobs() {
        Ok(jobs) => (StatusCode::OK, axum::Json(jobs)).into_response(),
        Err(other) => internal_error(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub(crate) async fn cancel_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Path(job_id): Path<String>,
    axum::Json(request): axum::Json<CancelRequest>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    let id = JobId(job_id);
    let reason = request
        .reason
        .unwrap_or_else(|| "cancelled by operator".to_string());
    match state.service.cancel_job(&id, &reason, Utc::now()) {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(ModerationError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({ "error": format!("job {} is no longer queued", id.0) });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(ModerationError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({ "error": format!("job {} not found", id.0) });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn contributor_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Path(submitter_id): Path<String>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    let id = SubmitterId(submitter_id);
    match state.service.trust_profile(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(other) => internal_error(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyticsParams {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

pub(crate) async fn analytics_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Query(params): Query<AnalyticsParams>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    let until = params.until.unwrap_or_else(Utc::now);
    let period = match params.from {
        Some(from) => ReportingPeriod::new(from, until),
        None => ReportingPeriod::last_days(until, DEFAULT_REPORT_DAYS),
    };
    match state.analytics.report(period) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn audit_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    match state.service.audit_log() {
        Ok((approvals, alerts)) => {
            let payload = json!({
                "auto_approvals": approvals,
                "cascade_alerts": alerts,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn institution_handler<S, P, T, Q, A, D>(
    State(state): State<ModerationState<S, P, T, Q, A, D>>,
    Path(institution_id): Path<String>,
) -> Response
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    D: DirectoryStore + 'static,
{
    let id = InstitutionId(institution_id);
    match state.directory.institution(&id) {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(None) => {
            let payload = json!({ "error": format!("institution {} not found", id.0) });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) if error.is_transient() => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn internal_error(error: ModerationError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
