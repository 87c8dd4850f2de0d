use chrono::{DateTime, Utc};

use super::domain::{
    AutoApprovalEvent, CascadeAlert, CascadeJob, CorrectionKind, JobId, SubmissionId,
    SubmissionRecord, SubmitterId, TargetRef,
};
use super::rules::AutoApprovalRule;
use super::scheduler::BatchSettings;
use super::trust::ContributorTrustRecord;

/// Storage abstraction so the service module can be exercised in isolation.
pub trait SubmissionRepository: Send + Sync {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError>;
    fn update(&self, record: SubmissionRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError>;
    fn pending(&self, limit: usize) -> Result<Vec<SubmissionRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<SubmissionRecord>, RepositoryError>;
}

/// Operator-editable moderation policy. Callers re-read on every evaluation
/// or scheduler tick instead of caching, so edits take effect immediately.
pub trait PolicyStore: Send + Sync {
    fn rules(&self) -> Result<Vec<AutoApprovalRule>, RepositoryError>;
    fn batch_settings(&self) -> Result<BatchSettings, RepositoryError>;
}

/// Persistence for per-contributor trust statistics.
pub trait TrustStore: Send + Sync {
    fn fetch(
        &self,
        submitter: &SubmitterId,
    ) -> Result<Option<ContributorTrustRecord>, RepositoryError>;
    fn upsert(&self, record: ContributorTrustRecord) -> Result<(), RepositoryError>;
}

/// Queue of cascade jobs awaiting, undergoing, or finished with dispatch.
///
/// `enqueue` must refuse a second job for the same submission. `claim` and
/// `cancel` are the two atomic status transitions out of `Queued`; whichever
/// runs first wins, the loser sees `None` or `Conflict`.
pub trait CascadeQueue: Send + Sync {
    fn enqueue(&self, job: CascadeJob) -> Result<CascadeJob, RepositoryError>;
    /// Atomically move a queued job to `Processing`. Returns `None` when
    /// the job is no longer queued.
    fn claim(&self, id: &JobId) -> Result<Option<CascadeJob>, RepositoryError>;
    /// Atomically move a queued job straight to `FailedPermanent`, stamping
    /// `finished_at` and recording the reason. `Conflict` when the job has
    /// already left the queue, `NotFound` when it never existed.
    fn cancel(&self, id: &JobId, reason: &str) -> Result<CascadeJob, RepositoryError>;
    fn store(&self, job: CascadeJob) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &JobId) -> Result<Option<CascadeJob>, RepositoryError>;
    fn queued(&self) -> Result<Vec<CascadeJob>, RepositoryError>;
    /// Jobs a moderator should look at: permanently failed or conflicted.
    fn attention(&self) -> Result<Vec<CascadeJob>, RepositoryError>;
    fn all(&self) -> Result<Vec<CascadeJob>, RepositoryError>;
    /// Most recent `finished_at` among successfully done jobs for the same
    /// directory entity, used for stale-correction detection.
    fn latest_completion(
        &self,
        target: &TargetRef,
        kind: CorrectionKind,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;
}

/// Append-only audit surface. Events and alerts can be recorded and listed
/// but never edited or removed.
pub trait AuditTrail: Send + Sync {
    fn record_approval(&self, event: AutoApprovalEvent) -> Result<(), RepositoryError>;
    fn record_alert(&self, alert: CascadeAlert) -> Result<(), RepositoryError>;
    fn approvals(&self) -> Result<Vec<AutoApprovalEvent>, RepositoryError>;
    fn alerts(&self) -> Result<Vec<CascadeAlert>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record state conflicts with the requested change")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
