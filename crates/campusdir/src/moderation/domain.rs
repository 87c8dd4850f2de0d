use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::directory::{InstitutionId, ProgramId, RecordPatch};

/// Identifier wrapper for submitted corrections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for contributor accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmitterId(pub String);

impl fmt::Display for SubmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for moderator accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewerId(pub String);

/// Identifier wrapper for cascade jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of correction contributors can file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrectionKind {
    #[serde(rename = "fee_correction")]
    Fee,
    #[serde(rename = "deadline_correction")]
    Deadline,
    #[serde(rename = "date_correction")]
    CalendarDate,
    #[serde(rename = "entry_test_correction")]
    EntryTest,
    #[serde(rename = "merit_cutoff_correction")]
    MeritCutoff,
}

impl CorrectionKind {
    pub const fn label(self) -> &'static str {
        match self {
            CorrectionKind::Fee => "fee_correction",
            CorrectionKind::Deadline => "deadline_correction",
            CorrectionKind::CalendarDate => "date_correction",
            CorrectionKind::EntryTest => "entry_test_correction",
            CorrectionKind::MeritCutoff => "merit_cutoff_correction",
        }
    }

    pub const fn of(patch: &RecordPatch) -> Self {
        match patch {
            RecordPatch::Fees { .. } => CorrectionKind::Fee,
            RecordPatch::Deadline { .. } => CorrectionKind::Deadline,
            RecordPatch::CalendarDate { .. } => CorrectionKind::CalendarDate,
            RecordPatch::EntryTest { .. } => CorrectionKind::EntryTest,
            RecordPatch::MeritCutoff { .. } => CorrectionKind::MeritCutoff,
        }
    }
}

/// The directory entity a correction points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub institution: InstitutionId,
    pub program: Option<ProgramId>,
}

/// Link or document key backing a claimed correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef(pub String);

/// Inbound payload from a contributor before intake validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSubmission {
    pub submitter: SubmitterId,
    pub target: TargetRef,
    pub proposed: RecordPatch,
    pub evidence: Option<EvidenceRef>,
}

/// Lifecycle of a correction. `AutoApproved` and `Approved` are both
/// terminal approvals; they stay distinct internally for auditing and
/// analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    AutoApproved,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::AutoApproved => "auto_approved",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    /// Label shown to submitters, who never see the auto/manual distinction.
    pub const fn public_label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::AutoApproved | SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub const fn is_decided(self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }

    pub const fn is_approved(self) -> bool {
        matches!(
            self,
            SubmissionStatus::AutoApproved | SubmissionStatus::Approved
        )
    }
}

/// Moderator verdict on a pending correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Approve,
    Reject,
}

/// Repository record for one correction across its whole lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub submitter: SubmitterId,
    pub kind: CorrectionKind,
    pub target: TargetRef,
    pub proposed: RecordPatch,
    pub evidence: Option<EvidenceRef>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by_rule: Option<RuleId>,
    pub reviewed_by: Option<ReviewerId>,
    pub rejection_note: Option<String>,
    pub affected_records: Option<u32>,
    pub needs_trust_reconciliation: bool,
}

impl SubmissionRecord {
    pub fn status_view(&self) -> SubmissionStatusView {
        SubmissionStatusView {
            submission_id: self.id.clone(),
            status: self.status.public_label(),
            kind: self.kind.label(),
            submitted_at: self.submitted_at,
            decided_at: self.decided_at,
            affected_records: self.affected_records,
        }
    }
}

/// Submitter-facing projection of a correction's progress.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStatusView {
    pub submission_id: SubmissionId,
    pub status: &'static str,
    pub kind: &'static str,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_records: Option<u32>,
}

/// Identifier for an auto-approval rule. Rules evaluate in ascending id
/// order, so the id doubles as the precedence rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-{}", self.0)
    }
}

/// Lifecycle of a cascade job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    FailedPermanent,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::FailedPermanent => "failed_permanent",
        }
    }
}

/// Unit of deferred work: push one approved correction into every dependent
/// directory record. Exactly one job exists per approved submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeJob {
    pub id: JobId,
    pub submission: SubmissionId,
    pub kind: CorrectionKind,
    pub target: TargetRef,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Earliest instant the job may run again after a retry backoff.
    pub not_before: Option<DateTime<Utc>>,
    /// Large or low-urgency cascades wait for the off-peak window when one
    /// is configured.
    pub prefers_off_peak: bool,
    pub conflicted: bool,
    /// When the job reached a terminal state, successful or not.
    pub finished_at: Option<DateTime<Utc>>,
    pub affected_records: Option<u32>,
}

impl CascadeJob {
    pub fn queued(id: JobId, record: &SubmissionRecord, now: DateTime<Utc>) -> Self {
        Self {
            id,
            submission: record.id.clone(),
            kind: record.kind,
            target: record.target.clone(),
            status: JobStatus::Queued,
            queued_at: now,
            attempts: 0,
            last_error: None,
            not_before: None,
            // Date-bearing corrections are time sensitive and run in any
            // window; fee and merit cascades can wait for off-peak hours.
            prefers_off_peak: matches!(
                record.kind,
                CorrectionKind::Fee | CorrectionKind::MeritCutoff
            ),
            conflicted: false,
            finished_at: None,
            affected_records: None,
        }
    }

    /// Whether the retry backoff, if any, has elapsed.
    pub fn runnable_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |at| at <= now)
    }
}

/// Immutable audit record emitted whenever a rule approves a correction
/// without human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoApprovalEvent {
    pub submission: SubmissionId,
    pub submitter: SubmitterId,
    pub rule: RuleId,
    pub applied_value: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeAlertKind {
    Failed,
    Conflicted,
    Cancelled,
}

impl CascadeAlertKind {
    pub const fn label(self) -> &'static str {
        match self {
            CascadeAlertKind::Failed => "failed",
            CascadeAlertKind::Conflicted => "conflicted",
            CascadeAlertKind::Cancelled => "cancelled",
        }
    }
}

/// Audit record raised when a cascade job leaves the happy path for good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeAlert {
    pub job: JobId,
    pub submission: SubmissionId,
    pub kind: CascadeAlertKind,
    pub attempts: u32,
    pub detail: String,
    pub raised_at: DateTime<Utc>,
}
