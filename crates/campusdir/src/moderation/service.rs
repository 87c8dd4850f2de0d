use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::domain::{
    AutoApprovalEvent, CascadeAlert, CascadeAlertKind, CascadeJob, CorrectionSubmission,
    DecisionOutcome, JobId, ReviewerId, RuleId, SubmissionId, SubmissionRecord, SubmissionStatus,
    SubmitterId,
};
use super::intake::{CorrectionIntake, ValidationError};
use super::repository::{
    AuditTrail, CascadeQueue, PolicyStore, RepositoryError, SubmissionRepository, TrustStore,
};
use super::rules::{self, RuleOutcome};
use super::trust::{ContributorTrustRecord, TrustDecision, TrustLedger, TrustUpdateError};

/// Service owning the correction state machine.
///
/// Every state transition for a submission funnels through here: intake,
/// rule evaluation, manual decisions, and the single enqueue path that hands
/// approved corrections to the cascade scheduler.
pub struct ModerationService<S, P, T, Q, A> {
    intake: CorrectionIntake,
    submissions: Arc<S>,
    policy: Arc<P>,
    trust: TrustLedger<T>,
    queue: Arc<Q>,
    audit: Arc<A>,
}

static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_submission_id() -> SubmissionId {
    let id = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("sub-{id:06}"))
}

fn next_job_id() -> JobId {
    let id = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    JobId(format!("job-{id:06}"))
}

impl<S, P, T, Q, A> ModerationService<S, P, T, Q, A>
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
{
    pub fn new(
        submissions: Arc<S>,
        policy: Arc<P>,
        trust_store: Arc<T>,
        queue: Arc<Q>,
        audit: Arc<A>,
    ) -> Self {
        Self::with_intake(
            CorrectionIntake::default(),
            submissions,
            policy,
            trust_store,
            queue,
            audit,
        )
    }

    pub fn with_intake(
        intake: CorrectionIntake,
        submissions: Arc<S>,
        policy: Arc<P>,
        trust_store: Arc<T>,
        queue: Arc<Q>,
        audit: Arc<A>,
    ) -> Self {
        Self {
            intake,
            submissions,
            policy,
            trust: TrustLedger::new(trust_store),
            queue,
            audit,
        }
    }

    /// Accept a correction, then either auto-approve it or park it for
    /// manual review.
    ///
    /// A trust or policy read failure downgrades to the safe path: the
    /// correction stays pending and a moderator decides it later. The
    /// stored record is never lost to an evaluation hiccup.
    pub fn submit_correction(
        &self,
        submission: CorrectionSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, ModerationError> {
        let record = self
            .intake
            .record_from_submission(submission, next_submission_id(), now)?;
        let mut record = self.submissions.insert(record)?;

        let trust_snapshot = match self.trust.note_submission(&record.submitter, now) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    submission = %record.id,
                    submitter = %record.submitter,
                    error = %err,
                    "trust update failed at intake; leaving correction pending"
                );
                record.needs_trust_reconciliation = true;
                self.persist_flag(&record);
                return Ok(record);
            }
        };

        let rules = match self.policy.rules() {
            Ok(rules) => rules,
            Err(err) => {
                warn!(
                    submission = %record.id,
                    error = %err,
                    "rule set unavailable; leaving correction pending"
                );
                return Ok(record);
            }
        };

        match rules::evaluate(&record, &trust_snapshot, &rules) {
            RuleOutcome::Matched(rule) => self.finalize_approval(record, Some(rule), None, now),
            RuleOutcome::NoMatch => Ok(record),
        }
    }

    /// Apply a moderator's verdict to a pending correction.
    pub fn decide(
        &self,
        id: &SubmissionId,
        outcome: DecisionOutcome,
        reviewer: ReviewerId,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, ModerationError> {
        let record = self
            .submissions
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;

        if record.status.is_decided() {
            return Err(ModerationError::AlreadyDecided {
                id: record.id,
                status: record.status.label(),
            });
        }

        match outcome {
            DecisionOutcome::Approve => {
                self.finalize_approval(record, None, Some(reviewer), now)
            }
            DecisionOutcome::Reject => self.finalize_rejection(record, reviewer, note, now),
        }
    }

    /// Commit an approval and enqueue its cascade job.
    ///
    /// This is the only place a cascade job is created. Once the status
    /// write succeeds the approval stands; later trust or audit failures
    /// are logged (and flagged for reconciliation) rather than unwinding
    /// the decision.
    fn finalize_approval(
        &self,
        mut record: SubmissionRecord,
        rule: Option<RuleId>,
        reviewer: Option<ReviewerId>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, ModerationError> {
        record.status = if rule.is_some() {
            SubmissionStatus::AutoApproved
        } else {
            SubmissionStatus::Approved
        };
        record.decided_at = Some(now);
        record.decided_by_rule = rule;
        record.reviewed_by = reviewer;
        self.submissions.update(record.clone())?;

        if let Some(rule) = rule {
            info!(submission = %record.id, rule = %rule, "correction auto-approved");
            let event = AutoApprovalEvent {
                submission: record.id.clone(),
                submitter: record.submitter.clone(),
                rule,
                applied_value: record.proposed.summary(),
                approved_at: now,
            };
            if let Err(err) = self.audit.record_approval(event) {
                error!(
                    submission = %record.id,
                    error = %err,
                    "auto-approval audit write failed"
                );
            }
        }

        let credit = if rule.is_some() {
            TrustDecision::AutoApproved
        } else {
            TrustDecision::Approved
        };
        if let Err(err) = self.trust.note_decision(&record.submitter, credit) {
            warn!(
                submission = %record.id,
                submitter = %record.submitter,
                error = %err,
                "trust update failed after approval; flagged for reconciliation"
            );
            record.needs_trust_reconciliation = true;
            self.persist_flag(&record);
        }

        let job = CascadeJob::queued(next_job_id(), &record, now);
        match self.queue.enqueue(job) {
            Ok(_) => {}
            // A conflicting enqueue means a job already exists for this
            // submission, which is exactly the state we want.
            Err(RepositoryError::Conflict) => {
                warn!(submission = %record.id, "cascade job already queued");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(record)
    }

    fn finalize_rejection(
        &self,
        mut record: SubmissionRecord,
        reviewer: ReviewerId,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, ModerationError> {
        record.status = SubmissionStatus::Rejected;
        record.decided_at = Some(now);
        record.reviewed_by = Some(reviewer);
        record.rejection_note = note;
        self.submissions.update(record.clone())?;

        if let Err(err) = self.trust.note_decision(&record.submitter, TrustDecision::Rejected) {
            warn!(
                submission = %record.id,
                submitter = %record.submitter,
                error = %err,
                "trust update failed after rejection; flagged for reconciliation"
            );
            record.needs_trust_reconciliation = true;
            self.persist_flag(&record);
        }

        Ok(record)
    }

    fn persist_flag(&self, record: &SubmissionRecord) {
        if let Err(err) = self.submissions.update(record.clone()) {
            error!(
                submission = %record.id,
                error = %err,
                "failed to persist reconciliation flag"
            );
        }
    }

    /// Fetch one correction with its current status.
    pub fn submission(&self, id: &SubmissionId) -> Result<SubmissionRecord, ModerationError> {
        let record = self
            .submissions
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Oldest pending corrections awaiting a moderator.
    pub fn review_queue(&self, limit: usize) -> Result<Vec<SubmissionRecord>, ModerationError> {
        Ok(self.submissions.pending(limit)?)
    }

    /// Contributor statistics for profile pages and moderator context.
    pub fn trust_profile(
        &self,
        submitter: &SubmitterId,
    ) -> Result<ContributorTrustRecord, ModerationError> {
        Ok(self.trust.snapshot(submitter)?)
    }

    /// Withdraw a queued cascade job before the scheduler picks it up.
    pub fn cancel_job(
        &self,
        id: &JobId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<CascadeJob, ModerationError> {
        let job = self.queue.cancel(id, reason)?;

        let alert = CascadeAlert {
            job: job.id.clone(),
            submission: job.submission.clone(),
            kind: CascadeAlertKind::Cancelled,
            attempts: job.attempts,
            detail: reason.to_string(),
            raised_at: now,
        };
        if let Err(err) = self.audit.record_alert(alert) {
            error!(job = %job.id, error = %err, "cancellation audit write failed");
        }

        info!(job = %job.id, submission = %job.submission, "cascade job cancelled");
        Ok(job)
    }

    /// Jobs needing moderator follow-up: permanently failed or conflicted.
    pub fn attention_jobs(&self) -> Result<Vec<CascadeJob>, ModerationError> {
        Ok(self.queue.attention()?)
    }

    /// Immutable audit trail, newest entries last.
    pub fn audit_log(&self) -> Result<(Vec<AutoApprovalEvent>, Vec<CascadeAlert>), ModerationError>
    {
        let approvals = self.audit.approvals()?;
        let alerts = self.audit.alerts()?;
        Ok((approvals, alerts))
    }
}

/// Error raised by the moderation service.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Trust(#[from] TrustUpdateError),
    #[error("submission {id} was already decided ({status})")]
    AlreadyDecided {
        id: SubmissionId,
        status: &'static str,
    },
}
