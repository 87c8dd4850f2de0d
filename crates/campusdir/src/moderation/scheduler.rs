use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::cascade::CascadeApply;
use super::domain::{CascadeAlert, CascadeAlertKind, CascadeJob, JobStatus, SubmissionRecord};
use super::repository::{
    AuditTrail, CascadeQueue, PolicyStore, RepositoryError, SubmissionRepository, TrustStore,
};
use super::trust::TrustLedger;

/// Daily window of low site traffic, in whole UTC hours. A window may wrap
/// midnight (`start_hour > end_hour`). Equal hours describe an empty window
/// and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffPeakWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl OffPeakWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Operator-editable dials for the cascade scheduler, re-read every tick so
/// edits apply without a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_delay_minutes: i64,
    pub off_peak: Option<OffPeakWindow>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 3,
            retry_delay_minutes: 5,
            off_peak: None,
        }
    }
}

impl BatchSettings {
    /// Delay before the next attempt, doubling per failure: 5, 10, 20
    /// minutes at the defaults.
    pub fn backoff_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        let minutes = self.retry_delay_minutes.max(1).saturating_mul(1 << exponent);
        Duration::minutes(minutes)
    }
}

/// Counters describing what one tick did, for logs and alert thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub dispatched: usize,
    pub completed: usize,
    pub retried: usize,
    pub conflicted: usize,
    pub failed_permanently: usize,
    /// Jobs skipped this tick: backoff still pending, or waiting for the
    /// off-peak window.
    pub deferred: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

enum Resolution {
    Completed,
    Retried,
    Conflicted,
    FailedPermanently,
}

/// Works off queued cascade jobs in bounded batches.
///
/// One tick claims at most `batch_size` runnable jobs oldest-first and
/// processes them to completion or a recorded failure state. A store
/// failure while handling a job counts against that job's attempts; only a
/// failure to read policy or the queue itself aborts the tick.
pub struct BatchScheduler<S, P, T, Q, A, E> {
    submissions: Arc<S>,
    policy: Arc<P>,
    trust: TrustLedger<T>,
    queue: Arc<Q>,
    audit: Arc<A>,
    applier: Arc<E>,
}

impl<S, P, T, Q, A, E> BatchScheduler<S, P, T, Q, A, E>
where
    S: SubmissionRepository + 'static,
    P: PolicyStore + 'static,
    T: TrustStore + 'static,
    Q: CascadeQueue + 'static,
    A: AuditTrail + 'static,
    E: CascadeApply + 'static,
{
    pub fn new(
        submissions: Arc<S>,
        policy: Arc<P>,
        trust_store: Arc<T>,
        queue: Arc<Q>,
        audit: Arc<A>,
        applier: Arc<E>,
    ) -> Self {
        Self {
            submissions,
            policy,
            trust: TrustLedger::new(trust_store),
            queue,
            audit,
            applier,
        }
    }

    /// Run one scheduling pass at the given instant.
    pub fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary, SchedulerError> {
        let settings = self.policy.batch_settings()?;
        let window = settings.off_peak.filter(|w| w.start_hour != w.end_hour);
        let in_window = window.map_or(true, |w| w.contains(now));

        let mut queued = self.queue.queued()?;
        queued.sort_by(|a, b| {
            a.queued_at
                .cmp(&b.queued_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        let mut summary = TickSummary::default();
        let mut candidates: Vec<&CascadeJob> = Vec::new();
        for job in &queued {
            if !job.runnable_at(now) {
                summary.deferred += 1;
                continue;
            }
            if job.prefers_off_peak && !in_window {
                summary.deferred += 1;
                continue;
            }
            candidates.push(job);
        }

        // Inside the window, flagged jobs drain first while traffic is low.
        if window.is_some() && in_window {
            candidates.sort_by_key(|job| !job.prefers_off_peak);
        }

        let batch: Vec<_> = candidates
            .into_iter()
            .take(settings.batch_size)
            .map(|job| job.id.clone())
            .collect();

        for job_id in batch {
            // A cancellation racing this tick wins here; the claim returns
            // nothing and the job is skipped.
            let Some(mut job) = self.queue.claim(&job_id)? else {
                continue;
            };
            summary.dispatched += 1;
            job.attempts += 1;

            match self.process_job(job, now, &settings) {
                Resolution::Completed => summary.completed += 1,
                Resolution::Retried => summary.retried += 1,
                Resolution::Conflicted => summary.conflicted += 1,
                Resolution::FailedPermanently => summary.failed_permanently += 1,
            }
        }

        Ok(summary)
    }

    fn process_job(
        &self,
        job: CascadeJob,
        now: DateTime<Utc>,
        settings: &BatchSettings,
    ) -> Resolution {
        let submission = match self.submissions.fetch(&job.submission) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return self.retry_or_exhaust(
                    job,
                    "submission record not found".to_string(),
                    now,
                    settings,
                );
            }
            Err(err) => {
                return self.retry_or_exhaust(
                    job,
                    format!("submission fetch failed: {err}"),
                    now,
                    settings,
                );
            }
        };

        // Stale-correction guard: if a job for the same entity finished
        // after this correction was submitted, applying it would clobber
        // newer data. Scoped per correction kind: corrections touching
        // different fields of one record never supersede each other.
        match self.queue.latest_completion(&job.target, job.kind) {
            Ok(Some(completed_at)) if completed_at > submission.submitted_at => {
                return self.resolve_conflict(job, completed_at, now);
            }
            Ok(_) => {}
            Err(err) => {
                return self.retry_or_exhaust(
                    job,
                    format!("conflict check failed: {err}"),
                    now,
                    settings,
                );
            }
        }

        match self.applier.apply(&submission, now) {
            Ok(outcome) => self.complete(job, submission, outcome.affected_records, now),
            Err(err) if err.is_transient() => {
                self.retry_or_exhaust(job, err.to_string(), now, settings)
            }
            Err(err) => self.fail_permanently(job, err.to_string(), now),
        }
    }

    fn complete(
        &self,
        mut job: CascadeJob,
        mut submission: SubmissionRecord,
        affected_records: u32,
        now: DateTime<Utc>,
    ) -> Resolution {
        job.status = JobStatus::Done;
        job.finished_at = Some(now);
        job.affected_records = Some(affected_records);
        job.last_error = None;
        job.not_before = None;
        self.store_job(&job);

        submission.affected_records = Some(affected_records);
        if let Err(err) = self.submissions.update(submission.clone()) {
            warn!(
                submission = %submission.id,
                error = %err,
                "could not record affected count on the submission"
            );
        }
        if let Err(err) = self
            .trust
            .note_impact(&submission.submitter, affected_records)
        {
            warn!(
                submitter = %submission.submitter,
                error = %err,
                "impact credit failed; contributor stats lag until reconciliation"
            );
        }

        info!(
            job = %job.id,
            submission = %submission.id,
            affected = affected_records,
            attempts = job.attempts,
            "cascade completed"
        );
        Resolution::Completed
    }

    fn retry_or_exhaust(
        &self,
        mut job: CascadeJob,
        reason: String,
        now: DateTime<Utc>,
        settings: &BatchSettings,
    ) -> Resolution {
        if job.attempts >= settings.max_attempts {
            let detail = format!(
                "gave up after {} attempts, last error: {reason}",
                job.attempts
            );
            return self.abandon(job, detail, now);
        }

        let backoff = settings.backoff_after(job.attempts);
        job.status = JobStatus::Queued;
        job.last_error = Some(reason.clone());
        job.not_before = Some(now + backoff);
        self.store_job(&job);

        warn!(
            job = %job.id,
            attempt = job.attempts,
            retry_in_minutes = backoff.num_minutes(),
            reason,
            "cascade attempt failed; retrying after backoff"
        );
        Resolution::Retried
    }

    fn fail_permanently(&self, job: CascadeJob, reason: String, now: DateTime<Utc>) -> Resolution {
        let detail = format!("permanent failure on attempt {}: {reason}", job.attempts);
        self.abandon(job, detail, now)
    }

    fn abandon(&self, mut job: CascadeJob, detail: String, now: DateTime<Utc>) -> Resolution {
        job.status = JobStatus::FailedPermanent;
        job.last_error = Some(detail.clone());
        job.not_before = None;
        job.finished_at = Some(now);
        self.store_job(&job);
        self.raise_alert(&job, CascadeAlertKind::Failed, detail.clone(), now);

        error!(job = %job.id, submission = %job.submission, detail, "cascade failed permanently");
        Resolution::FailedPermanently
    }

    fn resolve_conflict(
        &self,
        mut job: CascadeJob,
        superseded_by: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Resolution {
        let detail = format!("superseded by a change completed at {superseded_by}");
        job.status = JobStatus::FailedPermanent;
        job.conflicted = true;
        job.last_error = Some(detail.clone());
        job.not_before = None;
        job.finished_at = Some(now);
        self.store_job(&job);
        self.raise_alert(&job, CascadeAlertKind::Conflicted, detail.clone(), now);

        warn!(
            job = %job.id,
            submission = %job.submission,
            detail,
            "cascade deferred to manual review"
        );
        Resolution::Conflicted
    }

    fn store_job(&self, job: &CascadeJob) {
        if let Err(err) = self.queue.store(job.clone()) {
            error!(job = %job.id, error = %err, "failed to persist job state");
        }
    }

    fn raise_alert(
        &self,
        job: &CascadeJob,
        kind: CascadeAlertKind,
        detail: String,
        now: DateTime<Utc>,
    ) {
        let alert = CascadeAlert {
            job: job.id.clone(),
            submission: job.submission.clone(),
            kind,
            attempts: job.attempts,
            detail,
            raised_at: now,
        };
        if let Err(err) = self.audit.record_alert(alert) {
            error!(job = %job.id, error = %err, "alert audit write failed");
        }
    }
}
