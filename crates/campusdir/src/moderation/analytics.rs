use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{JobStatus, SubmissionStatus};
use super::repository::{CascadeQueue, RepositoryError, SubmissionRepository};

/// Half-open reporting interval `[from, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl ReportingPeriod {
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { from, until }
    }

    pub fn last_days(until: DateTime<Utc>, days: i64) -> Self {
        Self {
            from: until - Duration::days(days.max(0)),
            until,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.until
    }
}

/// Decision-side rollups for corrections decided inside the period.
///
/// `pending` is the current backlog among submissions filed in the period,
/// not a historical reconstruction. Rates divide by decided corrections;
/// both are zero when nothing was decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionStats {
    pub submitted: usize,
    pub pending: usize,
    pub approved: usize,
    pub auto_approved: usize,
    pub rejected: usize,
    pub approval_rate: f32,
    pub auto_approval_rate: f32,
    pub avg_decision_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Cascade-side rollups. Terminal counts cover jobs that finished inside
/// the period; `queued` and `processing` are current snapshots. Conflicted
/// jobs are excluded from `failed_permanently` so the two never double
/// count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeStats {
    pub queued: usize,
    pub processing: usize,
    pub done: usize,
    pub conflicted: usize,
    pub failed_permanently: usize,
    pub affected_records: u64,
    pub avg_attempts_to_done: Option<f64>,
}

/// On-demand moderation health report. Computed from current stores on
/// every request; nothing here is persisted or incrementally maintained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationReport {
    pub period: ReportingPeriod,
    pub submissions: SubmissionStats,
    pub rejection_reasons: Vec<RejectionReasonCount>,
    pub cascades: CascadeStats,
    pub trust_reconciliation_backlog: usize,
}

/// Read-only aggregator over the submission repository and job queue.
pub struct ModerationAnalytics<S, Q> {
    submissions: Arc<S>,
    queue: Arc<Q>,
}

impl<S, Q> ModerationAnalytics<S, Q>
where
    S: SubmissionRepository + 'static,
    Q: CascadeQueue + 'static,
{
    pub fn new(submissions: Arc<S>, queue: Arc<Q>) -> Self {
        Self { submissions, queue }
    }

    pub fn report(&self, period: ReportingPeriod) -> Result<ModerationReport, RepositoryError> {
        let submissions = self.submissions.all()?;
        let jobs = self.queue.all()?;

        let mut stats = SubmissionStats {
            submitted: 0,
            pending: 0,
            approved: 0,
            auto_approved: 0,
            rejected: 0,
            approval_rate: 0.0,
            auto_approval_rate: 0.0,
            avg_decision_minutes: None,
        };
        let mut reasons: BTreeMap<String, usize> = BTreeMap::new();
        let mut decision_minutes = 0.0f64;
        let mut reconciliation_backlog = 0usize;

        for record in &submissions {
            if record.needs_trust_reconciliation {
                reconciliation_backlog += 1;
            }
            if period.contains(record.submitted_at) {
                stats.submitted += 1;
                if record.status == SubmissionStatus::Pending {
                    stats.pending += 1;
                }
            }

            let Some(decided_at) = record.decided_at.filter(|at| period.contains(*at)) else {
                continue;
            };
            match record.status {
                SubmissionStatus::Approved => stats.approved += 1,
                SubmissionStatus::AutoApproved => stats.auto_approved += 1,
                SubmissionStatus::Rejected => {
                    stats.rejected += 1;
                    let reason = record
                        .rejection_note
                        .clone()
                        .unwrap_or_else(|| "unspecified".to_string());
                    *reasons.entry(reason).or_default() += 1;
                }
                SubmissionStatus::Pending => {}
            }
            decision_minutes += (decided_at - record.submitted_at).num_seconds() as f64 / 60.0;
        }

        let decided = stats.approved + stats.auto_approved + stats.rejected;
        if decided > 0 {
            stats.approval_rate = (stats.approved + stats.auto_approved) as f32 / decided as f32;
            stats.auto_approval_rate = stats.auto_approved as f32 / decided as f32;
            stats.avg_decision_minutes = Some(decision_minutes / decided as f64);
        }

        let mut rejection_reasons: Vec<RejectionReasonCount> = reasons
            .into_iter()
            .map(|(reason, count)| RejectionReasonCount { reason, count })
            .collect();
        rejection_reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));

        let mut cascades = CascadeStats {
            queued: 0,
            processing: 0,
            done: 0,
            conflicted: 0,
            failed_permanently: 0,
            affected_records: 0,
            avg_attempts_to_done: None,
        };
        let mut attempts_to_done = 0u64;

        for job in &jobs {
            match job.status {
                JobStatus::Queued => cascades.queued += 1,
                JobStatus::Processing => cascades.processing += 1,
                JobStatus::Done | JobStatus::FailedPermanent => {
                    let finished_in_period =
                        job.finished_at.is_some_and(|at| period.contains(at));
                    if !finished_in_period {
                        continue;
                    }
                    if job.status == JobStatus::Done {
                        cascades.done += 1;
                        cascades.affected_records +=
                            u64::from(job.affected_records.unwrap_or(0));
                        attempts_to_done += u64::from(job.attempts);
                    } else if job.conflicted {
                        cascades.conflicted += 1;
                    } else {
                        cascades.failed_permanently += 1;
                    }
                }
            }
        }

        if cascades.done > 0 {
            cascades.avg_attempts_to_done = Some(attempts_to_done as f64 / cascades.done as f64);
        }

        Ok(ModerationReport {
            period,
            submissions: stats,
            rejection_reasons,
            cascades,
            trust_reconciliation_backlog: reconciliation_backlog,
        })
    }
}
