use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{CorrectionKind, SubmissionRecord};
use super::outbound::{CacheInvalidator, ChangeNotice, NotificationGateway};
use crate::directory::{
    ApplyOutcome, DependentCategory, DirectoryError, DirectoryStore, DirectoryUpdate,
};

/// Ordered dependent-record categories for each correction kind.
///
/// The primary row always lands first so a reader never sees a derived row
/// ahead of the record it derives from. The order is part of the cascade
/// contract and is pinned by tests.
pub const fn cascade_plan(kind: CorrectionKind) -> &'static [DependentCategory] {
    match kind {
        CorrectionKind::Fee => &[
            DependentCategory::FeeSchedule,
            DependentCategory::ComparisonRollup,
            DependentCategory::ReminderSchedule,
        ],
        CorrectionKind::Deadline => &[
            DependentCategory::AdmissionDeadline,
            DependentCategory::ReminderSchedule,
        ],
        CorrectionKind::CalendarDate => &[
            DependentCategory::AdmissionCalendar,
            DependentCategory::ReminderSchedule,
        ],
        CorrectionKind::EntryTest => &[
            DependentCategory::EntryTestSession,
            DependentCategory::ReminderSchedule,
        ],
        CorrectionKind::MeritCutoff => &[
            DependentCategory::MeritCutoff,
            DependentCategory::ComparisonRollup,
        ],
    }
}

/// What one cascade attempt changed. `affected_records` counts only rows
/// written in this attempt, so replays after a partial failure do not
/// inflate the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub affected_records: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("transient failure updating {category}: {source}")]
    Transient {
        category: DependentCategory,
        #[source]
        source: DirectoryError,
    },
    #[error("permanent failure updating {category}: {source}")]
    Permanent {
        category: DependentCategory,
        #[source]
        source: DirectoryError,
    },
}

impl CascadeError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, CascadeError::Transient { .. })
    }
}

/// Seam between the scheduler and the entity-update machinery, so scheduling
/// behavior can be tested against scripted appliers.
pub trait CascadeApply: Send + Sync {
    fn apply(
        &self,
        record: &SubmissionRecord,
        now: DateTime<Utc>,
    ) -> Result<CascadeOutcome, CascadeError>;
}

/// Pushes one approved correction through its dependent categories in plan
/// order, stopping at the first store failure. Store-level idempotency
/// keyed on submission id and category makes a replayed prefix a no-op.
pub struct CascadeApplier<D, C, N> {
    directory: Arc<D>,
    cache: Arc<C>,
    notifier: Arc<N>,
}

impl<D, C, N> CascadeApplier<D, C, N> {
    pub fn new(directory: Arc<D>, cache: Arc<C>, notifier: Arc<N>) -> Self {
        Self {
            directory,
            cache,
            notifier,
        }
    }
}

impl<D, C, N> CascadeApply for CascadeApplier<D, C, N>
where
    D: DirectoryStore + 'static,
    C: CacheInvalidator + 'static,
    N: NotificationGateway + 'static,
{
    fn apply(
        &self,
        record: &SubmissionRecord,
        now: DateTime<Utc>,
    ) -> Result<CascadeOutcome, CascadeError> {
        let plan = cascade_plan(record.kind);
        let mut affected = 0u32;

        for category in plan {
            let update = DirectoryUpdate {
                origin: record.id.0.clone(),
                category: *category,
                institution: record.target.institution.clone(),
                program: record.target.program.clone(),
                patch: record.proposed.clone(),
                applied_at: now,
            };
            match self.directory.apply(update) {
                Ok(ApplyOutcome::Applied) => affected += 1,
                Ok(ApplyOutcome::AlreadyApplied) => {}
                Err(source) if source.is_transient() => {
                    return Err(CascadeError::Transient {
                        category: *category,
                        source,
                    });
                }
                Err(source) => {
                    return Err(CascadeError::Permanent {
                        category: *category,
                        source,
                    });
                }
            }
        }

        // Row writes are committed at this point. Cache and notification
        // problems leave stale reads or a missed digest, never a failed job.
        for category in plan {
            if let Err(err) = self
                .cache
                .invalidate(*category, &record.target.institution)
            {
                warn!(
                    submission = %record.id,
                    category = %category,
                    error = %err,
                    "cache invalidation failed"
                );
            }
        }

        let notice = ChangeNotice {
            submission: record.id.clone(),
            institution: record.target.institution.clone(),
            summary: record.proposed.summary(),
        };
        if let Err(err) = self.notifier.notify(notice) {
            warn!(submission = %record.id, error = %err, "change notification failed");
        }

        Ok(CascadeOutcome {
            affected_records: affected,
        })
    }
}
