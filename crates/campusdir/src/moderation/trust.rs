use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::SubmitterId;
use super::repository::{RepositoryError, TrustStore};

/// Recognition milestones shown on contributor profiles. Badges are awarded
/// when a threshold is crossed and never revoked afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstCorrection,
    PowerContributor,
    AccuracyExpert,
    CampusInsider,
}

impl Badge {
    pub const fn label(self) -> &'static str {
        match self {
            Badge::FirstCorrection => "first_correction",
            Badge::PowerContributor => "power_contributor",
            Badge::AccuracyExpert => "accuracy_expert",
            Badge::CampusInsider => "campus_insider",
        }
    }

    const ALL: [Badge; 4] = [
        Badge::FirstCorrection,
        Badge::PowerContributor,
        Badge::AccuracyExpert,
        Badge::CampusInsider,
    ];
}

/// Per-contributor statistics driving auto-approval eligibility.
///
/// `approval_rate` is the share of decided corrections that were approved;
/// pending corrections count toward `total_submissions` only. `trust_level`
/// and `badges` are derived from the counters on every write, so a stored
/// record is always internally consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorTrustRecord {
    pub submitter: SubmitterId,
    pub total_submissions: u32,
    pub approved: u32,
    /// Approvals granted by a rule without human review, a subset of
    /// `approved`.
    pub auto_approved: u32,
    pub rejected: u32,
    pub pending: u32,
    pub approval_rate: f32,
    pub trust_level: u8,
    pub badges: Vec<Badge>,
    /// Running total of directory records this contributor's corrections
    /// have touched.
    pub impact_score: u64,
    pub account_verified: bool,
    pub last_contribution: Option<DateTime<Utc>>,
}

impl ContributorTrustRecord {
    /// Fresh record for a contributor with no history. Level 0, no badges.
    pub fn starting(submitter: SubmitterId) -> Self {
        Self {
            submitter,
            total_submissions: 0,
            approved: 0,
            auto_approved: 0,
            rejected: 0,
            pending: 0,
            approval_rate: 0.0,
            trust_level: 0,
            badges: Vec::new(),
            impact_score: 0,
            account_verified: false,
            last_contribution: None,
        }
    }

    fn recomputed(mut self) -> Self {
        let decided = self.approved + self.rejected;
        self.approval_rate = if decided == 0 {
            0.0
        } else {
            self.approved as f32 / decided as f32
        };
        self.trust_level = derive_trust_level(self.approved, self.approval_rate);
        self.badges = refresh_badges(&self);
        self
    }
}

/// Level ladder: both the approved count and the accuracy bar must be met.
pub fn derive_trust_level(approved: u32, approval_rate: f32) -> u8 {
    const LADDER: [(u32, f32, u8); 4] = [
        (50, 0.95, 4),
        (25, 0.85, 3),
        (10, 0.75, 2),
        (3, 0.60, 1),
    ];

    for (min_approved, min_rate, level) in LADDER {
        if approved >= min_approved && approval_rate >= min_rate {
            return level;
        }
    }
    0
}

fn refresh_badges(record: &ContributorTrustRecord) -> Vec<Badge> {
    let decided = record.approved + record.rejected;
    Badge::ALL
        .into_iter()
        .filter(|badge| {
            let earned_now = match badge {
                Badge::FirstCorrection => record.approved >= 1,
                Badge::PowerContributor => record.approved >= 10,
                Badge::AccuracyExpert => decided >= 5 && record.approval_rate >= 0.95,
                Badge::CampusInsider => record.impact_score >= 100,
            };
            earned_now || record.badges.contains(badge)
        })
        .collect()
}

/// How a decided correction counts toward contributor statistics. Both
/// approval variants feed `approved`; only rule approvals feed the
/// `auto_approved` sub-counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Approved,
    AutoApproved,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum TrustUpdateError {
    #[error("trust store rejected the update: {0}")]
    Store(#[from] RepositoryError),
}

/// Read/update facade over the trust store.
///
/// `snapshot` treats an unknown contributor as a level-0 record rather than
/// an error, so evaluation can always proceed. The note methods persist the
/// adjusted counters together with the re-derived level and badges.
#[derive(Debug)]
pub struct TrustLedger<T> {
    store: Arc<T>,
}

impl<T> Clone for TrustLedger<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> TrustLedger<T>
where
    T: TrustStore,
{
    pub fn new(store: Arc<T>) -> Self {
        Self { store }
    }

    pub fn snapshot(
        &self,
        submitter: &SubmitterId,
    ) -> Result<ContributorTrustRecord, TrustUpdateError> {
        let record = self
            .store
            .fetch(submitter)?
            .unwrap_or_else(|| ContributorTrustRecord::starting(submitter.clone()));
        Ok(record)
    }

    /// Count a freshly accepted submission as pending work.
    pub fn note_submission(
        &self,
        submitter: &SubmitterId,
        now: DateTime<Utc>,
    ) -> Result<ContributorTrustRecord, TrustUpdateError> {
        let mut record = self.snapshot(submitter)?;
        record.total_submissions += 1;
        record.pending += 1;
        record.last_contribution = Some(now);
        let record = record.recomputed();
        self.store.upsert(record.clone())?;
        Ok(record)
    }

    /// Move one pending correction into the decided counters.
    pub fn note_decision(
        &self,
        submitter: &SubmitterId,
        decision: TrustDecision,
    ) -> Result<ContributorTrustRecord, TrustUpdateError> {
        let mut record = self.snapshot(submitter)?;
        record.pending = record.pending.saturating_sub(1);
        match decision {
            TrustDecision::Approved => record.approved += 1,
            TrustDecision::AutoApproved => {
                record.approved += 1;
                record.auto_approved += 1;
            }
            TrustDecision::Rejected => record.rejected += 1,
        }
        let record = record.recomputed();
        self.store.upsert(record.clone())?;
        Ok(record)
    }

    /// Credit the contributor for directory records their correction changed.
    pub fn note_impact(
        &self,
        submitter: &SubmitterId,
        affected_records: u32,
    ) -> Result<ContributorTrustRecord, TrustUpdateError> {
        let mut record = self.snapshot(submitter)?;
        record.impact_score += u64::from(affected_records);
        let record = record.recomputed();
        self.store.upsert(record.clone())?;
        Ok(record)
    }
}
