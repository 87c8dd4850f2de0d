use chrono::{NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::debug;

use campusdir::directory::{
    apply_change, ApplyOutcome, DependentCategory, DirectoryError, DirectoryStore,
    DirectoryUpdate, InstitutionId, InstitutionProfile, InstitutionRecord, Sector,
};
use campusdir::moderation::{
    derive_trust_level, AuditTrail, AutoApprovalEvent, AutoApprovalRule, BatchSettings,
    CacheInvalidator, CascadeAlert, CascadeJob, CascadeQueue, ChangeNotice,
    ContributorTrustRecord, CorrectionKind, JobId, JobStatus, NotificationGateway, OutboundError,
    PolicyStore, RepositoryError, RuleId, SubmissionId, SubmissionRecord, SubmissionRepository,
    SubmissionStatus, SubmitterId, TargetRef, TrustStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySubmissionRepository {
    records: Arc<Mutex<Vec<SubmissionRecord>>>,
}

impl SubmissionRepository for InMemorySubmissionRepository {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("submission mutex poisoned");
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn update(&self, record: SubmissionRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("submission mutex poisoned");
        match guard.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("submission mutex poisoned");
        Ok(guard.iter().find(|record| &record.id == id).cloned())
    }

    fn pending(&self, limit: usize) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("submission mutex poisoned");
        let mut pending: Vec<SubmissionRecord> = guard
            .iter()
            .filter(|record| record.status == SubmissionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    fn all(&self) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("submission mutex poisoned")
            .clone())
    }
}

/// Operator-editable policy. Defaults to the seeded rule set until an
/// operator swaps it out at runtime.
pub(crate) struct InMemoryPolicyStore {
    rules: Mutex<Vec<AutoApprovalRule>>,
    settings: Mutex<BatchSettings>,
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self {
            rules: Mutex::new(seed_rules()),
            settings: Mutex::new(BatchSettings::default()),
        }
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn rules(&self) -> Result<Vec<AutoApprovalRule>, RepositoryError> {
        Ok(self.rules.lock().expect("policy mutex poisoned").clone())
    }

    fn batch_settings(&self) -> Result<BatchSettings, RepositoryError> {
        Ok(self.settings.lock().expect("policy mutex poisoned").clone())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryTrustStore {
    records: Mutex<HashMap<SubmitterId, ContributorTrustRecord>>,
}

impl InMemoryTrustStore {
    pub(crate) fn seed(&self, record: ContributorTrustRecord) {
        self.records
            .lock()
            .expect("trust mutex poisoned")
            .insert(record.submitter.clone(), record);
    }
}

impl TrustStore for InMemoryTrustStore {
    fn fetch(
        &self,
        submitter: &SubmitterId,
    ) -> Result<Option<ContributorTrustRecord>, RepositoryError> {
        let guard = self.records.lock().expect("trust mutex poisoned");
        Ok(guard.get(submitter).cloned())
    }

    fn upsert(&self, record: ContributorTrustRecord) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("trust mutex poisoned")
            .insert(record.submitter.clone(), record);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryCascadeQueue {
    jobs: Mutex<Vec<CascadeJob>>,
}

impl CascadeQueue for InMemoryCascadeQueue {
    fn enqueue(&self, job: CascadeJob) -> Result<CascadeJob, RepositoryError> {
        let mut guard = self.jobs.lock().expect("queue mutex poisoned");
        if guard
            .iter()
            .any(|existing| existing.submission == job.submission)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(job.clone());
        Ok(job)
    }

    fn claim(&self, id: &JobId) -> Result<Option<CascadeJob>, RepositoryError> {
        let mut guard = self.jobs.lock().expect("queue mutex poisoned");
        match guard.iter_mut().find(|job| &job.id == id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Processing;
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    fn cancel(&self, id: &JobId, reason: &str) -> Result<CascadeJob, RepositoryError> {
        let mut guard = self.jobs.lock().expect("queue mutex poisoned");
        let job = guard
            .iter_mut()
            .find(|job| &job.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if job.status != JobStatus::Queued {
            return Err(RepositoryError::Conflict);
        }
        job.status = JobStatus::FailedPermanent;
        job.last_error = Some(reason.to_string());
        job.not_before = None;
        job.finished_at = Some(Utc::now());
        Ok(job.clone())
    }

    fn store(&self, job: CascadeJob) -> Result<(), RepositoryError> {
        let mut guard = self.jobs.lock().expect("queue mutex poisoned");
        match guard.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = job,
            None => guard.push(job),
        }
        Ok(())
    }

    fn fetch(&self, id: &JobId) -> Result<Option<CascadeJob>, RepositoryError> {
        let guard = self.jobs.lock().expect("queue mutex poisoned");
        Ok(guard.iter().find(|job| &job.id == id).cloned())
    }

    fn queued(&self) -> Result<Vec<CascadeJob>, RepositoryError> {
        let guard = self.jobs.lock().expect("queue mutex poisoned");
        Ok(guard
            .iter()
            .filter(|job| job.status == JobStatus::Queued)
            .cloned()
            .collect())
    }

    fn attention(&self) -> Result<Vec<CascadeJob>, RepositoryError> {
        let guard = self.jobs.lock().expect("queue mutex poisoned");
        Ok(guard
            .iter()
            .filter(|job| job.status == JobStatus::FailedPermanent)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<CascadeJob>, RepositoryError> {
        Ok(self.jobs.lock().expect("queue mutex poisoned").clone())
    }

    fn latest_completion(
        &self,
        target: &TargetRef,
        kind: CorrectionKind,
    ) -> Result<Option<chrono::DateTime<Utc>>, RepositoryError> {
        let guard = self.jobs.lock().expect("queue mutex poisoned");
        Ok(guard
            .iter()
            .filter(|job| {
                job.status == JobStatus::Done && &job.target == target && job.kind == kind
            })
            .filter_map(|job| job.finished_at)
            .max())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAuditTrail {
    approvals: Mutex<Vec<AutoApprovalEvent>>,
    alerts: Mutex<Vec<CascadeAlert>>,
}

impl AuditTrail for InMemoryAuditTrail {
    fn record_approval(&self, event: AutoApprovalEvent) -> Result<(), RepositoryError> {
        self.approvals
            .lock()
            .expect("audit mutex poisoned")
            .push(event);
        Ok(())
    }

    fn record_alert(&self, alert: CascadeAlert) -> Result<(), RepositoryError> {
        self.alerts.lock().expect("audit mutex poisoned").push(alert);
        Ok(())
    }

    fn approvals(&self) -> Result<Vec<AutoApprovalEvent>, RepositoryError> {
        Ok(self.approvals.lock().expect("audit mutex poisoned").clone())
    }

    fn alerts(&self) -> Result<Vec<CascadeAlert>, RepositoryError> {
        Ok(self.alerts.lock().expect("audit mutex poisoned").clone())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryDirectoryStore {
    institutions: Mutex<HashMap<InstitutionId, InstitutionRecord>>,
    applied: Mutex<HashSet<(String, DependentCategory)>>,
}

impl InMemoryDirectoryStore {
    pub(crate) fn seed(&self, record: InstitutionRecord) {
        self.institutions
            .lock()
            .expect("directory mutex poisoned")
            .insert(record.profile.id.clone(), record);
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    fn apply(&self, update: DirectoryUpdate) -> Result<ApplyOutcome, DirectoryError> {
        let key = (update.origin.clone(), update.category);
        let mut applied = self.applied.lock().expect("directory mutex poisoned");
        if applied.contains(&key) {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let mut institutions = self.institutions.lock().expect("directory mutex poisoned");
        let record = institutions
            .get_mut(&update.institution)
            .ok_or_else(|| DirectoryError::TargetMissing(update.institution.0.clone()))?;
        apply_change(record, &update);
        applied.insert(key);
        Ok(ApplyOutcome::Applied)
    }

    fn institution(
        &self,
        id: &InstitutionId,
    ) -> Result<Option<InstitutionRecord>, DirectoryError> {
        let guard = self.institutions.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Stand-in for the read-side cache tier. Records each invalidation so the
/// demo can show what a cascade touched.
#[derive(Default)]
pub(crate) struct InMemoryCacheInvalidator {
    events: Mutex<Vec<(DependentCategory, InstitutionId)>>,
}

impl InMemoryCacheInvalidator {
    pub(crate) fn events(&self) -> Vec<(DependentCategory, InstitutionId)> {
        self.events.lock().expect("cache mutex poisoned").clone()
    }
}

impl CacheInvalidator for InMemoryCacheInvalidator {
    fn invalidate(
        &self,
        category: DependentCategory,
        institution: &InstitutionId,
    ) -> Result<(), OutboundError> {
        debug!(%category, %institution, "cache invalidated");
        self.events
            .lock()
            .expect("cache mutex poisoned")
            .push((category, institution.clone()));
        Ok(())
    }
}

/// Stand-in for the reminder/notification collaborator.
#[derive(Default)]
pub(crate) struct InMemoryNotificationGateway {
    notices: Mutex<Vec<ChangeNotice>>,
}

impl InMemoryNotificationGateway {
    pub(crate) fn notices(&self) -> Vec<ChangeNotice> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl NotificationGateway for InMemoryNotificationGateway {
    fn notify(&self, notice: ChangeNotice) -> Result<(), OutboundError> {
        debug!(submission = %notice.submission, "change notice dispatched");
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

/// Default rule set loaded at process start. Lower ids win, so the narrow
/// high-trust rules sit ahead of the general date-fix fallback.
pub(crate) fn seed_rules() -> Vec<AutoApprovalRule> {
    vec![
        AutoApprovalRule {
            id: RuleId(1),
            label: "Verified fee updates with evidence".to_string(),
            eligible_kinds: vec![CorrectionKind::Fee],
            min_trust_level: 3,
            requires_evidence: true,
            requires_verified_account: true,
            enabled: true,
        },
        AutoApprovalRule {
            id: RuleId(2),
            label: "Merit cutoffs from senior contributors".to_string(),
            eligible_kinds: vec![CorrectionKind::MeritCutoff],
            min_trust_level: 3,
            requires_evidence: true,
            requires_verified_account: false,
            enabled: true,
        },
        AutoApprovalRule {
            id: RuleId(3),
            label: "Date fixes from established contributors".to_string(),
            eligible_kinds: vec![
                CorrectionKind::Deadline,
                CorrectionKind::CalendarDate,
                CorrectionKind::EntryTest,
            ],
            min_trust_level: 2,
            requires_evidence: false,
            requires_verified_account: false,
            enabled: true,
        },
    ]
}

pub(crate) fn seed_institutions(store: &InMemoryDirectoryStore) {
    store.seed(InstitutionRecord::new(InstitutionProfile {
        id: InstitutionId("punjab-uni".to_string()),
        name: "University of the Punjab".to_string(),
        city: "Lahore".to_string(),
        sector: Sector::Public,
    }));
    store.seed(InstitutionRecord::new(InstitutionProfile {
        id: InstitutionId("nust".to_string()),
        name: "National University of Sciences and Technology".to_string(),
        city: "Islamabad".to_string(),
        sector: Sector::Public,
    }));
    store.seed(InstitutionRecord::new(InstitutionProfile {
        id: InstitutionId("lums".to_string()),
        name: "Lahore University of Management Sciences".to_string(),
        city: "Lahore".to_string(),
        sector: Sector::Private,
    }));
}

/// Trust record whose derived fields agree with its counters.
pub(crate) fn contributor(
    submitter: &str,
    approved: u32,
    rejected: u32,
    verified: bool,
) -> ContributorTrustRecord {
    let decided = approved + rejected;
    let approval_rate = if decided == 0 {
        0.0
    } else {
        approved as f32 / decided as f32
    };
    ContributorTrustRecord {
        submitter: SubmitterId(submitter.to_string()),
        total_submissions: decided,
        approved,
        auto_approved: 0,
        rejected,
        pending: 0,
        approval_rate,
        trust_level: derive_trust_level(approved, approval_rate),
        badges: Vec::new(),
        impact_score: 0,
        account_verified: verified,
        last_contribution: None,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
