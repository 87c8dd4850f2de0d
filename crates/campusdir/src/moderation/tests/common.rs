use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::directory::{
    apply_change, ApplyOutcome, DependentCategory, DirectoryError, DirectoryStore,
    DirectoryUpdate, InstitutionId, InstitutionProfile, InstitutionRecord, ProgramId, RecordPatch,
    Sector,
};
use crate::moderation::analytics::ModerationAnalytics;
use crate::moderation::cascade::{CascadeApply, CascadeError, CascadeOutcome};
use crate::moderation::domain::{
    AutoApprovalEvent, CascadeAlert, CascadeJob, CorrectionKind, CorrectionSubmission,
    EvidenceRef, JobId, JobStatus, RuleId, SubmissionId, SubmissionRecord, SubmissionStatus,
    SubmitterId, TargetRef,
};
use crate::moderation::intake::CorrectionIntake;
use crate::moderation::outbound::{
    CacheInvalidator, ChangeNotice, NotificationGateway, OutboundError,
};
use crate::moderation::repository::{
    AuditTrail, CascadeQueue, PolicyStore, RepositoryError, SubmissionRepository, TrustStore,
};
use crate::moderation::router::{moderation_router, ModerationState};
use crate::moderation::rules::AutoApprovalRule;
use crate::moderation::scheduler::{BatchScheduler, BatchSettings};
use crate::moderation::service::ModerationService;
use crate::moderation::trust::{derive_trust_level, ContributorTrustRecord};

pub(super) fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0)
        .single()
        .expect("valid clock")
}

pub(super) fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, hour, 15, 0)
        .single()
        .expect("valid clock")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn target() -> TargetRef {
    TargetRef {
        institution: InstitutionId("punjab-uni".to_string()),
        program: Some(ProgramId("bscs".to_string())),
    }
}

pub(super) fn fee_submission() -> CorrectionSubmission {
    CorrectionSubmission {
        submitter: SubmitterId("sana-malik".to_string()),
        target: target(),
        proposed: RecordPatch::Fees {
            tuition_per_semester: 118_000,
            application_fee: 2_500,
        },
        evidence: Some(EvidenceRef(
            "https://admissions.punjab-uni.edu.pk/fee-card".to_string(),
        )),
    }
}

pub(super) fn deadline_submission() -> CorrectionSubmission {
    CorrectionSubmission {
        submitter: SubmitterId("sana-malik".to_string()),
        target: TargetRef {
            institution: InstitutionId("punjab-uni".to_string()),
            program: None,
        },
        proposed: RecordPatch::Deadline {
            round: "fall".to_string(),
            closes_on: date(2025, 7, 15),
        },
        evidence: Some(EvidenceRef("doc:notices/fall-2025.pdf".to_string())),
    }
}

pub(super) fn calendar_submission() -> CorrectionSubmission {
    CorrectionSubmission {
        submitter: SubmitterId("sana-malik".to_string()),
        target: TargetRef {
            institution: InstitutionId("punjab-uni".to_string()),
            program: None,
        },
        proposed: RecordPatch::CalendarDate {
            event: "orientation week".to_string(),
            falls_on: date(2025, 8, 20),
        },
        evidence: None,
    }
}

pub(super) fn entry_test_submission() -> CorrectionSubmission {
    CorrectionSubmission {
        submitter: SubmitterId("sana-malik".to_string()),
        target: TargetRef {
            institution: InstitutionId("punjab-uni".to_string()),
            program: None,
        },
        proposed: RecordPatch::EntryTest {
            test_name: "ECAT".to_string(),
            held_on: date(2025, 6, 22),
            registration_closes: date(2025, 6, 1),
        },
        evidence: Some(EvidenceRef(
            "https://etc.punjab-uni.edu.pk/ecat".to_string(),
        )),
    }
}

pub(super) fn merit_submission() -> CorrectionSubmission {
    CorrectionSubmission {
        submitter: SubmitterId("sana-malik".to_string()),
        target: target(),
        proposed: RecordPatch::MeritCutoff {
            year: 2024,
            closing_percentage: 87.4,
        },
        evidence: Some(EvidenceRef("doc:merit/bscs-2024.png".to_string())),
    }
}

pub(super) fn institution_fixture() -> InstitutionRecord {
    InstitutionRecord::new(InstitutionProfile {
        id: InstitutionId("punjab-uni".to_string()),
        name: "University of the Punjab".to_string(),
        city: "Lahore".to_string(),
        sector: Sector::Public,
    })
}

/// Trust record whose derived fields are consistent with the given counters.
pub(super) fn trusted_record(submitter: &str, approved: u32, rejected: u32) -> ContributorTrustRecord {
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
        account_verified: true,
        last_contribution: None,
    }
}

pub(super) fn rule(id: u32, kinds: &[CorrectionKind], min_trust_level: u8) -> AutoApprovalRule {
    AutoApprovalRule {
        id: RuleId(id),
        label: format!("rule {id}"),
        eligible_kinds: kinds.to_vec(),
        min_trust_level,
        requires_evidence: true,
        requires_verified_account: false,
        enabled: true,
    }
}

pub(super) fn pending_record(submission: CorrectionSubmission, id: &str) -> SubmissionRecord {
    CorrectionIntake::default()
        .record_from_submission(submission, SubmissionId(id.to_string()), clock())
        .expect("fixture passes intake")
}

pub(super) fn approved_record(submission: CorrectionSubmission, id: &str) -> SubmissionRecord {
    let mut record = pending_record(submission, id);
    record.status = SubmissionStatus::AutoApproved;
    record.decided_at = Some(clock());
    record.decided_by_rule = Some(RuleId(1));
    record
}

pub(super) fn queued_job(
    id: &str,
    record: &SubmissionRecord,
    queued_at: DateTime<Utc>,
) -> CascadeJob {
    CascadeJob::queued(JobId(id.to_string()), record, queued_at)
}

pub(super) fn finished_job(
    id: &str,
    record: &SubmissionRecord,
    finished_at: DateTime<Utc>,
) -> CascadeJob {
    let mut job = CascadeJob::queued(JobId(id.to_string()), record, finished_at);
    job.status = JobStatus::Done;
    job.attempts = 1;
    job.finished_at = Some(finished_at);
    job.affected_records = Some(3);
    job
}

pub(super) type TestService =
    ModerationService<MemorySubmissions, MemoryPolicy, MemoryTrust, MemoryQueue, MemoryAudit>;

pub(super) type TestScheduler<E> =
    BatchScheduler<MemorySubmissions, MemoryPolicy, MemoryTrust, MemoryQueue, MemoryAudit, E>;

/// In-memory stores wired the way the binary wires its production stores.
pub(super) struct Harness {
    pub(super) submissions: Arc<MemorySubmissions>,
    pub(super) policy: Arc<MemoryPolicy>,
    pub(super) trust: Arc<MemoryTrust>,
    pub(super) queue: Arc<MemoryQueue>,
    pub(super) audit: Arc<MemoryAudit>,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self {
            submissions: Arc::new(MemorySubmissions::default()),
            policy: Arc::new(MemoryPolicy::default()),
            trust: Arc::new(MemoryTrust::default()),
            queue: Arc::new(MemoryQueue::default()),
            audit: Arc::new(MemoryAudit::default()),
        }
    }

    pub(super) fn service(&self) -> TestService {
        ModerationService::new(
            self.submissions.clone(),
            self.policy.clone(),
            self.trust.clone(),
            self.queue.clone(),
            self.audit.clone(),
        )
    }

    pub(super) fn scheduler<E>(&self, applier: Arc<E>) -> TestScheduler<E>
    where
        E: CascadeApply + 'static,
    {
        BatchScheduler::new(
            self.submissions.clone(),
            self.policy.clone(),
            self.trust.clone(),
            self.queue.clone(),
            self.audit.clone(),
            applier,
        )
    }
}

pub(super) fn moderation_test_router<D>(harness: &Harness, directory: Arc<D>) -> axum::Router
where
    D: DirectoryStore + 'static,
{
    let state = ModerationState {
        service: Arc::new(harness.service()),
        analytics: Arc::new(ModerationAnalytics::new(
            harness.submissions.clone(),
            harness.queue.clone(),
        )),
        directory,
    };
    moderation_router(state)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default, Clone)]
pub(super) struct MemorySubmissions {
    records: Arc<Mutex<Vec<SubmissionRecord>>>,
}

impl SubmissionRepository for MemorySubmissions {
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
        Ok(self.records.lock().expect("submission mutex poisoned").clone())
    }
}

pub(super) struct MemoryPolicy {
    rules: Mutex<Vec<AutoApprovalRule>>,
    settings: Mutex<BatchSettings>,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            settings: Mutex::new(BatchSettings::default()),
        }
    }
}

impl MemoryPolicy {
    pub(super) fn set_rules(&self, rules: Vec<AutoApprovalRule>) {
        *self.rules.lock().expect("policy mutex poisoned") = rules;
    }

    pub(super) fn set_settings(&self, settings: BatchSettings) {
        *self.settings.lock().expect("policy mutex poisoned") = settings;
    }
}

impl PolicyStore for MemoryPolicy {
    fn rules(&self) -> Result<Vec<AutoApprovalRule>, RepositoryError> {
        Ok(self.rules.lock().expect("policy mutex poisoned").clone())
    }

    fn batch_settings(&self) -> Result<BatchSettings, RepositoryError> {
        Ok(self.settings.lock().expect("policy mutex poisoned").clone())
    }
}

pub(super) struct FailingPolicy;

impl PolicyStore for FailingPolicy {
    fn rules(&self) -> Result<Vec<AutoApprovalRule>, RepositoryError> {
        Err(RepositoryError::Unavailable("policy store offline".to_string()))
    }

    fn batch_settings(&self) -> Result<BatchSettings, RepositoryError> {
        Err(RepositoryError::Unavailable("policy store offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryTrust {
    records: Mutex<HashMap<SubmitterId, ContributorTrustRecord>>,
}

impl MemoryTrust {
    pub(super) fn seed(&self, record: ContributorTrustRecord) {
        self.records
            .lock()
            .expect("trust mutex poisoned")
            .insert(record.submitter.clone(), record);
    }
}

impl TrustStore for MemoryTrust {
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

pub(super) struct FailingTrust;

impl TrustStore for FailingTrust {
    fn fetch(
        &self,
        _submitter: &SubmitterId,
    ) -> Result<Option<ContributorTrustRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("trust store offline".to_string()))
    }

    fn upsert(&self, _record: ContributorTrustRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("trust store offline".to_string()))
    }
}

/// Reads succeed but writes fail, so decisions commit while the trust
/// counters fall behind.
pub(super) struct FailingUpsertTrust;

impl TrustStore for FailingUpsertTrust {
    fn fetch(
        &self,
        _submitter: &SubmitterId,
    ) -> Result<Option<ContributorTrustRecord>, RepositoryError> {
        Ok(None)
    }

    fn upsert(&self, _record: ContributorTrustRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("trust store read only".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryQueue {
    jobs: Mutex<Vec<CascadeJob>>,
}

impl CascadeQueue for MemoryQueue {
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
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
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
pub(super) struct MemoryAudit {
    approvals: Mutex<Vec<AutoApprovalEvent>>,
    alerts: Mutex<Vec<CascadeAlert>>,
}

impl AuditTrail for MemoryAudit {
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

pub(super) struct FailingAudit;

impl AuditTrail for FailingAudit {
    fn record_approval(&self, _event: AutoApprovalEvent) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("audit store offline".to_string()))
    }

    fn record_alert(&self, _alert: CascadeAlert) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("audit store offline".to_string()))
    }

    fn approvals(&self) -> Result<Vec<AutoApprovalEvent>, RepositoryError> {
        Ok(Vec::new())
    }

    fn alerts(&self) -> Result<Vec<CascadeAlert>, RepositoryError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    institutions: Mutex<HashMap<InstitutionId, InstitutionRecord>>,
    applied: Mutex<HashSet<(String, DependentCategory)>>,
}

impl MemoryDirectory {
    pub(super) fn seed(&self, record: InstitutionRecord) {
        self.institutions
            .lock()
            .expect("directory mutex poisoned")
            .insert(record.profile.id.clone(), record);
    }

    pub(super) fn snapshot(&self, id: &InstitutionId) -> Option<InstitutionRecord> {
        self.institutions
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl DirectoryStore for MemoryDirectory {
    fn apply(&self, update: DirectoryUpdate) -> Result<ApplyOutcome, DirectoryError> {
        let key = (update.origin.clone(), update.category);
        let mut applied = self.applied.lock().expect("directory mutex poisoned");
        if applied.contains(&key) {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let mut institutions = self.institutions.lock().expect("directory mutex poisoned");
        let record = institutions
            .entry(update.institution.clone())
            .or_insert_with(|| {
                InstitutionRecord::new(InstitutionProfile {
                    id: update.institution.clone(),
                    name: update.institution.0.clone(),
                    city: "Lahore".to_string(),
                    sector: Sector::Public,
                })
            });
        apply_change(record, &update);
        applied.insert(key);
        Ok(ApplyOutcome::Applied)
    }

    fn institution(
        &self,
        id: &InstitutionId,
    ) -> Result<Option<InstitutionRecord>, DirectoryError> {
        Ok(self.snapshot(id))
    }
}

/// Fails every write to one category until disarmed, for partial-cascade
/// replays.
pub(super) struct FailOnCategory {
    pub(super) inner: MemoryDirectory,
    category: DependentCategory,
    armed: Mutex<bool>,
}

impl FailOnCategory {
    pub(super) fn new(category: DependentCategory) -> Self {
        Self {
            inner: MemoryDirectory::default(),
            category,
            armed: Mutex::new(true),
        }
    }

    pub(super) fn disarm(&self) {
        *self.armed.lock().expect("directory mutex poisoned") = false;
    }
}

impl DirectoryStore for FailOnCategory {
    fn apply(&self, update: DirectoryUpdate) -> Result<ApplyOutcome, DirectoryError> {
        let armed = *self.armed.lock().expect("directory mutex poisoned");
        if armed && update.category == self.category {
            return Err(DirectoryError::Unavailable("rollup store offline".to_string()));
        }
        self.inner.apply(update)
    }

    fn institution(
        &self,
        id: &InstitutionId,
    ) -> Result<Option<InstitutionRecord>, DirectoryError> {
        self.inner.institution(id)
    }
}

pub(super) struct BrokenDirectory;

impl DirectoryStore for BrokenDirectory {
    fn apply(&self, update: DirectoryUpdate) -> Result<ApplyOutcome, DirectoryError> {
        Err(DirectoryError::TargetMissing(update.institution.0))
    }

    fn institution(
        &self,
        _id: &InstitutionId,
    ) -> Result<Option<InstitutionRecord>, DirectoryError> {
        Ok(None)
    }
}

pub(super) struct UnavailableDirectory;

impl DirectoryStore for UnavailableDirectory {
    fn apply(&self, _update: DirectoryUpdate) -> Result<ApplyOutcome, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }

    fn institution(
        &self,
        _id: &InstitutionId,
    ) -> Result<Option<InstitutionRecord>, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryCache {
    events: Mutex<Vec<(DependentCategory, InstitutionId)>>,
}

impl MemoryCache {
    pub(super) fn events(&self) -> Vec<(DependentCategory, InstitutionId)> {
        self.events.lock().expect("cache mutex poisoned").clone()
    }
}

impl CacheInvalidator for MemoryCache {
    fn invalidate(
        &self,
        category: DependentCategory,
        institution: &InstitutionId,
    ) -> Result<(), OutboundError> {
        self.events
            .lock()
            .expect("cache mutex poisoned")
            .push((category, institution.clone()));
        Ok(())
    }
}

pub(super) struct FailingCache;

impl CacheInvalidator for FailingCache {
    fn invalidate(
        &self,
        _category: DependentCategory,
        _institution: &InstitutionId,
    ) -> Result<(), OutboundError> {
        Err(OutboundError::Transport("cache tier offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<ChangeNotice>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<ChangeNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationGateway for MemoryNotifier {
    fn notify(&self, notice: ChangeNotice) -> Result<(), OutboundError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationGateway for FailingNotifier {
    fn notify(&self, _notice: ChangeNotice) -> Result<(), OutboundError> {
        Err(OutboundError::Transport("mail relay offline".to_string()))
    }
}

/// Applier that replays a prepared script of attempt outcomes and records
/// the order submissions reached it.
pub(super) struct ScriptedApplier {
    outcomes: Mutex<VecDeque<Result<CascadeOutcome, CascadeError>>>,
    seen: Mutex<Vec<SubmissionId>>,
}

impl ScriptedApplier {
    pub(super) fn new(outcomes: Vec<Result<CascadeOutcome, CascadeError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn seen(&self) -> Vec<SubmissionId> {
        self.seen.lock().expect("applier mutex poisoned").clone()
    }
}

impl CascadeApply for ScriptedApplier {
    fn apply(
        &self,
        record: &SubmissionRecord,
        _now: DateTime<Utc>,
    ) -> Result<CascadeOutcome, CascadeError> {
        self.seen
            .lock()
            .expect("applier mutex poisoned")
            .push(record.id.clone());
        self.outcomes
            .lock()
            .expect("applier mutex poisoned")
            .pop_front()
            .unwrap_or(Ok(CascadeOutcome {
                affected_records: 2,
            }))
    }
}

pub(super) fn applied(affected_records: u32) -> Result<CascadeOutcome, CascadeError> {
    Ok(CascadeOutcome { affected_records })
}

pub(super) fn transient_failure() -> Result<CascadeOutcome, CascadeError> {
    Err(CascadeError::Transient {
        category: DependentCategory::ComparisonRollup,
        source: DirectoryError::Unavailable("rollup store offline".to_string()),
    })
}

pub(super) fn permanent_failure() -> Result<CascadeOutcome, CascadeError> {
    Err(CascadeError::Permanent {
        category: DependentCategory::FeeSchedule,
        source: DirectoryError::TargetMissing("punjab-uni".to_string()),
    })
}
