//! Correction intake, trust tracking, rule evaluation, decisions, cascades,
//! and analytics for the campus directory.
//!
//! A correction moves through one pipeline: the intake guard validates it,
//! the rule evaluator checks whether the contributor's trust record lets it
//! skip review, the decision service commits the outcome, and an approved
//! correction hands off exactly one cascade job that the batch scheduler
//! pushes into the directory's dependent records.

pub mod analytics;
pub mod cascade;
pub mod domain;
pub mod intake;
pub mod outbound;
pub mod repository;
pub mod router;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod trust;

#[cfg(test)]
mod tests;

pub use analytics::{ModerationAnalytics, ModerationReport, ReportingPeriod};
pub use cascade::{cascade_plan, CascadeApplier, CascadeApply, CascadeError, CascadeOutcome};
pub use domain::{
    AutoApprovalEvent, CascadeAlert, CascadeAlertKind, CascadeJob, CorrectionKind,
    CorrectionSubmission, DecisionOutcome, EvidenceRef, JobId, JobStatus, ReviewerId, RuleId,
    SubmissionId, SubmissionRecord, SubmissionStatus, SubmissionStatusView, SubmitterId,
    TargetRef,
};
pub use intake::{CorrectionIntake, IntakePolicy, ValidationError};
pub use outbound::{CacheInvalidator, ChangeNotice, NotificationGateway, OutboundError};
pub use repository::{
    AuditTrail, CascadeQueue, PolicyStore, RepositoryError, SubmissionRepository, TrustStore,
};
pub use router::{moderation_router, ModerationState};
pub use rules::{evaluate, AutoApprovalRule, RuleOutcome};
pub use scheduler::{BatchScheduler, BatchSettings, OffPeakWindow, SchedulerError, TickSummary};
pub use service::{ModerationError, ModerationService};
pub use trust::{
    derive_trust_level, Badge, ContributorTrustRecord, TrustDecision, TrustLedger,
    TrustUpdateError,
};
