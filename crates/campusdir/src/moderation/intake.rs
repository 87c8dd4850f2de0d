use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::domain::{CorrectionKind, CorrectionSubmission, SubmissionId, SubmissionRecord};
use crate::directory::RecordPatch;
use crate::moderation::domain::SubmissionStatus;

/// Validation errors raised by the intake guard. Rejected payloads are never
/// persisted and never reach rule evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("submitter id must not be blank")]
    BlankSubmitter,
    #[error("target institution must not be blank")]
    BlankInstitution,
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },
    #[error("{kind} corrections must name a program")]
    ProgramRequired { kind: &'static str },
    #[error("tuition per semester must be positive")]
    NonPositiveFee,
    #[error("tuition {found} exceeds the plausibility cap of {cap}")]
    ImplausibleFee { found: u32, cap: u32 },
    #[error("{field} {found} is already in the past")]
    DateInPast {
        field: &'static str,
        found: NaiveDate,
    },
    #[error("registration close {registration_closes} falls after the test date {held_on}")]
    RegistrationAfterTest {
        registration_closes: NaiveDate,
        held_on: NaiveDate,
    },
    #[error("merit percentage {0} is outside the 0-100 range")]
    CutoffOutOfRange(f32),
    #[error("merit year {found} is outside the supported window {min}-{max}")]
    YearOutOfWindow { found: u16, min: i32, max: i32 },
    #[error("evidence reference must be an http(s) link or a doc: storage key")]
    MalformedEvidence,
}

const DEFAULT_TUITION_CAP: u32 = 1_500_000;
const DEFAULT_MERIT_LOOKBACK_YEARS: i32 = 5;

/// Policy dial backing intake validation.
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    tuition_cap: u32,
    merit_lookback_years: i32,
}

impl IntakePolicy {
    pub fn new(tuition_cap: u32, merit_lookback_years: i32) -> Self {
        let tuition_cap = if tuition_cap == 0 {
            DEFAULT_TUITION_CAP
        } else {
            tuition_cap
        };
        let merit_lookback_years = if merit_lookback_years <= 0 {
            DEFAULT_MERIT_LOOKBACK_YEARS
        } else {
            merit_lookback_years
        };

        Self {
            tuition_cap,
            merit_lookback_years,
        }
    }

    pub fn tuition_cap(&self) -> u32 {
        self.tuition_cap
    }

    pub fn merit_year_window(&self, now: DateTime<Utc>) -> (i32, i32) {
        let current = now.year();
        (current - self.merit_lookback_years, current)
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TUITION_CAP, DEFAULT_MERIT_LOOKBACK_YEARS)
    }
}

/// Guard responsible for producing persisted `SubmissionRecord` instances.
#[derive(Debug, Clone)]
pub struct CorrectionIntake {
    policy: IntakePolicy,
}

impl Default for CorrectionIntake {
    fn default() -> Self {
        Self::with_policy(IntakePolicy::default())
    }
}

impl CorrectionIntake {
    pub fn with_policy(policy: IntakePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.policy
    }

    /// Convert an inbound correction into a pending submission record.
    pub fn record_from_submission(
        &self,
        submission: CorrectionSubmission,
        id: SubmissionId,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, ValidationError> {
        if submission.submitter.0.trim().is_empty() {
            return Err(ValidationError::BlankSubmitter);
        }
        if submission.target.institution.0.trim().is_empty() {
            return Err(ValidationError::BlankInstitution);
        }

        let kind = CorrectionKind::of(&submission.proposed);
        self.check_patch(&submission, kind, now)?;

        if let Some(evidence) = &submission.evidence {
            let reference = evidence.0.trim();
            let well_formed = reference.starts_with("http://")
                || reference.starts_with("https://")
                || reference.starts_with("doc:");
            if !well_formed {
                return Err(ValidationError::MalformedEvidence);
            }
        }

        Ok(SubmissionRecord {
            id,
            submitter: submission.submitter,
            kind,
            target: submission.target,
            proposed: submission.proposed,
            evidence: submission.evidence,
            status: SubmissionStatus::Pending,
            submitted_at: now,
            decided_at: None,
            decided_by_rule: None,
            reviewed_by: None,
            rejection_note: None,
            affected_records: None,
            needs_trust_reconciliation: false,
        })
    }

    fn check_patch(
        &self,
        submission: &CorrectionSubmission,
        kind: CorrectionKind,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let today = now.date_naive();

        match &submission.proposed {
            RecordPatch::Fees {
                tuition_per_semester,
                ..
            } => {
                require_program(submission, kind)?;
                if *tuition_per_semester == 0 {
                    return Err(ValidationError::NonPositiveFee);
                }
                if *tuition_per_semester > self.policy.tuition_cap {
                    return Err(ValidationError::ImplausibleFee {
                        found: *tuition_per_semester,
                        cap: self.policy.tuition_cap,
                    });
                }
            }
            RecordPatch::Deadline { round, closes_on } => {
                require_filled(round, "round")?;
                require_current(*closes_on, today, "deadline")?;
            }
            RecordPatch::CalendarDate { event, falls_on } => {
                require_filled(event, "event")?;
                require_current(*falls_on, today, "calendar date")?;
            }
            RecordPatch::EntryTest {
                test_name,
                held_on,
                registration_closes,
            } => {
                require_filled(test_name, "test name")?;
                require_current(*held_on, today, "test date")?;
                if registration_closes > held_on {
                    return Err(ValidationError::RegistrationAfterTest {
                        registration_closes: *registration_closes,
                        held_on: *held_on,
                    });
                }
            }
            RecordPatch::MeritCutoff {
                year,
                closing_percentage,
            } => {
                require_program(submission, kind)?;
                if !(0.0..=100.0).contains(closing_percentage) {
                    return Err(ValidationError::CutoffOutOfRange(*closing_percentage));
                }
                let (min, max) = self.policy.merit_year_window(now);
                if (i32::from(*year)) < min || (i32::from(*year)) > max {
                    return Err(ValidationError::YearOutOfWindow {
                        found: *year,
                        min,
                        max,
                    });
                }
            }
        }

        Ok(())
    }
}

fn require_program(
    submission: &CorrectionSubmission,
    kind: CorrectionKind,
) -> Result<(), ValidationError> {
    if submission.target.program.is_none() {
        return Err(ValidationError::ProgramRequired { kind: kind.label() });
    }
    Ok(())
}

fn require_filled(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField { field });
    }
    Ok(())
}

fn require_current(
    found: NaiveDate,
    today: NaiveDate,
    field: &'static str,
) -> Result<(), ValidationError> {
    if found < today {
        return Err(ValidationError::DateInPast { field, found });
    }
    Ok(())
}
