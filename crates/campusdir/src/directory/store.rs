use crate::directory::domain::{
    AdmissionDeadline, CalendarEntry, ComparisonRollup, DependentCategory, EntryTestSession,
    FeeSchedule, InstitutionId, InstitutionRecord, MeritCutoff, ProgramId, RecordPatch,
    ReminderEntry,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One write against the directory, scoped to a single dependent category.
///
/// `origin` is an opaque key naming the correction the write came from.
/// Stores must treat a repeated `(origin, category)` pair as already applied
/// so that retried cascades never double-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUpdate {
    pub origin: String,
    pub category: DependentCategory,
    pub institution: InstitutionId,
    pub program: Option<ProgramId>,
    pub patch: RecordPatch,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    AlreadyApplied,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory store unavailable: {0}")]
    Unavailable(String),
    #[error("directory store exceeded the {budget_ms} ms operation budget")]
    Timeout { budget_ms: u64 },
    #[error("target entity no longer exists: {0}")]
    TargetMissing(String),
}

impl DirectoryError {
    /// Whether a retry with backoff could plausibly succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Unavailable(_) | DirectoryError::Timeout { .. }
        )
    }
}

/// Write and read boundary for published directory records.
///
/// Implementations guarantee per-update atomicity only. Multi-category
/// sequencing, retries, and conflict checks belong to the moderation layer.
pub trait DirectoryStore: Send + Sync {
    fn apply(&self, update: DirectoryUpdate) -> Result<ApplyOutcome, DirectoryError>;
    fn institution(&self, id: &InstitutionId)
        -> Result<Option<InstitutionRecord>, DirectoryError>;
}

/// Rewrites the rows of one institution for a single dependent category.
///
/// Shared by every in-process store so fakes and the demo store agree on
/// row semantics. Upserts throughout; a correction may touch a row the
/// directory has not published yet.
pub fn apply_change(rows: &mut InstitutionRecord, update: &DirectoryUpdate) {
    match update.category {
        DependentCategory::FeeSchedule => {
            if let (
                RecordPatch::Fees {
                    tuition_per_semester,
                    application_fee,
                },
                Some(program),
            ) = (&update.patch, &update.program)
            {
                upsert_fee(
                    rows,
                    FeeSchedule {
                        program: program.clone(),
                        tuition_per_semester: *tuition_per_semester,
                        application_fee: *application_fee,
                        updated_at: update.applied_at,
                    },
                );
            }
        }
        DependentCategory::ComparisonRollup => {
            if let Some(program) = &update.program {
                recompute_comparison(rows, program, update.applied_at);
            }
        }
        DependentCategory::AdmissionDeadline => {
            if let RecordPatch::Deadline { round, closes_on } = &update.patch {
                upsert_deadline(
                    rows,
                    AdmissionDeadline {
                        program: update.program.clone(),
                        round: round.clone(),
                        closes_on: *closes_on,
                        updated_at: update.applied_at,
                    },
                );
            }
        }
        DependentCategory::AdmissionCalendar => {
            if let RecordPatch::CalendarDate { event, falls_on } = &update.patch {
                upsert_calendar(
                    rows,
                    CalendarEntry {
                        event: event.clone(),
                        falls_on: *falls_on,
                        updated_at: update.applied_at,
                    },
                );
            }
        }
        DependentCategory::EntryTestSession => {
            if let RecordPatch::EntryTest {
                test_name,
                held_on,
                registration_closes,
            } = &update.patch
            {
                upsert_entry_test(
                    rows,
                    EntryTestSession {
                        test_name: test_name.clone(),
                        held_on: *held_on,
                        registration_closes: *registration_closes,
                        updated_at: update.applied_at,
                    },
                );
            }
        }
        DependentCategory::MeritCutoff => {
            if let (
                RecordPatch::MeritCutoff {
                    year,
                    closing_percentage,
                },
                Some(program),
            ) = (&update.patch, &update.program)
            {
                upsert_cutoff(
                    rows,
                    MeritCutoff {
                        program: program.clone(),
                        year: *year,
                        closing_percentage: *closing_percentage,
                        updated_at: update.applied_at,
                    },
                );
            }
        }
        DependentCategory::ReminderSchedule => {
            let entry = ReminderEntry {
                about: update.patch.primary_category(),
                summary: update.patch.summary(),
                remind_on: update.patch.key_date().map(ReminderEntry::lead_time),
                updated_at: update.applied_at,
            };
            upsert_reminder(rows, entry);
        }
    }
}

fn upsert_fee(rows: &mut InstitutionRecord, row: FeeSchedule) {
    match rows.fees.iter_mut().find(|f| f.program == row.program) {
        Some(existing) => *existing = row,
        None => rows.fees.push(row),
    }
}

fn upsert_deadline(rows: &mut InstitutionRecord, row: AdmissionDeadline) {
    match rows
        .deadlines
        .iter_mut()
        .find(|d| d.program == row.program && d.round == row.round)
    {
        Some(existing) => *existing = row,
        None => rows.deadlines.push(row),
    }
}

fn upsert_calendar(rows: &mut InstitutionRecord, row: CalendarEntry) {
    match rows.calendar.iter_mut().find(|c| c.event == row.event) {
        Some(existing) => *existing = row,
        None => rows.calendar.push(row),
    }
}

fn upsert_entry_test(rows: &mut InstitutionRecord, row: EntryTestSession) {
    match rows
        .entry_tests
        .iter_mut()
        .find(|t| t.test_name == row.test_name)
    {
        Some(existing) => *existing = row,
        None => rows.entry_tests.push(row),
    }
}

fn upsert_cutoff(rows: &mut InstitutionRecord, row: MeritCutoff) {
    match rows
        .merit_cutoffs
        .iter_mut()
        .find(|m| m.program == row.program && m.year == row.year)
    {
        Some(existing) => *existing = row,
        None => rows.merit_cutoffs.push(row),
    }
}

fn upsert_reminder(rows: &mut InstitutionRecord, entry: ReminderEntry) {
    match rows.reminders.iter_mut().find(|r| r.about == entry.about) {
        Some(existing) => *existing = entry,
        None => rows.reminders.push(entry),
    }
}

// Eight semesters approximates a four year program.
fn recompute_comparison(rows: &mut InstitutionRecord, program: &ProgramId, now: DateTime<Utc>) {
    let cost = rows
        .fees
        .iter()
        .find(|f| &f.program == program)
        .map(|f| f.tuition_per_semester * 8 + f.application_fee);
    let cutoff = rows
        .merit_cutoffs
        .iter()
        .filter(|m| &m.program == program)
        .max_by_key(|m| m.year)
        .map(|m| m.closing_percentage);

    if cost.is_none() && cutoff.is_none() {
        return;
    }

    let rollup = ComparisonRollup {
        program: program.clone(),
        four_year_cost_estimate: cost,
        latest_cutoff: cutoff,
        computed_at: now,
    };
    match rows
        .comparisons
        .iter_mut()
        .find(|c| &c.program == program)
    {
        Some(existing) => *existing = rollup,
        None => rows.comparisons.push(rollup),
    }
}
