use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one institution in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstitutionId(pub String);

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one degree program offered by an institution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub String);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Public,
    Private,
}

impl Sector {
    pub const fn label(self) -> &'static str {
        match self {
            Sector::Public => "public",
            Sector::Private => "private",
        }
    }
}

/// Static identity of an institution, separate from the mutable rows below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionProfile {
    pub id: InstitutionId,
    pub name: String,
    pub city: String,
    pub sector: Sector,
}

/// Categories of dependent records a correction can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentCategory {
    FeeSchedule,
    ComparisonRollup,
    AdmissionDeadline,
    AdmissionCalendar,
    EntryTestSession,
    MeritCutoff,
    ReminderSchedule,
}

impl DependentCategory {
    pub const fn label(self) -> &'static str {
        match self {
            DependentCategory::FeeSchedule => "fee_schedule",
            DependentCategory::ComparisonRollup => "comparison_rollup",
            DependentCategory::AdmissionDeadline => "admission_deadline",
            DependentCategory::AdmissionCalendar => "admission_calendar",
            DependentCategory::EntryTestSession => "entry_test_session",
            DependentCategory::MeritCutoff => "merit_cutoff",
            DependentCategory::ReminderSchedule => "reminder_schedule",
        }
    }
}

impl fmt::Display for DependentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A concrete replacement value for one directory record.
///
/// This is the payload a contributor proposes in a correction and, once the
/// correction is approved, the value the cascade writes into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPatch {
    Fees {
        tuition_per_semester: u32,
        application_fee: u32,
    },
    Deadline {
        round: String,
        closes_on: NaiveDate,
    },
    CalendarDate {
        event: String,
        falls_on: NaiveDate,
    },
    EntryTest {
        test_name: String,
        held_on: NaiveDate,
        registration_closes: NaiveDate,
    },
    MeritCutoff {
        year: u16,
        closing_percentage: f32,
    },
}

impl RecordPatch {
    /// The record category this patch rewrites directly.
    pub const fn primary_category(&self) -> DependentCategory {
        match self {
            RecordPatch::Fees { .. } => DependentCategory::FeeSchedule,
            RecordPatch::Deadline { .. } => DependentCategory::AdmissionDeadline,
            RecordPatch::CalendarDate { .. } => DependentCategory::AdmissionCalendar,
            RecordPatch::EntryTest { .. } => DependentCategory::EntryTestSession,
            RecordPatch::MeritCutoff { .. } => DependentCategory::MeritCutoff,
        }
    }

    /// The date end users need reminding about, when the patch carries one.
    pub fn key_date(&self) -> Option<NaiveDate> {
        match self {
            RecordPatch::Fees { .. } | RecordPatch::MeritCutoff { .. } => None,
            RecordPatch::Deadline { closes_on, .. } => Some(*closes_on),
            RecordPatch::CalendarDate { falls_on, .. } => Some(*falls_on),
            RecordPatch::EntryTest {
                registration_closes,
                ..
            } => Some(*registration_closes),
        }
    }

    /// One-line human summary used in audit events and reminders.
    pub fn summary(&self) -> String {
        match self {
            RecordPatch::Fees {
                tuition_per_semester,
                application_fee,
            } => format!(
                "tuition {tuition_per_semester} per semester, application fee {application_fee}"
            ),
            RecordPatch::Deadline { round, closes_on } => {
                format!("{round} admissions close on {closes_on}")
            }
            RecordPatch::CalendarDate { event, falls_on } => {
                format!("{event} falls on {falls_on}")
            }
            RecordPatch::EntryTest {
                test_name,
                held_on,
                registration_closes,
            } => format!(
                "{test_name} held on {held_on}, registration closes {registration_closes}"
            ),
            RecordPatch::MeritCutoff {
                year,
                closing_percentage,
            } => format!("{year} merit closed at {closing_percentage}%"),
        }
    }
}

/// Per-program tuition and application charges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub program: ProgramId,
    pub tuition_per_semester: u32,
    pub application_fee: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionDeadline {
    pub program: Option<ProgramId>,
    pub round: String,
    pub closes_on: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub event: String,
    pub falls_on: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryTestSession {
    pub test_name: String,
    pub held_on: NaiveDate,
    pub registration_closes: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// Closing merit percentage for one program in one admission year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeritCutoff {
    pub program: ProgramId,
    pub year: u16,
    pub closing_percentage: f32,
    pub updated_at: DateTime<Utc>,
}

/// Cached cross-record rollup shown on comparison pages. Recomputed whenever
/// a fee or merit correction lands so browsing stays consistent with the
/// corrected rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRollup {
    pub program: ProgramId,
    pub four_year_cost_estimate: Option<u32>,
    pub latest_cutoff: Option<f32>,
    pub computed_at: DateTime<Utc>,
}

/// A scheduled notification derived from directory dates, kept in step with
/// the record it reminds about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderEntry {
    pub about: DependentCategory,
    pub summary: String,
    pub remind_on: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderEntry {
    /// Reminders fire a week ahead of the date they track.
    pub fn lead_time(date: NaiveDate) -> NaiveDate {
        date.checked_sub_days(Days::new(7)).unwrap_or(date)
    }
}

/// All published rows for one institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    pub profile: InstitutionProfile,
    pub fees: Vec<FeeSchedule>,
    pub deadlines: Vec<AdmissionDeadline>,
    pub calendar: Vec<CalendarEntry>,
    pub entry_tests: Vec<EntryTestSession>,
    pub merit_cutoffs: Vec<MeritCutoff>,
    pub comparisons: Vec<ComparisonRollup>,
    pub reminders: Vec<ReminderEntry>,
}

impl InstitutionRecord {
    pub fn new(profile: InstitutionProfile) -> Self {
        Self {
            profile,
            fees: Vec::new(),
            deadlines: Vec::new(),
            calendar: Vec::new(),
            entry_tests: Vec::new(),
            merit_cutoffs: Vec::new(),
            comparisons: Vec::new(),
            reminders: Vec::new(),
        }
    }
}
