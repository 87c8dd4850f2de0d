//! Published directory records and the store boundary used to change them.
//!
//! The records in this module are what end users browse: per-program fee
//! schedules, admission deadlines, academic calendar entries, entry-test
//! sessions, and historical merit cutoffs. Every change flows through the
//! [`store::DirectoryStore`] trait so that approved corrections, cascade
//! retries, and seeded demo data all share one write path.

pub mod domain;
pub mod store;

pub use domain::{
    CalendarEntry, ComparisonRollup, DependentCategory, EntryTestSession, FeeSchedule,
    InstitutionId, InstitutionProfile, InstitutionRecord, MeritCutoff, ProgramId, RecordPatch,
    ReminderEntry, Sector,
};
pub use store::{apply_change, ApplyOutcome, DirectoryError, DirectoryStore, DirectoryUpdate};
