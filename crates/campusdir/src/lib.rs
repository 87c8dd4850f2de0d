//! Campus directory moderation service.
//!
//! The library is organized around two areas. [`directory`] holds the
//! published records end users browse: fee schedules, admission deadlines,
//! calendars, entry-test sessions, and merit cutoffs. [`moderation`] holds
//! the pipeline that lets contributors submit corrections to those records
//! and carries each correction from intake through rule evaluation,
//! decision, cascading entity updates, and analytics.

pub mod config;
pub mod directory;
pub mod error;
pub mod moderation;
pub mod telemetry;
