use crate::infra::{
    contributor, seed_institutions, seed_rules, InMemoryAuditTrail, InMemoryCacheInvalidator,
    InMemoryCascadeQueue, InMemoryDirectoryStore, InMemoryNotificationGateway,
    InMemoryPolicyStore, InMemorySubmissionRepository, InMemoryTrustStore,
};
use campusdir::directory::{DirectoryStore, InstitutionId, ProgramId, RecordPatch};
use campusdir::error::AppError;
use campusdir::moderation::{
    BatchScheduler, CascadeApplier, CorrectionSubmission, DecisionOutcome, EvidenceRef,
    ModerationAnalytics, ModerationError, ModerationService, ReportingPeriod, ReviewerId,
    SubmitterId, TargetRef, TickSummary,
};
use chrono::{Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Anchor date for the walkthrough (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Print the stored institution record after the cascade runs.
    #[arg(long)]
    pub(crate) show_directory: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let now = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN)) + Duration::hours(9);

    println!("Campus directory corrections demo (anchored at {today})");

    let submissions = Arc::new(InMemorySubmissionRepository::default());
    let policy = Arc::new(InMemoryPolicyStore::default());
    let trust = Arc::new(InMemoryTrustStore::default());
    let queue = Arc::new(InMemoryCascadeQueue::default());
    let audit = Arc::new(InMemoryAuditTrail::default());
    let directory = Arc::new(InMemoryDirectoryStore::default());
    let cache = Arc::new(InMemoryCacheInvalidator::default());
    let notifier = Arc::new(InMemoryNotificationGateway::default());

    seed_institutions(&directory);
    trust.seed(contributor("amina-khan", 27, 1, true));

    println!("\nActive auto-approval rules");
    for rule in seed_rules() {
        println!(
            "- {} [{}]: kinds {:?}, min trust {}, evidence {}, verified account {}",
            rule.id,
            rule.label,
            rule.eligible_kinds
                .iter()
                .map(|kind| kind.label())
                .collect::<Vec<_>>(),
            rule.min_trust_level,
            if rule.requires_evidence { "required" } else { "optional" },
            if rule.requires_verified_account { "required" } else { "not required" },
        );
    }

    let service = ModerationService::new(
        submissions.clone(),
        policy.clone(),
        trust.clone(),
        queue.clone(),
        audit.clone(),
    );
    let analytics = ModerationAnalytics::new(submissions.clone(), queue.clone());
    let applier = Arc::new(CascadeApplier::new(
        directory.clone(),
        cache.clone(),
        notifier.clone(),
    ));
    let scheduler = BatchScheduler::new(
        submissions,
        policy,
        trust,
        queue,
        audit,
        applier,
    );

    println!("\nIntake");

    // A long-standing contributor fixes an admission deadline. No evidence
    // needed at their trust level, so the correction skips the review queue.
    let deadline_fix = CorrectionSubmission {
        submitter: SubmitterId("amina-khan".to_string()),
        target: TargetRef {
            institution: InstitutionId("punjab-uni".to_string()),
            program: None,
        },
        proposed: RecordPatch::Deadline {
            round: "Fall".to_string(),
            closes_on: today + Duration::days(45),
        },
        evidence: None,
    };
    report_submission(service.submit_correction(deadline_fix, now));

    // The same contributor corrects a fee table, this time with evidence.
    let fee_fix = CorrectionSubmission {
        submitter: SubmitterId("amina-khan".to_string()),
        target: TargetRef {
            institution: InstitutionId("punjab-uni".to_string()),
            program: Some(ProgramId("bscs".to_string())),
        },
        proposed: RecordPatch::Fees {
            tuition_per_semester: 118_000,
            application_fee: 2_500,
        },
        evidence: Some(EvidenceRef(
            "https://admissions.punjab-uni.edu.pk/fee-card".to_string(),
        )),
    };
    report_submission(service.submit_correction(fee_fix, now));

    // A first-time contributor lands in the manual queue.
    let test_fix = CorrectionSubmission {
        submitter: SubmitterId("bilal-raza".to_string()),
        target: TargetRef {
            institution: InstitutionId("nust".to_string()),
            program: None,
        },
        proposed: RecordPatch::EntryTest {
            test_name: "NET".to_string(),
            held_on: today + Duration::days(60),
            registration_closes: today + Duration::days(40),
        },
        evidence: Some(EvidenceRef("doc:notices/net-2026.pdf".to_string())),
    };
    let pending = report_submission(service.submit_correction(test_fix, now));

    // A malformed correction never enters the pipeline.
    let stale_fix = CorrectionSubmission {
        submitter: SubmitterId("bilal-raza".to_string()),
        target: TargetRef {
            institution: InstitutionId("nust".to_string()),
            program: None,
        },
        proposed: RecordPatch::Deadline {
            round: "Spring".to_string(),
            closes_on: today - Duration::days(30),
        },
        evidence: None,
    };
    report_submission(service.submit_correction(stale_fix, now));

    if let Some(pending) = pending {
        println!("\nManual review");
        match service.decide(
            &pending,
            DecisionOutcome::Approve,
            ReviewerId("moderator-1".to_string()),
            None,
            now + Duration::minutes(20),
        ) {
            Ok(record) => println!(
                "- {} approved by moderator, status {}",
                record.id,
                record.status.label()
            ),
            Err(err) => println!("- manual decision failed: {err}"),
        }
    }

    println!("\nCascade tick");
    let tick_at = now + Duration::minutes(30);
    match scheduler.run_tick(tick_at) {
        Ok(summary) => render_tick(&summary),
        Err(err) => println!("- tick aborted: {err}"),
    }

    let invalidations = cache.events();
    if !invalidations.is_empty() {
        println!("- cache invalidations:");
        for (category, institution) in invalidations {
            println!("    {category} @ {institution}");
        }
    }
    for notice in notifier.notices() {
        println!("- change notice: {} ({})", notice.summary, notice.institution);
    }

    if args.show_directory {
        render_institution(directory.as_ref(), "punjab-uni");
        render_institution(directory.as_ref(), "nust");
    }

    println!("\nContributor profile");
    match service.trust_profile(&SubmitterId("amina-khan".to_string())) {
        Ok(profile) => {
            println!(
                "- amina-khan: level {}, {} approved / {} rejected, rate {:.2}, impact {}",
                profile.trust_level,
                profile.approved,
                profile.rejected,
                profile.approval_rate,
                profile.impact_score
            );
            let badges: Vec<_> = profile.badges.iter().map(|badge| badge.label()).collect();
            println!("  badges: {}", badges.join(", "));
        }
        Err(err) => println!("- profile unavailable: {err}"),
    }

    println!("\nModeration report (last 24h)");
    let period = ReportingPeriod::new(now - Duration::hours(12), tick_at + Duration::hours(12));
    match analytics.report(period) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("- report serialization failed: {err}"),
        },
        Err(err) => println!("- report unavailable: {err}"),
    }

    Ok(())
}

fn report_submission(
    result: Result<campusdir::moderation::SubmissionRecord, ModerationError>,
) -> Option<campusdir::moderation::SubmissionId> {
    match result {
        Ok(record) => {
            let rule_note = match &record.decided_by_rule {
                Some(rule) => format!(" (matched {rule})"),
                None => String::new(),
            };
            println!(
                "- {} {} from {} -> {}{}",
                record.id,
                record.kind.label(),
                record.submitter,
                record.status.label(),
                rule_note
            );
            match record.status.is_decided() {
                true => None,
                false => Some(record.id),
            }
        }
        Err(ModerationError::Validation(err)) => {
            println!("- rejected at intake: {err}");
            None
        }
        Err(err) => {
            println!("- submission failed: {err}");
            None
        }
    }
}

fn render_tick(summary: &TickSummary) {
    println!(
        "- dispatched {} | completed {} | retried {} | conflicted {} | failed {} | deferred {}",
        summary.dispatched,
        summary.completed,
        summary.retried,
        summary.conflicted,
        summary.failed_permanently,
        summary.deferred
    );
}

fn render_institution(directory: &InMemoryDirectoryStore, id: &str) {
    let id = InstitutionId(id.to_string());
    match directory.institution(&id) {
        Ok(Some(record)) => match serde_json::to_string_pretty(&record) {
            Ok(json) => println!("\nDirectory record {id}\n{json}"),
            Err(err) => println!("- directory record unavailable: {err}"),
        },
        Ok(None) => println!("- institution {id} not found"),
        Err(err) => println!("- directory read failed: {err}"),
    }
}
