use serde::{Deserialize, Serialize};

use super::domain::{CorrectionKind, RuleId, SubmissionRecord};
use super::trust::ContributorTrustRecord;

/// Operator-editable predicate that lets a correction skip manual review.
///
/// Rules are plain data so operators can tune moderation strictness without
/// a deploy. Every condition must hold for a rule to match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoApprovalRule {
    pub id: RuleId,
    pub label: String,
    pub eligible_kinds: Vec<CorrectionKind>,
    pub min_trust_level: u8,
    pub requires_evidence: bool,
    pub requires_verified_account: bool,
    pub enabled: bool,
}

impl AutoApprovalRule {
    pub fn permits(&self, record: &SubmissionRecord, trust: &ContributorTrustRecord) -> bool {
        if !self.eligible_kinds.contains(&record.kind) {
            return false;
        }
        if trust.trust_level < self.min_trust_level {
            return false;
        }
        if self.requires_evidence && record.evidence.is_none() {
            return false;
        }
        if self.requires_verified_account && !trust.account_verified {
            return false;
        }
        true
    }
}

/// Result of evaluating one submission against the active rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Matched(RuleId),
    NoMatch,
}

impl RuleOutcome {
    pub const fn matched_rule(self) -> Option<RuleId> {
        match self {
            RuleOutcome::Matched(rule) => Some(rule),
            RuleOutcome::NoMatch => None,
        }
    }
}

/// Picks the first enabled rule that permits the submission, scanning in
/// ascending rule-id order regardless of the order the store returned them.
/// No match means the correction waits for a moderator.
pub fn evaluate(
    record: &SubmissionRecord,
    trust: &ContributorTrustRecord,
    rules: &[AutoApprovalRule],
) -> RuleOutcome {
    let mut ordered: Vec<&AutoApprovalRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.id);

    for rule in ordered {
        if !rule.enabled {
            continue;
        }
        if rule.permits(record, trust) {
            return RuleOutcome::Matched(rule.id);
        }
    }

    RuleOutcome::NoMatch
}
