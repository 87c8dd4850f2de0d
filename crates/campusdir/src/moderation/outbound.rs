use serde::{Deserialize, Serialize};

use super::domain::SubmissionId;
use crate::directory::{DependentCategory, InstitutionId};

/// Hook into the read-side caches fronting public directory pages.
///
/// Invalidation runs after a cascade commits its row writes. A failure here
/// leaves a cache serving slightly stale data until its normal expiry, so
/// callers log and move on instead of failing the job.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(
        &self,
        category: DependentCategory,
        institution: &InstitutionId,
    ) -> Result<(), OutboundError>;
}

/// Outbound notification hook (e.g., e-mail digests or push messages) so
/// subscribers hear about corrected records. Fire-and-forget.
pub trait NotificationGateway: Send + Sync {
    fn notify(&self, notice: ChangeNotice) -> Result<(), OutboundError>;
}

/// Payload describing one published change for subscriber notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub submission: SubmissionId,
    pub institution: InstitutionId,
    pub summary: String,
}

/// Dispatch error for outbound adapters.
#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    #[error("outbound transport unavailable: {0}")]
    Transport(String),
}
