use serde::{Deserialize, Serialize};

/// Lifecycle of a staging product, from feed ingestion to adjudication.
///
/// Legal transitions:
///
/// ```text
/// PENDING_SYNC -> NEEDS_REVIEW -> {APPROVED, REJECTED}
/// REJECTED -> PENDING_SYNC          (merchant resubmission)
/// ```
///
/// Everything else is rejected by the pipeline as an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagingStatus {
    PendingSync,
    NeedsReview,
    Approved,
    Rejected,
}

impl StagingStatus {
    /// Database/text representation, matching the `staging_products.status`
    /// CHECK constraint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StagingStatus::PendingSync => "PENDING_SYNC",
            StagingStatus::NeedsReview => "NEEDS_REVIEW",
            StagingStatus::Approved => "APPROVED",
            StagingStatus::Rejected => "REJECTED",
        }
    }

    /// Parses the database representation. Returns `None` for unknown values
    /// so callers can surface a typed error with the offending string.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING_SYNC" => Some(StagingStatus::PendingSync),
            "NEEDS_REVIEW" => Some(StagingStatus::NeedsReview),
            "APPROVED" => Some(StagingStatus::Approved),
            "REJECTED" => Some(StagingStatus::Rejected),
            _ => None,
        }
    }

    /// Returns `true` when moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: StagingStatus) -> bool {
        matches!(
            (self, next),
            (StagingStatus::PendingSync, StagingStatus::NeedsReview)
                | (StagingStatus::NeedsReview, StagingStatus::Approved)
                | (StagingStatus::NeedsReview, StagingStatus::Rejected)
                | (StagingStatus::Rejected, StagingStatus::PendingSync)
        )
    }
}

impl std::fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer-facing visibility gate on a merchant offer. Only `LIVE` offers
/// are sold in the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Live,
    PendingReview,
    Rejected,
}

impl OfferStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Live => "LIVE",
            OfferStatus::PendingReview => "PENDING_REVIEW",
            OfferStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
