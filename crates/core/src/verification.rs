//! Collaborator status vocabularies and how they map onto the workflow.
//!
//! Each external step reports progress in its provider's own terms. The
//! engine only needs to know whether a status means "still going",
//! "confirmed" or "refused", which is what [`StatusVerdict`] captures.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How a collaborator status bears on the step it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusVerdict {
    Pending,
    Confirmed,
    Refused,
}

// ---------------------------------------------------------------------------
// Identity verification
// ---------------------------------------------------------------------------

/// Status of an identity-verification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Created,
    Started,
    Submitted,
    /// Submitted and waiting on manual review at the provider.
    Review,
    ResubmissionRequested,
    Approved,
    Declined,
    Expired,
    Abandoned,
}

impl VerificationStatus {
    /// Parse a provider status string. Both `snake_case` and the
    /// provider's spelled-out forms are accepted.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "started" => Ok(Self::Started),
            "submitted" => Ok(Self::Submitted),
            "review" => Ok(Self::Review),
            "resubmission_requested" | "resubmission requested" => {
                Ok(Self::ResubmissionRequested)
            }
            "approved" => Ok(Self::Approved),
            "declined" => Ok(Self::Declined),
            "expired" => Ok(Self::Expired),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(CoreError::Validation(format!(
                "Unknown verification status '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Submitted => "submitted",
            Self::Review => "review",
            Self::ResubmissionRequested => "resubmission_requested",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
        }
    }

    /// A resubmission request is not final: the talent fixes their
    /// documents in the same session.
    pub fn verdict(&self) -> StatusVerdict {
        match self {
            Self::Created
            | Self::Started
            | Self::Submitted
            | Self::Review
            | Self::ResubmissionRequested => StatusVerdict::Pending,
            Self::Approved => StatusVerdict::Confirmed,
            Self::Declined | Self::Expired | Self::Abandoned => StatusVerdict::Refused,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.verdict() != StatusVerdict::Pending
    }

    /// Message shown to the talent for a refused session.
    pub fn refusal_message(&self) -> &'static str {
        match self {
            Self::Declined => "Identity verification was declined. Please start a new verification.",
            Self::Expired => "The verification session expired. Please start a new verification.",
            Self::Abandoned => {
                "The verification session was abandoned. Please start a new verification."
            }
            _ => "Identity verification is not complete yet.",
        }
    }
}

// ---------------------------------------------------------------------------
// Tax documents
// ---------------------------------------------------------------------------

/// Status of a tax-form e-signing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxDocumentStatus {
    Pending,
    Completed,
    Declined,
    Expired,
}

impl TaxDocumentStatus {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "draft" | "sent" | "viewed" | "awaiting_signature" => Ok(Self::Pending),
            "completed" | "signed" => Ok(Self::Completed),
            "declined" | "canceled" | "cancelled" => Ok(Self::Declined),
            "expired" => Ok(Self::Expired),
            other => Err(CoreError::Validation(format!(
                "Unknown tax document status '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }

    pub fn verdict(&self) -> StatusVerdict {
        match self {
            Self::Pending => StatusVerdict::Pending,
            Self::Completed => StatusVerdict::Confirmed,
            Self::Declined | Self::Expired => StatusVerdict::Refused,
        }
    }
}

// ---------------------------------------------------------------------------
// Payment-account capability
// ---------------------------------------------------------------------------

/// Whether the payment account can receive payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Enabled,
    Pending,
    /// Not requested, disabled, or the account does not exist.
    Absent,
}

impl CapabilityStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" => Self::Enabled,
            "pending" | "in-review" | "in_review" => Self::Pending,
            _ => Self::Absent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Pending => "pending",
            Self::Absent => "absent",
        }
    }

    /// A pending capability still counts as a created account; the
    /// provider finishes its own review afterwards.
    pub fn verdict(&self) -> StatusVerdict {
        match self {
            Self::Enabled | Self::Pending => StatusVerdict::Confirmed,
            Self::Absent => StatusVerdict::Refused,
        }
    }
}
