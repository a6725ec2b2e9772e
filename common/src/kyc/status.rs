// Submission status enumerations
// On-chain status of an account's KYC submission, and the backend's adjudication outcome

use serde::{Deserialize, Serialize};

use super::KycError;

/// On-chain submission status, stored as u8 by the contract
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum SubmissionStatus {
    /// Account never submitted
    #[default]
    None = 0,

    /// Submission paid and waiting for review
    Pending = 1,

    /// Submission approved, the submission level is the approved tier
    Approved = 2,

    /// Submission rejected, the account may apply again
    Rejected = 3,
}

impl SubmissionStatus {
    /// Check if the submission is waiting for review
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, SubmissionStatus::Pending)
    }

    #[inline]
    pub fn is_approved(&self) -> bool {
        matches!(self, SubmissionStatus::Approved)
    }

    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, SubmissionStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::None => "None",
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Approved => "Approved",
            SubmissionStatus::Rejected => "Rejected",
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SubmissionStatus::None),
            1 => Some(SubmissionStatus::Pending),
            2 => Some(SubmissionStatus::Approved),
            3 => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SubmissionStatus {
    type Error = KycError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SubmissionStatus::from_u8(value).ok_or(KycError::InvalidStatus(value))
    }
}

impl From<SubmissionStatus> for u8 {
    fn from(status: SubmissionStatus) -> Self {
        status.to_u8()
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decision returned by the backend adjudicator
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationStatus {
    Approved,
    #[serde(alias = "manual_review")]
    Pending,
    Rejected,
}

impl AdjudicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjudicationStatus::Approved => "approved",
            AdjudicationStatus::Pending => "pending",
            AdjudicationStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AdjudicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
