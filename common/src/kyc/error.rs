// KYC Error types
// Tier table invariants and tier selection rules

use std::fmt;

/// Tier model and tier selection errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KycError {
    /// Tier index outside 0-4
    InvalidTier(u8),

    /// Tier table entry stored at the wrong position
    TierTableOrder { position: usize, tier: u8 },

    /// Higher tier does not require everything the lower tier requires
    RequirementsNotCumulative { lower: u8, higher: u8 },

    /// Limits must strictly increase, only the last tier may be unlimited
    LimitNotIncreasing { lower: u8, higher: u8 },

    /// Target tier is not above the approved tier
    NotAnUpgrade { approved: u8, target: u8 },

    /// A tier request is already outstanding for the account
    RequestPending { pending: Option<u8> },

    /// Unknown on-chain submission status value
    InvalidStatus(u8),
}

impl fmt::Display for KycError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KycError::InvalidTier(tier) => {
                write!(f, "Invalid tier: {}. Valid tiers are 0 to 4", tier)
            }
            KycError::TierTableOrder { position, tier } => {
                write!(
                    f,
                    "Tier table entry at position {} describes tier {}",
                    position, tier
                )
            }
            KycError::RequirementsNotCumulative { lower, higher } => {
                write!(
                    f,
                    "Tier {} does not require everything tier {} requires",
                    higher, lower
                )
            }
            KycError::LimitNotIncreasing { lower, higher } => {
                write!(
                    f,
                    "Limit of tier {} is not above the limit of tier {}",
                    higher, lower
                )
            }
            KycError::NotAnUpgrade { approved, target } => {
                write!(
                    f,
                    "Tier {} is not above your approved tier {}",
                    target, approved
                )
            }
            KycError::RequestPending { pending: Some(tier) } => {
                write!(
                    f,
                    "A request for tier {} is already pending review",
                    tier
                )
            }
            KycError::RequestPending { pending: None } => {
                write!(f, "A verification request is already pending review")
            }
            KycError::InvalidStatus(status) => write!(f, "Invalid submission status: {}", status),
        }
    }
}

impl std::error::Error for KycError {}

/// Result type for KYC operations
pub type KycResult<T> = Result<T, KycError>;
