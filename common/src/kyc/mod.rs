// Tierpass KYC tier model
// Five ordinal trust tiers, each unlocking a larger investment limit and
// requiring a cumulative set of evidence categories.
//
// Design:
// - Tier requirement sets are bitmasks (see flags.rs), each tier's mask is a
//   superset of the previous one
// - Limits are strictly increasing, only the top tier may be unlimited

mod error;
mod flags;
mod requirements;
mod status;
mod validation;

pub use error::*;
pub use flags::*;
pub use requirements::*;
pub use status::*;
pub use validation::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

/// Ordinal trust tier (0-4)
/// Serialized as its index, which is also the `level` used on-chain
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, EnumIter,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Tier {
    #[default]
    None = 0,
    Bronze = 1,
    Silver = 2,
    Gold = 3,
    Diamond = 4,
}

impl Tier {
    pub const MAX: Tier = Tier::Diamond;

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Tier::None),
            1 => Some(Tier::Bronze),
            2 => Some(Tier::Silver),
            3 => Some(Tier::Gold),
            4 => Some(Tier::Diamond),
            _ => None,
        }
    }

    /// Next tier up, None for Diamond
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[inline]
    pub fn info(self) -> &'static TierInfo {
        &TIERS[self as usize]
    }

    /// Evidence categories this tier requires (cumulative)
    #[inline]
    pub fn requirements(self) -> EvidenceFlags {
        self.info().requirements
    }

    #[inline]
    pub fn limit(self) -> TierLimit {
        self.info().limit
    }

    /// All tiers strictly above `self`, lowest first
    pub fn above(self) -> impl Iterator<Item = Tier> {
        Tier::iter().filter(move |t| *t > self)
    }
}

impl TryFrom<u8> for Tier {
    type Error = KycError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::from_index(value).ok_or(KycError::InvalidTier(value))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.index()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Investment ceiling for a tier
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TierLimit {
    Capped(u64),
    Unlimited,
}

impl TierLimit {
    /// Check if `amount` fits under this limit
    pub fn allows(&self, amount: u64) -> bool {
        match self {
            TierLimit::Capped(limit) => amount <= *limit,
            TierLimit::Unlimited => true,
        }
    }
}

impl fmt::Display for TierLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_limit(*self))
    }
}

/// Static definition of a tier
#[derive(Debug, Clone, Copy)]
pub struct TierInfo {
    pub tier: Tier,
    pub name: &'static str,
    pub limit: TierLimit,
    pub requirements: EvidenceFlags,
}

/// Tier table, indexed by tier
pub static TIERS: [TierInfo; 5] = [
    TierInfo {
        tier: Tier::None,
        name: "None",
        limit: TierLimit::Capped(0),
        requirements: EvidenceFlags::from_bits(EvidenceFlags::TIER_NONE),
    },
    TierInfo {
        tier: Tier::Bronze,
        name: "Bronze",
        limit: TierLimit::Capped(1_000),
        requirements: EvidenceFlags::from_bits(EvidenceFlags::TIER_BRONZE),
    },
    TierInfo {
        tier: Tier::Silver,
        name: "Silver",
        limit: TierLimit::Capped(10_000),
        requirements: EvidenceFlags::from_bits(EvidenceFlags::TIER_SILVER),
    },
    TierInfo {
        tier: Tier::Gold,
        name: "Gold",
        limit: TierLimit::Capped(100_000),
        requirements: EvidenceFlags::from_bits(EvidenceFlags::TIER_GOLD),
    },
    TierInfo {
        tier: Tier::Diamond,
        name: "Diamond",
        limit: TierLimit::Unlimited,
        requirements: EvidenceFlags::from_bits(EvidenceFlags::TIER_DIAMOND),
    },
];

/// Get the investment limit of a tier
#[inline]
pub fn limit_for(tier: Tier) -> TierLimit {
    tier.limit()
}

/// Format a limit for display: "$10,000" or "Unlimited"
pub fn format_limit(limit: TierLimit) -> String {
    match limit {
        TierLimit::Unlimited => "Unlimited".to_string(),
        TierLimit::Capped(value) => format!("${}", group_thousands(value)),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Check the invariants of a tier table:
/// - entries are ordered by tier index
/// - requirement sets never shrink from one tier to the next
/// - limits strictly increase, and only the last tier may be unlimited
pub fn validate_tier_table(table: &[TierInfo]) -> KycResult<()> {
    for (i, info) in table.iter().enumerate() {
        if info.tier as usize != i {
            return Err(KycError::TierTableOrder {
                position: i,
                tier: info.tier.index(),
            });
        }
    }

    for pair in table.windows(2) {
        let (lower, higher) = (&pair[0], &pair[1]);
        if !higher.requirements.is_superset_of(lower.requirements) {
            return Err(KycError::RequirementsNotCumulative {
                lower: lower.tier.index(),
                higher: higher.tier.index(),
            });
        }

        match (lower.limit, higher.limit) {
            (TierLimit::Capped(a), TierLimit::Capped(b)) if b > a => {}
            (TierLimit::Capped(_), TierLimit::Unlimited) => {}
            _ => {
                return Err(KycError::LimitNotIncreasing {
                    lower: lower.tier.index(),
                    higher: higher.tier.index(),
                })
            }
        }
    }

    Ok(())
}
