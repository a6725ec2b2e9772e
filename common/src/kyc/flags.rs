// Evidence flags - Bitmask constants for evidence categories
// Each bit represents one category of proof an account can supply (6 categories)
//
// Design: u8 bitmask, bit 6-7 reserved
// A tier's requirement set is a cumulative mask: it contains every bit
// of the previous tier's mask

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Discrete type of proof required for a tier
/// Carries no state itself, an account either has it verified or not
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    Display,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum EvidenceCategory {
    PersonalInfo,
    IdDocument,
    Selfie,
    Liveness,
    AddressProof,
    AccreditedProof,
}

impl EvidenceCategory {
    /// Bit used for this category in an `EvidenceFlags` mask
    #[inline]
    pub const fn flag(self) -> u8 {
        match self {
            Self::PersonalInfo => EvidenceFlags::PERSONAL_INFO,
            Self::IdDocument => EvidenceFlags::ID_DOCUMENT,
            Self::Selfie => EvidenceFlags::SELFIE,
            Self::Liveness => EvidenceFlags::LIVENESS,
            Self::AddressProof => EvidenceFlags::ADDRESS_PROOF,
            Self::AccreditedProof => EvidenceFlags::ACCREDITED_PROOF,
        }
    }

    /// Human-readable label shown next to a requirement
    pub fn label(self) -> &'static str {
        match self {
            Self::PersonalInfo => "Personal Information",
            Self::IdDocument => "Government ID",
            Self::Selfie => "Selfie",
            Self::Liveness => "Liveness Check",
            Self::AddressProof => "Proof of Address",
            Self::AccreditedProof => "Accredited Investor Proof",
        }
    }
}

/// Set of evidence categories stored as a bitmask
///
/// Iteration always follows the canonical category order
/// (personal info first, accredited proof last), never insertion order.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct EvidenceFlags(u8);

impl EvidenceFlags {
    // ===== Category bits (bit 0-5) =====

    /// Full name, date of birth and country provided
    pub const PERSONAL_INFO: u8 = 1 << 0; // 1

    /// Government-issued ID document verified
    pub const ID_DOCUMENT: u8 = 1 << 1; // 2

    /// Selfie with a detected face
    pub const SELFIE: u8 = 1 << 2; // 4

    /// Liveness challenge sequence passed
    pub const LIVENESS: u8 = 1 << 3; // 8

    /// Proof of address (utility bill, bank statement) supplied
    pub const ADDRESS_PROOF: u8 = 1 << 4; // 16

    /// Accredited investor proof supplied
    pub const ACCREDITED_PROOF: u8 = 1 << 5; // 32

    // ===== Cumulative tier masks =====

    /// None: nothing verified
    pub const TIER_NONE: u8 = 0;

    /// Bronze: personal info + government ID
    pub const TIER_BRONZE: u8 = Self::PERSONAL_INFO | Self::ID_DOCUMENT; // 3

    /// Silver: Bronze + selfie + address proof
    pub const TIER_SILVER: u8 = Self::TIER_BRONZE | Self::SELFIE | Self::ADDRESS_PROOF; // 23

    /// Gold: Silver + liveness
    pub const TIER_GOLD: u8 = Self::TIER_SILVER | Self::LIVENESS; // 31

    /// Diamond: Gold + accredited investor proof
    pub const TIER_DIAMOND: u8 = Self::TIER_GOLD | Self::ACCREDITED_PROOF; // 63

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(&self, category: EvidenceCategory) -> bool {
        self.0 & category.flag() != 0
    }

    /// Check if every bit of `other` is set in self
    #[inline]
    pub const fn is_superset_of(&self, other: EvidenceFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn insert(&mut self, category: EvidenceCategory) {
        self.0 |= category.flag();
    }

    #[inline]
    pub const fn union(self, other: EvidenceFlags) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn difference(self, other: EvidenceFlags) -> Self {
        Self(self.0 & !other.0)
    }

    /// Number of categories in the set
    #[inline]
    pub const fn len(&self) -> u32 {
        self.0.count_ones()
    }

    /// Categories in canonical order
    pub fn iter(&self) -> impl Iterator<Item = EvidenceCategory> + '_ {
        EvidenceCategory::iter().filter(move |c| self.contains(*c))
    }

    pub fn to_vec(&self) -> Vec<EvidenceCategory> {
        self.iter().collect()
    }
}

impl FromIterator<EvidenceCategory> for EvidenceFlags {
    fn from_iter<I: IntoIterator<Item = EvidenceCategory>>(iter: I) -> Self {
        let mut flags = Self::empty();
        for category in iter {
            flags.insert(category);
        }
        flags
    }
}

impl fmt::Display for EvidenceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.iter().map(|c| c.into()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// List labels of the categories missing from `current` to reach `required`
pub fn list_missing(current: EvidenceFlags, required: EvidenceFlags) -> Vec<&'static str> {
    required.difference(current).iter().map(|c| c.label()).collect()
}
