// Requirement differ
// Computes the evidence a user must supply to move from the approved tier
// to a requested tier, re-using evidence verified at the approved tier.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::{EvidenceCategory, EvidenceFlags, Tier};

/// One evidence requirement of an upgrade, as shown to the user
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequirement {
    pub category: EvidenceCategory,
    pub already_verified: bool,
}

/// Categories satisfied by the approved tier
/// Derived from the tier table, never stored
#[inline]
pub fn verified_evidence(approved: Tier) -> EvidenceFlags {
    approved.requirements()
}

/// Union of the requirement sets of every tier in `(approved, target]`
///
/// Returns an empty set when `target <= approved`: such a selection is a
/// no-op and must be rejected by the caller.
pub fn requirements_for_upgrade(approved: Tier, target: Tier) -> EvidenceFlags {
    if target <= approved {
        return EvidenceFlags::empty();
    }

    Tier::iter()
        .filter(|tier| *tier > approved && *tier <= target)
        .fold(EvidenceFlags::empty(), |acc, tier| {
            acc.union(tier.requirements())
        })
}

/// Annotate each category with whether the approved tier already covers it
pub fn with_verified_flags(categories: EvidenceFlags, approved: Tier) -> Vec<UpgradeRequirement> {
    let verified = verified_evidence(approved);
    categories
        .iter()
        .map(|category| UpgradeRequirement {
            category,
            already_verified: verified.contains(category),
        })
        .collect()
}

/// Only the categories that still have to be collected
pub fn outstanding_requirements(approved: Tier, target: Tier) -> EvidenceFlags {
    requirements_for_upgrade(approved, target).difference(verified_evidence(approved))
}

/// Full annotated requirement list for an upgrade
#[inline]
pub fn upgrade_plan(approved: Tier, target: Tier) -> Vec<UpgradeRequirement> {
    with_verified_flags(requirements_for_upgrade(approved, target), approved)
}
