// KYC registry contract read models
// Mirrors what the registry exposes through getSubmission, getUpgradeRequest
// and transaction receipts. The contract logic itself lives on-chain.

use serde::{Deserialize, Serialize};

use crate::{
    crypto::{Address, Hash},
    kyc::{SubmissionStatus, Tier},
};

/// Result of `getSubmission(address)`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub status: SubmissionStatus,
    pub level: Tier,
    pub investor: Address,
    pub country_code: String,
    pub document_hash: Hash,
}

impl Submission {
    /// Empty record returned for accounts that never submitted
    pub fn empty(investor: Address) -> Self {
        Self {
            status: SubmissionStatus::None,
            level: Tier::None,
            investor,
            country_code: String::new(),
            document_hash: Hash::zero(),
        }
    }

    /// Tier currently approved for the account
    pub fn approved_tier(&self) -> Tier {
        if self.status.is_approved() {
            self.level
        } else {
            Tier::None
        }
    }
}

/// Result of `getUpgradeRequest(address)`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub requested_level: Tier,
    pub pending: bool,
}

/// Which payable registry function a tier request goes through
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// `submitKYC(level, documentHash, countryCode)`, account has no approved tier
    Initial,
    /// `requestUpgrade(newLevel, documentHash)`, account already holds a tier
    Upgrade,
}

impl RequestKind {
    /// Pick the request kind from the approved tier
    pub fn for_approved(approved: Tier) -> Self {
        if approved == Tier::None {
            RequestKind::Initial
        } else {
            RequestKind::Upgrade
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            RequestKind::Initial => "submitKYC",
            RequestKind::Upgrade => "requestUpgrade",
        }
    }
}

/// Payable call to the registry, ready to be signed by the wallet
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TierRequestCall {
    pub kind: RequestKind,
    pub level: Tier,
    pub document_hash: Hash,
    /// Only sent with `submitKYC`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Fee attached to the call, in the chain's smallest unit
    pub value: u128,
}

/// Receipt of a mined transaction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub tx_hash: Hash,
    pub block_number: u64,
    /// false when the transaction was mined but reverted
    pub success: bool,
}
