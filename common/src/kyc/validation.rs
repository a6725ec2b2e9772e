// Verification artifacts
// Results produced by the document oracle, the liveness challenge and the
// backend adjudicator, plus the score reconciliation rules between them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::AdjudicationStatus;
use crate::api::AdjudicationResponse;

/// Fields read from a document's machine readable zone
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MrzData {
    pub document_number: String,
    pub surname: String,
    pub given_names: String,
    pub nationality: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

impl MrzData {
    /// Full name as printed, "GIVEN NAMES SURNAME"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_names.trim(), self.surname.trim())
            .trim()
            .to_string()
    }

    /// Check if the document is past its expiry date
    /// Documents without an expiry date are never expired
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.map(|d| d < today).unwrap_or(false)
    }
}

/// Outcome of one document extraction/matching call
/// Replaced, never merged, on each retry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    /// 0-100
    pub confidence: u8,
    #[serde(default)]
    pub matched_fields: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub requires_manual_review: bool,
    #[serde(default)]
    pub mrz_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrz_data: Option<MrzData>,
}

impl ValidationResult {
    /// Confidence clamped to 0-100
    #[inline]
    pub fn confidence(&self) -> u8 {
        self.confidence.min(100)
    }
}

/// Outcome of a completed liveness challenge sequence
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResult {
    pub passed: bool,
    /// 0-100
    pub score: u8,
    pub completed_challenges: u32,
    pub total_challenges: u32,
}

impl LivenessResult {
    pub fn is_complete(&self) -> bool {
        self.total_challenges > 0 && self.completed_challenges >= self.total_challenges
    }
}

/// Final artifact of a completed submission cycle
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub auto_approved: bool,
    pub status: AdjudicationStatus,
    pub verification_score: u8,
}

/// Prefer the backend score when it is non-zero, otherwise fall back to the
/// locally computed document confidence
pub fn reconcile_score(backend_score: u8, local_confidence: Option<u8>) -> u8 {
    if backend_score > 0 {
        backend_score.min(100)
    } else {
        local_confidence.unwrap_or(0).min(100)
    }
}

/// Combine the adjudicator response with the local document validation
///
/// Auto-approval requires oracle validity, a reconciled score at or above
/// `threshold` and no manual review flag on either side. Oracle validity is
/// the local result when one exists, otherwise the backend's own verdict.
pub fn reconcile_submission(
    response: &AdjudicationResponse,
    local: Option<&ValidationResult>,
    threshold: u8,
) -> SubmissionResult {
    let score = reconcile_score(response.verification_score, local.map(|v| v.confidence()));
    let oracle_valid = local.map(|v| v.is_valid).unwrap_or(response.auto_approved);
    let manual_review =
        response.requires_manual_review || local.map(|v| v.requires_manual_review).unwrap_or(false);

    SubmissionResult {
        auto_approved: oracle_valid && score >= threshold && !manual_review,
        status: response.status,
        verification_score: score,
    }
}
