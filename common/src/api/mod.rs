// Backend API wire types
// GET  /api/kyc/countries
// GET  /api/kyc/status/{address}
// POST /api/kyc/submit (multipart)

use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    crypto::{Address, Hash},
    kyc::{AdjudicationStatus, LivenessResult, Tier, ValidationResult},
};

pub const COUNTRIES_PATH: &str = "/api/kyc/countries";
pub const STATUS_PATH: &str = "/api/kyc/status";
pub const SUBMIT_PATH: &str = "/api/kyc/submit";

// Header carrying the idempotency key of an adjudication request
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Entry of the country list
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Country {
    /// ISO 3166-1 alpha-2
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub blocked: bool,
}

impl Country {
    pub fn new<C: Into<String>, N: Into<String>>(code: C, name: N, blocked: bool) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            blocked,
        }
    }
}

/// Submission record known to the backend
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSubmission {
    pub requested_level: Tier,
    #[serde(default)]
    pub current_level: Option<Tier>,
    #[serde(default)]
    pub status: Option<AdjudicationStatus>,
    #[serde(default)]
    pub tx_hash: Option<Hash>,
    #[serde(default)]
    pub verification_score: Option<u8>,
}

/// Response of `GET /api/kyc/status/{address}`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StatusResponse {
    pub found: bool,
    #[serde(default)]
    pub submission: Option<StatusSubmission>,
}

impl StatusResponse {
    /// Tier requested by the recorded submission, if any
    pub fn requested_level(&self) -> Option<Tier> {
        if !self.found {
            return None;
        }
        self.submission.as_ref().map(|s| s.requested_level)
    }
}

/// Response of `POST /api/kyc/submit`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdjudicationResponse {
    pub auto_approved: bool,
    pub status: AdjudicationStatus,
    #[serde(default)]
    pub verification_score: u8,
    #[serde(default)]
    pub requires_manual_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error payload returned by the backend on non-success status codes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Text fields of the multipart submission
///
/// Files travel as separate parts, see `FilePart`.
/// `ValidationResult` and `LivenessResult` are embedded as JSON strings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFields {
    pub wallet_address: Address,
    pub requested_level: Tier,
    pub current_level: Tier,
    pub chain_id: u64,
    /// Also the idempotency key of the adjudication
    pub tx_hash: Hash,
    pub document_hash: Hash,
    pub full_name: String,
    pub date_of_birth: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residential_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_result: Option<LivenessResult>,
}

impl SubmissionFields {
    /// Flatten into `(name, value)` pairs, one per multipart text part
    /// Nested objects are encoded as JSON strings
    pub fn to_text_fields(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let mut fields = Vec::new();
        if let Value::Object(map) = value {
            for (name, value) in map {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => continue,
                    other => other.to_string(),
                };
                fields.push((name, text));
            }
        }

        if log::log_enabled!(log::Level::Trace) {
            trace!("submission has {} text fields", fields.len());
        }
        Ok(fields)
    }
}

/// Names of the file parts of the multipart submission
pub mod file_parts {
    pub const DOCUMENT_FRONT: &str = "documentFront";
    pub const DOCUMENT_BACK: &str = "documentBack";
    pub const SELFIE: &str = "selfie";
    pub const ADDRESS_PROOF: &str = "addressProof";
    pub const ACCREDITED_PROOF: &str = "accreditedProof";
}
