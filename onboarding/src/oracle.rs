// Verification oracles
// OCR/document matching, face detection, image transforms and the
// interactive liveness challenge are external capabilities injected into
// the capture pipeline and the liveness orchestrator.

use async_trait::async_trait;
use tierpass_common::kyc::{LivenessResult, ValidationResult};

use crate::{
    capture::{CapturedFile, DocumentType},
    error::{CaptureError, OracleError},
    personal::PersonalInfo,
};

/// Input of one document validation call
#[derive(Debug, Clone, Copy)]
pub struct DocumentCheck<'a> {
    pub document_type: DocumentType,
    pub front: &'a CapturedFile,
    /// Present for document types with two sides
    pub back: Option<&'a CapturedFile>,
    /// Entered details the extracted fields are matched against
    pub personal: &'a PersonalInfo,
}

/// Document extraction and matching oracle
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    /// Extract the document fields (MRZ when present) and compare them with
    /// the entered personal information
    ///
    /// An `Err` means the oracle could not produce a verdict at all, a
    /// mismatch is reported through `ValidationResult::is_valid`.
    async fn verify(&self, check: DocumentCheck<'_>) -> Result<ValidationResult, OracleError>;
}

/// Face detection on the selfie
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Returns the detection score (0-100), or `None` when no face was found
    async fn detect_face(&self, selfie: &CapturedFile) -> Result<Option<u8>, OracleError>;
}

/// Image transforms applied to captured documents
pub trait ImageCodec: Send + Sync {
    /// Rotate the image 90 degrees clockwise, re-encoding it in its own format
    fn rotate_quarter_turn(&self, image: &CapturedFile) -> Result<CapturedFile, CaptureError>;
}

/// Interactive liveness challenge sequence (blink, turn head, smile...)
#[async_trait]
pub trait LivenessChallenge: Send + Sync {
    /// Run the whole sequence
    /// `Ok(None)` means the user dismissed the challenge
    async fn run(&self) -> Result<Option<LivenessResult>, OracleError>;
}
