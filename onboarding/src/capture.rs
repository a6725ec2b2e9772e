// Capture & validation pipeline
// Holds the document sides, selfie and supporting proofs of one submission
// attempt, runs document validation through the oracle with a bounded
// number of attempts and face detection on the selfie.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};
use tierpass_common::{
    config::{FALLBACK_FACE_SCORE, IMAGE_MIME_PREFIX, MAX_FILE_SIZE, MAX_RETRIES, PDF_MIME_TYPE},
    crypto::{DocumentHasher, Hash},
    kyc::ValidationResult,
    time::today,
};

use crate::{
    error::{CaptureError, OracleError, ValidationError},
    oracle::{DocumentCheck, DocumentVerifier, FaceDetector, ImageCodec},
    personal::PersonalInfo,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Passport,
    NationalId,
    DriversLicense,
    ResidencePermit,
}

impl DocumentType {
    /// Passports only have a data page, cards have two sides
    pub fn requires_back(&self) -> bool {
        !matches!(self, DocumentType::Passport)
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Passport => "Passport",
            DocumentType::NationalId => "National ID Card",
            DocumentType::DriversLicense => "Driver's License",
            DocumentType::ResidencePermit => "Residence Permit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentSide {
    Front,
    Back,
}

impl fmt::Display for DocumentSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSide::Front => f.write_str("front"),
            DocumentSide::Back => f.write_str("back"),
        }
    }
}

/// A file accepted by the pipeline
///
/// Construction enforces the upload rules: non-empty, at most
/// `MAX_FILE_SIZE` bytes, and an image or PDF mime type.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedFile {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl CapturedFile {
    pub fn new<N: Into<String>, M: Into<String>>(
        file_name: N,
        mime_type: M,
        bytes: Vec<u8>,
    ) -> Result<Self, CaptureError> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if bytes.is_empty() {
            return Err(CaptureError::EmptyFile);
        }
        if bytes.len() > MAX_FILE_SIZE {
            return Err(CaptureError::FileTooLarge {
                size: bytes.len(),
                max: MAX_FILE_SIZE,
            });
        }
        if !mime_type.starts_with(IMAGE_MIME_PREFIX) && mime_type != PDF_MIME_TYPE {
            return Err(CaptureError::InvalidFileType(mime_type));
        }

        Ok(Self {
            file_name: file_name.into(),
            mime_type,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with(IMAGE_MIME_PREFIX)
    }

    /// Data URL used to render the capture
    pub fn preview(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for CapturedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Face detection state of the selfie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceDetection {
    #[default]
    Idle,
    Detecting,
    /// `fallback` is set when the detector was unavailable and the neutral
    /// score was assigned instead
    Success { score: u8, fallback: bool },
    /// The detector ran and found no face
    Failed,
}

impl FaceDetection {
    pub fn is_success(&self) -> bool {
        matches!(self, FaceDetection::Success { .. })
    }

    pub fn score(&self) -> Option<u8> {
        match self {
            FaceDetection::Success { score, .. } => Some(*score),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct CapturePipeline {
    document_type: DocumentType,
    front: Option<CapturedFile>,
    back: Option<CapturedFile>,
    // Latest oracle verdict, replaced on each attempt
    validation: Option<ValidationResult>,
    validation_error: Option<ValidationError>,
    attempts: u32,
    validating: bool,
    selfie: Option<CapturedFile>,
    face: FaceDetection,
    address_proof: Option<CapturedFile>,
    accredited_proof: Option<CapturedFile>,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// Switching the document type discards both sides and any verdict
    pub fn change_document_type(&mut self, document_type: DocumentType) {
        if self.document_type == document_type {
            return;
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Document type changed from {} to {}",
                self.document_type.as_str(),
                document_type.as_str()
            );
        }
        self.document_type = document_type;
        self.front = None;
        self.back = None;
        self.invalidate();
    }

    pub fn document(&self, side: DocumentSide) -> Option<&CapturedFile> {
        match side {
            DocumentSide::Front => self.front.as_ref(),
            DocumentSide::Back => self.back.as_ref(),
        }
    }

    fn document_mut(&mut self, side: DocumentSide) -> &mut Option<CapturedFile> {
        match side {
            DocumentSide::Front => &mut self.front,
            DocumentSide::Back => &mut self.back,
        }
    }

    /// Store a document side
    /// Any new image invalidates the verdict and grants fresh attempts
    pub fn capture_document(
        &mut self,
        side: DocumentSide,
        file: CapturedFile,
    ) -> Result<(), CaptureError> {
        if side == DocumentSide::Back && !self.document_type.requires_back() {
            return Err(CaptureError::SideNotRequired(side));
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("Captured document {} ({:?})", side, file);
        }
        *self.document_mut(side) = Some(file);
        self.invalidate();
        Ok(())
    }

    pub fn remove_document(&mut self, side: DocumentSide) {
        if self.document_mut(side).take().is_some() {
            self.invalidate();
        }
    }

    /// Rotate a captured side by a quarter turn
    pub fn rotate(&mut self, side: DocumentSide, codec: &dyn ImageCodec) -> Result<(), CaptureError> {
        let current = self
            .document(side)
            .ok_or(CaptureError::NothingToRotate(side))?;
        if !current.is_image() {
            return Err(CaptureError::InvalidFileType(current.mime_type().to_owned()));
        }

        let rotated = codec.rotate_quarter_turn(current)?;
        *self.document_mut(side) = Some(rotated);
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.validation = None;
        self.validation_error = None;
        self.attempts = 0;
    }

    /// Every side needed by the document type is present
    pub fn has_document(&self) -> bool {
        self.front.is_some() && (!self.document_type.requires_back() || self.back.is_some())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_validating(&self) -> bool {
        self.validating
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    pub fn retries_exhausted(&self) -> bool {
        self.attempts >= MAX_RETRIES
    }

    /// Validation can be requested: personal details entered, required sides
    /// captured, no call in flight and attempts left
    pub fn can_validate(&self, personal: &PersonalInfo) -> bool {
        personal.is_filled() && self.has_document() && !self.validating && !self.retries_exhausted()
    }

    /// Run document validation through the oracle
    ///
    /// Once `MAX_RETRIES` attempts have been used the call is refused without
    /// reaching the oracle, until a new image is captured.
    pub async fn validate(
        &mut self,
        verifier: &dyn DocumentVerifier,
        personal: &PersonalInfo,
    ) -> Result<&ValidationResult, ValidationError> {
        if self.retries_exhausted() {
            let err = ValidationError::RetriesExhausted {
                attempts: self.attempts,
            };
            self.validation_error = Some(err.clone());
            return Err(err);
        }

        let front = match (&self.front, personal.is_filled() && self.has_document()) {
            (Some(front), true) => front,
            _ => return Err(ValidationError::NotReady),
        };
        let check = DocumentCheck {
            document_type: self.document_type,
            front,
            back: if self.document_type.requires_back() {
                self.back.as_ref()
            } else {
                None
            },
            personal,
        };

        self.validating = true;
        self.attempts += 1;
        let attempt = self.attempts;
        if log::log_enabled!(log::Level::Info) {
            info!(
                "Validating {} (attempt {}/{})",
                self.document_type.as_str(),
                attempt,
                MAX_RETRIES
            );
        }
        let outcome = verifier.verify(check).await;
        self.validating = false;

        let retryable = attempt < MAX_RETRIES;
        match outcome {
            Ok(mut result) => {
                let failure = Self::rejection_reason(&result);
                // A rejected verdict is stored as invalid, whatever the oracle said
                if let Some((message, _)) = failure.as_ref() {
                    result.is_valid = false;
                    if !result.errors.contains(message) {
                        result.errors.push(message.clone());
                    }
                }
                self.validation = Some(result);
                match failure {
                    None => {
                        self.validation_error = None;
                    }
                    Some((message, suggestion)) => {
                        warn!("Document validation rejected: {}", message);
                        self.validation_error = Some(ValidationError::Failed {
                            message,
                            suggestion,
                            attempts: attempt,
                            retryable,
                        });
                    }
                }
            }
            Err(e) => {
                warn!("Document oracle error: {}", e);
                self.validation = None;
                self.validation_error = Some(ValidationError::Failed {
                    message: e.to_string(),
                    suggestion: e.suggestion(),
                    attempts: attempt,
                    retryable,
                });
            }
        }

        match (&self.validation_error, &self.validation) {
            (Some(err), _) => Err(err.clone()),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(ValidationError::NotReady),
        }
    }

    // Reason a verdict cannot be accepted, with a suggestion for the user
    fn rejection_reason(result: &ValidationResult) -> Option<(String, &'static str)> {
        if let Some(mrz) = result.mrz_data.as_ref() {
            if mrz.is_expired(today()) {
                return Some((
                    "the document has expired".to_owned(),
                    "Use a document that is still valid.",
                ));
            }
        }
        if result.is_valid {
            return None;
        }

        let message = if result.errors.is_empty() {
            "the document details could not be confirmed".to_owned()
        } else {
            result.errors.join(", ")
        };
        let suggestion = if result.mrz_detected {
            OracleError::Mismatch(String::new()).suggestion()
        } else {
            "Make sure the machine readable zone at the bottom of the document is visible and sharp."
        };
        Some((message, suggestion))
    }

    pub fn selfie(&self) -> Option<&CapturedFile> {
        self.selfie.as_ref()
    }

    pub fn face_detection(&self) -> FaceDetection {
        self.face
    }

    /// Store the selfie and run face detection
    ///
    /// A detector failure does not block the user: the selfie is accepted
    /// with `FALLBACK_FACE_SCORE` and left to manual review.
    pub async fn upload_selfie(
        &mut self,
        file: CapturedFile,
        detector: &dyn FaceDetector,
    ) -> Result<FaceDetection, CaptureError> {
        if !file.is_image() {
            return Err(CaptureError::InvalidFileType(file.mime_type().to_owned()));
        }

        self.face = FaceDetection::Detecting;
        let detection = detector.detect_face(&file).await;
        self.selfie = Some(file);
        self.face = match detection {
            Ok(Some(score)) => FaceDetection::Success {
                score: score.min(100),
                fallback: false,
            },
            Ok(None) => {
                info!("No face detected in the selfie");
                FaceDetection::Failed
            }
            Err(e) => {
                warn!(
                    "Face detection unavailable ({}), using fallback score {}",
                    e, FALLBACK_FACE_SCORE
                );
                FaceDetection::Success {
                    score: FALLBACK_FACE_SCORE,
                    fallback: true,
                }
            }
        };
        Ok(self.face)
    }

    pub fn clear_selfie(&mut self) {
        self.selfie = None;
        self.face = FaceDetection::Idle;
    }

    pub fn address_proof(&self) -> Option<&CapturedFile> {
        self.address_proof.as_ref()
    }

    pub fn set_address_proof(&mut self, file: Option<CapturedFile>) {
        self.address_proof = file;
    }

    pub fn accredited_proof(&self) -> Option<&CapturedFile> {
        self.accredited_proof.as_ref()
    }

    pub fn set_accredited_proof(&mut self, file: Option<CapturedFile>) {
        self.accredited_proof = file;
    }

    /// Commitment over the entered details and every captured file
    /// Order: personal fields, document type, front, back, selfie, address
    /// proof, accredited proof
    pub fn document_hash(&self, personal: &PersonalInfo) -> Hash {
        fn file_bytes(file: &Option<CapturedFile>) -> Option<&[u8]> {
            file.as_ref().map(CapturedFile::bytes)
        }

        DocumentHasher::new()
            .field(personal.full_name())
            .field(&personal.date_of_birth_string())
            .field(personal.country.trim())
            .field(personal.nationality.as_deref().unwrap_or_default())
            .field(personal.document_number.as_deref().unwrap_or_default())
            .field(self.document_type.as_str())
            .optional_bytes(file_bytes(&self.front))
            .optional_bytes(file_bytes(&self.back))
            .optional_bytes(file_bytes(&self.selfie))
            .optional_bytes(file_bytes(&self.address_proof))
            .optional_bytes(file_bytes(&self.accredited_proof))
            .finalize()
    }

    /// Drop every capture and verdict
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
