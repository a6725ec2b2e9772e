pub const VERSION: &str = env!("BUILD_VERSION");

// 1 MB = 1024 * 1024 bytes
pub const BYTES_PER_MB: usize = 1024 * 1024;

// ===== CAPTURE RULES =====
// Maximum size of any captured file (documents, selfie, proofs)
pub const MAX_FILE_SIZE: usize = 10 * BYTES_PER_MB;
// Accepted MIME types: any image/* plus PDF
pub const IMAGE_MIME_PREFIX: &str = "image/";
pub const PDF_MIME_TYPE: &str = "application/pdf";

// ===== VALIDATION RULES =====
// Maximum document extraction/matching attempts per capture
// Once reached, the user must recapture the document
pub const MAX_RETRIES: u32 = 3;
// Minimum number of characters of the full name
pub const MIN_FULL_NAME_LENGTH: usize = 2;
// Applicants must be adults
pub const MINIMUM_AGE: u32 = 18;

// ===== SCORING =====
// Reconciled score at or above which a valid submission is auto-approved
pub const AUTO_APPROVE_THRESHOLD: u8 = 70;
// Face score recorded when the face detection oracle is unavailable
// Low enough to never auto-approve on its own
pub const FALLBACK_FACE_SCORE: u8 = 50;
// Liveness score recorded when the liveness oracle fails to run
pub const FALLBACK_LIVENESS_SCORE: u8 = 0;
