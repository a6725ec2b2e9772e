use thiserror::Error;
use tierpass_common::{
    crypto::Hash,
    kyc::{KycError, Tier},
};

use crate::{capture::DocumentSide, workflow::WorkflowStage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("File is too large ({size} bytes), the maximum is {max} bytes")]
    FileTooLarge { size: usize, max: usize },
    #[error("Unsupported file type '{0}', please use an image or a PDF")]
    InvalidFileType(String),
    #[error("File is empty")]
    EmptyFile,
    #[error("There is no {0} image to rotate")]
    NothingToRotate(DocumentSide),
    #[error("A {0} image is not needed for this document type")]
    SideNotRequired(DocumentSide),
    #[error("Could not process the image: {0}")]
    Codec(String),
}

impl CaptureError {
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            CaptureError::FileTooLarge { .. } => "Select a file smaller than 10 MB.",
            CaptureError::InvalidFileType(_) => "Select a JPEG, PNG or PDF file.",
            CaptureError::EmptyFile => "Select the file again.",
            CaptureError::NothingToRotate(_) => "Capture the image first.",
            CaptureError::SideNotRequired(_) => "Only the front of this document is needed.",
            CaptureError::Codec(_) => "Capture the image again.",
        }
    }
}

/// Failure reported by a verification oracle (OCR, face detection, liveness)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("the image could not be read: {0}")]
    Unreadable(String),
    #[error("no document was found in the image")]
    NoDocument,
    #[error("the document does not match the entered details: {0}")]
    Mismatch(String),
    #[error("the verification service is unavailable: {0}")]
    Unavailable(String),
    #[error("the verification service timed out")]
    Timeout,
}

impl OracleError {
    /// User-facing suggestion for the next capture
    pub fn suggestion(&self) -> &'static str {
        match self {
            OracleError::Unreadable(_) => {
                "Retake the photo in good light, without glare, with all four corners visible."
            }
            OracleError::NoDocument => "Make sure the document fills most of the frame.",
            OracleError::Mismatch(_) => {
                "Check that your name, date of birth and country match the document exactly."
            }
            OracleError::Unavailable(_) | OracleError::Timeout => {
                "Wait a moment and try again."
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter your full name, date of birth and country and capture the required document sides first")]
    NotReady,
    #[error("Document validation failed: {message}")]
    Failed {
        message: String,
        suggestion: &'static str,
        attempts: u32,
        retryable: bool,
    },
    #[error("Document validation failed {attempts} times, please recapture your document")]
    RetriesExhausted { attempts: u32 },
}

impl ValidationError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            ValidationError::NotReady => true,
            ValidationError::Failed { retryable, .. } => *retryable,
            ValidationError::RetriesExhausted { .. } => false,
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ValidationError::NotReady => "Complete the highlighted fields.",
            ValidationError::Failed {
                retryable: true,
                suggestion,
                ..
            } => suggestion,
            ValidationError::Failed { .. } | ValidationError::RetriesExhausted { .. } => {
                "Capture new photos of your document to try again."
            }
        }
    }
}

/// Errors raised by the wallet or the registry contract
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Transaction was rejected in the wallet")]
    UserRejected,
    #[error("Insufficient funds to pay the verification fee")]
    InsufficientFunds,
    #[error("Transaction reverted: {0}")]
    Reverted(String),
    #[error("Could not switch the wallet to chain {expected}: {reason}")]
    ChainSwitchFailed { expected: u64, reason: String },
    #[error("Transaction {0} was not confirmed in time")]
    ConfirmationTimeout(Hash),
    #[error("Network error: {0}")]
    Network(String),
    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Classify a raw wallet or node error message
    pub fn from_message<S: AsRef<str>>(raw: S) -> Self {
        let raw = raw.as_ref();
        let lower = raw.to_lowercase();
        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected the request")
        {
            ChainError::UserRejected
        } else if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
            ChainError::InsufficientFunds
        } else if lower.contains("execution reverted") || lower.contains("revert") {
            let reason = raw
                .split_once("reverted:")
                .map(|(_, reason)| reason.trim())
                .filter(|reason| !reason.is_empty())
                .unwrap_or("the contract refused the request");
            ChainError::Reverted(reason.to_string())
        } else if lower.contains("timeout")
            || lower.contains("network")
            || lower.contains("connection")
            || lower.contains("fetch")
        {
            ChainError::Network(raw.to_string())
        } else {
            ChainError::Other(raw.to_string())
        }
    }

    /// Short message shown in the submission error banner
    pub fn user_message(&self) -> String {
        match self {
            ChainError::UserRejected => "You rejected the transaction.".to_string(),
            ChainError::InsufficientFunds => {
                "Your wallet does not hold enough funds for the verification fee.".to_string()
            }
            ChainError::Reverted(reason) => format!("The registry refused the request: {}", reason),
            ChainError::ChainSwitchFailed { expected, .. } => {
                format!("Please switch your wallet to chain {}.", expected)
            }
            ChainError::ConfirmationTimeout(hash) => format!(
                "Transaction {} is taking longer than expected, check it before retrying.",
                hash
            ),
            ChainError::Network(_) => "Network error, please try again.".to_string(),
            ChainError::Other(message) => message.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(String),
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("Failed to encode submission: {0}")]
    Encoding(String),
}

impl BackendError {
    /// Network failures, 5xx and 429 may succeed when retried
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Request(_) => true,
            BackendError::Status { status, .. } => *status >= 500 || *status == 429,
            BackendError::InvalidResponse(_) | BackendError::Encoding(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BackendError::Request(err.to_string())
        }
    }
}

/// First failing check of the submission form
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Please enter your full name (at least 2 characters)")]
    MissingFullName,
    #[error("Please enter your date of birth")]
    MissingDateOfBirth,
    #[error("You must be at least {0} years old")]
    Underage(u32),
    #[error("Please select your country")]
    MissingCountry,
    #[error("Verification is not available for residents of {0}")]
    CountryBlocked(String),
    #[error("Please capture the front of your document")]
    MissingDocumentFront,
    #[error("Please capture the back of your document")]
    MissingDocumentBack,
    #[error("Your document could not be verified, please recapture it")]
    DocumentInvalid,
    #[error("Please take a selfie")]
    SelfieRequired,
    #[error("No face was detected in your selfie, please take another one")]
    SelfieNotVerified,
    #[error("Please complete the liveness check")]
    LivenessRequired,
    #[error("The liveness check did not pass, please try again")]
    LivenessFailed,
    #[error("Please upload a proof of address")]
    AddressProofRequired,
    #[error("Please upload a proof of accredited investor status")]
    AccreditedProofRequired,
    #[error("Please accept the terms and conditions")]
    TermsNotAccepted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("This action is not available while the workflow is in stage '{0}'")]
    InvalidStage(WorkflowStage),
    #[error(transparent)]
    Selection(#[from] KycError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Your payment was confirmed but the verification request could not be delivered: {0}")]
    Adjudication(BackendError),
    #[error("There is no confirmed transaction waiting for review")]
    NothingToRetry,
    #[error("The account state has not been loaded yet")]
    AccountNotLoaded,
    #[error("A paid request for tier {0} is still waiting for verification")]
    AdjudicationPending(Tier),
}

impl WorkflowError {
    /// Whether the user can fix the problem without starting over
    pub fn is_recoverable(&self) -> bool {
        match self {
            WorkflowError::Validation(e) => e.is_recoverable(),
            WorkflowError::InvalidStage(_) | WorkflowError::NothingToRetry => false,
            _ => true,
        }
    }

    pub fn recovery_hint(&self) -> String {
        match self {
            WorkflowError::InvalidStage(_) => "Reload the page to resume.".to_string(),
            WorkflowError::Selection(KycError::RequestPending { .. }) => {
                "Wait for the current request to be reviewed.".to_string()
            }
            WorkflowError::Selection(_) => "Choose a tier above your current tier.".to_string(),
            WorkflowError::Form(e) => e.to_string(),
            WorkflowError::Capture(e) => e.recovery_hint().to_string(),
            WorkflowError::Validation(e) => e.recovery_hint().to_string(),
            WorkflowError::Chain(e) => format!("{} Your form is kept, submit again.", e.user_message()),
            WorkflowError::Backend(_) => "Try again in a moment.".to_string(),
            WorkflowError::Adjudication(_) => {
                "Retry the submission, you will not be charged again.".to_string()
            }
            WorkflowError::NothingToRetry => "Submit the form first.".to_string(),
            WorkflowError::AccountNotLoaded => "Connect your wallet and refresh.".to_string(),
            WorkflowError::AdjudicationPending(tier) => format!(
                "Select {} again and retry the submission, you will not be charged again.",
                tier
            ),
        }
    }
}
