#![allow(clippy::disallowed_methods)]

//! Onboarding workflow tests
//!
//! Drive the controller end to end against in-memory collaborators:
//! - tier selection and the pending-request guard
//! - form checks and carry-forward of verified evidence
//! - payable transaction, confirmation and adjudication ordering
//! - adjudication retry without a second transaction

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use strum::IntoEnumIterator;
use tierpass_common::{
    api::{AdjudicationResponse, Country, StatusResponse},
    contract::{RequestKind, Submission, TierRequestCall, TransactionReceipt, UpgradeRequest},
    crypto::{Address, Hash},
    kyc::{
        AdjudicationStatus, EvidenceCategory, KycError, LivenessResult, MrzData, SubmissionStatus,
        Tier, ValidationResult,
    },
};
use tierpass_onboarding::{
    backend::{AdjudicationRequest, KycBackend},
    capture::{CapturedFile, DocumentSide, DocumentType},
    chain::{KycContract, WalletConnection},
    config::OnboardingConfig,
    error::{BackendError, ChainError, CaptureError, FormError, OracleError, WorkflowError},
    oracle::{DocumentCheck, DocumentVerifier, FaceDetector, ImageCodec, LivenessChallenge},
    personal::PersonalInfo,
    Collaborators, OnboardingController, WorkflowEvent, WorkflowStage,
};
use tokio::sync::broadcast::error::TryRecvError;

const ACCOUNT: Address = Address::new([0x11; 20]);
const WALLET_CHAIN: u64 = 11155111;

type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

// ============================================================================
// Wallet
// ============================================================================

struct MockWallet {
    chain: AtomicU64,
    journal: Journal,
}

#[async_trait]
impl WalletConnection for MockWallet {
    async fn address(&self) -> Result<Address, ChainError> {
        Ok(ACCOUNT)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain.load(Ordering::SeqCst))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ChainError> {
        record(&self.journal, format!("switch:{}", chain_id));
        self.chain.store(chain_id, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

struct MockRegistry {
    submission: Mutex<Submission>,
    upgrade: Mutex<UpgradeRequest>,
    sent: Mutex<Vec<TierRequestCall>>,
    send_error: Mutex<Option<ChainError>>,
    revert: bool,
    journal: Journal,
}

impl MockRegistry {
    fn new(approved: Tier, journal: Journal) -> Self {
        let mut submission = Submission::empty(ACCOUNT);
        if approved != Tier::None {
            submission.status = SubmissionStatus::Approved;
            submission.level = approved;
        }
        Self {
            submission: Mutex::new(submission),
            upgrade: Mutex::new(UpgradeRequest::default()),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            revert: false,
            journal,
        }
    }

    fn sent(&self) -> Vec<TierRequestCall> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl KycContract for MockRegistry {
    async fn get_submission(&self, _: &Address) -> Result<Submission, ChainError> {
        Ok(self.submission.lock().unwrap().clone())
    }

    async fn has_upgrade_pending(&self, _: &Address) -> Result<bool, ChainError> {
        Ok(self.upgrade.lock().unwrap().pending)
    }

    async fn get_upgrade_request(&self, _: &Address) -> Result<UpgradeRequest, ChainError> {
        Ok(*self.upgrade.lock().unwrap())
    }

    async fn send_tier_request(
        &self,
        _: &Address,
        call: &TierRequestCall,
    ) -> Result<Hash, ChainError> {
        if let Some(err) = self.send_error.lock().unwrap().take() {
            return Err(err);
        }

        record(&self.journal, format!("send:{}", call.kind.method_name()));
        let mut sent = self.sent.lock().unwrap();
        sent.push(call.clone());
        match call.kind {
            RequestKind::Initial => {
                let mut submission = self.submission.lock().unwrap();
                submission.status = SubmissionStatus::Pending;
                submission.level = call.level;
            }
            RequestKind::Upgrade => {
                *self.upgrade.lock().unwrap() = UpgradeRequest {
                    requested_level: call.level,
                    pending: true,
                };
            }
        }
        Ok(Hash::new([sent.len() as u8; 32]))
    }

    async fn get_receipt(&self, tx_hash: &Hash) -> Result<Option<TransactionReceipt>, ChainError> {
        record(&self.journal, "receipt");
        Ok(Some(TransactionReceipt {
            tx_hash: tx_hash.clone(),
            block_number: 100,
            success: !self.revert,
        }))
    }
}

// ============================================================================
// Backend
// ============================================================================

struct MockBackend {
    responses: Mutex<VecDeque<Result<AdjudicationResponse, BackendError>>>,
    submissions: Mutex<Vec<AdjudicationRequest>>,
    journal: Journal,
}

impl MockBackend {
    fn new(responses: Vec<Result<AdjudicationResponse, BackendError>>, journal: Journal) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            submissions: Mutex::new(Vec::new()),
            journal,
        }
    }

    fn submissions(&self) -> Vec<AdjudicationRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl KycBackend for MockBackend {
    async fn get_countries(&self) -> Result<Vec<Country>, BackendError> {
        Err(BackendError::Request("countries offline".into()))
    }

    async fn get_status(&self, _: &Address) -> Result<StatusResponse, BackendError> {
        Ok(StatusResponse {
            found: false,
            submission: None,
        })
    }

    async fn submit(
        &self,
        request: &AdjudicationRequest,
    ) -> Result<AdjudicationResponse, BackendError> {
        record(&self.journal, "adjudicate");
        self.submissions.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Request("no scripted response".into())))
    }
}

// ============================================================================
// Oracles
// ============================================================================

struct Verifier {
    confidence: u8,
    // Expiry read from the machine readable zone, if any
    expiry: Option<NaiveDate>,
}

#[async_trait]
impl DocumentVerifier for Verifier {
    async fn verify(&self, _: DocumentCheck<'_>) -> Result<ValidationResult, OracleError> {
        Ok(ValidationResult {
            is_valid: true,
            confidence: self.confidence,
            matched_fields: vec!["fullName".into(), "dateOfBirth".into()],
            mrz_detected: true,
            mrz_data: self.expiry.map(|expiry| MrzData {
                expiry_date: Some(expiry),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

struct Faces;

#[async_trait]
impl FaceDetector for Faces {
    async fn detect_face(&self, _: &CapturedFile) -> Result<Option<u8>, OracleError> {
        Ok(Some(92))
    }
}

struct Identity;

impl ImageCodec for Identity {
    fn rotate_quarter_turn(&self, image: &CapturedFile) -> Result<CapturedFile, CaptureError> {
        Ok(image.clone())
    }
}

struct Challenge;

#[async_trait]
impl LivenessChallenge for Challenge {
    async fn run(&self) -> Result<Option<LivenessResult>, OracleError> {
        Ok(Some(LivenessResult {
            passed: true,
            score: 88,
            completed_challenges: 3,
            total_challenges: 3,
        }))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    controller: OnboardingController,
    registry: Arc<MockRegistry>,
    backend: Arc<MockBackend>,
    wallet: Arc<MockWallet>,
    journal: Journal,
}

fn approved_response(score: u8) -> Result<AdjudicationResponse, BackendError> {
    Ok(AdjudicationResponse {
        auto_approved: true,
        status: AdjudicationStatus::Approved,
        verification_score: score,
        requires_manual_review: false,
        message: None,
    })
}

fn harness_with(
    approved: Tier,
    wallet_chain: u64,
    responses: Vec<Result<AdjudicationResponse, BackendError>>,
    configure: impl FnOnce(&mut MockRegistry),
) -> Harness {
    let verifier = Verifier {
        confidence: 40,
        expiry: None,
    };
    build_harness(approved, wallet_chain, responses, configure, verifier)
}

fn build_harness(
    approved: Tier,
    wallet_chain: u64,
    responses: Vec<Result<AdjudicationResponse, BackendError>>,
    configure: impl FnOnce(&mut MockRegistry),
    verifier: Verifier,
) -> Harness {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut registry = MockRegistry::new(approved, journal.clone());
    configure(&mut registry);
    let registry = Arc::new(registry);
    let backend = Arc::new(MockBackend::new(responses, journal.clone()));
    let wallet = Arc::new(MockWallet {
        chain: AtomicU64::new(wallet_chain),
        journal: journal.clone(),
    });

    let config = OnboardingConfig {
        chain_id: WALLET_CHAIN,
        confirmation_timeout: Duration::from_secs(5),
        confirmation_poll_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let services = Collaborators {
        wallet: wallet.clone(),
        contract: registry.clone(),
        backend: backend.clone(),
        documents: Arc::new(verifier),
        faces: Arc::new(Faces),
        images: Arc::new(Identity),
        liveness: Arc::new(Challenge),
    };

    Harness {
        controller: OnboardingController::new(config, services),
        registry,
        backend,
        wallet,
        journal,
    }
}

fn harness(approved: Tier, responses: Vec<Result<AdjudicationResponse, BackendError>>) -> Harness {
    harness_with(approved, WALLET_CHAIN, responses, |_| {})
}

fn image(name: &str, byte: u8) -> CapturedFile {
    CapturedFile::new(name, "image/jpeg", vec![byte; 64]).unwrap()
}

fn personal() -> PersonalInfo {
    PersonalInfo {
        full_name: "Marie Curie".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 11, 7),
        country: "FR".into(),
        nationality: Some("FR".into()),
        ..Default::default()
    }
}

// Personal details plus every piece of evidence the selected tier still needs
async fn fill_form(controller: &mut OnboardingController) {
    controller.set_personal_info(personal()).unwrap();
    fill_evidence(controller).await;
}

async fn fill_evidence(controller: &mut OnboardingController) {
    if controller.requires(EvidenceCategory::IdDocument) {
        controller
            .change_document_type(DocumentType::NationalId)
            .unwrap();
        controller
            .capture_document(DocumentSide::Front, image("front.jpg", 1))
            .unwrap();
        controller
            .capture_document(DocumentSide::Back, image("back.jpg", 2))
            .unwrap();
        controller.validate_document().await.unwrap();
    }
    if controller.requires(EvidenceCategory::Selfie) {
        controller
            .upload_selfie(image("selfie.jpg", 3))
            .await
            .unwrap();
    }
    if controller.requires(EvidenceCategory::Liveness) {
        controller.run_liveness().await.unwrap();
    }
    if controller.requires(EvidenceCategory::AddressProof) {
        let bill = CapturedFile::new("bill.pdf", "application/pdf", vec![4; 32]).unwrap();
        controller.set_address_proof(Some(bill)).unwrap();
    }
    if controller.requires(EvidenceCategory::AccreditedProof) {
        controller
            .set_accredited_proof(Some(image("statement.jpg", 5)))
            .unwrap();
    }
    controller.set_terms_agreed(true).unwrap();
}

fn drain_stages(receiver: &mut tokio::sync::broadcast::Receiver<WorkflowEvent>) -> Vec<WorkflowStage> {
    let mut stages = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(WorkflowEvent::StageChanged { to, .. }) => stages.push(to),
            Ok(_) => {}
            Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    stages
}

// ============================================================================
// Tier selection
// ============================================================================

#[tokio::test]
async fn test_selection_requires_refresh() {
    let mut h = harness(Tier::None, vec![]);
    assert_eq!(
        h.controller.select_tier(Tier::Bronze),
        Err(WorkflowError::AccountNotLoaded)
    );
    assert_eq!(h.controller.stage(), WorkflowStage::Select);
}

#[tokio::test]
async fn test_non_upgrade_selection_rejected() {
    let mut h = harness(Tier::Gold, vec![]);
    h.controller.refresh().await.unwrap();

    for target in [Tier::None, Tier::Bronze, Tier::Silver, Tier::Gold] {
        let err = h.controller.select_tier(target).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Selection(KycError::NotAnUpgrade { approved: 3, .. })
        ));
        assert_eq!(h.controller.stage(), WorkflowStage::Select);
        assert_eq!(h.controller.target(), None);
    }

    h.controller.select_tier(Tier::Diamond).unwrap();
    assert_eq!(h.controller.stage(), WorkflowStage::Form);
}

#[tokio::test]
async fn test_pending_request_blocks_every_tier() {
    let mut h = harness_with(Tier::Bronze, WALLET_CHAIN, vec![], |registry| {
        *registry.upgrade.lock().unwrap() = UpgradeRequest {
            requested_level: Tier::Silver,
            pending: true,
        };
    });
    let snapshot = h.controller.refresh().await.unwrap().clone();
    assert!(snapshot.pending.has_pending);
    assert_eq!(snapshot.pending.pending_tier, Some(Tier::Silver));

    for target in Tier::iter() {
        assert!(!h.controller.guard().is_selectable(target));
        assert!(matches!(
            h.controller.select_tier(target),
            Err(WorkflowError::Selection(KycError::RequestPending { .. }))
        ));
    }
    assert_eq!(h.controller.stage(), WorkflowStage::Select);
}

#[tokio::test]
async fn test_country_list_falls_back() {
    let mut h = harness(Tier::None, vec![]);
    h.controller.refresh().await.unwrap();
    assert!(!h.controller.countries().is_empty());
    assert!(h.controller.countries().is_blocked("KP"));
}

// ============================================================================
// Requirements and form checks
// ============================================================================

#[tokio::test]
async fn test_first_request_requirements() {
    let mut h = harness(Tier::None, vec![]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Silver).unwrap();

    let requirements = h.controller.requirements();
    let categories: Vec<_> = requirements.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            EvidenceCategory::PersonalInfo,
            EvidenceCategory::IdDocument,
            EvidenceCategory::Selfie,
            EvidenceCategory::AddressProof,
        ]
    );
    assert!(requirements.iter().all(|r| !r.already_verified));
}

#[tokio::test]
async fn test_upgrade_carries_verified_evidence() {
    let mut h = harness(Tier::Bronze, vec![approved_response(90)]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Gold).unwrap();

    for requirement in h.controller.requirements() {
        let verified = matches!(
            requirement.category,
            EvidenceCategory::PersonalInfo | EvidenceCategory::IdDocument
        );
        assert_eq!(requirement.already_verified, verified);
    }
    assert!(!h.controller.requires(EvidenceCategory::IdDocument));
    assert!(h.controller.requires(EvidenceCategory::Liveness));

    fill_form(&mut h.controller).await;
    h.controller.submit().await.unwrap();

    let sent = h.registry.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, RequestKind::Upgrade);
    assert_eq!(sent[0].level, Tier::Gold);
    assert_eq!(sent[0].country_code, None);
    assert_eq!(sent[0].value, h.controller.config().upgrade_fee);

    let submissions = h.backend.submissions();
    assert_eq!(submissions[0].fields.full_name, "Marie Curie");
    assert_eq!(submissions[0].fields.date_of_birth, "1990-11-07");
    assert_eq!(submissions[0].fields.country, "FR");
}

#[tokio::test]
async fn test_upgrade_requires_personal_details() {
    let mut h = harness(Tier::Bronze, vec![approved_response(90)]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Gold).unwrap();
    assert!(!h.controller.requires(EvidenceCategory::PersonalInfo));

    // Verified evidence is carried forward, the details themselves are not
    fill_evidence(&mut h.controller).await;
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::MissingFullName)
    );
    assert_eq!(h.controller.stage(), WorkflowStage::Form);
    assert!(h.registry.sent().is_empty());
    assert!(h.backend.submissions().is_empty());

    h.controller.set_personal_info(personal()).unwrap();
    h.controller.submit().await.unwrap();
    assert_eq!(h.registry.sent().len(), 1);
    assert_eq!(h.backend.submissions()[0].fields.full_name, "Marie Curie");
}

#[tokio::test]
async fn test_form_checks_block_signing() {
    let mut h = harness(Tier::None, vec![]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Gold).unwrap();

    let err = h.controller.submit().await.unwrap_err();
    assert_eq!(err, WorkflowError::Form(FormError::MissingFullName));
    assert_eq!(h.controller.stage(), WorkflowStage::Form);

    h.controller.set_personal_info(personal()).unwrap();
    h.controller
        .change_document_type(DocumentType::DriversLicense)
        .unwrap();
    h.controller
        .capture_document(DocumentSide::Front, image("front.jpg", 1))
        .unwrap();
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::MissingDocumentBack)
    );

    h.controller
        .capture_document(DocumentSide::Back, image("back.jpg", 2))
        .unwrap();
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::SelfieRequired)
    );

    h.controller
        .upload_selfie(image("selfie.jpg", 3))
        .await
        .unwrap();
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::LivenessRequired)
    );

    h.controller.run_liveness().await.unwrap();
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::AddressProofRequired)
    );

    h.controller
        .set_address_proof(Some(image("bill.jpg", 4)))
        .unwrap();
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::TermsNotAccepted)
    );

    assert!(h.registry.sent().is_empty());
    assert!(h.backend.submissions().is_empty());
    assert!(h.controller.last_error().is_some());
}

#[tokio::test]
async fn test_expired_document_blocks_submission() {
    let verifier = Verifier {
        confidence: 95,
        expiry: NaiveDate::from_ymd_opt(2001, 1, 1),
    };
    let mut h = build_harness(
        Tier::None,
        WALLET_CHAIN,
        vec![approved_response(95)],
        |_| {},
        verifier,
    );
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    h.controller.set_personal_info(personal()).unwrap();
    h.controller
        .capture_document(DocumentSide::Front, image("passport.jpg", 1))
        .unwrap();

    let err = h.controller.validate_document().await.unwrap_err();
    assert!(err.to_string().contains("expired"));
    assert!(!h.controller.capture().validation().unwrap().is_valid);

    h.controller.set_terms_agreed(true).unwrap();
    assert_eq!(h.controller.check_form(), Err(FormError::DocumentInvalid));
    assert_eq!(
        h.controller.submit().await.unwrap_err(),
        WorkflowError::Form(FormError::DocumentInvalid)
    );
    assert!(h.registry.sent().is_empty());
    assert!(h.backend.submissions().is_empty());
    assert!(h.controller.result().is_none());
}

#[tokio::test]
async fn test_document_type_change_clears_captures() {
    let mut h = harness(Tier::None, vec![]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    h.controller.set_personal_info(personal()).unwrap();
    h.controller
        .capture_document(DocumentSide::Front, image("passport.jpg", 1))
        .unwrap();
    assert!(h.controller.can_validate());
    h.controller.validate_document().await.unwrap();
    assert!(h.controller.capture().validation().is_some());

    h.controller
        .change_document_type(DocumentType::ResidencePermit)
        .unwrap();
    assert!(h.controller.capture().document(DocumentSide::Front).is_none());
    assert!(h.controller.capture().document(DocumentSide::Back).is_none());
    assert!(h.controller.capture().validation().is_none());
    assert!(!h.controller.can_validate());
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_full_submission() {
    let mut h = harness(Tier::None, vec![approved_response(85)]);
    let mut events = h.controller.subscribe();
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Silver).unwrap();
    fill_form(&mut h.controller).await;

    let result = h.controller.submit().await.unwrap();
    // Local confidence 40, backend 85
    assert_eq!(result.verification_score, 85);
    assert!(result.auto_approved);
    assert_eq!(result.status, AdjudicationStatus::Approved);
    assert_eq!(h.controller.stage(), WorkflowStage::Submitted);
    assert_eq!(h.controller.result(), Some(&result));

    assert_eq!(
        drain_stages(&mut events),
        vec![
            WorkflowStage::Form,
            WorkflowStage::Signing,
            WorkflowStage::Processing,
            WorkflowStage::Submitted,
        ]
    );

    let sent = h.registry.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, RequestKind::Initial);
    assert_eq!(sent[0].country_code.as_deref(), Some("FR"));
    assert_eq!(sent[0].value, h.controller.config().submission_fee);

    let submissions = h.backend.submissions();
    assert_eq!(submissions.len(), 1);
    let request = &submissions[0];
    assert_eq!(request.idempotency_key(), &Hash::new([1; 32]));
    assert_eq!(request.fields.document_hash, sent[0].document_hash);
    assert_eq!(request.fields.requested_level, Tier::Silver);
    assert_eq!(request.fields.face_score, Some(92));
    assert_eq!(request.fields.document_type.as_deref(), Some("national_id"));
    assert_eq!(request.files.len(), 4);

    // Adjudication only after confirmation
    let journal = h.journal.lock().unwrap().clone();
    let receipt = journal.iter().position(|e| e == "receipt").unwrap();
    let adjudicate = journal.iter().position(|e| e == "adjudicate").unwrap();
    assert!(receipt < adjudicate);

    // Guard re-read from the registry: the request is now pending
    assert!(h.controller.guard().pending().has_pending);
    assert!(!h.controller.guard().is_selectable(Tier::Diamond));
}

#[tokio::test]
async fn test_manual_review_is_not_auto_approved() {
    let response = Ok(AdjudicationResponse {
        auto_approved: false,
        status: AdjudicationStatus::Pending,
        verification_score: 95,
        requires_manual_review: true,
        message: Some("queued".into()),
    });
    let mut h = harness(Tier::None, vec![response]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;

    let result = h.controller.submit().await.unwrap();
    assert!(!result.auto_approved);
    assert_eq!(result.status, AdjudicationStatus::Pending);
}

#[tokio::test]
async fn test_chain_switch_before_sending() {
    let mut h = harness_with(Tier::None, 1, vec![approved_response(80)], |_| {});
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;
    h.controller.submit().await.unwrap();

    let journal = h.journal.lock().unwrap().clone();
    assert_eq!(journal[0], format!("switch:{}", WALLET_CHAIN));
    assert_eq!(journal[1], "send:submitKYC");
    assert_eq!(h.wallet.chain.load(Ordering::SeqCst), WALLET_CHAIN);
}

#[tokio::test]
async fn test_wallet_rejection_returns_to_form() {
    let mut h = harness_with(Tier::None, WALLET_CHAIN, vec![approved_response(80)], |registry| {
        *registry.send_error.lock().unwrap() = Some(ChainError::from_message(
            "MetaMask Tx Signature: User denied transaction signature.",
        ));
    });
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;

    let err = h.controller.submit().await.unwrap_err();
    assert_eq!(err, WorkflowError::Chain(ChainError::UserRejected));
    assert!(err.recovery_hint().contains("rejected"));
    assert_eq!(h.controller.stage(), WorkflowStage::Form);
    assert!(h.backend.submissions().is_empty());

    // The form is kept, a second attempt goes through
    h.controller.submit().await.unwrap();
    assert_eq!(h.registry.sent().len(), 1);
    assert_eq!(h.controller.stage(), WorkflowStage::Submitted);
}

#[tokio::test]
async fn test_reverted_transaction_returns_to_form() {
    let mut h = harness_with(Tier::None, WALLET_CHAIN, vec![], |registry| {
        registry.revert = true;
    });
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;

    let err = h.controller.submit().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Chain(ChainError::Reverted(_))));
    assert_eq!(h.controller.stage(), WorkflowStage::Form);
    assert!(!h.controller.has_pending_adjudication());
    assert!(h.backend.submissions().is_empty());
}

#[tokio::test]
async fn test_adjudication_retry_does_not_resend_transaction() {
    let mut h = harness(
        Tier::None,
        vec![
            Err(BackendError::Request("connection reset by peer".into())),
            approved_response(85),
        ],
    );
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Silver).unwrap();
    fill_form(&mut h.controller).await;

    let err = h.controller.submit().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Adjudication(_)));
    assert!(err.recovery_hint().contains("not be charged again"));
    assert_eq!(h.controller.stage(), WorkflowStage::Form);
    assert!(h.controller.has_pending_adjudication());
    assert_eq!(h.registry.sent().len(), 1);

    let result = h.controller.retry_adjudication().await.unwrap();
    assert_eq!(result.verification_score, 85);
    assert_eq!(h.controller.stage(), WorkflowStage::Submitted);
    assert!(!h.controller.has_pending_adjudication());

    // One payable transaction, two adjudication calls with the same key
    assert_eq!(h.registry.sent().len(), 1);
    let submissions = h.backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].idempotency_key(), submissions[1].idempotency_key());
}

#[tokio::test]
async fn test_submit_after_adjudication_failure_only_adjudicates() {
    let mut h = harness(
        Tier::None,
        vec![
            Err(BackendError::Status {
                status: 502,
                message: "bad gateway".into(),
            }),
            approved_response(75),
        ],
    );
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;

    assert!(h.controller.submit().await.is_err());
    h.controller.submit().await.unwrap();
    assert_eq!(h.registry.sent().len(), 1);
    assert_eq!(h.backend.submissions().len(), 2);
}

#[tokio::test]
async fn test_retry_without_confirmed_transaction() {
    let mut h = harness(Tier::None, vec![]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    assert_eq!(
        h.controller.retry_adjudication().await,
        Err(WorkflowError::NothingToRetry)
    );
}

#[tokio::test]
async fn test_start_over_resets_attempt() {
    let mut h = harness(Tier::None, vec![approved_response(90)]);
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;
    h.controller.submit().await.unwrap();

    h.controller.start_over().unwrap();
    assert_eq!(h.controller.stage(), WorkflowStage::Select);
    assert_eq!(h.controller.target(), None);
    assert!(h.controller.result().is_none());
    assert!(!h.controller.terms_agreed());
    assert!(h.controller.capture().document(DocumentSide::Front).is_none());
    assert!(h.controller.liveness().result().is_none());

    // Still pending on-chain until reviewed
    assert!(h.controller.select_tier(Tier::Silver).is_err());
}

#[tokio::test]
async fn test_paid_tier_is_the_only_selection_while_verification_pending() {
    let mut h = harness(
        Tier::None,
        vec![
            Err(BackendError::Request("connection reset by peer".into())),
            approved_response(80),
        ],
    );
    h.controller.refresh().await.unwrap();
    h.controller.select_tier(Tier::Bronze).unwrap();
    fill_form(&mut h.controller).await;
    assert!(h.controller.submit().await.is_err());
    assert!(h.controller.has_pending_adjudication());

    h.controller.back_to_select().unwrap();
    assert_eq!(
        h.controller.select_tier(Tier::Silver),
        Err(WorkflowError::AdjudicationPending(Tier::Bronze))
    );
    assert_eq!(h.controller.stage(), WorkflowStage::Select);

    // The registry lists the paid request as pending, it can still be resumed
    h.controller.select_tier(Tier::Bronze).unwrap();
    let result = h.controller.submit().await.unwrap();
    assert_eq!(result.verification_score, 80);

    assert_eq!(h.registry.sent().len(), 1);
    let submissions = h.backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[1].fields.requested_level, Tier::Bronze);
}
