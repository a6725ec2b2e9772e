// Onboarding workflow
// select -> form -> signing -> processing -> submitted
//
// The controller is the only place where the workflow stage changes and
// where transactions and backend calls are issued. Evidence is owned by the
// capture pipeline and the liveness orchestrator, the controller forwards
// user actions to them and reads their state when submitting.
//
// Ordering:
// - the adjudication call is only issued once the tier request transaction
//   is confirmed
// - the pending-request guard is refreshed after confirmation and after
//   adjudication, never speculatively
// - a confirmed transaction is never sent twice: after a backend failure
//   the prepared adjudication request is kept and re-sent as is

use std::{fmt, sync::Arc};

use futures::join;
use log::{debug, error, info, warn};
use serde::Serialize;
use tierpass_common::{
    api::SubmissionFields,
    contract::TransactionReceipt,
    crypto::{Address, Hash},
    kyc::{
        outstanding_requirements, reconcile_submission, upgrade_plan, EvidenceCategory,
        EvidenceFlags, LivenessResult, SubmissionResult, Tier, UpgradeRequirement,
        ValidationResult,
    },
    time::today,
};
use tokio::sync::broadcast;

use crate::{
    backend::{submission_files, AdjudicationRequest, KycBackend},
    capture::{CapturePipeline, CapturedFile, DocumentSide, DocumentType, FaceDetection},
    chain::{
        build_tier_request, ensure_chain, wait_for_confirmation, KycContract, WalletConnection,
    },
    config::OnboardingConfig,
    countries::CountryDirectory,
    error::{ChainError, FormError, ValidationError, WorkflowError},
    guard::{AccountSnapshot, PendingRequestGuard},
    liveness::LivenessOrchestrator,
    oracle::{DocumentVerifier, FaceDetector, ImageCodec, LivenessChallenge},
    personal::PersonalInfo,
};

// Events buffered per subscriber before the oldest are dropped
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStage {
    #[default]
    Select,
    Form,
    Signing,
    Processing,
    Submitted,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Select => "select",
            WorkflowStage::Form => "form",
            WorkflowStage::Signing => "signing",
            WorkflowStage::Processing => "processing",
            WorkflowStage::Submitted => "submitted",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications for the interaction layer
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StageChanged {
        from: WorkflowStage,
        to: WorkflowStage,
    },
    AccountRefreshed(AccountSnapshot),
    TransactionSent(Hash),
    TransactionConfirmed(TransactionReceipt),
    /// User-facing message and recovery hint
    Error {
        message: String,
        hint: String,
    },
    Submitted(SubmissionResult),
}

/// External services used by the controller
#[derive(Clone)]
pub struct Collaborators {
    pub wallet: Arc<dyn WalletConnection>,
    pub contract: Arc<dyn KycContract>,
    pub backend: Arc<dyn KycBackend>,
    pub documents: Arc<dyn DocumentVerifier>,
    pub faces: Arc<dyn FaceDetector>,
    pub images: Arc<dyn ImageCodec>,
    pub liveness: Arc<dyn LivenessChallenge>,
}

// Adjudication prepared for a confirmed transaction
#[derive(Debug, Clone)]
struct PendingAdjudication {
    receipt: TransactionReceipt,
    request: AdjudicationRequest,
}

pub struct OnboardingController {
    config: OnboardingConfig,
    services: Collaborators,
    stage: WorkflowStage,
    target: Option<Tier>,
    account: Option<Address>,
    guard: PendingRequestGuard,
    countries: CountryDirectory,
    personal: PersonalInfo,
    capture: CapturePipeline,
    liveness: LivenessOrchestrator,
    terms_agreed: bool,
    pending_adjudication: Option<PendingAdjudication>,
    last_error: Option<WorkflowError>,
    result: Option<SubmissionResult>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl OnboardingController {
    pub fn new(config: OnboardingConfig, services: Collaborators) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            services,
            stage: WorkflowStage::Select,
            target: None,
            account: None,
            guard: PendingRequestGuard::new(),
            countries: CountryDirectory::fallback(),
            personal: PersonalInfo::default(),
            capture: CapturePipeline::new(),
            liveness: LivenessOrchestrator::new(),
            terms_agreed: false,
            pending_adjudication: None,
            last_error: None,
            result: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WorkflowEvent) {
        // No subscriber is not an error
        let _ = self.events.send(event);
    }

    fn set_stage(&mut self, to: WorkflowStage) {
        let from = self.stage;
        if from == to {
            return;
        }

        info!("Workflow stage {} -> {}", from, to);
        self.stage = to;
        self.emit(WorkflowEvent::StageChanged { from, to });
    }

    // Record the error, go back to the form and hand the error back
    fn fail<T>(&mut self, err: WorkflowError) -> Result<T, WorkflowError> {
        error!("Submission failed in stage {}: {}", self.stage, err);
        self.emit(WorkflowEvent::Error {
            message: err.to_string(),
            hint: err.recovery_hint(),
        });
        self.last_error = Some(err.clone());
        self.set_stage(WorkflowStage::Form);
        Err(err)
    }

    fn ensure_stage(&self, expected: WorkflowStage) -> Result<(), WorkflowError> {
        if self.stage != expected {
            return Err(WorkflowError::InvalidStage(self.stage));
        }
        Ok(())
    }

    // Per-attempt evidence, kept separate from the personal details
    fn reset_attempt(&mut self) {
        self.capture.reset();
        self.liveness.reset();
        self.terms_agreed = false;
        self.last_error = None;
        self.result = None;
    }

    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn target(&self) -> Option<Tier> {
        self.target
    }

    pub fn account(&self) -> Option<&Address> {
        self.account.as_ref()
    }

    pub fn guard(&self) -> &PendingRequestGuard {
        &self.guard
    }

    pub fn approved_tier(&self) -> Tier {
        self.guard.approved_tier()
    }

    pub fn countries(&self) -> &CountryDirectory {
        &self.countries
    }

    pub fn personal(&self) -> &PersonalInfo {
        &self.personal
    }

    pub fn capture(&self) -> &CapturePipeline {
        &self.capture
    }

    pub fn liveness(&self) -> &LivenessOrchestrator {
        &self.liveness
    }

    pub fn terms_agreed(&self) -> bool {
        self.terms_agreed
    }

    pub fn last_error(&self) -> Option<&WorkflowError> {
        self.last_error.as_ref()
    }

    pub fn result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    /// A confirmed transaction is waiting for its adjudication
    pub fn has_pending_adjudication(&self) -> bool {
        self.pending_adjudication.is_some()
    }

    /// Requirements of the selected tier, annotated with carry-forward
    /// Recomputed on every call from the current approved tier
    pub fn requirements(&self) -> Vec<UpgradeRequirement> {
        match self.target {
            Some(target) => upgrade_plan(self.approved_tier(), target),
            None => Vec::new(),
        }
    }

    /// Categories still to be collected for the selected tier
    pub fn outstanding(&self) -> EvidenceFlags {
        match self.target {
            Some(target) => outstanding_requirements(self.approved_tier(), target),
            None => EvidenceFlags::empty(),
        }
    }

    pub fn requires(&self, category: EvidenceCategory) -> bool {
        self.outstanding().contains(category)
    }

    /// Load the connected account, its registry state and the country list
    pub async fn refresh(&mut self) -> Result<&AccountSnapshot, WorkflowError> {
        let address = self.services.wallet.address().await?;
        self.account = Some(address);

        let backend = self.services.backend.as_ref();
        let contract = self.services.contract.as_ref();
        let (countries, snapshot) = join!(
            CountryDirectory::load(backend),
            self.guard.refresh(contract, backend, &address)
        );
        self.countries = countries;
        let snapshot = snapshot?.clone();
        self.emit(WorkflowEvent::AccountRefreshed(snapshot));

        self.guard.snapshot().ok_or(WorkflowError::AccountNotLoaded)
    }

    // Re-read the registry after a confirmation, failures are only logged
    async fn refresh_account(&mut self) {
        let Some(address) = self.account else {
            return;
        };

        let refreshed = self
            .guard
            .refresh(
                self.services.contract.as_ref(),
                self.services.backend.as_ref(),
                &address,
            )
            .await
            .map(|snapshot| snapshot.clone());
        match refreshed {
            Ok(snapshot) => self.emit(WorkflowEvent::AccountRefreshed(snapshot)),
            Err(e) => warn!("Error while refreshing account {}: {}", address, e),
        }
    }

    /// select -> form
    ///
    /// Refused while any request is pending or when `target` is not above the
    /// approved tier. While a confirmed payment awaits its verification only
    /// the paid tier can be selected. A refused selection does not change the
    /// stage.
    pub fn select_tier(&mut self, target: Tier) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Select)?;
        if !self.guard.is_refreshed() {
            return Err(WorkflowError::AccountNotLoaded);
        }
        // A confirmed payment is bound to the tier it was made for. The
        // registry lists it as pending, so the guard is not consulted for it.
        match self.pending_adjudication.as_ref() {
            Some(pending) => {
                let paid = pending.request.fields.requested_level;
                if paid != target {
                    return Err(WorkflowError::AdjudicationPending(paid));
                }
            }
            None => self.guard.check_selectable(target)?,
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Tier {} selected from {}, outstanding: {}",
                target,
                self.approved_tier(),
                outstanding_requirements(self.approved_tier(), target)
            );
        }
        self.target = Some(target);
        self.set_stage(WorkflowStage::Form);
        Ok(())
    }

    /// form -> select, discarding the evidence of this attempt
    pub fn back_to_select(&mut self) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.enter_select();
        Ok(())
    }

    /// submitted -> select
    pub fn start_over(&mut self) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Submitted)?;
        self.enter_select();
        Ok(())
    }

    fn enter_select(&mut self) {
        self.reset_attempt();
        self.target = None;
        self.set_stage(WorkflowStage::Select);
    }

    pub fn set_personal_info(&mut self, personal: PersonalInfo) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.personal = personal;
        Ok(())
    }

    pub fn set_terms_agreed(&mut self, agreed: bool) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.terms_agreed = agreed;
        Ok(())
    }

    pub fn change_document_type(&mut self, document_type: DocumentType) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.capture.change_document_type(document_type);
        Ok(())
    }

    pub fn capture_document(
        &mut self,
        side: DocumentSide,
        file: CapturedFile,
    ) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.capture.capture_document(side, file)?;
        Ok(())
    }

    pub fn remove_document(&mut self, side: DocumentSide) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.capture.remove_document(side);
        Ok(())
    }

    pub fn rotate_document(&mut self, side: DocumentSide) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.capture.rotate(side, self.services.images.as_ref())?;
        Ok(())
    }

    pub fn can_validate(&self) -> bool {
        self.stage == WorkflowStage::Form && self.capture.can_validate(&self.personal)
    }

    /// Run the document oracle on the captured sides
    pub async fn validate_document(&mut self) -> Result<ValidationResult, WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        let result = self
            .capture
            .validate(self.services.documents.as_ref(), &self.personal)
            .await?;
        Ok(result.clone())
    }

    pub async fn upload_selfie(&mut self, file: CapturedFile) -> Result<FaceDetection, WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        let detection = self
            .capture
            .upload_selfie(file, self.services.faces.as_ref())
            .await?;
        Ok(detection)
    }

    pub fn set_address_proof(&mut self, file: Option<CapturedFile>) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.capture.set_address_proof(file);
        Ok(())
    }

    pub fn set_accredited_proof(&mut self, file: Option<CapturedFile>) -> Result<(), WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        self.capture.set_accredited_proof(file);
        Ok(())
    }

    /// Open the liveness sub-flow and wait for it to complete or be dismissed
    pub async fn run_liveness(&mut self) -> Result<Option<LivenessResult>, WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        Ok(self.liveness.run(self.services.liveness.as_ref()).await)
    }

    /// Checks run before anything is signed, in display order
    ///
    /// Personal details are always checked since they are sent with every
    /// request. Evidence categories are only checked while outstanding for
    /// the selected tier.
    pub fn check_form(&self) -> Result<(), FormError> {
        let outstanding = self.outstanding();

        self.personal.check(&self.countries, today())?;

        if outstanding.contains(EvidenceCategory::IdDocument) {
            if self.capture.document(DocumentSide::Front).is_none() {
                return Err(FormError::MissingDocumentFront);
            }
            if !self.capture.has_document() {
                return Err(FormError::MissingDocumentBack);
            }
            if let Some(result) = self.capture.validation() {
                if !result.is_valid {
                    return Err(FormError::DocumentInvalid);
                }
                if let Some(ValidationError::Failed { .. }) = self.capture.validation_error() {
                    return Err(FormError::DocumentInvalid);
                }
            }
            if let Some(ValidationError::RetriesExhausted { .. }) = self.capture.validation_error() {
                return Err(FormError::DocumentInvalid);
            }
        }

        if outstanding.contains(EvidenceCategory::Selfie) {
            match self.capture.face_detection() {
                FaceDetection::Success { .. } => {}
                FaceDetection::Failed => return Err(FormError::SelfieNotVerified),
                FaceDetection::Idle | FaceDetection::Detecting => {
                    return Err(FormError::SelfieRequired)
                }
            }
        }

        if outstanding.contains(EvidenceCategory::Liveness) {
            match self.liveness.result() {
                None => return Err(FormError::LivenessRequired),
                Some(result) if !result.passed => return Err(FormError::LivenessFailed),
                Some(_) => {}
            }
        }

        if outstanding.contains(EvidenceCategory::AddressProof)
            && self.capture.address_proof().is_none()
        {
            return Err(FormError::AddressProofRequired);
        }

        if outstanding.contains(EvidenceCategory::AccreditedProof)
            && self.capture.accredited_proof().is_none()
        {
            return Err(FormError::AccreditedProofRequired);
        }

        if !self.terms_agreed {
            return Err(FormError::TermsNotAccepted);
        }
        Ok(())
    }

    /// form -> signing -> processing -> submitted
    ///
    /// Any failure returns to `form`. When a previous attempt already has a
    /// confirmed transaction, only the adjudication is re-issued.
    pub async fn submit(&mut self) -> Result<SubmissionResult, WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        if let Some(pending) = self.pending_adjudication.as_ref() {
            let paid = pending.request.fields.requested_level;
            if self.target != Some(paid) {
                return self.fail(WorkflowError::AdjudicationPending(paid));
            }
            info!("Transaction already confirmed, re-sending the verification request only");
            return self.adjudicate().await;
        }

        let (target, from) = match (self.target, self.account) {
            (Some(target), Some(from)) => (target, from),
            (None, _) => return Err(WorkflowError::InvalidStage(self.stage)),
            (_, None) => return Err(WorkflowError::AccountNotLoaded),
        };

        if let Err(e) = self.check_form() {
            return self.fail(e.into());
        }
        // Guard state from the last chain read
        if let Err(e) = self.guard.check_selectable(target) {
            return self.fail(e.into());
        }

        self.last_error = None;
        let document_hash = self.capture.document_hash(&self.personal);

        self.set_stage(WorkflowStage::Signing);
        let tx_hash = match self.send_tier_request(from, target, document_hash.clone()).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => return self.fail(e.into()),
        };

        info!("Tier request sent in transaction {}", tx_hash);
        self.emit(WorkflowEvent::TransactionSent(tx_hash.clone()));
        self.set_stage(WorkflowStage::Processing);

        let receipt = match wait_for_confirmation(
            self.services.contract.as_ref(),
            &tx_hash,
            self.config.confirmation_timeout,
            self.config.confirmation_poll_interval,
        )
        .await
        {
            Ok(receipt) => receipt,
            Err(e) => return self.fail(e.into()),
        };
        self.emit(WorkflowEvent::TransactionConfirmed(receipt.clone()));

        let request = self.adjudication_request(from, target, tx_hash, document_hash);
        self.pending_adjudication = Some(PendingAdjudication { receipt, request });

        self.refresh_account().await;
        self.adjudicate().await
    }

    /// Re-send the verification request of a confirmed transaction
    /// No transaction is sent
    pub async fn retry_adjudication(&mut self) -> Result<SubmissionResult, WorkflowError> {
        self.ensure_stage(WorkflowStage::Form)?;
        if self.pending_adjudication.is_none() {
            return Err(WorkflowError::NothingToRetry);
        }
        self.adjudicate().await
    }

    async fn send_tier_request(
        &self,
        from: Address,
        target: Tier,
        document_hash: Hash,
    ) -> Result<Hash, ChainError> {
        ensure_chain(self.services.wallet.as_ref(), self.config.chain_id).await?;

        let call = build_tier_request(
            self.approved_tier(),
            target,
            document_hash,
            &self.personal.country,
            &self.config,
        );
        if log::log_enabled!(log::Level::Info) {
            info!(
                "Calling {} for tier {} with a fee of {}",
                call.kind.method_name(),
                call.level,
                call.value
            );
        }
        self.services.contract.send_tier_request(&from, &call).await
    }

    fn adjudication_request(
        &self,
        from: Address,
        target: Tier,
        tx_hash: Hash,
        document_hash: Hash,
    ) -> AdjudicationRequest {
        let capture = &self.capture;
        let fields = SubmissionFields {
            wallet_address: from,
            requested_level: target,
            current_level: self.approved_tier(),
            chain_id: self.config.chain_id,
            tx_hash,
            document_hash,
            full_name: self.personal.full_name().to_owned(),
            date_of_birth: self.personal.date_of_birth_string(),
            country: self.personal.country.trim().to_ascii_uppercase(),
            nationality: self.personal.nationality.clone(),
            document_number: self.personal.document_number.clone(),
            residential_address: self.personal.residential_address.clone(),
            document_type: capture
                .document(DocumentSide::Front)
                .map(|_| capture.document_type().as_str().to_owned()),
            face_score: capture.face_detection().score(),
            validation_result: capture.validation().cloned(),
            liveness_result: self.liveness.result().copied(),
        };

        submission_files(
            capture.document(DocumentSide::Front),
            capture.document(DocumentSide::Back),
            capture.selfie(),
            capture.address_proof(),
            capture.accredited_proof(),
        )
        .into_iter()
        .fold(AdjudicationRequest::new(fields), |request, (part, file)| {
            request.with_file(part, file)
        })
    }

    // processing -> submitted, or back to form keeping the confirmed request
    async fn adjudicate(&mut self) -> Result<SubmissionResult, WorkflowError> {
        let pending = match self.pending_adjudication.clone() {
            Some(pending) => pending,
            None => return Err(WorkflowError::NothingToRetry),
        };

        self.last_error = None;
        self.set_stage(WorkflowStage::Processing);
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Requesting adjudication for transaction {} (block {})",
                pending.receipt.tx_hash, pending.receipt.block_number
            );
        }

        let response = match self.services.backend.submit(&pending.request).await {
            Ok(response) => response,
            Err(e) => return self.fail(WorkflowError::Adjudication(e)),
        };

        let result = reconcile_submission(
            &response,
            pending.request.fields.validation_result.as_ref(),
            self.config.auto_approve_threshold,
        );
        if log::log_enabled!(log::Level::Info) {
            info!(
                "Verification {} with score {} (auto approved: {})",
                result.status, result.verification_score, result.auto_approved
            );
        }

        self.pending_adjudication = None;
        self.result = Some(result);
        self.set_stage(WorkflowStage::Submitted);
        self.emit(WorkflowEvent::Submitted(result));

        self.refresh_account().await;
        Ok(result)
    }
}
