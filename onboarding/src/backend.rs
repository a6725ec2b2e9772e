// Verification backend client
// Country list, recorded status and the multipart adjudication call

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, trace};
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use tierpass_common::{
    api::{
        file_parts, AdjudicationResponse, Country, ErrorResponse, StatusResponse,
        SubmissionFields, COUNTRIES_PATH, IDEMPOTENCY_KEY_HEADER, STATUS_PATH, SUBMIT_PATH,
    },
    crypto::{Address, Hash},
};

use crate::{capture::CapturedFile, error::BackendError};

/// Everything sent to the adjudicator for one confirmed tier request
#[derive(Debug, Clone)]
pub struct AdjudicationRequest {
    pub fields: SubmissionFields,
    /// `(part name, file)`, see `file_parts`
    pub files: Vec<(&'static str, CapturedFile)>,
}

impl AdjudicationRequest {
    pub fn new(fields: SubmissionFields) -> Self {
        Self {
            fields,
            files: Vec::new(),
        }
    }

    /// Attach a file when present
    pub fn with_file(mut self, part: &'static str, file: Option<&CapturedFile>) -> Self {
        if let Some(file) = file {
            self.files.push((part, file.clone()));
        }
        self
    }

    /// The confirmed transaction hash, one adjudication per payment
    pub fn idempotency_key(&self) -> &Hash {
        &self.fields.tx_hash
    }

    pub fn has_file(&self, part: &str) -> bool {
        self.files.iter().any(|(name, _)| *name == part)
    }

    fn to_form(&self) -> Result<Form, BackendError> {
        let mut form = Form::new();
        let fields = self
            .fields
            .to_text_fields()
            .map_err(|e| BackendError::Encoding(e.to_string()))?;
        for (name, value) in fields {
            form = form.text(name, value);
        }

        for (name, file) in &self.files {
            let part = Part::bytes(file.bytes().to_vec())
                .file_name(file.file_name().to_owned())
                .mime_str(file.mime_type())
                .map_err(|e| BackendError::Encoding(e.to_string()))?;
            form = form.part(*name, part);
        }
        Ok(form)
    }
}

#[async_trait]
pub trait KycBackend: Send + Sync {
    /// `GET /api/kyc/countries`
    async fn get_countries(&self) -> Result<Vec<Country>, BackendError>;

    /// `GET /api/kyc/status/{address}`
    async fn get_status(&self, address: &Address) -> Result<StatusResponse, BackendError>;

    /// `POST /api/kyc/submit`
    /// Must be safe to repeat with the same idempotency key
    async fn submit(&self, request: &AdjudicationRequest)
        -> Result<AdjudicationResponse, BackendError>;
}

/// HTTP implementation of `KycBackend`
pub struct BackendApi {
    client: Client,
    base_url: String,
}

impl BackendApi {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn status_url(&self, address: &Address) -> String {
        format!("{}/{}", self.url(STATUS_PATH), address.to_hex())
    }

    // Map non-success responses, using the error payload when there is one
    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                error,
                details: Some(details),
            }) => format!("{} ({})", error, details),
            Ok(ErrorResponse { error, .. }) => error,
            Err(_) if body.is_empty() => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned(),
            Err(_) => body,
        };
        Err(BackendError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl KycBackend for BackendApi {
    async fn get_countries(&self) -> Result<Vec<Country>, BackendError> {
        let response = self.client.get(self.url(COUNTRIES_PATH)).send().await?;
        let countries = Self::check(response).await?.json().await?;
        Ok(countries)
    }

    async fn get_status(&self, address: &Address) -> Result<StatusResponse, BackendError> {
        let url = self.status_url(address);
        if log::log_enabled!(log::Level::Trace) {
            trace!("GET {}", url);
        }
        let response = self.client.get(url).send().await?;
        let status = Self::check(response).await?.json().await?;
        Ok(status)
    }

    async fn submit(
        &self,
        request: &AdjudicationRequest,
    ) -> Result<AdjudicationResponse, BackendError> {
        let form = request.to_form()?;
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Submitting verification for {} (tier {}, {} files, key {})",
                request.fields.wallet_address,
                request.fields.requested_level,
                request.files.len(),
                request.idempotency_key()
            );
        }

        let response = self
            .client
            .post(self.url(SUBMIT_PATH))
            .header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key().to_hex())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Error while sending verification request: {}", e);
                BackendError::from(e)
            })?;

        let adjudication = Self::check(response).await?.json().await?;
        Ok(adjudication)
    }
}

/// Collect the optional files of a submission, in part order
pub fn submission_files<'a>(
    front: Option<&'a CapturedFile>,
    back: Option<&'a CapturedFile>,
    selfie: Option<&'a CapturedFile>,
    address_proof: Option<&'a CapturedFile>,
    accredited_proof: Option<&'a CapturedFile>,
) -> [(&'static str, Option<&'a CapturedFile>); 5] {
    [
        (file_parts::DOCUMENT_FRONT, front),
        (file_parts::DOCUMENT_BACK, back),
        (file_parts::SELFIE, selfie),
        (file_parts::ADDRESS_PROOF, address_proof),
        (file_parts::ACCREDITED_PROOF, accredited_proof),
    ]
}
