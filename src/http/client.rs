use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::signup::error::ServiceError;
use crate::signup::submission::RegistrationPayload;
use crate::signup::traits::RegistrationService;
use crate::signup::types::{Participant, VerificationToken};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON client for the race registration API
#[derive(Debug, Clone)]
pub struct HttpRegistrationService {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CodeRequest<'a> {
    phone: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    phone: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verification_token: VerificationToken,
}

/// Error body shape used by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpRegistrationService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ServiceError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        self.http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(url = %url, "Registration API timed out");
                } else {
                    warn!(url = %url, error = %e, "Registration API unreachable");
                }
                ServiceError::Unavailable { message: None }
            })
    }
}

/// Map a non-success response, surfacing the API's `message` when present
async fn error_from_response(response: Response) -> ServiceError {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.trim().is_empty());

    warn!(status = %status, message = ?message, "Registration API rejected the request");
    match message {
        Some(message) if status.is_client_error() => ServiceError::Validation { message },
        message => ServiceError::Unavailable { message },
    }
}

fn is_code_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::UNPROCESSABLE_ENTITY
    )
}

#[async_trait]
impl RegistrationService for HttpRegistrationService {
    async fn request_code(&self, phone: &str) -> Result<(), ServiceError> {
        let response = self.post("auth/code", &CodeRequest { phone }).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    async fn verify_code(&self, phone: &str, code: &str) -> Result<VerificationToken, ServiceError> {
        let response = self.post("auth/verify", &VerifyRequest { phone, code }).await?;
        let status = response.status();
        if is_code_rejection(status) {
            return Err(ServiceError::InvalidCode);
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let body: VerifyResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Malformed verification response");
            ServiceError::Unavailable { message: None }
        })?;
        Ok(body.verification_token)
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<Participant, ServiceError> {
        let response = self.post("participants", payload).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response.json::<Participant>().await.map_err(|e| {
            warn!(error = %e, "Malformed registration response");
            ServiceError::Unavailable { message: None }
        })
    }
}
