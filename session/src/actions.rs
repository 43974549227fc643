//! Thin, stateless wrappers over the network calls the session and the
//! report pipeline depend on.

use idscan_common::{
    config::CommonConfiguration,
    messages::{ErrorBody, email, report, storage, token, verify},
    model::{VerificationResult, Verdict},
};
use reqwest::{Client, Response};
use thiserror::Error;

/// Failure of one delivery call, converted at the call site. Never escapes
/// as an unhandled transport error.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned status {status}")]
    Status {
        status: u16,
        /// Server-supplied reason, when the error body carried one.
        message: Option<String>,
    },
}

impl DeliveryError {
    /// The server-supplied message, if this failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            DeliveryError::Status {
                message: Some(message),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

/// The five network calls consumed by the session and the report pipeline.
#[allow(async_fn_in_trait)]
pub trait DeliveryActions {
    /// Resolve a one-time token to its product entitlement.
    async fn lookup_token(&self, raw_token: &str) -> Result<token::TokenRecord, DeliveryError>;

    /// Submit both images to the verification service. The images travel as
    /// data URLs; the fixed client identifier rides along.
    async fn verify(
        &self,
        document: &str,
        portrait: &str,
    ) -> Result<VerificationResult, DeliveryError>;

    /// Persist a rendered report, returning its location.
    async fn store_document(
        &self,
        pdf_base64: &str,
        filename: &str,
        verdict: Verdict,
    ) -> Result<String, DeliveryError>;

    /// Register a stored report with the system of record.
    async fn register_report(
        &self,
        registration: &report::RegisterReportRequest,
    ) -> Result<(), DeliveryError>;

    /// Dispatch the report email. The configured internal recipient is always
    /// included; `extra_recipient` is a user-supplied address, if any.
    async fn send_email(
        &self,
        subject: &email::SubjectFields,
        report_url: &str,
        extra_recipient: Option<&str>,
    ) -> Result<(), DeliveryError>;
}

/// [`DeliveryActions`] over HTTP, against the endpoints named in the
/// configuration file.
#[derive(Clone, Debug)]
pub struct HttpDeliveryActions {
    client: Client,
    config: CommonConfiguration,
}

impl HttpDeliveryActions {
    pub fn new(client: Client, config: CommonConfiguration) -> Self {
        Self { client, config }
    }

    /// Decode a non-2xx response into a typed failure, keeping the server's
    /// message when the error body has one.
    async fn error_for(response: Response) -> DeliveryError {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .map(|body| body.message);

        DeliveryError::Status { status, message }
    }
}

impl DeliveryActions for HttpDeliveryActions {
    async fn lookup_token(&self, raw_token: &str) -> Result<token::TokenRecord, DeliveryError> {
        let response = self
            .client
            .get(&self.config.token_url)
            .query(&[("token", raw_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(response.json().await?)
    }

    async fn verify(
        &self,
        document: &str,
        portrait: &str,
    ) -> Result<VerificationResult, DeliveryError> {
        let request = verify::VerifyRequest {
            document: document.to_string(),
            portrait: portrait.to_string(),
            client_id: self.config.client_id.clone(),
        };

        let response = self
            .client
            .post(&self.config.verify_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(response.json().await?)
    }

    async fn store_document(
        &self,
        pdf_base64: &str,
        filename: &str,
        verdict: Verdict,
    ) -> Result<String, DeliveryError> {
        let request = storage::StoreDocumentRequest {
            pdf_file: pdf_base64.to_string(),
            file_name: filename.to_string(),
            verification_passed: verdict.passed(),
        };

        let response = self
            .client
            .post(&self.config.store_document_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let stored: storage::StoreDocumentResponse = response.json().await?;
        tracing::info!(filename, "report stored");

        Ok(stored.location)
    }

    async fn register_report(
        &self,
        registration: &report::RegisterReportRequest,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.config.register_report_url)
            .json(registration)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(())
    }

    async fn send_email(
        &self,
        subject: &email::SubjectFields,
        report_url: &str,
        extra_recipient: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let mut recipients = Vec::from([self.config.internal_recipient.clone()]);
        if let Some(extra) = extra_recipient {
            recipients.push(extra.to_string());
        }

        let request = email::SendEmailRequest {
            user_details: subject.clone(),
            report_url: report_url.to_string(),
            recipients,
        };

        let response = self
            .client
            .post(&self.config.send_email_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(())
    }
}
