//! The report pipeline: verdict branch, document assembly, upload,
//! registration, and email dispatch.

use crate::{
    actions::{DeliveryActions, DeliveryError},
    capture::ImagePayload,
    clock::ClockDelay,
    pdf::{self, RenderError},
    token::AccessToken,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use idscan_common::{
    messages::{email, report},
    model::VerificationResult,
};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Substituted for a missing surname, and for a date of birth that is
/// missing or still carries an OCR placeholder character.
pub const UNKNOWN: &str = "Unknown";

const REPORT_BASENAME: &str = "verification_report";

/// How long inline email feedback stays up before it is cleared.
pub const FEEDBACK_CLEAR_DELAY: Duration = Duration::from_secs(4);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report generation is already in progress")]
    GenerationInFlight,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("report could not be stored: {0}")]
    Upload(#[source] DeliveryError),

    #[error("report could not be registered: {0}")]
    Register(#[source] DeliveryError),

    #[error("storage returned a malformed report location: {0:?}")]
    MalformedLocation(String),
}

/// Where a stored, registered report can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLocation {
    pub url: Url,
    pub filename: String,
}

/// What one `generate` call concluded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Rendered, stored and registered.
    Stored(ReportLocation),
    /// The service classified the submission as not verified. Nothing is
    /// rendered or persisted for this outcome; the session surfaces guidance
    /// and a retry action instead.
    NotVerified,
}

/// Outcome of one email dispatch. Failure here never invalidates the stored
/// report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailFeedback {
    pub ok: bool,
    pub message: String,
}

/// Drives one verification result to a stored report. A report is uploaded
/// once per generate call; re-running after a failure re-uploads and
/// re-registers, with no deduplication.
#[derive(Default)]
pub struct ReportPipeline {
    generating: bool,
    location: Option<ReportLocation>,
    email_feedback: Option<EmailFeedback>,
}

impl ReportPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored report from the last successful generate call, if any.
    pub fn location(&self) -> Option<&ReportLocation> {
        self.location.as_ref()
    }

    pub fn email_feedback(&self) -> Option<&EmailFeedback> {
        self.email_feedback.as_ref()
    }

    /// Render, store and register the report for `result`. Upload and
    /// registration failures are both fatal to the attempt and surfaced the
    /// same way; the verification result itself is not lost, so the caller
    /// may retry without recapturing images.
    pub async fn generate<A: DeliveryActions>(
        &mut self,
        actions: &A,
        result: &VerificationResult,
        document_image: &ImagePayload,
        token: &AccessToken,
    ) -> Result<ReportOutcome, ReportError> {
        if self.generating {
            return Err(ReportError::GenerationInFlight);
        }
        self.generating = true;

        let outcome = self
            .run_generate(actions, result, document_image, token)
            .await;
        self.generating = false;

        if let Ok(ReportOutcome::Stored(location)) = &outcome {
            self.location = Some(location.clone());
        }
        outcome
    }

    async fn run_generate<A: DeliveryActions>(
        &mut self,
        actions: &A,
        result: &VerificationResult,
        document_image: &ImagePayload,
        token: &AccessToken,
    ) -> Result<ReportOutcome, ReportError> {
        let verdict = result.verdict();
        if !verdict.passed() {
            tracing::info!(
                status = %result.verification_status,
                "verification did not pass; no report generated"
            );
            return Ok(ReportOutcome::NotVerified);
        }

        let bytes = pdf::render_report(result, document_image, token.as_str())?;
        let filename = report_filename(result.surname(), result.date_of_birth());

        let raw_location = actions
            .store_document(&STANDARD.encode(&bytes), &filename, verdict)
            .await
            .map_err(ReportError::Upload)?;

        actions
            .register_report(&report::RegisterReportRequest {
                last_name: surname_or_unknown(result.surname()).to_string(),
                dob: dob_or_unknown(result.date_of_birth()).to_string(),
                file_name: filename.clone(),
                report_url: raw_location.clone(),
                verification_status: verdict.status_label().to_string(),
            })
            .await
            .map_err(ReportError::Register)?;

        let url = validate_location(&raw_location)?;
        tracing::info!(%url, filename = %filename, "report stored and registered");

        Ok(ReportOutcome::Stored(ReportLocation { url, filename }))
    }

    /// Email the registered report. Repeatable on demand; the configured
    /// internal recipient is always included and `recipient` is the user's
    /// optional address. The feedback is held for inline display until
    /// [`Self::settle_email_feedback`] clears it.
    pub async fn email<A: DeliveryActions>(
        &mut self,
        actions: &A,
        recipient: Option<&str>,
        subject: &email::SubjectFields,
        location: &ReportLocation,
    ) -> EmailFeedback {
        let feedback = match actions
            .send_email(subject, location.url.as_str(), recipient)
            .await
        {
            Ok(()) => EmailFeedback {
                ok: true,
                message: "Report sent".to_string(),
            },
            Err(error) => {
                tracing::warn!(%error, "email dispatch failed");
                EmailFeedback {
                    ok: false,
                    message: "The report could not be emailed. Please try again.".to_string(),
                }
            }
        };

        self.email_feedback = Some(feedback.clone());
        feedback
    }

    /// Clear the inline feedback after the standard pause. The stored report
    /// is untouched either way.
    pub async fn settle_email_feedback<D: ClockDelay>(&mut self, delay: &D) {
        delay.delay(FEEDBACK_CLEAR_DELAY).await;
        self.email_feedback = None;
    }
}

fn surname_or_unknown(surname: Option<&str>) -> &str {
    match surname {
        Some(surname) if !surname.is_empty() => surname,
        _ => UNKNOWN,
    }
}

fn dob_or_unknown(dob: Option<&str>) -> &str {
    match dob {
        Some(dob) if !dob.is_empty() && !dob.contains('?') => dob,
        _ => UNKNOWN,
    }
}

/// Object key for a stored report, `{surname}_{dob}_verification_report`.
pub fn report_filename(surname: Option<&str>, dob: Option<&str>) -> String {
    format!(
        "{}_{}_{REPORT_BASENAME}",
        surname_or_unknown(surname),
        dob_or_unknown(dob)
    )
}

/// A report location must be a well-formed absolute http(s) URL before it is
/// exposed; anything else fails the generation attempt even though the
/// upload nominally succeeded.
fn validate_location(raw: &str) -> Result<Url, ReportError> {
    let url =
        Url::parse(raw).map_err(|_| ReportError::MalformedLocation(raw.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ReportError::MalformedLocation(raw.to_string()));
    }

    Ok(url)
}
