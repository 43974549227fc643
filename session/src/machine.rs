//! The verification session state machine: two capture steps, a guarded
//! submission, and the pass/fail landing state.

use crate::{
    actions::{DeliveryActions, DeliveryError},
    capture::{
        CAPTURE_PREVIEW_PAUSE, CaptureController, CaptureError, CaptureStage, DeviceClass,
        FileReader, ImagePayload,
    },
    clock::ClockDelay,
    token::AccessToken,
};
use idscan_common::model::VerificationResult;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Shown when the verify call fails without a server-supplied reason.
pub const GENERIC_VERIFY_ERROR: &str = "Something went wrong. Please try again later.";

/// Where a session currently stands.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    /// Step 1: waiting for the ID document image.
    Start,
    /// Step 2: document stored, waiting for the portrait image.
    AwaitPortrait,
    /// Both images are with the verification service.
    Submitting,
    /// Step 3: the service answered. Both verdicts land here; presentation
    /// branches on the verdict, not on this state.
    Result(VerificationResult),
    /// The verify call itself failed. Recovery is an explicit start-over.
    Failed { message: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("document capture is only offered at the first step")]
    DocumentStepDone,

    #[error("portrait capture requires a document image first")]
    PortraitStepNotReached,

    #[error("both images must be captured before submitting")]
    NotReadyToSubmit,

    #[error("a submission is already in flight")]
    SubmissionInFlight,
}

/// How a submission completion was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionDisposition {
    Applied,
    /// The session was reset while the call was outstanding; the late
    /// response was discarded rather than applied to fresh state.
    Stale,
}

/// Handle for one in-flight submission. Carries the attempt marker that lets
/// a late completion be recognized as stale.
#[derive(Debug)]
pub struct SubmissionTicket {
    attempt: u64,
    pub document: ImagePayload,
    pub portrait: ImagePayload,
}

/// Acquisition source for one capture step.
pub enum CaptureSource<'a> {
    /// Grab a still from the stream the controller holds open.
    LiveCamera,
    /// Read an existing file through the injected reader.
    FileInput {
        reader: &'a dyn FileReader,
        path: &'a Path,
    },
}

/// One user's capture-verify flow, alive for the lifetime of one tab or one
/// CLI invocation. Nothing here survives a restart.
pub struct VerificationSession {
    token: AccessToken,
    capture: CaptureController,
    state: SessionState,
    attempt: u64,
}

impl VerificationSession {
    pub fn new(token: AccessToken, device_class: DeviceClass) -> Self {
        Self {
            token,
            capture: CaptureController::new(device_class),
            state: SessionState::Start,
            attempt: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CaptureController {
        &mut self.capture
    }

    pub fn document_image(&self) -> Option<&ImagePayload> {
        self.capture.document_image()
    }

    /// Acquire the ID document image, pause for the preview, and advance to
    /// the portrait step.
    pub async fn acquire_document<D: ClockDelay>(
        &mut self,
        source: CaptureSource<'_>,
        delay: &D,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Start {
            return Err(SessionError::DocumentStepDone);
        }

        self.acquire(source, CaptureStage::Document)?;
        delay.delay(CAPTURE_PREVIEW_PAUSE).await;

        self.state = SessionState::AwaitPortrait;
        tracing::info!("document captured; awaiting portrait");
        Ok(())
    }

    /// Acquire the portrait image. The step does not advance further; with
    /// both images present the submit action becomes available.
    pub async fn acquire_portrait<D: ClockDelay>(
        &mut self,
        source: CaptureSource<'_>,
        delay: &D,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitPortrait {
            return Err(SessionError::PortraitStepNotReached);
        }

        self.acquire(source, CaptureStage::Portrait)?;
        delay.delay(CAPTURE_PREVIEW_PAUSE).await;

        tracing::info!("portrait captured; ready to submit");
        Ok(())
    }

    fn acquire(
        &mut self,
        source: CaptureSource<'_>,
        stage: CaptureStage,
    ) -> Result<ImagePayload, SessionError> {
        let payload = match source {
            CaptureSource::LiveCamera => self.capture.capture_frame(stage)?,
            CaptureSource::FileInput { reader, path } => {
                self.capture.upload_file(reader, path, stage)?
            }
        };
        Ok(payload)
    }

    /// Whether the submit action may be offered. Never true with either
    /// image missing.
    pub fn can_submit(&self) -> bool {
        self.state == SessionState::AwaitPortrait && self.capture.both_present()
    }

    /// Start a submission: flip to `Submitting` and hand back the images and
    /// the attempt marker. A second call while one is outstanding fails, so
    /// the submit action cannot be double-fired.
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket, SessionError> {
        if self.state == SessionState::Submitting {
            return Err(SessionError::SubmissionInFlight);
        }
        if !self.can_submit() {
            return Err(SessionError::NotReadyToSubmit);
        }

        let document = self
            .capture
            .document_image()
            .cloned()
            .ok_or(SessionError::NotReadyToSubmit)?;
        let portrait = self
            .capture
            .portrait_image()
            .cloned()
            .ok_or(SessionError::NotReadyToSubmit)?;

        self.state = SessionState::Submitting;
        tracing::info!(attempt = self.attempt, "submitting for verification");

        Ok(SubmissionTicket {
            attempt: self.attempt,
            document,
            portrait,
        })
    }

    /// Apply the verify call's outcome. A completion whose ticket predates a
    /// start-over is discarded; the reset session stays on step 1.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<VerificationResult, DeliveryError>,
    ) -> SubmissionDisposition {
        if ticket.attempt != self.attempt {
            tracing::info!(
                ticket_attempt = ticket.attempt,
                attempt = self.attempt,
                "discarding stale verification response"
            );
            return SubmissionDisposition::Stale;
        }

        self.state = match outcome {
            Ok(result) => {
                tracing::info!(status = %result.verification_status, "verification answered");
                SessionState::Result(result)
            }
            Err(error) => {
                tracing::warn!(%error, "verification call failed");
                let message = error
                    .server_message()
                    .unwrap_or(GENERIC_VERIFY_ERROR)
                    .to_string();
                SessionState::Failed { message }
            }
        };

        SubmissionDisposition::Applied
    }

    /// Submit both images and apply the outcome in one call, for drivers
    /// with nothing else interleaving.
    pub async fn submit<A: DeliveryActions>(
        &mut self,
        actions: &A,
    ) -> Result<&SessionState, SessionError> {
        let ticket = self.begin_submission()?;
        let outcome = actions
            .verify(&ticket.document.to_data_url(), &ticket.portrait.to_data_url())
            .await;
        self.complete_submission(ticket, outcome);
        Ok(&self.state)
    }

    /// Reset to step 1 from any state: both images, any error and any
    /// in-flight loading indicator are cleared. Outstanding network calls are
    /// not aborted; their completions become stale.
    pub fn start_over(&mut self) {
        self.attempt += 1;
        self.capture.clear_images();
        self.state = SessionState::Start;
        tracing::info!(attempt = self.attempt, "session reset to the first step");
    }

    /// Continuation URL for finishing capture on a phone, embedding the
    /// resolved token. Showing it commits nothing; session state is
    /// untouched.
    pub fn handoff_url(&self, base: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(base)?;
        url.query_pairs_mut()
            .append_pair("token", self.token.as_str());
        Ok(url)
    }
}
