//! Canned capabilities and delivery actions for unit tests.

use crate::{
    actions::{DeliveryActions, DeliveryError},
    capture::{
        CameraStream, CaptureError, FacingMode, FileReader, ImageFormat, ImagePayload, MediaCapture,
    },
    token::AccessToken,
};
use idscan_common::{
    messages::{email, report, token::TokenRecord},
    model::{NamedField, VerificationResult, Verdict},
};
use std::{
    path::Path,
    sync::Mutex,
};

pub(crate) fn verified_token() -> AccessToken {
    AccessToken::new("confirmed-abc".to_string())
}

/// Bytes with a JPEG magic prefix; enough for the capture and wire paths,
/// which never decode pixels.
pub(crate) fn jpeg_fixture() -> Vec<u8> {
    let mut bytes = Vec::from([0xFF, 0xD8, 0xFF, 0xE0]);
    bytes.resize(256, 0x42);
    bytes
}

pub(crate) fn passed_result() -> VerificationResult {
    VerificationResult {
        verification_status: "Document is verified".to_string(),
        passed: None,
        additional_data: Vec::from([
            NamedField {
                name: "Surname".to_string(),
                value: "Doe".to_string(),
            },
            NamedField {
                name: "Given Names".to_string(),
                value: "Jane".to_string(),
            },
            NamedField {
                name: "Date of Birth".to_string(),
                value: "1985-03-02".to_string(),
            },
        ]),
    }
}

/// A file source that hands the same bytes back for every path.
pub(crate) struct CannedFiles {
    bytes: Vec<u8>,
}

impl CannedFiles {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl FileReader for CannedFiles {
    fn read(&self, _path: &Path) -> Result<Vec<u8>, std::io::Error> {
        Ok(self.bytes.clone())
    }
}

/// A camera that opens successfully and records the requested facings.
#[derive(Default)]
pub(crate) struct FakeCamera {
    opened: Vec<FacingMode>,
}

impl FakeCamera {
    pub(crate) fn opened_facings(&self) -> &[FacingMode] {
        &self.opened
    }
}

impl MediaCapture for FakeCamera {
    fn open(&mut self, facing: FacingMode) -> Result<Box<dyn CameraStream>, CaptureError> {
        self.opened.push(facing);
        Ok(Box::new(FakeStream))
    }
}

struct FakeStream;

impl CameraStream for FakeStream {
    fn grab_frame(&mut self) -> Result<ImagePayload, CaptureError> {
        Ok(ImagePayload::new(ImageFormat::Jpeg, jpeg_fixture()))
    }
}

/// A camera whose probe always fails, as on a device with no webcam or a
/// denied permission prompt.
pub(crate) struct BrokenCamera;

impl MediaCapture for BrokenCamera {
    fn open(&mut self, _facing: FacingMode) -> Result<Box<dyn CameraStream>, CaptureError> {
        Err(CaptureError::CameraUnavailable)
    }
}

fn status(code: u16, message: Option<String>) -> DeliveryError {
    DeliveryError::Status {
        status: code,
        message,
    }
}

/// Scriptable delivery actions. Unset responses fail the way the backing
/// service would; every call is recorded by name.
#[derive(Default)]
pub(crate) struct FakeActions {
    pub token_record: Option<TokenRecord>,
    pub verify_result: Option<VerificationResult>,
    pub verify_message: Option<String>,
    pub store_location: Option<String>,
    pub register_fails: bool,
    pub email_fails: bool,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeActions {
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

impl DeliveryActions for FakeActions {
    async fn lookup_token(&self, _raw_token: &str) -> Result<TokenRecord, DeliveryError> {
        self.record("lookup_token");
        self.token_record
            .clone()
            .ok_or_else(|| status(404, Some("Invalid token".to_string())))
    }

    async fn verify(
        &self,
        _document: &str,
        _portrait: &str,
    ) -> Result<VerificationResult, DeliveryError> {
        self.record("verify");
        self.verify_result
            .clone()
            .ok_or_else(|| status(500, self.verify_message.clone()))
    }

    async fn store_document(
        &self,
        _pdf_base64: &str,
        _filename: &str,
        _verdict: Verdict,
    ) -> Result<String, DeliveryError> {
        self.record("store_document");
        self.store_location.clone().ok_or_else(|| status(500, None))
    }

    async fn register_report(
        &self,
        _registration: &report::RegisterReportRequest,
    ) -> Result<(), DeliveryError> {
        self.record("register_report");
        if self.register_fails {
            return Err(status(500, Some("Could not save URL".to_string())));
        }
        Ok(())
    }

    async fn send_email(
        &self,
        _subject: &email::SubjectFields,
        _report_url: &str,
        _extra_recipient: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record("send_email");
        if self.email_fails {
            return Err(status(500, None));
        }
        Ok(())
    }
}
