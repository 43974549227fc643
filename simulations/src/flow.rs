use crate::harness::{StubBackend, VerifyScript};
use idscan_common::model::VerificationResult;
use idscan_session::{
    actions::HttpDeliveryActions,
    capture::{DeviceClass, FileReader},
    clock::NoDelay,
    machine::{CaptureSource, SessionState, VerificationSession},
    pdf::{page_count, render_report},
    report::{ReportError, ReportOutcome, ReportPipeline},
    token::{self, GateError},
};
use std::path::Path;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// The images never leave the process; this reader stands in for the upload
/// widget.
struct CannedFiles(Vec<u8>);

impl FileReader for CannedFiles {
    fn read(&self, _path: &Path) -> Result<Vec<u8>, std::io::Error> {
        Ok(self.0.clone())
    }
}

fn jpeg_fixture() -> Vec<u8> {
    let mut bytes = Vec::from([0xFF, 0xD8, 0xFF, 0xE0]);
    bytes.resize(256, 0x42);
    bytes
}

fn passed_result() -> VerificationResult {
    serde_json::from_str(
        r#"{
            "verificationStatus": "Document is verified",
            "additionalData": [
                {"name": "Surname", "value": "Doe"},
                {"name": "Given Names", "value": "Jane"},
                {"name": "Date of Birth", "value": "1985-03-02"}
            ]
        }"#,
    )
    .unwrap()
}

async fn actions_for(backend: &StubBackend) -> HttpDeliveryActions {
    HttpDeliveryActions::new(reqwest::Client::new(), backend.config())
}

async fn session_with_both_images(
    backend: &StubBackend,
) -> (VerificationSession, HttpDeliveryActions) {
    let actions = actions_for(backend).await;
    backend.grant("raw-abc", "confirmed-abc", "idscan");

    let access = token::resolve(&actions, Some("raw-abc")).await.unwrap();
    let mut session = VerificationSession::new(access, DeviceClass::Desktop);

    let files = CannedFiles(jpeg_fixture());
    session
        .acquire_document(
            CaptureSource::FileInput {
                reader: &files,
                path: Path::new("id.jpg"),
            },
            &NoDelay,
        )
        .await
        .unwrap();
    session
        .acquire_portrait(
            CaptureSource::FileInput {
                reader: &files,
                path: Path::new("selfie.jpg"),
            },
            &NoDelay,
        )
        .await
        .unwrap();

    (session, actions)
}

#[tokio::test]
async fn missing_token_is_rejected_without_a_lookup() {
    init_tracing();
    let backend = StubBackend::start().await.unwrap();
    let actions = actions_for(&backend).await;

    assert!(matches!(
        token::resolve(&actions, None).await,
        Err(GateError::MissingToken)
    ));
    assert!(backend.token_lookups().is_empty());
}

#[tokio::test]
async fn token_for_another_product_is_rejected() {
    init_tracing();
    let backend = StubBackend::start().await.unwrap();
    let actions = actions_for(&backend).await;
    backend.grant("raw-abc", "confirmed-abc", "credit-report");

    assert!(matches!(
        token::resolve(&actions, Some("raw-abc")).await,
        Err(GateError::WrongProduct)
    ));
    assert_eq!(backend.token_lookups(), ["raw-abc"]);
}

#[tokio::test]
async fn passed_flow_stores_registers_and_emails_the_report() {
    init_tracing();
    let backend = StubBackend::start().await.unwrap();
    backend.script_verify(VerifyScript::Respond(passed_result()));

    let (mut session, actions) = session_with_both_images(&backend).await;
    session.submit(&actions).await.unwrap();

    let result = match session.state() {
        SessionState::Result(result) => result.clone(),
        other => panic!("expected a result, got {other:?}"),
    };

    // The submission carried data URLs and the configured client id.
    let verify_calls = backend.verify_calls();
    assert_eq!(verify_calls.len(), 1);
    assert_eq!(verify_calls[0].client_id, "simulated-client");
    assert!(verify_calls[0].document.starts_with("data:image/jpeg;base64,"));
    assert!(verify_calls[0].portrait.starts_with("data:image/jpeg;base64,"));

    let document = session.document_image().cloned().unwrap();
    let mut pipeline = ReportPipeline::new();
    let outcome = pipeline
        .generate(&actions, &result, &document, session.token())
        .await
        .unwrap();

    let location = match outcome {
        ReportOutcome::Stored(location) => location,
        other => panic!("expected a stored report, got {other:?}"),
    };
    assert_eq!(
        location.url.as_str(),
        "https://verified-id-reports.s3.us-west-2.amazonaws.com/Doe_1985-03-02_verification_report"
    );

    let stored = backend.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].bucket, "verified-id-reports");
    assert_eq!(stored[0].filename, "Doe_1985-03-02_verification_report");
    assert!(stored[0].pdf_bytes.starts_with(b"%PDF"));

    // What landed in the bucket is the same document a fresh render of the
    // same result produces, laid out on the expected number of pages.
    assert_eq!(page_count(result.ordered_fields().len()), 1);
    let rerendered = render_report(&result, &document, session.token().as_str()).unwrap();
    assert_eq!(stored[0].pdf_bytes.len(), rerendered.len());

    let registrations = backend.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].last_name, "Doe");
    assert_eq!(registrations[0].dob, "1985-03-02");
    assert_eq!(registrations[0].verification_status, "Verified");
    assert_eq!(registrations[0].report_url, location.url.as_str());

    let subject = idscan_common::messages::email::SubjectFields {
        last_name: "Doe".to_string(),
        first_name: "Jane".to_string(),
        dob: "1985-03-02".to_string(),
    };
    let feedback = pipeline
        .email(&actions, Some("jane@example.com"), &subject, &location)
        .await;
    assert!(feedback.ok);

    let emails = backend.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(
        emails[0].recipients,
        ["reports@rented123.com", "jane@example.com"]
    );
    assert_eq!(emails[0].report_url, location.url.as_str());
}

#[tokio::test]
async fn failed_verdict_produces_no_report() {
    init_tracing();
    let backend = StubBackend::start().await.unwrap();
    backend.script_verify(VerifyScript::Respond(
        serde_json::from_str(r#"{"verificationStatus": "Document is not verified"}"#).unwrap(),
    ));

    let (mut session, actions) = session_with_both_images(&backend).await;
    session.submit(&actions).await.unwrap();

    let result = match session.state() {
        SessionState::Result(result) => result.clone(),
        other => panic!("expected a result, got {other:?}"),
    };

    let document = session.document_image().cloned().unwrap();
    let mut pipeline = ReportPipeline::new();
    let outcome = pipeline
        .generate(&actions, &result, &document, session.token())
        .await
        .unwrap();

    assert_eq!(outcome, ReportOutcome::NotVerified);
    assert!(backend.stored().is_empty());
    assert!(backend.registrations().is_empty());
}

#[tokio::test]
async fn verify_failure_surfaces_the_server_message_and_start_over_recovers() {
    init_tracing();
    let backend = StubBackend::start().await.unwrap();
    backend.script_verify(VerifyScript::Fail {
        status: 422,
        message: "Some texts in the ID image were unreadable.".to_string(),
    });

    let (mut session, actions) = session_with_both_images(&backend).await;
    session.submit(&actions).await.unwrap();

    assert_eq!(
        *session.state(),
        SessionState::Failed {
            message: "Some texts in the ID image were unreadable.".to_string()
        }
    );

    session.start_over();
    assert_eq!(*session.state(), SessionState::Start);
    assert!(!session.capture().both_present());
}

#[tokio::test]
async fn registration_failure_is_fatal_and_a_retry_reuploads() {
    init_tracing();
    let backend = StubBackend::start().await.unwrap();
    backend.script_verify(VerifyScript::Respond(passed_result()));
    backend.fail_register_times(1);

    let (mut session, actions) = session_with_both_images(&backend).await;
    session.submit(&actions).await.unwrap();

    let result = match session.state() {
        SessionState::Result(result) => result.clone(),
        other => panic!("expected a result, got {other:?}"),
    };
    let document = session.document_image().cloned().unwrap();

    let mut pipeline = ReportPipeline::new();
    let error = pipeline
        .generate(&actions, &result, &document, session.token())
        .await
        .unwrap_err();
    assert!(matches!(error, ReportError::Register(_)));
    assert!(pipeline.location().is_none());

    // The retry uploads a fresh copy rather than reusing the first one.
    let outcome = pipeline
        .generate(&actions, &result, &document, session.token())
        .await
        .unwrap();
    assert!(matches!(outcome, ReportOutcome::Stored(_)));
    assert_eq!(backend.stored().len(), 2);
    assert_eq!(backend.registrations().len(), 1);
}
