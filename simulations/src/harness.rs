//! An in-process stand-in for the five backing services, so a whole session
//! can run against real HTTP without leaving the test process.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use idscan_common::{
    config::CommonConfiguration,
    messages::{ErrorBody, email, report, storage, token::TokenRecord, verify},
    model::{VerificationResult, Verdict},
};
use serde::Deserialize;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

/// What the verification endpoint does with the next submission.
#[derive(Clone, Debug)]
pub enum VerifyScript {
    Respond(VerificationResult),
    Fail { status: u16, message: String },
}

/// One report the storage endpoint accepted.
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub bucket: String,
    pub filename: String,
    pub pdf_bytes: Vec<u8>,
}

#[derive(Debug)]
struct StubState {
    tokens: HashMap<String, TokenRecord>,
    verify_script: VerifyScript,
    store_fails: bool,
    register_failures_remaining: u32,
    email_fails: bool,
    token_lookups: Vec<String>,
    verify_calls: Vec<verify::VerifyRequest>,
    stored: Vec<StoredBlob>,
    registrations: Vec<report::RegisterReportRequest>,
    emails: Vec<email::SendEmailRequest>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            tokens: HashMap::new(),
            verify_script: VerifyScript::Fail {
                status: 500,
                message: "verification endpoint was not scripted".to_string(),
            },
            store_fails: false,
            register_failures_remaining: 0,
            email_fails: false,
            token_lookups: Vec::new(),
            verify_calls: Vec::new(),
            stored: Vec::new(),
            registrations: Vec::new(),
            emails: Vec::new(),
        }
    }
}

/// Handle on a running stub. Scripting and inspection go through this; the
/// server itself runs on a spawned task until the process exits.
pub struct StubBackend {
    state: Arc<Mutex<StubState>>,
    address: SocketAddr,
}

impl StubBackend {
    /// Bind an ephemeral localhost port and serve the five endpoints.
    pub async fn start() -> Result<Self, anyhow::Error> {
        let state = Arc::new(Mutex::new(StubState::default()));

        let routes = Router::new()
            .route("/get-token", get(get_token))
            .route("/verify-identity", post(verify_identity))
            .route("/store-pdf", post(store_pdf))
            .route("/save-report", post(save_report))
            .route("/send-email", post(send_email))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, routes).await {
                tracing::error!(%error, "stub backend exited");
            }
        });

        tracing::info!(%address, "stub backend started");
        Ok(Self { state, address })
    }

    /// Client configuration pointing every endpoint at this stub.
    pub fn config(&self) -> CommonConfiguration {
        let base = format!("http://{}", self.address);
        CommonConfiguration {
            token_url: format!("{base}/get-token"),
            verify_url: format!("{base}/verify-identity"),
            store_document_url: format!("{base}/store-pdf"),
            register_report_url: format!("{base}/save-report"),
            send_email_url: format!("{base}/send-email"),
            client_id: "simulated-client".to_string(),
            internal_recipient: "reports@rented123.com".to_string(),
            handoff_base_url: "https://services.idscan.rented123.com".to_string(),
        }
    }

    /// Make `raw` resolvable to a confirmed token granting `product`.
    pub fn grant(&self, raw: &str, confirmed: &str, product: &str) {
        self.state.lock().unwrap().tokens.insert(
            raw.to_string(),
            TokenRecord {
                token: confirmed.to_string(),
                product: product.to_string(),
            },
        );
    }

    pub fn script_verify(&self, script: VerifyScript) {
        self.state.lock().unwrap().verify_script = script;
    }

    pub fn fail_store(&self, fails: bool) {
        self.state.lock().unwrap().store_fails = fails;
    }

    /// Make the next `times` registration calls fail, then recover.
    pub fn fail_register_times(&self, times: u32) {
        self.state.lock().unwrap().register_failures_remaining = times;
    }

    pub fn fail_email(&self, fails: bool) {
        self.state.lock().unwrap().email_fails = fails;
    }

    pub fn token_lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().token_lookups.clone()
    }

    pub fn verify_calls(&self) -> Vec<verify::VerifyRequest> {
        self.state.lock().unwrap().verify_calls.clone()
    }

    pub fn stored(&self) -> Vec<StoredBlob> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn registrations(&self) -> Vec<report::RegisterReportRequest> {
        self.state.lock().unwrap().registrations.clone()
    }

    pub fn emails(&self) -> Vec<email::SendEmailRequest> {
        self.state.lock().unwrap().emails.clone()
    }
}

fn failure(status: u16, message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorBody {
            message: message.to_string(),
        }),
    )
}

#[derive(Deserialize)]
struct TokenQuery {
    token: String,
}

async fn get_token(
    State(state): State<Arc<Mutex<StubState>>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenRecord>, (StatusCode, Json<ErrorBody>)> {
    let mut state = state.lock().unwrap();
    state.token_lookups.push(query.token.clone());

    state
        .tokens
        .get(&query.token)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(404, "Invalid token"))
}

async fn verify_identity(
    State(state): State<Arc<Mutex<StubState>>>,
    Json(request): Json<verify::VerifyRequest>,
) -> Result<Json<VerificationResult>, (StatusCode, Json<ErrorBody>)> {
    let mut state = state.lock().unwrap();
    state.verify_calls.push(request);

    match state.verify_script.clone() {
        VerifyScript::Respond(result) => Ok(Json(result)),
        VerifyScript::Fail { status, message } => Err(failure(status, &message)),
    }
}

async fn store_pdf(
    State(state): State<Arc<Mutex<StubState>>>,
    Json(request): Json<storage::StoreDocumentRequest>,
) -> Result<Json<storage::StoreDocumentResponse>, (StatusCode, Json<ErrorBody>)> {
    let mut state = state.lock().unwrap();
    if state.store_fails {
        return Err(failure(500, "Could not store the report"));
    }

    let pdf_bytes = STANDARD
        .decode(&request.pdf_file)
        .map_err(|_| failure(400, "PDFfile is not valid base64"))?;

    let verdict = if request.verification_passed {
        Verdict::Passed
    } else {
        Verdict::Failed
    };
    let bucket = verdict.bucket();
    let location = format!(
        "https://{bucket}.s3.us-west-2.amazonaws.com/{}",
        request.file_name
    );

    state.stored.push(StoredBlob {
        bucket: bucket.to_string(),
        filename: request.file_name,
        pdf_bytes,
    });

    Ok(Json(storage::StoreDocumentResponse { location }))
}

async fn save_report(
    State(state): State<Arc<Mutex<StubState>>>,
    Json(request): Json<report::RegisterReportRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    let mut state = state.lock().unwrap();
    if state.register_failures_remaining > 0 {
        state.register_failures_remaining -= 1;
        return Err(failure(500, "Could not save URL"));
    }

    state.registrations.push(request);
    Ok(StatusCode::CREATED)
}

async fn send_email(
    State(state): State<Arc<Mutex<StubState>>>,
    Json(request): Json<email::SendEmailRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    let mut state = state.lock().unwrap();
    if state.email_fails {
        return Err(failure(500, "Email dispatch failed"));
    }

    state.emails.push(request);
    Ok(StatusCode::OK)
}
