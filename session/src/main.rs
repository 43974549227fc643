use anyhow::{Context, bail};
use clap::Parser;
use idscan_common::{
    config::{CommonConfiguration, Configuration},
    messages::email::SubjectFields,
};
use idscan_session::{
    actions::HttpDeliveryActions,
    capture::{DeviceClass, FsFileReader},
    clock::TokioDelay,
    machine::{CaptureSource, SessionState, VerificationSession},
    report::{ReportOutcome, ReportPipeline, UNKNOWN},
    token::{self, GateError},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "idscan-session", version, about)]
struct Cli {
    /// Path to configuration file.
    #[arg(long, env = "CONFIG_FILE")]
    config: PathBuf,

    /// One-time access token from the purchase flow.
    #[arg(long)]
    token: Option<String>,

    /// Path to the ID document image (JPEG or PNG).
    #[arg(long)]
    document: PathBuf,

    /// Path to the portrait image (JPEG or PNG).
    #[arg(long)]
    portrait: PathBuf,

    /// Also email the report to this address.
    #[arg(long)]
    email: Option<String>,
}

/// Configuration for a verification session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionConfiguration {
    #[serde(flatten)]
    common: CommonConfiguration,
}

impl Configuration for SessionConfiguration {
    fn common_configuration(&self) -> &CommonConfiguration {
        &self.common
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = SessionConfiguration::load(&cli.config)?;
    let common = config.common_configuration().clone();

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let actions = HttpDeliveryActions::new(client, common.clone());

    let access = match token::resolve(&actions, cli.token.as_deref()).await {
        Ok(access) => access,
        Err(error @ (GateError::MissingToken | GateError::WrongProduct)) => {
            bail!("{error}; tokens are issued at https://rented123.com")
        }
        Err(error) => return Err(error).context("token lookup failed"),
    };

    let mut session = VerificationSession::new(access, DeviceClass::Desktop);

    let handoff = session.handoff_url(&common.handoff_base_url)?;
    tracing::info!(%handoff, "session opened; continue on another device via the handoff URL");

    let reader = FsFileReader;
    let delay = TokioDelay;
    session
        .acquire_document(
            CaptureSource::FileInput {
                reader: &reader,
                path: &cli.document,
            },
            &delay,
        )
        .await
        .context("failed to load the document image")?;
    session
        .acquire_portrait(
            CaptureSource::FileInput {
                reader: &reader,
                path: &cli.portrait,
            },
            &delay,
        )
        .await
        .context("failed to load the portrait image")?;

    session.submit(&actions).await?;

    let result = match session.state() {
        SessionState::Result(result) => result.clone(),
        SessionState::Failed { message } => bail!("verification failed: {message}"),
        other => bail!("verification ended in an unexpected state: {other:?}"),
    };

    let document = session
        .document_image()
        .cloned()
        .context("document image missing after submission")?;

    let mut pipeline = ReportPipeline::new();
    let outcome = pipeline
        .generate(&actions, &result, &document, session.token())
        .await
        .context("failed to produce the verification report")?;

    match outcome {
        ReportOutcome::Stored(location) => {
            println!("Verification passed.");
            println!("Report: {}", location.url);

            let subject = SubjectFields {
                last_name: result.surname().unwrap_or(UNKNOWN).to_string(),
                first_name: result.given_names().unwrap_or(UNKNOWN).to_string(),
                dob: result.date_of_birth().unwrap_or(UNKNOWN).to_string(),
            };
            let feedback = pipeline
                .email(&actions, cli.email.as_deref(), &subject, &location)
                .await;
            println!("{}", feedback.message);
        }
        ReportOutcome::NotVerified => {
            println!("Verification did not pass: {}", result.verification_status);
            println!("Check your lighting and image quality, then try again.");
        }
    }

    Ok(())
}
