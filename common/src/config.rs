//! Configuration options common to idscan binaries.

use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{fs::File, io::BufReader, path::Path};

/// Base URL advertised for continuing a session on a mobile device.
pub(crate) fn default_handoff_base() -> String {
    "https://services.idscan.rented123.com".to_string()
}

/// Configuration file items common to idscan binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfiguration {
    /// URL of the token entitlement lookup endpoint.
    pub token_url: String,

    /// URL of the identity verification endpoint.
    pub verify_url: String,

    /// URL of the report object-storage endpoint.
    pub store_document_url: String,

    /// URL of the report registration endpoint.
    pub register_report_url: String,

    /// URL of the email dispatch endpoint.
    pub send_email_url: String,

    /// Client identifier sent with every verification request.
    pub client_id: String,

    /// Recipient included on every report email, in addition to any address
    /// the user supplies.
    pub internal_recipient: String,

    /// Base URL embedded in the QR handoff link shown to desktop sessions.
    #[serde(default = "default_handoff_base")]
    pub handoff_base_url: String,
}

pub trait Configuration: DeserializeOwned {
    fn common_configuration(&self) -> &CommonConfiguration;

    fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let config_file = File::open(path).context("failed to open config file")?;

        serde_yaml::from_reader(BufReader::new(config_file)).context("failed to parse config file")
    }
}
