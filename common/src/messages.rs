//! Message definitions for the HTTP endpoints the client consumes.

use serde::{Deserialize, Serialize};

/// Error body returned by every backing service on failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// API objects for the token entitlement lookup.
pub mod token {
    use serde::{Deserialize, Serialize};

    /// The product a token must grant for a scan session to proceed.
    pub const EXPECTED_PRODUCT: &str = "idscan";

    /// An entitlement record resolved from a one-time token.
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct TokenRecord {
        /// The server-confirmed token string. This, not the raw query input,
        /// is what flows into report metadata.
        pub token: String,

        /// The product the token was purchased for.
        pub product: String,
    }
}

/// API objects for the identity verification service.
pub mod verify {
    use serde::{Deserialize, Serialize};

    /// Both captured images, submitted for verification. Images travel as
    /// data URLs, the same encoding both acquisition paths normalize to.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct VerifyRequest {
        /// The ID document image.
        pub document: String,

        /// The portrait (selfie) image.
        pub portrait: String,

        /// Fixed identifier naming this client to the service.
        #[serde(rename = "clientId")]
        pub client_id: String,
    }
}

/// API objects for the report object-storage endpoint.
pub mod storage {
    use serde::{Deserialize, Serialize};

    /// A rendered report to persist.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct StoreDocumentRequest {
        /// The PDF bytes, base64 encoded.
        #[serde(rename = "PDFfile")]
        pub pdf_file: String,

        /// Object key the report is stored under.
        #[serde(rename = "fileName")]
        pub file_name: String,

        /// Selects the verified or unverified bucket.
        #[serde(rename = "verificationPassed")]
        pub verification_passed: bool,
    }

    /// Where the stored report landed.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct StoreDocumentResponse {
        pub location: String,
    }
}

/// API objects for registering a stored report with the system of record.
pub mod report {
    use serde::{Deserialize, Serialize};

    /// Metadata registered for a stored report.
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct RegisterReportRequest {
        pub last_name: String,
        pub dob: String,

        #[serde(rename = "fileName")]
        pub file_name: String,

        pub report_url: String,

        /// Verdict label, `Verified` or `Unverified`.
        pub verification_status: String,
    }
}

/// API objects for the email dispatch endpoint.
pub mod email {
    use serde::{Deserialize, Serialize};

    /// Name and birth date fields carried in the email subject and body.
    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct SubjectFields {
        pub last_name: String,
        pub first_name: String,
        pub dob: String,
    }

    /// A request to email the finished report. Dispatch always includes the
    /// configured internal recipient; the user's address, when given, is
    /// appended after it.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SendEmailRequest {
        #[serde(rename = "userDetails")]
        pub user_details: SubjectFields,

        pub report_url: String,

        pub recipients: Vec<String>,
    }
}
