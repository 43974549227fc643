//! The verification result model and the verdict derived from it.

use serde::{Deserialize, Serialize};

/// A named field the verification service extracted from the submitted
/// document. Fields the service could not read are simply absent, never
/// fabricated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedField {
    pub name: String,
    pub value: String,
}

/// Boolean classification of one verification call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn passed(self) -> bool {
        matches!(self, Verdict::Passed)
    }

    /// Object-storage bucket reports with this verdict land in.
    pub fn bucket(self) -> &'static str {
        match self {
            Verdict::Passed => "verified-id-reports",
            Verdict::Failed => "unverified-id-reports",
        }
    }

    /// Label used when registering the report with the system of record.
    pub fn status_label(self) -> &'static str {
        match self {
            Verdict::Passed => "Verified",
            Verdict::Failed => "Unverified",
        }
    }
}

/// What the verification service said about one submission. Immutable once
/// decoded; discarded when the user starts over.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationResult {
    /// Free-text classification, e.g. "Document is verified".
    #[serde(rename = "verificationStatus")]
    pub verification_status: String,

    /// Explicit verdict flag set by newer service revisions. When present it
    /// overrides the status-text rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,

    /// Supplementary identity fields, in the order the service returned them.
    #[serde(rename = "additionalData", default)]
    pub additional_data: Vec<NamedField>,
}

impl VerificationResult {
    /// Derive the single boolean verdict. Legacy service revisions only send
    /// free text, where any status containing "not" (case-insensitive) means
    /// the submission was not verified.
    pub fn verdict(&self) -> Verdict {
        match self.passed {
            Some(true) => Verdict::Passed,
            Some(false) => Verdict::Failed,
            None => {
                if self.verification_status.to_lowercase().contains("not") {
                    Verdict::Failed
                } else {
                    Verdict::Passed
                }
            }
        }
    }

    /// Value of the named supplementary field, if the service returned it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.additional_data
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    pub fn surname(&self) -> Option<&str> {
        self.field("Surname")
    }

    pub fn given_names(&self) -> Option<&str> {
        self.field("Given Names")
    }

    pub fn date_of_birth(&self) -> Option<&str> {
        self.field("Date of Birth")
    }

    /// The known supplementary fields in display order. Field names without a
    /// display rank are dropped, not rendered.
    pub fn ordered_fields(&self) -> Vec<&NamedField> {
        let mut known: Vec<(&NamedField, u8)> = self
            .additional_data
            .iter()
            .filter_map(|field| display_rank(&field.name).map(|rank| (field, rank)))
            .collect();
        known.sort_by_key(|(_, rank)| *rank);
        known.into_iter().map(|(field, _)| field).collect()
    }
}

/// Known supplementary field names and their display rank in the report.
const FIELD_RANKS: &[(&str, u8)] = &[
    ("Surname", 0),
    ("Given Names", 1),
    ("Date of Birth", 2),
    ("Age", 3),
    ("Sex", 4),
    ("Nationality", 5),
    ("Document Number", 6),
    ("Date of Issue", 7),
    ("Date of Expiry", 8),
    ("Issuing State Code", 9),
    ("Nationality Code", 10),
    ("Issuing State Name", 11),
    ("Authority", 12),
    ("Address", 13),
];

/// Display rank for a supplementary field name, or `None` if the name is not
/// one the report renders.
pub fn display_rank(name: &str) -> Option<u8> {
    FIELD_RANKS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, rank)| *rank)
}
