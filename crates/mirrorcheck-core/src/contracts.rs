//! Typed assertions on web service responses.
//!
//! A [`ResponseKind`] plus the expected text of a case build a
//! [`ResponseExpectation`] once, up front. Checking a response then runs the
//! status check followed by the one shape check that variant owns.

use mirrorcheck_manifest::{compare, parse_manifest, ManifestDiff, ManifestError};
use mirrorcheck_remote::{ApiResponse, ManifestSource, RemoteError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

pub const ZIP_CONTENT_TYPE: &str = "application/zip;charset=utf-8";

fn date_pattern() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Json,
    Text,
    Date,
    Boolean,
    Binary,
    Zipfile,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Binary => "binary",
            Self::Zipfile => "zipfile",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "date" => Ok(Self::Date),
            "boolean" | "bool" => Ok(Self::Boolean),
            "binary" => Ok(Self::Binary),
            "zipfile" | "zip" => Ok(Self::Zipfile),
            other => Err(format!("unknown response type '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExpectationError {
    #[error("expected response is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),
    #[error("zipfile cases need the expected archive entry name")]
    MissingEntryName,
}

/// What a response must look like, one variant per [`ResponseKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseExpectation {
    Json(serde_json::Value),
    Text(String),
    Date(String),
    Boolean(String),
    Binary(String),
    /// A single-entry archive named `entry_name` whose manifest must equal the
    /// reference manifest of the sync type.
    ZipManifest { entry_name: String },
}

/// Why a response broke its contract.
#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("status code is {actual}, expected {expected}")]
    Status { expected: u16, actual: u16 },
    #[error("response is not valid JSON: {0}")]
    NotJson(String),
    #[error("JSON response differs: got {actual}, expected {expected}")]
    JsonMismatch {
        expected: serde_json::Value,
        actual: serde_json::Value,
    },
    #[error("response does not match: got '{actual}', expected '{expected}'")]
    TextMismatch { expected: String, actual: String },
    #[error("response is not in YYYY-MM-DD format: '{0}'")]
    NotADate(String),
    #[error("response is not a boolean: '{0}'")]
    NotABoolean(String),
    #[error("response is not a binary flag: '{0}'")]
    NotABinaryFlag(String),
    #[error(
        "content type is {}, expected {}",
        .0.as_deref().unwrap_or("missing"),
        ZIP_CONTENT_TYPE
    )]
    ContentType(Option<String>),
    #[error("{0}")]
    Archive(#[from] RemoteError),
    #[error("archive manifest is malformed: {0}")]
    MalformedManifest(#[from] ManifestError),
    #[error("no sync type for a zipfile case")]
    MissingSyncType,
    #[error("reference manifest for '{sync_type}' unavailable: {reason}")]
    ReferenceUnavailable { sync_type: String, reason: String },
    #[error("SHA sums do not match the cloud server: {} path(s) differ", .diff.len())]
    ManifestMismatch { diff: ManifestDiff },
}

/// Reference data a contract may need beyond the response itself.
pub struct ContractContext<'a> {
    pub sync_type: Option<&'a str>,
    pub reference: Option<&'a dyn ManifestSource>,
}

impl ContractContext<'_> {
    pub fn none() -> Self {
        Self {
            sync_type: None,
            reference: None,
        }
    }
}

fn exact(expected: &str, actual: &str) -> Result<(), ContractViolation> {
    if actual == expected {
        Ok(())
    } else {
        Err(ContractViolation::TextMismatch {
            expected: expected.to_owned(),
            actual: actual.to_owned(),
        })
    }
}

impl ResponseExpectation {
    pub fn build(kind: ResponseKind, expected: &str) -> Result<Self, ExpectationError> {
        Ok(match kind {
            ResponseKind::Json => {
                Self::Json(serde_json::from_str(expected).map_err(ExpectationError::InvalidJson)?)
            }
            ResponseKind::Text => Self::Text(expected.to_owned()),
            ResponseKind::Date => Self::Date(expected.to_owned()),
            ResponseKind::Boolean => Self::Boolean(expected.to_owned()),
            ResponseKind::Binary => Self::Binary(expected.to_owned()),
            ResponseKind::Zipfile => {
                let entry_name = expected.trim();
                if entry_name.is_empty() {
                    return Err(ExpectationError::MissingEntryName);
                }
                Self::ZipManifest {
                    entry_name: entry_name.to_owned(),
                }
            }
        })
    }

    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::Json(_) => ResponseKind::Json,
            Self::Text(_) => ResponseKind::Text,
            Self::Date(_) => ResponseKind::Date,
            Self::Boolean(_) => ResponseKind::Boolean,
            Self::Binary(_) => ResponseKind::Binary,
            Self::ZipManifest { .. } => ResponseKind::Zipfile,
        }
    }

    /// Check the status, then the shape this expectation describes.
    pub fn check(
        &self,
        response: &ApiResponse,
        expected_status: u16,
        ctx: &ContractContext<'_>,
    ) -> Result<(), ContractViolation> {
        if response.status != expected_status {
            return Err(ContractViolation::Status {
                expected: expected_status,
                actual: response.status,
            });
        }

        let text = response.text();
        match self {
            Self::Json(expected) => {
                let actual: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| ContractViolation::NotJson(e.to_string()))?;
                if actual == *expected {
                    Ok(())
                } else {
                    Err(ContractViolation::JsonMismatch {
                        expected: expected.clone(),
                        actual,
                    })
                }
            }
            Self::Text(expected) => exact(expected, &text),
            Self::Date(expected) => {
                if !date_pattern().is_match(&text) {
                    return Err(ContractViolation::NotADate(text.into_owned()));
                }
                exact(expected, &text)
            }
            Self::Boolean(expected) => {
                if !matches!(&*text, "true" | "false") {
                    return Err(ContractViolation::NotABoolean(text.into_owned()));
                }
                exact(expected, &text)
            }
            Self::Binary(expected) => {
                if !matches!(&*text, "0" | "1") {
                    return Err(ContractViolation::NotABinaryFlag(text.into_owned()));
                }
                exact(expected, &text)
            }
            Self::ZipManifest { entry_name } => check_zip_manifest(response, entry_name, ctx),
        }
    }
}

fn check_zip_manifest(
    response: &ApiResponse,
    entry_name: &str,
    ctx: &ContractContext<'_>,
) -> Result<(), ContractViolation> {
    if response.content_type.as_deref() != Some(ZIP_CONTENT_TYPE) {
        return Err(ContractViolation::ContentType(response.content_type.clone()));
    }
    let served = response.archive_manifest(entry_name, entry_name)?;
    let served = parse_manifest(&served.text, served.encoding)?;

    let sync_type = ctx.sync_type.ok_or(ContractViolation::MissingSyncType)?;
    let unavailable = |reason: String| ContractViolation::ReferenceUnavailable {
        sync_type: sync_type.to_owned(),
        reason,
    };
    let source = ctx
        .reference
        .ok_or_else(|| unavailable("no reference manifests configured".to_owned()))?;
    let raw = source
        .fetch_manifest(sync_type)
        .map_err(|e| unavailable(e.to_string()))?;
    let reference =
        parse_manifest(&raw.text, raw.encoding).map_err(|e| unavailable(e.to_string()))?;

    let diff = compare(&served, &reference);
    if diff.is_equal() {
        Ok(())
    } else {
        Err(ContractViolation::ManifestMismatch { diff })
    }
}
