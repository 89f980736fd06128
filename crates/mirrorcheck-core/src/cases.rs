use crate::contracts::{ExpectationError, ResponseExpectation, ResponseKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("failed to read case file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse case file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// One data-driven API check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub description: String,
    pub endpoint: String,
    #[serde(default)]
    pub saml: String,
    pub expected_status: u16,
    pub response_type: ResponseKind,
    #[serde(default)]
    pub expected_response: String,
    #[serde(default = "default_run")]
    pub run: bool,
}

fn default_run() -> bool {
    true
}

impl TestCase {
    /// Endpoints that mention `sync` serve a manifest; their last path segment
    /// names the sync type.
    /// The query string plays no part in either decision.
    pub fn sync_type(&self) -> Option<&str> {
        let path = self
            .endpoint
            .split_once('?')
            .map_or(self.endpoint.as_str(), |(p, _)| p);
        if !path.contains("sync") {
            return None;
        }
        path.trim_matches('/').rsplit('/').next()
    }

    pub fn expectation(&self) -> Result<ResponseExpectation, ExpectationError> {
        ResponseExpectation::build(self.response_type, &self.expected_response)
    }

    pub fn authorization(&self) -> String {
        format!("SAML {}", self.saml)
    }
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(default)]
    cases: Vec<TestCase>,
}

/// Parse a TOML case file, keeping only cases marked to run.
pub fn parse_cases(input: &str) -> Result<Vec<TestCase>, toml::de::Error> {
    let file: CaseFile = toml::from_str(input)?;
    Ok(file.cases.into_iter().filter(|c| c.run).collect())
}

/// Load and concatenate case files in order.
pub fn load_cases(paths: &[PathBuf]) -> Result<Vec<TestCase>, CaseError> {
    let mut cases = Vec::new();
    for path in paths {
        cases.extend(load_case_file(path)?);
    }
    Ok(cases)
}

fn load_case_file(path: &Path) -> Result<Vec<TestCase>, CaseError> {
    let content = std::fs::read_to_string(path).map_err(|source| CaseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cases = parse_cases(&content).map_err(|source| CaseError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("{}: {} runnable cases", path.display(), cases.len());
    Ok(cases)
}
