use crate::encoding::ManifestEncoding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed manifest line {line_number}: '{line}' (expected '<path>=<checksum>')")]
    MalformedLine { line_number: usize, line: String },
}

/// Relative file path → checksum digest.
///
/// Ordered so that rendering and serialization are stable; equality is plain
/// key and value set equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecksumManifest {
    entries: BTreeMap<String, String>,
}

impl ChecksumManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, returning the checksum it replaced.
    pub fn insert(&mut self, path: impl Into<String>, checksum: impl Into<String>) -> Option<String> {
        self.entries.insert(path.into(), checksum.into())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serialize as sorted `path=checksum` lines joined by `\n`.
    pub fn to_line_form(&self) -> String {
        self.iter()
            .map(|(path, sum)| format!("{path}={sum}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ChecksumManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for (k, v) in iter {
            manifest.insert(k, v);
        }
        manifest
    }
}

impl From<BTreeMap<String, String>> for ChecksumManifest {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Parse result that keeps the anomalies found along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    pub manifest: ChecksumManifest,
    /// Paths that appeared more than once; the last occurrence was kept.
    pub duplicates: Vec<String>,
}

/// Decode `input` into a manifest, reporting duplicated paths.
pub fn parse_manifest_detailed(
    input: &str,
    encoding: ManifestEncoding,
) -> Result<ParsedManifest, ManifestError> {
    let text = encoding.to_lines(input);
    let mut parsed = ParsedManifest::default();

    for (idx, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let Some((path, checksum)) = line.split_once('=') else {
            return Err(ManifestError::MalformedLine {
                line_number: idx + 1,
                line: line.to_owned(),
            });
        };
        if parsed.manifest.insert(path, checksum).is_some() {
            parsed.duplicates.push(path.to_owned());
        }
    }

    Ok(parsed)
}

/// Decode `input` into a manifest. Duplicated paths resolve to their last
/// occurrence and are logged.
pub fn parse_manifest(
    input: &str,
    encoding: ManifestEncoding,
) -> Result<ChecksumManifest, ManifestError> {
    let parsed = parse_manifest_detailed(input, encoding)?;
    for path in &parsed.duplicates {
        tracing::warn!("duplicate manifest entry for '{path}', keeping the last checksum");
    }
    Ok(parsed.manifest)
}

pub fn parse_manifest_file(
    path: impl AsRef<Path>,
    encoding: ManifestEncoding,
) -> Result<ChecksumManifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest(&content, encoding)
}
