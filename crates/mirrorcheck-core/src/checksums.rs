use crate::config::{SyncConfig, SyncTarget};
use crate::report::ChecksumRunReport;
use crate::sink::OutcomeSink;
use mirrorcheck_manifest::{compare, parse_manifest_detailed, ChecksumManifest, ManifestDiff};
use mirrorcheck_remote::{ManifestSource, SshManifestSource};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Suffix of the cloud-side folder that mirrors an ancor `*conf` folder.
pub const CONF_SYNC_SUFFIX: &str = "_sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ancor,
    Cloud,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ancor => f.write_str("ancor"),
            Self::Cloud => f.write_str("cloud"),
        }
    }
}

/// The folder names compared on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderPair {
    pub ancor: String,
    pub cloud: String,
}

impl FolderPair {
    /// A folder ending in `conf` is published as `<folder>_sync` on the cloud side.
    pub fn for_folder(folder: &str) -> Self {
        let cloud = if folder.ends_with("conf") {
            format!("{folder}{CONF_SYNC_SUFFIX}")
        } else {
            folder.to_owned()
        };
        Self {
            ancor: folder.to_owned(),
            cloud,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FolderOutcome {
    Match,
    /// Both manifests were read and differ. `left` is the ancor side.
    Mismatch { diff: ManifestDiff },
    /// One side could not be read or decoded; nothing was compared.
    CouldNotCompare { side: Side, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderResult {
    pub folders: FolderPair,
    #[serde(flatten)]
    pub outcome: FolderOutcome,
    /// Paths listed more than once in either manifest.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<String>,
}

impl FolderResult {
    pub fn folder(&self) -> &str {
        &self.folders.ancor
    }

    pub fn is_match(&self) -> bool {
        matches!(self.outcome, FolderOutcome::Match)
    }
}

fn fetch_side(
    source: &dyn ManifestSource,
    folder: &str,
    side: Side,
    duplicates: &mut Vec<String>,
) -> Result<ChecksumManifest, FolderOutcome> {
    let raw = source
        .fetch_manifest(folder)
        .map_err(|e| FolderOutcome::CouldNotCompare {
            side,
            reason: e.to_string(),
        })?;
    let parsed = parse_manifest_detailed(&raw.text, raw.encoding).map_err(|e| {
        FolderOutcome::CouldNotCompare {
            side,
            reason: format!("{}: {e}", raw.origin),
        }
    })?;
    for path in &parsed.duplicates {
        tracing::warn!("{side} manifest {} lists '{path}' more than once", raw.origin);
    }
    duplicates.extend(parsed.duplicates);
    info!("read {} entries from {}", parsed.manifest.len(), raw.origin);
    Ok(parsed.manifest)
}

/// Fetch, decode and compare one folder on both sides.
pub fn compare_folder(
    pair: &FolderPair,
    ancor: &dyn ManifestSource,
    cloud: &dyn ManifestSource,
    sink: &dyn OutcomeSink,
) -> FolderResult {
    let mut duplicates = Vec::new();
    let outcome = match fetch_side(ancor, &pair.ancor, Side::Ancor, &mut duplicates).and_then(
        |left| {
            fetch_side(cloud, &pair.cloud, Side::Cloud, &mut duplicates).map(|right| (left, right))
        },
    ) {
        Ok((left, right)) => {
            let diff = compare(&left, &right);
            if diff.is_equal() {
                FolderOutcome::Match
            } else {
                FolderOutcome::Mismatch { diff }
            }
        }
        Err(outcome) => outcome,
    };

    match &outcome {
        FolderOutcome::Match => sink.pass(&format!(
            "SHA256 checksum match for folders {} and {}",
            pair.ancor, pair.cloud
        )),
        FolderOutcome::Mismatch { diff } => sink.error(&format!(
            "SHA256 checksum mismatch for folders {} and {}: {} only on ancor, {} only on cloud, {} differing",
            pair.ancor,
            pair.cloud,
            diff.only_left.len(),
            diff.only_right.len(),
            diff.mismatched.len()
        )),
        FolderOutcome::CouldNotCompare { side, reason } => sink.error(&format!(
            "Checksum file missing for folders {} or {} ({side}): {reason}",
            pair.ancor, pair.cloud
        )),
    }

    FolderResult {
        folders: pair.clone(),
        outcome,
        duplicates,
    }
}

/// Compare every folder in order; one failure never stops the rest.
pub fn compare_folders(
    folders: &[String],
    ancor: &dyn ManifestSource,
    cloud: &dyn ManifestSource,
    sink: &dyn OutcomeSink,
) -> Vec<FolderResult> {
    folders
        .iter()
        .map(|folder| {
            let pair = FolderPair::for_folder(folder);
            info!("comparing folder {} with {}", pair.ancor, pair.cloud);
            compare_folder(&pair, ancor, cloud, sink)
        })
        .collect()
}

/// Compare the configured folders between the ancor and cloud hosts over SSH.
pub fn run_checksums(
    config: &SyncConfig,
    target: &SyncTarget,
    sink: &dyn OutcomeSink,
) -> ChecksumRunReport {
    let ancor = SshManifestSource::new(
        config.ancor_credentials(target),
        &config.ancor_path,
        &config.manifest_file_name,
        config.ancor_manifest_encoding,
    );
    let cloud = SshManifestSource::new(
        config.cloud_credentials(target),
        &config.cloud_path,
        &config.manifest_file_name,
        config.cloud_manifest_encoding,
    );
    ChecksumRunReport {
        target: target.clone(),
        results: compare_folders(&config.folders_shasum, &ancor, &cloud, sink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, Outcome};
    use mirrorcheck_manifest::ManifestEncoding;
    use mirrorcheck_remote::{RawManifest, RemoteError};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Serves fixed manifest texts by folder and records what was asked for.
    struct FixedSource {
        name: &'static str,
        encoding: ManifestEncoding,
        texts: BTreeMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl FixedSource {
        fn new(name: &'static str, encoding: ManifestEncoding, texts: &[(&str, &str)]) -> Self {
            Self {
                name,
                encoding,
                texts: texts
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl ManifestSource for FixedSource {
        fn fetch_manifest(&self, folder: &str) -> Result<RawManifest, RemoteError> {
            self.requested.borrow_mut().push(folder.to_owned());
            match self.texts.get(folder) {
                Some(text) => Ok(RawManifest {
                    text: text.clone(),
                    encoding: self.encoding,
                    origin: format!("{}:{folder}", self.name),
                }),
                None => Err(RemoteError::RemoteFileNotFound {
                    host: self.name.to_owned(),
                    path: format!("/feeds/{folder}/sha256sum.txt"),
                }),
            }
        }

        fn describe(&self) -> String {
            self.name.to_owned()
        }
    }

    #[test]
    fn conf_folders_map_to_sync_suffix() {
        assert_eq!(FolderPair::for_folder("conf").cloud, "conf_sync");
        assert_eq!(FolderPair::for_folder("agentconf").cloud, "agentconf_sync");
        assert_eq!(FolderPair::for_folder("sqldata").cloud, "sqldata");
        assert_eq!(FolderPair::for_folder("confs").cloud, "confs");
    }

    #[test]
    fn line_and_pipe_sides_match() {
        let ancor = FixedSource::new(
            "ancor",
            ManifestEncoding::Lines,
            &[("conf", "a/b.txt=111\nc/d.txt=222\n")],
        );
        let cloud = FixedSource::new(
            "cloud",
            ManifestEncoding::DoublePipe,
            &[("conf_sync", "|c/d.txt=222||a/b.txt=111|")],
        );
        let sink = MemorySink::new();
        let results = compare_folders(&["conf".to_owned()], &ancor, &cloud, &sink);

        assert!(results[0].is_match());
        assert_eq!(*cloud.requested.borrow(), vec!["conf_sync"]);
        assert_eq!(
            sink.messages(Outcome::Pass),
            vec!["SHA256 checksum match for folders conf and conf_sync"]
        );
    }

    #[test]
    fn differing_checksum_is_a_mismatch() {
        let ancor = FixedSource::new("ancor", ManifestEncoding::Lines, &[("sqldata", "a=1\nb=2")]);
        let cloud = FixedSource::new(
            "cloud",
            ManifestEncoding::DoublePipe,
            &[("sqldata", "a=1||b=3||c=4")],
        );
        let sink = MemorySink::new();
        let result = compare_folder(&FolderPair::for_folder("sqldata"), &ancor, &cloud, &sink);

        let FolderOutcome::Mismatch { diff } = &result.outcome else {
            panic!("expected mismatch, got {:?}", result.outcome);
        };
        assert_eq!(diff.divergent_paths(), vec!["b", "c"]);
        assert_eq!(diff.mismatched[0].left, "2");
        assert_eq!(diff.mismatched[0].right, "3");
        assert!(sink.messages(Outcome::Error)[0].contains("mismatch"));
    }

    #[test]
    fn missing_file_could_not_compare() {
        let ancor = FixedSource::new("ancor", ManifestEncoding::Lines, &[("sqldata", "a=1")]);
        let cloud = FixedSource::new("cloud", ManifestEncoding::DoublePipe, &[]);
        let sink = MemorySink::new();
        let result = compare_folder(&FolderPair::for_folder("sqldata"), &ancor, &cloud, &sink);

        match &result.outcome {
            FolderOutcome::CouldNotCompare { side, reason } => {
                assert_eq!(*side, Side::Cloud);
                assert!(reason.contains("remote file not found"));
            }
            other => panic!("expected CouldNotCompare, got {other:?}"),
        }
        assert!(!result.is_match());
    }

    #[test]
    fn ancor_failure_skips_cloud_fetch() {
        let ancor = FixedSource::new("ancor", ManifestEncoding::Lines, &[]);
        let cloud = FixedSource::new("cloud", ManifestEncoding::Lines, &[("x", "a=1")]);
        let sink = MemorySink::new();
        let result = compare_folder(&FolderPair::for_folder("x"), &ancor, &cloud, &sink);
        assert!(matches!(
            result.outcome,
            FolderOutcome::CouldNotCompare {
                side: Side::Ancor,
                ..
            }
        ));
        assert!(cloud.requested.borrow().is_empty());
    }

    #[test]
    fn malformed_manifest_could_not_compare() {
        let ancor = FixedSource::new("ancor", ManifestEncoding::Lines, &[("x", "a=1\ngarbage")]);
        let cloud = FixedSource::new("cloud", ManifestEncoding::Lines, &[("x", "a=1")]);
        let result = compare_folder(
            &FolderPair::for_folder("x"),
            &ancor,
            &cloud,
            &MemorySink::new(),
        );
        let FolderOutcome::CouldNotCompare { side, reason } = result.outcome else {
            panic!("expected CouldNotCompare");
        };
        assert_eq!(side, Side::Ancor);
        assert!(reason.contains("line 2"), "{reason}");
    }

    #[test]
    fn duplicates_are_reported_with_the_result() {
        let ancor = FixedSource::new("ancor", ManifestEncoding::Lines, &[("x", "a=1\na=2")]);
        let cloud = FixedSource::new("cloud", ManifestEncoding::Lines, &[("x", "a=2")]);
        let result = compare_folder(
            &FolderPair::for_folder("x"),
            &ancor,
            &cloud,
            &MemorySink::new(),
        );
        assert!(result.is_match());
        assert_eq!(result.duplicates, vec!["a"]);
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let ancor = FixedSource::new("ancor", ManifestEncoding::Lines, &[("b", "k=1")]);
        let cloud = FixedSource::new("cloud", ManifestEncoding::Lines, &[("b", "k=1")]);
        let folders = vec!["a".to_owned(), "b".to_owned()];
        let results = compare_folders(&folders, &ancor, &cloud, &MemorySink::new());
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_match());
        assert!(results[1].is_match());
    }

    #[test]
    fn result_serializes_with_flat_outcome() {
        let result = FolderResult {
            folders: FolderPair::for_folder("conf"),
            outcome: FolderOutcome::CouldNotCompare {
                side: Side::Cloud,
                reason: "refused".to_owned(),
            },
            duplicates: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "could_not_compare");
        assert_eq!(json["side"], "cloud");
        assert_eq!(json["folders"]["cloud"], "conf_sync");
        assert!(json.get("duplicates").is_none());
    }
}
