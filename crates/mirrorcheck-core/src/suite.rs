use crate::cases::TestCase;
use crate::config::SuiteConfig;
use crate::contracts::ContractContext;
use crate::report::SuiteReport;
use crate::sink::OutcomeSink;
use mirrorcheck_manifest::ManifestEncoding;
use mirrorcheck_remote::{
    HttpMethod, ManifestSource, RawManifest, RemoteError, SshSession, WebServiceClient,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reference manifests previously downloaded from the cloud host, looked up
/// by sync type.
pub struct DownloadedManifests {
    dir: PathBuf,
    folders: BTreeMap<String, String>,
    file_name: String,
}

impl DownloadedManifests {
    pub fn new(dir: &Path, folders: &BTreeMap<String, String>, file_name: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            folders: folders.clone(),
            file_name: file_name.to_owned(),
        }
    }

    pub fn from_config(config: &SuiteConfig) -> Self {
        Self::new(
            &config.download_directory_path,
            &config.sync_folder_map,
            &config.manifest_file_name,
        )
    }

    pub fn path_for(&self, sync_type: &str) -> Option<PathBuf> {
        self.folders
            .get(sync_type)
            .map(|folder| self.dir.join(format!("{folder}{}", self.file_name)))
    }
}

impl ManifestSource for DownloadedManifests {
    fn fetch_manifest(&self, sync_type: &str) -> Result<RawManifest, RemoteError> {
        let path = self.path_for(sync_type).ok_or_else(|| {
            RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no sync folder mapped for '{sync_type}'"),
            ))
        })?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RemoteError::RemoteFileNotFound {
                    host: "localhost".to_owned(),
                    path: path.display().to_string(),
                }
            } else {
                RemoteError::Io(e)
            }
        })?;
        Ok(RawManifest {
            text,
            encoding: ManifestEncoding::Auto,
            origin: path.display().to_string(),
        })
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub sync_type: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    /// Bytes written, or the reason nothing was.
    pub result: Result<u64, String>,
}

/// Copy each mapped cloud manifest into the download directory over one SSH
/// session. Failures are recorded and the remaining folders still run.
pub fn download_reference_manifests(
    config: &SuiteConfig,
    sink: &dyn OutcomeSink,
) -> Vec<DownloadResult> {
    let plan: Vec<(String, String, PathBuf)> = config
        .sync_folder_map
        .iter()
        .map(|(sync_type, folder)| {
            (
                sync_type.clone(),
                config.remote_manifest_path(folder),
                config.local_manifest_path(folder),
            )
        })
        .collect();

    let session = match SshSession::connect(&config.cloud_credentials()) {
        Ok(session) => session,
        Err(e) => {
            sink.error(&format!(
                "Error while getting the SHA sum files from the cloud server: {e}"
            ));
            return plan
                .into_iter()
                .map(|(sync_type, remote_path, local_path)| DownloadResult {
                    sync_type,
                    remote_path,
                    local_path,
                    result: Err(e.to_string()),
                })
                .collect();
        }
    };
    info!("connected to the cloud server {}", session.host());

    plan.into_iter()
        .map(|(sync_type, remote_path, local_path)| {
            let result = session
                .download(&remote_path, &local_path)
                .map_err(|e| e.to_string());
            match &result {
                Ok(size) => sink.pass(&format!(
                    "Downloaded {remote_path} to {} ({size} bytes)",
                    local_path.display()
                )),
                Err(e) => sink.error(&format!("Failed to download {remote_path}: {e}")),
            }
            DownloadResult {
                sync_type,
                remote_path,
                local_path,
                result,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    /// The service answered but broke the contract.
    Failed { violation: String },
    /// The case could not be evaluated.
    Error { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub description: String,
    pub endpoint: String,
    pub status_code: Option<u16>,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
}

/// Run one case against `<api_url><endpoint>`.
pub fn run_case(
    client: &WebServiceClient,
    api_url: &str,
    user_agent: &str,
    case: &TestCase,
    reference: &dyn ManifestSource,
    sink: &dyn OutcomeSink,
) -> CaseResult {
    let url = format!("{api_url}{}", case.endpoint);
    info!("{}: GET {url}", case.description);
    let mut result = CaseResult {
        description: case.description.clone(),
        endpoint: case.endpoint.clone(),
        status_code: None,
        outcome: CaseOutcome::Passed,
    };

    let expectation = match case.expectation() {
        Ok(expectation) => expectation,
        Err(e) => {
            sink.error(&format!("{}: invalid case: {e}", case.description));
            result.outcome = CaseOutcome::Error {
                reason: e.to_string(),
            };
            return result;
        }
    };

    let authorization = case.authorization();
    let headers = [
        ("Authorization", authorization.as_str()),
        ("User-Agent", user_agent),
    ];
    let response = match client.call(HttpMethod::Get, &url, &headers) {
        Ok(response) => response,
        Err(e) => {
            sink.error(&format!("{}: API response is None: {e}", case.description));
            result.outcome = CaseOutcome::Error {
                reason: e.to_string(),
            };
            return result;
        }
    };
    result.status_code = Some(response.status);

    let ctx = ContractContext {
        sync_type: case.sync_type(),
        reference: Some(reference),
    };
    match expectation.check(&response, case.expected_status, &ctx) {
        Ok(()) => sink.pass(&format!("{}: {} passed", case.description, case.endpoint)),
        Err(violation) => {
            sink.error(&format!("{}: {violation}", case.description));
            result.outcome = CaseOutcome::Failed {
                violation: violation.to_string(),
            };
        }
    }
    result
}

/// Download the reference manifests (unless skipped) and run every case in order.
pub fn run_suite(
    config: &SuiteConfig,
    cases: &[TestCase],
    skip_download: bool,
    sink: &dyn OutcomeSink,
) -> std::io::Result<SuiteReport> {
    std::fs::create_dir_all(&config.download_directory_path)?;
    let downloads = if skip_download {
        Vec::new()
    } else {
        download_reference_manifests(config, sink)
    };
    if downloads.iter().any(|d| d.result.is_err()) {
        warn!("some reference manifests are missing; zipfile cases for them will fail");
    }

    let client = WebServiceClient::new(config.webservice());
    let reference = DownloadedManifests::from_config(config);
    let results = cases
        .iter()
        .map(|case| {
            run_case(
                &client,
                &config.cloud_webservice_api_url,
                &config.user_agent,
                case,
                &reference,
                sink,
            )
        })
        .collect();

    Ok(SuiteReport { downloads, results })
}
