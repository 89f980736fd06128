use crate::config::{SyncConfig, SyncTarget};
use crate::report::ApiRunReport;
use crate::sink::OutcomeSink;
use chrono::{DateTime, Local};
use mirrorcheck_remote::archive::{self, write_single_file_zip};
use mirrorcheck_remote::{HttpMethod, RemoteError, WebServiceClient};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Passed,
    /// The service answered with a status outside 200-399.
    Failed,
    /// No HTTP answer at all.
    Unreachable,
}

impl EndpointStatus {
    pub fn from_status_code(code: u16) -> Self {
        if (200..400).contains(&code) {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Unreachable => "unreachable",
        }
    }
}

/// Zipped summary of a passed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedResult {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointResult {
    pub endpoint: String,
    pub method: String,
    pub status: EndpointStatus,
    pub status_code: Option<u16>,
    pub data: String,
    /// Files unpacked from a zip response body.
    pub extracted_files: Vec<PathBuf>,
    pub archive: Option<ArchivedResult>,
    pub checked_at: String,
}

impl EndpointResult {
    pub fn summary(&self) -> String {
        format!(
            "API Endpoint: {}\nStatus Code: {}\nResponse Data:\n{}\n",
            self.endpoint,
            self.status_code
                .map_or_else(|| "N/A".to_owned(), |c| c.to_string()),
            self.data
        )
    }
}

/// `api_result_<endpoint>_<stamp>` with `/` and `?` replaced by `_`.
pub fn archive_stem(endpoint: &str, now: &DateTime<Local>) -> String {
    format!(
        "api_result_{}_{}",
        endpoint.replace(['/', '?'], "_"),
        now.format(ARCHIVE_STAMP_FORMAT)
    )
}

/// Decode a response body. Zip bodies are unpacked into `log_dir`; the data is
/// then the text of the last entry.
pub fn decode_body(
    body: &[u8],
    log_dir: &Path,
    sink: &dyn OutcomeSink,
) -> (String, Vec<PathBuf>) {
    let raw = String::from_utf8_lossy(body).into_owned();
    if !archive::is_zip(body) {
        return (raw, Vec::new());
    }

    let entries = match archive::read_entries(body) {
        Ok(entries) => entries,
        Err(e) => {
            sink.error(&format!("Error unzipping content: {e}"));
            return (raw, Vec::new());
        }
    };

    let mut data = raw;
    let mut extracted = Vec::new();
    for entry in entries {
        let text = entry.text().into_owned();
        // Entry names come from the server; keep only the final component.
        match Path::new(&entry.name).file_name() {
            Some(name) => {
                let path = log_dir.join(name);
                if let Err(e) = std::fs::write(&path, text.as_bytes()) {
                    sink.error(&format!("Error saving {}: {e}", path.display()));
                } else {
                    extracted.push(path);
                }
            }
            None => warn!("skipping archive entry with no file name: '{}'", entry.name),
        }
        data = text;
    }
    (data, extracted)
}

/// Call one endpoint and classify the answer.
pub fn poll_endpoint(
    client: &WebServiceClient,
    endpoint: &str,
    log_dir: &Path,
    sink: &dyn OutcomeSink,
) -> EndpointResult {
    let method = HttpMethod::for_endpoint(endpoint);
    let url = format!("{}?cli=true", client.endpoint_url(endpoint));
    debug!("calling {endpoint} with {method}");
    let checked_at = Local::now().format(REPORT_DATE_FORMAT).to_string();

    let response = match client.call(method, &url, &[]) {
        Ok(resp) => resp,
        Err(e) => {
            let data = match &e {
                RemoteError::Connection { .. } => format!("Connection refused for ({url}): {e}"),
                _ => e.to_string(),
            };
            sink.error(&format!("API: {endpoint} - No response received - {data}"));
            return EndpointResult {
                endpoint: endpoint.to_owned(),
                method: method.to_string(),
                status: EndpointStatus::Unreachable,
                status_code: None,
                data,
                extracted_files: Vec::new(),
                archive: None,
                checked_at,
            };
        }
    };

    let (data, extracted_files) = decode_body(&response.body, log_dir, sink);
    let status = EndpointStatus::from_status_code(response.status);
    let line = format!(
        "API: {endpoint} - Status: {} - Data: {data}",
        response.status
    );
    match status {
        EndpointStatus::Passed => sink.pass(&line),
        _ => sink.error(&line),
    }

    EndpointResult {
        endpoint: endpoint.to_owned(),
        method: method.to_string(),
        status,
        status_code: Some(response.status),
        data,
        extracted_files,
        archive: None,
        checked_at,
    }
}

/// Zip the summary of `result` into `log_dir`.
pub fn archive_result(
    result: &EndpointResult,
    log_dir: &Path,
    now: &DateTime<Local>,
) -> Result<ArchivedResult, RemoteError> {
    let stem = archive_stem(&result.endpoint, now);
    let path = log_dir.join(format!("{stem}.zip"));
    let size = write_single_file_zip(&path, &format!("{stem}.txt"), result.summary().as_bytes())?;
    info!("API result for endpoint {} zipped to {}", result.endpoint, path.display());
    Ok(ArchivedResult { path, size })
}

/// Delete `*.zip` files in `dir` last modified more than `retention` before `now`.
pub fn cleanup_old_archives(
    dir: &Path,
    retention: Duration,
    now: SystemTime,
) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_zip = path.extension().is_some_and(|ext| ext == "zip");
        if !is_zip || !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > retention {
            std::fs::remove_file(&path)?;
            info!("deleted old zip file: {}", path.display());
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

/// Poll every configured endpoint, archive the passing ones and prune old archives.
pub fn run_endpoints(
    config: &SyncConfig,
    target: &SyncTarget,
    sink: &dyn OutcomeSink,
) -> std::io::Result<ApiRunReport> {
    std::fs::create_dir_all(&config.log_path)?;
    let client = WebServiceClient::new(config.webservice(target));
    let started = Local::now();

    let mut results = Vec::with_capacity(config.api_endpoints.len());
    for endpoint in &config.api_endpoints {
        info!("testing endpoint: {endpoint}");
        let mut result = poll_endpoint(&client, endpoint, &config.log_path, sink);
        if result.status == EndpointStatus::Passed {
            match archive_result(&result, &config.log_path, &Local::now()) {
                Ok(archived) => result.archive = Some(archived),
                Err(e) => sink.error(&format!("API: {endpoint} - failed to archive result: {e}")),
            }
        }
        results.push(result);
    }

    let retention = Duration::from_secs(config.archive_retention_days.saturating_mul(86_400));
    let removed_archives = match cleanup_old_archives(&config.log_path, retention, SystemTime::now())
    {
        Ok(removed) => removed,
        Err(e) => {
            warn!("archive cleanup in {} failed: {e}", config.log_path.display());
            Vec::new()
        }
    };

    Ok(ApiRunReport {
        target: target.clone(),
        started_at: started.format(REPORT_DATE_FORMAT).to_string(),
        results,
        removed_archives,
    })
}
