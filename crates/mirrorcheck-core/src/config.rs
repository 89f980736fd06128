use mirrorcheck_manifest::ManifestEncoding;
use mirrorcheck_remote::config::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_SSH_PORT};
use mirrorcheck_remote::{HostCredentials, WebServiceConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SYNC_CONFIG_PATH: &str = "sync-config.txt";
pub const DEFAULT_SUITE_CONFIG_PATH: &str = "resources/config.json";
pub const DEFAULT_WEBSERVICE_URL_TEMPLATE: &str = "https://{cloud_ip}/AncorWebService";
pub const DEFAULT_MANIFEST_FILE_NAME: &str = "sha256sum.txt";
pub const DEFAULT_USER_AGENT: &str = "Saner-Inhouse-Automation";
pub const DEFAULT_ARCHIVE_RETENTION_DAYS: u64 = 7;
pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },
}

/// Reads fields out of a JSON object one at a time, collecting every problem
/// so a broken file is reported in a single pass.
struct FieldReader<'a> {
    doc: &'a Map<String, Value>,
    prefix: &'a str,
    problems: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(doc: &'a Map<String, Value>, prefix: &'a str) -> Self {
        Self {
            doc,
            prefix,
            problems: Vec::new(),
        }
    }

    fn name(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn decode<T: DeserializeOwned>(&mut self, key: &str, value: &Value) -> Option<T> {
        match T::deserialize(value) {
            Ok(v) => Some(v),
            Err(e) => {
                self.problems
                    .push(format!("field '{}' has the wrong type: {e}", self.name(key)));
                None
            }
        }
    }

    fn required<T: DeserializeOwned + Default>(&mut self, key: &str) -> T {
        match self.doc.get(key) {
            None | Some(Value::Null) => {
                self.problems
                    .push(format!("missing required field '{}'", self.name(key)));
                T::default()
            }
            Some(value) => self.decode(key, value).unwrap_or_default(),
        }
    }

    fn optional<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        match self.doc.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.decode(key, value),
        }
    }

    fn or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> T {
        self.optional(key).unwrap_or(default)
    }

    fn problem(&mut self, message: String) {
        self.problems.push(message);
    }

    fn finish(self) -> Vec<String> {
        self.problems
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ConfigError> {
    value.as_object().ok_or_else(|| ConfigError::Invalid {
        problems: vec!["config must be a JSON object".to_owned()],
    })
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn into_result<T>(value: T, problems: Vec<String>) -> Result<T, ConfigError> {
    if problems.is_empty() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { problems })
    }
}

/// Mail delivery settings shared by both modes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailConfig {
    pub sender: String,
    pub recipients: Vec<String>,
    /// Added to `recipients` when a run fails.
    #[serde(default)]
    pub failure_recipients: Vec<String>,
    #[serde(default = "default_sendmail_path")]
    pub sendmail_path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_sendmail_path() -> String {
    DEFAULT_SENDMAIL_PATH.to_owned()
}

fn default_true() -> bool {
    true
}

impl EmailConfig {
    fn read(value: &Value, problems: &mut Vec<String>) -> Option<Self> {
        let Some(doc) = value.as_object() else {
            problems.push("field 'email' must be an object".to_owned());
            return None;
        };
        let mut r = FieldReader::new(doc, "email.");
        let config = Self {
            sender: r.required("sender"),
            recipients: r.required("recipients"),
            failure_recipients: r.or("failure_recipients", Vec::new()),
            sendmail_path: r.or("sendmail_path", default_sendmail_path()),
            enabled: r.or("enabled", true),
        };
        if config.recipients.is_empty() && doc.contains_key("recipients") {
            r.problem("field 'email.recipients' must not be empty".to_owned());
        }
        let found = r.finish();
        let ok = found.is_empty();
        problems.extend(found);
        ok.then_some(config)
    }

    /// Recipients for a run with the given result.
    pub fn recipients_for(&self, failed: bool) -> Vec<String> {
        let mut out = self.recipients.clone();
        if failed {
            for r in &self.failure_recipients {
                if !out.contains(r) {
                    out.push(r.clone());
                }
            }
        }
        out
    }
}

/// Script-mode settings: endpoint polling and folder comparison between two hosts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncConfig {
    pub ancor_saml: String,
    pub common_headers: BTreeMap<String, String>,
    pub api_endpoints: Vec<String>,
    pub ancor_user: String,
    #[serde(skip_serializing)]
    pub ancor_pwd: String,
    pub cloud_user: String,
    #[serde(skip_serializing)]
    pub cloud_pwd: String,
    pub ancor_path: String,
    pub cloud_path: String,
    pub log_path: PathBuf,
    pub folders_shasum: Vec<String>,
    pub ssh_port: u16,
    pub webservice_url_template: String,
    pub verify_tls: bool,
    pub http_timeout_secs: u64,
    pub archive_retention_days: u64,
    pub cloud_manifest_encoding: ManifestEncoding,
    pub ancor_manifest_encoding: ManifestEncoding,
    pub manifest_file_name: String,
    pub email: Option<EmailConfig>,
}

/// The two hosts of one run, given on the command line.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncTarget {
    pub cloud_ip: String,
    pub ancor_ip: String,
}

impl SyncTarget {
    pub fn new(cloud_ip: &str, ancor_ip: &str) -> Self {
        Self {
            cloud_ip: cloud_ip.trim().to_owned(),
            ancor_ip: ancor_ip.trim().to_owned(),
        }
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_value(&read_json(path)?)
    }

    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        Self::from_value(&serde_json::from_str(input)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let doc = as_object(value)?;
        let mut r = FieldReader::new(doc, "");

        let ancor_user: String = r.required("ancor_user");
        let cloud_user = r.optional("cloud_user").unwrap_or_else(|| ancor_user.clone());
        let config = Self {
            ancor_saml: r.required("ancor_saml"),
            common_headers: r.required("common_headers"),
            api_endpoints: r.required("api_endpoints"),
            ancor_pwd: r.required("ancor_pwd"),
            cloud_pwd: r.required("cloud_pwd"),
            ancor_path: r.required("ancor_path"),
            cloud_path: r.required("cloud_path"),
            log_path: r.required("log_path"),
            folders_shasum: r.required("folders_shasum"),
            ssh_port: r.or("ssh_port", DEFAULT_SSH_PORT),
            webservice_url_template: r.or(
                "webservice_url_template",
                DEFAULT_WEBSERVICE_URL_TEMPLATE.to_owned(),
            ),
            verify_tls: r.or("verify_tls", false),
            http_timeout_secs: r.or("http_timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS),
            archive_retention_days: r.or("archive_retention_days", DEFAULT_ARCHIVE_RETENTION_DAYS),
            cloud_manifest_encoding: r.or("cloud_manifest_encoding", ManifestEncoding::DoublePipe),
            ancor_manifest_encoding: r.or("ancor_manifest_encoding", ManifestEncoding::Lines),
            manifest_file_name: r.or("manifest_file_name", DEFAULT_MANIFEST_FILE_NAME.to_owned()),
            email: None,
            ancor_user,
            cloud_user,
        };

        if !config.webservice_url_template.contains("{cloud_ip}") {
            r.problem("field 'webservice_url_template' must contain '{cloud_ip}'".to_owned());
        }
        if config.http_timeout_secs == 0 {
            r.problem("field 'http_timeout_secs' must be greater than zero".to_owned());
        }
        let mut problems = r.finish();
        let email = doc
            .get("email")
            .filter(|v| !v.is_null())
            .and_then(|v| EmailConfig::read(v, &mut problems));

        into_result(Self { email, ..config }, problems)
    }

    pub fn webservice_url(&self, target: &SyncTarget) -> String {
        self.webservice_url_template
            .replace("{cloud_ip}", &target.cloud_ip)
    }

    pub fn webservice(&self, target: &SyncTarget) -> WebServiceConfig {
        WebServiceConfig::new(&self.webservice_url(target))
            .with_headers(&self.common_headers)
            .with_tls_verification(self.verify_tls)
            .with_timeout(self.http_timeout_secs)
    }

    pub fn ancor_credentials(&self, target: &SyncTarget) -> HostCredentials {
        HostCredentials::new(&target.ancor_ip, &self.ancor_user, &self.ancor_pwd)
            .with_port(self.ssh_port)
    }

    pub fn cloud_credentials(&self, target: &SyncTarget) -> HostCredentials {
        HostCredentials::new(&target.cloud_ip, &self.cloud_user, &self.cloud_pwd)
            .with_port(self.ssh_port)
    }
}

/// Suite-mode settings: contract cases against the cloud web service.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SuiteConfig {
    pub cloud_webservice_api_url: String,
    pub cloud_ip: String,
    pub cloud_content_files_path: String,
    /// Sync type (endpoint name) to content folder.
    pub sync_folder_map: BTreeMap<String, String>,
    pub download_directory_path: PathBuf,
    pub cloud_ssh_user: String,
    #[serde(skip_serializing)]
    pub cloud_ssh_password: String,
    pub ssh_port: u16,
    pub verify_tls: bool,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub manifest_file_name: String,
    pub email: Option<EmailConfig>,
}

impl SuiteConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_value(&read_json(path)?)
    }

    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        Self::from_value(&serde_json::from_str(input)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let doc = as_object(value)?;
        let mut r = FieldReader::new(doc, "");

        let config = Self {
            cloud_webservice_api_url: r.required("cloud_webservice_api_url"),
            cloud_ip: r.required("cloud_ip"),
            cloud_content_files_path: r.required("cloud_content_files_path"),
            sync_folder_map: r.required("sync_folder_map"),
            download_directory_path: r.required("download_directory_path"),
            cloud_ssh_user: r.required("cloud_ssh_user"),
            cloud_ssh_password: r.required("cloud_ssh_password"),
            ssh_port: r.or("ssh_port", DEFAULT_SSH_PORT),
            verify_tls: r.or("verify_tls", false),
            http_timeout_secs: r.or("http_timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: r.or("user_agent", DEFAULT_USER_AGENT.to_owned()),
            manifest_file_name: r.or("manifest_file_name", DEFAULT_MANIFEST_FILE_NAME.to_owned()),
            email: None,
        };
        if config.http_timeout_secs == 0 {
            r.problem("field 'http_timeout_secs' must be greater than zero".to_owned());
        }
        let mut problems = r.finish();
        let email = doc
            .get("email")
            .filter(|v| !v.is_null())
            .and_then(|v| EmailConfig::read(v, &mut problems));

        into_result(Self { email, ..config }, problems)
    }

    pub fn webservice(&self) -> WebServiceConfig {
        WebServiceConfig::new(&self.cloud_webservice_api_url)
            .with_tls_verification(self.verify_tls)
            .with_timeout(self.http_timeout_secs)
    }

    pub fn cloud_credentials(&self) -> HostCredentials {
        HostCredentials::new(&self.cloud_ip, &self.cloud_ssh_user, &self.cloud_ssh_password)
            .with_port(self.ssh_port)
    }

    /// Where the cloud manifest of `folder` lives remotely.
    pub fn remote_manifest_path(&self, folder: &str) -> String {
        format!(
            "{}{folder}/{}",
            self.cloud_content_files_path, self.manifest_file_name
        )
    }

    /// Where the downloaded copy of the `folder` manifest is kept.
    pub fn local_manifest_path(&self, folder: &str) -> PathBuf {
        self.download_directory_path
            .join(format!("{folder}{}", self.manifest_file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNC_CONFIG: &str = r#"{
        "ancor_saml": "saml-token",
        "common_headers": {"Authorization": "SAML saml-token"},
        "api_endpoints": ["getVersion", "postAudit"],
        "ancor_user": "root",
        "ancor_pwd": "a-pw",
        "cloud_pwd": "c-pw",
        "ancor_path": "/opt/ancor/feeds",
        "cloud_path": "/opt/cloud/feeds",
        "log_path": "/var/log/mirrorcheck",
        "folders_shasum": ["conf", "sqldata"]
    }"#;

    fn suite_json() -> Value {
        serde_json::json!({
            "cloud_webservice_api_url": "https://10.0.0.9/AncorWebService/",
            "cloud_ip": "10.0.0.9",
            "cloud_content_files_path": "/opt/content/",
            "sync_folder_map": {"syncsqldata": "sqldata"},
            "download_directory_path": "downloads",
            "cloud_ssh_user": "root",
            "cloud_ssh_password": "pw"
        })
    }

    #[test]
    fn sync_config_applies_defaults() {
        let config = SyncConfig::from_json(SYNC_CONFIG).unwrap();
        assert_eq!(config.cloud_user, "root");
        assert_eq!(config.ssh_port, 22);
        assert_eq!(config.http_timeout_secs, 10);
        assert_eq!(config.archive_retention_days, 7);
        assert_eq!(config.cloud_manifest_encoding, ManifestEncoding::DoublePipe);
        assert_eq!(config.ancor_manifest_encoding, ManifestEncoding::Lines);
        assert_eq!(config.manifest_file_name, "sha256sum.txt");
        assert!(!config.verify_tls);
        assert!(config.email.is_none());
    }

    #[test]
    fn sync_config_builds_webservice_and_credentials() {
        let config = SyncConfig::from_json(SYNC_CONFIG).unwrap();
        let target = SyncTarget::new("10.0.0.1", " 10.0.0.2 ");
        assert_eq!(
            config.webservice_url(&target),
            "https://10.0.0.1/AncorWebService"
        );
        let ws = config.webservice(&target);
        assert_eq!(ws.headers["Authorization"], "SAML saml-token");
        assert_eq!(config.ancor_credentials(&target).address(), "10.0.0.2:22");
        assert_eq!(config.cloud_credentials(&target).password, "c-pw");
    }

    #[test]
    fn sync_config_reports_every_missing_field() {
        let err = SyncConfig::from_json(r#"{"ancor_saml": "x", "ancor_user": 5}"#).unwrap_err();
        let ConfigError::Invalid { problems } = err else {
            panic!("expected Invalid, got {err:?}");
        };
        for field in [
            "common_headers",
            "api_endpoints",
            "ancor_pwd",
            "cloud_pwd",
            "ancor_path",
            "cloud_path",
            "log_path",
            "folders_shasum",
        ] {
            assert!(
                problems.iter().any(|p| p.contains(&format!("'{field}'"))),
                "no problem reported for {field}: {problems:?}"
            );
        }
        assert!(problems
            .iter()
            .any(|p| p.contains("'ancor_user' has the wrong type")));
    }

    #[test]
    fn sync_config_rejects_bad_optional_values() {
        let mut value: Value = serde_json::from_str(SYNC_CONFIG).unwrap();
        value["cloud_manifest_encoding"] = "csv".into();
        value["webservice_url_template"] = "https://fixed/Svc".into();
        value["email"] = serde_json::json!({"recipients": []});
        let ConfigError::Invalid { problems } = SyncConfig::from_value(&value).unwrap_err() else {
            panic!("expected Invalid");
        };
        assert_eq!(problems.len(), 4, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("cloud_manifest_encoding")));
        assert!(problems.iter().any(|p| p.contains("{cloud_ip}")));
        assert!(problems.iter().any(|p| p.contains("'email.sender'")));
        assert!(problems.iter().any(|p| p.contains("email.recipients")));
    }

    #[test]
    fn sync_config_reads_email_section() {
        let mut value: Value = serde_json::from_str(SYNC_CONFIG).unwrap();
        value["email"] = serde_json::json!({
            "sender": "qa@example.com",
            "recipients": ["team@example.com"],
            "failure_recipients": ["oncall@example.com", "team@example.com"]
        });
        let email = SyncConfig::from_value(&value).unwrap().email.unwrap();
        assert_eq!(email.sendmail_path, DEFAULT_SENDMAIL_PATH);
        assert!(email.enabled);
        assert_eq!(email.recipients_for(false), vec!["team@example.com"]);
        assert_eq!(
            email.recipients_for(true),
            vec!["team@example.com", "oncall@example.com"]
        );
    }

    #[test]
    fn non_object_config_is_invalid() {
        assert!(matches!(
            SyncConfig::from_json("[1, 2]"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            SuiteConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn suite_config_paths_follow_folder_map() {
        let config = SuiteConfig::from_value(&suite_json()).unwrap();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(
            config.remote_manifest_path("sqldata"),
            "/opt/content/sqldata/sha256sum.txt"
        );
        assert_eq!(
            config.local_manifest_path("sqldata"),
            Path::new("downloads/sqldatasha256sum.txt")
        );
        assert_eq!(
            config.webservice().base_url,
            "https://10.0.0.9/AncorWebService"
        );
    }

    #[test]
    fn suite_config_missing_fields_listed_together() {
        let mut value = suite_json();
        let obj = value.as_object_mut().unwrap();
        obj.remove("cloud_ip");
        obj.remove("cloud_ssh_password");
        let ConfigError::Invalid { problems } = SuiteConfig::from_value(&value).unwrap_err() else {
            panic!("expected Invalid");
        };
        assert_eq!(
            problems,
            vec![
                "missing required field 'cloud_ip'".to_owned(),
                "missing required field 'cloud_ssh_password'".to_owned(),
            ]
        );
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync-config.txt");
        std::fs::write(&path, SYNC_CONFIG).unwrap();
        assert_eq!(SyncConfig::load(&path).unwrap().api_endpoints.len(), 2);

        let err = SyncConfig::load(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
