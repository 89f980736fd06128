use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Login for one SSH host.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostCredentials {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Blocking calls wait forever when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl HostCredentials {
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.trim().to_owned(),
            port: DEFAULT_SSH_PORT,
            username: username.to_owned(),
            password: password.to_owned(),
            timeout_secs: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Keep passwords out of logs.
impl std::fmt::Debug for HostCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Where and how to reach the web service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl WebServiceConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            headers: BTreeMap::new(),
            verify_tls: false,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
