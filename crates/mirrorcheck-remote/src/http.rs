use crate::archive;
use crate::{RawManifest, RemoteError, WebServiceConfig};
use mirrorcheck_manifest::ManifestEncoding;
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Endpoints whose name mentions `post` are called with POST, all others with GET.
    pub fn for_endpoint(endpoint: &str) -> Self {
        if endpoint.to_lowercase().contains("post") {
            Self::Post
        } else {
            Self::Get
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A fully read HTTP response. Non-2xx statuses are responses, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_zip(&self) -> bool {
        archive::is_zip(&self.body)
    }

    /// Manifest carried in a single-entry zip body whose entry is named
    /// `entry_name`. The entry holds line-encoded text.
    pub fn archive_manifest(
        &self,
        entry_name: &str,
        origin: &str,
    ) -> Result<RawManifest, RemoteError> {
        let text = archive::manifest_text_from_archive(&self.body, entry_name)?;
        Ok(RawManifest {
            text,
            encoding: ManifestEncoding::Lines,
            origin: origin.to_owned(),
        })
    }
}

/// Blocking client for the sync web service.
pub struct WebServiceClient {
    config: WebServiceConfig,
    agent: ureq::Agent,
}

impl WebServiceClient {
    pub fn new(config: WebServiceConfig) -> Self {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)));
        if !config.verify_tls {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        let agent: ureq::Agent = builder.build().into();
        Self { config, agent }
    }

    pub fn config(&self) -> &WebServiceConfig {
        &self.config
    }

    /// `<base_url>/<endpoint>`, without doubling the slash.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Call `url` with the configured headers plus `extra_headers`.
    pub fn call(
        &self,
        method: HttpMethod,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<ApiResponse, RemoteError> {
        tracing::debug!("{method} {url}");
        let headers = self
            .config
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(extra_headers.iter().copied());

        let result = match method {
            HttpMethod::Get => {
                let mut req = self.agent.get(url);
                for (name, value) in headers {
                    req = req.header(name, value);
                }
                req.call()
            }
            HttpMethod::Post => {
                let mut req = self.agent.post(url);
                for (name, value) in headers {
                    req = req.header(name, value);
                }
                req.send_empty()
            }
        };

        let resp = result.map_err(|e| RemoteError::Connection {
            target: url.to_owned(),
            reason: e.to_string(),
        })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;

        tracing::debug!("{method} {url} -> {status} ({} bytes)", body.len());
        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }

    pub fn get(&self, endpoint: &str) -> Result<ApiResponse, RemoteError> {
        self.call(HttpMethod::Get, &self.endpoint_url(endpoint), &[])
    }
}
