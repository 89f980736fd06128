//! Transports that deliver raw checksum manifests and API responses.
//!
//! The ancor and cloud systems publish manifests through different channels:
//! a file read over SSH/SFTP, or a zip archive returned by the web service.
//! This crate provides both, plus the HTTP client used to poll the service
//! and the archive helpers used to read and write zip bundles.

pub mod archive;
pub mod config;
pub mod http;
pub mod ssh;

pub use archive::{manifest_text_from_archive, ArchiveEntry};
pub use config::{HostCredentials, WebServiceConfig};
pub use http::{ApiResponse, HttpMethod, WebServiceClient};
pub use ssh::{SshManifestSource, SshSession};

use mirrorcheck_manifest::ManifestEncoding;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },
    #[error("authentication as '{user}' on {host} failed: {reason}")]
    Authentication {
        host: String,
        user: String,
        reason: String,
    },
    #[error("remote file not found: {path} on {host}")]
    RemoteFileNotFound { host: String, path: String },
    #[error("SSH error on {host}: {reason}")]
    Ssh { host: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("response is not a zip archive")]
    NotAZipArchive,
    #[error("archive contains {count} entries, expected exactly one")]
    ArchiveContainsUnexpectedFileCount { count: usize },
    #[error("archive entry is '{actual}', expected '{expected}'")]
    UnexpectedArchiveEntry { expected: String, actual: String },
    #[error("corrupt zip archive: {0}")]
    CorruptArchive(String),
}

impl RemoteError {
    /// True when the failure happened before any data was exchanged.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Authentication { .. } | Self::Ssh { .. }
        )
    }
}

/// Manifest text as delivered by a transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawManifest {
    pub text: String,
    pub encoding: ManifestEncoding,
    /// Human-readable location, e.g. `10.0.0.5:/opt/feeds/conf/sha256sum.txt`.
    pub origin: String,
}

/// Something that can produce the raw manifest of a sync folder.
pub trait ManifestSource {
    /// Fetch the manifest for `folder`, relative to the source's base path.
    fn fetch_manifest(&self, folder: &str) -> Result<RawManifest, RemoteError>;

    /// Short label used in logs and reports (host name, side name).
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_classification() {
        let conn = RemoteError::Connection {
            target: "10.0.0.1:22".to_owned(),
            reason: "refused".to_owned(),
        };
        assert!(conn.is_unreachable());
        let missing = RemoteError::RemoteFileNotFound {
            host: "10.0.0.1".to_owned(),
            path: "/x".to_owned(),
        };
        assert!(!missing.is_unreachable());
        assert!(!RemoteError::NotAZipArchive.is_unreachable());
    }

    #[test]
    fn error_messages_name_the_location() {
        let err = RemoteError::RemoteFileNotFound {
            host: "cloud".to_owned(),
            path: "/opt/conf/sha256sum.txt".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "remote file not found: /opt/conf/sha256sum.txt on cloud"
        );
        let err = RemoteError::ArchiveContainsUnexpectedFileCount { count: 2 };
        assert_eq!(
            err.to_string(),
            "archive contains 2 entries, expected exactly one"
        );
    }
}
