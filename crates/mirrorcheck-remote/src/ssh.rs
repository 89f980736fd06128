use crate::{HostCredentials, ManifestSource, RawManifest, RemoteError};
use mirrorcheck_manifest::ManifestEncoding;
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;

/// libssh2's `LIBSSH2_FX_NO_SUCH_FILE` SFTP status.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// An authenticated SSH session. Disconnects when dropped, on every path.
pub struct SshSession {
    session: ssh2::Session,
    host: String,
}

impl SshSession {
    pub fn connect(creds: &HostCredentials) -> Result<Self, RemoteError> {
        let addr = creds.address();
        tracing::debug!("connecting to {addr} as {}", creds.username);

        let tcp = TcpStream::connect(&addr).map_err(|e| RemoteError::Connection {
            target: addr.clone(),
            reason: e.to_string(),
        })?;
        let mut session = ssh2::Session::new().map_err(|e| RemoteError::Ssh {
            host: creds.host.clone(),
            reason: e.to_string(),
        })?;
        session.set_tcp_stream(tcp);
        if let Some(secs) = creds.timeout_secs {
            session.set_timeout(u32::try_from(secs.saturating_mul(1000)).unwrap_or(u32::MAX));
        }
        session.handshake().map_err(|e| RemoteError::Connection {
            target: addr.clone(),
            reason: format!("SSH handshake failed: {e}"),
        })?;

        let session = Self {
            session,
            host: creds.host.clone(),
        };
        session
            .session
            .userauth_password(&creds.username, &creds.password)
            .map_err(|e| RemoteError::Authentication {
                host: creds.host.clone(),
                user: creds.username.clone(),
                reason: e.to_string(),
            })?;
        if !session.session.authenticated() {
            return Err(RemoteError::Authentication {
                host: creds.host.clone(),
                user: creds.username.clone(),
                reason: "server did not accept the password".to_owned(),
            });
        }
        Ok(session)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Read a whole remote file over SFTP.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let sftp = self.session.sftp().map_err(|e| self.ssh_error(&e))?;
        let mut file = sftp.open(Path::new(path)).map_err(|e| {
            if matches!(e.code(), ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) {
                RemoteError::RemoteFileNotFound {
                    host: self.host.clone(),
                    path: path.to_owned(),
                }
            } else {
                self.ssh_error(&e)
            }
        })?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        tracing::debug!("read {} bytes from {}:{path}", data.len(), self.host);
        Ok(data)
    }

    /// Copy a remote file to `local`, creating parent directories.
    pub fn download(&self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        let data = self.read_file(remote)?;
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local, &data)?;
        Ok(data.len() as u64)
    }

    fn ssh_error(&self, e: &ssh2::Error) -> RemoteError {
        RemoteError::Ssh {
            host: self.host.clone(),
            reason: e.to_string(),
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "mirrorcheck done", None) {
            tracing::debug!("disconnect from {} failed: {e}", self.host);
        }
    }
}

/// Join remote path segments with single slashes.
pub fn remote_path(base: &str, folder: &str, file_name: &str) -> String {
    let base = base.trim_end_matches('/');
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{base}/{file_name}")
    } else {
        format!("{base}/{folder}/{file_name}")
    }
}

/// Reads `<base_path>/<folder>/<file_name>` from one host, one session per fetch.
#[derive(Debug, Clone)]
pub struct SshManifestSource {
    credentials: HostCredentials,
    base_path: String,
    file_name: String,
    encoding: ManifestEncoding,
}

impl SshManifestSource {
    pub fn new(
        credentials: HostCredentials,
        base_path: &str,
        file_name: &str,
        encoding: ManifestEncoding,
    ) -> Self {
        Self {
            credentials,
            base_path: base_path.to_owned(),
            file_name: file_name.to_owned(),
            encoding,
        }
    }

    pub fn manifest_path(&self, folder: &str) -> String {
        remote_path(&self.base_path, folder, &self.file_name)
    }
}

impl ManifestSource for SshManifestSource {
    fn fetch_manifest(&self, folder: &str) -> Result<RawManifest, RemoteError> {
        let path = self.manifest_path(folder);
        let session = SshSession::connect(&self.credentials)?;
        let data = session.read_file(&path)?;
        drop(session);

        Ok(RawManifest {
            text: String::from_utf8_lossy(&data).trim().to_owned(),
            encoding: self.encoding,
            origin: format!("{}:{path}", self.credentials.host),
        })
    }

    fn describe(&self) -> String {
        self.credentials.host.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_path_joins_segments() {
        assert_eq!(
            remote_path("/opt/feeds/", "conf", "sha256sum.txt"),
            "/opt/feeds/conf/sha256sum.txt"
        );
        assert_eq!(
            remote_path("/opt/feeds", "/sql/data/", "sha256sum.txt"),
            "/opt/feeds/sql/data/sha256sum.txt"
        );
        assert_eq!(remote_path("/opt", "", "m.txt"), "/opt/m.txt");
    }

    #[test]
    fn source_builds_manifest_path() {
        let source = SshManifestSource::new(
            HostCredentials::new("10.0.0.3", "root", "pw"),
            "/var/lib/content",
            "sha256sum.txt",
            ManifestEncoding::DoublePipe,
        );
        assert_eq!(
            source.manifest_path("conf_sync"),
            "/var/lib/content/conf_sync/sha256sum.txt"
        );
        assert_eq!(source.describe(), "10.0.0.3");
    }

    #[test]
    fn unreachable_host_is_connection_error() {
        let source = SshManifestSource::new(
            HostCredentials::new("127.0.0.1", "root", "pw").with_port(1),
            "/opt",
            "sha256sum.txt",
            ManifestEncoding::Lines,
        );
        let err = source.fetch_manifest("conf").unwrap_err();
        assert!(matches!(err, RemoteError::Connection { .. }), "{err:?}");
        assert!(err.is_unreachable());
    }
}
