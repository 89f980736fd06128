//! Scriptable stand-in for the sync web service.
//!
//! Routes map a request path (query string ignored) to a canned
//! [`StubResponse`]. Every request is recorded so tests can assert on the
//! method and headers the client sent. Unknown paths answer 404.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tiny_http::{Header, Response, Server, StatusCode};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ZIP_CONTENT_TYPE: &str = "application/zip;charset=utf-8";

#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid route file: {0}")]
    Routes(#[from] toml::de::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// A canned HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: None,
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::text(status, &value.to_string()).with_content_type("application/json")
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: None,
            body,
        }
    }

    /// A 200 response carrying a deflated archive of `entries`.
    pub fn zip(entries: &[(&str, &[u8])]) -> Result<Self, StubError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zip.start_file(*name, options)?;
            zip.write_all(contents)?;
        }
        let body = zip.finish()?.into_inner();
        Ok(Self::bytes(200, body).with_content_type(ZIP_CONTENT_TYPE))
    }

    /// A single-entry manifest archive, as the sync endpoints serve it.
    pub fn zip_manifest(entry_name: &str, text: &str) -> Result<Self, StubError> {
        Self::zip(&[(entry_name, text.as_bytes())])
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_owned());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// A request as the stub saw it. Header names are lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        route_key(&self.url)
    }
}

fn route_key(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// Routes and the request log shared between the server thread and callers.
#[derive(Default)]
pub struct StubState {
    routes: RwLock<HashMap<String, StubResponse>>,
    requests: Mutex<Vec<CapturedRequest>>,
}

impl StubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path: &str, response: StubResponse) {
        if let Ok(mut routes) = self.routes.write() {
            routes.insert(route_key(path).to_owned(), response);
        }
    }

    pub fn lookup(&self, url: &str) -> Option<StubResponse> {
        self.routes
            .read()
            .ok()
            .and_then(|routes| routes.get(route_key(url)).cloned())
    }

    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.requests
            .lock()
            .map(|reqs| reqs.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: CapturedRequest) {
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request);
        }
    }
}

/// One `[[routes]]` entry of a route file.
#[derive(Debug, Deserialize)]
struct RouteSpec {
    path: String,
    #[serde(default = "default_status")]
    status: u16,
    content_type: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    zip_entries: Vec<ZipEntrySpec>,
}

#[derive(Debug, Deserialize)]
struct ZipEntrySpec {
    name: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default)]
    routes: Vec<RouteSpec>,
}

fn default_status() -> u16 {
    200
}

/// Parse a TOML route file into `(path, response)` pairs.
///
/// A route with `zip_entries` serves an archive of those entries instead of `body`.
pub fn parse_routes(input: &str) -> Result<Vec<(String, StubResponse)>, StubError> {
    let file: RouteFile = toml::from_str(input)?;
    file.routes
        .into_iter()
        .map(|spec| {
            let response = if spec.zip_entries.is_empty() {
                StubResponse::text(spec.status, &spec.body)
            } else {
                let entries: Vec<(&str, &[u8])> = spec
                    .zip_entries
                    .iter()
                    .map(|e| (e.name.as_str(), e.body.as_bytes()))
                    .collect();
                StubResponse::zip(&entries)?.with_status(spec.status)
            };
            let response = match spec.content_type {
                Some(ct) => response.with_content_type(&ct),
                None => response,
            };
            Ok((spec.path, response))
        })
        .collect()
}

pub fn load_routes(path: &Path) -> Result<Vec<(String, StubResponse)>, StubError> {
    parse_routes(&std::fs::read_to_string(path)?)
}

fn respond(req: tiny_http::Request, stub: StubResponse) {
    let mut response = Response::from_data(stub.body).with_status_code(StatusCode(stub.status));
    if let Some(ct) = stub.content_type {
        if let Ok(header) = Header::from_bytes("Content-Type", ct.as_bytes()) {
            response = response.with_header(header);
        }
    }
    if let Err(e) = req.respond(response) {
        warn!("failed to send response: {e}");
    }
}

/// Record a single HTTP request and answer it from the route table.
pub fn handle_request(state: &StubState, mut req: tiny_http::Request) {
    let method = req.method().to_string();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let headers = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.field.as_str().as_str().to_lowercase(),
                h.value.as_str().to_owned(),
            )
        })
        .collect();
    let mut body = Vec::new();
    if let Err(e) = req.as_reader().read_to_end(&mut body) {
        warn!("{method} {url}: failed to read body: {e}");
    }
    let response = state
        .lookup(&url)
        .unwrap_or_else(|| StubResponse::text(404, "not found"));
    state.record(CapturedRequest {
        method,
        url,
        headers,
        body,
    });
    respond(req, response);
}

/// Start the server loop, blocking the current thread.
pub fn run_server(state: &StubState, addr: &str) -> Result<(), StubError> {
    let server = Server::http(addr).map_err(|e| StubError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })?;
    for request in server.incoming_requests() {
        handle_request(state, request);
    }
    Ok(())
}

/// A test helper that starts a stub server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}`. Dropping the `TestServer` unblocks
/// the listener so the thread exits.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    state: Arc<StubState>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` (random port) with an empty route table.
    pub fn start() -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let state = Arc::new(StubState::new());
        let srv = Arc::clone(&server);
        let st = Arc::clone(&state);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&st, request);
            }
        });

        Self {
            url,
            port,
            state,
            server,
            _handle: handle,
        }
    }

    pub fn route(&self, path: &str, response: StubResponse) {
        self.state.route(path, response);
    }

    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.captured_requests()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_key_drops_query() {
        assert_eq!(route_key("/Svc/version?cli=true"), "/Svc/version");
        assert_eq!(route_key("/Svc/version"), "/Svc/version");
    }

    #[test]
    fn lookup_ignores_query_on_both_sides() {
        let state = StubState::new();
        state.route("/a/b?x=1", StubResponse::text(200, "hit"));
        assert_eq!(state.lookup("/a/b?cli=true").unwrap().body, b"hit");
        assert!(state.lookup("/a/c").is_none());
    }

    #[test]
    fn captured_header_lookup_is_case_insensitive() {
        let req = CapturedRequest {
            method: "GET".to_owned(),
            url: "/x?y=1".to_owned(),
            headers: vec![("user-agent".to_owned(), "qa".to_owned())],
            body: Vec::new(),
        };
        assert_eq!(req.header("User-Agent"), Some("qa"));
        assert_eq!(req.header("missing"), None);
        assert_eq!(req.path(), "/x");
    }

    #[test]
    fn zip_response_starts_with_magic() {
        let resp = StubResponse::zip_manifest("sync.txt", "a=1").unwrap();
        assert!(resp.body.starts_with(b"PK"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type.as_deref(), Some(ZIP_CONTENT_TYPE));
    }

    #[test]
    fn parses_route_file() {
        let routes = parse_routes(
            r#"
[[routes]]
path = "/AncorWebService/version"
content_type = "text/plain"
body = "6.3.0"

[[routes]]
path = "/AncorWebService/broken"
status = 503

[[routes]]
path = "/api/syncsqldata"
content_type = "application/zip;charset=utf-8"
zip_entries = [{ name = "syncsqldata.txt", body = "a=1" }]
"#,
        )
        .unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].1.body, b"6.3.0");
        assert_eq!(routes[0].1.content_type.as_deref(), Some("text/plain"));
        assert_eq!(routes[1].1.status, 503);
        assert!(routes[2].1.body.starts_with(b"PK"));
    }

    #[test]
    fn bad_route_file_is_an_error() {
        assert!(matches!(
            parse_routes("[[routes]]\nstatus = 200\n"),
            Err(StubError::Routes(_))
        ));
    }
}
