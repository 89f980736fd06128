//! CLI subprocess integration tests.
//!
//! These tests invoke the `mirrorcheck` binary as a subprocess and verify
//! exit codes, stdout content, and JSON output stability.

use mirrorcheck_stub::{StubResponse, TestServer};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn mirrorcheck_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mirrorcheck"));
    cmd.env_remove("MIRRORCHECK_LOG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn write_sync_config(dir: &Path, endpoints: &[&str]) -> PathBuf {
    let config = serde_json::json!({
        "ancor_saml": "tok",
        "common_headers": {"Authorization": "SAML tok"},
        "api_endpoints": endpoints,
        "ancor_user": "root",
        "ancor_pwd": "a",
        "cloud_pwd": "c",
        "ancor_path": "/opt/ancor/",
        "cloud_path": "/opt/cloud/",
        "log_path": dir.join("logs"),
        "folders_shasum": ["conf"],
        "ssh_port": 1,
        "webservice_url_template": "http://{cloud_ip}/AncorWebService",
        "http_timeout_secs": 5
    });
    write(dir, "sync-config.txt", &config.to_string())
}

#[test]
fn cli_version_exits_zero() {
    let output = mirrorcheck_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "mirrorcheck --version must exit 0");
    assert!(stdout(&output).contains("mirrorcheck"));
}

#[test]
fn cli_help_lists_commands() {
    let output = mirrorcheck_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    for name in ["endpoints", "checksums", "run", "suite", "diff", "completions"] {
        assert!(out.contains(name), "help must list '{name}': {out}");
    }
}

#[test]
fn cli_diff_accepts_mixed_encodings() {
    let dir = tempfile::tempdir().unwrap();
    let left = write(dir.path(), "ancor.txt", "a/b.txt=111\nc/d.txt=222\n");
    let right = write(dir.path(), "cloud.txt", "|a/b.txt=111||c/d.txt=222|");

    let output = mirrorcheck_bin()
        .args(["diff", "--right-encoding", "double_pipe"])
        .arg(&left)
        .arg(&right)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("manifests match (2 entries)"));
}

#[test]
fn cli_diff_reports_divergence_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let left = write(dir.path(), "ancor.txt", "a=1\nb=2\n");
    let right = write(dir.path(), "cloud.txt", "a=1\nb=3\nc=4\n");

    let output = mirrorcheck_bin()
        .args(["--json", "diff"])
        .arg(&left)
        .arg(&right)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["equal"], false);
    assert_eq!(json["diff"]["only_right"][0], "c");
    assert_eq!(json["diff"]["mismatched"][0]["path"], "b");
}

#[test]
fn cli_diff_malformed_manifest_exits_three() {
    let dir = tempfile::tempdir().unwrap();
    let left = write(dir.path(), "ancor.txt", "a=1\nno-separator\n");
    let right = write(dir.path(), "cloud.txt", "a=1\n");

    let output = mirrorcheck_bin()
        .arg("diff")
        .arg(&left)
        .arg(&right)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("malformed manifest line 2"));
}

#[test]
fn cli_missing_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let output = mirrorcheck_bin()
        .arg("--config")
        .arg(dir.path().join("absent.json"))
        .args(["endpoints", "10.0.0.1", "10.0.0.2"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("failed to read config"));
}

#[test]
fn cli_invalid_config_lists_every_problem() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "sync-config.txt", r#"{"ancor_saml": "t", "ssh_port": "x"}"#);

    let output = mirrorcheck_bin()
        .arg("--config")
        .arg(&config)
        .args(["checksums", "10.0.0.1", "10.0.0.2"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    for field in ["api_endpoints", "ancor_pwd", "folders_shasum", "ssh_port"] {
        assert!(err.contains(field), "missing '{field}' in: {err}");
    }
}

#[test]
fn cli_endpoints_against_stub() {
    let server = TestServer::start();
    server.route("/AncorWebService/getVersion", StubResponse::text(200, "6.3.0"));
    server.route("/AncorWebService/postAudit", StubResponse::text(200, "ok"));
    let dir = tempfile::tempdir().unwrap();
    let config = write_sync_config(dir.path(), &["getVersion", "postAudit"]);

    let output = mirrorcheck_bin()
        .arg("--config")
        .arg(&config)
        .args(["--json", "--no-email", "endpoints"])
        .arg(format!("127.0.0.1:{}", server.port))
        .arg("127.0.0.1")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
    assert_eq!(json["results"][0]["status"], "passed");
    assert_eq!(json["results"][1]["method"], "POST");
    assert!(dir.path().join("logs").join("pass.log").exists());
}

#[test]
fn cli_endpoints_failure_exits_one() {
    let server = TestServer::start();
    server.route("/AncorWebService/getVersion", StubResponse::text(500, "down"));
    let dir = tempfile::tempdir().unwrap();
    let config = write_sync_config(dir.path(), &["getVersion"]);

    let output = mirrorcheck_bin()
        .arg("--config")
        .arg(&config)
        .args(["endpoints"])
        .arg(format!("127.0.0.1:{}", server.port))
        .arg("127.0.0.1")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Endpoint: getVersion - Status Code: 500"));
}

#[test]
fn cli_checksums_unreachable_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_sync_config(dir.path(), &[]);

    let output = mirrorcheck_bin()
        .arg("--config")
        .arg(&config)
        .args(["--json", "checksums", "127.0.0.1", "127.0.0.1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["results"][0]["outcome"], "could_not_compare");
    assert_eq!(json["results"][0]["folders"]["cloud"], "conf_sync");
}

#[test]
fn cli_suite_runs_cases_in_order() {
    let server = TestServer::start();
    server.route("/api/getVersion", StubResponse::text(200, "6.3.0"));
    server.route("/api/isEnabled", StubResponse::text(200, "2"));
    let dir = tempfile::tempdir().unwrap();
    let config = serde_json::json!({
        "cloud_webservice_api_url": format!("{}/api/", server.url),
        "cloud_ip": "127.0.0.1",
        "cloud_content_files_path": "/opt/content/",
        "sync_folder_map": {},
        "download_directory_path": dir.path().join("downloads"),
        "cloud_ssh_user": "root",
        "cloud_ssh_password": "pw"
    });
    let config = write(dir.path(), "config.json", &config.to_string());
    let cases = write(
        dir.path(),
        "cases.toml",
        r#"
[[cases]]
description = "version"
endpoint = "getVersion"
saml = "tok"
expected_status = 200
response_type = "text"
expected_response = "6.3.0"

[[cases]]
description = "flag"
endpoint = "isEnabled"
expected_status = 200
response_type = "binary"
expected_response = "1"
"#,
    );

    let output = mirrorcheck_bin()
        .arg("--config")
        .arg(&config)
        .args(["--json", "suite", "--skip-download", "--cases"])
        .arg(&cases)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["results"][0]["outcome"], "passed");
    assert_eq!(json["results"][1]["outcome"], "failed");

    let requests = server.captured_requests();
    assert_eq!(requests[0].header("authorization"), Some("SAML tok"));
}

#[test]
fn cli_completions_bash() {
    let output = mirrorcheck_bin()
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("mirrorcheck"));
}
