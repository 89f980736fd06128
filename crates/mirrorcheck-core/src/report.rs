use crate::checksums::{FolderOutcome, FolderResult};
use crate::config::SyncTarget;
use crate::endpoints::{EndpointResult, EndpointStatus, REPORT_DATE_FORMAT};
use crate::notify::Email;
use crate::suite::{CaseOutcome, CaseResult, DownloadResult};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;

const GREETING: &str = "Hi Teams,\n\n";
const SIGNATURE: &str = "Regards,\nQA Team";

fn subject(passed: bool, title: &str, now: &DateTime<Local>) -> String {
    let tag = if passed { "[PASS]" } else { "[FAIL]" };
    format!("{tag} {title} - {}", now.format(REPORT_DATE_FORMAT))
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiRunReport {
    pub target: SyncTarget,
    pub started_at: String,
    pub results: Vec<EndpointResult>,
    pub removed_archives: Vec<PathBuf>,
}

impl ApiRunReport {
    fn with_status(&self, status: EndpointStatus) -> impl Iterator<Item = &EndpointResult> {
        self.results.iter().filter(move |r| r.status == status)
    }

    pub fn passed(&self) -> usize {
        self.with_status(EndpointStatus::Passed).count()
    }

    pub fn failed(&self) -> usize {
        self.with_status(EndpointStatus::Failed).count()
    }

    pub fn unreachable(&self) -> usize {
        self.with_status(EndpointStatus::Unreachable).count()
    }

    pub fn is_success(&self) -> bool {
        self.passed() == self.results.len()
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "API Tests - Pass: {}, Fail: {}, Unreachable: {}\n",
            self.passed(),
            self.failed(),
            self.unreachable()
        );
        for (status, heading) in [
            (EndpointStatus::Passed, "APIs that passed"),
            (EndpointStatus::Failed, "APIs that failed"),
            (EndpointStatus::Unreachable, "APIs that could not be reached"),
        ] {
            let mut rows = self.with_status(status).peekable();
            if rows.peek().is_none() {
                continue;
            }
            let _ = writeln!(out, "\n{heading}:");
            for r in rows {
                let code = r
                    .status_code
                    .map_or_else(|| "N/A".to_owned(), |c| c.to_string());
                let _ = writeln!(out, "Endpoint: {} - Status Code: {code}", r.endpoint);
                if let Some(archive) = &r.archive {
                    let _ = writeln!(
                        out,
                        "  archived to {} ({} bytes)",
                        archive.path.display(),
                        archive.size
                    );
                }
            }
        }
        for path in &self.removed_archives {
            let _ = writeln!(out, "Deleted old zip file: {}", path.display());
        }
        out
    }

    pub fn email(&self, now: &DateTime<Local>) -> Email {
        let mut body = format!("{GREETING}API Test Results:\n\n");
        for r in &self.results {
            let code = r
                .status_code
                .map_or_else(|| "N/A".to_owned(), |c| c.to_string());
            let (path, size) = r.archive.as_ref().map_or_else(
                || ("N/A".to_owned(), "N/A".to_owned()),
                |a| (a.path.display().to_string(), a.size.to_string()),
            );
            let _ = write!(
                body,
                "Endpoint: {}\nResult: {}\nStatus Code: {code}\nZip File Path: {path}\nFile Size: {size} bytes\nDate: {}\nAncor IP: {}\nCloud IP: {}\n\n",
                r.endpoint,
                r.status.as_str(),
                r.checked_at,
                self.target.ancor_ip,
                self.target.cloud_ip,
            );
        }
        body.push('\n');
        body.push_str(SIGNATURE);
        Email {
            subject: subject(self.is_success(), "API Sync Test Result", now),
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecksumRunReport {
    pub target: SyncTarget,
    pub results: Vec<FolderResult>,
}

impl ChecksumRunReport {
    pub fn matched(&self) -> impl Iterator<Item = &FolderResult> {
        self.results.iter().filter(|r| r.is_match())
    }

    pub fn mismatched(&self) -> impl Iterator<Item = &FolderResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FolderOutcome::Mismatch { .. }))
    }

    pub fn could_not_compare(&self) -> impl Iterator<Item = &FolderResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FolderOutcome::CouldNotCompare { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(FolderResult::is_match)
    }

    fn write_folders(&self, out: &mut String, fail_tag: &str) {
        let matched: Vec<_> = self.matched().collect();
        if !matched.is_empty() {
            out.push_str("Folders that Passed Checksum Verification:\n");
            for r in matched {
                let _ = writeln!(out, "- {}", r.folder());
            }
        }

        let mismatched: Vec<_> = self.mismatched().collect();
        if !mismatched.is_empty() {
            let _ = writeln!(out, "\n{fail_tag}Folders that Failed Checksum Verification:");
            for r in mismatched {
                let _ = writeln!(out, "- {}", r.folder());
                if let FolderOutcome::Mismatch { diff } = &r.outcome {
                    for path in &diff.only_left {
                        let _ = writeln!(out, "    only on ancor: {path}");
                    }
                    for path in &diff.only_right {
                        let _ = writeln!(out, "    only on cloud: {path}");
                    }
                    for m in &diff.mismatched {
                        let _ = writeln!(out, "    checksum differs: {}", m.path);
                    }
                }
            }
        }

        let missing: Vec<_> = self.could_not_compare().collect();
        if !missing.is_empty() {
            let _ = writeln!(out, "\n{fail_tag}Folders that Could Not Be Compared:");
            for r in missing {
                if let FolderOutcome::CouldNotCompare { side, reason } = &r.outcome {
                    let _ = writeln!(out, "- {} ({side}): {reason}", r.folder());
                }
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Checksum Check Results - Pass: {}, Fail: {}, Could not compare: {}\n\n",
            self.matched().count(),
            self.mismatched().count(),
            self.could_not_compare().count()
        );
        self.write_folders(&mut out, "");
        out
    }

    pub fn email(&self, now: &DateTime<Local>) -> Email {
        let mut body = format!("{GREETING}Sync File Comparison Result:\n\n");
        self.write_folders(&mut body, "[FAIL] ");
        let _ = write!(
            body,
            "\nAncor IP: {}\nCloud IP: {}\n\n{SIGNATURE}",
            self.target.ancor_ip, self.target.cloud_ip
        );
        Email {
            subject: subject(self.is_success(), "Sync File Comparison Result", now),
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub downloads: Vec<DownloadResult>,
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::Passed))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::Failed { .. }))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, CaseOutcome::Error { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.passed() == self.results.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for d in &self.downloads {
            if let Err(e) = &d.result {
                let _ = writeln!(out, "[WARN] {} not downloaded: {e}", d.remote_path);
            }
        }
        for r in &self.results {
            let _ = match &r.outcome {
                CaseOutcome::Passed => writeln!(out, "[PASS] {} ({})", r.description, r.endpoint),
                CaseOutcome::Failed { violation } => {
                    writeln!(out, "[FAIL] {} ({}): {violation}", r.description, r.endpoint)
                }
                CaseOutcome::Error { reason } => {
                    writeln!(out, "[ERROR] {} ({}): {reason}", r.description, r.endpoint)
                }
            };
        }
        let _ = writeln!(
            out,
            "\nCases - Pass: {}, Fail: {}, Error: {}",
            self.passed(),
            self.failed(),
            self.errors()
        );
        out
    }

    pub fn email(&self, now: &DateTime<Local>) -> Email {
        let mut body = format!("{GREETING}API Contract Suite Result:\n\n");
        body.push_str(&self.render());
        body.push('\n');
        body.push_str(SIGNATURE);
        Email {
            subject: subject(self.is_success(), "API Contract Suite Result", now),
            body,
        }
    }
}
