//! Sync verification runs for mirrorcheck.
//!
//! This crate drives the three kinds of run against a cloud/ancor pair:
//! endpoint polling with archived results, per-folder checksum comparison,
//! and the data-driven response-contract suite. Every checked unit is
//! recorded through an [`OutcomeSink`], and each run produces a report that
//! renders for the console and for mail.

pub mod cases;
pub mod checksums;
pub mod config;
pub mod contracts;
pub mod endpoints;
pub mod notify;
pub mod report;
pub mod sink;
pub mod suite;

pub use cases::{load_cases, parse_cases, CaseError, TestCase};
pub use checksums::{compare_folder, compare_folders, run_checksums, FolderOutcome, FolderResult};
pub use config::{ConfigError, EmailConfig, SuiteConfig, SyncConfig, SyncTarget};
pub use contracts::{ContractContext, ContractViolation, ResponseExpectation, ResponseKind};
pub use endpoints::{poll_endpoint, run_endpoints, EndpointResult, EndpointStatus};
pub use notify::{deliver, Email, Mailer, NotifyError, SendmailMailer};
pub use report::{ApiRunReport, ChecksumRunReport, SuiteReport};
pub use sink::{LogFileSink, MemorySink, Outcome, OutcomeSink};
pub use suite::{run_case, run_suite, CaseOutcome, CaseResult};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("case error: {0}")]
    Case(#[from] CaseError),
    #[error("remote error: {0}")]
    Remote(#[from] mirrorcheck_remote::RemoteError),
    #[error("manifest error: {0}")]
    Manifest(#[from] mirrorcheck_manifest::ManifestError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
