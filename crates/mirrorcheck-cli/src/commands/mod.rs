pub mod checksums;
pub mod completions;
pub mod diff;
pub mod endpoints;
pub mod run;
pub mod suite;

use indicatif::{ProgressBar, ProgressStyle};
use mirrorcheck_core::config::{DEFAULT_SUITE_CONFIG_PATH, DEFAULT_SYNC_CONFIG_PATH};
use mirrorcheck_core::{
    deliver, Email, EmailConfig, LogFileSink, SendmailMailer, SuiteConfig, SyncConfig,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_MANIFEST_ERROR: u8 = 3;

/// Options shared by every run subcommand.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub send_email: bool,
}

impl RunOptions {
    fn config_path(&self, default: &str) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(default))
    }

    pub fn load_sync_config(&self) -> Result<SyncConfig, String> {
        SyncConfig::load(&self.config_path(DEFAULT_SYNC_CONFIG_PATH)).map_err(|e| e.to_string())
    }

    pub fn load_suite_config(&self) -> Result<SuiteConfig, String> {
        SuiteConfig::load(&self.config_path(DEFAULT_SUITE_CONFIG_PATH)).map_err(|e| e.to_string())
    }

    /// Mail `email` when allowed by both the command line and the config.
    pub fn send(&self, config: Option<&EmailConfig>, email: &Email, failed: bool) {
        if !self.send_email {
            return;
        }
        if let Some(config) = config {
            deliver(&SendmailMailer::from_config(config), config, email, failed);
        }
    }

    pub fn spinner(&self, msg: &str) -> Option<ProgressBar> {
        (!self.json).then(|| spinner(msg))
    }
}

pub fn open_sink(dir: &Path) -> Result<LogFileSink, String> {
    LogFileSink::new(dir).map_err(|e| format!("failed to open logs in {}: {e}", dir.display()))
}

pub fn exit_code(success: bool) -> u8 {
    if success {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Finish an optional spinner according to `success`.
pub fn finish(pb: Option<&ProgressBar>, success: bool, msg: &str) {
    if let Some(pb) = pb {
        if success {
            spin_ok(pb, msg);
        } else {
            spin_fail(pb, msg);
        }
    }
}

/// Colour report lines by their outcome tag.
pub fn colorize_report(text: &str) -> String {
    use console::Style;
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let styled = if line.starts_with("[PASS]") {
            Style::new().green().apply_to(line).to_string()
        } else if line.starts_with("[FAIL]") {
            Style::new().red().bold().apply_to(line).to_string()
        } else if line.starts_with("[ERROR]") {
            Style::new().red().apply_to(line).to_string()
        } else if line.starts_with("[WARN]") {
            Style::new().yellow().apply_to(line).to_string()
        } else if line.ends_with("passed:") || line.contains("Passed Checksum") {
            Style::new().green().bold().apply_to(line).to_string()
        } else if line.ends_with("failed:")
            || line.ends_with("reached:")
            || line.contains("Failed Checksum")
            || line.contains("Could Not Be Compared")
        {
            Style::new().red().bold().apply_to(line).to_string()
        } else {
            line.to_owned()
        };
        out.push_str(&styled);
        out.push('\n');
    }
    out
}
