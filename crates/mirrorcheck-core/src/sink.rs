use serde::Serialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const PASS_LOG: &str = "pass.log";
pub const ERROR_LOG: &str = "error.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Error,
}

impl Outcome {
    fn channel(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Error => "error",
        }
    }

    fn level(self) -> &'static str {
        match self {
            Self::Pass => "INFO",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

/// Receives the pass/error record of every unit a run checks.
pub trait OutcomeSink {
    fn record(&self, outcome: Outcome, message: &str);

    fn pass(&self, message: &str) {
        self.record(Outcome::Pass, message);
    }

    fn error(&self, message: &str) {
        self.record(Outcome::Error, message);
    }
}

/// `2024-09-10 14:03:22,117 - pass - INFO - message`
pub fn format_line(timestamp: &str, outcome: Outcome, message: &str) -> String {
    format!(
        "{timestamp} - {} - {} - {message}",
        outcome.channel(),
        outcome.level()
    )
}

/// Appends outcomes to `pass.log` and `error.log` in a directory.
#[derive(Debug, Clone)]
pub struct LogFileSink {
    dir: PathBuf,
}

impl LogFileSink {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self, outcome: Outcome) -> PathBuf {
        match outcome {
            Outcome::Pass => self.dir.join(PASS_LOG),
            Outcome::Error => self.dir.join(ERROR_LOG),
        }
    }

    fn append(&self, outcome: Outcome, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(outcome))?;
        writeln!(file, "{line}")
    }
}

impl OutcomeSink for LogFileSink {
    fn record(&self, outcome: Outcome, message: &str) {
        match outcome {
            Outcome::Pass => tracing::info!("{message}"),
            Outcome::Error => tracing::error!("{message}"),
        }
        let ts = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S,%3f")
            .to_string();
        if let Err(e) = self.append(outcome, &format_line(&ts, outcome, message)) {
            tracing::warn!(
                "failed to write {}: {e}",
                self.log_path(outcome).display()
            );
        }
    }
}

/// Keeps outcomes in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Outcome, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Outcome, String)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self, outcome: Outcome) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(o, _)| *o == outcome)
            .map(|(_, m)| m)
            .collect()
    }
}

impl OutcomeSink for MemorySink {
    fn record(&self, outcome: Outcome, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((outcome, message.to_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_matches_log_layout() {
        assert_eq!(
            format_line("2024-09-10 14:03:22,117", Outcome::Pass, "API: ping - Status: 200"),
            "2024-09-10 14:03:22,117 - pass - INFO - API: ping - Status: 200"
        );
        assert_eq!(
            format_line("t", Outcome::Error, "boom"),
            "t - error - ERROR - boom"
        );
    }

    #[test]
    fn file_sink_splits_by_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogFileSink::new(&dir.path().join("logs")).unwrap();
        sink.pass("first pass");
        sink.error("first error");
        sink.pass("second pass");

        let pass = std::fs::read_to_string(sink.log_path(Outcome::Pass)).unwrap();
        let error = std::fs::read_to_string(sink.log_path(Outcome::Error)).unwrap();
        assert_eq!(pass.lines().count(), 2);
        assert!(pass.lines().all(|l| l.contains(" - pass - INFO - ")));
        assert!(pass.ends_with("second pass\n"));
        assert_eq!(error.lines().count(), 1);
        assert!(error.contains(" - error - ERROR - first error"));
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.error("a");
        sink.pass("b");
        sink.error("c");
        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.messages(Outcome::Error), vec!["a", "c"]);
        assert_eq!(sink.messages(Outcome::Pass), vec!["b"]);
    }
}
