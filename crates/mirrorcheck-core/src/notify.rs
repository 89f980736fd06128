//! Plain-text result mail.
//!
//! Delivery goes through a local `sendmail`-compatible binary. A failed
//! delivery is logged and never changes the outcome of the run it reports.

use crate::config::EmailConfig;
use chrono::Local;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to hand message to {program}: {source}")]
    Write {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: String },
    #[error("no recipients configured")]
    NoRecipients,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

pub trait Mailer {
    fn send(&self, email: &Email, recipients: &[String]) -> Result<(), NotifyError>;
}

/// RFC 5322 message with a UTF-8 plain-text body.
pub fn render_message(sender: &str, recipients: &[String], email: &Email, date: &str) -> String {
    let mut body = email.body.replace("\r\n", "\n").replace('\n', "\r\n");
    if !body.ends_with("\r\n") {
        body.push_str("\r\n");
    }
    format!(
        "From: {sender}\r\nTo: {}\r\nSubject: {}\r\nDate: {date}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{body}",
        recipients.join(", "),
        email.subject.replace(['\r', '\n'], " "),
    )
}

pub struct SendmailMailer {
    sendmail_path: String,
    sender: String,
}

impl SendmailMailer {
    pub fn new(sendmail_path: &str, sender: &str) -> Self {
        Self {
            sendmail_path: sendmail_path.to_owned(),
            sender: sender.to_owned(),
        }
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        Self::new(&config.sendmail_path, &config.sender)
    }
}

impl Mailer for SendmailMailer {
    fn send(&self, email: &Email, recipients: &[String]) -> Result<(), NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let message = render_message(
            &self.sender,
            recipients,
            email,
            &Local::now().to_rfc2822(),
        );
        let program = self.sendmail_path.clone();

        let mut child = Command::new(&program)
            .arg("-t")
            .arg("-oi")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| NotifyError::Spawn {
                program: program.clone(),
                source,
            })?;

        // stdin is closed at the end of the match so the child sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(message.as_bytes()),
            None => Ok(()),
        };

        // Reap the child on every path, including a failed write.
        let waited = child.wait();
        if let Err(source) = written {
            return Err(NotifyError::Write { program, source });
        }
        let status = waited.map_err(|source| NotifyError::Write {
            program: program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(NotifyError::Exit {
                program,
                status: status.to_string(),
            });
        }
        debug!("handed '{}' to {}", email.subject, self.sendmail_path);
        Ok(())
    }
}

/// Collects messages instead of sending them.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<(Email, Vec<String>)>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Email, Vec<String>)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &Email, recipients: &[String]) -> Result<(), NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((email.clone(), recipients.to_vec()));
        }
        Ok(())
    }
}

/// Send `email` if mail is enabled. Returns whether a message went out.
pub fn deliver(mailer: &dyn Mailer, config: &EmailConfig, email: &Email, failed: bool) -> bool {
    if !config.enabled {
        debug!("email disabled, not sending '{}'", email.subject);
        return false;
    }
    let recipients = config.recipients_for(failed);
    match mailer.send(email, &recipients) {
        Ok(()) => {
            info!("Email sent successfully to {}", recipients.join(", "));
            true
        }
        Err(e) => {
            error!("Failed to send email: {e}");
            false
        }
    }
}
