//! # Registry Event Log
//!
//! Every successful catalog mutation is announced as one [`RegistryEvent`].
//! Events are published *after* the mutation has committed, through
//! [`EventSink::publish`], which returns nothing: a broken log can never
//! undo or fail a catalog write.
//!
//! [`FileEventLog`] hands events to a background task over a channel. The
//! task appends one line per event to a plain text file, creating its
//! directory on first use. Write failures are logged with `tracing::warn!`
//! and the event is dropped.

use super::model::Provider;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What happened to a model set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for RegistryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryAction::Create => "create",
            RegistryAction::Update => "update",
            RegistryAction::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// One line in the registry event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEvent {
    pub at: DateTime<Utc>,
    pub action: RegistryAction,
    pub provider: Provider,
    pub key: String,
    pub display_name: String,
    pub actor: String,
    pub note: Option<String>,
}

impl RegistryEvent {
    pub fn new(
        action: RegistryAction,
        provider: Provider,
        key: &str,
        display_name: &str,
        actor: &str,
        note: Option<String>,
    ) -> Self {
        Self {
            at: Utc::now(),
            action,
            provider,
            key: key.to_string(),
            display_name: display_name.to_string(),
            actor: actor.to_string(),
            note,
        }
    }

    /// Render as a single log line (no trailing newline).
    ///
    /// ```text
    /// 2026-10-19T08:15:02.114Z update asr/base "Whisper base" by admin: rebased after restore
    /// ```
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} {} {}/{} {:?} by {}",
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.action,
            self.provider,
            self.key,
            self.display_name,
            self.actor
        );
        if let Some(note) = self.note.as_deref().filter(|n| !n.trim().is_empty()) {
            line.push_str(": ");
            line.push_str(&note.replace(['\r', '\n'], " "));
        }
        line
    }
}

/// Receiver of registry events. Publishing must never fail the caller.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: RegistryEvent);
}

/// Append-only file log fed by a background writer task.
pub struct FileEventLog {
    tx: Mutex<Option<mpsc::UnboundedSender<RegistryEvent>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl FileEventLog {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<RegistryEvent>();

        let writer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match append_line(&path, &event.to_line()).await {
                    Ok(()) => debug!(action = %event.action, key = %event.key, "registry event written"),
                    Err(e) => warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to write registry event, dropping it"
                    ),
                }
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Stop accepting events and wait until the queued ones are written.
    ///
    /// Events published after this are dropped with a warning. Calling it
    /// twice is harmless.
    pub async fn close(&self) {
        drop(self.tx.lock().unwrap_or_else(|p| p.into_inner()).take());

        let writer = self.writer.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "registry event writer ended abnormally");
            }
        }
    }
}

impl EventSink for FileEventLog {
    fn publish(&self, event: RegistryEvent) {
        let tx = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = tx.as_ref() else {
            warn!(action = %event.action, key = %event.key, "registry event log is closed, dropping event");
            return;
        };
        if let Err(e) = tx.send(event) {
            warn!(action = %e.0.action, key = %e.0.key, "registry event writer is gone, dropping event");
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", line).as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: RegistryAction, note: Option<&str>) -> RegistryEvent {
        RegistryEvent::new(
            action,
            Provider::Asr,
            "base",
            "Whisper base",
            "admin",
            note.map(str::to_string),
        )
    }

    #[test]
    fn test_line_format() {
        let line = event(RegistryAction::Update, Some("moved\nhost")).to_line();
        assert!(line.ends_with(r#"update asr/base "Whisper base" by admin: moved host"#));

        let stamp = line.split(' ').next().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(stamp.ends_with('Z'));

        let without_note = event(RegistryAction::Delete, None).to_line();
        assert!(without_note.ends_with("by admin"));
    }

    #[tokio::test]
    async fn test_file_log_creates_directory_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("registry_events.log");

        let log = FileEventLog::spawn(&path);
        log.publish(event(RegistryAction::Create, None));
        log.publish(event(RegistryAction::Update, Some("rebased")));
        log.close().await;
        log.publish(event(RegistryAction::Delete, None));
        log.close().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" create asr/base "));
        assert!(lines[1].ends_with(": rebased"));
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be: every append fails
        let path = dir.path().join("events.log");
        std::fs::create_dir_all(&path).unwrap();

        let log = FileEventLog::spawn(&path);
        log.publish(event(RegistryAction::Create, None));
        log.close().await;

        assert!(path.is_dir());
    }
}
