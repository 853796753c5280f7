//! Rolling activity log.
//!
//! Every user-visible outcome — a published status, a rejected credential, a
//! finished meme — lands here as one severity-tagged entry. Only the newest
//! [`MAX_ENTRIES`] are kept, newest first, persisted whole to
//! `{data_dir}/activity.json`. A broken log file must never interrupt the
//! daemon: read and write failures degrade to warnings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

pub const MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: Severity,
    pub message: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

pub struct ActivityLog {
    path: PathBuf,
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl ActivityLog {
    /// Load the persisted log, or start empty if the file is missing or
    /// unreadable.
    pub async fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("activity.json");
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<VecDeque<ActivityEntry>>(&raw) {
                Ok(mut entries) => {
                    entries.truncate(MAX_ENTRIES);
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), err = %e, "activity log unreadable — starting empty");
                    VecDeque::new()
                }
            },
            Err(_) => VecDeque::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Append one entry at the head, dropping the oldest past the cap.
    pub async fn push(&self, kind: Severity, message: impl Into<String>) {
        let entry = ActivityEntry {
            kind,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let mut entries = self.entries.lock().await;
        entries.push_front(entry);
        entries.truncate(MAX_ENTRIES);
        self.persist(&entries).await;
    }

    /// Current entries, newest first.
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.persist(&entries).await;
    }

    async fn persist(&self, entries: &VecDeque<ActivityEntry>) {
        let json = match serde_json::to_vec_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(err = %e, "activity log serialization failed");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, json).await {
            warn!(path = %self.path.display(), err = %e, "activity log write failed");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_keeps_newest_first_and_caps_at_fifty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::load(dir.path()).await;

        for i in 0..60 {
            log.push(Severity::Info, format!("entry {i}")).await;
        }

        let entries = log.entries().await;
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].message, "entry 59");
        assert_eq!(entries.last().unwrap().message, "entry 10");
    }

    #[tokio::test]
    async fn log_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = ActivityLog::load(dir.path()).await;
            log.push(Severity::Error, "token rejected").await;
            log.push(Severity::Success, "status updated").await;
        }
        let reloaded = ActivityLog::load(dir.path()).await;
        let entries = reloaded.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "status updated");
        assert_eq!(entries[0].kind, Severity::Success);
    }

    #[tokio::test]
    async fn clear_empties_log_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::load(dir.path()).await;
        log.push(Severity::Info, "something").await;
        log.clear().await;
        assert!(log.entries().await.is_empty());

        let reloaded = ActivityLog::load(dir.path()).await;
        assert!(reloaded.entries().await.is_empty());
    }
}
