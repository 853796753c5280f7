//! Durable daemon state.
//!
//! One small JSON file, `{data_dir}/state.json`, holding the most recent
//! meme record with its image payload stripped — each new record overwrites
//! the previous one, so storage stays bounded no matter how long the daemon
//! runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

use crate::meme::MemeRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonState {
    pub last_meme: Option<MemeRecord>,
}

pub struct StateStore {
    path: PathBuf,
    state: Mutex<DaemonState>,
}

impl StateStore {
    pub async fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("state.json");
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), err = %e, "state file unreadable — starting fresh");
                DaemonState::default()
            }),
            Err(_) => DaemonState::default(),
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Record the newest meme, dropping the in-memory image payload.
    pub async fn set_last_meme(&self, record: &MemeRecord) {
        let durable = MemeRecord {
            image_png: Vec::new(),
            ..record.clone()
        };
        let mut state = self.state.lock().await;
        state.last_meme = Some(durable);
        self.persist(&state).await;
    }

    pub async fn last_meme(&self) -> Option<MemeRecord> {
        self.state.lock().await.last_meme.clone()
    }

    async fn persist(&self, state: &DaemonState) {
        let json = match serde_json::to_vec_pretty(state) {
            Ok(json) => json,
            Err(e) => {
                warn!(err = %e, "state serialization failed");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, json).await {
            warn!(path = %self.path.display(), err = %e, "state write failed");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MemeRecord {
        MemeRecord {
            id: "id-1".into(),
            path: None,
            source_host: "example.com".into(),
            original_url: "https://example.com/page".into(),
            caption_text: "a caption".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            image_png: vec![0xFF; 1024],
        }
    }

    #[tokio::test]
    async fn last_meme_overwrites_and_strips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path()).await;

        store.set_last_meme(&record()).await;
        let mut second = record();
        second.id = "id-2".into();
        store.set_last_meme(&second).await;

        let kept = store.last_meme().await.unwrap();
        assert_eq!(kept.id, "id-2");
        assert!(kept.image_png.is_empty(), "payload must not be retained");

        let reloaded = StateStore::load(dir.path()).await;
        assert_eq!(reloaded.last_meme().await.unwrap().id, "id-2");
    }
}
