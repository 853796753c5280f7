pub mod activity;
pub mod caption;
pub mod captioner;
pub mod capture;
pub mod config;
pub mod jobs;
pub mod meme;
pub mod presence;
pub mod rest;
pub mod rules;
pub mod scheduler;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use activity::ActivityLog;
use captioner::CaptionClient;
use config::{Config, Settings};
use presence::{PresenceClient, PublishState};
use rules::RuleSet;
use scheduler::PeriodicJob;
use store::StateStore;

/// Ticks faster than this would just burn CPU re-checking the same tab.
const MIN_INTERVAL_MS: u64 = 250;

/// Shared application state passed to every REST handler and job body.
pub struct AppContext {
    pub data_dir: PathBuf,
    /// Current configuration snapshot. Replaced wholesale, never patched.
    settings: RwLock<Arc<Settings>>,
    /// Rule set compiled from the current snapshot.
    rules: RwLock<Arc<RuleSet>>,
    /// Presence HTTP client; rebuilt when the API base changes.
    pub presence: RwLock<PresenceClient>,
    /// Caption HTTP client; rebuilt when the API base or model changes.
    pub captioner: RwLock<CaptionClient>,
    /// Last successfully published status. Process lifetime only.
    pub publish_state: Mutex<PublishState>,
    /// Active tab URL as last pushed by a companion client.
    pub observed_tab: RwLock<Option<String>>,
    /// Last URL the status job acted on (skip-unchanged key).
    pub last_checked_url: RwLock<Option<String>>,
    /// Last URL the meme job captured (skip-unchanged key).
    pub last_captured_url: RwLock<Option<String>>,
    pub activity: ActivityLog,
    pub store: StateStore,
    pub status_job: PeriodicJob,
    pub meme_job: PeriodicJob,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        let activity = ActivityLog::load(&config.data_dir).await;
        let store = StateStore::load(&config.data_dir).await;
        let presence = PresenceClient::new(&config.settings.presence.api_base)?;
        let captioner = CaptionClient::new(
            &config.settings.captioning.api_base,
            &config.settings.captioning.model,
        )?;
        let rules = RuleSet::compile(&config.settings.rules);

        Ok(Self {
            data_dir: config.data_dir,
            settings: RwLock::new(Arc::new(config.settings)),
            rules: RwLock::new(Arc::new(rules)),
            presence: RwLock::new(presence),
            captioner: RwLock::new(captioner),
            publish_state: Mutex::new(PublishState::default()),
            observed_tab: RwLock::new(None),
            last_checked_url: RwLock::new(None),
            last_captured_url: RwLock::new(None),
            activity,
            store,
            status_job: PeriodicJob::new("status-check"),
            meme_job: PeriodicJob::new("meme-generation"),
            started_at: std::time::Instant::now(),
        })
    }

    /// The current configuration snapshot.
    pub async fn settings(&self) -> Arc<Settings> {
        Arc::clone(&*self.settings.read().await)
    }

    /// The rule set compiled from the current snapshot.
    pub async fn rules(&self) -> Arc<RuleSet> {
        Arc::clone(&*self.rules.read().await)
    }

    /// Swap in a complete new snapshot and react to what changed: recompile
    /// rules, rebuild HTTP clients on endpoint changes, and restart or stop
    /// the periodic jobs on interval/enabled changes.
    pub async fn apply_settings(self: &Arc<Self>, new: Settings) {
        let old = self.settings().await;
        let new = Arc::new(new);

        *self.settings.write().await = Arc::clone(&new);
        *self.rules.write().await = Arc::new(RuleSet::compile(&new.rules));

        if old.presence.api_base != new.presence.api_base {
            match PresenceClient::new(&new.presence.api_base) {
                Ok(client) => *self.presence.write().await = client,
                Err(e) => error!(err = %e, "presence client rebuild failed — keeping previous"),
            }
        }
        if old.captioning.api_base != new.captioning.api_base
            || old.captioning.model != new.captioning.model
        {
            match CaptionClient::new(&new.captioning.api_base, &new.captioning.model) {
                Ok(client) => *self.captioner.write().await = client,
                Err(e) => error!(err = %e, "caption client rebuild failed — keeping previous"),
            }
        }

        let status_changed =
            old.enabled != new.enabled || old.status_interval_ms != new.status_interval_ms;
        let meme_changed = old.captioning.enabled != new.captioning.enabled
            || old.captioning.interval_ms != new.captioning.interval_ms;
        if status_changed || meme_changed {
            self.sync_jobs().await;
        }
        info!("configuration snapshot replaced");
    }

    /// Start or stop both periodic jobs to match the current snapshot.
    pub async fn sync_jobs(self: &Arc<Self>) {
        let settings = self.settings().await;

        if settings.enabled {
            let ctx = Arc::clone(self);
            let interval = Duration::from_millis(settings.status_interval_ms.max(MIN_INTERVAL_MS));
            self.status_job
                .restart(interval, move || jobs::status_tick(Arc::clone(&ctx)))
                .await;
        } else {
            self.status_job.stop().await;
        }

        if settings.captioning.enabled {
            let ctx = Arc::clone(self);
            let interval =
                Duration::from_millis(settings.captioning.interval_ms.max(MIN_INTERVAL_MS));
            self.meme_job
                .restart(interval, move || jobs::meme_tick(Arc::clone(&ctx)))
                .await;
        } else {
            self.meme_job.stop().await;
        }
    }

    /// Persist `new` to `config.toml` and apply it in one step.
    ///
    /// The file watcher will see the write and deliver the same snapshot
    /// again; applying an identical snapshot is a no-op beyond a recompile.
    pub async fn update_settings(self: &Arc<Self>, new: Settings) -> anyhow::Result<()> {
        new.save(&self.data_dir)?;
        self.apply_settings(new).await;
        Ok(())
    }
}
