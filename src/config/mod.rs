use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::rules::{default_rules, Rule};

const DEFAULT_PORT: u16 = 4500;
const DEFAULT_STATUS_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CAPTION_INTERVAL_MS: u64 = 600_000;
const DEFAULT_PRESENCE_API_BASE: &str = "https://discord.com/api/v9";
const DEFAULT_CAPTION_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_CAPTION_MODEL: &str = "gpt-4o-mini";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── CaptioningConfig ─────────────────────────────────────────────────────────

/// Meme captioning configuration (`[captioning]` in config.toml).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptioningConfig {
    /// Run the periodic captioning job. Default: false (opt-in).
    pub enabled: bool,
    /// Caption API key. `PRESENCED_CAPTION_KEY` env var overrides.
    pub api_key: String,
    /// Milliseconds between captioning runs. Default: 600000 (10 min).
    pub interval_ms: u64,
    /// Write composited PNGs under `{data_dir}/{output_folder}`. Default: true.
    pub auto_save: bool,
    /// Folder name (relative to the data dir) for saved images.
    pub output_folder: String,
    /// Model id sent to the chat-completion endpoint.
    pub model: String,
    /// Captioning API base URL (OpenAI-compatible).
    pub api_base: String,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            interval_ms: DEFAULT_CAPTION_INTERVAL_MS,
            auto_save: true,
            output_folder: "memes".to_string(),
            model: DEFAULT_CAPTION_MODEL.to_string(),
            api_base: DEFAULT_CAPTION_API_BASE.to_string(),
        }
    }
}

// ─── PresenceConfig ───────────────────────────────────────────────────────────

/// Presence service configuration (`[presence]` in config.toml).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Settings-resource base URL of the chat service.
    pub api_base: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_PRESENCE_API_BASE.to_string(),
        }
    }
}

// ─── Settings ─────────────────────────────────────────────────────────────────

/// The full configuration snapshot — `{data_dir}/config.toml`, one value.
///
/// The daemon never mutates a snapshot in place: the control surface and the
/// file watcher both produce a complete new `Settings`, which replaces the
/// shared one in a single swap. `port` and `bind_address` are read at
/// startup only; everything else takes effect on the next swap.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Presence token. `PRESENCED_TOKEN` env var overrides.
    pub token: String,
    /// Publish status updates for the observed tab. Default: false.
    pub enabled: bool,
    /// Milliseconds between status checks. Default: 5000.
    pub status_interval_ms: u64,
    /// REST control surface port. Startup-only.
    pub port: u16,
    /// REST bind address. Startup-only; use "0.0.0.0" for LAN access.
    pub bind_address: String,
    /// Log level filter string, e.g. "debug", "info,presenced=trace".
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    // Scalar fields stay above this line: the TOML serializer rejects bare
    // keys emitted after a table.
    /// Ordered URL → status rules; first match wins.
    pub rules: Vec<Rule>,
    /// Presence service endpoints (`[presence]`).
    pub presence: PresenceConfig,
    /// Meme captioning (`[captioning]`).
    pub captioning: CaptioningConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::new(),
            enabled: false,
            status_interval_ms: DEFAULT_STATUS_INTERVAL_MS,
            rules: default_rules(),
            presence: PresenceConfig::default(),
            captioning: CaptioningConfig::default(),
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            log: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Settings {
    /// Load `{data_dir}/config.toml` with env overrides applied.
    ///
    /// Priority (highest to lowest): env var > TOML > built-in default. A
    /// file that fails to parse logs an error and falls back to defaults —
    /// the daemon must come up even with a mangled config.
    pub fn load(data_dir: &Path) -> Self {
        let path = config_path(data_dir);
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        };

        if let Some(token) = non_empty_env("PRESENCED_TOKEN") {
            settings.token = token;
        }
        if let Some(key) = non_empty_env("PRESENCED_CAPTION_KEY") {
            settings.captioning.api_key = key;
        }
        settings
    }

    /// Write the snapshot back to `{data_dir}/config.toml`.
    ///
    /// Used by the control surface so edits survive restarts; the file
    /// watcher will pick the write up and swap in the identical snapshot,
    /// which is harmless.
    pub fn save(&self, data_dir: &Path) -> anyhow::Result<()> {
        let raw = toml::to_string_pretty(self)?;
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(config_path(data_dir), raw)?;
        Ok(())
    }
}

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

// ─── Config (settings + startup context) ─────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl Config {
    /// Build config from CLI/env args + the TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml` (env overrides inside)
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let mut settings = Settings::load(&data_dir);
        if let Some(port) = port {
            settings.port = port;
        }
        if let Some(log) = log {
            settings.log = log;
        }
        if let Some(bind) = bind_address {
            settings.bind_address = bind;
        }
        Self { data_dir, settings }
    }
}

// ─── Config watcher ───────────────────────────────────────────────────────────

/// Watches `config.toml` and emits whole new snapshots on change.
///
/// Uses the `notify` crate (kqueue on macOS, inotify on Linux) behind a 2 s
/// debounce. The receiver gets a complete `Settings` per change — consumers
/// swap it in atomically and restart whatever the diff requires; fields are
/// never patched piecemeal.
pub struct ConfigWatcher {
    // Hold the watcher alive; dropping it stops the file watch.
    _watcher: notify_debouncer_full::Debouncer<
        notify_debouncer_full::notify::RecommendedWatcher,
        notify_debouncer_full::FileIdMap,
    >,
}

impl ConfigWatcher {
    /// Start watching `{data_dir}/config.toml` for changes.
    ///
    /// Returns `None` if the watcher could not be created (non-fatal; the
    /// daemon runs fine without hot-reload).
    pub fn start(data_dir: &Path) -> Option<(Self, mpsc::Receiver<Settings>)> {
        let (tx, rx) = mpsc::channel(4);
        let dir = data_dir.to_path_buf();

        let watcher = notify_debouncer_full::new_debouncer(
            std::time::Duration::from_secs(2),
            None,
            move |result: notify_debouncer_full::DebounceEventResult| {
                let Ok(events) = result else { return };
                use notify_debouncer_full::notify::EventKind;
                let relevant = events
                    .iter()
                    .any(|e| matches!(e.event.kind, EventKind::Modify(_) | EventKind::Create(_)));
                if relevant {
                    let snapshot = Settings::load(&dir);
                    // Full queue means a reload is already pending — the
                    // pending one will re-read the same file.
                    let _ = tx.try_send(snapshot);
                }
            },
        );

        match watcher {
            Ok(mut debouncer) => {
                use notify_debouncer_full::notify::Watcher as _;
                // Watch the data dir (parent of config.toml) since watching
                // a non-existent file fails on some platforms.
                if let Err(e) = debouncer.watcher().watch(
                    data_dir,
                    notify_debouncer_full::notify::RecursiveMode::NonRecursive,
                ) {
                    warn!("config watcher failed to start: {e} — hot-reload disabled");
                    return None;
                }
                info!(path = %config_path(data_dir).display(), "config hot-reload watcher started");
                Some((Self { _watcher: debouncer }, rx))
            }
            Err(e) => {
                warn!("config watcher creation failed: {e} — hot-reload disabled");
                None
            }
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/presenced
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("presenced");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/presenced or ~/.local/share/presenced
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("presenced");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("presenced");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\presenced
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("presenced");
        }
    }
    // Fallback
    PathBuf::from(".presenced")
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_with_shipped_rules() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path());
        assert_eq!(settings.status_interval_ms, DEFAULT_STATUS_INTERVAL_MS);
        assert!(!settings.enabled);
        assert_eq!(settings.rules.len(), 5);
        assert_eq!(settings.captioning.output_folder, "memes");
    }

    #[test]
    fn partial_toml_keeps_defaults_for_absent_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
enabled = true
status_interval_ms = 2000

[[rules]]
pattern = "rust-lang.org"
status = "Reading Rust docs"
"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path());
        assert!(settings.enabled);
        assert_eq!(settings.status_interval_ms, 2000);
        assert_eq!(settings.rules.len(), 1, "explicit rule list replaces defaults");
        assert_eq!(settings.captioning.interval_ms, DEFAULT_CAPTION_INTERVAL_MS);
        assert_eq!(settings.presence.api_base, DEFAULT_PRESENCE_API_BASE);
    }

    #[test]
    fn mangled_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "this is [not toml").unwrap();
        let settings = Settings::load(dir.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.enabled = true;
        settings.captioning.enabled = true;
        settings.captioning.interval_ms = 120_000;
        settings.rules.push(Rule::new("/docs?/i", "Reading documentation"));
        settings.save(dir.path()).unwrap();

        let loaded = Settings::load(dir.path());
        assert_eq!(loaded, settings);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = 9999").unwrap();
        let config = Config::new(
            Some(4501),
            Some(dir.path().to_path_buf()),
            Some("debug".to_string()),
            None,
        );
        assert_eq!(config.settings.port, 4501);
        assert_eq!(config.settings.log, "debug");
        assert_eq!(config.settings.bind_address, "127.0.0.1");
    }
}
