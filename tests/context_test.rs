//! Integration tests for the shared application context: snapshot swaps,
//! persistence, and job lifecycle.

use presenced::config::{Config, Settings};
use presenced::rules::Rule;
use presenced::{jobs, AppContext};
use std::sync::Arc;
use tempfile::TempDir;

async fn ctx_with(settings: Settings) -> (Arc<AppContext>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        settings,
    };
    let ctx = Arc::new(AppContext::new(config).await.unwrap());
    (ctx, dir)
}

#[tokio::test]
async fn test_snapshot_swap_replaces_rules_wholesale() {
    let mut settings = Settings::default();
    settings.rules = vec![Rule::new("youtube.com", "Watching YouTube")];
    let (ctx, _dir) = ctx_with(settings).await;

    let rules = ctx.rules().await;
    assert!(rules.matches("https://youtube.com/").is_some());

    let mut next = (*ctx.settings().await).clone();
    next.rules = vec![Rule::new("github.com", "Working on code")];
    ctx.apply_settings(next).await;

    let rules = ctx.rules().await;
    assert!(rules.matches("https://youtube.com/").is_none(), "old rule must be gone");
    assert_eq!(
        rules.matches("https://github.com/presenced").unwrap().status,
        "Working on code"
    );
}

#[tokio::test]
async fn test_update_settings_persists_to_config_file() {
    let (ctx, dir) = ctx_with(Settings::default()).await;

    let mut next = (*ctx.settings().await).clone();
    next.enabled = true;
    next.rules = vec![Rule::new("/docs?/i", "Reading documentation")];
    ctx.update_settings(next).await.unwrap();

    let reloaded = Settings::load(dir.path());
    assert!(reloaded.enabled);
    assert_eq!(reloaded.rules, vec![Rule::new("/docs?/i", "Reading documentation")]);
}

#[tokio::test]
async fn test_jobs_follow_the_enabled_flags() {
    let (ctx, _dir) = ctx_with(Settings::default()).await;
    ctx.sync_jobs().await;
    assert!(!ctx.status_job.is_active().await, "disabled by default");
    assert!(!ctx.meme_job.is_active().await);

    let mut next = (*ctx.settings().await).clone();
    next.enabled = true;
    ctx.apply_settings(next).await;
    assert!(ctx.status_job.is_active().await, "enabling starts the timer");
    assert!(!ctx.meme_job.is_active().await, "captioning stays off");

    let mut next = (*ctx.settings().await).clone();
    next.enabled = false;
    ctx.apply_settings(next).await;
    assert!(!ctx.status_job.is_active().await, "disabling cancels the timer");
}

#[tokio::test]
async fn test_tab_push_records_the_observed_tab() {
    // Publishing disabled: the push is recorded but nothing is matched.
    let (ctx, _dir) = ctx_with(Settings::default()).await;

    let matched = jobs::tab_changed(&ctx, "https://www.youtube.com/watch?v=x").await;
    assert_eq!(matched, None);
    assert_eq!(
        ctx.observed_tab.read().await.as_deref(),
        Some("https://www.youtube.com/watch?v=x")
    );
}
