//! Job bodies — the work behind the two periodic triggers and their manual
//! counterparts on the control surface.
//!
//! Every terminal outcome lands in the activity log exactly once; errors
//! never propagate past this layer into the scheduler.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::activity::Severity;
use crate::capture::CaptureConfig;
use crate::meme::{self, MemeRecord, PipelineError, PipelineSettings};
use crate::presence::{decide, PresenceError, PublishDecision};
use crate::AppContext;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ─── Status job ───────────────────────────────────────────────────────────────

/// Periodic status check: re-match the observed tab if it changed since the
/// last tick.
pub async fn status_tick(ctx: Arc<AppContext>) {
    let settings = ctx.settings().await;
    if !settings.enabled {
        return;
    }
    let Some(tab) = ctx.observed_tab.read().await.clone() else {
        debug!("no tab observed yet — nothing to check");
        return;
    };
    {
        // Skip redundant work when the observed key hasn't moved.
        let mut last = ctx.last_checked_url.write().await;
        if last.as_deref() == Some(tab.as_str()) {
            debug!("tab unchanged since last check — skipping");
            return;
        }
        *last = Some(tab.clone());
    }
    check_url(&ctx, &tab).await;
}

/// Match `url` against the rule list and publish on a hit.
///
/// No rule matching is not an error — no default status is applied.
pub async fn check_url(ctx: &AppContext, url: &str) -> Option<String> {
    let rules = ctx.rules().await;
    match rules.matches(url) {
        Some(rule) => {
            let status = rule.status.clone();
            publish_status(ctx, &status).await;
            Some(status)
        }
        None => {
            debug!(%url, "no rule matches — leaving status as-is");
            None
        }
    }
}

/// Publish `status` unless the cooldown suppresses it.
///
/// On success the publish state advances; on failure one activity entry is
/// written and the state is left untouched so the next tick retries.
pub async fn publish_status(ctx: &AppContext, status: &str) {
    let now = now_ms();
    {
        let state = ctx.publish_state.lock().await;
        if let PublishDecision::Skip(reason) = decide(status, &state, now) {
            debug!(%status, %reason, "publish skipped");
            return;
        }
    }

    let settings = ctx.settings().await;
    let presence = ctx.presence.read().await.clone();
    match presence.set_status(&settings.token, status).await {
        Ok(()) => {
            ctx.publish_state.lock().await.mark_published(status, now);
            info!(%status, "presence status published");
            ctx.activity
                .push(Severity::Success, format!("Status updated to \"{status}\""))
                .await;
        }
        Err(PresenceError::CredentialRejected) => {
            warn!("presence token rejected by the service");
            ctx.activity
                .push(
                    Severity::Error,
                    "Presence token rejected (401) — re-authentication required",
                )
                .await;
        }
        Err(e) => {
            warn!(err = %e, "status publish failed");
            ctx.activity
                .push(Severity::Error, format!("Status update failed: {e}"))
                .await;
        }
    }
}

// ─── Meme job ─────────────────────────────────────────────────────────────────

/// Periodic captioning run: screenshot the observed tab if it changed since
/// the last capture.
pub async fn meme_tick(ctx: Arc<AppContext>) {
    let settings = ctx.settings().await;
    if !settings.captioning.enabled {
        return;
    }
    let Some(tab) = ctx.observed_tab.read().await.clone() else {
        debug!("no tab observed yet — nothing to capture");
        return;
    };
    {
        let mut last = ctx.last_captured_url.write().await;
        if last.as_deref() == Some(tab.as_str()) {
            debug!("tab unchanged since last capture — skipping");
            return;
        }
        *last = Some(tab.clone());
    }
    let _ = generate_meme(&ctx, &tab).await;
}

/// Run the captioning pipeline for `url` and record the outcome.
pub async fn generate_meme(ctx: &AppContext, url: &str) -> Result<MemeRecord, PipelineError> {
    let settings = ctx.settings().await;
    let pipeline = PipelineSettings {
        capture: CaptureConfig::default(),
        api_key: settings.captioning.api_key.clone(),
        auto_save: settings.captioning.auto_save,
        output_dir: ctx.data_dir.join(&settings.captioning.output_folder),
    };
    let captioner = ctx.captioner.read().await.clone();

    match meme::run(&captioner, url, &pipeline).await {
        Ok(record) => {
            ctx.store.set_last_meme(&record).await;
            ctx.activity
                .push(
                    Severity::Success,
                    format!(
                        "Captioned {}: \"{}\"",
                        record.source_host, record.caption_text
                    ),
                )
                .await;
            Ok(record)
        }
        Err(e) => {
            warn!(err = %e, %url, "captioning pipeline failed");
            ctx.activity
                .push(Severity::Error, format!("Meme generation failed: {e}"))
                .await;
            Err(e)
        }
    }
}

// ─── Tab push ─────────────────────────────────────────────────────────────────

/// Record a new observed tab and, when enabled, check it immediately.
///
/// Mirrors the browser's tab-change events: the periodic job only covers
/// the case where no push arrives.
pub async fn tab_changed(ctx: &AppContext, url: &str) -> Option<String> {
    *ctx.observed_tab.write().await = Some(url.to_string());
    *ctx.last_checked_url.write().await = Some(url.to_string());

    let settings = ctx.settings().await;
    if !settings.enabled {
        return None;
    }
    check_url(ctx, url).await
}
