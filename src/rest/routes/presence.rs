use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{jobs, AppContext};

#[derive(Deserialize)]
pub struct TabPush {
    pub url: String,
}

/// Active-tab change push from a companion client.
pub async fn push_tab(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<TabPush>,
) -> (StatusCode, Json<Value>) {
    if body.url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "url must not be empty" })),
        );
    }
    let matched = jobs::tab_changed(&ctx, &body.url).await;
    (
        StatusCode::OK,
        Json(json!({ "observed": body.url, "matched_status": matched })),
    )
}

#[derive(Deserialize)]
pub struct PublishBody {
    pub status: String,
}

/// "Publish this status now" — bypasses rule matching, not the cooldown.
pub async fn publish_now(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<PublishBody>,
) -> (StatusCode, Json<Value>) {
    let status = body.status.trim();
    if status.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "status must not be empty" })),
        );
    }
    jobs::publish_status(&ctx, status).await;
    let state = ctx.publish_state.lock().await;
    (
        StatusCode::OK,
        Json(json!({
            "requested": status,
            "current_status": state.current_status,
        })),
    )
}

/// Re-run rule matching on the observed tab, ignoring the skip-unchanged key.
pub async fn recheck(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let Some(tab) = ctx.observed_tab.read().await.clone() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "no tab observed yet" })),
        );
    };
    *ctx.last_checked_url.write().await = Some(tab.clone());
    let matched = jobs::check_url(&ctx, &tab).await;
    (
        StatusCode::OK,
        Json(json!({ "observed": tab, "matched_status": matched })),
    )
}

pub async fn daemon_status(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let settings = ctx.settings().await;
    let publish_state = ctx.publish_state.lock().await.clone();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": ctx.started_at.elapsed().as_secs(),
        "enabled": settings.enabled,
        "status_interval_ms": settings.status_interval_ms,
        "captioning_enabled": settings.captioning.enabled,
        "captioning_interval_ms": settings.captioning.interval_ms,
        "observed_tab": ctx.observed_tab.read().await.clone(),
        "current_status": publish_state.current_status,
        "status_job_active": ctx.status_job.is_active().await,
        "meme_job_active": ctx.meme_job.is_active().await,
        "rule_count": settings.rules.len(),
    }))
}
