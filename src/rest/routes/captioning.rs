use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::captioner::CaptionerError;
use crate::{jobs, AppContext};

/// Intervals under a second would hammer the capture pipeline.
const MIN_CAPTION_INTERVAL_MS: u64 = 1_000;

pub async fn toggle(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let mut new = (*ctx.settings().await).clone();
    new.captioning.enabled = !new.captioning.enabled;
    let enabled = new.captioning.enabled;
    match ctx.update_settings(new).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "enabled": enabled }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("failed to persist settings: {e}") })),
        ),
    }
}

#[derive(Deserialize)]
pub struct IntervalBody {
    pub interval_ms: u64,
}

pub async fn set_interval(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<IntervalBody>,
) -> (StatusCode, Json<Value>) {
    if body.interval_ms < MIN_CAPTION_INTERVAL_MS {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": format!("interval_ms must be at least {MIN_CAPTION_INTERVAL_MS}")
            })),
        );
    }
    let mut new = (*ctx.settings().await).clone();
    new.captioning.interval_ms = body.interval_ms;
    match ctx.update_settings(new).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "interval_ms": body.interval_ms })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("failed to persist settings: {e}") })),
        ),
    }
}

#[derive(Deserialize, Default)]
pub struct ValidateKeyBody {
    /// Key to check; falls back to the configured key when absent.
    pub api_key: Option<String>,
}

/// Body is optional — an empty or non-JSON body means "use the configured
/// key".
pub async fn validate_key(
    State(ctx): State<Arc<AppContext>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let body: ValidateKeyBody = serde_json::from_str(&body).unwrap_or_default();
    let key = match body.api_key {
        Some(key) if !key.is_empty() => key,
        _ => ctx.settings().await.captioning.api_key.clone(),
    };

    let captioner = ctx.captioner.read().await.clone();
    match captioner.validate_key(&key).await {
        Ok(valid) => (StatusCode::OK, Json(json!({ "valid": valid }))),
        Err(CaptionerError::KeyMissing) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "no API key provided or configured" })),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

#[derive(Deserialize, Default)]
pub struct GenerateBody {
    /// Page to capture; falls back to the observed tab when absent.
    pub url: Option<String>,
}

/// "Generate one captioned screenshot now."
///
/// Shares the meme job's single-flight guard, so a manual run can't overlap
/// a timer tick.
pub async fn generate(
    State(ctx): State<Arc<AppContext>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let body: GenerateBody = serde_json::from_str(&body).unwrap_or_default();
    let url = match body.url {
        Some(url) if !url.is_empty() => url,
        _ => match ctx.observed_tab.read().await.clone() {
            Some(tab) => tab,
            None => {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "no url given and no tab observed yet" })),
                )
            }
        },
    };

    let Some(_token) = ctx.meme_job.guard().try_begin() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a captioning run is already in flight" })),
        );
    };

    match jobs::generate_meme(&ctx, &url).await {
        Ok(record) => (
            StatusCode::OK,
            Json(serde_json::to_value(&record).unwrap_or_else(|_| json!({}))),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
