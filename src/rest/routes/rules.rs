use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rules::{self, Rule};
use crate::AppContext;

pub async fn get_rules(State(ctx): State<Arc<AppContext>>) -> Json<Vec<Rule>> {
    Json(ctx.settings().await.rules.clone())
}

/// Replace the whole rule list.
///
/// Patterns are validated here, at save time — a bad regex is rejected with
/// 422 instead of silently never matching.
pub async fn put_rules(
    State(ctx): State<Arc<AppContext>>,
    Json(rules): Json<Vec<Rule>>,
) -> (StatusCode, Json<Value>) {
    if let Err(e) = rules::validate(&rules) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        );
    }

    let mut new = (*ctx.settings().await).clone();
    new.rules = rules;
    let count = new.rules.len();
    match ctx.update_settings(new).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "rules": count }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("failed to persist rules: {e}") })),
        ),
    }
}
