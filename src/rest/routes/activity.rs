use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::activity::ActivityEntry;
use crate::AppContext;

pub async fn get_activity(State(ctx): State<Arc<AppContext>>) -> Json<Vec<ActivityEntry>> {
    Json(ctx.activity.entries().await)
}

pub async fn clear_activity(State(ctx): State<Arc<AppContext>>) -> StatusCode {
    ctx.activity.clear().await;
    StatusCode::NO_CONTENT
}
