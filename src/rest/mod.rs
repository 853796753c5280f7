// rest/mod.rs — REST control surface.
//
// Axum HTTP server on the configured port (loopback-bound by default). A
// companion browser extension — or curl — drives the daemon through it.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/status
//   POST   /api/v1/tab                        {url}
//   POST   /api/v1/publish                    {status}
//   POST   /api/v1/recheck
//   GET    /api/v1/rules
//   PUT    /api/v1/rules                      [{pattern,status},...]
//   GET    /api/v1/activity
//   DELETE /api/v1/activity
//   POST   /api/v1/captioning/toggle
//   PUT    /api/v1/captioning/interval        {interval_ms}
//   POST   /api/v1/captioning/validate-key    {api_key?}
//   POST   /api/v1/captioning/generate        {url?}

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::AppContext;

pub async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let settings = ctx.settings().await;
    let bind = format!("{}:{}", settings.bind_address, settings.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("control surface listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    // Extension pages call from browser origins; the server itself stays
    // loopback-bound unless configured otherwise.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/status", get(routes::presence::daemon_status))
        .route("/api/v1/tab", post(routes::presence::push_tab))
        .route("/api/v1/publish", post(routes::presence::publish_now))
        .route("/api/v1/recheck", post(routes::presence::recheck))
        .route(
            "/api/v1/rules",
            get(routes::rules::get_rules).put(routes::rules::put_rules),
        )
        .route(
            "/api/v1/activity",
            get(routes::activity::get_activity).delete(routes::activity::clear_activity),
        )
        .route("/api/v1/captioning/toggle", post(routes::captioning::toggle))
        .route(
            "/api/v1/captioning/interval",
            put(routes::captioning::set_interval),
        )
        .route(
            "/api/v1/captioning/validate-key",
            post(routes::captioning::validate_key),
        )
        .route(
            "/api/v1/captioning/generate",
            post(routes::captioning::generate),
        )
        .layer(cors)
        .with_state(ctx)
}
