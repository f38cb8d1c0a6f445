// Route table
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    dashboard, disable_auto_refresh, enable_auto_refresh, export_csv, health_check,
    import_channels, latest, list_channels, login, logout, set_threshold, update_channel,
};
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/sessions/:id/login", post(login))
        .route("/sessions/:id/logout", post(logout))
        .route("/sessions/:id/dashboard", get(dashboard))
        .route("/sessions/:id/latest", get(latest))
        .route("/sessions/:id/export.csv", get(export_csv))
        .route("/sessions/:id/channels", get(list_channels).put(import_channels))
        .route("/sessions/:id/channels/:channel_id", patch(update_channel))
        .route("/sessions/:id/thresholds/:channel_id", put(set_threshold))
        .route(
            "/sessions/:id/auto-refresh",
            post(enable_auto_refresh).delete(disable_auto_refresh),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
