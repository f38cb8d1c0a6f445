// HTTP request handlers
use crate::application::dashboard_service::{OptionsUpdate, RenderOutcome};
use crate::domain::channel::{ChannelPatch, ChannelSpec};
use crate::domain::window::DateRange;
use crate::infrastructure::config::channels_from_toml;
use crate::infrastructure::csv_export::combined_table_to_csv;
use crate::presentation::api_error::ApiError;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub secret: String,
}

#[derive(Deserialize)]
pub struct RenderQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rolling_window: Option<usize>,
    pub show_raw: Option<bool>,
    pub show_rolling: Option<bool>,
    pub max_results: Option<u32>,
}

impl RenderQuery {
    fn into_parts(self) -> (DateRange, OptionsUpdate) {
        (
            DateRange::new(self.start, self.end),
            OptionsUpdate {
                rolling_window: self.rolling_window,
                show_raw: self.show_raw,
                show_rolling: self.show_rolling,
                max_results: self.max_results,
            },
        )
    }
}

#[derive(Deserialize)]
pub struct ThresholdRequest {
    pub value: f64,
}

#[derive(Deserialize)]
pub struct AutoRefreshRequest {
    pub interval_secs: u64,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Shared-secret gate; marks the session authenticated on success.
pub async fn login(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<StatusCode, ApiError> {
    if !secret_matches(&request.secret, &state.shared_secret) {
        tracing::warn!("Rejected login for session {}", session_id);
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid secret"));
    }
    state.dashboard_service.authenticate(&session_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.dashboard_service.logout(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Constant-time over the bytes; only the length can leak.
fn secret_matches(candidate: &str, secret: &str) -> bool {
    candidate.as_bytes().ct_eq(secret.as_bytes()).into()
}

async fn render(state: &AppState, session_id: &str, query: RenderQuery) -> Result<RenderOutcome, ApiError> {
    let (range, update) = query.into_parts();
    Ok(state.dashboard_service.render(session_id, range, update).await?)
}

/// Run the pipeline for the requested window and return the full report.
pub async fn dashboard(
    Path(session_id): Path<String>,
    Query(query): Query<RenderQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let outcome = render(&state, &session_id, query).await?;
    Ok(Json(outcome.report.as_ref()).into_response())
}

pub async fn latest(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    match state.dashboard_service.latest(&session_id).await? {
        Some(report) => Ok(Json(report.as_ref()).into_response()),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "no render yet for this session")),
    }
}

/// Run the pipeline and return the combined table as a CSV download.
pub async fn export_csv(
    Path(session_id): Path<String>,
    Query(query): Query<RenderQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let filename = format!("drainwatch_{}_{}.csv", query.start, query.end);
    let outcome = render(&state, &session_id, query).await?;

    let body = combined_table_to_csv(&outcome.report.combined_table)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn list_channels(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChannelSpec>>, ApiError> {
    Ok(Json(state.dashboard_service.channels(&session_id).await?))
}

/// Replace the session's channel registry from a TOML `[[channels]]` document.
pub async fn import_channels(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let channels = channels_from_toml(&body, |var| std::env::var(var).ok())?;
    let count = state
        .dashboard_service
        .replace_channels(&session_id, channels)
        .await?;
    Ok(Json(json!({ "channels": count })))
}

pub async fn update_channel(
    Path((session_id, channel_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(patch): Json<ChannelPatch>,
) -> Result<Json<ChannelSpec>, ApiError> {
    let channel = state
        .dashboard_service
        .update_channel(&session_id, &channel_id, patch)
        .await?;
    Ok(Json(channel))
}

pub async fn set_threshold(
    Path((session_id, channel_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ThresholdRequest>,
) -> Result<StatusCode, ApiError> {
    if !request.value.is_finite() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "threshold must be finite"));
    }
    state
        .dashboard_service
        .set_threshold(&session_id, &channel_id, request.value)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_auto_refresh(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AutoRefreshRequest>,
) -> Result<StatusCode, ApiError> {
    if request.interval_secs == 0 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "interval must be at least 1 second"));
    }
    state
        .dashboard_service
        .enable_auto_refresh(&session_id, Duration::from_secs(request.interval_secs))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disable_auto_refresh(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.dashboard_service.disable_auto_refresh(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matches_exact_bytes_only() {
        assert!(secret_matches("open-sesame", "open-sesame"));
        assert!(!secret_matches("open-sesamE", "open-sesame"));
        assert!(!secret_matches("open", "open-sesame"));
        assert!(!secret_matches("", "open-sesame"));
    }
}
