// HTTP request handlers
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::domain::data_point::DataPoint;
use crate::presentation::app_state::AppState;

const MIN_WINDOW_SECS: u64 = 4;
const MAX_WINDOW_SECS: u64 = 120;
const DEFAULT_WINDOW_SECS: u64 = 30;

#[derive(Deserialize)]
pub struct WindowQuery {
    pub seconds: Option<u64>,
}

fn window_seconds(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_WINDOW_SECS)
        .clamp(MIN_WINDOW_SECS, MAX_WINDOW_SECS)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Most recent data point, 204 when nothing has been polled yet
pub async fn latest(State(state): State<Arc<AppState>>) -> Response {
    match state.buffer.latest() {
        Some(point) => Json(point).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Field-wise average over a bounded window of recent points
pub async fn latest_average(
    Query(query): Query<WindowQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let seconds = window_seconds(query.seconds);
    let points = state.buffer.within(seconds);
    match DataPoint::average_of(&points) {
        Some(average) => Json(average).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults_to_thirty() {
        assert_eq!(window_seconds(None), 30);
    }

    #[test]
    fn test_window_is_clamped() {
        assert_eq!(window_seconds(Some(1)), 4);
        assert_eq!(window_seconds(Some(4)), 4);
        assert_eq!(window_seconds(Some(60)), 60);
        assert_eq!(window_seconds(Some(500)), 120);
    }
}
