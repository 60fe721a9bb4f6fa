//! REST API endpoints for the stepcount-service.
//!
//! Every handler goes through the shared [`StepCounterManager`] or its
//! [`DailyStepStore`](stepcount_core::DailyStepStore), so the API, the
//! collector and the WebSocket feed agree on one live total.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Malformed
//! dates and months return HTTP 400, unknown days 404, storage failures 500.
//!
//! [`StepCounterManager`]: stepcount_core::StepCounterManager

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use stepcount_core::{DailySteps, DateRange, SaveOutcome, StepDate, StepSnapshot};

use crate::state::AppState;

/// Default number of days returned by `/api/recent`.
pub const DEFAULT_RECENT_LIMIT: u32 = 7;
/// Upper bound for `/api/recent`.
pub const MAX_RECENT_LIMIT: u32 = 366;
/// Longest span, in days, served by `/api/range`.
pub const MAX_RANGE_DAYS: usize = 3660;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        // Live session
        .route("/api/today", get(get_today))
        .route("/api/save", post(save))
        .route("/api/refresh", post(refresh))
        .route("/api/reset", post(reset))
        // History
        .route("/api/days", delete(delete_all_days))
        .route("/api/days/{date}", get(get_day).delete(delete_day))
        .route("/api/range", get(get_range))
        .route("/api/months/{year}/{month}", get(get_month))
        .route("/api/recent", get(get_recent))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub collector_running: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        collector_running: state.collector.is_running(),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Today's live view.
#[derive(Debug, Serialize)]
pub struct TodayResponse {
    /// Calendar day according to the service clock.
    pub today: StepDate,
    #[serde(flatten)]
    pub snapshot: StepSnapshot,
}

async fn get_today(State(state): State<Arc<AppState>>) -> Json<TodayResponse> {
    Json(TodayResponse {
        today: state.store().today(),
        snapshot: state.manager.snapshot().await,
    })
}

/// Result of a manual save.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// `inserted`, `updated`, `rejected` or `skipped`.
    pub outcome: &'static str,
    pub snapshot: StepSnapshot,
}

async fn save(State(state): State<Arc<AppState>>) -> Result<Json<SaveResponse>, AppError> {
    let outcome = match state.manager.save().await? {
        Some(SaveOutcome::Inserted) => "inserted",
        Some(SaveOutcome::Updated { .. }) => "updated",
        Some(SaveOutcome::Rejected { .. }) => "rejected",
        None => "skipped",
    };
    Ok(Json(SaveResponse {
        outcome,
        snapshot: state.manager.snapshot().await,
    }))
}

async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<StepSnapshot>, AppError> {
    state.manager.refresh().await?;
    Ok(Json(state.manager.snapshot().await))
}

async fn reset(State(state): State<Arc<AppState>>) -> Json<StepSnapshot> {
    state.manager.reset().await;
    Json(state.manager.snapshot().await)
}

/// One stored day.
#[derive(Debug, Serialize)]
pub struct DayResponse {
    pub date: StepDate,
    pub steps: u64,
    pub sensor_snapshot: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

async fn get_day(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<DayResponse>, AppError> {
    let date = parse_date(&date)?;
    let record = state
        .store()
        .get_record(date)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No steps recorded for {}", date)))?;

    Ok(Json(DayResponse {
        date: record.date,
        steps: record.accumulated_steps,
        sensor_snapshot: record.sensor_snapshot,
        updated_at: record.written_at(),
    }))
}

async fn delete_day(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<StatusCode, AppError> {
    let date = parse_date(&date)?;
    if state.store().delete_date(date).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No steps recorded for {}", date)))
    }
}

/// Response for bulk deletion.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

async fn delete_all_days(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = state.store().delete_all().await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Query parameters for `/api/range`.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

/// Dense per-day series for a range.
#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub start: StepDate,
    pub end: StepDate,
    pub total: u64,
    pub days: Vec<DailySteps>,
}

async fn get_range(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<RangeResponse>, AppError> {
    let start = parse_date(&query.start)?;
    let end = parse_date(&query.end)?;
    let range = DateRange::new(start, end).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if range.len() > MAX_RANGE_DAYS {
        return Err(AppError::BadRequest(format!(
            "Range spans {} days, at most {} allowed",
            range.len(),
            MAX_RANGE_DAYS
        )));
    }

    let store = state.store();
    let days = store.get_steps_in_range(start, end).await?;
    let total = store.get_total_in_range(start, end).await?;
    Ok(Json(RangeResponse {
        start,
        end,
        total,
        days,
    }))
}

/// Monthly total.
#[derive(Debug, Serialize)]
pub struct MonthResponse {
    pub year: i32,
    pub month: u8,
    pub total: u64,
}

async fn get_month(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u8)>,
) -> Result<Json<MonthResponse>, AppError> {
    let total = state.store().get_monthly_total(year, month).await?;
    Ok(Json(MonthResponse { year, month, total }))
}

/// Query parameters for `/api/recent`.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

async fn get_recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<DailySteps>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 || limit > MAX_RECENT_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_RECENT_LIMIT
        )));
    }
    Ok(Json(state.store().recent_days(limit).await?))
}

fn parse_date(s: &str) -> Result<StepDate, AppError> {
    StepDate::parse(s).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Core(stepcount_core::Error),
    Internal(String),
}

impl From<stepcount_core::Error> for AppError {
    fn from(e: stepcount_core::Error) -> Self {
        match e {
            stepcount_core::Error::InvalidDate(e) => AppError::BadRequest(e.to_string()),
            other => AppError::Core(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Core(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
