use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tracing::info;

use crate::correction::{user_offset, MAX_OFFSET_SECONDS};
use crate::form::{FormError, FormSession, Validation};
use crate::location::{Location, SearchOutcome};
use crate::render::ReportJson;
use crate::timezone::{StrategyFailure, Timezone, TimezoneResolution, TimezoneSource};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<Validation>,
}

pub(super) struct ApiError {
    status: StatusCode,
    message: String,
    validation: Option<Validation>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            code: self.status.as_u16(),
            validation: self.validation,
        };
        (self.status, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError {
        status,
        message: msg.into(),
        validation: None,
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Incomplete(validation) => ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: format!("form incomplete: {}", validation),
                validation: Some(validation),
            },
            other => api_error(StatusCode::BAD_REQUEST, other.to_string()),
        }
    }
}

fn check_coords(lat: f64, lon: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid coordinates. Lat: -90..90, Lon: -180..180",
        ));
    }
    Ok(())
}

async fn resolve_timezone(state: Arc<AppState>, lat: f64, lon: f64) -> Result<TimezoneResolution, ApiError> {
    tokio::task::spawn_blocking(move || state.timezones.resolve(lat, lon))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// ─── GET /api/search ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let start = Instant::now();
    let query = params.q.unwrap_or_default();
    let logged = query.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let mut resolver = state.resolver.lock().unwrap_or_else(PoisonError::into_inner);
        resolver.search(&query)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(
        "GET /api/search q={} -> {} candidate(s){} ({:.1}ms)",
        logged,
        outcome.candidates.len(),
        if outcome.from_cache { " cached" } else { "" },
        start.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(Json(outcome))
}

// ─── GET /api/timezone ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct TimezoneQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneResponse {
    pub name: String,
    pub offset_seconds: i32,
    pub utc_offset: String,
    pub source: TimezoneSource,
    pub approximate: bool,
    pub failures: Vec<StrategyFailure>,
}

impl From<TimezoneResolution> for TimezoneResponse {
    fn from(res: TimezoneResolution) -> Self {
        Self {
            utc_offset: res.timezone.utc_offset(),
            approximate: res.timezone.is_approximate(),
            name: res.timezone.name,
            offset_seconds: res.timezone.offset_seconds,
            source: res.timezone.source,
            failures: res.failures,
        }
    }
}

pub async fn timezone(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimezoneQuery>,
) -> Result<Json<TimezoneResponse>, ApiError> {
    check_coords(params.lat, params.lon)?;
    let resolution = resolve_timezone(state, params.lat, params.lon).await?;
    info!(
        "GET /api/timezone ({}, {}) -> {}",
        params.lat, params.lon, resolution.timezone
    );
    Ok(Json(resolution.into()))
}

// ─── GET /api/report ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub date: Option<String>,
    pub time: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub name: Option<String>,
    /// IANA zone for the birth place; skips the lookup chain.
    pub tz: Option<String>,
    /// The user's offset in seconds east of UTC.
    pub user_offset: Option<i32>,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub json: ReportJson,
    pub text: String,
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, ApiError> {
    if let Some(offset) = params.user_offset {
        if !(-MAX_OFFSET_SECONDS..=MAX_OFFSET_SECONDS).contains(&offset) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "userOffset must be within {}..{} seconds",
                    -MAX_OFFSET_SECONDS, MAX_OFFSET_SECONDS
                ),
            ));
        }
    }

    let mut session = FormSession::new();
    session.set_date(params.date.as_deref().unwrap_or(""))?;
    session.set_time(params.time.as_deref().unwrap_or(""))?;

    if let (Some(lat), Some(lon)) = (params.lat, params.lon) {
        check_coords(lat, lon)?;
        let timezone = match params.tz.as_deref() {
            Some(zone) => Timezone::manual(zone)
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
            None => resolve_timezone(Arc::clone(&state), lat, lon).await?.timezone,
        };
        let location = Location::from_coords(params.name.as_deref(), lat, lon).with_timezone(timezone);
        session.select_location(location);
    }

    let offset = match params.user_offset.or(state.user_offset) {
        Some(offset) => offset,
        None => user_offset(None).map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
    };

    let report = session.generate(offset)?;
    info!(
        "GET /api/report {} {} at {} -> {}",
        report.date,
        report.time.format("%H:%M"),
        report.location.name,
        report.correction.utc_iso(),
    );

    Ok(Json(ReportResponse {
        json: report.to_json(),
        text: report.to_text(),
    }))
}
