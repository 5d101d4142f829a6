use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use natal_input::location::{GeocodeError, Geocoder, Location, LocationResolver, SearchCache};
use natal_input::server::{build_router, AppState};
use natal_input::timezone::{LongitudeApproximation, TimezoneResolver};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

struct CountingGeocoder {
    calls: Arc<AtomicUsize>,
}

impl Geocoder for CountingGeocoder {
    fn search(&self, _query: &str) -> Result<Vec<Location>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Location::from_coords(Some("Москва, Россия"), 55.7558, 37.6173)])
    }
}

fn app_state() -> (AppState, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = LocationResolver::new(
        Box::new(CountingGeocoder { calls: calls.clone() }),
        SearchCache::in_memory(),
    );
    let timezones = TimezoneResolver::new(vec![Box::new(LongitudeApproximation)]);
    let mut state = AppState::new(resolver, timezones);
    state.user_offset = Some(0);
    (state, calls)
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_search_returns_candidates() {
    let (state, calls) = app_state();
    let (status, body) = get(state, "/api/search?q=Moscow").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candidates"][0]["name"], "Москва, Россия");
    assert_eq!(body["fromCache"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_short_query_is_empty() {
    let (state, calls) = app_state();
    let (status, body) = get(state, "/api/search?q=Mo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candidates"].as_array().unwrap().len(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_repeat_search_is_cached() {
    let (state, calls) = app_state();
    let app = build_router(state);
    for expected_cached in [false, true] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/search?q=Moscow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["fromCache"], expected_cached);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timezone_approximation() {
    let (state, _) = app_state();
    let (status, body) = get(state, "/api/timezone?lat=40&lon=47").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["utcOffset"], "+03:00");
    assert_eq!(body["offsetSeconds"], 10800);
    assert_eq!(body["approximate"], true);
    assert_eq!(body["source"], "Approximation");
}

#[tokio::test]
async fn test_timezone_rejects_bad_coordinates() {
    let (state, _) = app_state();
    let (status, body) = get(state, "/api/timezone?lat=95&lon=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_report_with_manual_zone() {
    let (state, _) = app_state();
    let (status, body) = get(
        state,
        "/api/report?date=2000-01-01&time=12:00&lat=19.076&lon=72.8777&name=Mumbai&tz=Asia/Kolkata",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["json"]["utcDateTime"], "2000-01-01T06:30:00.000Z");
    assert_eq!(body["json"]["location"]["utcOffset"], "+05:30");
    assert_eq!(body["json"]["timezoneCorrection"]["difference"], "+05:30");
    assert!(body["text"].as_str().unwrap().contains("Place: Mumbai"));
}

#[tokio::test]
async fn test_report_with_lookup_chain() {
    let (state, _) = app_state();
    let (status, body) = get(state, "/api/report?date=2000-01-01&time=12:00&lat=40&lon=47&userOffset=-16200").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["json"]["utcDateTime"], "2000-01-01T09:00:00.000Z");
    assert_eq!(body["json"]["location"]["approximate"], true);
    assert_eq!(body["json"]["timezoneCorrection"]["userOffset"], "-04:30");
}

#[tokio::test]
async fn test_report_rejects_out_of_range_user_offset() {
    for offset in ["-2147483648", "2147483647", "64801"] {
        let (state, _) = app_state();
        let uri = format!("/api/report?date=2000-01-01&time=12:00&lat=40&lon=47&userOffset={}", offset);
        let (status, body) = get(state, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "userOffset {}", offset);
        assert!(body["error"].as_str().unwrap().contains("userOffset"));
    }

    let (state, _) = app_state();
    let (status, body) = get(state, "/api/report?date=2000-01-01&time=12:00&lat=40&lon=47&userOffset=-64800").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["json"]["timezoneCorrection"]["userOffset"], "-18:00");
}

#[tokio::test]
async fn test_timezone_out_of_range_longitude_is_rejected() {
    let (state, _) = app_state();
    let (status, _) = get(state, "/api/timezone?lat=0&lon=1000000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_missing_location_is_unprocessable() {
    let (state, _) = app_state();
    let (status, body) = get(state, "/api/report?date=2000-01-01&time=12:00").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["validation"]["locationMissing"], true);
    assert_eq!(body["validation"]["dateMissing"], false);
}

#[tokio::test]
async fn test_report_bad_time_is_bad_request() {
    let (state, _) = app_state();
    let (status, body) = get(state, "/api/report?date=2000-01-01&time=noon&lat=1&lon=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("noon"));
}
