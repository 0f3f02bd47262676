//! HTTP routes for the screener service.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::data::InstrumentId;
use crate::screener::{
    ProgressCallback, ScanError, ScanProgress, ScanReport, ScanRequest, ScreenerEngine,
};

// ============================================================================
// State
// ============================================================================

/// Shared service state.
#[derive(Clone)]
pub struct ScreenerState {
    pub engine: Arc<ScreenerEngine>,
    pub last_report: Arc<RwLock<Option<ScanReport>>>,
    progress: Arc<Mutex<Option<ScanProgress>>>,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl ScreenerState {
    pub fn new(engine: ScreenerEngine) -> Self {
        Self::with_shutdown(engine, CancellationToken::new())
    }

    /// Scans stop dispatching when `shutdown` is cancelled.
    pub fn with_shutdown(engine: ScreenerEngine, shutdown: CancellationToken) -> Self {
        Self {
            engine: Arc::new(engine),
            last_report: Arc::new(RwLock::new(None)),
            progress: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_begin_scan(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(Arc::clone(&self.running)))
    }

    fn current_progress(&self) -> Option<ScanProgress> {
        self.progress.lock().ok().and_then(|p| *p)
    }
}

/// Clears the running flag when the scan handler returns or is dropped.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response carrying the common error's status code.
#[derive(Debug)]
pub struct ApiError(tw_common::Error);

impl From<tw_common::Error> for ApiError {
    fn from(err: tw_common::Error) -> Self {
        Self(err)
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct UniverseResponse {
    pub instruments: Vec<InstrumentId>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ScanProgress>,
}

// ============================================================================
// Router
// ============================================================================

/// Build the application router.
pub fn build_router(state: ScreenerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/universe", get(get_universe))
        .route("/api/v1/scan", post(run_scan))
        .route("/api/v1/scan/last", get(last_scan))
        .route("/api/v1/scan/progress", get(scan_progress))
        .with_state(state)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "tw-screener".to_string(),
    })
}

/// List the instrument universe
pub async fn get_universe(
    State(state): State<ScreenerState>,
) -> Result<Json<UniverseResponse>, ApiError> {
    let instruments = state
        .engine
        .list_universe()
        .await
        .map_err(|e| tw_common::Error::External(e.to_string()))?;
    let count = instruments.len();

    Ok(Json(UniverseResponse { instruments, count }))
}

/// Run a scan and wait for the report. Only one scan runs at a time.
///
/// A POST without a JSON body scans with configured defaults. A body that
/// does not decode into a `ScanRequest` is rejected with 400.
pub async fn run_scan(
    State(state): State<ScreenerState>,
    request: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanReport>, ApiError> {
    let request = match request {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ScanRequest::default(),
        Err(rejection) => return Err(tw_common::Error::InvalidInput(rejection.body_text()).into()),
    };

    let Some(_guard) = state.try_begin_scan() else {
        return Err(tw_common::Error::Conflict("a scan is already running".into()).into());
    };

    let sink = Arc::clone(&state.progress);
    if let Ok(mut slot) = sink.lock() {
        *slot = None;
    }
    let progress: ProgressCallback = Arc::new(move |p| {
        if let Ok(mut slot) = sink.lock() {
            *slot = Some(p);
        }
    });

    let report = state
        .engine
        .execute(&request, Some(progress), &state.shutdown)
        .await?;

    *state.last_report.write().await = Some(report.clone());
    Ok(Json(report))
}

/// Most recent completed scan
pub async fn last_scan(State(state): State<ScreenerState>) -> Result<Json<ScanReport>, StatusCode> {
    state
        .last_report
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Progress of the running (or last) scan
pub async fn scan_progress(State(state): State<ScreenerState>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        running: state.is_running(),
        progress: state.current_progress(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataUnavailable, HistoryProvider, PriceBar};
    use crate::screener::ScreenerConfig;
    use crate::universe::{StaticUniverse, UniverseProvider, UniverseUnavailable};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct RisingProvider;

    #[async_trait]
    impl HistoryProvider for RisingProvider {
        fn name(&self) -> &'static str {
            "rising"
        }

        async fn fetch_daily(
            &self,
            _id: &InstrumentId,
            _sessions: usize,
        ) -> Result<Vec<PriceBar>, DataUnavailable> {
            Ok([100.0, 105.0, 110.0]
                .iter()
                .enumerate()
                .map(|(i, &close)| PriceBar {
                    date: NaiveDate::from_ymd_opt(2024, 3, 4 + i as u32).unwrap(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 2_000_000,
                })
                .collect())
        }
    }

    struct DownUniverse;

    #[async_trait]
    impl UniverseProvider for DownUniverse {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn list_instruments(&self) -> Result<Vec<InstrumentId>, UniverseUnavailable> {
            Err(UniverseUnavailable::Other("listing offline".into()))
        }
    }

    fn test_state(universe: Arc<dyn UniverseProvider>) -> ScreenerState {
        ScreenerState::new(ScreenerEngine::new(
            ScreenerConfig::default(),
            Arc::new(RisingProvider),
            universe,
        ))
    }

    fn static_state() -> ScreenerState {
        test_state(Arc::new(StaticUniverse::from_symbols(["2330.TW", "6488.TWO"])))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_scan(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/scan")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = build_router(static_state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_universe_listing() {
        let response = build_router(static_state())
            .oneshot(Request::builder().uri("/api/v1/universe").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 2);
        assert_eq!(json["instruments"][1], "6488.TWO");
    }

    #[tokio::test]
    async fn test_scan_then_last() {
        let state = static_state();

        let response = build_router(state.clone())
            .oneshot(post_scan(r#"{"concurrency": 2}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["matched"], 2);
        assert_eq!(json["ranked"][0]["change_pct"], 4.76);

        let response = build_router(state.clone())
            .oneshot(Request::builder().uri("/api/v1/scan/last").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let progress = body_json(
            build_router(state)
                .oneshot(Request::builder().uri("/api/v1/scan/progress").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(progress["running"], false);
        assert_eq!(progress["progress"]["completed"], 2);
    }

    #[tokio::test]
    async fn test_last_before_any_scan() {
        let response = build_router(static_state())
            .oneshot(Request::builder().uri("/api/v1/scan/last").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_conflict_while_running() {
        let state = static_state();
        let _guard = state.try_begin_scan().unwrap();

        let response = build_router(state.clone()).oneshot(post_scan("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_universe_failure_is_bad_gateway() {
        let state = test_state(Arc::new(DownUniverse));

        let response = build_router(state.clone()).oneshot(post_scan("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_invalid_concurrency_is_bad_request() {
        let response = build_router(static_state())
            .oneshot(post_scan(r#"{"concurrency": 0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mistyped_body_is_bad_request() {
        let state = static_state();

        let response = build_router(state.clone())
            .oneshot(post_scan(r#"{"symbols": "2330.TW", "concurrency": "ten"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);

        // Nothing ran
        assert!(state.last_report.read().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = build_router(static_state())
            .oneshot(post_scan(r#"{"limit": 5"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_without_body_uses_defaults() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/scan")
            .body(Body::empty())
            .unwrap();

        let response = build_router(static_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["scanned"], 2);
    }
}
