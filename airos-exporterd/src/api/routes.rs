use std::sync::Arc;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::Semaphore;
use shared::protocol::METRICS_PATH;
use crate::collector::Scraper;
use super::exposition;

#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<dyn Scraper>,
    /// Bounds how many scrapes run at once
    pub permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(scraper: Arc<dyn Scraper>, workers: usize) -> Self {
        Self {
            scraper,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }
}

/// Value of the first `target` parameter, if non-empty. Repeats are ignored.
fn first_target(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(key, _)| key == "target")
        .map(|(_, value)| value.trim())
        .filter(|target| !target.is_empty())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(METRICS_PATH, get(scrape))
        .route(&format!("{METRICS_PATH}/"), get(scrape))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn scrape(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let target = match first_target(&params) {
        Some(target) => target.to_string(),
        None => return (StatusCode::INTERNAL_SERVER_ERROR, "No target parameter").into_response(),
    };

    let _permit = match state.permits.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::error!("Scrape permits closed: {}", e);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let readings = state.scraper.collect(&target).await;

    match exposition::render(&readings) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::content_type())], body).into_response(),
        Err(e) => {
            tracing::error!(host = %target, "Failed to render readings: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use shared::MetricReading;
    use tower::ServiceExt;

    /// Scraper that records targets and reports a fixed signal reading.
    #[derive(Default)]
    struct FakeScraper {
        targets: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Scraper for FakeScraper {
        async fn collect(&self, target: &str) -> Vec<MetricReading> {
            self.targets.lock().unwrap().push(target.to_string());
            let labels = BTreeMap::from([("device_name".to_string(), target.to_string())]);
            vec![MetricReading::gauge("airos_signal_dbm", "Signal", labels, -61.0)]
        }
    }

    fn app() -> (Router, Arc<FakeScraper>) {
        let scraper = Arc::new(FakeScraper::default());
        let state = AppState::new(scraper.clone(), 2);
        (router(state), scraper)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_scrape_target() {
        let (app, scraper) = app();

        let (status, body) = get(app, "/metrics?target=10.0.0.2").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE airos_signal_dbm gauge"));
        assert!(body.contains("device_name=\"10.0.0.2\""));
        assert_eq!(*scraper.targets.lock().unwrap(), vec!["10.0.0.2".to_string()]);
    }

    #[tokio::test]
    async fn test_repeated_target_uses_first() {
        let (app, scraper) = app();

        let (status, _) = get(app, "/metrics?target=10.0.0.2&target=10.0.0.3").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(*scraper.targets.lock().unwrap(), vec!["10.0.0.2".to_string()]);
    }

    #[tokio::test]
    async fn test_trailing_slash_is_accepted() {
        let (app, _) = app();

        let (status, _) = get(app, "/metrics/?target=10.0.0.3").await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_target() {
        let (app, scraper) = app();

        let (status, body) = get(app.clone(), "/metrics").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "No target parameter");

        let (status, _) = get(app, "/metrics?target=").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(scraper.targets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let (app, scraper) = app();

        let (status, body) = get(app, "/status?target=10.0.0.2").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
        assert!(scraper.targets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_scrape_is_still_ok() {
        struct Failing;

        #[async_trait]
        impl Scraper for Failing {
            async fn collect(&self, _target: &str) -> Vec<MetricReading> {
                let err = crate::error::ScrapeError::MissingField("rx_busy".to_string());
                vec![crate::collector::error_reading(&err)]
            }
        }

        let app = router(AppState::new(Arc::new(Failing), 1));

        let (status, body) = get(app, "/metrics?target=10.0.0.2").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("airos_error{error=\"missing field `rx_busy`\"}"));
    }
}
